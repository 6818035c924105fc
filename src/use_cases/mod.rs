pub mod admin_token;
pub mod profile_update;
pub mod provision_guest;
pub mod reap_expired;

#[cfg(test)]
pub(crate) mod test_support;
