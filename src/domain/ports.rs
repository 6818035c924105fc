use async_trait::async_trait;

use crate::domain::entities::{
    AdminCredential, ExpiredGuest, GuestIdentity, IssuedDevice, TrackedGuest,
};
use crate::domain::errors::GuestError;

// Port for retrieving the current time.
pub trait Clock: Send + Sync {
    fn now_epoch_seconds(&self) -> u64;
}

// Port for random strings drawn from a given alphabet.
pub trait RandomSource: Send + Sync {
    // Must come from a cryptographically secure source.
    fn secure_string(&self, alphabet: &[u8], len: usize) -> String;
    // For values that are public anyway.
    fn public_string(&self, alphabet: &[u8], len: usize) -> String;
}

// Native user/profile/device primitives of the host identity service.
#[async_trait]
pub trait HostDirectory: Send + Sync {
    async fn user_exists(&self, user_id: &str) -> Result<bool, GuestError>;
    // Returns the qualified user id of the new account.
    async fn register_user(
        &self,
        localpart: &str,
        display_name: Option<&str>,
        admin: bool,
    ) -> Result<String, GuestError>;
    async fn register_device(&self, user_id: &str) -> Result<IssuedDevice, GuestError>;
    async fn set_display_name(&self, user_id: &str, display_name: &str) -> Result<(), GuestError>;
    async fn find_access_token(&self, user_id: &str) -> Result<Option<String>, GuestError>;
    // Active accounts matching `localpart_prefix` created before `cutoff`,
    // never including `exclude_user_id`.
    async fn expired_guest_users(
        &self,
        localpart_prefix: &str,
        exclude_user_id: &str,
        cutoff: u64,
    ) -> Result<Vec<String>, GuestError>;
    // Returns false when the account does not exist.
    async fn deactivate_user(&self, user_id: &str) -> Result<bool, GuestError>;
    async fn is_admin_token(&self, token: &str) -> Result<bool, GuestError>;
}

// Tracking table for guests provisioned on the remote backend.
#[async_trait]
pub trait GuestTracker: Send + Sync {
    async fn insert(&self, guest: &TrackedGuest) -> Result<(), GuestError>;
    async fn expired_before(&self, cutoff: u64) -> Result<Vec<TrackedGuest>, GuestError>;
    async fn contains_user(&self, user_id: &str) -> Result<bool, GuestError>;
    async fn remove(&self, remote_user_id: &str) -> Result<bool, GuestError>;
}

// The one seam between the lifecycle use cases and a concrete identity store.
// Selected once at startup: local host primitives or the remote admin service.
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn is_taken(&self, localpart: &str) -> Result<bool, GuestError>;
    // The created account's stored display name is `display_name` verbatim.
    async fn create_account(
        &self,
        localpart: &str,
        display_name: &str,
    ) -> Result<GuestIdentity, GuestError>;
    async fn issue_session(&self, identity: &GuestIdentity) -> Result<IssuedDevice, GuestError>;

    async fn find_expired(&self, cutoff: u64) -> Result<Vec<ExpiredGuest>, GuestError>;
    async fn admin_credential(&self) -> Result<AdminCredential, GuestError>;
    // Must tolerate repeat calls for an already deactivated account.
    async fn deactivate(
        &self,
        guest: &ExpiredGuest,
        credential: &AdminCredential,
    ) -> Result<(), GuestError>;
    // Drop any bookkeeping for a guest after confirmed deactivation.
    async fn release(&self, guest: &ExpiredGuest) -> Result<(), GuestError>;
}
