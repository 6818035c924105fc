// Backend-specific handle to a guest account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccountRef {
    // Account lives in the host's own user table.
    Local,
    // Account lives in the remote admin service under this id.
    Remote(String),
}

// A provisioned guest account. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuestIdentity {
    pub user_id: String,
    pub display_name: String,
    pub account_ref: AccountRef,
    pub created_at: u64,
}

// Device and token handed out by a backend for a fresh account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuedDevice {
    pub device_id: String,
    pub access_token: String,
}

// Session descriptor returned to the registering caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub device_id: String,
    pub access_token: String,
    pub homeserver_url: String,
}

// Which admin surface a credential is valid for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Authority {
    LocalHost,
    RemoteAdmin,
}

// Bearer token the reaper uses to deactivate accounts.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminCredential {
    pub token: String,
    pub authority: Authority,
}

impl std::fmt::Debug for AdminCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredential")
            .field("token", &"<redacted>")
            .field("authority", &self.authority)
            .finish()
    }
}

// Row of the remote-backend tracking table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackedGuest {
    pub remote_user_id: String,
    pub user_id: String,
    pub created_at_sec: u64,
}

// A guest that is past its expiration and still active.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpiredGuest {
    pub user_id: String,
    pub account_ref: AccountRef,
}
