use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::identifiers::qualify;

pub const DEFAULT_USER_ID_PREFIX: &str = "guest-";
pub const DEFAULT_DISPLAY_NAME_SUFFIX: &str = " (Guest)";
pub const DEFAULT_USER_EXPIRATION: Duration = Duration::from_secs(24 * 60 * 60);

// Immutable guest settings, validated at load time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuestAccountConfig {
    pub server_name: String,
    // Returned to callers as `homeserverUrl`.
    pub public_baseurl: String,
    // Host admin API base used by the local reaper.
    pub local_admin_url: String,
    pub user_id_prefix: String,
    pub display_name_suffix: String,
    pub enable_user_reaper: bool,
    pub user_expiration: Duration,
    // Present iff guests are provisioned through the remote admin service.
    pub remote: Option<RemoteBackendConfig>,
}

impl GuestAccountConfig {
    pub fn qualify(&self, localpart: &str) -> String {
        qualify(localpart, &self.server_name)
    }

    // Administrative account the local reaper authenticates as.
    pub fn reaper_localpart(&self) -> String {
        format!("{}reaper", self.user_id_prefix)
    }

    // Lifetime of remote personal sessions; 0 means the token never expires.
    pub fn session_expiry_seconds(&self) -> u64 {
        if self.enable_user_reaper {
            self.user_expiration.as_secs()
        } else {
            0
        }
    }
}

// Settings for the remote OAuth-based admin service.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteBackendConfig {
    pub admin_api_base_url: String,
    pub oauth_base_url: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    // Preferred over `client_secret` when set.
    pub client_secret_path: Option<PathBuf>,
}

impl fmt::Debug for RemoteBackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteBackendConfig")
            .field("admin_api_base_url", &self.admin_api_base_url)
            .field("oauth_base_url", &self.oauth_base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("client_secret_path", &self.client_secret_path)
            .finish()
    }
}

// Trim whitespace and every trailing slash. Idempotent.
pub fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
