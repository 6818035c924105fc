use std::sync::Arc;

use tracing::info;

use crate::domain::entities::{AdminCredential, Authority};
use crate::domain::errors::GuestError;
use crate::domain::ports::HostDirectory;

// Obtains the local reaper's bearer token. A token already stored for the
// administrative account is reused as-is; there is no refresh.
pub struct AdminTokenUseCase {
    pub host: Arc<dyn HostDirectory>,
    pub reaper_localpart: String,
    pub reaper_user_id: String,
}

impl AdminTokenUseCase {
    pub async fn execute(&self) -> Result<AdminCredential, GuestError> {
        if let Some(token) = self.host.find_access_token(&self.reaper_user_id).await? {
            return Ok(local_credential(token));
        }

        if !self.host.user_exists(&self.reaper_user_id).await? {
            info!(user_id = %self.reaper_user_id, "registering reaper administrator user");
            self.host
                .register_user(&self.reaper_localpart, None, true)
                .await?;
        }

        info!(user_id = %self.reaper_user_id, "registering device for reaper administrator user");
        let device = self.host.register_device(&self.reaper_user_id).await?;
        Ok(local_credential(device.access_token))
    }
}

fn local_credential(token: String) -> AdminCredential {
    AdminCredential {
        token,
        authority: Authority::LocalHost,
    }
}
