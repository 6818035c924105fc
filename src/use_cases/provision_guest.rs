use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::entities::Session;
use crate::domain::errors::GuestError;
use crate::domain::identifiers::{LOCALPART_ALPHABET, LOCALPART_RANDOM_LEN};
use crate::domain::policy::with_suffix;
use crate::domain::ports::{IdentityBackend, RandomSource};

// How many random localparts we try before giving up.
pub const MAX_IDENTIFIER_ATTEMPTS: u32 = 10;

// Guest registration use case with injected dependencies.
pub struct ProvisionGuestUseCase<R> {
    pub backend: Arc<dyn IdentityBackend>,
    pub random: R,
    pub user_id_prefix: String,
    pub display_name_suffix: String,
    pub homeserver_url: String,
}

impl<R> ProvisionGuestUseCase<R>
where
    R: RandomSource,
{
    pub async fn execute(&self, display_name: &str) -> Result<Session, GuestError> {
        if display_name.trim().is_empty() {
            return Err(GuestError::InvalidArgument(
                "displayname must not be blank".to_string(),
            ));
        }
        let display_name = with_suffix(display_name, &self.display_name_suffix);

        for attempt in 1..=MAX_IDENTIFIER_ATTEMPTS {
            let localpart = format!(
                "{}{}",
                self.user_id_prefix,
                self.random
                    .secure_string(LOCALPART_ALPHABET, LOCALPART_RANDOM_LEN)
            );

            // Advisory check; a concurrent registration could still pick the
            // same localpart between here and create_account.
            if self.backend.is_taken(&localpart).await? {
                debug!(attempt, %localpart, "generated localpart already taken");
                continue;
            }

            info!(backend = self.backend.name(), %localpart, "registering guest user");
            let identity = self
                .backend
                .create_account(&localpart, &display_name)
                .await?;
            let device = self.backend.issue_session(&identity).await?;
            debug!(user_id = %identity.user_id, device_id = %device.device_id, "registered guest user");

            return Ok(Session {
                user_id: identity.user_id,
                device_id: device.device_id,
                access_token: device.access_token,
                homeserver_url: self.homeserver_url.clone(),
            });
        }

        Err(GuestError::ResourceExhausted {
            attempts: MAX_IDENTIFIER_ATTEMPTS,
        })
    }
}
