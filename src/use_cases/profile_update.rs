use std::sync::Arc;

use tracing::info;

use crate::domain::errors::GuestError;
use crate::domain::policy::GuestPolicyGuard;
use crate::domain::ports::HostDirectory;

// Re-applies the guest suffix whenever the host reports a profile change.
pub struct ProfileUpdateUseCase {
    pub guard: GuestPolicyGuard,
    pub host: Arc<dyn HostDirectory>,
}

impl ProfileUpdateUseCase {
    // Returns the corrected display name when one was written.
    pub async fn execute(
        &self,
        user_id: &str,
        display_name: Option<&str>,
    ) -> Result<Option<String>, GuestError> {
        let Some(corrected) = self.guard.corrected_display_name(user_id, display_name) else {
            return Ok(None);
        };

        info!(%user_id, "restoring guest display name suffix");
        self.host.set_display_name(user_id, &corrected).await?;
        Ok(Some(corrected))
    }
}
