use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::domain::config::GuestAccountConfig;
use crate::domain::entities::{
    AccountRef, AdminCredential, Authority, ExpiredGuest, GuestIdentity, IssuedDevice,
    TrackedGuest,
};
use crate::domain::errors::GuestError;
use crate::domain::ports::{Clock, GuestTracker, HostDirectory, IdentityBackend};
use crate::interface_adapters::clients::remote_admin::RemoteIdentityAdminClient;

// Guests registered and deactivated through the remote admin service, with a
// local tracking table so the reaper can find them again.
pub struct RemoteIdentityBackend {
    client: RemoteIdentityAdminClient,
    host: Arc<dyn HostDirectory>,
    tracker: Arc<dyn GuestTracker>,
    clock: Arc<dyn Clock>,
    config: Arc<GuestAccountConfig>,
}

impl RemoteIdentityBackend {
    pub fn new(
        client: RemoteIdentityAdminClient,
        host: Arc<dyn HostDirectory>,
        tracker: Arc<dyn GuestTracker>,
        clock: Arc<dyn Clock>,
        config: Arc<GuestAccountConfig>,
    ) -> Self {
        Self {
            client,
            host,
            tracker,
            clock,
            config,
        }
    }
}

fn remote_id(account_ref: &AccountRef) -> Result<&str, GuestError> {
    match account_ref {
        AccountRef::Remote(id) => Ok(id),
        AccountRef::Local => Err(GuestError::Protocol(
            "guest has no remote account id".to_string(),
        )),
    }
}

#[async_trait]
impl IdentityBackend for RemoteIdentityBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    // Remote guests never land in the host's user table, so the tracking
    // table is consulted too.
    async fn is_taken(&self, localpart: &str) -> Result<bool, GuestError> {
        let user_id = self.config.qualify(localpart);
        if self.tracker.contains_user(&user_id).await? {
            return Ok(true);
        }
        self.host.user_exists(&user_id).await
    }

    async fn create_account(
        &self,
        localpart: &str,
        display_name: &str,
    ) -> Result<GuestIdentity, GuestError> {
        let remote_user_id = self.client.create_user(localpart).await?;
        let user_id = self.config.qualify(localpart);
        info!(%user_id, %remote_user_id, "registered remote guest user");

        self.host.set_display_name(&user_id, display_name).await?;

        // Track before issuing a session so the reaper can still find the
        // account if a later step fails.
        let created_at = self.clock.now_epoch_seconds();
        self.tracker
            .insert(&TrackedGuest {
                remote_user_id: remote_user_id.clone(),
                user_id: user_id.clone(),
                created_at_sec: created_at,
            })
            .await?;

        Ok(GuestIdentity {
            user_id,
            display_name: display_name.to_string(),
            account_ref: AccountRef::Remote(remote_user_id),
            created_at,
        })
    }

    async fn issue_session(&self, identity: &GuestIdentity) -> Result<IssuedDevice, GuestError> {
        let remote_user_id = remote_id(&identity.account_ref)?;
        let (device_id, access_token) = self
            .client
            .create_personal_session(remote_user_id, self.config.session_expiry_seconds())
            .await?;
        Ok(IssuedDevice {
            device_id,
            access_token,
        })
    }

    async fn find_expired(&self, cutoff: u64) -> Result<Vec<ExpiredGuest>, GuestError> {
        let rows = self.tracker.expired_before(cutoff).await?;
        Ok(rows
            .into_iter()
            .map(|row| ExpiredGuest {
                user_id: row.user_id,
                account_ref: AccountRef::Remote(row.remote_user_id),
            })
            .collect())
    }

    async fn admin_credential(&self) -> Result<AdminCredential, GuestError> {
        let token = self.client.request_admin_token().await?;
        Ok(AdminCredential {
            token,
            authority: Authority::RemoteAdmin,
        })
    }

    async fn deactivate(
        &self,
        guest: &ExpiredGuest,
        credential: &AdminCredential,
    ) -> Result<(), GuestError> {
        let remote_user_id = remote_id(&guest.account_ref)?;
        self.client
            .deactivate_user(remote_user_id, Some(&credential.token))
            .await
    }

    async fn release(&self, guest: &ExpiredGuest) -> Result<(), GuestError> {
        let remote_user_id = remote_id(&guest.account_ref)?;
        self.tracker.remove(remote_user_id).await?;
        Ok(())
    }
}
