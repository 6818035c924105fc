use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::domain::config::GuestAccountConfig;
use crate::domain::entities::{
    AccountRef, AdminCredential, ExpiredGuest, GuestIdentity, IssuedDevice,
};
use crate::domain::errors::GuestError;
use crate::domain::ports::{Clock, HostDirectory, IdentityBackend};
use crate::interface_adapters::clients::admin_http::{AdminAuth, AdminHttpClient, join_url};
use crate::use_cases::admin_token::AdminTokenUseCase;

// Guests registered through the host's own primitives and deactivated through
// the host's admin API.
pub struct LocalIdentityBackend {
    host: Arc<dyn HostDirectory>,
    http: AdminHttpClient,
    clock: Arc<dyn Clock>,
    config: Arc<GuestAccountConfig>,
}

impl LocalIdentityBackend {
    pub fn new(
        host: Arc<dyn HostDirectory>,
        http: AdminHttpClient,
        clock: Arc<dyn Clock>,
        config: Arc<GuestAccountConfig>,
    ) -> Self {
        Self {
            host,
            http,
            clock,
            config,
        }
    }

    fn admin_token_use_case(&self) -> AdminTokenUseCase {
        let reaper_localpart = self.config.reaper_localpart();
        AdminTokenUseCase {
            host: self.host.clone(),
            reaper_user_id: self.config.qualify(&reaper_localpart),
            reaper_localpart,
        }
    }

    fn deactivate_url(&self, user_id: &str) -> String {
        join_url(
            &self.config.local_admin_url,
            &format!("/admin/v1/deactivate/{user_id}"),
        )
    }
}

#[async_trait]
impl IdentityBackend for LocalIdentityBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn is_taken(&self, localpart: &str) -> Result<bool, GuestError> {
        self.host.user_exists(&self.config.qualify(localpart)).await
    }

    async fn create_account(
        &self,
        localpart: &str,
        display_name: &str,
    ) -> Result<GuestIdentity, GuestError> {
        let user_id = self
            .host
            .register_user(localpart, Some(display_name), false)
            .await?;
        Ok(GuestIdentity {
            user_id,
            display_name: display_name.to_string(),
            account_ref: AccountRef::Local,
            created_at: self.clock.now_epoch_seconds(),
        })
    }

    async fn issue_session(&self, identity: &GuestIdentity) -> Result<IssuedDevice, GuestError> {
        self.host.register_device(&identity.user_id).await
    }

    async fn find_expired(&self, cutoff: u64) -> Result<Vec<ExpiredGuest>, GuestError> {
        let reaper_user_id = self.config.qualify(&self.config.reaper_localpart());
        let user_ids = self
            .host
            .expired_guest_users(&self.config.user_id_prefix, &reaper_user_id, cutoff)
            .await?;
        Ok(user_ids
            .into_iter()
            .map(|user_id| ExpiredGuest {
                user_id,
                account_ref: AccountRef::Local,
            })
            .collect())
    }

    async fn admin_credential(&self) -> Result<AdminCredential, GuestError> {
        self.admin_token_use_case().execute().await
    }

    async fn deactivate(
        &self,
        guest: &ExpiredGuest,
        credential: &AdminCredential,
    ) -> Result<(), GuestError> {
        let _: Value = self
            .http
            .post_json(
                &self.deactivate_url(&guest.user_id),
                &json!({}),
                AdminAuth::Bearer(&credential.token),
            )
            .await?;
        Ok(())
    }

    // The host's deactivated flag already keeps the guest out of later sweeps.
    async fn release(&self, _guest: &ExpiredGuest) -> Result<(), GuestError> {
        Ok(())
    }
}
