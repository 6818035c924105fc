use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::domain::config::{RemoteBackendConfig, normalize_base_url};
use crate::domain::errors::GuestError;
use crate::domain::identifiers::{DEVICE_ID_ALPHABET, DEVICE_ID_LEN};
use crate::domain::ports::RandomSource;
use crate::interface_adapters::clients::admin_http::{AdminAuth, AdminHttpClient, join_url};

pub const ADMIN_SCOPE: &str = "urn:mas:admin";
const PERSONAL_SESSION_NAME: &str = "Guest access";

#[derive(Serialize)]
struct CreateUserRequest<'a> {
    username: &'a str,
}

#[derive(Serialize)]
struct PersonalSessionRequest<'a> {
    actor_user_id: &'a str,
    human_name: &'a str,
    scope: String,
    // Omitted for non-expiring sessions.
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_in: Option<u64>,
}

#[derive(Serialize)]
struct DeactivateRequest {
    skip_erase: bool,
}

// Typed client for the remote identity admin service.
#[derive(Clone)]
pub struct RemoteIdentityAdminClient {
    http: AdminHttpClient,
    random: Arc<dyn RandomSource>,
    admin_api_base_url: String,
    oauth_base_url: String,
    client_id: String,
    client_secret: String,
}

impl RemoteIdentityAdminClient {
    // Resolves the client secret once; bad secrets fail construction.
    pub fn new(
        config: &RemoteBackendConfig,
        http: AdminHttpClient,
        random: Arc<dyn RandomSource>,
    ) -> Result<Self, GuestError> {
        let client_secret = resolve_client_secret(config)?;
        Ok(Self {
            http,
            random,
            admin_api_base_url: normalize_base_url(&config.admin_api_base_url),
            oauth_base_url: normalize_base_url(&config.oauth_base_url),
            client_id: config.client_id.trim().to_string(),
            client_secret,
        })
    }

    // OAuth2 client-credentials grant for an admin-scoped token.
    pub async fn request_admin_token(&self) -> Result<String, GuestError> {
        let url = join_url(&self.oauth_base_url, "/oauth2/token");
        let response: Value = self
            .http
            .post_form(
                &url,
                &[("grant_type", "client_credentials"), ("scope", ADMIN_SCOPE)],
                AdminAuth::Basic {
                    username: &self.client_id,
                    password: &self.client_secret,
                },
            )
            .await?;

        response
            .get("access_token")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                GuestError::Authentication("token response missing access_token".to_string())
            })
    }

    // Returns the admin service's id for the new user.
    pub async fn create_user(&self, username: &str) -> Result<String, GuestError> {
        let token = self.request_admin_token().await?;
        let url = join_url(&self.admin_api_base_url, "/api/admin/v1/users");
        let response: Value = self
            .http
            .post_json(&url, &CreateUserRequest { username }, AdminAuth::Bearer(&token))
            .await?;

        response
            .pointer("/data/id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| GuestError::Protocol("create user response missing data.id".to_string()))
    }

    // Returns (device_id, access_token). `expires_in_seconds == 0` means the
    // token does not expire.
    pub async fn create_personal_session(
        &self,
        remote_user_id: &str,
        expires_in_seconds: u64,
    ) -> Result<(String, String), GuestError> {
        let token = self.request_admin_token().await?;
        let device_id = self.generate_device_id();
        let url = join_url(&self.admin_api_base_url, "/api/admin/v1/personal-sessions");
        let body = personal_session_request(remote_user_id, &device_id, expires_in_seconds);
        let response: Value = self
            .http
            .post_json(&url, &body, AdminAuth::Bearer(&token))
            .await?;

        let access_token = response
            .pointer("/data/attributes/access_token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                GuestError::Protocol(
                    "personal session response missing data.attributes.access_token".to_string(),
                )
            })?;

        debug!(%remote_user_id, %device_id, "created personal session");
        Ok((device_id, access_token))
    }

    // Deactivates without erasing. A token is requested when none is given.
    pub async fn deactivate_user(
        &self,
        remote_user_id: &str,
        token: Option<&str>,
    ) -> Result<(), GuestError> {
        let token = match token {
            Some(token) => token.to_string(),
            None => self.request_admin_token().await?,
        };
        let url = join_url(
            &self.admin_api_base_url,
            &format!("/api/admin/v1/users/{remote_user_id}/deactivate"),
        );
        let _: Value = self
            .http
            .post_json(&url, &DeactivateRequest { skip_erase: true }, AdminAuth::Bearer(&token))
            .await?;
        Ok(())
    }

    fn generate_device_id(&self) -> String {
        self.random.public_string(DEVICE_ID_ALPHABET, DEVICE_ID_LEN)
    }
}

// Prefer the secret file over the inline secret. Both are trimmed and must
// not end up empty.
pub fn resolve_client_secret(config: &RemoteBackendConfig) -> Result<String, GuestError> {
    if let Some(path) = &config.client_secret_path {
        let contents = std::fs::read_to_string(path).map_err(|err| {
            GuestError::Configuration(format!(
                "failed to read client secret file {}: {err}",
                path.display()
            ))
        })?;
        let secret = contents.trim();
        if secret.is_empty() {
            return Err(GuestError::Configuration(format!(
                "client secret file {} is empty",
                path.display()
            )));
        }
        return Ok(secret.to_string());
    }

    match config.client_secret.as_deref().map(str::trim) {
        Some(secret) if !secret.is_empty() => Ok(secret.to_string()),
        Some(_) => Err(GuestError::Configuration("client secret is empty".to_string())),
        None => Err(GuestError::Configuration(
            "either client_secret or client_secret_path is required".to_string(),
        )),
    }
}

// The device id is embedded in the scope so the host binds the token to it.
fn personal_session_request<'a>(
    remote_user_id: &'a str,
    device_id: &str,
    expires_in_seconds: u64,
) -> PersonalSessionRequest<'a> {
    PersonalSessionRequest {
        actor_user_id: remote_user_id,
        human_name: PERSONAL_SESSION_NAME,
        scope: format!("urn:matrix:client:api:* urn:matrix:client:device:{device_id}"),
        expires_in: (expires_in_seconds > 0).then_some(expires_in_seconds),
    }
}
