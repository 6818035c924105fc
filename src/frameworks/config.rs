use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::{env, time::Duration};
use url::Url;

use crate::domain::config::{
    DEFAULT_DISPLAY_NAME_SUFFIX, DEFAULT_USER_EXPIRATION, DEFAULT_USER_ID_PREFIX,
    GuestAccountConfig, RemoteBackendConfig, normalize_base_url,
};
use crate::domain::errors::GuestError;

// Process settings.

pub fn http_port() -> u16 {
    env::var("GUEST_SERVER_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8090)
}

pub fn database_url() -> Result<String, GuestError> {
    env::var("DATABASE_URL")
        .map_err(|_| GuestError::Configuration("DATABASE_URL must be set".to_string()))
}

pub fn guest_config_path() -> PathBuf {
    env::var("GUEST_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("guest_server.toml"))
}

pub fn http_timeout() -> Duration {
    let millis = env::var("HTTP_TIMEOUT_MS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(10_000);
    Duration::from_millis(millis)
}

// On-disk shape of the guest settings file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    server_name: String,
    public_baseurl: String,
    local_admin_url: String,
    user_id_prefix: Option<String>,
    display_name_suffix: Option<String>,
    enable_user_reaper: Option<bool>,
    user_expiration_seconds: Option<u64>,
    remote: Option<RawRemoteConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRemoteConfig {
    admin_api_base_url: String,
    oauth_base_url: Option<String>,
    client_id: String,
    client_secret: Option<String>,
    client_secret_path: Option<PathBuf>,
}

pub fn load_guest_config(path: &Path) -> Result<GuestAccountConfig, GuestError> {
    let contents = std::fs::read_to_string(path).map_err(|err| {
        GuestError::Configuration(format!("failed to read {}: {err}", path.display()))
    })?;
    parse_guest_config(&contents)
}

pub fn parse_guest_config(contents: &str) -> Result<GuestAccountConfig, GuestError> {
    let raw: RawConfig = toml::from_str(contents)
        .map_err(|err| GuestError::Configuration(format!("invalid guest config: {err}")))?;

    let user_id_prefix = raw
        .user_id_prefix
        .unwrap_or_else(|| DEFAULT_USER_ID_PREFIX.to_string());
    if user_id_prefix.trim().is_empty() {
        return Err(GuestError::Configuration(
            "user_id_prefix must not be empty".to_string(),
        ));
    }

    let remote = raw.remote.map(validate_remote).transpose()?;

    Ok(GuestAccountConfig {
        server_name: required("server_name", &raw.server_name)?,
        public_baseurl: validated_url("public_baseurl", &raw.public_baseurl)?,
        local_admin_url: normalize_base_url(&validated_url(
            "local_admin_url",
            &raw.local_admin_url,
        )?),
        user_id_prefix,
        display_name_suffix: raw
            .display_name_suffix
            .unwrap_or_else(|| DEFAULT_DISPLAY_NAME_SUFFIX.to_string()),
        enable_user_reaper: raw.enable_user_reaper.unwrap_or(true),
        user_expiration: raw
            .user_expiration_seconds
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_USER_EXPIRATION),
        remote,
    })
}

fn validate_remote(raw: RawRemoteConfig) -> Result<RemoteBackendConfig, GuestError> {
    let admin_api_base_url = normalize_base_url(&validated_url(
        "remote.admin_api_base_url",
        &raw.admin_api_base_url,
    )?);
    let oauth_base_url = match raw.oauth_base_url {
        Some(value) => normalize_base_url(&validated_url("remote.oauth_base_url", &value)?),
        None => admin_api_base_url.clone(),
    };

    if raw.client_secret.is_none() && raw.client_secret_path.is_none() {
        return Err(GuestError::Configuration(
            "remote.client_secret or remote.client_secret_path is required".to_string(),
        ));
    }

    Ok(RemoteBackendConfig {
        admin_api_base_url,
        oauth_base_url,
        client_id: required("remote.client_id", &raw.client_id)?,
        // The path wins when both are given.
        client_secret: raw.client_secret.filter(|_| raw.client_secret_path.is_none()),
        client_secret_path: raw.client_secret_path,
    })
}

fn required(key: &str, value: &str) -> Result<String, GuestError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(GuestError::Configuration(format!("{key} must not be empty")));
    }
    Ok(value.to_string())
}

// Returns the trimmed input once it parses as an http(s) URL.
fn validated_url(key: &str, value: &str) -> Result<String, GuestError> {
    let value = required(key, value)?;
    let parsed = Url::parse(&value)
        .map_err(|err| GuestError::Configuration(format!("{key} is not a valid URL: {err}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(GuestError::Configuration(format!(
            "{key} must use http or https"
        )));
    }
    Ok(value)
}
