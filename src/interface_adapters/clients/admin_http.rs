use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;

use crate::domain::errors::GuestError;

// Authorization header to attach to an admin request.
#[derive(Clone, Copy)]
pub enum AdminAuth<'a> {
    Bearer(&'a str),
    Basic {
        username: &'a str,
        password: &'a str,
    },
}

#[derive(Debug)]
pub enum AdminHttpError {
    Transport(reqwest::Error),
    Upstream {
        status: StatusCode,
        message: Option<String>,
    },
    Decode(serde_json::Error),
}

impl fmt::Display for AdminHttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminHttpError::Transport(err) => write!(f, "admin transport error: {err}"),
            AdminHttpError::Upstream { status, message } => {
                if let Some(message) = message {
                    write!(f, "admin upstream error {status}: {message}")
                } else {
                    write!(f, "admin upstream error {status}")
                }
            }
            AdminHttpError::Decode(err) => write!(f, "admin response decode error: {err}"),
        }
    }
}

impl std::error::Error for AdminHttpError {}

impl From<AdminHttpError> for GuestError {
    fn from(err: AdminHttpError) -> Self {
        match &err {
            AdminHttpError::Upstream { status, .. }
                if *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN =>
            {
                GuestError::Authentication(err.to_string())
            }
            AdminHttpError::Decode(_) => GuestError::Protocol(err.to_string()),
            AdminHttpError::Transport(_) | AdminHttpError::Upstream { .. } => {
                GuestError::TransientBackend(err.to_string())
            }
        }
    }
}

// Thin wrapper around reqwest for admin API calls. Cheap to clone.
#[derive(Clone)]
pub struct AdminHttpClient {
    http: Client,
}

impl AdminHttpClient {
    pub fn new(timeout: Duration) -> Result<Self, GuestError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| GuestError::Configuration(format!("failed to build http client: {err}")))?;
        Ok(Self { http })
    }

    // POST a JSON body and decode the JSON response.
    pub async fn post_json<B, T>(
        &self,
        url: &str,
        body: &B,
        auth: AdminAuth<'_>,
    ) -> Result<T, AdminHttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = with_auth(self.http.post(url), auth).json(body);
        send(request).await
    }

    // POST a form-encoded body and decode the JSON response.
    pub async fn post_form<T>(
        &self,
        url: &str,
        form: &[(&str, &str)],
        auth: AdminAuth<'_>,
    ) -> Result<T, AdminHttpError>
    where
        T: DeserializeOwned,
    {
        let request = with_auth(self.http.post(url), auth).form(form);
        send(request).await
    }
}

fn with_auth(request: RequestBuilder, auth: AdminAuth<'_>) -> RequestBuilder {
    match auth {
        AdminAuth::Bearer(token) => request.bearer_auth(token),
        AdminAuth::Basic { username, password } => request.basic_auth(username, Some(password)),
    }
}

async fn send<T>(request: RequestBuilder) -> Result<T, AdminHttpError>
where
    T: DeserializeOwned,
{
    let res = request.send().await.map_err(AdminHttpError::Transport)?;
    let status = res.status();
    let body = res.bytes().await.map_err(AdminHttpError::Transport)?;

    // Keep a bounded slice of the upstream message for the logs.
    if !status.is_success() {
        let message = (!body.is_empty())
            .then(|| String::from_utf8_lossy(&body).chars().take(512).collect::<String>());
        return Err(AdminHttpError::Upstream { status, message });
    }

    // Some admin endpoints answer 2xx with an empty body.
    if body.is_empty() {
        return serde_json::from_value(serde_json::Value::Null).map_err(AdminHttpError::Decode);
    }
    serde_json::from_slice(&body).map_err(AdminHttpError::Decode)
}

// Append `path` to an already normalized base, with exactly one slash between.
pub fn join_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url, path.trim_start_matches('/'))
}
