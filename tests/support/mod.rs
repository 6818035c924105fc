// Shared fakes for the integration tests. Not every test binary uses all of them.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri, header::AUTHORIZATION};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::Value;

use guest_server::domain::entities::{IssuedDevice, TrackedGuest};
use guest_server::domain::errors::GuestError;
use guest_server::domain::ports::{Clock, GuestTracker, HostDirectory};

// Serve `router` on an ephemeral port inside the current test runtime and
// return its base URL.
pub async fn spawn_router(router: Router) -> String {
    // Bind to an ephemeral port to avoid collisions with local services.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral test port");
    let addr = listener.local_addr().expect("get local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    format!("http://{addr}")
}

// One request as seen by the fake admin service.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub path: String,
    pub authorization: Option<String>,
    pub body: String,
}

// Scripted stand-in for the remote admin service: answers by path and
// records every request.
#[derive(Clone, Default)]
pub struct FakeAdminService {
    responses: Arc<Mutex<HashMap<String, (StatusCode, Value)>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl FakeAdminService {
    pub fn respond(&self, path: &str, status: StatusCode, body: Value) {
        self.responses
            .lock()
            .expect("responses mutex poisoned")
            .insert(path.to_string(), (status, body));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("requests mutex poisoned").clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.path == path)
            .collect()
    }

    pub async fn spawn(&self) -> String {
        let router = Router::new()
            .fallback(fake_admin_handler)
            .with_state(self.clone());
        spawn_router(router).await
    }
}

async fn fake_admin_handler(
    State(service): State<FakeAdminService>,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    let path = uri.path().to_string();
    service
        .requests
        .lock()
        .expect("requests mutex poisoned")
        .push(RecordedRequest {
            path: path.clone(),
            authorization: headers
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string),
            body,
        });

    let scripted = service
        .responses
        .lock()
        .expect("responses mutex poisoned")
        .get(&path)
        .cloned();
    match scripted {
        Some((status, body)) => (status, Json(body)),
        None => (StatusCode::NOT_FOUND, Json(Value::Null)),
    }
}

pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now_epoch_seconds(&self) -> u64 {
        self.0
    }
}

// Tracking table held in memory.
#[derive(Clone, Default)]
pub struct MemoryTracker {
    rows: Arc<Mutex<Vec<TrackedGuest>>>,
}

impl MemoryTracker {
    pub fn rows(&self) -> Vec<TrackedGuest> {
        self.rows.lock().expect("tracker mutex poisoned").clone()
    }
}

#[async_trait]
impl GuestTracker for MemoryTracker {
    async fn insert(&self, guest: &TrackedGuest) -> Result<(), GuestError> {
        self.rows.lock().expect("tracker mutex poisoned").push(guest.clone());
        Ok(())
    }

    async fn expired_before(&self, cutoff: u64) -> Result<Vec<TrackedGuest>, GuestError> {
        Ok(self
            .rows()
            .into_iter()
            .filter(|row| row.created_at_sec < cutoff)
            .collect())
    }

    async fn contains_user(&self, user_id: &str) -> Result<bool, GuestError> {
        Ok(self.rows().iter().any(|row| row.user_id == user_id))
    }

    async fn remove(&self, remote_user_id: &str) -> Result<bool, GuestError> {
        let mut rows = self.rows.lock().expect("tracker mutex poisoned");
        let before = rows.len();
        rows.retain(|row| row.remote_user_id != remote_user_id);
        Ok(rows.len() != before)
    }
}

// Host that only keeps profiles, which is all the remote backend touches.
#[derive(Clone, Default)]
pub struct ProfileHost {
    display_names: Arc<Mutex<HashMap<String, String>>>,
}

impl ProfileHost {
    pub fn display_name(&self, user_id: &str) -> Option<String> {
        let names = self.display_names.lock().expect("profile mutex poisoned");
        names.get(user_id).cloned()
    }
}

fn not_hosted() -> GuestError {
    GuestError::Protocol("remote guests have no host account".to_string())
}

#[async_trait]
impl HostDirectory for ProfileHost {
    async fn user_exists(&self, _user_id: &str) -> Result<bool, GuestError> {
        Ok(false)
    }

    async fn register_user(
        &self,
        _localpart: &str,
        _display_name: Option<&str>,
        _admin: bool,
    ) -> Result<String, GuestError> {
        Err(not_hosted())
    }

    async fn register_device(&self, _user_id: &str) -> Result<IssuedDevice, GuestError> {
        Err(not_hosted())
    }

    async fn set_display_name(&self, user_id: &str, display_name: &str) -> Result<(), GuestError> {
        let mut names = self.display_names.lock().expect("profile mutex poisoned");
        names.insert(user_id.to_string(), display_name.to_string());
        Ok(())
    }

    async fn find_access_token(&self, _user_id: &str) -> Result<Option<String>, GuestError> {
        Ok(None)
    }

    async fn expired_guest_users(
        &self,
        _localpart_prefix: &str,
        _exclude_user_id: &str,
        _cutoff: u64,
    ) -> Result<Vec<String>, GuestError> {
        Ok(Vec::new())
    }

    async fn deactivate_user(&self, _user_id: &str) -> Result<bool, GuestError> {
        Err(not_hosted())
    }

    async fn is_admin_token(&self, _token: &str) -> Result<bool, GuestError> {
        Ok(false)
    }
}
