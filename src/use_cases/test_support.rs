use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::entities::{
    AccountRef, AdminCredential, Authority, ExpiredGuest, GuestIdentity, IssuedDevice,
    TrackedGuest,
};
use crate::domain::errors::GuestError;
use crate::domain::ports::{Clock, GuestTracker, HostDirectory, IdentityBackend, RandomSource};

// Shared fixed time source for deterministic use-case tests.
pub(crate) struct FixedClock(pub(crate) u64);

impl Clock for FixedClock {
    fn now_epoch_seconds(&self) -> u64 {
        self.0
    }
}

// Hands out queued strings first, then a fallback built from a counter.
#[derive(Clone, Default)]
pub(crate) struct ScriptedRandom {
    queued: Arc<Mutex<VecDeque<String>>>,
    counter: Arc<Mutex<u64>>,
}

impl ScriptedRandom {
    pub(crate) fn with_values(values: &[&str]) -> Self {
        let random = Self::default();
        {
            let mut queued = random.queued.lock().expect("random mutex poisoned");
            queued.extend(values.iter().map(|value| value.to_string()));
        }
        random
    }

    fn next(&self, len: usize) -> String {
        if let Some(value) = self.queued.lock().expect("random mutex poisoned").pop_front() {
            return value;
        }
        let mut counter = self.counter.lock().expect("random mutex poisoned");
        *counter += 1;
        format!("{:0>width$}", *counter, width = len)
    }
}

impl RandomSource for ScriptedRandom {
    fn secure_string(&self, _alphabet: &[u8], len: usize) -> String {
        self.next(len)
    }

    fn public_string(&self, _alphabet: &[u8], len: usize) -> String {
        self.next(len)
    }
}

#[derive(Clone, Debug)]
pub(crate) struct HostUser {
    pub display_name: Option<String>,
    pub admin: bool,
    pub deactivated: bool,
    pub creation_ts: u64,
}

#[derive(Default)]
pub(crate) struct HostRecords {
    pub users: HashMap<String, HostUser>,
    // (user_id, token) in insertion order.
    pub tokens: Vec<(String, String)>,
    pub user_exists_calls: usize,
    pub register_user_calls: Vec<(String, bool)>,
    pub register_device_calls: Vec<String>,
    pub display_name_writes: Vec<(String, String)>,
}

// In-memory stand-in for the host's user/profile/device tables.
#[derive(Clone)]
pub(crate) struct FakeHostDirectory {
    pub records: Arc<Mutex<HostRecords>>,
    server_name: String,
    now: u64,
    // Every existence check reports a collision.
    pub always_taken: bool,
}

impl FakeHostDirectory {
    pub(crate) fn new(server_name: &str, now: u64) -> Self {
        Self {
            records: Arc::new(Mutex::new(HostRecords::default())),
            server_name: server_name.to_string(),
            now,
            always_taken: false,
        }
    }

    pub(crate) fn insert_user(&self, user_id: &str, admin: bool, deactivated: bool, creation_ts: u64) {
        let mut records = self.records.lock().expect("host mutex poisoned");
        records.users.insert(
            user_id.to_string(),
            HostUser {
                display_name: None,
                admin,
                deactivated,
                creation_ts,
            },
        );
    }

    pub(crate) fn insert_token(&self, user_id: &str, token: &str) {
        let mut records = self.records.lock().expect("host mutex poisoned");
        records.tokens.push((user_id.to_string(), token.to_string()));
    }

    pub(crate) fn user(&self, user_id: &str) -> Option<HostUser> {
        let records = self.records.lock().expect("host mutex poisoned");
        records.users.get(user_id).cloned()
    }
}

#[async_trait]
impl HostDirectory for FakeHostDirectory {
    async fn user_exists(&self, user_id: &str) -> Result<bool, GuestError> {
        let mut records = self.records.lock().expect("host mutex poisoned");
        records.user_exists_calls += 1;
        Ok(self.always_taken || records.users.contains_key(user_id))
    }

    async fn register_user(
        &self,
        localpart: &str,
        display_name: Option<&str>,
        admin: bool,
    ) -> Result<String, GuestError> {
        let user_id = format!("@{localpart}:{}", self.server_name);
        let mut records = self.records.lock().expect("host mutex poisoned");
        records.register_user_calls.push((localpart.to_string(), admin));
        records.users.insert(
            user_id.clone(),
            HostUser {
                display_name: display_name.map(str::to_string),
                admin,
                deactivated: false,
                creation_ts: self.now,
            },
        );
        Ok(user_id)
    }

    async fn register_device(&self, user_id: &str) -> Result<IssuedDevice, GuestError> {
        let mut records = self.records.lock().expect("host mutex poisoned");
        records.register_device_calls.push(user_id.to_string());
        let token = format!("host_token_{}", records.register_device_calls.len());
        records.tokens.push((user_id.to_string(), token.clone()));
        Ok(IssuedDevice {
            device_id: "DEVICEID".to_string(),
            access_token: token,
        })
    }

    async fn set_display_name(&self, user_id: &str, display_name: &str) -> Result<(), GuestError> {
        let mut records = self.records.lock().expect("host mutex poisoned");
        records
            .display_name_writes
            .push((user_id.to_string(), display_name.to_string()));
        if let Some(user) = records.users.get_mut(user_id) {
            user.display_name = Some(display_name.to_string());
        }
        Ok(())
    }

    async fn find_access_token(&self, user_id: &str) -> Result<Option<String>, GuestError> {
        let records = self.records.lock().expect("host mutex poisoned");
        Ok(records
            .tokens
            .iter()
            .find(|(owner, _)| owner == user_id)
            .map(|(_, token)| token.clone()))
    }

    async fn expired_guest_users(
        &self,
        localpart_prefix: &str,
        exclude_user_id: &str,
        cutoff: u64,
    ) -> Result<Vec<String>, GuestError> {
        let records = self.records.lock().expect("host mutex poisoned");
        let sigil_prefix = format!("@{localpart_prefix}");
        let server_suffix = format!(":{}", self.server_name);
        let mut expired: Vec<String> = records
            .users
            .iter()
            .filter(|(user_id, user)| {
                user_id.as_str() != exclude_user_id
                    && user_id.starts_with(&sigil_prefix)
                    && user_id.ends_with(&server_suffix)
                    && !user.deactivated
                    && user.creation_ts < cutoff
            })
            .map(|(user_id, _)| user_id.clone())
            .collect();
        expired.sort();
        Ok(expired)
    }

    async fn deactivate_user(&self, user_id: &str) -> Result<bool, GuestError> {
        let mut records = self.records.lock().expect("host mutex poisoned");
        let Some(user) = records.users.get_mut(user_id) else {
            return Ok(false);
        };
        user.deactivated = true;
        records.tokens.retain(|(owner, _)| owner != user_id);
        Ok(true)
    }

    async fn is_admin_token(&self, token: &str) -> Result<bool, GuestError> {
        let records = self.records.lock().expect("host mutex poisoned");
        Ok(records.tokens.iter().any(|(owner, candidate)| {
            candidate == token
                && records
                    .users
                    .get(owner)
                    .is_some_and(|user| user.admin && !user.deactivated)
        }))
    }
}

// In-memory tracking table.
#[derive(Clone, Default)]
pub(crate) struct FakeTracker {
    pub rows: Arc<Mutex<Vec<TrackedGuest>>>,
    pub fail_remove: bool,
}

#[async_trait]
impl GuestTracker for FakeTracker {
    async fn insert(&self, guest: &TrackedGuest) -> Result<(), GuestError> {
        self.rows.lock().expect("tracker mutex poisoned").push(guest.clone());
        Ok(())
    }

    async fn expired_before(&self, cutoff: u64) -> Result<Vec<TrackedGuest>, GuestError> {
        let rows = self.rows.lock().expect("tracker mutex poisoned");
        Ok(rows
            .iter()
            .filter(|row| row.created_at_sec < cutoff)
            .cloned()
            .collect())
    }

    async fn contains_user(&self, user_id: &str) -> Result<bool, GuestError> {
        let rows = self.rows.lock().expect("tracker mutex poisoned");
        Ok(rows.iter().any(|row| row.user_id == user_id))
    }

    async fn remove(&self, remote_user_id: &str) -> Result<bool, GuestError> {
        if self.fail_remove {
            return Err(GuestError::TransientBackend("remove failed".to_string()));
        }
        let mut rows = self.rows.lock().expect("tracker mutex poisoned");
        let before = rows.len();
        rows.retain(|row| row.remote_user_id != remote_user_id);
        Ok(rows.len() != before)
    }
}

#[derive(Clone, Default)]
pub(crate) struct BackendFailures {
    pub create_account: bool,
    pub admin_credential: bool,
    // Number of leading find_expired calls that fail.
    pub find_expired_times: usize,
    pub deactivate: HashSet<String>,
}

#[derive(Default)]
pub(crate) struct BackendRecords {
    pub taken: HashSet<String>,
    pub always_taken: bool,
    pub is_taken_calls: Vec<String>,
    pub created: Vec<GuestIdentity>,
    pub sessions_issued: usize,
    pub expired: Vec<ExpiredGuest>,
    pub find_expired_calls: usize,
    pub credential_requests: usize,
    pub deactivate_calls: Vec<String>,
    pub deactivated: HashSet<String>,
    pub released: Vec<String>,
}

// Scriptable identity backend used by provisioner and reaper tests.
#[derive(Clone, Default)]
pub(crate) struct FakeBackend {
    pub records: Arc<Mutex<BackendRecords>>,
    pub failures: BackendFailures,
}

impl FakeBackend {
    pub(crate) fn with_failures(mut self, failures: BackendFailures) -> Self {
        self.failures = failures;
        self
    }

    pub(crate) fn always_taken(self) -> Self {
        self.records.lock().expect("backend mutex poisoned").always_taken = true;
        self
    }

    pub(crate) fn add_expired(&self, user_id: &str) {
        let mut records = self.records.lock().expect("backend mutex poisoned");
        records.expired.push(ExpiredGuest {
            user_id: user_id.to_string(),
            account_ref: AccountRef::Remote(format!("remote-{user_id}")),
        });
    }

    pub(crate) fn snapshot<T>(&self, read: impl FnOnce(&BackendRecords) -> T) -> T {
        let records = self.records.lock().expect("backend mutex poisoned");
        read(&records)
    }
}

#[async_trait]
impl IdentityBackend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn is_taken(&self, localpart: &str) -> Result<bool, GuestError> {
        let mut records = self.records.lock().expect("backend mutex poisoned");
        records.is_taken_calls.push(localpart.to_string());
        Ok(records.always_taken || records.taken.contains(localpart))
    }

    async fn create_account(
        &self,
        localpart: &str,
        display_name: &str,
    ) -> Result<GuestIdentity, GuestError> {
        if self.failures.create_account {
            return Err(GuestError::TransientBackend("create failed".to_string()));
        }
        let identity = GuestIdentity {
            user_id: format!("@{localpart}:matrix.local"),
            display_name: display_name.to_string(),
            account_ref: AccountRef::Local,
            created_at: 1_700_000_000,
        };
        let mut records = self.records.lock().expect("backend mutex poisoned");
        records.created.push(identity.clone());
        Ok(identity)
    }

    async fn issue_session(&self, _identity: &GuestIdentity) -> Result<IssuedDevice, GuestError> {
        let mut records = self.records.lock().expect("backend mutex poisoned");
        records.sessions_issued += 1;
        Ok(IssuedDevice {
            device_id: "DEVICEID".to_string(),
            access_token: "fake_token".to_string(),
        })
    }

    async fn find_expired(&self, _cutoff: u64) -> Result<Vec<ExpiredGuest>, GuestError> {
        let mut records = self.records.lock().expect("backend mutex poisoned");
        records.find_expired_calls += 1;
        if records.find_expired_calls <= self.failures.find_expired_times {
            return Err(GuestError::TransientBackend("query failed".to_string()));
        }
        let released: HashSet<&String> = records.released.iter().collect();
        Ok(records
            .expired
            .iter()
            .filter(|guest| {
                !records.deactivated.contains(&guest.user_id) && !released.contains(&guest.user_id)
            })
            .cloned()
            .collect())
    }

    async fn admin_credential(&self) -> Result<AdminCredential, GuestError> {
        if self.failures.admin_credential {
            return Err(GuestError::Authentication("grant refused".to_string()));
        }
        let mut records = self.records.lock().expect("backend mutex poisoned");
        records.credential_requests += 1;
        Ok(AdminCredential {
            token: "admin_token".to_string(),
            authority: Authority::RemoteAdmin,
        })
    }

    async fn deactivate(
        &self,
        guest: &ExpiredGuest,
        _credential: &AdminCredential,
    ) -> Result<(), GuestError> {
        let mut records = self.records.lock().expect("backend mutex poisoned");
        records.deactivate_calls.push(guest.user_id.clone());
        if self.failures.deactivate.contains(&guest.user_id) {
            return Err(GuestError::TransientBackend("deactivate failed".to_string()));
        }
        records.deactivated.insert(guest.user_id.clone());
        Ok(())
    }

    async fn release(&self, guest: &ExpiredGuest) -> Result<(), GuestError> {
        let mut records = self.records.lock().expect("backend mutex poisoned");
        records.released.push(guest.user_id.clone());
        Ok(())
    }
}
