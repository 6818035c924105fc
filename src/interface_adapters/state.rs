use rand::Rng;
use rand::rngs::OsRng;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::domain::config::GuestAccountConfig;
use crate::domain::policy::GuestPolicyGuard;
use crate::domain::ports::{Clock, HostDirectory, IdentityBackend, RandomSource};

// Application state shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GuestAccountConfig>,
    // Chosen once at startup from configuration.
    pub backend: Arc<dyn IdentityBackend>,
    pub host: Arc<dyn HostDirectory>,
}

impl AppState {
    pub fn guard(&self) -> GuestPolicyGuard {
        GuestPolicyGuard::new(
            self.config.user_id_prefix.as_str(),
            self.config.display_name_suffix.as_str(),
        )
    }
}

// System clock adapter used by the use cases.
#[derive(Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_seconds(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

// OS-backed randomness: the OS generator for secure draws, the thread-local
// generator for public ones.
#[derive(Clone)]
pub struct OsRandom;

fn draw<R: Rng + ?Sized>(rng: &mut R, alphabet: &[u8], len: usize) -> String {
    (0..len)
        .map(|_| char::from(alphabet[rng.gen_range(0..alphabet.len())]))
        .collect()
}

impl RandomSource for OsRandom {
    fn secure_string(&self, alphabet: &[u8], len: usize) -> String {
        draw(&mut OsRng, alphabet, len)
    }

    fn public_string(&self, alphabet: &[u8], len: usize) -> String {
        draw(&mut rand::thread_rng(), alphabet, len)
    }
}
