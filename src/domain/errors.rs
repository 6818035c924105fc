use thiserror::Error;

// Domain-level errors for the guest account lifecycle.
#[derive(Debug, Error)]
pub enum GuestError {
    // Bad caller input (400-equivalent).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    // Every generated identifier collided; not retried further up.
    #[error("could not find a free identifier after {attempts} attempts")]
    ResourceExhausted { attempts: u32 },
    #[error("authentication failed: {0}")]
    Authentication(String),
    // Backend answered, but not in the shape we expect.
    #[error("unexpected backend response: {0}")]
    Protocol(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("backend unavailable: {0}")]
    TransientBackend(String),
}
