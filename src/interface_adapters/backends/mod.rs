mod local;
mod remote;

pub use local::LocalIdentityBackend;
pub use remote::RemoteIdentityBackend;
