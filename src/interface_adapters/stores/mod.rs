mod postgres;

pub use postgres::{PostgresGuestTracker, PostgresHostDirectory};
