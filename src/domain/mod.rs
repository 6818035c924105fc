pub mod config;
pub mod entities;
pub mod errors;
pub mod identifiers;
pub mod policy;
pub mod ports;
