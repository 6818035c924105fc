// reqwest clients used to talk to admin APIs outside this process.
pub mod admin_http;
pub mod remote_admin;
