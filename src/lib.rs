pub mod allowlist;
pub mod auth;
pub mod config;
pub mod headers;
pub mod proxy;
pub mod server;
