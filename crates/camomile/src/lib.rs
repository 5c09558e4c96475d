//! camomile: a signed-URL, SSRF-safe HTTP image proxy.

pub mod body;
pub mod config;
pub mod error;
pub mod fetch;
pub mod handler;
pub mod headers;
pub mod hex;
pub mod ipclass;
pub mod server;
pub mod signature;
pub mod ssrf;

pub use config::{Config, ConfigBuilder, ConfigError};
pub use error::ProxyError;
pub use server::{serve, Lifecycle, ServerHandle};
