//! Vault backend: configuration, authentication, and the HTTP fetch client
//! (spec.md §4.D).

pub mod auth;
pub mod client;
pub mod config;

pub use client::{unwrap_body, VaultBackend};
pub use config::{AuthMode, VaultCacheConfig, VaultConfig, VaultFileConfig, VaultKind};
