//! vault-cache - secret and certificate resolution cache
//!
//! A TTL-driven cache that resolves secrets from a local filesystem mount or
//! a HashiCorp-Vault-style HTTP backend, and derives TLS/mTLS configuration
//! from certificate secrets.
//!
//! # Features
//!
//! - **Two resolution sources** - local mount files and Vault-style backends,
//!   selected per category/key with local taking precedence
//! - **Never-evicting, stable identities** - entries live for the process
//!   lifetime once created, handed out as `Arc` so holders never see a torn
//!   read
//! - **Graceful degradation** - a backend outage keeps serving the last good
//!   value, marked stale, rather than surfacing an error
//! - **Synced views** - `SecretView` and `CertificateView` refresh
//!   transparently on access and derive TLS/mTLS config trees
#![deny(unsafe_code)]
#![forbid(unsafe_code)]

/// Name/identifier validation (category, secret, and key names).
pub mod name;
/// Deterministic FNV-1a-style hashing.
pub mod hash;
/// URL splitting and the dynamic secret-name generator.
pub mod url;
/// In-memory secret content, zeroized on drop.
pub mod contents;
/// Local filesystem mount as a resolution source.
pub mod local;
/// Injectable HTTP transport used by the vault client.
pub mod http;
/// Vault backend: configuration, authentication, and fetch.
pub mod vault;
/// Groups configured vaults by category.
pub mod registry;
/// The secret cache itself.
pub mod cache;
/// Synced views over cache entries (`SecretView`, `CertificateView`).
pub mod views;
/// Process-wide singletons: mount path, TTL, global cache/registry, mTLS
/// info cache, UDP key.
pub mod globals;

/// Public error types.
pub mod error;

/// Commonly used types.
pub mod prelude {
    pub use crate::cache::{CacheEntry, SecretCache, SecretKey};
    pub use crate::contents::{Contents, Value};
    pub use crate::error::{Result, VaultCacheError};
    pub use crate::globals::{
        get_secret_udp_key, get_secret_value, global_cache, global_registry, init_secret_udp_key,
        init_vault_registry, mount_path, mtls_view, set_mount_path, set_ttl, ttl,
    };
    pub use crate::registry::VaultRegistry;
    pub use crate::vault::{AuthMode, VaultCacheConfig, VaultConfig, VaultFileConfig, VaultKind};
    pub use crate::views::cert_view::{CertificateView, IssuerParams, Role, StorageParams};
    pub use crate::views::secret_view::SecretView;
    pub use crate::views::{PropValue, SyncedView, TreeNode};
}
