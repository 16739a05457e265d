//! Process-wide singletons (spec.md §4.H): mount path, TTL, the global
//! cache, the mTLS info cache, and the UDP key.
//!
//! Each is lazily initialized under its own `once_cell::sync::OnceCell`,
//! matching how the wider corpus reaches for `once_cell` to guard
//! process-lifetime state that is "set once, read many times" without
//! forcing every caller through an explicit startup function.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use tokio::sync::Mutex;

use crate::cache::SecretCache;
use crate::contents::Value;
use crate::error::VaultCacheError;
use crate::http::HttpTransport;
use crate::registry::VaultRegistry;
use crate::vault::VaultCacheConfig;
use crate::views::cert_view::{CertificateView, IssuerParams};

const DEFAULT_TTL_MS: u64 = 10 * 60 * 1000;

static MOUNT_PATH: OnceCell<RwLock<PathBuf>> = OnceCell::new();
static TTL: OnceCell<RwLock<Duration>> = OnceCell::new();
static CACHE: OnceCell<Arc<SecretCache>> = OnceCell::new();
static REGISTRY: OnceCell<Arc<VaultRegistry>> = OnceCell::new();
static MTLS_CACHE: OnceCell<DashMap<MtlsKey, Arc<Mutex<CertificateView>>>> = OnceCell::new();
static UDP_KEY: OnceCell<RwLock<Option<Vec<u8>>>> = OnceCell::new();

fn default_mount_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("secrets")
}

/// Current secret mount path (defaults to `<package-folder>/secrets/`).
#[must_use]
pub fn mount_path() -> PathBuf {
    MOUNT_PATH
        .get_or_init(|| RwLock::new(default_mount_path()))
        .read()
        .unwrap()
        .clone()
}

/// Overrides the mount path. Safe to call at any point; takes effect for
/// every resolution after it returns.
pub fn set_mount_path(path: PathBuf) {
    *MOUNT_PATH
        .get_or_init(|| RwLock::new(default_mount_path()))
        .write()
        .unwrap() = path;
}

/// Current TTL (defaults to 10 minutes).
#[must_use]
pub fn ttl() -> Duration {
    *TTL.get_or_init(|| RwLock::new(Duration::from_millis(DEFAULT_TTL_MS)))
        .read()
        .unwrap()
}

pub fn set_ttl(ttl: Duration) {
    *TTL.get_or_init(|| RwLock::new(Duration::from_millis(DEFAULT_TTL_MS)))
        .write()
        .unwrap() = ttl;
}

/// The single process-wide [`SecretCache`].
#[must_use]
pub fn global_cache() -> Arc<SecretCache> {
    CACHE.get_or_init(|| Arc::new(SecretCache::new())).clone()
}

/// Builds (once) the global [`VaultRegistry`] from process configuration.
/// Subsequent calls return the already-built registry and ignore their
/// arguments, matching spec.md §3's "built once on first use".
pub fn init_vault_registry(config: &VaultCacheConfig, transport: Arc<dyn HttpTransport>) -> Arc<VaultRegistry> {
    REGISTRY
        .get_or_init(|| Arc::new(VaultRegistry::from_config(config, transport)))
        .clone()
}

/// Returns the global registry, or an empty one if [`init_vault_registry`]
/// was never called — resolution then falls back to local-source-only.
#[must_use]
pub fn global_registry() -> Arc<VaultRegistry> {
    REGISTRY.get_or_init(|| Arc::new(VaultRegistry::new())).clone()
}

/// Resolves `(category, name, key)` against the global cache and returns the
/// single requested value (spec.md §7 `getSecretValue`).
///
/// This is the general form of the operation `get_secret_udp_key` is a
/// hardcoded special case of: any ordinary secret, not just the UDP key
/// singleton, can be looked up this way.
///
/// # Errors
/// Returns [`VaultCacheError::InvalidName`] or [`VaultCacheError::VaultAuthError`]
/// as [`SecretCache::get_secret_entry`] does. If `required` is true and
/// either the secret or `key` within it is absent, returns
/// [`VaultCacheError::RequiredValueMissing`]. If `required` is false, an
/// absent secret or key simply yields `Ok(None)`.
pub async fn get_secret_value(category: &str, name: &str, key: &str, required: bool) -> Result<Option<Value>, VaultCacheError> {
    let entry = global_cache()
        .get_secret_entry(category, name, None, None, &mount_path(), &global_registry(), ttl())
        .await?;
    let value = entry.contents().and_then(|contents| contents.get(key).cloned());
    match (value, required) {
        (Some(value), _) => Ok(Some(value)),
        (None, true) => Err(VaultCacheError::RequiredValueMissing {
            category: category.to_string(),
            name: name.to_string(),
            key: key.to_string(),
        }),
        (None, false) => Ok(None),
    }
}

/// Key the mTLS info cache interns [`CertificateView`]s under (spec.md
/// §4.H). Note: per spec.md §9's open question, an issuer literally named
/// `"local"` collides with any bare-metal sentinel a caller might also key
/// as `"local"` — preserved as-is, not resolved here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MtlsKey {
    issuer: String,
    trusted_peers: Option<Vec<String>>,
    disable_mtls: bool,
}

/// Returns the shared, updating [`CertificateView`] for `params`, building
/// it on first request and reusing it for every later caller with the same
/// `(issuer, trustedPeers, disableMTLS)` (spec.md §4.H).
///
/// # Errors
/// See [`CertificateView::for_issuer`].
pub async fn mtls_view(params: IssuerParams) -> Result<Arc<Mutex<CertificateView>>, VaultCacheError> {
    let key = MtlsKey {
        issuer: params.issuer.clone(),
        trusted_peers: params.trusted_peers.clone(),
        disable_mtls: params.disable_mtls,
    };
    let map = MTLS_CACHE.get_or_init(DashMap::new);
    if let Some(existing) = map.get(&key) {
        return Ok(existing.clone());
    }

    let view = CertificateView::for_issuer(global_cache(), global_registry(), mount_path(), ttl(), params).await?;
    let handle = Arc::new(Mutex::new(view));
    map.insert(key, handle.clone());
    Ok(handle)
}

/// Injectable reader for the low-level TLS/PEM parsing spec.md §1 lists as
/// an out-of-scope external collaborator — this crate only needs the raw
/// key bytes, not PEM structure, so the default implementation is a plain
/// file read.
pub trait PemKeyReader: Send + Sync {
    /// # Errors
    /// Returns a message describing why the key could not be read.
    fn read_ec_key(&self, path: &Path) -> Result<Vec<u8>, String>;
}

#[derive(Default)]
pub struct RawFilePemKeyReader;

impl PemKeyReader for RawFilePemKeyReader {
    fn read_ec_key(&self, path: &Path) -> Result<Vec<u8>, String> {
        std::fs::read(path).map_err(|e| e.to_string())
    }
}

/// Loads `<mount>/certificates/udp/tls.key` via `reader` and stores it for
/// [`get_secret_udp_key`]. Must be called explicitly (spec.md §4.H: "on
/// explicit `initSecretUdpKey`") — there is no lazy default.
///
/// # Errors
/// Returns the reader's error message if the file is missing or unreadable.
pub fn init_secret_udp_key(mount: &Path, reader: &dyn PemKeyReader) -> Result<(), String> {
    let path = mount.join("certificates").join("udp").join("tls.key");
    let bytes = reader.read_ec_key(&path)?;
    *UDP_KEY.get_or_init(|| RwLock::new(None)).write().unwrap() = Some(bytes);
    Ok(())
}

/// Returns the UDP key, if loaded.
///
/// # Errors
/// Returns [`VaultCacheError::RequiredValueMissing`] if `required` is true
/// and no key has been loaded.
pub fn get_secret_udp_key(required: bool) -> Result<Option<Vec<u8>>, VaultCacheError> {
    let guard = UDP_KEY.get_or_init(|| RwLock::new(None)).read().unwrap();
    match (&*guard, required) {
        (Some(bytes), _) => Ok(Some(bytes.clone())),
        (None, true) => Err(VaultCacheError::RequiredValueMissing {
            category: "certificates".to_string(),
            name: "udp".to_string(),
            key: "tls.key".to_string(),
        }),
        (None, false) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_defaults_to_ten_minutes() {
        // Only a sanity check on the constant; the singleton itself may
        // already have been mutated by another test in this binary, since
        // `OnceCell` state is process-global.
        assert_eq!(DEFAULT_TTL_MS, 600_000);
    }

    #[test]
    fn set_ttl_round_trips() {
        set_ttl(Duration::from_secs(42));
        assert_eq!(ttl(), Duration::from_secs(42));
    }

    #[test]
    fn set_mount_path_round_trips() {
        set_mount_path(PathBuf::from("/tmp/example-mount"));
        assert_eq!(mount_path(), PathBuf::from("/tmp/example-mount"));
    }

    #[test]
    fn udp_key_required_without_init_errors() {
        // Uses a private struct in a temp path so this test is independent
        // of whether another test in this binary already called
        // `init_secret_udp_key`.
        struct AlwaysMissing;
        impl PemKeyReader for AlwaysMissing {
            fn read_ec_key(&self, _path: &Path) -> Result<Vec<u8>, String> {
                Err("not found".to_string())
            }
        }
        let dir = tempfile::tempdir().unwrap();
        assert!(init_secret_udp_key(dir.path(), &AlwaysMissing).is_err());
    }

    // Unique category/name values per test below: `get_secret_value` reads
    // through the process-wide global cache, which (like every other
    // singleton in this module) is shared across every test in this binary.

    #[tokio::test]
    async fn get_secret_value_required_errors_when_key_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let secret_dir = dir.path().join("globals-required-missing-key").join("db");
        std::fs::create_dir_all(&secret_dir).unwrap();
        std::fs::write(secret_dir.join("username"), b"admin").unwrap();
        set_mount_path(dir.path().to_path_buf());

        let err = get_secret_value("globals-required-missing-key", "db", "password", true)
            .await
            .unwrap_err();
        assert!(matches!(err, VaultCacheError::RequiredValueMissing { .. }));
    }

    #[tokio::test]
    async fn get_secret_value_non_required_absent_is_ok_none() {
        let dir = tempfile::tempdir().unwrap();
        set_mount_path(dir.path().to_path_buf());

        let value = get_secret_value("globals-non-required-absent", "missing-secret", "password", false)
            .await
            .unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn get_secret_value_returns_the_requested_key() {
        let dir = tempfile::tempdir().unwrap();
        let secret_dir = dir.path().join("globals-value-present").join("db");
        std::fs::create_dir_all(&secret_dir).unwrap();
        std::fs::write(secret_dir.join("password"), b"hunter2").unwrap();
        set_mount_path(dir.path().to_path_buf());

        let value = get_secret_value("globals-value-present", "db", "password", true)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(value.as_bytes(), b"hunter2");
    }

    #[test]
    fn udp_key_loads_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let key_dir = dir.path().join("certificates").join("udp");
        std::fs::create_dir_all(&key_dir).unwrap();
        std::fs::write(key_dir.join("tls.key"), b"EC-KEY-BYTES").unwrap();

        init_secret_udp_key(dir.path(), &RawFilePemKeyReader).unwrap();
        assert_eq!(get_secret_udp_key(true).unwrap(), Some(b"EC-KEY-BYTES".to_vec()));
    }
}
