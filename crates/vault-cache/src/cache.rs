//! The secret cache: stable-identity entries, TTL-driven refresh, and
//! graceful degradation on backend failure (spec.md §4.F).

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::contents::{Contents, Value};
use crate::error::VaultCacheError;
use crate::hash::fnv32_fold;
use crate::name::validate_name;
use crate::registry::VaultRegistry;
use crate::vault;

/// Composite identity for one cache entry: `category/name[@vaultId][#version]`
/// (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecretKey {
    pub category: String,
    pub name: String,
    pub vault_id: Option<String>,
    pub version: Option<String>,
}

impl std::fmt::Display for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.category, self.name)?;
        if let Some(v) = &self.vault_id {
            write!(f, "@{v}")?;
        }
        if let Some(v) = &self.version {
            write!(f, "#{v}")?;
        }
        Ok(())
    }
}

#[derive(Debug)]
struct EntryState {
    contents: Option<Contents>,
    /// `None` until the first successful load.
    content_timestamp: Option<Instant>,
    accessed_timestamp: Instant,
    /// `None` until the first refresh attempt of any outcome.
    checked_timestamp: Option<Instant>,
    content_hash: u32,
}

/// A stable, never-removed cache entry (spec.md §3 invariants 1–7).
///
/// Handed out as `Arc<CacheEntry>` so holders keep a valid reference for the
/// life of the process; its fields live behind their own lock rather than
/// the map's, which is what lets [`SecretCache::get`] return a reference a
/// caller keeps using after releasing the map lookup.
#[derive(Debug)]
pub struct CacheEntry {
    state: RwLock<EntryState>,
}

impl CacheEntry {
    fn new(now: Instant) -> Self {
        Self {
            state: RwLock::new(EntryState {
                contents: None,
                content_timestamp: None,
                accessed_timestamp: now,
                checked_timestamp: None,
                content_hash: 0,
            }),
        }
    }

    /// A reference-counted snapshot of current contents — safe to hold and
    /// read after releasing any lock (spec.md §4.F `getContents`).
    #[must_use]
    pub fn contents(&self) -> Option<Contents> {
        self.state.read().unwrap().contents.clone()
    }

    #[must_use]
    pub fn content_hash(&self) -> u32 {
        self.state.read().unwrap().content_hash
    }

    #[must_use]
    pub fn checked_timestamp(&self) -> Option<Instant> {
        self.state.read().unwrap().checked_timestamp
    }

    #[must_use]
    pub fn content_timestamp(&self) -> Option<Instant> {
        self.state.read().unwrap().content_timestamp
    }

    #[must_use]
    pub fn accessed_timestamp(&self) -> Instant {
        self.state.read().unwrap().accessed_timestamp
    }

    /// `needsRefresh(now) ⇔ now − checkedTimestamp > TTL` (never checked
    /// counts as needing refresh).
    #[must_use]
    pub fn needs_refresh(&self, now: Instant, ttl: Duration) -> bool {
        match self.checked_timestamp() {
            None => true,
            Some(checked) => now.saturating_duration_since(checked) > ttl,
        }
    }

    /// `isStale(now) ⇔ now − contentTimestamp > TTL`. Contents that have
    /// never loaded are treated as stale.
    #[must_use]
    pub fn is_stale(&self, now: Instant, ttl: Duration) -> bool {
        match self.content_timestamp() {
            None => true,
            Some(loaded) => now.saturating_duration_since(loaded) > ttl,
        }
    }

    /// "has contents ever been loaded" (spec.md §4.G, `SecretView::isValid`).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.state.read().unwrap().contents.is_some()
    }

    fn touch_accessed(&self, now: Instant) {
        self.state.write().unwrap().accessed_timestamp = now;
    }

    /// Installs new contents, recomputes `contentHash`, and sets all three
    /// timestamps to `now` (spec.md §4.F `updateContents`).
    fn update_contents(&self, new: Contents, now: Instant) {
        let hash = hash_contents(&new);
        let mut state = self.state.write().unwrap();
        state.contents = Some(new);
        state.content_hash = hash;
        state.content_timestamp = Some(now);
        state.accessed_timestamp = now;
        state.checked_timestamp = Some(now);
    }

    /// Bumps only `checkedTimestamp`, leaving prior contents untouched
    /// (spec.md §4.F `noteFailedUpdate`) — this is the mechanism that lets
    /// stale-but-valid contents survive a backend outage.
    fn note_failed_update(&self, now: Instant) {
        self.state.write().unwrap().checked_timestamp = Some(now);
    }
}

/// Deterministic hash of a [`Contents`] map; order-independent so two
/// equal-by-value maps built in different insertion orders hash equal
/// (spec.md §8 invariant 9, "`contentHash` changes if and only if contents
/// differ").
fn hash_contents(contents: &Contents) -> u32 {
    let mut keys: Vec<&str> = contents.keys().collect();
    keys.sort_unstable();
    let mut h = 0u32;
    for key in keys {
        h = fnv32_fold(h, key.as_bytes());
        h = fnv32_fold(h, contents.get(key).expect("key from contents.keys()").as_bytes());
    }
    h
}

/// Converts one vault's unwrapped JSON secret body into [`Contents`].
/// String values become their UTF-8 bytes; any other JSON value is kept as
/// its compact JSON text so no information is silently dropped.
fn contents_from_json(value: &serde_json::Value) -> Option<Contents> {
    let object = value.as_object()?;
    let mut map = HashMap::with_capacity(object.len());
    for (k, v) in object {
        let bytes = match v.as_str() {
            Some(s) => s.as_bytes().to_vec(),
            None => v.to_string().into_bytes(),
        };
        map.insert(k.clone(), Value::new(bytes));
    }
    Some(Contents::from_map(map))
}

/// The process-wide secret cache (spec.md §4.F).
#[derive(Default)]
pub struct SecretCache {
    entries: DashMap<SecretKey, Arc<CacheEntry>>,
}

impl SecretCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up or creates the entry for `key`, bumping its accessed
    /// timestamp, and returns a stable reference (spec.md §4.F
    /// `resolveEntry`). Idempotent: concurrent callers with the same key
    /// converge on one entry (spec.md §8 invariant 4).
    fn resolve_entry(&self, key: SecretKey, now: Instant) -> Arc<CacheEntry> {
        let entry = self
            .entries
            .entry(key)
            .or_insert_with(|| Arc::new(CacheEntry::new(now)))
            .clone();
        entry.touch_accessed(now);
        entry
    }

    /// Resolves `(category, name, vaultId?, version?)` to a cache entry,
    /// refreshing it first if it needs refresh (spec.md §4.F
    /// `getSecretEntry`).
    ///
    /// # Errors
    /// Returns [`VaultCacheError::InvalidName`] if `category`/`name` fail
    /// validation, or [`VaultCacheError::VaultAuthError`] if a refresh
    /// attempt could not authenticate against a vault it needed to use.
    /// Every other resolution failure is absorbed: the entry's prior
    /// contents (if any) are retained and only its checked timestamp moves.
    pub async fn get_secret_entry(
        &self,
        category: &str,
        name: &str,
        vault_id: Option<&str>,
        version: Option<&str>,
        mount: &Path,
        registry: &VaultRegistry,
        ttl: Duration,
    ) -> Result<Arc<CacheEntry>, VaultCacheError> {
        validate_name(category)?;
        validate_name(name)?;

        let key = SecretKey {
            category: category.to_string(),
            name: name.to_string(),
            vault_id: vault_id.map(str::to_string),
            version: version.map(str::to_string),
        };
        let now = Instant::now();
        let entry = self.resolve_entry(key.clone(), now);

        if !entry.needs_refresh(now, ttl) {
            return Ok(entry);
        }

        match self.attempt_resolution(&key, mount, registry).await {
            Ok(Some(contents)) => {
                entry.update_contents(contents, now);
                tracing::debug!(%key, "secret refreshed");
            }
            Ok(None) => {
                entry.note_failed_update(now);
                tracing::debug!(%key, "secret resolution found nothing");
            }
            Err(err) => {
                entry.note_failed_update(now);
                tracing::warn!(%key, error = %err, "secret refresh failed to authenticate");
                return Err(err);
            }
        }

        Ok(entry)
    }

    async fn attempt_resolution(
        &self,
        key: &SecretKey,
        mount: &Path,
        registry: &VaultRegistry,
    ) -> Result<Option<Contents>, VaultCacheError> {
        if key.vault_id.as_deref() == Some("k8s") {
            return Ok(crate::local::read_secret(mount, &key.category, &key.name));
        }

        if let Some(vault_id) = key.vault_id.as_deref().filter(|v| !v.is_empty()) {
            return match registry.vault_by_id(&key.category, vault_id) {
                Some(vault) => Self::fetch_and_unwrap(&vault, key, mount).await,
                None => Ok(None),
            };
        }

        if let Some(local) = crate::local::read_secret(mount, &key.category, &key.name) {
            return Ok(Some(local));
        }

        // Insertion-ordered fan-out (spec.md §4.E): one vault's failure must
        // not stop the rest of the category from being tried. The first
        // `Some` wins; if every vault fails to authenticate, the last such
        // error is what finally propagates.
        let mut last_auth_error = None;
        for vault in registry.vaults_for_category(&key.category) {
            match Self::fetch_and_unwrap(&vault, key, mount).await {
                Ok(Some(contents)) => return Ok(Some(contents)),
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(vault_id = %vault.config.id, %key, error = %err, "vault in category fan-out failed, trying next");
                    last_auth_error = Some(err);
                }
            }
        }
        match last_auth_error {
            Some(err) => Err(err),
            None => Ok(None),
        }
    }

    async fn fetch_and_unwrap(
        vault: &vault::VaultBackend,
        key: &SecretKey,
        mount: &Path,
    ) -> Result<Option<Contents>, VaultCacheError> {
        let Some((kind, body)) = vault.fetch(&key.name, key.version.as_deref(), mount).await? else {
            return Ok(None);
        };
        let Some(unwrapped) = vault::unwrap_body(kind, &body) else {
            return Ok(None);
        };
        Ok(contents_from_json(&unwrapped))
    }
}
