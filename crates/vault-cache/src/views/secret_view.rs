//! `SecretView`: a live handle over one raw cache entry (spec.md §4.G).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::{CacheEntry, SecretCache};
use crate::error::VaultCacheError;
use crate::registry::VaultRegistry;
use crate::views::{PropValue, SyncedView, TreeNode};

/// Wraps one cache entry, re-resolved through the owning cache on demand.
///
/// Spec.md describes refresh as happening transparently "on each access";
/// the [`SyncedView`] capability trait here stays synchronous (and so
/// object-safe, usable as `&dyn SyncedView`) by reading whatever the last
/// refresh produced. Callers that want the access-triggers-refresh behavior
/// call [`Self::refresh_if_needed`] first — exactly what
/// [`crate::views::cert_view::CertificateView`] does before rebuilding its
/// derived tree.
pub struct SecretView {
    cache: Arc<SecretCache>,
    registry: Arc<VaultRegistry>,
    mount: PathBuf,
    ttl: Duration,
    category: String,
    name: String,
    vault_id: Option<String>,
    version: Option<String>,
    entry: Arc<CacheEntry>,
}

impl SecretView {
    /// Resolves the entry for the first time.
    ///
    /// # Errors
    /// See [`SecretCache::get_secret_entry`].
    pub async fn new(
        cache: Arc<SecretCache>,
        registry: Arc<VaultRegistry>,
        mount: PathBuf,
        ttl: Duration,
        category: &str,
        name: &str,
        vault_id: Option<&str>,
        version: Option<&str>,
    ) -> Result<Self, VaultCacheError> {
        let entry = cache
            .get_secret_entry(category, name, vault_id, version, &mount, &registry, ttl)
            .await?;
        Ok(Self {
            cache,
            registry,
            mount,
            ttl,
            category: category.to_string(),
            name: name.to_string(),
            vault_id: vault_id.map(str::to_string),
            version: version.map(str::to_string),
            entry,
        })
    }

    /// If the underlying entry needs refresh, attempts one; on failure,
    /// logs and keeps serving the prior value (spec.md §4.G: "on failure,
    /// logs and continues with the old value").
    pub async fn refresh_if_needed(&mut self) {
        if !self.entry.needs_refresh(Instant::now(), self.ttl) {
            return;
        }
        match self
            .cache
            .get_secret_entry(
                &self.category,
                &self.name,
                self.vault_id.as_deref(),
                self.version.as_deref(),
                &self.mount,
                &self.registry,
                self.ttl,
            )
            .await
        {
            Ok(entry) => self.entry = entry,
            Err(err) => {
                tracing::warn!(category = %self.category, name = %self.name, error = %err, "secret view refresh failed, continuing with prior value");
            }
        }
    }
}

impl SyncedView for SecretView {
    fn get_tree(&self) -> TreeNode {
        let mut map = TreeNode::map();
        if let Some(contents) = self.entry.contents() {
            for key in contents.keys() {
                if let Some(value) = contents.get(key) {
                    map.insert(key.to_string(), TreeNode::Text(PropValue::from_bytes(value.as_bytes().to_vec()).display()));
                }
            }
        }
        TreeNode::Map(map)
    }

    fn get_prop(&self, key: &str) -> Option<PropValue> {
        let contents = self.entry.contents()?;
        let value = contents.get(key)?;
        Some(PropValue::from_bytes(value.as_bytes().to_vec()))
    }

    fn is_stale(&self) -> bool {
        self.entry.is_stale(Instant::now(), self.ttl)
    }

    fn is_valid(&self) -> bool {
        self.entry.is_valid()
    }

    fn get_version(&self) -> u32 {
        self.entry.content_hash()
    }
}

impl PropValue {
    fn display(&self) -> String {
        match self {
            PropValue::Text(t) => t.clone(),
            PropValue::Bytes(b) => format!("<{} bytes>", b.len()),
        }
    }
}
