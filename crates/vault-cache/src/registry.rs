//! Vault registry: groups vaults by category (spec.md §4.E).

use std::sync::Arc;

use dashmap::DashMap;

use crate::http::HttpTransport;
use crate::vault::{VaultBackend, VaultCacheConfig};

/// Map from category to an insertion-ordered list of vaults.
///
/// Built once from process configuration (spec.md §3, "Vault registry is
/// built once on first use"); never mutated afterwards in normal operation,
/// so lookups hand out cloned `Arc`s that callers can use outside any lock.
#[derive(Default)]
pub struct VaultRegistry {
    by_category: DashMap<String, Vec<Arc<VaultBackend>>>,
}

impl VaultRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from the `vaults/*` configuration tree, sharing one
    /// transport across every backend.
    #[must_use]
    pub fn from_config(config: &VaultCacheConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let registry = Self::new();
        for (category, vaults) in &config.vaults {
            for raw in vaults {
                let backend = Arc::new(VaultBackend::new(
                    raw.clone().into_config(),
                    category.clone(),
                    transport.clone(),
                ));
                registry.insert(category.clone(), backend);
            }
        }
        registry
    }

    pub fn insert(&self, category: impl Into<String>, backend: Arc<VaultBackend>) {
        self.by_category.entry(category.into()).or_default().push(backend);
    }

    /// All vaults registered under `category`, in insertion order — the
    /// "by category" fan-out shape from spec.md §4.E. Callers try each in
    /// turn and keep the first non-absent result.
    #[must_use]
    pub fn vaults_for_category(&self, category: &str) -> Vec<Arc<VaultBackend>> {
        self.by_category
            .get(category)
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    /// Direct lookup of one vault within a category; no fallback (spec.md
    /// §4.E "by category and vault id").
    #[must_use]
    pub fn vault_by_id(&self, category: &str, vault_id: &str) -> Option<Arc<VaultBackend>> {
        self.by_category
            .get(category)?
            .iter()
            .find(|v| v.config.id == vault_id)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::fake::FakeHttpTransport;
    use crate::vault::{AuthMode, VaultConfig, VaultKind};

    fn backend(id: &str) -> Arc<VaultBackend> {
        Arc::new(VaultBackend::new(
            VaultConfig {
                id: id.to_string(),
                kind: VaultKind::KvV2,
                url_template: "https://h/v1/secret/data/${secret}".into(),
                namespace: None,
                verify_server: true,
                auth: AuthMode::Unknown,
                static_token: None,
                retries: 0,
                retry_wait_ms: 0,
                connect_timeout_ms: 0,
                read_timeout_ms: 0,
                write_timeout_ms: 0,
            },
            "appA".into(),
            Arc::new(FakeHttpTransport::new()),
        ))
    }

    #[test]
    fn preserves_insertion_order_within_category() {
        let registry = VaultRegistry::new();
        registry.insert("appA", backend("first"));
        registry.insert("appA", backend("second"));
        let vaults = registry.vaults_for_category("appA");
        assert_eq!(vaults[0].config.id, "first");
        assert_eq!(vaults[1].config.id, "second");
    }

    #[test]
    fn by_id_has_no_fallback() {
        let registry = VaultRegistry::new();
        registry.insert("appA", backend("first"));
        assert!(registry.vault_by_id("appA", "missing").is_none());
        assert!(registry.vault_by_id("other-category", "first").is_none());
    }

    #[test]
    fn unknown_category_is_empty() {
        let registry = VaultRegistry::new();
        assert!(registry.vaults_for_category("nothing").is_empty());
    }
}
