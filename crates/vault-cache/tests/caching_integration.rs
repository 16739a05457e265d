//! Integration tests for `SecretCache` end-to-end resolution: local source,
//! vault fallback, and the TTL-driven refresh boundary.

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use std::result::Result;
use vault_cache::http::{HttpResponse, HttpTransport};
use vault_cache::prelude::*;
use vault_cache::vault::{VaultCacheConfig, VaultFileConfig, VaultKind};

/// A standalone `HttpTransport` double for integration tests that live
/// outside the crate and so cannot reach its `#[cfg(test)]`-only fake.
struct ScriptedTransport {
    responses: Mutex<Vec<Result<HttpResponse, String>>>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    fn new(responses: Vec<Result<HttpResponse, String>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next(&self) -> Result<HttpResponse, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err("no scripted response left".to_string());
        }
        responses.remove(0)
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn post_json(&self, _url: &str, _headers: &[(String, String)], _json_body: serde_json::Value) -> Result<HttpResponse, String> {
        self.next()
    }

    async fn get(&self, _url: &str, _headers: &[(String, String)]) -> Result<HttpResponse, String> {
        self.next()
    }
}

fn vault_config(category: &str, vault_name: &str) -> VaultCacheConfig {
    VaultCacheConfig {
        vaults: std::collections::HashMap::from([(
            category.to_string(),
            vec![VaultFileConfig {
                name: vault_name.to_string(),
                url: "https://vault.internal/v1/secret/data/${secret}".to_string(),
                kind: Some(VaultKind::KvV2),
                namespace: None,
                verify_server: true,
                retries: Some(0),
                retry_wait: Some(0),
                connect_timeout: None,
                read_timeout: None,
                write_timeout: None,
                app_role_id: None,
                app_role_secret: None,
                client_secret: Some("root".to_string()),
                use_tls_certificate_auth: false,
                role: None,
            }],
        )]),
    }
}

#[tokio::test]
async fn local_source_wins_over_a_registered_vault() {
    let dir = tempfile::tempdir().unwrap();
    let secret_dir = dir.path().join("appA").join("db");
    fs::create_dir_all(&secret_dir).unwrap();
    fs::write(secret_dir.join("password"), b"local-value").unwrap();

    let config = vault_config("appA", "primary");
    let transport = Arc::new(ScriptedTransport::new(vec![]));
    let registry = VaultRegistry::from_config(&config, transport.clone());
    let cache = SecretCache::new();

    let entry = cache
        .get_secret_entry("appA", "db", None, None, dir.path(), &registry, Duration::from_secs(600))
        .await
        .unwrap();

    assert_eq!(entry.contents().unwrap().get("password").unwrap().as_bytes(), b"local-value");
    assert_eq!(transport.call_count(), 0, "local hit must never reach the vault transport");
}

#[tokio::test]
async fn falls_back_to_vault_when_local_source_has_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = vault_config("appB", "primary");
    let transport = Arc::new(ScriptedTransport::new(vec![Ok(HttpResponse {
        status: 200,
        body: br#"{"data":{"data":{"token":"from-vault"}}}"#.to_vec(),
    })]));
    let registry = VaultRegistry::from_config(&config, transport);
    let cache = SecretCache::new();

    let entry = cache
        .get_secret_entry("appB", "api", None, None, dir.path(), &registry, Duration::from_secs(600))
        .await
        .unwrap();

    assert_eq!(entry.contents().unwrap().get("token").unwrap().as_bytes(), b"from-vault");
}

#[tokio::test]
async fn concurrent_resolution_of_the_same_key_converges_on_one_entry() {
    let dir = tempfile::tempdir().unwrap();
    let secret_dir = dir.path().join("appA").join("db");
    fs::create_dir_all(&secret_dir).unwrap();
    fs::write(secret_dir.join("password"), b"hunter2").unwrap();

    let cache = Arc::new(SecretCache::new());
    let registry = Arc::new(VaultRegistry::new());
    let mount = dir.path().to_path_buf();

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let cache = cache.clone();
        let registry = registry.clone();
        let mount = mount.clone();
        tasks.push(tokio::spawn(async move {
            cache
                .get_secret_entry("appA", "db", None, None, &mount, &registry, Duration::from_secs(600))
                .await
                .unwrap()
        }));
    }

    let mut entries = Vec::new();
    for task in tasks {
        entries.push(task.await.unwrap());
    }
    for entry in &entries[1..] {
        assert!(Arc::ptr_eq(&entries[0], entry));
    }
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn ttl_boundary_governs_whether_the_source_is_read_again() {
    let dir = tempfile::tempdir().unwrap();
    let secret_dir = dir.path().join("appA").join("db");
    fs::create_dir_all(&secret_dir).unwrap();
    fs::write(secret_dir.join("password"), b"v1").unwrap();

    let cache = SecretCache::new();
    let registry = VaultRegistry::new();
    let ttl = Duration::from_millis(20);

    let first = cache
        .get_secret_entry("appA", "db", None, None, dir.path(), &registry, ttl)
        .await
        .unwrap();
    let checked_after_first = first.checked_timestamp();

    // Still within TTL: even though the on-disk value changed, the cache
    // must not re-read it.
    fs::write(secret_dir.join("password"), b"v2").unwrap();
    let second = cache
        .get_secret_entry("appA", "db", None, None, dir.path(), &registry, ttl)
        .await
        .unwrap();
    assert_eq!(second.checked_timestamp(), checked_after_first);
    assert_eq!(second.contents().unwrap().get("password").unwrap().as_bytes(), b"v1");

    tokio::time::sleep(Duration::from_millis(30)).await;
    let third = cache
        .get_secret_entry("appA", "db", None, None, dir.path(), &registry, ttl)
        .await
        .unwrap();
    assert_ne!(third.checked_timestamp(), checked_after_first);
    assert_eq!(third.contents().unwrap().get("password").unwrap().as_bytes(), b"v2");
}

#[test]
fn vault_config_round_trips_through_serde() {
    let json = serde_json::json!({
        "vaults": {
            "appA": [
                {
                    "name": "primary",
                    "url": "https://vault.internal/v1/secret/data/${secret}",
                    "role": "appA-role"
                }
            ]
        }
    });
    let config: VaultCacheConfig = serde_json::from_value(json).unwrap();
    let vaults = &config.vaults["appA"];
    assert_eq!(vaults.len(), 1);
    assert_eq!(vaults[0].name, "primary");
    let built = vaults[0].clone().into_config();
    assert_eq!(built.kind, VaultKind::KvV2);
}
