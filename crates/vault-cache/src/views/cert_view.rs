//! `CertificateView`: derives TLS/mTLS configuration from a certificate
//! secret (spec.md §4.G).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::SecretCache;
use crate::error::VaultCacheError;
use crate::registry::VaultRegistry;
use crate::views::secret_view::SecretView;
use crate::views::{PropValue, SyncedView, TreeNode};

/// Which side of a TLS connection this view's consumer plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// Derivation parameters for an issuer's TLS/mTLS config.
#[derive(Debug, Clone)]
pub struct IssuerParams {
    pub issuer: String,
    pub role: Role,
    /// `None` means "anyone" (spec.md §4.G).
    pub trusted_peers: Option<Vec<String>>,
    pub disable_mtls: bool,
    pub accept_selfsigned: bool,
}

/// Derivation parameters for a named storage secret's TLS config.
#[derive(Debug, Clone)]
pub struct StorageParams {
    pub secret_name: String,
}

enum Derivation {
    Issuer(IssuerParams),
    Storage(StorageParams),
}

/// Wraps a [`SecretView`] plus derivation parameters; rebuilds its derived
/// tree only when the underlying secret's version actually changes.
pub struct CertificateView {
    inner: SecretView,
    derivation: Derivation,
    cached_tree: TreeNode,
    last_version: u32,
}

impl CertificateView {
    /// # Errors
    /// See [`SecretView::new`].
    pub async fn for_issuer(
        cache: Arc<SecretCache>,
        registry: Arc<VaultRegistry>,
        mount: PathBuf,
        ttl: Duration,
        params: IssuerParams,
    ) -> Result<Self, VaultCacheError> {
        let inner = SecretView::new(cache, registry, mount, ttl, "certificates", &params.issuer, None, None).await?;
        let mut view = Self {
            inner,
            derivation: Derivation::Issuer(params),
            cached_tree: TreeNode::Map(TreeNode::map()),
            last_version: 0,
        };
        view.rebuild();
        Ok(view)
    }

    /// # Errors
    /// See [`SecretView::new`].
    pub async fn for_storage(
        cache: Arc<SecretCache>,
        registry: Arc<VaultRegistry>,
        mount: PathBuf,
        ttl: Duration,
        params: StorageParams,
    ) -> Result<Self, VaultCacheError> {
        let inner = SecretView::new(cache, registry, mount, ttl, "certificates", &params.secret_name, None, None).await?;
        let mut view = Self {
            inner,
            derivation: Derivation::Storage(params),
            cached_tree: TreeNode::Map(TreeNode::map()),
            last_version: 0,
        };
        view.rebuild();
        Ok(view)
    }

    /// Refreshes the underlying secret, rebuilding the derived tree only if
    /// its version actually moved (spec.md §4.G).
    pub async fn access(&mut self) -> &TreeNode {
        self.inner.refresh_if_needed().await;
        if self.inner.get_version() != self.last_version {
            self.rebuild();
        }
        &self.cached_tree
    }

    fn rebuild(&mut self) {
        self.last_version = self.inner.get_version();
        self.cached_tree = match &self.derivation {
            Derivation::Issuer(params) => build_issuer_tree(&self.inner, params),
            Derivation::Storage(params) => build_storage_tree(&self.inner, params),
        };
    }
}

impl SyncedView for CertificateView {
    fn get_tree(&self) -> TreeNode {
        self.cached_tree.clone()
    }

    fn get_prop(&self, key: &str) -> Option<PropValue> {
        match &self.cached_tree {
            TreeNode::Map(map) => match map.get(key)? {
                TreeNode::Text(t) => Some(PropValue::Text(t.clone())),
                TreeNode::Bool(b) => Some(PropValue::Text(b.to_string())),
                _ => None,
            },
            _ => None,
        }
    }

    fn is_stale(&self) -> bool {
        self.inner.is_stale()
    }

    fn is_valid(&self) -> bool {
        self.inner.is_valid()
    }

    fn get_version(&self) -> u32 {
        self.inner.get_version()
    }
}

fn cert_text(view: &SecretView, key: &str) -> Option<String> {
    match view.get_prop(key)? {
        PropValue::Text(t) => Some(t),
        PropValue::Bytes(_) => None,
    }
}

/// Rule for issuer `"public"`: a client never installs a certificate or
/// private key (it trusts the system CA for public services); a server
/// always does.
fn omits_identity(params: &IssuerParams) -> bool {
    params.issuer == "public" && params.role == Role::Client
}

fn build_issuer_tree(view: &SecretView, params: &IssuerParams) -> TreeNode {
    let mut map = TreeNode::map();
    map.insert("@issuer".to_string(), TreeNode::Text(params.issuer.clone()));

    if !omits_identity(params) {
        if let Some(cert) = cert_text(view, "tls.crt") {
            map.insert("certificate".to_string(), TreeNode::Text(cert));
        }
        if let Some(key) = cert_text(view, "tls.key") {
            map.insert("privatekey".to_string(), TreeNode::Text(key));
        }
    }

    let mut verify = TreeNode::map();
    if let Some(ca) = cert_text(view, "ca.crt") {
        let mut ca_certificates = TreeNode::map();
        ca_certificates.insert("pem".to_string(), TreeNode::Text(ca));
        verify.insert("ca_certificates".to_string(), TreeNode::Map(ca_certificates));
    }

    let enabled = !omits_identity(params) && !params.disable_mtls;
    verify.insert("@enable".to_string(), TreeNode::Bool(enabled));
    verify.insert("@address_match".to_string(), TreeNode::Bool(false));
    if params.role == Role::Client && params.accept_selfsigned {
        verify.insert("@accept_selfsigned".to_string(), TreeNode::Bool(true));
    }
    let trusted_peers = match &params.trusted_peers {
        Some(list) => TreeNode::List(list.iter().cloned().map(TreeNode::Text).collect()),
        None => TreeNode::Text("anyone".to_string()),
    };
    verify.insert("trusted_peers".to_string(), trusted_peers);

    map.insert("verify".to_string(), TreeNode::Map(verify));
    TreeNode::Map(map)
}

fn build_storage_tree(view: &SecretView, _params: &StorageParams) -> TreeNode {
    let mut map = TreeNode::map();
    if let Some(cert) = cert_text(view, "tls.crt") {
        map.insert("certificate".to_string(), TreeNode::Text(cert));
    }
    if let Some(key) = cert_text(view, "tls.key") {
        map.insert("privatekey".to_string(), TreeNode::Text(key));
    }
    if let Some(ca) = cert_text(view, "ca.crt") {
        let mut ca_certificates = TreeNode::map();
        ca_certificates.insert("pem".to_string(), TreeNode::Text(ca));
        map.insert("ca_certificates".to_string(), TreeNode::Map(ca_certificates));
    }
    TreeNode::Map(map)
}
