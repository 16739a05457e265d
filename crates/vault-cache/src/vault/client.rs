//! Per-vault HTTP client: auth state, retry, fetch (spec.md §4.D).

use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::Mutex;

use crate::error::{ResolutionError, VaultCacheError};
use crate::http::{HttpResponse, HttpTransport};
use crate::vault::auth::{self, TokenState};
use crate::vault::config::{AuthMode, VaultConfig, VaultKind};

/// Owns one vault's authentication state and talks to it over an injected
/// [`HttpTransport`].
///
/// The token lock is a `tokio::sync::Mutex` rather than `std::sync::Mutex`
/// because it must stay held across the `.await`ed login request — this is
/// what makes N concurrent fetches that all find an expired token coalesce
/// onto a single login instead of stampeding it (spec.md §4.D, §5).
pub struct VaultBackend {
    pub config: VaultConfig,
    category: String,
    token: Mutex<TokenState>,
    transport: Arc<dyn HttpTransport>,
}

impl VaultBackend {
    #[must_use]
    pub fn new(config: VaultConfig, category: String, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            config,
            category,
            token: Mutex::new(TokenState::default()),
            transport,
        }
    }

    fn to_auth_error(&self, err: ResolutionError) -> VaultCacheError {
        VaultCacheError::VaultAuthError {
            vault_id: self.config.id.clone(),
            reason: err.to_string(),
        }
    }

    async fn ensure_authenticated(&self, mount: &Path) -> Result<String, ResolutionError> {
        let mut guard = self.token.lock().await;
        if guard.needs_login(SystemTime::now()) {
            *guard = auth::login(&self.config, &self.category, mount, self.transport.as_ref()).await?;
        }
        guard
            .token
            .clone()
            .ok_or_else(|| ResolutionError::Auth("login succeeded without a token".to_string()))
    }

    async fn force_relogin(&self, mount: &Path) -> Result<String, ResolutionError> {
        let mut guard = self.token.lock().await;
        *guard = auth::login(&self.config, &self.category, mount, self.transport.as_ref()).await?;
        guard
            .token
            .clone()
            .ok_or_else(|| ResolutionError::Auth("login succeeded without a token".to_string()))
    }

    fn request_headers(&self, token: &str) -> Vec<(String, String)> {
        let mut headers = vec![("X-Vault-Token".to_string(), token.to_string())];
        if let Some(ns) = &self.config.namespace {
            headers.push(("X-Vault-Namespace".to_string(), ns.clone()));
        }
        headers
    }

    /// Sends one `GET`, retrying only on transport-level (network) failure,
    /// up to `config.retries` additional attempts with `config.retry_wait_ms`
    /// between them. Returns `None` once retries are exhausted.
    async fn get_with_retry(&self, location: &str, token: &str) -> Option<HttpResponse> {
        let headers = self.request_headers(token);
        for attempt in 0..=self.config.retries {
            match self.transport.get(location, &headers).await {
                Ok(resp) => return Some(resp),
                Err(error) => {
                    tracing::warn!(vault_id = %self.config.id, attempt, %error, "vault fetch network failure");
                    if attempt < self.config.retries {
                        tokio::time::sleep(std::time::Duration::from_millis(self.config.retry_wait_ms)).await;
                    }
                }
            }
        }
        tracing::error!(vault_id = %self.config.id, "vault fetch retries exhausted");
        None
    }

    /// Classifies a response's HTTP status into the internal resolution-error
    /// vocabulary. `Ok(())` means the body is ready to use.
    fn classify_status(status: u16) -> Result<(), ResolutionError> {
        match status {
            200 => Ok(()),
            404 => Err(ResolutionError::NotFound),
            403 => Err(ResolutionError::PermissionDenied),
            other => Err(ResolutionError::BackendUnavailable(format!("unexpected status {other}"))),
        }
    }

    /// Fetches `secret` at `version` (or the vault's default) from this
    /// vault.
    ///
    /// Returns `Ok(None)` for every failure that spec.md §7 says must be
    /// absorbed rather than propagated: 404, an unreachable backend, or a
    /// 403 against a re-loginable auth mode that still fails after a forced
    /// re-login. The one exception is `AuthMode::Token`: per spec.md §4.D,
    /// token auth never re-logs in, so a 403 against it is terminal and
    /// surfaces as [`VaultCacheError::VaultAuthError`] (spec.md §7, "403 on
    /// token auth"). The only other `Err` this returns is the same
    /// `VaultAuthError`, when a token could not be obtained at all.
    ///
    /// # Errors
    /// See above.
    pub async fn fetch(
        &self,
        secret: &str,
        version: Option<&str>,
        mount: &Path,
    ) -> Result<Option<(VaultKind, Vec<u8>)>, VaultCacheError> {
        let token = self
            .ensure_authenticated(mount)
            .await
            .map_err(|e| self.to_auth_error(e))?;
        let location = self.config.fetch_location(secret, version);

        let Some(response) = self.get_with_retry(&location, &token).await else {
            return Ok(None);
        };

        match Self::classify_status(response.status) {
            Ok(()) => Ok(Some((self.config.kind, response.body))),
            Err(ResolutionError::NotFound) => {
                tracing::debug!(vault_id = %self.config.id, "vault secret not found");
                Ok(None)
            }
            Err(ResolutionError::PermissionDenied) => {
                if self.config.auth == AuthMode::Token {
                    tracing::error!(vault_id = %self.config.id, "token-auth vault denied request, not retrying");
                    return Err(self.to_auth_error(ResolutionError::PermissionDenied));
                }

                tracing::warn!(vault_id = %self.config.id, "vault denied request, forcing re-login");
                let new_token = self
                    .force_relogin(mount)
                    .await
                    .map_err(|e| self.to_auth_error(e))?;
                let Some(retry) = self.get_with_retry(&location, &new_token).await else {
                    return Ok(None);
                };
                match Self::classify_status(retry.status) {
                    Ok(()) => Ok(Some((self.config.kind, retry.body))),
                    Err(err) => {
                        tracing::error!(vault_id = %self.config.id, status = retry.status, error = %err, "vault denied request after forced re-login");
                        Ok(None)
                    }
                }
            }
            Err(other) => {
                tracing::warn!(vault_id = %self.config.id, status = response.status, error = %other, "unexpected vault fetch status");
                Ok(None)
            }
        }
    }
}

/// Unwraps a raw vault response body by `kind` (spec.md §4.D "Body
/// decoding"): `kv_v1` payload lives at JSON path `data`, `kv_v2` at
/// `data/data`. Any other shape (including the wrong kind for the body)
/// yields `None`.
#[must_use]
pub fn unwrap_body(kind: VaultKind, body: &[u8]) -> Option<serde_json::Value> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    let pointer = match kind {
        VaultKind::KvV1 => "/data",
        VaultKind::KvV2 => "/data/data",
    };
    value.pointer(pointer).cloned()
}
