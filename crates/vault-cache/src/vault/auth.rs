//! Vault authentication state machine (spec.md §4.D).

use std::path::Path;
use std::time::{Duration, SystemTime};

use crate::error::ResolutionError;
use crate::http::HttpTransport;
use crate::vault::config::{AuthMode, VaultConfig};

/// Path to the service-account JWT injected by the container runtime —
/// fixed by convention, not configurable (spec.md §6).
const SERVICE_ACCOUNT_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// A vault's mutable, lock-protected authentication state.
#[derive(Debug, Clone, Default)]
pub struct TokenState {
    pub token: Option<String>,
    /// `None` means the token never expires.
    pub expiration: Option<SystemTime>,
    pub renewable: bool,
}

impl TokenState {
    #[must_use]
    pub fn is_expired(&self, now: SystemTime) -> bool {
        match self.expiration {
            Some(exp) => now >= exp,
            None => false,
        }
    }

    #[must_use]
    pub fn needs_login(&self, now: SystemTime) -> bool {
        self.token.is_none() || self.is_expired(now)
    }
}

fn login_body(config: &VaultConfig, category: &str, mount: &Path) -> Result<(String, serde_json::Value), ResolutionError> {
    match &config.auth {
        AuthMode::K8s { role } => {
            let jwt = std::fs::read_to_string(SERVICE_ACCOUNT_TOKEN_PATH).map_err(|e| {
                ResolutionError::Auth(format!("reading service account token: {e}"))
            })?;
            Ok((
                "/v1/auth/kubernetes/login".to_string(),
                serde_json::json!({ "jwt": jwt.trim(), "role": role }),
            ))
        }
        AuthMode::AppRole { id, secret_name } => {
            let secret = crate::local::read_secret(mount, category, secret_name).ok_or_else(|| {
                ResolutionError::Auth(format!("app role secret '{secret_name}' not found"))
            })?;
            let secret_id = secret
                .get("secret-id")
                .and_then(|v| v.as_text().map(str::to_string))
                .ok_or_else(|| ResolutionError::Auth("app role secret missing 'secret-id' key".to_string()))?;
            Ok((
                "/v1/auth/approle/login".to_string(),
                serde_json::json!({ "role_id": id, "secret_id": secret_id }),
            ))
        }
        AuthMode::ClientCert { role } => {
            let cert_dir = mount.join("certificates").join("vaultclient").join(category);
            for file in ["tls.crt", "tls.key"] {
                if !cert_dir.join(file).is_file() {
                    return Err(ResolutionError::Auth(format!(
                        "missing client identity file {}",
                        cert_dir.join(file).display()
                    )));
                }
            }
            Ok(("/v1/auth/cert/login".to_string(), serde_json::json!({ "name": role })))
        }
        AuthMode::Token => Err(ResolutionError::Auth(
            "token auth mode does not log in; a 403 on a static token is terminal".to_string(),
        )),
        AuthMode::Unknown => Err(ResolutionError::Auth("no authentication mode configured".to_string())),
    }
}

fn parse_login_response(body: &[u8]) -> Result<TokenState, ResolutionError> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| ResolutionError::Auth(format!("malformed login response: {e}")))?;

    let token = value
        .pointer("/auth/client_token")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| ResolutionError::Auth("login response missing auth.client_token".to_string()))?
        .to_string();

    let renewable = value
        .pointer("/auth/renewable")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false);

    let lease_duration = value
        .pointer("/auth/lease_duration")
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(0);

    let expiration = if lease_duration == 0 {
        None
    } else {
        Some(SystemTime::now() + Duration::from_secs(lease_duration))
    };

    Ok(TokenState {
        token: Some(token),
        expiration,
        renewable,
    })
}

/// Performs a login for `config`, if its auth mode supports one.
///
/// `AuthMode::Token` never logs in — it builds a [`TokenState`] straight
/// from the configured static token (spec.md §4.D).
///
/// # Errors
/// Returns [`ResolutionError::Auth`] for a missing credential input or
/// malformed response, or [`ResolutionError::BackendUnavailable`] if the
/// transport call itself fails.
pub async fn login(
    config: &VaultConfig,
    category: &str,
    mount: &Path,
    transport: &dyn HttpTransport,
) -> Result<TokenState, ResolutionError> {
    if config.auth == AuthMode::Token {
        let token = config
            .static_token
            .clone()
            .ok_or_else(|| ResolutionError::Auth("token auth mode configured without a static token".to_string()))?;
        return Ok(TokenState {
            token: Some(token),
            expiration: None,
            renewable: false,
        });
    }

    let (path, body) = login_body(config, category, mount)?;
    let origin = config.origin().map_err(ResolutionError::Auth)?;
    let url = format!("{origin}{path}");

    let response = transport
        .post_json(&url, &[], body)
        .await
        .map_err(ResolutionError::BackendUnavailable)?;

    if response.status != 200 {
        return Err(ResolutionError::Auth(format!(
            "login to {url} returned status {}",
            response.status
        )));
    }

    parse_login_response(&response.body)
}
