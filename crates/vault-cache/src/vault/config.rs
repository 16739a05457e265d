//! Vault configuration: the static part of [`crate::vault::client::VaultBackend`]
//! (spec.md §3 "Vault", §6 process configuration attributes).

use serde::Deserialize;

/// How a vault's secret body is shaped on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultKind {
    KvV1,
    KvV2,
}

impl Default for VaultKind {
    fn default() -> Self {
        Self::KvV2
    }
}

/// Authentication mode, mirroring spec.md §9's tagged-variant design note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    K8s { role: String },
    AppRole { id: String, secret_name: String },
    Token,
    ClientCert { role: String },
    Unknown,
}

impl AuthMode {
    /// Mirrors the teacher-style `queryAuthType` lookup: the `Unknown` arm
    /// falls through to the same literal the function-level default would
    /// return, preserved per spec.md §9's open question on this exact point.
    #[must_use]
    pub fn query_auth_type(&self) -> &'static str {
        match self {
            AuthMode::K8s { .. } => "k8s",
            AuthMode::AppRole { .. } => "appRole",
            AuthMode::Token => "token",
            AuthMode::ClientCert { .. } => "clientCert",
            AuthMode::Unknown => "unknown",
        }
    }
}

/// Static configuration for one vault (spec.md §6's `vaults/<category>/<vault>`
/// attribute set).
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// The vault id (`@name`), unique within its category.
    pub id: String,
    pub kind: VaultKind,
    /// The fetch location template, containing `${secret}`/`${version}`
    /// placeholders (spec.md §4.D). Also the source of the vault's origin
    /// for auth endpoints.
    pub url_template: String,
    pub namespace: Option<String>,
    pub verify_server: bool,
    pub auth: AuthMode,
    /// Present only for `AuthMode::Token`.
    pub static_token: Option<String>,
    pub retries: u32,
    pub retry_wait_ms: u64,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
}

impl VaultConfig {
    /// The scheme+host(+port) the vault's login endpoints live under,
    /// derived from [`Self::url_template`] rather than duplicated in
    /// configuration.
    ///
    /// # Errors
    /// Returns an error if `url_template` (with placeholders substituted
    /// out) is not a parsable URL.
    pub fn origin(&self) -> Result<String, String> {
        let probe = self
            .url_template
            .replace("${secret}", "x")
            .replace("${version}", "1");
        let parsed = url::Url::parse(&probe).map_err(|e| e.to_string())?;
        let host = parsed.host_str().ok_or("vault url has no host")?;
        match parsed.port() {
            Some(port) => Ok(format!("{}://{host}:{port}", parsed.scheme())),
            None => Ok(format!("{}://{host}", parsed.scheme())),
        }
    }

    /// Substitutes `${secret}` and `${version}` (defaulting to `"1"`) into
    /// [`Self::url_template`].
    #[must_use]
    pub fn fetch_location(&self, secret: &str, version: Option<&str>) -> String {
        self.url_template
            .replace("${secret}", secret)
            .replace("${version}", version.unwrap_or("1"))
    }
}

/// Raw, `serde`-deserializable form of one `vaults/<category>/<vault>` entry
/// (SPEC_FULL.md §11). A process-wide configuration loader (out of scope,
/// spec.md §1) is expected to hand these in after parsing its own source
/// format; this type only owns the JSON shape.
#[derive(Debug, Clone, Deserialize)]
pub struct VaultFileConfig {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub kind: Option<VaultKind>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default = "default_verify_server")]
    pub verify_server: bool,
    #[serde(default)]
    pub retries: Option<u32>,
    #[serde(default)]
    pub retry_wait: Option<u64>,
    #[serde(default)]
    pub connect_timeout: Option<u64>,
    #[serde(default)]
    pub read_timeout: Option<u64>,
    #[serde(default)]
    pub write_timeout: Option<u64>,
    #[serde(default)]
    pub app_role_id: Option<String>,
    #[serde(default)]
    pub app_role_secret: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub use_tls_certificate_auth: bool,
    #[serde(default)]
    pub role: Option<String>,
}

fn default_verify_server() -> bool {
    true
}

const DEFAULT_RETRIES: u32 = 3;
const DEFAULT_RETRY_WAIT_MS: u64 = 500;
const DEFAULT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_APP_ROLE_SECRET: &str = "appRoleSecret";

impl VaultFileConfig {
    /// Resolves the auth mode and builds a [`VaultConfig`].
    ///
    /// Auth precedence: explicit client-cert flag wins, then an app-role id,
    /// then a role (implying k8s), then a bare static token (`@client-secret`),
    /// else `Unknown`.
    #[must_use]
    pub fn into_config(self) -> VaultConfig {
        let static_token = self.client_secret.clone();
        let auth = if self.use_tls_certificate_auth {
            AuthMode::ClientCert {
                role: self.role.clone().unwrap_or_default(),
            }
        } else if let Some(id) = self.app_role_id.clone() {
            AuthMode::AppRole {
                id,
                secret_name: self
                    .app_role_secret
                    .clone()
                    .unwrap_or_else(|| DEFAULT_APP_ROLE_SECRET.to_string()),
            }
        } else if let Some(role) = self.role.clone() {
            AuthMode::K8s { role }
        } else if static_token.is_some() {
            AuthMode::Token
        } else {
            AuthMode::Unknown
        };

        VaultConfig {
            id: self.name,
            kind: self.kind.unwrap_or_default(),
            url_template: self.url,
            namespace: self.namespace,
            verify_server: self.verify_server,
            auth,
            static_token,
            retries: self.retries.unwrap_or(DEFAULT_RETRIES),
            retry_wait_ms: self.retry_wait.unwrap_or(DEFAULT_RETRY_WAIT_MS),
            connect_timeout_ms: self.connect_timeout.unwrap_or(DEFAULT_TIMEOUT_MS),
            read_timeout_ms: self.read_timeout.unwrap_or(DEFAULT_TIMEOUT_MS),
            write_timeout_ms: self.write_timeout.unwrap_or(DEFAULT_TIMEOUT_MS),
        }
    }
}

/// Top-level `vaults/*` configuration tree: category name to the vaults
/// configured under it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VaultCacheConfig {
    pub vaults: std::collections::HashMap<String, Vec<VaultFileConfig>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_falls_through_to_literal_unknown() {
        assert_eq!(AuthMode::Unknown.query_auth_type(), "unknown");
    }

    #[test]
    fn origin_strips_path_and_placeholders() {
        let cfg = VaultFileConfig {
            name: "primary".into(),
            url: "https://vault.internal:8200/v1/secret/data/${secret}?version=${version}".into(),
            kind: None,
            namespace: None,
            verify_server: true,
            retries: None,
            retry_wait: None,
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
            app_role_id: None,
            app_role_secret: None,
            client_secret: None,
            use_tls_certificate_auth: false,
            role: Some("app".into()),
        }
        .into_config();

        assert_eq!(cfg.origin().unwrap(), "https://vault.internal:8200");
        assert_eq!(
            cfg.fetch_location("db-password", Some("3")),
            "https://vault.internal:8200/v1/secret/data/db-password?version=3"
        );
    }

    #[test]
    fn defaults_to_kv_v2() {
        let cfg = VaultFileConfig {
            name: "v".into(),
            url: "https://h/v1/secret/data/${secret}".into(),
            kind: None,
            namespace: None,
            verify_server: true,
            retries: None,
            retry_wait: None,
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
            app_role_id: None,
            app_role_secret: None,
            client_secret: None,
            use_tls_certificate_auth: false,
            role: None,
        }
        .into_config();
        assert_eq!(cfg.kind, VaultKind::KvV2);
        assert_eq!(cfg.auth, AuthMode::Unknown);
    }

    #[test]
    fn app_role_defaults_secret_name() {
        let cfg = VaultFileConfig {
            name: "v".into(),
            url: "https://h/v1/secret/data/${secret}".into(),
            kind: None,
            namespace: None,
            verify_server: true,
            retries: None,
            retry_wait: None,
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
            app_role_id: Some("role-id".into()),
            app_role_secret: None,
            client_secret: None,
            use_tls_certificate_auth: false,
            role: None,
        }
        .into_config();
        assert_eq!(
            cfg.auth,
            AuthMode::AppRole {
                id: "role-id".into(),
                secret_name: "appRoleSecret".into()
            }
        );
    }
}
