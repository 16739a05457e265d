//! Error types returned by this crate.
//!
//! Three kinds of failure are allowed to reach a caller: a malformed
//! name/identifier (`InvalidName`), an inability to authenticate against a
//! vault (`VaultAuthError`) — including a 403 against a `token`-auth vault,
//! which never re-logs in and so cannot recover on retry — and a required
//! value that turned out to be absent (`RequiredValueMissing`). Everything
//! else — a missing local file, a vault returning 404, a backend that is
//! simply down — is absorbed inside the cache layer and surfaces as an
//! absent value or stale-but-valid contents instead of an error (see
//! [`crate::cache::SecretCache`]).

use thiserror::Error;

/// Errors that can escape the crate's public API.
#[derive(Debug, Error)]
pub enum VaultCacheError {
    /// A category, secret, or key name failed validation.
    #[error("invalid name '{name}': {reason}")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A vault could not be authenticated against.
    #[error("vault '{vault_id}' authentication failed: {reason}")]
    VaultAuthError {
        /// Identifier of the vault that failed to authenticate.
        vault_id: String,
        /// Human-readable reason.
        reason: String,
    },

    /// `getSecretValue(..., required = true)` was called and the secret or
    /// key does not exist.
    #[error("required secret '{category}/{name}' key '{key}' not found")]
    RequiredValueMissing {
        /// Category the secret lives under.
        category: String,
        /// Secret name.
        name: String,
        /// Key within the secret.
        key: String,
    },
}

/// Result alias for this crate's public API.
pub type Result<T> = std::result::Result<T, VaultCacheError>;

/// Internal resolution failures. These never cross a public API boundary —
/// they are folded into `Option` (absent) or a retained stale value before
/// a caller ever sees them, per the error-handling design in SPEC_FULL.md
/// §7. Kept as a distinct type so backend/local-source code has a rich
/// enough vocabulary to log precisely without widening the public error
/// surface.
#[derive(Debug, Error, Clone)]
pub(crate) enum ResolutionError {
    /// Local directory missing, vault 404, or no vault matched.
    #[error("not found")]
    NotFound,

    /// Network failure after retries, or an unexpected HTTP status.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A 403 against a vault: either token auth, which never re-logs in, or
    /// a re-loginable auth mode whose 403 survived a forced re-login.
    #[error("permission denied")]
    PermissionDenied,

    /// Authentication itself failed (missing config, bad login response).
    #[error("auth error: {0}")]
    Auth(String),
}
