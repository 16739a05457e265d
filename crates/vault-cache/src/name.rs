//! Name validation for categories, secrets, and keys.
//!
//! A name is a sequence of alphanumerics, `.` or `-`; the first and last
//! character must be alphanumeric. Key names additionally allow `_`
//! anywhere. This defends against path traversal (`..`, `/`) and against
//! names that would look odd or dangerous as filesystem path components
//! (leading `-`, trailing `.`).

use crate::error::VaultCacheError;

/// Validates a category or secret name.
///
/// # Errors
/// Returns [`VaultCacheError::InvalidName`] if `name` is empty, contains a
/// character outside `[A-Za-z0-9.-]`, or does not start/end with an
/// alphanumeric character.
pub fn validate_name(name: &str) -> Result<(), VaultCacheError> {
    validate(name, false)
}

/// Validates a key name (same rules as [`validate_name`], plus `_` allowed
/// anywhere).
///
/// # Errors
/// Returns [`VaultCacheError::InvalidName`] under the same conditions as
/// [`validate_name`].
pub fn validate_key(name: &str) -> Result<(), VaultCacheError> {
    validate(name, true)
}

fn validate(name: &str, allow_underscore: bool) -> Result<(), VaultCacheError> {
    let reject = |reason| {
        Err(VaultCacheError::InvalidName {
            name: name.to_string(),
            reason,
        })
    };

    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return reject("empty name");
    };
    if !first.is_ascii_alphanumeric() {
        return reject("must start with an alphanumeric character");
    }

    let is_allowed = |c: char| {
        c.is_ascii_alphanumeric() || c == '.' || c == '-' || (allow_underscore && c == '_')
    };
    if !name.chars().all(is_allowed) {
        return reject("contains a character outside [A-Za-z0-9._-]");
    }

    let last = name.chars().next_back().expect("checked non-empty above");
    if !last.is_ascii_alphanumeric() {
        return reject("must end with an alphanumeric character");
    }

    Ok(())
}

/// A category or secret name that has already been validated.
///
/// Holding a `ValidName` rather than a bare `&str` lets call sites push
/// validation to the edge (once, on the way in) instead of re-checking at
/// every internal use.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValidName(String);

impl ValidName {
    /// Validates and wraps `name`.
    ///
    /// # Errors
    /// Returns [`VaultCacheError::InvalidName`] if `name` fails
    /// [`validate_name`].
    pub fn new(name: impl Into<String>) -> Result<Self, VaultCacheError> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self(name))
    }

    /// Returns the validated name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ValidName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ValidName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
