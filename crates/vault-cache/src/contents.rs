//! `Contents`: the key→bytes mapping a secret resolves to (spec.md §3).

use std::collections::HashMap;
use std::sync::Arc;

use zeroize::Zeroize;

/// One value within a [`Contents`] map.
///
/// Wraps the raw bytes so that, when the last `Arc` to a [`Contents`] is
/// dropped, the backing memory for every value is zeroed rather than left
/// to be overwritten by whatever the allocator reuses the page for next —
/// the same hygiene the wider corpus applies to token and password fields.
#[derive(Clone)]
pub struct Value(Arc<ValueInner>);

struct ValueInner(Vec<u8>);

impl Drop for ValueInner {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl Value {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Arc::new(ValueInner(bytes)))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0.0
    }

    /// Decodes the value as UTF-8 text. Returns `None` if the bytes are not
    /// valid UTF-8 — per spec.md §3, "string access decodes as bytes
    /// interpreted as text", callers that need lossy text can fall back to
    /// [`Self::as_bytes`] plus `String::from_utf8_lossy` themselves.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(self.as_bytes()).ok()
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Value").field(&format!("<{} bytes>", self.0.0.len())).finish()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}
impl Eq for Value {}

/// An immutable, reference-counted key→bytes mapping.
///
/// Published once by [`crate::cache::SecretCache::update_contents`] and
/// shared freely across threads thereafter (spec.md §5, "Shared immutable
/// contents"); nothing ever mutates a `Contents` in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Contents(Arc<HashMap<String, Value>>);

impl Contents {
    #[must_use]
    pub fn from_map(map: HashMap<String, Value>) -> Self {
        Self(Arc::new(map))
    }

    /// Returns the value for `key`, or `None` if it is not present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}
