//! Synced views: live handles over cache entries (spec.md §4.G).
//!
//! Expressed as a capability set rather than a class hierarchy — two
//! concrete types ([`secret_view::SecretView`],
//! [`cert_view::CertificateView`]) implement the same small trait instead of
//! one inheriting from the other, per spec.md §9's design note.

pub mod cert_view;
pub mod secret_view;

use std::collections::HashMap;

/// A property value as returned by [`SyncedView::get_prop`]: either raw
/// bytes or, when the value happens to decode as UTF-8 text, a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropValue {
    Bytes(Vec<u8>),
    Text(String),
}

impl PropValue {
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => Self::Text(text),
            Err(err) => Self::Bytes(err.into_bytes()),
        }
    }
}

/// A small JSON-shaped tree, used for the derived TLS/mTLS config trees
/// (spec.md §4.G) as well as a raw secret's flat key→value tree.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    Text(String),
    Bool(bool),
    List(Vec<TreeNode>),
    Map(HashMap<String, TreeNode>),
}

impl TreeNode {
    #[must_use]
    pub fn map() -> HashMap<String, TreeNode> {
        HashMap::new()
    }
}

/// The capability set every synced view implements (spec.md §4.G / §9):
/// get the whole tree, get one property, and three freshness queries.
pub trait SyncedView {
    fn get_tree(&self) -> TreeNode;
    fn get_prop(&self, key: &str) -> Option<PropValue>;
    fn is_stale(&self) -> bool;
    fn is_valid(&self) -> bool;
    fn get_version(&self) -> u32;
}
