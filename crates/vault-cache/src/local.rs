//! Local filesystem secret source (spec.md §4.C).
//!
//! Reads are blocking `std::fs` calls on the caller's thread — the
//! concurrency model (spec.md §5) treats local reads as ordinary blocking
//! I/O, not a background-refreshed async source.

use std::collections::HashMap;
use std::path::Path;

use crate::contents::{Contents, Value};
use crate::name::validate_key;

/// Reads `<mount>/<category>/<name>/` into a [`Contents`] map, one entry per
/// regular file whose name passes key validation.
///
/// Returns `None` if the directory is missing, unreadable, or contains no
/// valid key files — the three cases spec.md §4.C folds into "absent".
#[must_use]
pub fn read_secret(mount: &Path, category: &str, name: &str) -> Option<Contents> {
    let dir = mount.join(category).join(name);
    let canonical_dir = std::fs::canonicalize(&dir).ok()?;

    let entries = std::fs::read_dir(&dir).ok()?;
    let mut map = HashMap::new();

    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Some(key) = file_name.to_str() else {
            continue;
        };
        if validate_key(key).is_err() {
            tracing::warn!(category, name, key, "skipping file with invalid key name");
            continue;
        }

        let path = entry.path();
        // Defense in depth against a mount that contains a symlink pointing
        // outside the secret's own directory — the name validator already
        // blocks `..` in the key itself, this blocks the indirect route.
        if let Ok(canonical_target) = std::fs::canonicalize(&path)
            && !canonical_target.starts_with(&canonical_dir)
        {
            tracing::warn!(category, name, key, "skipping symlink escaping secret directory");
            continue;
        }

        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_file() && !file_type.is_symlink() {
            continue;
        }

        match std::fs::read(&path) {
            Ok(bytes) => {
                map.insert(key.to_string(), Value::new(bytes));
            }
            Err(err) => {
                tracing::warn!(category, name, key, error = %err, "failed to read secret file");
            }
        }
    }

    if map.is_empty() {
        None
    } else {
        Some(Contents::from_map(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn reads_one_file_per_key() {
        let dir = tempfile::tempdir().unwrap();
        let secret_dir = dir.path().join("appA").join("db");
        fs::create_dir_all(&secret_dir).unwrap();
        fs::write(secret_dir.join("password"), b"hunter2").unwrap();

        let contents = read_secret(dir.path(), "appA", "db").unwrap();
        assert_eq!(contents.get("password").unwrap().as_bytes(), b"hunter2");
    }

    #[test]
    fn missing_directory_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_secret(dir.path(), "appA", "missing").is_none());
    }

    #[test]
    fn empty_directory_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let secret_dir = dir.path().join("appA").join("empty");
        fs::create_dir_all(&secret_dir).unwrap();
        assert!(read_secret(dir.path(), "appA", "empty").is_none());
    }

    #[test]
    fn skips_files_with_invalid_key_names() {
        let dir = tempfile::tempdir().unwrap();
        let secret_dir = dir.path().join("appA").join("db");
        fs::create_dir_all(&secret_dir).unwrap();
        fs::write(secret_dir.join("..evil"), b"x").unwrap();
        fs::write(secret_dir.join("password"), b"hunter2").unwrap();

        let contents = read_secret(dir.path(), "appA", "db").unwrap();
        assert_eq!(contents.len(), 1);
        assert!(contents.get("password").is_some());
    }

    #[test]
    fn preserves_binary_values_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let secret_dir = dir.path().join("appA").join("bin");
        fs::create_dir_all(&secret_dir).unwrap();
        fs::write(secret_dir.join("blob"), [0xDE, 0xAD, 0xBE, 0xEF]).unwrap();

        let contents = read_secret(dir.path(), "appA", "bin").unwrap();
        assert_eq!(contents.get("blob").unwrap().as_bytes(), [0xDE, 0xAD, 0xBE, 0xEF]);
    }
}
