//! Path validation for sandboxed stores.

use crate::error::{Result, StoreError};
use std::path::{Component, Path, PathBuf};

/// Validates a store-relative path and rejects anything that could step
/// outside the sandbox.
///
/// Paths are validated lexically: absolute paths, `..` components, and
/// null bytes are refused outright instead of being resolved. Store paths
/// are program-generated (hashes, partition folders, generated filenames),
/// so a parent-directory component is always a bug or an attack.
pub fn validate_relative_path(path: &str) -> Result<PathBuf> {
    if path.is_empty() {
        return Err(StoreError::PathValidation {
            path: PathBuf::from(path),
            reason: "path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(StoreError::PathValidation {
            path: PathBuf::from(path),
            reason: "path contains null bytes".to_string(),
        });
    }

    let candidate = Path::new(path);
    if candidate.is_absolute() {
        return Err(StoreError::PathValidation {
            path: candidate.to_path_buf(),
            reason: "absolute paths are not allowed".to_string(),
        });
    }

    let mut clean = PathBuf::new();
    for component in candidate.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(StoreError::PathValidation {
                    path: candidate.to_path_buf(),
                    reason: "parent directory components are not allowed".to_string(),
                });
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(StoreError::PathValidation {
                    path: candidate.to_path_buf(),
                    reason: "path must be relative to the store".to_string(),
                });
            }
        }
    }

    if clean.as_os_str().is_empty() {
        return Err(StoreError::PathValidation {
            path: candidate.to_path_buf(),
            reason: "path resolves to the store root".to_string(),
        });
    }

    Ok(clean)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_simple_and_nested_paths() {
        assert_eq!(
            validate_relative_path("file.jpg").unwrap(),
            PathBuf::from("file.jpg")
        );
        assert_eq!(
            validate_relative_path("0001/abc.jpg").unwrap(),
            PathBuf::from("0001/abc.jpg")
        );
        assert_eq!(
            validate_relative_path("./0001/abc.jpg").unwrap(),
            PathBuf::from("0001/abc.jpg")
        );
    }

    #[test]
    fn rejects_escapes() {
        assert!(validate_relative_path("").is_err());
        assert!(validate_relative_path("../outside.txt").is_err());
        assert!(validate_relative_path("dir/../../outside.txt").is_err());
        assert!(validate_relative_path("/etc/passwd").is_err());
        assert!(validate_relative_path("file\0.txt").is_err());
        assert!(validate_relative_path(".").is_err());
    }
}
