//! Profile table loading.

use crate::error::{ProfileError, Result};
use crate::model::ProfileTable;
use std::path::Path;

/// Default profile table location, relative to the working directory.
pub const DEFAULT_PROFILES_FILE: &str = "user_profiles.json";

/// Load and parse the profile table at `path`.
pub fn load_table(path: &Path) -> Result<ProfileTable> {
    let bytes = std::fs::read(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ProfileError::NotFound(path.to_path_buf())
        } else {
            ProfileError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    serde_json::from_slice(&bytes).map_err(|source| ProfileError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let err = load_table(&dir.path().join("user_profiles.json")).unwrap_err();
        assert!(matches!(err, ProfileError::NotFound(_)));
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("user_profiles.json");
        std::fs::write(&path, "{ users: ").unwrap();
        assert!(matches!(load_table(&path), Err(ProfileError::Parse { .. })));
    }

    #[test]
    fn test_load_valid_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("user_profiles.json");
        std::fs::write(&path, r#"{"users": {"Andii": {"todo": {"enabled": true}}}}"#).unwrap();

        let table = load_table(&path).unwrap();
        assert_eq!(table.users.len(), 1);
        assert!(table.default.is_none());
    }
}
