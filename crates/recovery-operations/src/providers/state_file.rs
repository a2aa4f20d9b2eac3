use std::fs;
use std::path::Path;

use crate::Result;
use crate::error::OperationError;

pub(crate) fn load_toml_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path).map_err(|source| OperationError::StateRead {
        path: path.to_path_buf(),
        source,
    })?;

    let state = toml::from_str(&content).map_err(|source| OperationError::StateParse {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(Some(state))
}

pub(crate) fn save_toml_file<T: serde::Serialize>(
    path: &Path,
    state: &T,
    delete_if_empty: bool,
) -> Result<()> {
    if delete_if_empty {
        remove_if_exists(path).map_err(|source| OperationError::StateWrite {
            path: path.to_path_buf(),
            source,
        })?;
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| OperationError::StateWrite {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let content =
        toml::to_string_pretty(state).map_err(|source| OperationError::StateSerialize {
            path: path.to_path_buf(),
            source,
        })?;
    fs::write(path, content).map_err(|source| OperationError::StateWrite {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(())
}

/// Remove a file, treating an already missing file as success. Returns
/// whether a file was removed.
pub(crate) fn remove_if_exists(path: &Path) -> std::io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        items: Vec<String>,
    }

    #[test]
    fn load_nonexistent_returns_none() -> anyhow::Result<()> {
        let dir = TempDir::new()?;

        let loaded: Option<Sample> = load_toml_file(&dir.path().join("absent.toml"))?;

        assert!(loaded.is_none());
        Ok(())
    }

    #[test]
    fn save_creates_parent_directories() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("nested/state/sample.toml");
        let sample = Sample {
            items: vec!["a".to_string()],
        };

        save_toml_file(&path, &sample, false)?;
        let loaded: Option<Sample> = load_toml_file(&path)?;

        assert_eq!(loaded, Some(sample));
        Ok(())
    }

    #[test]
    fn save_empty_deletes_existing_file() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("sample.toml");
        fs::write(&path, "items = []")?;

        save_toml_file(&path, &Sample { items: Vec::new() }, true)?;

        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn save_empty_without_existing_file_is_ok() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("sample.toml");

        save_toml_file(&path, &Sample { items: Vec::new() }, true)?;

        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn load_invalid_toml_returns_parse_error() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("sample.toml");
        fs::write(&path, "not valid { toml content")?;

        let result: Result<Option<Sample>> = load_toml_file(&path);

        let err = result.expect_err("should fail to parse invalid TOML");
        assert!(
            matches!(err, OperationError::StateParse { .. }),
            "expected StateParse error, got: {err:?}"
        );
        Ok(())
    }

    #[test]
    fn remove_if_exists_reports_whether_file_was_there() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("marker");
        fs::write(&path, "")?;

        assert!(remove_if_exists(&path)?);
        assert!(!remove_if_exists(&path)?);
        Ok(())
    }
}
