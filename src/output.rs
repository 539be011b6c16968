//! JSON output files

use crate::error::{Error, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Write `value` as pretty-printed JSON (2-space indent) to `path`.
///
/// The JSON is written to a temporary sibling first and renamed into place,
/// so readers never observe a half-written file.
pub async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::file(parent, e))?;
    }

    let tmp = temp_sibling(path);
    tokio::fs::write(&tmp, &json)
        .await
        .map_err(|e| Error::file(&tmp, e))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        tokio::fs::remove_file(&tmp).await.ok();
        return Err(Error::file(path, e));
    }

    tracing::info!(path = %path.display(), bytes = json.len(), "Output written");
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "output".into());
    name.push(".tmp");
    path.with_file_name(name)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn writes_pretty_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("categories.json");
        let mut table = BTreeMap::new();
        table.insert("575", "digital cameras");

        write_json(&path, &table).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "{\n  \"575\": \"digital cameras\"\n}");
        assert!(!dir.path().join("categories.json.tmp").exists());
    }

    #[tokio::test]
    async fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("catalog.json");
        write_json(&path, &vec!["a", "b"]).await.unwrap();
        let parsed: Vec<String> = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(parsed, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, "old").unwrap();
        write_json(&path, &Vec::<u8>::new()).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
    }

    #[tokio::test]
    async fn unwritable_target_is_file_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory occupies the target name, so the rename fails
        let path = dir.path().join("catalog.json");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), "x").unwrap();

        let result = write_json(&path, &vec![1]).await;
        assert!(matches!(result, Err(Error::File { .. })));
        assert!(!dir.path().join("catalog.json.tmp").exists());
    }
}
