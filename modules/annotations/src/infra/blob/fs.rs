use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;

use crate::domain::blob::BlobStore;

/// Blobs as files under a root directory. Keys map to relative paths.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, key: &str) -> anyhow::Result<PathBuf> {
        let rel = Path::new(key);
        let plain = rel
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if key.is_empty() || !plain {
            anyhow::bail!("invalid blob key '{key}'");
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> anyhow::Result<()> {
        let path = self.path_of(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create {}", parent.display()))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        tracing::debug!(path = %path.display(), "blob stored");
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let path = self.path_of(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_creates_nested_dirs_and_get_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());

        store.put("image/7.jpg", vec![1, 2, 3]).await.unwrap();
        assert!(dir.path().join("image/7.jpg").is_file());
        assert_eq!(store.get("image/7.jpg").await.unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(store.get("image/8.jpg").await.unwrap(), None);
    }

    #[tokio::test]
    async fn keys_cannot_escape_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path().join("blobs"));

        assert!(store.put("../evil.jpg", vec![0]).await.is_err());
        assert!(store.put("/etc/evil.jpg", vec![0]).await.is_err());
        assert!(store.get("").await.is_err());
        assert!(!dir.path().join("evil.jpg").exists());
    }
}
