//! Local file system disk

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::core::profile::ports::StorageDisk;
use crate::core::storage::{StorageError, UploadedFile};

/// Disk storing files below a root directory
#[derive(Debug, Clone)]
pub struct LocalDisk {
    name: String,
    root: PathBuf,
}

impl LocalDisk {
    /// Create a disk rooted at an existing directory
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();

        if !root.is_dir() {
            return Err(StorageError::ConfigError(format!(
                "Storage root is not a directory: {}",
                root.display()
            )));
        }

        Ok(Self {
            name: name.into(),
            root,
        })
    }

    /// Create the root directory if needed, then the disk
    pub async fn create(
        name: impl Into<String>,
        root: impl Into<PathBuf>,
    ) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Self::new(name, root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative storage path below the root
    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);

        let is_safe = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));

        if !is_safe {
            return Err(StorageError::InvalidPath(path.to_string()));
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl StorageDisk for LocalDisk {
    fn name(&self) -> &str {
        &self.name
    }

    async fn store(&self, directory: &str, file: &UploadedFile) -> Result<String, StorageError> {
        let directory = directory.trim_matches('/');
        let relative = if directory.is_empty() {
            file.hash_name()
        } else {
            format!("{}/{}", directory, file.hash_name())
        };

        let path = self.resolve(&relative)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::write(&path, file.bytes()).await?;

        tracing::debug!(disk = %self.name, path = %relative, size = file.size(), "Stored file");
        Ok(relative)
    }

    async fn delete(&self, path: &str) -> Result<bool, StorageError> {
        let full = self.resolve(path)?;

        match fs::remove_file(&full).await {
            Ok(()) => {
                tracing::debug!(disk = %self.name, path, "Deleted file");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(disk = %self.name, path, "File to delete does not exist");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let full = self.resolve(path)?;
        Ok(fs::metadata(&full).await.map(|m| m.is_file()).unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png() -> UploadedFile {
        UploadedFile::new(
            "avatar.png",
            Some("image/png"),
            vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A],
        )
    }

    #[test]
    fn test_new_requires_directory() {
        let result = LocalDisk::new("public", "/definitely/not/here");
        assert!(matches!(result, Err(StorageError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_create_makes_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("storage/app/public");

        let disk = LocalDisk::create("public", &root).await.unwrap();
        assert!(disk.root().is_dir());
    }

    #[tokio::test]
    async fn test_store_writes_under_directory() {
        let dir = tempfile::tempdir().unwrap();
        let disk = LocalDisk::new("public", dir.path()).unwrap();

        let path = disk.store("avatars", &png()).await.unwrap();

        assert!(path.starts_with("avatars/"));
        assert!(path.ends_with(".png"));
        assert!(disk.exists(&path).await.unwrap());
        let written = std::fs::read(dir.path().join(&path)).unwrap();
        assert_eq!(written, png().bytes());
    }

    #[tokio::test]
    async fn test_store_twice_gives_distinct_paths() {
        let dir = tempfile::tempdir().unwrap();
        let disk = LocalDisk::new("public", dir.path()).unwrap();

        let first = disk.store("/avatars/", &png()).await.unwrap();
        let second = disk.store("avatars", &png()).await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_delete_existing_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let disk = LocalDisk::new("public", dir.path()).unwrap();
        let path = disk.store("avatars", &png()).await.unwrap();

        assert!(disk.delete(&path).await.unwrap());
        assert!(!disk.exists(&path).await.unwrap());
        assert!(!disk.delete(&path).await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let disk = LocalDisk::new("public", dir.path()).unwrap();

        for path in ["../etc/passwd", "/etc/passwd", "avatars/../../x", ""] {
            assert!(
                matches!(disk.delete(path).await, Err(StorageError::InvalidPath(_))),
                "{path} should be rejected"
            );
        }
    }
}
