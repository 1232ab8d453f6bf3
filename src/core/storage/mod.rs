//! File storage disks
//!
//! A disk is a named storage target with store/delete-by-path operations.
//! [`LocalDisk`] keeps files under a root directory; [`DiskRegistry`] resolves
//! the disk named in configuration.

pub mod local;
pub mod upload;

use std::collections::HashMap;
use std::sync::Arc;

pub use local::LocalDisk;
pub use upload::{UploadPreview, UploadedFile};

use crate::core::profile::ports::StorageDisk;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid storage path: {0}")]
    InvalidPath(String),

    #[error("Unknown storage disk: {0}")]
    UnknownDisk(String),

    #[error("Storage configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Named storage disks
#[derive(Clone, Default)]
pub struct DiskRegistry {
    disks: HashMap<String, Arc<dyn StorageDisk>>,
}

impl DiskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a disk under its own name, replacing any previous one
    pub fn register(mut self, disk: Arc<dyn StorageDisk>) -> Self {
        self.disks.insert(disk.name().to_string(), disk);
        self
    }

    /// Look up a disk by name
    pub fn disk(&self, name: &str) -> Result<Arc<dyn StorageDisk>, StorageError> {
        self.disks
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::UnknownDisk(name.to_string()))
    }

    /// Registered disk names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.disks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_resolves_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let registry = DiskRegistry::new()
            .register(Arc::new(LocalDisk::new("public", dir.path()).unwrap()))
            .register(Arc::new(LocalDisk::new("local", dir.path()).unwrap()));

        assert_eq!(registry.disk("public").unwrap().name(), "public");
        assert_eq!(registry.names(), vec!["local", "public"]);
    }

    #[test]
    fn test_registry_unknown_disk() {
        let registry = DiskRegistry::new();
        let result = registry.disk("s3");
        assert!(matches!(result, Err(StorageError::UnknownDisk(name)) if name == "s3"));
    }

    #[test]
    fn test_storage_error_display() {
        assert_eq!(
            StorageError::UnknownDisk("s3".to_string()).to_string(),
            "Unknown storage disk: s3"
        );
        assert_eq!(
            StorageError::InvalidPath("../x".to_string()).to_string(),
            "Invalid storage path: ../x"
        );
    }
}
