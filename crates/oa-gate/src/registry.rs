//! Fork registry implementations
//!
//! - `MemoryForkRegistry`: process-local
//! - `FileForkRegistry`: JSON file that survives restarts

use crate::collaborators::ForkRegistry;
use crate::error::CollaboratorError;
use crate::types::ForkName;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// In-memory fork registry
#[derive(Debug, Default)]
pub struct MemoryForkRegistry {
    fork: RwLock<Option<ForkName>>,
}

impl MemoryForkRegistry {
    /// Empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with a fork
    #[inline]
    #[must_use]
    pub fn with_fork(fork: ForkName) -> Self {
        Self {
            fork: RwLock::new(Some(fork)),
        }
    }
}

impl ForkRegistry for MemoryForkRegistry {
    fn fork_name(&self) -> Option<ForkName> {
        self.fork.read().clone()
    }

    fn set_fork_name(&self, name: &ForkName) -> Result<(), CollaboratorError> {
        *self.fork.write() = Some(name.clone());
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fork_full_name: Option<String>,
}

/// Fork registry persisted as a small JSON document
#[derive(Debug)]
pub struct FileForkRegistry {
    path: PathBuf,
    cached: RwLock<Option<ForkName>>,
}

impl FileForkRegistry {
    /// Open the registry at `path`. A missing file is an empty registry.
    ///
    /// # Errors
    /// `CollaboratorError::Storage` if the file exists but cannot be read
    /// or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CollaboratorError> {
        let path = path.into();
        let cached = match std::fs::read_to_string(&path) {
            Ok(text) => {
                let file: RegistryFile = serde_json::from_str(&text)?;
                // an empty stored name means "no fork", same as absent
                file.fork_full_name.and_then(|name| ForkName::new(name).ok())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => return Err(err.into()),
        };

        tracing::debug!(path = %path.display(), fork = ?cached, "opened fork registry");

        Ok(Self {
            path,
            cached: RwLock::new(cached),
        })
    }

    /// Backing file
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, name: &ForkName) -> Result<(), CollaboratorError> {
        let body = serde_json::to_vec_pretty(&RegistryFile {
            fork_full_name: Some(name.as_str().to_string()),
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl ForkRegistry for FileForkRegistry {
    fn fork_name(&self) -> Option<ForkName> {
        self.cached.read().clone()
    }

    fn set_fork_name(&self, name: &ForkName) -> Result<(), CollaboratorError> {
        let mut cached = self.cached.write();
        self.persist(name)?;
        *cached = Some(name.clone());
        tracing::info!(fork = %name, path = %self.path.display(), "stored fork name");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_registry_roundtrip() {
        let registry = MemoryForkRegistry::new();
        assert_eq!(registry.fork_name(), None);

        let fork = ForkName::new("alice/site-fork").unwrap();
        registry.set_fork_name(&fork).unwrap();
        assert_eq!(registry.fork_name(), Some(fork));
    }

    #[test]
    fn file_registry_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FileForkRegistry::open(dir.path().join("fork.json")).unwrap();
        assert_eq!(registry.fork_name(), None);
    }

    #[test]
    fn file_registry_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("fork.json");

        let fork = ForkName::new("alice/site-fork").unwrap();
        FileForkRegistry::open(&path)
            .unwrap()
            .set_fork_name(&fork)
            .unwrap();

        let reopened = FileForkRegistry::open(&path).unwrap();
        assert_eq!(reopened.fork_name(), Some(fork));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn file_registry_empty_name_is_no_fork() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fork.json");
        std::fs::write(&path, r#"{"fork_full_name": ""}"#).unwrap();

        let registry = FileForkRegistry::open(&path).unwrap();
        assert_eq!(registry.fork_name(), None);
    }

    #[test]
    fn file_registry_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fork.json");
        std::fs::write(&path, "not json").unwrap();

        let err = FileForkRegistry::open(&path).unwrap_err();
        assert!(matches!(err, CollaboratorError::Storage(_)));
    }
}
