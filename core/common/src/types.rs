//! Common types used throughout quietsync.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Absolute path of the local directory tree under watch.
///
/// Both the watcher and the sync operation take their source from here, so
/// the path is fixed once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct WatchTarget(PathBuf);

impl WatchTarget {
    /// Create a WatchTarget, resolving relative paths against the current
    /// working directory.
    ///
    /// # Preconditions
    /// - `path` must be non-empty
    ///
    /// # Postconditions
    /// - The stored path is absolute
    ///
    /// # Errors
    /// - Returns error if path is empty or cannot be made absolute
    pub fn new(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(crate::Error::InvalidInput(
                "Watch path cannot be empty".to_string(),
            ));
        }
        let absolute = std::path::absolute(path)?;
        Ok(Self(absolute))
    }

    /// Verify that the target exists and is a directory.
    ///
    /// # Errors
    /// - `Error::Config` if the path is missing or is not a directory
    pub fn ensure_directory(&self) -> crate::Result<()> {
        match std::fs::metadata(&self.0) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(crate::Error::Config(format!(
                "{} is not a directory",
                self.0.display()
            ))),
            Err(e) => Err(crate::Error::Config(format!(
                "Cannot access {}: {}",
                self.0.display(),
                e
            ))),
        }
    }

    /// Get the absolute path.
    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for WatchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Opaque identifier of the synchronization destination (e.g. `remote:bucket/dir`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RemoteTarget(String);

impl RemoteTarget {
    /// Create a new RemoteTarget.
    ///
    /// # Errors
    /// - Returns error if the identifier is empty or only whitespace
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(crate::Error::InvalidInput(
                "Remote target cannot be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
