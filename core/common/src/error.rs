//! Common error types for quietsync.

use thiserror::Error;

/// Top-level error type for quietsync operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Required configuration is missing or malformed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The filesystem watcher could not be started or reported a fault.
    #[error("Watcher error: {0}")]
    Watcher(String),

    /// The sync operation failed.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Failure of a single sync attempt.
///
/// Sync failures are always recoverable: the caller re-arms the debounce
/// window and tries again later.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The sync process could not be launched.
    #[error("Failed to launch sync process: {0}")]
    Spawn(#[source] std::io::Error),

    /// The sync process ran but reported failure.
    #[error("Sync process exited with {status}: {output}")]
    Exit {
        /// Rendered exit status (code or terminating signal).
        status: String,
        /// Diagnostic output captured from the process.
        output: String,
    },

    /// Backend-specific failure that is not tied to a child process.
    #[error("Sync backend error: {0}")]
    Backend(String),
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_error_is_transparent() {
        let err: Error = SyncError::Exit {
            status: "exit status: 3".to_string(),
            output: "directory not found".to_string(),
        }
        .into();

        assert_eq!(
            err.to_string(),
            "Sync process exited with exit status: 3: directory not found"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
