//! [`SyncBackend`] that shells out to `rclone`.

use async_trait::async_trait;
use serde::Serialize;
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::debug;

use quietsync_common::{RemoteTarget, SyncError, WatchTarget};

use crate::executor::SyncBackend;

/// Lines of process output kept in error reports.
const DIAGNOSTIC_LINES: usize = 20;

/// How to invoke rclone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RcloneConfig {
    /// Program name or path of the rclone binary.
    pub binary: String,
    /// Extra flags appended to every `rclone sync` call.
    pub extra_flags: Vec<String>,
}

impl Default for RcloneConfig {
    fn default() -> Self {
        Self {
            binary: "rclone".to_string(),
            extra_flags: Vec::new(),
        }
    }
}

/// Mirrors the watch directory with `rclone sync <source> <dest>`.
#[derive(Debug, Clone, Default)]
pub struct RcloneBackend {
    config: RcloneConfig,
}

impl RcloneBackend {
    /// Create a backend with the given invocation settings.
    pub fn new(config: RcloneConfig) -> Self {
        Self { config }
    }

    async fn run(&self, mut command: Command) -> Result<(), SyncError> {
        debug!("Running {:?}", command.as_std());

        let output = command
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(SyncError::Spawn)?;

        if output.status.success() {
            Ok(())
        } else {
            Err(SyncError::Exit {
                status: output.status.to_string(),
                output: diagnostic(&output),
            })
        }
    }
}

#[async_trait]
impl SyncBackend for RcloneBackend {
    fn name(&self) -> &str {
        "rclone"
    }

    async fn sync(&self, source: &WatchTarget, dest: &RemoteTarget) -> Result<(), SyncError> {
        let mut command = Command::new(&self.config.binary);
        command
            .arg("sync")
            .arg(source.as_path())
            .arg(dest.as_str())
            .args(&self.config.extra_flags);
        self.run(command).await
    }

    async fn verify(&self, dest: &RemoteTarget) -> Result<(), SyncError> {
        let mut command = Command::new(&self.config.binary);
        command.arg("lsd").arg(dest.as_str());
        self.run(command).await
    }
}

/// Tail of stderr, or of stdout when stderr is empty.
fn diagnostic(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let text = if stderr.trim().is_empty() {
        String::from_utf8_lossy(&output.stdout)
    } else {
        stderr
    };

    let lines: Vec<&str> = text.trim().lines().collect();
    let start = lines.len().saturating_sub(DIAGNOSTIC_LINES);
    lines[start..].join("\n")
}
