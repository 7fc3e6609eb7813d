//! Daemon configuration, read from environment variables.

use serde::Serialize;
use std::str::FromStr;
use std::time::Duration;

use quietsync_common::{Error, RemoteTarget, Result, WatchTarget};

use crate::connectivity::{DEFAULT_POLL_INTERVAL, DEFAULT_PROBE_ADDR, DEFAULT_PROBE_TIMEOUT};
use crate::debounce::{DEFAULT_QUIET_INTERVAL, DEFAULT_TICK_INTERVAL};
use crate::rclone::RcloneConfig;
use crate::watcher::WatcherBackend;

/// Local directory to watch (required).
pub const ENV_LOCAL_PATH: &str = "SYNC_PATH_LOCAL";
/// Remote destination (required).
pub const ENV_REMOTE_PATH: &str = "SYNC_PATH_REMOTE";
/// Quiet interval in seconds.
pub const ENV_QUIET_SECS: &str = "SYNC_QUIET_SECS";
/// Control loop tick in milliseconds.
pub const ENV_TICK_MILLIS: &str = "SYNC_TICK_MILLIS";
/// `host:port` probed for connectivity.
pub const ENV_PROBE_ADDR: &str = "SYNC_PROBE_ADDR";
/// Probe timeout in seconds.
pub const ENV_PROBE_TIMEOUT_SECS: &str = "SYNC_PROBE_TIMEOUT_SECS";
/// Pause between failed probes in seconds.
pub const ENV_PROBE_INTERVAL_SECS: &str = "SYNC_PROBE_INTERVAL_SECS";
/// `native` or `poll`.
pub const ENV_WATCHER: &str = "SYNC_WATCHER";
/// Rescan period of the poll watcher in seconds.
pub const ENV_POLL_INTERVAL_SECS: &str = "SYNC_POLL_INTERVAL_SECS";
/// rclone program name or path.
pub const ENV_RCLONE_BINARY: &str = "RCLONE_BINARY";
/// Whitespace separated extra flags for `rclone sync`.
pub const ENV_RCLONE_FLAGS: &str = "RCLONE_FLAGS";

const DEFAULT_POLL_WATCH_INTERVAL: Duration = Duration::from_secs(2);

/// Everything the daemon needs to run.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonConfig {
    /// Directory tree to watch and sync.
    pub watch: WatchTarget,
    /// Sync destination.
    pub remote: RemoteTarget,
    /// Quiet period required before syncing.
    pub quiet_interval: Duration,
    /// How often the control loop re-evaluates.
    pub tick_interval: Duration,
    /// Endpoint probed before the loop starts.
    pub probe_addr: String,
    /// Bound on a single probe.
    pub probe_timeout: Duration,
    /// Pause between failed probes.
    pub probe_interval: Duration,
    /// Watcher implementation.
    pub watcher: WatcherBackend,
    /// rclone invocation.
    pub rclone: RcloneConfig,
}

impl DaemonConfig {
    /// Configuration with default tuning for the given targets.
    pub fn new(watch: WatchTarget, remote: RemoteTarget) -> Self {
        Self {
            watch,
            remote,
            quiet_interval: DEFAULT_QUIET_INTERVAL,
            tick_interval: DEFAULT_TICK_INTERVAL,
            probe_addr: DEFAULT_PROBE_ADDR.to_string(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            probe_interval: DEFAULT_POLL_INTERVAL,
            watcher: WatcherBackend::Native,
            rclone: RcloneConfig::default(),
        }
    }

    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, which maps variable names to
    /// values.
    ///
    /// # Errors
    /// - `Error::Config` if a required variable is missing, a value does not
    ///   parse, or the watch path is not an existing directory
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let local = get(ENV_LOCAL_PATH)
            .ok_or_else(|| Error::Config(format!("{} is not set", ENV_LOCAL_PATH)))?;
        let remote = get(ENV_REMOTE_PATH)
            .ok_or_else(|| Error::Config(format!("{} is not set", ENV_REMOTE_PATH)))?;

        let watch = WatchTarget::new(local.trim())
            .map_err(|e| Error::Config(format!("{}: {}", ENV_LOCAL_PATH, e)))?;
        watch.ensure_directory()?;
        let remote = RemoteTarget::new(remote)
            .map_err(|e| Error::Config(format!("{}: {}", ENV_REMOTE_PATH, e)))?;

        let mut config = Self::new(watch, remote);

        if let Some(v) = get(ENV_QUIET_SECS) {
            config.quiet_interval = Duration::from_secs(parse(ENV_QUIET_SECS, &v)?);
        }
        if let Some(v) = get(ENV_TICK_MILLIS) {
            config.tick_interval = Duration::from_millis(parse(ENV_TICK_MILLIS, &v)?);
        }
        if let Some(v) = get(ENV_PROBE_ADDR) {
            config.probe_addr = v.trim().to_string();
        }
        if let Some(v) = get(ENV_PROBE_TIMEOUT_SECS) {
            config.probe_timeout = Duration::from_secs(parse(ENV_PROBE_TIMEOUT_SECS, &v)?);
        }
        if let Some(v) = get(ENV_PROBE_INTERVAL_SECS) {
            config.probe_interval = Duration::from_secs(parse(ENV_PROBE_INTERVAL_SECS, &v)?);
        }

        let poll_interval = match get(ENV_POLL_INTERVAL_SECS) {
            Some(v) => Duration::from_secs(parse(ENV_POLL_INTERVAL_SECS, &v)?),
            None => DEFAULT_POLL_WATCH_INTERVAL,
        };
        config.watcher = match get(ENV_WATCHER).as_deref().map(str::trim) {
            None | Some("native") => WatcherBackend::Native,
            Some("poll") => WatcherBackend::Poll {
                interval: poll_interval,
            },
            Some(other) => {
                return Err(Error::Config(format!(
                    "{} must be \"native\" or \"poll\", got {:?}",
                    ENV_WATCHER, other
                )))
            }
        };

        if let Some(v) = get(ENV_RCLONE_BINARY) {
            config.rclone.binary = v.trim().to_string();
        }
        if let Some(v) = get(ENV_RCLONE_FLAGS) {
            config.rclone.extra_flags = v.split_whitespace().map(String::from).collect();
        }

        config.validate()?;
        Ok(config)
    }

    /// Check invariants between fields.
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval.is_zero() {
            return Err(Error::Config("Tick interval must be positive".to_string()));
        }
        if self.probe_timeout.is_zero() {
            return Err(Error::Config("Probe timeout must be positive".to_string()));
        }
        if self.probe_interval.is_zero() {
            return Err(Error::Config("Probe interval must be positive".to_string()));
        }
        if let WatcherBackend::Poll { interval } = self.watcher {
            if interval.is_zero() {
                return Err(Error::Config("Poll interval must be positive".to_string()));
            }
        }
        Ok(())
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("{} has invalid value {:?}: {}", key, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().to_string_lossy().to_string();
        let config = DaemonConfig::from_lookup(lookup(&[
            (ENV_LOCAL_PATH, local.as_str()),
            (ENV_REMOTE_PATH, "gdrive:notes"),
        ]))
        .unwrap();

        assert_eq!(config.watch.as_path(), dir.path());
        assert_eq!(config.remote.as_str(), "gdrive:notes");
        assert_eq!(config.quiet_interval, Duration::from_secs(120));
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.probe_addr, "8.8.8.8:443");
        assert_eq!(config.probe_timeout, Duration::from_secs(5));
        assert_eq!(config.probe_interval, Duration::from_secs(10));
        assert_eq!(config.watcher, WatcherBackend::Native);
        assert_eq!(config.rclone, RcloneConfig::default());
    }

    #[test]
    fn test_missing_required_values() {
        let err = DaemonConfig::from_lookup(lookup(&[(ENV_REMOTE_PATH, "gdrive:notes")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains(ENV_LOCAL_PATH)));

        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().to_string_lossy().to_string();
        let err = DaemonConfig::from_lookup(lookup(&[
            (ENV_LOCAL_PATH, local.as_str()),
            (ENV_REMOTE_PATH, "  "),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains(ENV_REMOTE_PATH)));
    }

    #[test]
    fn test_watch_path_must_be_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope").to_string_lossy().to_string();
        let err = DaemonConfig::from_lookup(lookup(&[
            (ENV_LOCAL_PATH, missing.as_str()),
            (ENV_REMOTE_PATH, "gdrive:notes"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().to_string_lossy().to_string();
        let config = DaemonConfig::from_lookup(lookup(&[
            (ENV_LOCAL_PATH, local.as_str()),
            (ENV_REMOTE_PATH, "s3:bucket/docs"),
            (ENV_QUIET_SECS, "30"),
            (ENV_TICK_MILLIS, "250"),
            (ENV_PROBE_ADDR, "1.1.1.1:53"),
            (ENV_WATCHER, "poll"),
            (ENV_POLL_INTERVAL_SECS, "7"),
            (ENV_RCLONE_BINARY, "/usr/local/bin/rclone"),
            (ENV_RCLONE_FLAGS, "--fast-list  --transfers 8"),
        ]))
        .unwrap();

        assert_eq!(config.quiet_interval, Duration::from_secs(30));
        assert_eq!(config.tick_interval, Duration::from_millis(250));
        assert_eq!(config.probe_addr, "1.1.1.1:53");
        assert_eq!(
            config.watcher,
            WatcherBackend::Poll {
                interval: Duration::from_secs(7)
            }
        );
        assert_eq!(config.rclone.binary, "/usr/local/bin/rclone");
        assert_eq!(
            config.rclone.extra_flags,
            vec!["--fast-list", "--transfers", "8"]
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().to_string_lossy().to_string();

        for (key, value) in [
            (ENV_QUIET_SECS, "two minutes"),
            (ENV_TICK_MILLIS, "0"),
            (ENV_WATCHER, "fanotify"),
            (ENV_PROBE_INTERVAL_SECS, "-1"),
            (ENV_PROBE_TIMEOUT_SECS, "0"),
        ] {
            let result = DaemonConfig::from_lookup(lookup(&[
                (ENV_LOCAL_PATH, local.as_str()),
                (ENV_REMOTE_PATH, "gdrive:notes"),
                (key, value),
            ]));
            assert!(
                matches!(result, Err(Error::Config(_))),
                "{key}={value} should be rejected"
            );
        }
    }
}
