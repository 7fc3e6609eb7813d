//! Process lifecycle: watcher startup, connectivity gate, the control loop
//! and orderly teardown.

use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use quietsync_common::{Error, RemoteTarget, Result, WatchTarget};

use crate::config::DaemonConfig;
use crate::connectivity::{ConnectivityGate, ConnectivityProbe, TcpProbe};
use crate::debounce::DebounceController;
use crate::executor::{SyncBackend, SyncExecutor};
use crate::marker::ChangeMarker;
use crate::rclone::RcloneBackend;
use crate::sink::ChangeSink;
use crate::watcher::{ChangeSource, FaultReceiver, NotifyWatcher};

/// Why the control loop stopped.
#[derive(Debug)]
pub enum LoopExit {
    /// Shutdown was requested (e.g. Ctrl-C).
    Interrupted,
    /// An unexpected error ended the loop.
    Failed(Error),
}

/// Daemon wired to the real watcher, probe and rclone backend.
pub type DefaultDaemon = Daemon<NotifyWatcher, TcpProbe, RcloneBackend>;

/// Watches a directory tree and syncs it after each quiet period.
pub struct Daemon<W, P, B> {
    watch: WatchTarget,
    remote: RemoteTarget,
    tick_interval: std::time::Duration,
    watcher: W,
    gate: ConnectivityGate<P>,
    executor: SyncExecutor<B>,
    sink: Arc<ChangeSink>,
}

impl DefaultDaemon {
    /// Build a daemon from configuration using the production collaborators.
    ///
    /// # Errors
    /// - `Error::Config` if the configuration is invalid
    pub fn from_config(config: DaemonConfig) -> Result<Self> {
        let watcher = NotifyWatcher::new(config.watcher);
        let probe = TcpProbe::new(config.probe_addr.clone(), config.probe_timeout);
        let backend = RcloneBackend::new(config.rclone.clone());
        Self::new(&config, watcher, probe, backend)
    }
}

impl<W, P, B> Daemon<W, P, B>
where
    W: ChangeSource,
    P: ConnectivityProbe,
    B: SyncBackend,
{
    /// Assemble a daemon from its collaborators.
    ///
    /// # Errors
    /// - `Error::Config` if the configuration is invalid
    pub fn new(config: &DaemonConfig, watcher: W, probe: P, backend: B) -> Result<Self> {
        config.validate()?;

        let marker = Arc::new(ChangeMarker::new());
        let sink = Arc::new(ChangeSink::new(marker.clone()));
        let controller = DebounceController::new(marker, config.quiet_interval);
        let executor = SyncExecutor::new(
            backend,
            config.watch.clone(),
            config.remote.clone(),
            controller,
        );

        Ok(Self {
            watch: config.watch.clone(),
            remote: config.remote.clone(),
            tick_interval: config.tick_interval,
            watcher,
            gate: ConnectivityGate::new(probe, config.probe_interval),
            executor,
            sink,
        })
    }

    /// The sink change notifications are delivered to.
    pub fn sink(&self) -> Arc<ChangeSink> {
        self.sink.clone()
    }

    /// The shared change marker.
    pub fn marker(&self) -> Arc<ChangeMarker> {
        self.sink.marker().clone()
    }

    /// Run until `shutdown` is cancelled or an unexpected error occurs.
    ///
    /// The watcher is started first so changes made while waiting for the
    /// network are not missed. Whatever ends the loop, the watcher is stopped
    /// exactly once before this returns.
    ///
    /// # Errors
    /// - The watcher could not be started; the loop never runs
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<LoopExit> {
        info!("Monitor directory: {}", self.watch);
        info!("Remote sync path: {}", self.remote);

        let faults = self.watcher.start(&self.watch, self.sink.clone())?;
        let exit = self.supervise(faults, &shutdown).await;

        match &exit {
            LoopExit::Interrupted => info!("Interrupted, waiting to exit..."),
            LoopExit::Failed(err) => {
                error!("Unexpected error in sync loop: {:?}", err);
                error!("Error occurred, waiting to exit...");
            }
        }

        self.teardown();
        Ok(exit)
    }

    async fn supervise(&mut self, faults: FaultReceiver, shutdown: &CancellationToken) -> LoopExit {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => return LoopExit::Interrupted,
            attempts = self.gate.wait() => debug!("Connectivity confirmed after {} probe(s)", attempts),
        }

        self.executor.verify_remote().await;
        self.control_loop(faults, shutdown).await
    }

    async fn control_loop(
        &mut self,
        mut faults: FaultReceiver,
        shutdown: &CancellationToken,
    ) -> LoopExit {
        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Sync loop started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return LoopExit::Interrupted,
                fault = faults.recv() => {
                    return LoopExit::Failed(fault.unwrap_or_else(|| {
                        Error::Watcher("Watcher stopped delivering events".to_string())
                    }));
                }
                _ = ticker.tick() => {}
            }

            // Runs outside the select so a shutdown request never cancels an
            // in-flight sync; it is honored on the next iteration.
            if let Some(outcome) = self.executor.tick().await {
                if outcome.is_success() {
                    debug!("Sync finished: {:?}", outcome);
                }
            }
        }
    }

    fn teardown(&mut self) {
        self.sink.close();
        if let Err(e) = self.watcher.stop() {
            warn!("Failed to stop watcher: {}", e);
        }
        info!("Shutdown complete");
    }
}
