// Monitoring Daemon - Main orchestration
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

use crate::Result;
use crate::certificates::fetcher::{TlsCertificateFetcher, plural};
use crate::error::MonitorError;
use crate::monitor::config::{MonitorConfig, ThresholdsConfig};
use crate::monitor::inventory::TargetInventory;
use crate::monitor::readings::Readings;
use crate::monitor::registry::{ExpiryMonitor, TargetHandle};
use crate::utils::clock::SystemClock;
use crate::utils::network::Target;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

/// Main monitoring daemon
pub struct MonitorDaemon {
    config: MonitorConfig,
    monitor: Arc<ExpiryMonitor>,
    inventory: Mutex<TargetInventory>,
    supervisors: Mutex<Vec<JoinHandle<()>>>,
    running: Arc<AtomicBool>,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl MonitorDaemon {
    /// Create a daemon probing real endpoints with the system clock
    pub fn new(config: MonitorConfig) -> Result<Self> {
        let fetcher = match &config.monitor.ca_file {
            Some(path) => TlsCertificateFetcher::with_extra_roots(path)?,
            None => TlsCertificateFetcher::new()?,
        };

        let monitor = ExpiryMonitor::new(
            Arc::new(fetcher),
            Arc::new(SystemClock),
            config.poll_settings(),
        );

        Self::with_monitor(config, Arc::new(monitor))
    }

    /// Create a daemon around an existing monitor
    pub fn with_monitor(config: MonitorConfig, monitor: Arc<ExpiryMonitor>) -> Result<Self> {
        let mut inventory = TargetInventory::new();
        for target in config.targets()? {
            inventory.add(target);
        }

        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            config,
            monitor,
            inventory: Mutex::new(inventory),
            supervisors: Mutex::new(Vec::new()),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx: Arc::new(shutdown_tx),
        })
    }

    /// Load targets from a domains file
    pub async fn load_domains<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let mut inventory = self.inventory.lock().await;
        let added = inventory.load_from_file(path.as_ref())?;
        tracing::info!("Loaded {} targets from {:?}", added, path.as_ref());
        Ok(added)
    }

    /// Add a single target. Returns false for a duplicate.
    ///
    /// While the daemon is running the target is established right away.
    pub async fn add_target(&self, target: Target) -> bool {
        let mut inventory = self.inventory.lock().await;
        if !inventory.add(target.clone()) {
            return false;
        }

        if self.running.load(Ordering::SeqCst) {
            self.spawn_supervisor(target).await;
        }
        true
    }

    pub fn monitor(&self) -> &Arc<ExpiryMonitor> {
        &self.monitor
    }

    /// Install SIGINT/SIGTERM handlers and run until one arrives
    pub async fn start(&self) -> Result<()> {
        self.setup_signal_handlers();
        self.run().await
    }

    /// Establish every configured target and keep them polling until stopped
    pub async fn run(&self) -> Result<()> {
        tracing::info!("Starting certexpiry monitoring daemon");

        let targets = {
            let inventory = self.inventory.lock().await;
            self.running.store(true, Ordering::SeqCst);
            inventory.targets().to_vec()
        };
        let settings = self.monitor.settings();

        tracing::info!("Monitoring {} targets", targets.len());
        tracing::info!(
            "Update interval: {}s, setup retry: {}s, probe timeout: {}s",
            settings.update_interval.as_secs(),
            settings.setup_retry.as_secs(),
            settings.probe_timeout.as_secs()
        );

        for target in targets {
            self.spawn_supervisor(target).await;
        }

        shutdown_requested(&mut self.shutdown_tx.subscribe()).await;

        let tasks = {
            let _inventory = self.inventory.lock().await;
            self.running.store(false, Ordering::SeqCst);
            std::mem::take(&mut *self.supervisors.lock().await)
        };

        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!("Target task failed: {}", e);
            }
        }

        self.monitor.shutdown().await;

        tracing::info!("Monitoring daemon stopped");
        Ok(())
    }

    /// Stop the daemon
    pub fn stop(&self) {
        tracing::info!("Stopping monitoring daemon...");
        self.shutdown_tx.send_replace(true);
    }

    async fn spawn_supervisor(&self, target: Target) {
        let task = tokio::spawn(Self::supervise_target(
            Arc::clone(&self.monitor),
            target,
            self.config.monitor.thresholds.clone(),
            self.shutdown_tx.subscribe(),
        ));
        self.supervisors.lock().await.push(task);
    }

    /// Establish one target, retrying setup while it is unreachable, then
    /// follow its readings
    async fn supervise_target(
        monitor: Arc<ExpiryMonitor>,
        target: Target,
        thresholds: ThresholdsConfig,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let handle = loop {
            if *shutdown_rx.borrow() {
                return;
            }

            match monitor.add(target.clone()).await {
                Ok(handle) => break handle,
                Err(MonitorError::SetupRetry {
                    retry_after,
                    message,
                    ..
                }) => {
                    tracing::warn!(
                        "{} is unreachable ({}), retrying setup in {}s",
                        target,
                        message,
                        retry_after.as_secs()
                    );

                    tokio::select! {
                        _ = tokio::time::sleep(retry_after) => {}
                        _ = shutdown_requested(&mut shutdown_rx) => return,
                    }
                }
                Err(MonitorError::AlreadyMonitored { .. }) => {
                    tracing::debug!("{} is already monitored", target);
                    return;
                }
                Err(e) => {
                    tracing::error!("Giving up on {}: {}", target, e);
                    return;
                }
            }
        };

        let Ok(mut snapshots) = monitor.subscribe(&handle).await else {
            return;
        };

        let mut last = Self::report(&monitor, &handle, &thresholds, None).await;

        loop {
            tokio::select! {
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                _ = shutdown_requested(&mut shutdown_rx) => return,
            }

            match Self::report(&monitor, &handle, &thresholds, last.as_ref()).await {
                Some(readings) => last = Some(readings),
                None => return,
            }
        }
    }

    /// Log changed readings and threshold warnings. None once the target is gone.
    async fn report(
        monitor: &ExpiryMonitor,
        handle: &TargetHandle,
        thresholds: &ThresholdsConfig,
        previous: Option<&Readings>,
    ) -> Option<Readings> {
        let readings = monitor.get_readings(handle).await.ok()?;

        if previous != Some(&readings) {
            tracing::info!(
                "{}: days remaining {}, expires {}, valid: {}, error: {}",
                handle,
                readings.days_remaining.state,
                readings.timestamp.state,
                readings.is_valid(),
                readings.error()
            );
        }

        if readings.is_valid()
            && let Some(&days) = readings.days_remaining.state.value()
            && let Some(threshold) = thresholds.crossed(days)
        {
            tracing::warn!(
                "{}: certificate expires in {} ({} day threshold)",
                handle,
                plural(days, "day"),
                threshold
            );
        }

        Some(readings)
    }

    /// Setup signal handlers for graceful shutdown
    fn setup_signal_handlers(&self) {
        let shutdown_tx = Arc::clone(&self.shutdown_tx);

        tokio::spawn(async move {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{SignalKind, signal};

                let (mut sigterm, mut sigint) =
                    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                        (Ok(term), Ok(int)) => (term, int),
                        (Err(e), _) | (_, Err(e)) => {
                            tracing::error!("Failed to setup signal handlers: {}", e);
                            return;
                        }
                    };

                tokio::select! {
                    _ = sigterm.recv() => {
                        tracing::info!("Received SIGTERM");
                    }
                    _ = sigint.recv() => {
                        tracing::info!("Received SIGINT");
                    }
                }
            }

            #[cfg(not(unix))]
            {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to setup Ctrl+C handler: {}", e);
                    return;
                }

                tracing::info!("Received Ctrl+C");
            }

            shutdown_tx.send_replace(true);
        });
    }

    /// Get daemon statistics
    pub async fn stats(&self) -> DaemonStats {
        let configured_targets = self.inventory.lock().await.len();
        let established_targets = self.monitor.len().await;

        DaemonStats {
            configured_targets,
            established_targets,
            pending_targets: configured_targets.saturating_sub(established_targets),
            running: self.running.load(Ordering::SeqCst),
        }
    }
}

/// Resolves once shutdown has been requested or the sender is gone
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

/// Daemon statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonStats {
    pub configured_targets: usize,
    pub established_targets: usize,
    /// Configured targets still in setup-retry
    pub pending_targets: usize,
    pub running: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificates::fetcher::CertificateFetcher;
    use crate::monitor::config::TargetConfig;
    use crate::monitor::poller::PollSettings;
    use crate::monitor::types::ProbeResult;
    use crate::utils::clock::ManualClock;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct SwitchableFetcher {
        result: std::sync::Mutex<ProbeResult>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CertificateFetcher for SwitchableFetcher {
        async fn fetch(&self, _target: &Target, _timeout: Duration) -> ProbeResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.lock().unwrap().clone()
        }
    }

    fn config_with(hosts: &[&str]) -> MonitorConfig {
        let mut config = MonitorConfig::default();
        config.targets = hosts
            .iter()
            .map(|host| TargetConfig {
                host: host.to_string(),
                port: 443,
            })
            .collect();
        config
    }

    #[tokio::test]
    async fn test_daemon_creation() {
        let daemon = MonitorDaemon::new(MonitorConfig::default());
        assert!(daemon.is_ok());
    }

    #[tokio::test]
    async fn test_daemon_stats() {
        let daemon = MonitorDaemon::new(config_with(&["example.com", "EXAMPLE.com"])).unwrap();

        let stats = daemon.stats().await;
        assert_eq!(stats.configured_targets, 1);
        assert_eq!(stats.established_targets, 0);
        assert_eq!(stats.pending_targets, 1);
        assert!(!stats.running);
    }

    #[tokio::test]
    async fn test_add_target() {
        let daemon = MonitorDaemon::new(MonitorConfig::default()).unwrap();

        assert!(daemon.add_target(Target::new("example.com", 443).unwrap()).await);
        assert!(!daemon.add_target(Target::new("example.com", 443).unwrap()).await);

        let stats = daemon.stats().await;
        assert_eq!(stats.configured_targets, 1);
    }

    #[test]
    fn test_invalid_config_target() {
        assert!(MonitorDaemon::new(config_with(&["bad host"])).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_setup_retry_until_reachable() {
        let fetcher = Arc::new(SwitchableFetcher {
            result: std::sync::Mutex::new(ProbeResult::unreachable("DNS resolution failed")),
            calls: AtomicUsize::new(0),
        });
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let monitor = Arc::new(ExpiryMonitor::new(
            fetcher.clone(),
            Arc::new(ManualClock::new(now)),
            PollSettings::default(),
        ));

        let daemon =
            Arc::new(MonitorDaemon::with_monitor(config_with(&["example.com"]), monitor).unwrap());
        let runner = {
            let daemon = Arc::clone(&daemon);
            tokio::spawn(async move { daemon.run().await })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        let stats = daemon.stats().await;
        assert!(stats.running);
        assert_eq!(stats.pending_targets, 1);

        tokio::time::sleep(Duration::from_secs(45)).await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(daemon.stats().await.established_targets, 0);

        *fetcher.result.lock().unwrap() = ProbeResult::success(now + chrono::Duration::days(100));
        tokio::time::sleep(Duration::from_secs(45)).await;

        let stats = daemon.stats().await;
        assert_eq!(stats.established_targets, 1);
        assert_eq!(stats.pending_targets, 0);

        daemon.stop();
        runner.await.unwrap().unwrap();

        assert!(!daemon.stats().await.running);
        assert!(daemon.monitor().is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_target_added_while_running_is_established() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let fetcher = Arc::new(SwitchableFetcher {
            result: std::sync::Mutex::new(ProbeResult::success(now + chrono::Duration::days(100))),
            calls: AtomicUsize::new(0),
        });
        let monitor = Arc::new(ExpiryMonitor::new(
            fetcher.clone(),
            Arc::new(ManualClock::new(now)),
            PollSettings::default(),
        ));

        let daemon =
            Arc::new(MonitorDaemon::with_monitor(config_with(&["example.com"]), monitor).unwrap());
        let runner = {
            let daemon = Arc::clone(&daemon);
            tokio::spawn(async move { daemon.run().await })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(daemon.stats().await.established_targets, 1);

        assert!(daemon.add_target(Target::new("example.org", 443).unwrap()).await);
        tokio::time::sleep(Duration::from_secs(1)).await;

        let stats = daemon.stats().await;
        assert_eq!(stats.configured_targets, 2);
        assert_eq!(stats.established_targets, 2);
        assert_eq!(stats.pending_targets, 0);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);

        daemon.stop();
        runner.await.unwrap().unwrap();
        assert!(daemon.monitor().is_empty().await);
    }
}
