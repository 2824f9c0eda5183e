// Expiry Monitor - add/remove/read surface over the per-target pollers
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

use crate::certificates::fetcher::CertificateFetcher;
use crate::error::MonitorError;
use crate::monitor::poller::{ExpiryPoller, MAX_POLL_DURATION, PollSettings, log_probe, probe};
use crate::monitor::readings::Readings;
use crate::monitor::state::ExpiryState;
use crate::monitor::types::{ProbeResult, TargetSnapshot};
use crate::utils::clock::Clock;
use crate::utils::network::Target;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;

/// Opaque reference to an established target
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetHandle {
    target: Target,
}

impl TargetHandle {
    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn identifier(&self) -> String {
        self.target.identifier()
    }
}

impl std::fmt::Display for TargetHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.target)
    }
}

struct TargetEntry {
    handle: TargetHandle,
    snapshot_rx: watch::Receiver<TargetSnapshot>,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Certificate expiry monitor
///
/// Owns one poller task per established target. Dropping the monitor stops
/// every poller at its next wake-up.
pub struct ExpiryMonitor {
    fetcher: Arc<dyn CertificateFetcher>,
    clock: Arc<dyn Clock>,
    settings: PollSettings,
    targets: RwLock<HashMap<String, TargetEntry>>,
}

impl ExpiryMonitor {
    /// Durations above [`MAX_POLL_DURATION`] are capped.
    pub fn new(
        fetcher: Arc<dyn CertificateFetcher>,
        clock: Arc<dyn Clock>,
        settings: PollSettings,
    ) -> Self {
        let bounded = settings.bounded();
        if bounded != settings {
            tracing::warn!(
                "Poll settings capped at {}s: {:?}",
                MAX_POLL_DURATION.as_secs(),
                bounded
            );
        }

        Self {
            fetcher,
            clock,
            settings: bounded,
            targets: RwLock::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    /// Validate `host:port` and establish it
    pub async fn add_target(&self, host: &str, port: u16) -> Result<TargetHandle, MonitorError> {
        let target = Target::new(host, port)?;
        self.add(target).await
    }

    /// Establish a target with one immediate probe
    ///
    /// Fails with `SetupRetry` when that probe is unreachable; nothing is
    /// registered in that case. Any other outcome, certificate errors
    /// included, starts the target's poller.
    pub async fn add(&self, target: Target) -> Result<TargetHandle, MonitorError> {
        let identifier = target.identifier();

        if self.targets.read().await.contains_key(&identifier) {
            return Err(MonitorError::AlreadyMonitored { identifier });
        }

        let result = probe(self.fetcher.as_ref(), &target, self.settings.probe_timeout).await;
        log_probe(&target, &result);

        if let ProbeResult::Failure { kind, message } = &result
            && kind.is_transient()
        {
            return Err(MonitorError::SetupRetry {
                identifier,
                retry_after: self.settings.setup_retry,
                message: message.clone(),
            });
        }

        let now = self.clock.now();
        let snapshot = TargetSnapshot {
            state: ExpiryState::from_probe(&result, now),
            last_probe_time: now,
            probe_count: 1,
        };

        let mut targets = self.targets.write().await;
        if targets.contains_key(&identifier) {
            return Err(MonitorError::AlreadyMonitored { identifier });
        }

        let (snapshot_tx, snapshot_rx) = watch::channel(snapshot);
        let (stop_tx, stop_rx) = watch::channel(false);

        let poller = ExpiryPoller::new(
            target.clone(),
            Arc::clone(&self.fetcher),
            Arc::clone(&self.clock),
            self.settings.clone(),
            snapshot_tx,
            stop_rx,
        );
        let task = tokio::spawn(poller.run());

        let handle = TargetHandle { target };
        if snapshot_rx.borrow().state.is_valid {
            tracing::info!("Monitoring {}", handle);
        } else {
            tracing::info!("Monitoring {} (certificate currently invalid)", handle);
        }

        targets.insert(
            identifier,
            TargetEntry {
                handle: handle.clone(),
                snapshot_rx,
                stop_tx,
                task,
            },
        );

        Ok(handle)
    }

    /// Stop monitoring a target
    ///
    /// A pending tick is cancelled. A probe already in flight runs to
    /// completion and its result is discarded.
    pub async fn remove_target(&self, handle: &TargetHandle) -> Result<(), MonitorError> {
        let entry = self
            .targets
            .write()
            .await
            .remove(&handle.identifier())
            .ok_or_else(|| MonitorError::NotFound {
                identifier: handle.identifier(),
            })?;

        let _ = entry.stop_tx.send(true);
        tracing::info!("Stopped monitoring {}", handle);
        Ok(())
    }

    /// Readings computed against the clock at call time
    pub async fn get_readings(&self, handle: &TargetHandle) -> Result<Readings, MonitorError> {
        let snapshot = self.snapshot(handle).await?;
        Ok(Readings::derive(&snapshot.state, self.clock.now()))
    }

    /// Latest published snapshot of a target
    pub async fn snapshot(&self, handle: &TargetHandle) -> Result<TargetSnapshot, MonitorError> {
        let targets = self.targets.read().await;
        let entry = Self::entry(&targets, handle)?;
        let snapshot = entry.snapshot_rx.borrow().clone();
        Ok(snapshot)
    }

    /// Receiver notified after every applied probe of a target
    pub async fn subscribe(
        &self,
        handle: &TargetHandle,
    ) -> Result<watch::Receiver<TargetSnapshot>, MonitorError> {
        let targets = self.targets.read().await;
        Ok(Self::entry(&targets, handle)?.snapshot_rx.clone())
    }

    pub async fn handles(&self) -> Vec<TargetHandle> {
        let targets = self.targets.read().await;
        let mut handles: Vec<TargetHandle> = targets.values().map(|e| e.handle.clone()).collect();
        handles.sort_by_key(|h| h.identifier());
        handles
    }

    pub async fn handle_for(&self, target: &Target) -> Option<TargetHandle> {
        let targets = self.targets.read().await;
        targets.get(&target.identifier()).map(|e| e.handle.clone())
    }

    pub async fn len(&self) -> usize {
        self.targets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.targets.read().await.is_empty()
    }

    /// Stop every poller and wait for them to exit
    pub async fn shutdown(&self) {
        let entries: Vec<TargetEntry> = self.targets.write().await.drain().map(|(_, e)| e).collect();

        for entry in &entries {
            let _ = entry.stop_tx.send(true);
        }

        for entry in entries {
            if let Err(e) = entry.task.await {
                tracing::error!("Poller for {} failed: {}", entry.handle, e);
            }
        }
    }

    fn entry<'a>(
        targets: &'a HashMap<String, TargetEntry>,
        handle: &TargetHandle,
    ) -> Result<&'a TargetEntry, MonitorError> {
        targets
            .get(&handle.identifier())
            .ok_or_else(|| MonitorError::NotFound {
                identifier: handle.identifier(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::clock::ManualClock;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;
    use std::time::Duration;

    struct StaticFetcher(Mutex<ProbeResult>);

    #[async_trait]
    impl CertificateFetcher for StaticFetcher {
        async fn fetch(&self, _target: &Target, _timeout: Duration) -> ProbeResult {
            self.0.lock().unwrap().clone()
        }
    }

    fn monitor(result: ProbeResult) -> ExpiryMonitor {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        ExpiryMonitor::new(
            Arc::new(StaticFetcher(Mutex::new(result))),
            Arc::new(ManualClock::new(now)),
            PollSettings::default(),
        )
    }

    fn valid() -> ProbeResult {
        ProbeResult::success(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap())
    }

    #[tokio::test]
    async fn test_invalid_target_rejected() {
        let monitor = monitor(valid());
        let err = monitor.add_target("", 443).await.unwrap_err();
        assert!(matches!(err, MonitorError::InvalidTarget { .. }));

        let err = monitor.add_target("example.com", 0).await.unwrap_err();
        assert!(matches!(err, MonitorError::InvalidTarget { .. }));
        assert!(monitor.is_empty().await);
    }

    #[tokio::test]
    async fn test_duplicate_target_rejected() {
        let monitor = monitor(valid());
        monitor.add_target("example.com", 443).await.unwrap();

        let err = monitor.add_target("EXAMPLE.com", 443).await.unwrap_err();
        assert!(matches!(err, MonitorError::AlreadyMonitored { .. }));

        monitor.add_target("example.com", 8443).await.unwrap();
        assert_eq!(monitor.len().await, 2);
        monitor.shutdown().await;
    }

    #[tokio::test]
    async fn test_remove_unknown_handle() {
        let monitor = monitor(valid());
        let handle = monitor.add_target("example.com", 443).await.unwrap();
        monitor.remove_target(&handle).await.unwrap();

        let err = monitor.remove_target(&handle).await.unwrap_err();
        assert!(matches!(err, MonitorError::NotFound { .. }));
        assert!(monitor.get_readings(&handle).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_failure_establishes_target() {
        let monitor = monitor(ProbeResult::unknown("boom"));
        let handle = monitor.add_target("example.com", 443).await.unwrap();

        let snapshot = monitor.snapshot(&handle).await.unwrap();
        assert!(!snapshot.state.is_valid);
        assert_eq!(snapshot.probe_count, 1);
        assert_eq!(
            snapshot.last_probe_time,
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
        );

        let readings = monitor.get_readings(&handle).await.unwrap();
        assert_eq!(readings.error(), "boom");
        assert!(readings.days_remaining.state.is_unavailable());
        monitor.shutdown().await;
    }

    #[tokio::test]
    async fn test_oversized_interval_keeps_poller_running() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let monitor = ExpiryMonitor::new(
            Arc::new(StaticFetcher(Mutex::new(valid()))),
            Arc::new(ManualClock::new(now)),
            PollSettings {
                update_interval: Duration::from_secs(199_999_999_999_999 * 86_400),
                ..PollSettings::default()
            },
        );
        assert_eq!(monitor.settings().update_interval, MAX_POLL_DURATION);

        let handle = monitor.add_target("example.com", 443).await.unwrap();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        {
            let targets = monitor.targets.read().await;
            assert!(!targets[&handle.identifier()].task.is_finished());
        }
        assert!(monitor.get_readings(&handle).await.unwrap().is_valid());
        monitor.shutdown().await;
    }

    #[tokio::test]
    async fn test_handles_sorted() {
        let monitor = monitor(valid());
        monitor.add_target("b.example.com", 443).await.unwrap();
        monitor.add_target("a.example.com", 443).await.unwrap();

        let ids: Vec<String> = monitor.handles().await.iter().map(|h| h.identifier()).collect();
        assert_eq!(ids, vec!["a.example.com:443", "b.example.com:443"]);

        let target = Target::new("a.example.com", 443).unwrap();
        assert!(monitor.handle_for(&target).await.is_some());
        monitor.shutdown().await;
        assert!(monitor.is_empty().await);
    }
}
