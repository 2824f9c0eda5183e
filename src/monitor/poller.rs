// Expiry Poller - One sequential probe loop per established target
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

use crate::certificates::fetcher::CertificateFetcher;
use crate::monitor::types::{FailureKind, ProbeResult, TargetSnapshot};
use crate::utils::clock::Clock;
use crate::utils::network::Target;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};

/// Longest accepted update interval, setup retry delay or probe timeout
pub const MAX_POLL_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Poll timing shared by every target of a monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    /// Steady-state interval between probes
    pub update_interval: Duration,
    /// Delay the host should wait before retrying a target whose first probe was unreachable
    pub setup_retry: Duration,
    /// Upper bound on a single probe
    pub probe_timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            update_interval: Duration::from_secs(12 * 60 * 60),
            setup_retry: Duration::from_secs(45),
            probe_timeout: Duration::from_secs(10),
        }
    }
}

impl PollSettings {
    /// Copy with every duration capped at [`MAX_POLL_DURATION`]
    pub fn bounded(&self) -> Self {
        Self {
            update_interval: self.update_interval.min(MAX_POLL_DURATION),
            setup_retry: self.setup_retry.min(MAX_POLL_DURATION),
            probe_timeout: self.probe_timeout.min(MAX_POLL_DURATION),
        }
    }
}

/// Run one probe, bounded by `probe_timeout`
///
/// An elapsed bound is reported as an `Unreachable` failure.
pub async fn probe(
    fetcher: &dyn CertificateFetcher,
    target: &Target,
    probe_timeout: Duration,
) -> ProbeResult {
    match timeout(probe_timeout, fetcher.fetch(target, probe_timeout)).await {
        Ok(result) => result,
        Err(_) => ProbeResult::unreachable(format!(
            "Probe of {} timed out after {:?}",
            target, probe_timeout
        )),
    }
}

/// Log a probe outcome at the level its failure class calls for
pub(crate) fn log_probe(target: &Target, result: &ProbeResult) {
    match result {
        ProbeResult::Success { expiry } => {
            tracing::debug!("{}: certificate valid until {}", target, expiry);
        }
        ProbeResult::Failure {
            kind: FailureKind::Unknown,
            message,
        } => {
            tracing::error!("{}: unexpected error while probing: {}", target, message);
        }
        ProbeResult::Failure { kind, message } => {
            tracing::warn!("{}: {}: {}", target, kind, message);
        }
    }
}

/// Steady-state poller for one target
///
/// Sole writer of the target's snapshot channel. Stops when the stop signal
/// flips to true or its sender is dropped.
pub(crate) struct ExpiryPoller {
    target: Target,
    fetcher: Arc<dyn CertificateFetcher>,
    clock: Arc<dyn Clock>,
    settings: PollSettings,
    snapshot_tx: watch::Sender<TargetSnapshot>,
    stop_rx: watch::Receiver<bool>,
}

impl ExpiryPoller {
    pub(crate) fn new(
        target: Target,
        fetcher: Arc<dyn CertificateFetcher>,
        clock: Arc<dyn Clock>,
        settings: PollSettings,
        snapshot_tx: watch::Sender<TargetSnapshot>,
        stop_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            target,
            fetcher,
            clock,
            settings,
            snapshot_tx,
            stop_rx,
        }
    }

    /// Probe every `update_interval` until stopped
    ///
    /// The first tick fires one interval after start; the setup probe has
    /// already produced the initial snapshot.
    pub(crate) async fn run(mut self) {
        let period = self.settings.update_interval;
        let Some(first_tick) = Instant::now().checked_add(period) else {
            tracing::error!(
                "{}: update interval {:?} is out of range, not polling",
                self.target,
                period
            );
            return;
        };
        let mut ticker = interval_at(first_tick, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                changed = self.stop_rx.changed() => {
                    if changed.is_err() || *self.stop_rx.borrow() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            let result = probe(self.fetcher.as_ref(), &self.target, self.settings.probe_timeout).await;

            if self.is_stopped() {
                tracing::debug!("{}: removed during probe, discarding result", self.target);
                break;
            }

            self.apply(result);
        }

        tracing::debug!("{}: poller stopped", self.target);
    }

    fn is_stopped(&self) -> bool {
        *self.stop_rx.borrow() || self.stop_rx.has_changed().is_err()
    }

    fn apply(&self, result: ProbeResult) {
        let now = self.clock.now();
        log_probe(&self.target, &result);

        let target = &self.target;
        self.snapshot_tx.send_modify(|snapshot| {
            let was_valid = snapshot.state.is_valid;

            if snapshot.state.apply(&result, now) && was_valid != snapshot.state.is_valid {
                if snapshot.state.is_valid {
                    tracing::info!("{}: certificate is valid again", target);
                } else {
                    tracing::info!(
                        "{}: certificate is no longer valid: {}",
                        target,
                        snapshot.state.error.as_deref().unwrap_or("unknown error")
                    );
                }
            }

            snapshot.last_probe_time = now;
            snapshot.probe_count += 1;
        });
    }
}
