// Expiry State - Per-target value derived from probe results
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

use crate::monitor::types::{FailureKind, ProbeResult};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Error recorded when a probe succeeds with a certificate already past `notAfter`
pub const EXPIRED_MESSAGE: &str = "certificate has expired";

/// Expiry state of one target
///
/// Invariants maintained by [`ExpiryState::apply`]:
/// - `is_valid` is true only after a `Success` whose expiry is after the probe time.
/// - Any `Failure` clears `is_valid` and records its message in `error`.
/// - `expiry_timestamp` survives an `Unreachable` failure and is cleared by
///   `CertError` and `Unknown`.
/// - Readings are unavailable after `Unreachable` and `Unknown` failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpiryState {
    pub expiry_timestamp: Option<DateTime<Utc>>,
    pub is_valid: bool,
    pub error: Option<String>,
    /// Class of the most recent failure, `None` after a success
    pub failure: Option<FailureKind>,
}

impl ExpiryState {
    /// Build the state for a freshly established target
    pub fn from_probe(result: &ProbeResult, probe_time: DateTime<Utc>) -> Self {
        let mut state = Self {
            expiry_timestamp: None,
            is_valid: false,
            error: None,
            failure: None,
        };
        state.apply(result, probe_time);
        state
    }

    /// Apply a probe result. Returns whether the state value changed.
    pub fn apply(&mut self, result: &ProbeResult, probe_time: DateTime<Utc>) -> bool {
        let next = match result {
            ProbeResult::Success { expiry } => {
                let is_valid = *expiry > probe_time;
                Self {
                    expiry_timestamp: Some(*expiry),
                    is_valid,
                    error: (!is_valid).then(|| EXPIRED_MESSAGE.to_string()),
                    failure: None,
                }
            }
            ProbeResult::Failure { kind, message } => Self {
                expiry_timestamp: if kind.is_transient() {
                    self.expiry_timestamp
                } else {
                    None
                },
                is_valid: false,
                error: Some(message.clone()),
                failure: Some(*kind),
            },
        };

        if *self == next {
            return false;
        }
        *self = next;
        true
    }

    /// Whether readings can be shown. False after an `Unreachable` or
    /// `Unknown` failure.
    pub fn is_available(&self) -> bool {
        !matches!(
            self.failure,
            Some(FailureKind::Unreachable | FailureKind::Unknown)
        )
    }

    /// Whole days until expiry, clamped at zero
    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        match self.expiry_timestamp {
            Some(expiry) => (expiry - now).num_days().max(0),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn valid_state(days: i64) -> ExpiryState {
        ExpiryState::from_probe(&ProbeResult::success(now() + Duration::days(days)), now())
    }

    #[test]
    fn test_success_in_future_is_valid() {
        let state = valid_state(100);
        assert!(state.is_valid);
        assert_eq!(state.error, None);
        assert_eq!(state.days_remaining(now()), 100);
        assert!(state.is_available());
    }

    #[test]
    fn test_success_in_past_is_invalid() {
        let state = valid_state(-3);
        assert!(!state.is_valid);
        assert_eq!(state.error.as_deref(), Some(EXPIRED_MESSAGE));
        assert_eq!(state.days_remaining(now()), 0);
        assert!(state.expiry_timestamp.is_some());
    }

    #[test]
    fn test_unreachable_keeps_timestamp() {
        let mut state = valid_state(100);
        let expiry = state.expiry_timestamp;

        assert!(state.apply(&ProbeResult::unreachable("connection refused"), now()));

        assert!(!state.is_valid);
        assert_eq!(state.expiry_timestamp, expiry);
        assert_eq!(state.error.as_deref(), Some("connection refused"));
        assert!(!state.is_available());
    }

    #[test]
    fn test_cert_error_clears_timestamp() {
        let mut state = valid_state(100);

        state.apply(&ProbeResult::cert_error("some error"), now());

        assert!(!state.is_valid);
        assert_eq!(state.expiry_timestamp, None);
        assert_eq!(state.error.as_deref(), Some("some error"));
        assert_eq!(state.days_remaining(now()), 0);
        assert!(state.is_available());
    }

    #[test]
    fn test_unknown_clears_state_but_is_unavailable() {
        let mut state = valid_state(100);

        state.apply(&ProbeResult::unknown("unexpected"), now());

        assert!(!state.is_valid);
        assert_eq!(state.expiry_timestamp, None);
        assert_eq!(state.failure, Some(FailureKind::Unknown));
        assert!(!state.is_available());
    }

    #[test]
    fn test_success_restores_validity() {
        let mut state = valid_state(100);
        state.apply(&ProbeResult::unreachable("timed out"), now());

        let new_expiry = now() + Duration::days(99);
        assert!(state.apply(&ProbeResult::success(new_expiry), now()));

        assert!(state.is_valid);
        assert_eq!(state.error, None);
        assert_eq!(state.failure, None);
        assert_eq!(state.expiry_timestamp, Some(new_expiry));
    }

    #[test]
    fn test_identical_results_are_idempotent() {
        let results = [
            ProbeResult::success(now() + Duration::days(10)),
            ProbeResult::cert_error("bad"),
            ProbeResult::unreachable("down"),
        ];

        for result in &results {
            let mut state = valid_state(50);
            state.apply(result, now());
            let before = state.clone();

            assert!(!state.apply(result, now()));
            assert_eq!(state, before);
        }
    }

    #[test]
    fn test_days_remaining_never_negative() {
        let state = valid_state(5);
        for offset in [0, 5, 6, 365, 10_000] {
            assert!(state.days_remaining(now() + Duration::days(offset)) >= 0);
        }
        assert_eq!(state.days_remaining(now() + Duration::days(30)), 0);
    }

    #[test]
    fn test_days_remaining_floors_partial_days() {
        let state = ExpiryState::from_probe(
            &ProbeResult::success(now() + Duration::days(2) + Duration::hours(23)),
            now(),
        );
        assert_eq!(state.days_remaining(now()), 2);
    }
}
