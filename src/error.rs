// Error types for certexpiry
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0
//
// FetchError is converted into a ProbeResult at the fetcher boundary, so probe
// failures never propagate past the poller. MonitorError is what the monitor
// surface returns to its host.

use crate::monitor::types::{FailureKind, ProbeResult};
use std::time::Duration;
use thiserror::Error;

/// Classified failure of a single certificate fetch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Unreachable,
            message: message.into(),
        }
    }

    pub fn cert_error(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::CertError,
            message: message.into(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Unknown,
            message: message.into(),
        }
    }
}

impl From<FetchError> for ProbeResult {
    fn from(err: FetchError) -> Self {
        ProbeResult::Failure {
            kind: err.kind,
            message: err.message,
        }
    }
}

/// Errors returned by the `ExpiryMonitor` surface
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Target could not be parsed or is malformed
    #[error("Invalid target '{input}': {reason}")]
    InvalidTarget { input: String, reason: String },

    /// A target with the same host:port key is already being monitored
    #[error("Target {identifier} is already monitored")]
    AlreadyMonitored { identifier: String },

    /// No monitored target matches the handle
    #[error("Target {identifier} is not monitored")]
    NotFound { identifier: String },

    /// The first probe could not reach the target; the host should retry setup
    #[error("Target {identifier} is unreachable, retry setup in {retry_after:?}: {message}")]
    SetupRetry {
        identifier: String,
        retry_after: Duration,
        message: String,
    },
}

impl MonitorError {
    /// Whether the host should schedule another setup attempt
    pub fn is_setup_retry(&self) -> bool {
        matches!(self, MonitorError::SetupRetry { .. })
    }

    /// Delay before the next setup attempt, if this is a setup-retry signal
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            MonitorError::SetupRetry { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_retry_accessors() {
        let err = MonitorError::SetupRetry {
            identifier: "example.com:443".to_string(),
            retry_after: Duration::from_secs(45),
            message: "DNS resolution failed".to_string(),
        };

        assert!(err.is_setup_retry());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(45)));
        assert!(err.to_string().contains("example.com:443"));
    }

    #[test]
    fn test_fetch_error_into_probe_result() {
        let result: ProbeResult = FetchError::cert_error("invalid peer certificate: Expired").into();
        assert_eq!(
            result,
            ProbeResult::Failure {
                kind: FailureKind::CertError,
                message: "invalid peer certificate: Expired".to_string(),
            }
        );
    }

    #[test]
    fn test_other_errors_are_not_retry() {
        let err = MonitorError::NotFound {
            identifier: "example.com:443".to_string(),
        };

        assert!(!err.is_setup_retry());
        assert_eq!(err.retry_after(), None);
        assert_eq!(err.to_string(), "Target example.com:443 is not monitored");
    }
}
