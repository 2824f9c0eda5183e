// Core types for certificate expiry monitoring
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

use crate::monitor::state::ExpiryState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Failure class of a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// DNS, connect refused or timeout. Transient: the last known expiry is kept.
    Unreachable,
    /// TLS handshake or certificate validation failure
    CertError,
    /// Anything unexpected. Clears the state like `CertError`; readings are
    /// unavailable and it is logged at error level
    Unknown,
}

impl FailureKind {
    pub fn is_transient(&self) -> bool {
        matches!(self, FailureKind::Unreachable)
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Unreachable => write!(f, "Unreachable"),
            FailureKind::CertError => write!(f, "Certificate Error"),
            FailureKind::Unknown => write!(f, "Unknown Error"),
        }
    }
}

/// Outcome of a single probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProbeResult {
    Success {
        expiry: DateTime<Utc>,
    },
    Failure {
        kind: FailureKind,
        message: String,
    },
}

impl ProbeResult {
    pub fn success(expiry: DateTime<Utc>) -> Self {
        ProbeResult::Success { expiry }
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::failure(FailureKind::Unreachable, message)
    }

    pub fn cert_error(message: impl Into<String>) -> Self {
        Self::failure(FailureKind::CertError, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::failure(FailureKind::Unknown, message)
    }

    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        ProbeResult::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProbeResult::Success { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            ProbeResult::Success { .. } => None,
            ProbeResult::Failure { kind, .. } => Some(*kind),
        }
    }
}

/// State published by a target's poller after every probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetSnapshot {
    pub state: ExpiryState,
    pub last_probe_time: DateTime<Utc>,
    /// Number of probes applied since the target was established
    pub probe_count: u64,
}
