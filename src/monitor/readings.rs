// Readings - Derived values exposed to consumers of the monitor
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

use crate::monitor::state::ExpiryState;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use std::fmt;

/// Marker rendered when a reading has no value
pub const UNKNOWN: &str = "unknown";
/// Marker rendered when the target could not be reached on the last probe
pub const UNAVAILABLE: &str = "unavailable";
/// Rendered error attribute when there is no error
pub const NO_ERROR: &str = "None";

/// A reading value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reading<T> {
    Value(T),
    Unknown,
    Unavailable,
}

impl<T> Reading<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Reading::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Reading::Unavailable)
    }
}

/// Rendering of a reading's value
pub trait ReadingValue {
    fn render(&self) -> String;
}

impl ReadingValue for i64 {
    fn render(&self) -> String {
        self.to_string()
    }
}

impl ReadingValue for DateTime<Utc> {
    fn render(&self) -> String {
        self.to_rfc3339_opts(SecondsFormat::AutoSi, false)
    }
}

impl<T: ReadingValue> fmt::Display for Reading<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Value(v) => f.write_str(&v.render()),
            Reading::Unknown => f.write_str(UNKNOWN),
            Reading::Unavailable => f.write_str(UNAVAILABLE),
        }
    }
}

impl<T: ReadingValue> Serialize for Reading<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Side attributes mirrored from the expiry state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadingAttributes {
    /// Last error message, `"None"` when there is none
    pub error: String,
    pub is_valid: bool,
}

impl ReadingAttributes {
    fn from_state(state: &ExpiryState) -> Self {
        Self {
            error: state.error.clone().unwrap_or_else(|| NO_ERROR.to_string()),
            is_valid: state.is_valid,
        }
    }
}

/// Days until the certificate expires
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaysRemainingReading {
    pub state: Reading<i64>,
    pub attributes: ReadingAttributes,
}

/// Absolute expiry instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimestampReading {
    pub state: Reading<DateTime<Utc>>,
    pub attributes: ReadingAttributes,
}

/// Both readings of a target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Readings {
    pub days_remaining: DaysRemainingReading,
    pub timestamp: TimestampReading,
}

impl Readings {
    /// Derive readings from a state at the given instant. Not cached.
    pub fn derive(state: &ExpiryState, now: DateTime<Utc>) -> Self {
        let attributes = ReadingAttributes::from_state(state);

        let (days, timestamp) = if !state.is_available() {
            (Reading::Unavailable, Reading::Unavailable)
        } else {
            match (state.is_valid, state.expiry_timestamp) {
                (true, Some(expiry)) => (
                    Reading::Value(state.days_remaining(now)),
                    Reading::Value(expiry),
                ),
                _ => (Reading::Value(0), Reading::Unknown),
            }
        };

        Self {
            days_remaining: DaysRemainingReading {
                state: days,
                attributes: attributes.clone(),
            },
            timestamp: TimestampReading {
                state: timestamp,
                attributes,
            },
        }
    }

    pub fn is_valid(&self) -> bool {
        self.days_remaining.attributes.is_valid
    }

    pub fn error(&self) -> &str {
        &self.days_remaining.attributes.error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::types::ProbeResult;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_valid_readings() {
        let expiry = now() + Duration::days(100);
        let state = ExpiryState::from_probe(&ProbeResult::success(expiry), now());

        let readings = Readings::derive(&state, now());

        assert_eq!(readings.days_remaining.state, Reading::Value(100));
        assert_eq!(readings.days_remaining.state.to_string(), "100");
        assert_eq!(readings.timestamp.state, Reading::Value(expiry));
        assert_eq!(readings.timestamp.state.to_string(), "2025-06-09T12:00:00+00:00");
        assert_eq!(readings.error(), "None");
        assert!(readings.is_valid());
    }

    #[test]
    fn test_cert_error_readings() {
        let state = ExpiryState::from_probe(&ProbeResult::cert_error("some error"), now());

        let readings = Readings::derive(&state, now());

        assert_eq!(readings.days_remaining.state.to_string(), "0");
        assert_eq!(readings.timestamp.state, Reading::Unknown);
        assert_eq!(readings.timestamp.state.to_string(), "unknown");
        assert_eq!(readings.timestamp.attributes.error, "some error");
        assert!(!readings.is_valid());
    }

    #[test]
    fn test_unreachable_readings_are_unavailable() {
        let mut state =
            ExpiryState::from_probe(&ProbeResult::success(now() + Duration::days(100)), now());
        state.apply(&ProbeResult::unreachable("DNS resolution failed"), now());

        let readings = Readings::derive(&state, now());

        assert!(readings.days_remaining.state.is_unavailable());
        assert!(readings.timestamp.state.is_unavailable());
        assert_eq!(readings.days_remaining.state.to_string(), "unavailable");
        assert!(!readings.is_valid());
        assert_eq!(readings.error(), "DNS resolution failed");
    }

    #[test]
    fn test_readings_recomputed_against_now() {
        let state =
            ExpiryState::from_probe(&ProbeResult::success(now() + Duration::days(10)), now());

        let later = Readings::derive(&state, now() + Duration::days(4));
        assert_eq!(later.days_remaining.state, Reading::Value(6));

        let past_expiry = Readings::derive(&state, now() + Duration::days(40));
        assert_eq!(past_expiry.days_remaining.state, Reading::Value(0));
    }

    #[test]
    fn test_readings_json() {
        let state = ExpiryState::from_probe(&ProbeResult::cert_error("bad"), now());
        let json = serde_json::to_value(Readings::derive(&state, now())).unwrap();

        assert_eq!(json["days_remaining"]["state"], "0");
        assert_eq!(json["timestamp"]["state"], "unknown");
        assert_eq!(json["timestamp"]["attributes"]["is_valid"], false);
    }
}
