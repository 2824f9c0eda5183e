// certexpiry - TLS certificate expiry monitor
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

//! certexpiry periodically reads the leaf certificate of TLS endpoints and
//! reports how many days remain until each one expires.

pub mod certificates;
pub mod cli;
pub mod commands;
pub mod error;
pub mod monitor;
pub mod utils;

// Re-export commonly used types
pub use crate::certificates::{CertificateFetcher, TlsCertificateFetcher};
pub use crate::cli::Args;
pub use crate::error::{FetchError, MonitorError};
pub use crate::monitor::{ExpiryMonitor, PollSettings, Readings, TargetHandle};
pub use crate::utils::clock::{Clock, ManualClock, SystemClock};
pub use crate::utils::network::Target;

/// Result type for certexpiry operations
pub type Result<T> = anyhow::Result<T>;

/// Error type for certexpiry operations
pub use anyhow::Error;
