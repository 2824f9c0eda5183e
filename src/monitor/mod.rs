// Certificate Expiry Monitoring
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0
//
// Per-target pollers read each endpoint's leaf certificate on a fixed
// interval and publish an expiry state; readings are derived from that state
// on every read. The daemon hosts the monitor: it retries setup for targets
// that are not reachable yet and shuts down on SIGINT/SIGTERM.

pub mod config;
pub mod daemon;
pub mod inventory;
pub mod poller;
pub mod readings;
pub mod registry;
pub mod state;
pub mod types;

// Re-export commonly used types
pub use config::MonitorConfig;
pub use daemon::{DaemonStats, MonitorDaemon};
pub use inventory::{TargetInventory, parse_interval};
pub use poller::PollSettings;
pub use readings::{Reading, Readings};
pub use registry::{ExpiryMonitor, TargetHandle};
pub use state::ExpiryState;
pub use types::{FailureKind, ProbeResult, TargetSnapshot};
