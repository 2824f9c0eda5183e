// Certificate monitoring daemon configuration arguments
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

use clap::Args;
use std::path::PathBuf;

/// Certificate monitoring daemon options
///
/// CLI values are merged over the TOML configuration file.
#[derive(Args, Debug, Clone, Default)]
pub struct MonitoringArgs {
    /// Start the monitoring daemon
    #[arg(long = "monitor", id = "monitor_enable")]
    pub enable: bool,

    /// Monitoring configuration file (TOML format)
    #[arg(long = "monitor-config", value_name = "FILE", id = "monitor_config")]
    pub config: Option<PathBuf>,

    /// File with targets to monitor (one host[:port] per line)
    #[arg(long = "monitor-domains", value_name = "FILE")]
    pub domains_file: Option<PathBuf>,

    /// Target to monitor (host[:port]); may be repeated
    #[arg(long = "monitor-domain", value_name = "HOST:PORT")]
    pub domains: Vec<String>,

    /// Interval between probes of an established target (e.g. "30m", "12h", "1d")
    #[arg(long = "monitor-interval", value_name = "INTERVAL")]
    pub interval: Option<String>,
}
