// CLI module - Command line interface and argument parsing
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

use clap::Parser;

// Sub-modules for organized CLI arguments
mod connection_args;
mod monitoring_args;
mod output_args;

// Re-export sub-structs
pub use connection_args::ConnectionArgs;
pub use monitoring_args::MonitoringArgs;
pub use output_args::OutputArgs;

/// certexpiry - TLS certificate expiry monitor
///
/// Without `--monitor`, probes a single target once and prints its readings.
/// With `--monitor`, runs the monitoring daemon over the configured targets.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "certexpiry")]
#[command(version, about = "TLS certificate expiry monitor", long_about = None)]
pub struct Args {
    /// Target to check (host, host:port or https:// URL)
    #[arg(value_name = "URI")]
    pub target: Option<String>,

    /// Port to check (overrides the port in the target)
    #[arg(short = 'p', long = "port", value_name = "PORT")]
    pub port: Option<u16>,

    #[command(flatten)]
    pub monitoring: MonitoringArgs,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}
