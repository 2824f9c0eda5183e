// CommandRouter - Routes CLI arguments to appropriate Command
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

use super::{CheckCommand, Command, MonitorCommand};
use crate::{Args, Result};

/// CommandRouter determines which Command to execute based on CLI arguments
///
/// Routing order:
/// 1. Monitoring daemon (--monitor)
/// 2. One-shot check of a single target (default)
pub struct CommandRouter;

impl CommandRouter {
    /// Route CLI arguments to the appropriate Command
    pub fn route(args: Args) -> Result<Box<dyn Command>> {
        Self::validate_routing(&args)?;

        if args.monitoring.enable {
            return Ok(Box::new(MonitorCommand::new(args)));
        }

        if args.target.is_some() {
            return Ok(Box::new(CheckCommand::new(args)));
        }

        anyhow::bail!(
            "No target specified. Use `certexpiry HOST[:PORT]` or `certexpiry --monitor ...`"
        )
    }

    /// Reject argument combinations that no command accepts
    pub fn validate_routing(args: &Args) -> Result<()> {
        let monitoring = &args.monitoring;
        let monitor_options = monitoring.config.is_some()
            || monitoring.domains_file.is_some()
            || !monitoring.domains.is_empty()
            || monitoring.interval.is_some();

        if monitor_options && !monitoring.enable {
            anyhow::bail!(
                "--monitor-config, --monitor-domains, --monitor-domain and --monitor-interval require --monitor"
            );
        }

        if monitoring.enable && (args.output.json || args.output.json_pretty) {
            anyhow::bail!("--json cannot be combined with --monitor");
        }

        if args.port.is_some() && args.target.is_none() {
            anyhow::bail!("--port requires a target");
        }

        Ok(())
    }
}
