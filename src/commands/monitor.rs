// MonitorCommand - Certificate expiry monitoring daemon
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

use super::Command;
use crate::monitor::{MonitorConfig, MonitorDaemon, parse_interval};
use crate::utils::network::Target;
use crate::{Args, Result};
use async_trait::async_trait;
use tracing::info;

/// MonitorCommand runs the monitoring daemon
///
/// Targets come from the `[[targets]]` of `--monitor-config`, the
/// `--monitor-domains` file, every `--monitor-domain` and the positional
/// target, in that order.
pub struct MonitorCommand {
    args: Args,
}

impl MonitorCommand {
    /// Create a new MonitorCommand with the given arguments
    pub fn new(args: Args) -> Self {
        Self { args }
    }

    /// Configuration file (or defaults) with CLI overrides applied
    pub fn config(&self) -> Result<MonitorConfig> {
        let mut config = match &self.args.monitoring.config {
            Some(path) => MonitorConfig::from_file(path)?,
            None => MonitorConfig::default(),
        };

        if let Some(interval) = &self.args.monitoring.interval {
            config.monitor.update_interval_seconds = parse_interval(interval)?;
        }

        if let Some(timeout) = self.args.connection.timeout {
            config.monitor.probe_timeout_seconds = timeout;
        }

        if let Some(ca_file) = &self.args.connection.ca_file {
            config.monitor.ca_file = Some(ca_file.clone());
        }

        config.validate()?;
        Ok(config)
    }

    /// Targets given on the command line
    ///
    /// `--port` applies to the positional target only.
    pub fn cli_targets(&self) -> Result<Vec<Target>> {
        let mut targets = self
            .args
            .monitoring
            .domains
            .iter()
            .map(|input| Target::parse(input).map_err(anyhow::Error::from))
            .collect::<Result<Vec<_>>>()?;

        if let Some(input) = &self.args.target {
            let target = Target::parse(input)?;
            targets.push(match self.args.port {
                Some(port) => Target::new(target.host(), port)?,
                None => target,
            });
        }

        Ok(targets)
    }
}

#[async_trait]
impl Command for MonitorCommand {
    async fn execute(&self) -> Result<()> {
        info!("Starting certificate monitoring daemon");

        let daemon = MonitorDaemon::new(self.config()?)?;

        if let Some(domains_file) = &self.args.monitoring.domains_file {
            daemon.load_domains(domains_file).await?;
        }

        for target in self.cli_targets()? {
            daemon.add_target(target).await;
        }

        if daemon.stats().await.configured_targets == 0 {
            anyhow::bail!(
                "No targets to monitor. Use --monitor-domain, --monitor-domains or [[targets]] in --monitor-config"
            );
        }

        daemon.start().await
    }

    fn name(&self) -> &'static str {
        "MonitorCommand"
    }
}
