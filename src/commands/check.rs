// CheckCommand - One-shot certificate expiry check
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

use super::Command;
use crate::certificates::fetcher::{LeafCertificate, TlsCertificateFetcher, format_expiry_countdown};
use crate::error::FetchError;
use crate::monitor::readings::{Reading, Readings};
use crate::monitor::state::ExpiryState;
use crate::monitor::types::{FailureKind, ProbeResult};
use crate::utils::network::Target;
use crate::{Args, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;

/// CheckCommand probes a single target once and prints its readings
///
/// Exits with an error when the target is unreachable; certificate errors
/// are reported in the readings.
pub struct CheckCommand {
    args: Args,
}

impl CheckCommand {
    /// Create a new CheckCommand with the given arguments
    pub fn new(args: Args) -> Self {
        Self { args }
    }

    /// Target from the positional argument, with `--port` applied
    pub fn target(&self) -> Result<Target> {
        let input = self
            .args
            .target
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No target specified"))?;

        let target = Target::parse(input)?;
        match self.args.port {
            Some(port) => Ok(Target::new(target.host(), port)?),
            None => Ok(target),
        }
    }

    fn fetcher(&self) -> Result<TlsCertificateFetcher> {
        match &self.args.connection.ca_file {
            Some(ca_file) => TlsCertificateFetcher::with_extra_roots(ca_file),
            None => TlsCertificateFetcher::new(),
        }
    }
}

#[async_trait]
impl Command for CheckCommand {
    async fn execute(&self) -> Result<()> {
        let target = self.target()?;
        let fetcher = self.fetcher()?;
        let probe_timeout = self.args.connection.timeout();

        tracing::debug!("Checking {}", target);

        let outcome =
            match tokio::time::timeout(probe_timeout, fetcher.fetch_leaf(&target, probe_timeout))
                .await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(FetchError::unreachable(format!(
                    "Probe of {} timed out after {}s",
                    target,
                    probe_timeout.as_secs()
                ))),
            };

        let report = CheckReport::new(&target, outcome, Utc::now());

        if self.args.output.json || self.args.output.json_pretty {
            let json = if self.args.output.json_pretty {
                serde_json::to_string_pretty(&report)?
            } else {
                serde_json::to_string(&report)?
            };
            println!("{}", json);
        } else {
            println!("{}", report.render_text());
        }

        if report.is_unreachable() {
            anyhow::bail!("{} is unreachable: {}", target, report.readings.error());
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "CheckCommand"
    }
}

/// Result of a one-shot check
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub target: String,
    pub checked_at: DateTime<Utc>,
    pub readings: Readings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<LeafCertificate>,
}

impl CheckReport {
    pub fn new(
        target: &Target,
        outcome: std::result::Result<LeafCertificate, FetchError>,
        now: DateTime<Utc>,
    ) -> Self {
        let (certificate, result) = match outcome {
            Ok(leaf) => {
                let result = ProbeResult::success(leaf.not_after);
                (Some(leaf), result)
            }
            Err(e) => (None, ProbeResult::from(e)),
        };

        let state = ExpiryState::from_probe(&result, now);

        Self {
            target: target.identifier(),
            checked_at: now,
            readings: Readings::derive(&state, now),
            failure: result.failure_kind(),
            certificate,
        }
    }

    pub fn is_unreachable(&self) -> bool {
        self.failure == Some(FailureKind::Unreachable)
    }

    /// Terminal rendering
    pub fn render_text(&self) -> String {
        let readings = &self.readings;
        let mut lines = Vec::new();

        let status = if readings.is_valid() {
            "VALID".green().bold()
        } else if self.is_unreachable() {
            "UNREACHABLE".yellow().bold()
        } else {
            "INVALID".red().bold()
        };

        lines.push(format!("{:<16} {}", "Target:".bold(), self.target));
        lines.push(format!("{:<16} {}", "Status:".bold(), status));

        let days = readings.days_remaining.state.to_string();
        let days = match readings.days_remaining.state {
            Reading::Value(d) if readings.is_valid() && d > 30 => days.green(),
            Reading::Value(d) if readings.is_valid() && d > 7 => days.yellow(),
            _ => days.red(),
        };
        lines.push(format!("{:<16} {}", "Days remaining:".bold(), days));

        let expires = match readings.timestamp.state.value() {
            Some(expiry) => format!(
                "{} ({})",
                readings.timestamp.state,
                format_expiry_countdown(*expiry, self.checked_at)
            ),
            None => readings.timestamp.state.to_string(),
        };
        lines.push(format!("{:<16} {}", "Expires:".bold(), expires));
        lines.push(format!("{:<16} {}", "Error:".bold(), readings.error()));

        if let Some(cert) = &self.certificate {
            lines.push(String::new());
            lines.push(format!("{:<16} {}", "Subject:".bold(), cert.subject));
            lines.push(format!("{:<16} {}", "Issuer:".bold(), cert.issuer));
            lines.push(format!("{:<16} {}", "Serial:".bold(), cert.serial_number));
            lines.push(format!("{:<16} {}", "Not before:".bold(), cert.not_before));
            lines.push(format!("{:<16} {}", "Not after:".bold(), cert.not_after));
            if !cert.san.is_empty() {
                lines.push(format!("{:<16} {}", "SAN:".bold(), cert.san.join(", ")));
            }
        }

        lines.join("\n")
    }
}
