// Target Inventory - Ordered, de-duplicated list of configured targets
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

use crate::Result;
use crate::monitor::poller::MAX_POLL_DURATION;
use crate::utils::network::Target;
use std::collections::HashSet;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Targets the daemon should establish, in configuration order
#[derive(Debug, Default)]
pub struct TargetInventory {
    targets: Vec<Target>,
    seen: HashSet<String>,
}

impl TargetInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a target. Returns false, with a warning, for a duplicate.
    pub fn add(&mut self, target: Target) -> bool {
        if !self.seen.insert(target.identifier()) {
            tracing::warn!("Ignoring duplicate target {}", target);
            return false;
        }
        self.targets.push(target);
        true
    }

    /// Load targets from a domains file
    ///
    /// File format:
    /// ```text
    /// # Comments start with #
    /// example.com
    /// example.com:8443
    /// https://internal.corp.com
    /// ```
    ///
    /// Returns the number of targets added.
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let file = fs::File::open(path.as_ref()).map_err(|e| {
            anyhow::anyhow!("Failed to open domains file {:?}: {}", path.as_ref(), e)
        })?;

        let reader = BufReader::new(file);
        let mut added = 0;

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let line = match line.split_once('#') {
                Some((before, _)) => before.trim(),
                None => line.trim(),
            };

            if line.is_empty() {
                continue;
            }

            let mut parts = line.split_whitespace();
            let Some(input) = parts.next() else {
                continue;
            };
            if parts.next().is_some() {
                tracing::warn!(
                    "Line {}: per-target intervals are not supported, ignoring trailing fields",
                    index + 1
                );
            }

            let target = Target::parse(input).map_err(|e| {
                anyhow::anyhow!("Line {} of {:?}: {}", index + 1, path.as_ref(), e)
            })?;

            if self.add(target) {
                added += 1;
            }
        }

        Ok(added)
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Parse interval string to seconds
///
/// Supported formats:
/// - "30s" - 30 seconds
/// - "5m" - 5 minutes
/// - "12h" - 12 hours
/// - "2d" - 2 days
/// - "3600" - 3600 seconds (plain number)
pub fn parse_interval(interval_str: &str) -> Result<u64> {
    let interval_str = interval_str.trim().to_lowercase();

    let seconds = if let Ok(seconds) = interval_str.parse::<u64>() {
        seconds
    } else {
        let len = interval_str.len();
        if len < 2 {
            return Err(anyhow::anyhow!("Invalid interval format: {}", interval_str));
        }

        let (value, unit) = interval_str.split_at(len - 1);
        let value = value
            .parse::<u64>()
            .map_err(|e| anyhow::anyhow!("Invalid interval value '{}': {}", interval_str, e))?;

        let multiplier = match unit {
            "s" => 1,
            "m" => 60,
            "h" => 3600,
            "d" => 86400,
            _ => {
                return Err(anyhow::anyhow!(
                    "Invalid interval unit: {} (use s, m, h, or d)",
                    unit
                ));
            }
        };

        value
            .checked_mul(multiplier)
            .ok_or_else(|| anyhow::anyhow!("Interval too large: {}", interval_str))?
    };

    if seconds == 0 {
        return Err(anyhow::anyhow!("Interval must be greater than zero"));
    }

    if seconds > MAX_POLL_DURATION.as_secs() {
        return Err(anyhow::anyhow!(
            "Interval too large: {} (maximum is 365d)",
            interval_str
        ));
    }

    Ok(seconds)
}
