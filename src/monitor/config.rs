// Monitoring configuration
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

use crate::Result;
use crate::monitor::poller::{MAX_POLL_DURATION, PollSettings};
use crate::utils::network::{DEFAULT_PORT, Target};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main monitoring configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub monitor: MonitorSettings,
    pub targets: Vec<TargetConfig>,
}

/// Monitor settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub update_interval_seconds: u64,
    pub setup_retry_seconds: u64,
    pub probe_timeout_seconds: u64,
    /// Extra PEM trust anchors added to the bundled web PKI roots
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_file: Option<PathBuf>,
    pub thresholds: ThresholdsConfig,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            update_interval_seconds: 43200,
            setup_retry_seconds: 45,
            probe_timeout_seconds: 10,
            ca_file: None,
            thresholds: ThresholdsConfig::default(),
        }
    }
}

/// Expiry warning thresholds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdsConfig {
    pub expiry_30d: bool,
    pub expiry_14d: bool,
    pub expiry_7d: bool,
    pub expiry_1d: bool,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            expiry_30d: true,
            expiry_14d: true,
            expiry_7d: true,
            expiry_1d: true,
        }
    }
}

impl ThresholdsConfig {
    /// Tightest enabled threshold, in days, that `days_remaining` falls within
    pub fn crossed(&self, days_remaining: i64) -> Option<i64> {
        [
            (1, self.expiry_1d),
            (7, self.expiry_7d),
            (14, self.expiry_14d),
            (30, self.expiry_30d),
        ]
        .into_iter()
        .find(|(days, enabled)| *enabled && days_remaining <= *days)
        .map(|(days, _)| days)
    }
}

/// A `[[targets]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl MonitorConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).map_err(|e| {
            anyhow::anyhow!("Failed to read config file {:?}: {}", path.as_ref(), e)
        })?;

        let config: MonitorConfig = toml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML config: {}", e))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_str = toml::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;

        fs::write(path.as_ref(), toml_str).map_err(|e| {
            anyhow::anyhow!("Failed to write config file {:?}: {}", path.as_ref(), e)
        })?;

        Ok(())
    }

    /// Reject zero durations and durations above one year
    pub fn validate(&self) -> Result<()> {
        let settings = &self.monitor;
        for (name, value) in [
            ("update_interval_seconds", settings.update_interval_seconds),
            ("setup_retry_seconds", settings.setup_retry_seconds),
            ("probe_timeout_seconds", settings.probe_timeout_seconds),
        ] {
            if value == 0 {
                anyhow::bail!("monitor.{} must be greater than zero", name);
            }
            if value > MAX_POLL_DURATION.as_secs() {
                anyhow::bail!(
                    "monitor.{} must be at most {} seconds",
                    name,
                    MAX_POLL_DURATION.as_secs()
                );
            }
        }
        Ok(())
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            update_interval: Duration::from_secs(self.monitor.update_interval_seconds),
            setup_retry: Duration::from_secs(self.monitor.setup_retry_seconds),
            probe_timeout: Duration::from_secs(self.monitor.probe_timeout_seconds),
        }
    }

    /// Validated `[[targets]]` entries
    pub fn targets(&self) -> Result<Vec<Target>> {
        self.targets
            .iter()
            .map(|t| Target::new(t.host.as_str(), t.port).map_err(anyhow::Error::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = MonitorConfig::default();
        assert_eq!(config.monitor.update_interval_seconds, 43200);
        assert_eq!(config.monitor.setup_retry_seconds, 45);
        assert_eq!(config.monitor.probe_timeout_seconds, 10);
        assert!(config.monitor.thresholds.expiry_30d);
        assert!(config.targets.is_empty());
        assert_eq!(config.poll_settings(), PollSettings::default());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: MonitorConfig = toml::from_str(
            r#"
            [monitor]
            update_interval_seconds = 3600

            [monitor.thresholds]
            expiry_30d = false

            [[targets]]
            host = "example.com"

            [[targets]]
            host = "internal.example.com"
            port = 8443
            "#,
        )
        .unwrap();

        assert_eq!(config.monitor.update_interval_seconds, 3600);
        assert_eq!(config.monitor.setup_retry_seconds, 45);
        assert!(!config.monitor.thresholds.expiry_30d);
        assert!(config.monitor.thresholds.expiry_14d);

        let targets = config.targets().unwrap();
        assert_eq!(targets[0].identifier(), "example.com:443");
        assert_eq!(targets[1].identifier(), "internal.example.com:8443");
    }

    #[test]
    fn test_invalid_target_entry() {
        let config: MonitorConfig = toml::from_str(
            r#"
            [[targets]]
            host = ""
            "#,
        )
        .unwrap();
        assert!(config.targets().is_err());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[monitor]\nprobe_timeout_seconds = 0").unwrap();
        file.flush().unwrap();

        let err = MonitorConfig::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("probe_timeout_seconds"));
    }

    #[test]
    fn test_oversized_interval_rejected() {
        let mut config = MonitorConfig::default();
        config.monitor.update_interval_seconds = 17_279_999_999_999_913_600;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("update_interval_seconds"));

        config.monitor.update_interval_seconds = MAX_POLL_DURATION.as_secs();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let mut config = MonitorConfig::default();
        config.monitor.ca_file = Some(PathBuf::from("/etc/ssl/internal-ca.pem"));
        config.targets.push(TargetConfig {
            host: "example.com".to_string(),
            port: 443,
        });

        let file = NamedTempFile::new().unwrap();
        config.save_to_file(file.path()).unwrap();

        let loaded = MonitorConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_thresholds_crossed() {
        let thresholds = ThresholdsConfig::default();
        assert_eq!(thresholds.crossed(90), None);
        assert_eq!(thresholds.crossed(30), Some(30));
        assert_eq!(thresholds.crossed(10), Some(14));
        assert_eq!(thresholds.crossed(7), Some(7));
        assert_eq!(thresholds.crossed(0), Some(1));

        let only_week = ThresholdsConfig {
            expiry_30d: false,
            expiry_14d: false,
            expiry_7d: true,
            expiry_1d: false,
        };
        assert_eq!(only_week.crossed(20), None);
        assert_eq!(only_week.crossed(1), Some(7));
    }
}
