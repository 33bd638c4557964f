//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.briefwise.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = ".briefwise.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Briefing aggregation settings.
    #[serde(default)]
    pub briefing: BriefingConfig,

    /// Trend and anomaly thresholds.
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Approval queue settings.
    #[serde(default)]
    pub approval: ApprovalConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// SQLite database holding metrics and proposals.
    #[serde(default = "default_database")]
    pub database: PathBuf,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            verbose: false,
        }
    }
}

fn default_database() -> PathBuf {
    PathBuf::from("briefwise.db")
}

/// A JSON file served as a briefing source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
    /// Registration name, unique across sources.
    pub name: String,
    /// JSON array of result records.
    pub path: PathBuf,
}

/// Briefing aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BriefingConfig {
    /// Per-source fetch timeout. 0 disables the timeout.
    #[serde(default = "default_adapter_timeout")]
    pub adapter_timeout_seconds: u64,

    /// Sources registered for every briefing, in order.
    #[serde(default)]
    pub sources: Vec<SourceEntry>,
}

impl Default for BriefingConfig {
    fn default() -> Self {
        Self {
            adapter_timeout_seconds: default_adapter_timeout(),
            sources: Vec::new(),
        }
    }
}

impl BriefingConfig {
    /// The configured fetch timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        match self.adapter_timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

fn default_adapter_timeout() -> u64 {
    30
}

/// Trend and anomaly detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Window used when generating insights.
    #[serde(default = "default_insight_window")]
    pub insight_window_days: u32,

    /// Percent change separating up/down from stable.
    #[serde(default = "default_trend_threshold")]
    pub trend_threshold_percent: f64,

    /// Standard deviations beyond which a value is anomalous.
    #[serde(default = "default_anomaly_threshold")]
    pub anomaly_threshold: f64,

    /// Minimum observations before any signal is reported.
    #[serde(default = "default_min_observations")]
    pub min_observations: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            insight_window_days: default_insight_window(),
            trend_threshold_percent: default_trend_threshold(),
            anomaly_threshold: default_anomaly_threshold(),
            min_observations: default_min_observations(),
        }
    }
}

fn default_insight_window() -> u32 {
    7
}

fn default_trend_threshold() -> f64 {
    10.0
}

fn default_anomaly_threshold() -> f64 {
    2.0
}

fn default_min_observations() -> usize {
    3
}

/// Approval queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalConfig {
    /// Default number of audit log entries.
    #[serde(default = "default_audit_limit")]
    pub audit_limit: usize,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            audit_limit: default_audit_limit(),
        }
    }
}

fn default_audit_limit() -> usize {
    crate::approval::DEFAULT_AUDIT_LIMIT
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_in(Path::new("."))
    }

    /// Look for `.briefwise.toml` in `dir`. A present but invalid file is an error.
    pub fn load_in(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(CONFIG_FILE);

        if path.exists() {
            Ok(Some(Self::load(&path)?))
        } else {
            Ok(None)
        }
    }

    /// Reject duplicate source names before any engine is built.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for source in &self.briefing.sources {
            if !seen.insert(source.name.as_str()) {
                anyhow::bail!("Source \"{}\" is configured more than once", source.name);
            }
        }
        Ok(())
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref database) = args.database {
            self.general.database = database.clone();
        }

        if let Some(timeout) = args.timeout {
            self.briefing.adapter_timeout_seconds = timeout;
        }

        if let Some(window) = args.window {
            self.analytics.insight_window_days = window;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let mut config = Config::default();
        config.briefing.sources.push(SourceEntry {
            name: "calendar".to_string(),
            path: PathBuf::from("data/calendar.json"),
        });
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
