//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Briefwise - ranked briefings, metric insights and approved actions
///
/// Pulls records from configured sources into one ranked briefing, keeps
/// a ledger of activity metrics with trend and anomaly detection, and
/// queues proposed actions until a human approves or rejects them.
///
/// Examples:
///   briefwise briefing
///   briefwise record meetings 5 --date 2026-01-05
///   briefwise insights --format json
///   briefwise propose --user me send_reply "Reply to Dana" --context '{"emailId":"xyz"}'
///   briefwise approve 12
///   briefwise --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .briefwise.toml in the current directory
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// SQLite database for metrics and proposals
    #[arg(long, global = true, value_name = "FILE", env = "BRIEFWISE_DB")]
    pub database: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, global = true, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Write output to a file instead of stdout
    #[arg(short, long, global = true, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Per-source fetch timeout in seconds (0 disables)
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Window in days used for insights
    #[arg(long, global = true, value_name = "DAYS")]
    pub window: Option<u32>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Generate a default .briefwise.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Fetch every configured source and print the ranked briefing
    Briefing,

    /// Record one observation of a metric
    Record {
        metric: String,
        #[arg(allow_negative_numbers = true)]
        value: f64,
        /// Where the value came from
        #[arg(long, default_value = "manual")]
        source: String,
        /// Calendar day (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
    },

    /// Show the recorded history of a metric
    History {
        metric: String,
        #[arg(long, default_value = "7")]
        days: u32,
    },

    /// Classify the recent trend of a metric
    Trend {
        metric: String,
        #[arg(long, default_value = "7")]
        days: u32,
    },

    /// List anomalous observations of a metric
    Anomalies {
        metric: String,
        #[arg(long, default_value = "7")]
        days: u32,
    },

    /// Trend and anomaly insights across all metrics
    Insights,

    /// Queue an action for approval
    Propose {
        #[arg(long)]
        user: String,
        action: String,
        description: String,
        #[arg(long, default_value = "cli")]
        source: String,
        /// Structured context as a JSON value
        #[arg(long, value_name = "JSON")]
        context: Option<String>,
    },

    /// Show one proposal
    Show { id: i64 },

    /// Approve a pending proposal
    Approve { id: i64 },

    /// Reject a pending proposal
    Reject {
        id: i64,
        #[arg(long)]
        reason: Option<String>,
    },

    /// List pending proposals, oldest first
    Pending {
        #[arg(long)]
        user: String,
    },

    /// Show all proposals, newest first
    Audit {
        #[arg(long)]
        user: String,
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Approve every pending proposal of a user
    ApproveAll {
        #[arg(long)]
        user: String,
    },
}

/// Output format for rendered results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        let Some(ref command) = self.command else {
            return Err("No command given. Run with --help for usage.".to_string());
        };

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        match command {
            Command::Record { value, date, .. } => {
                if !value.is_finite() {
                    return Err("Metric value must be a finite number".to_string());
                }
                if let Some(date) = date {
                    if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
                        return Err(format!("Date must be YYYY-MM-DD, got '{}'", date));
                    }
                }
            }
            Command::Propose { context, .. } => {
                if let Some(raw) = context {
                    if let Err(e) = serde_json::from_str::<serde_json::Value>(raw) {
                        return Err(format!("Context is not valid JSON: {}", e));
                    }
                }
            }
            Command::Pending { user }
            | Command::Audit { user, .. }
            | Command::ApproveAll { user } => {
                if user.trim().is_empty() {
                    return Err("User must not be empty".to_string());
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `verbose_by_default` comes from the config file; `--quiet` wins over both.
    pub fn log_level(&self, verbose_by_default: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || verbose_by_default {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
