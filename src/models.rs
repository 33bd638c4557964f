//! Data models for the decision-support engine.
//!
//! This module contains the plain data shapes that cross the library
//! boundary: source records and briefings, metric observations and their
//! derived signals, and action proposals awaiting approval. Every type here
//! serializes to JSON without loss.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Priority of a result record.
///
/// The set is closed: a record carrying any other priority string fails to
/// deserialize, so every record lands in exactly one stats bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Needs attention today
    High,
    /// Worth a look
    Medium,
    /// Informational
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => write!(f, "High"),
            Priority::Medium => write!(f, "Medium"),
            Priority::Low => write!(f, "Low"),
        }
    }
}

impl Priority {
    /// Sort rank, lowest first: high=0, medium=1, low=2.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }

    /// Returns an emoji representation of the priority.
    pub fn emoji(&self) -> &'static str {
        match self {
            Priority::High => "🔴",
            Priority::Medium => "🟡",
            Priority::Low => "🟢",
        }
    }
}

/// One normalized unit of information produced by a source adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Name of the source that produced the record.
    pub source: String,
    /// When the underlying item happened or was observed.
    pub timestamp: DateTime<Utc>,
    /// Free-form category, e.g. "email" or "meeting".
    pub category: String,
    /// Short headline.
    pub title: String,
    /// One or two sentences of detail.
    pub summary: String,
    /// Ranking bucket.
    pub priority: Priority,
    /// Source-specific structured data.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Whether the user can act on this item directly.
    #[serde(default)]
    pub actionable: bool,
}

impl ResultRecord {
    /// Creates a record with empty metadata, timestamped now.
    pub fn new(
        source: impl Into<String>,
        category: impl Into<String>,
        title: impl Into<String>,
        priority: Priority,
    ) -> Self {
        Self {
            source: source.into(),
            timestamp: Utc::now(),
            category: category.into(),
            title: title.into(),
            summary: String::new(),
            priority,
            metadata: Map::new(),
            actionable: false,
        }
    }
}

/// Counts over the merged result set of a briefing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BriefingStats {
    /// Total number of records.
    pub total: usize,
    /// Number of high priority records.
    pub high: usize,
    /// Number of medium priority records.
    pub medium: usize,
    /// Number of low priority records.
    pub low: usize,
    /// Number of actionable records.
    pub actionable: usize,
}

impl BriefingStats {
    /// Creates a summary from a list of records.
    pub fn from_records(records: &[ResultRecord]) -> Self {
        let mut stats = Self {
            total: records.len(),
            ..Self::default()
        };

        for record in records {
            match record.priority {
                Priority::High => stats.high += 1,
                Priority::Medium => stats.medium += 1,
                Priority::Low => stats.low += 1,
            }
            if record.actionable {
                stats.actionable += 1;
            }
        }

        stats
    }
}

/// A source that failed during one briefing cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFailure {
    /// Registered name of the failing source.
    pub source: String,
    /// Rendered error chain.
    pub error: String,
}

/// The ranked output of one aggregation cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Briefing {
    /// Records sorted by priority; ties keep source registration order.
    pub results: Vec<ResultRecord>,
    /// Counts over `results`.
    pub stats: BriefingStats,
    /// Sources that answered, in registration order.
    pub sources: Vec<String>,
    /// Sources that failed, in registration order.
    pub errors: Vec<SourceFailure>,
    /// When the briefing was assembled.
    pub generated_at: DateTime<Utc>,
}

impl Briefing {
    /// A well-formed briefing with no sources.
    pub fn empty() -> Self {
        Self {
            results: Vec::new(),
            stats: BriefingStats::default(),
            sources: Vec::new(),
            errors: Vec::new(),
            generated_at: Utc::now(),
        }
    }

    /// Records the user can act on, in briefing order.
    pub fn actionable(&self) -> impl Iterator<Item = &ResultRecord> {
        self.results.iter().filter(|r| r.actionable)
    }
}

/// A single recorded observation of a metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub id: i64,
    pub metric: String,
    pub value: f64,
    pub source: String,
    /// Calendar day, `YYYY-MM-DD`.
    pub date: String,
    pub recorded_at: DateTime<Utc>,
}

/// Direction of a metric's split-window change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendDirection::Up => write!(f, "up"),
            TrendDirection::Down => write!(f, "down"),
            TrendDirection::Stable => write!(f, "stable"),
        }
    }
}

impl TrendDirection {
    pub fn arrow(&self) -> &'static str {
        match self {
            TrendDirection::Up => "↑",
            TrendDirection::Down => "↓",
            TrendDirection::Stable => "→",
        }
    }
}

/// Trend classification of a metric over a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub metric: String,
    pub direction: TrendDirection,
    /// Change of the second-half mean relative to the first-half mean, in percent.
    pub percent_change: f64,
    /// Window size in days the trend was requested for.
    pub period: u32,
}

/// An observation far from the metric's mean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub metric: String,
    pub value: f64,
    pub date: String,
    pub mean: f64,
    pub std_dev: f64,
    /// `|value - mean| / std_dev`
    pub deviation_factor: f64,
}

/// Kind of synthesized insight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    Trend,
    Anomaly,
    Summary,
}

impl fmt::Display for InsightKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsightKind::Trend => write!(f, "trend"),
            InsightKind::Anomaly => write!(f, "anomaly"),
            InsightKind::Summary => write!(f, "summary"),
        }
    }
}

/// A human-readable signal derived from trends and anomalies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub metric: String,
    #[serde(rename = "type")]
    pub kind: InsightKind,
    pub message: String,
    /// The trend or anomaly the message was built from.
    pub data: Value,
}

/// Lifecycle state of an action proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    /// Column value used by the proposal ledger.
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }

    /// Approved and rejected proposals never change again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            "rejected" => Ok(ApprovalStatus::Rejected),
            other => Err(format!("unknown approval status: {}", other)),
        }
    }
}

/// Input for a new action proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProposal {
    pub user_id: String,
    pub action: String,
    pub description: String,
    pub source: String,
    /// Opaque structured payload returned verbatim on retrieval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl NewProposal {
    pub fn new(
        user_id: impl Into<String>,
        action: impl Into<String>,
        description: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            action: action.into(),
            description: description.into(),
            source: source.into(),
            context: None,
        }
    }

    /// Attach a structured context payload.
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }
}

/// A proposed automated action awaiting human consent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionProposal {
    pub id: i64,
    pub user_id: String,
    pub action: String,
    pub description: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    pub status: ApprovalStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}
