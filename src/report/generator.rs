//! Markdown and JSON rendering.
//!
//! Briefings, insights and proposal lists are plain data; this module turns
//! them into something a person reads in a terminal or a file.

use crate::models::{
    ActionProposal, Anomaly, ApprovalStatus, Briefing, BriefingStats, DataPoint, Insight,
    InsightKind, Priority, ResultRecord, SourceFailure, Trend,
};
use anyhow::Result;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Generate a complete Markdown briefing.
pub fn generate_briefing_markdown(briefing: &Briefing) -> String {
    let mut output = String::new();

    output.push_str("# Daily Briefing\n\n");
    output.push_str(&generate_metadata_section(briefing));
    output.push_str(&generate_stats_section(&briefing.stats));
    output.push_str(&generate_unavailable_section(&briefing.errors));
    output.push_str(&generate_results_section(&briefing.results));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(briefing: &Briefing) -> String {
    let mut section = String::new();

    section.push_str(&format!(
        "- **Generated:** {}\n",
        briefing.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if briefing.sources.is_empty() {
        section.push_str("- **Sources:** none\n");
    } else {
        section.push_str(&format!("- **Sources:** {}\n", briefing.sources.join(", ")));
    }
    section.push('\n');

    section
}

/// Generate the stats table.
fn generate_stats_section(stats: &BriefingStats) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str(&format!(
        "| {} High | {} Medium | {} Low | Actionable | **Total** |\n",
        Priority::High.emoji(),
        Priority::Medium.emoji(),
        Priority::Low.emoji(),
    ));
    section.push_str("|:---:|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} | **{}** |\n\n",
        stats.high, stats.medium, stats.low, stats.actionable, stats.total
    ));

    section
}

/// One inline note per source that could not be reached.
fn generate_unavailable_section(errors: &[SourceFailure]) -> String {
    if errors.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Unavailable Sources\n\n");
    for failure in errors {
        section.push_str(&format!(
            "- ⚠️ **{}** is unavailable: {}\n",
            failure.source, failure.error
        ));
    }
    section.push('\n');

    section
}

/// Records grouped under a heading per priority, briefing order kept.
fn generate_results_section(results: &[ResultRecord]) -> String {
    let mut section = String::new();

    if results.is_empty() {
        section.push_str("*Nothing to report.*\n\n");
        return section;
    }

    for priority in [Priority::High, Priority::Medium, Priority::Low] {
        let records: Vec<&ResultRecord> =
            results.iter().filter(|r| r.priority == priority).collect();
        if records.is_empty() {
            continue;
        }

        section.push_str(&format!("## {} {} Priority\n\n", priority.emoji(), priority));
        for record in records {
            section.push_str(&generate_record_block(record));
        }
    }

    section
}

/// Generate a block for a single record.
fn generate_record_block(record: &ResultRecord) -> String {
    let mut block = String::new();

    let marker = if record.actionable { " ✅" } else { "" };
    block.push_str(&format!("### {}{}\n\n", record.title, marker));
    block.push_str(&format!(
        "- **Source:** {} ({})\n",
        record.source, record.category
    ));
    block.push_str(&format!(
        "- **When:** {}\n",
        record.timestamp.format("%Y-%m-%d %H:%M UTC")
    ));
    if !record.summary.is_empty() {
        block.push_str(&format!("\n{}\n", record.summary));
    }
    block.push('\n');

    block
}

/// Generate an insight list.
pub fn generate_insights_markdown(insights: &[Insight]) -> String {
    let mut output = String::new();

    output.push_str("# Insights\n\n");
    if insights.is_empty() {
        output.push_str("*No insights yet. Record more data points.*\n");
        return output;
    }

    for insight in insights {
        let icon = match insight.kind {
            InsightKind::Trend => "📈",
            InsightKind::Anomaly => "⚠️",
            InsightKind::Summary => "📋",
        };
        output.push_str(&format!("- {} {}\n", icon, insight.message));
    }

    output
}

/// Generate a metric history table.
pub fn generate_history_markdown(metric: &str, history: &[DataPoint]) -> String {
    let mut output = String::new();

    output.push_str(&format!("# {} History\n\n", metric));
    if history.is_empty() {
        output.push_str("*No data points recorded.*\n");
        return output;
    }

    output.push_str("| Date | Value | Source |\n");
    output.push_str("|------|------:|--------|\n");
    for point in history {
        output.push_str(&format!(
            "| {} | {} | {} |\n",
            point.date, point.value, point.source
        ));
    }

    output
}

/// Describe a trend, or the lack of one.
pub fn generate_trend_markdown(metric: &str, trend: Option<&Trend>) -> String {
    match trend {
        Some(trend) => format!(
            "**{}** {} {} ({:+.1}% over {} days)\n",
            trend.metric,
            trend.direction.arrow(),
            trend.direction,
            trend.percent_change,
            trend.period
        ),
        None => format!("**{}**: not enough data for a trend\n", metric),
    }
}

/// Generate an anomaly list.
pub fn generate_anomalies_markdown(metric: &str, anomalies: &[Anomaly]) -> String {
    let mut output = String::new();

    output.push_str(&format!("# {} Anomalies\n\n", metric));
    if anomalies.is_empty() {
        output.push_str("*No anomalies detected.*\n");
        return output;
    }

    for anomaly in anomalies {
        output.push_str(&format!(
            "- {} on {} ({:.1}σ from mean {:.1})\n",
            anomaly.value, anomaly.date, anomaly.deviation_factor, anomaly.mean
        ));
    }

    output
}

/// Generate a table of proposals under a heading.
pub fn generate_proposals_markdown(title: &str, proposals: &[ActionProposal]) -> String {
    let mut output = String::new();

    output.push_str(&format!("# {}\n\n", title));
    if proposals.is_empty() {
        output.push_str("*No proposals.*\n");
        return output;
    }

    output.push_str("| ID | Status | Action | Description | Source | Created | Resolved |\n");
    output.push_str("|---:|--------|--------|-------------|--------|---------|----------|\n");
    for proposal in proposals {
        let resolved = match proposal.resolved_at {
            Some(at) if proposal.status.is_terminal() => at.format("%Y-%m-%d %H:%M").to_string(),
            _ => "-".to_string(),
        };
        output.push_str(&format!(
            "| {} | {} {} | `{}` | {} | {} | {} | {} |\n",
            proposal.id,
            status_emoji(proposal.status),
            proposal.status,
            proposal.action,
            proposal.description.replace('|', "\\|"),
            proposal.source,
            proposal.created_at.format("%Y-%m-%d %H:%M"),
            resolved
        ));
    }

    output
}

/// Generate a detail block for one proposal.
pub fn generate_proposal_block(proposal: &ActionProposal) -> String {
    let mut block = String::new();

    block.push_str(&format!(
        "## {} Proposal #{}: `{}`\n\n",
        status_emoji(proposal.status),
        proposal.id,
        proposal.action
    ));
    block.push_str(&format!("- **User:** {}\n", proposal.user_id));
    block.push_str(&format!("- **Status:** {}\n", proposal.status));
    block.push_str(&format!("- **Source:** {}\n", proposal.source));
    block.push_str(&format!(
        "- **Created:** {}\n",
        proposal.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if let Some(resolved_at) = proposal.resolved_at {
        block.push_str(&format!(
            "- **Resolved:** {}\n",
            resolved_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
    }
    if let Some(ref reason) = proposal.rejection_reason {
        block.push_str(&format!("- **Reason:** {}\n", reason));
    }
    block.push_str(&format!("\n{}\n", proposal.description));

    if let Some(ref context) = proposal.context {
        let pretty = serde_json::to_string_pretty(context).unwrap_or_else(|_| context.to_string());
        block.push_str("\n**Context:**\n\n```json\n");
        block.push_str(&pretty);
        block.push_str("\n```\n");
    }

    block
}

fn status_emoji(status: ApprovalStatus) -> &'static str {
    match status {
        ApprovalStatus::Pending => "⏳",
        ApprovalStatus::Approved => "✅",
        ApprovalStatus::Rejected => "❌",
    }
}

fn generate_footer() -> String {
    "---\n\n*Generated by Briefwise*\n".to_string()
}

/// Serialize any result as pretty JSON.
pub fn generate_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(Into::into)
}

/// Write rendered output to a file.
pub fn write_output(content: &str, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(content.as_bytes())?;

    Ok(())
}
