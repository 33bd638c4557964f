//! End-to-end scenarios over the public API: briefings from fixture files,
//! the metric ledger on disk, and the approval queue across reopens.

use briefwise::analytics::{AnalyticsEngine, BRIEFING_ITEMS_METRIC, HIGH_PRIORITY_METRIC};
use briefwise::approval::ApprovalGate;
use briefwise::briefing::{BriefingEngine, JsonFileSource, SourceAdapter};
use briefwise::models::{ApprovalStatus, Briefing, InsightKind, NewProposal, Priority, TrendDirection};
use briefwise::report;
use briefwise::store::Store;
use briefwise::{ApprovalError, RegistryError};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(name)
}

fn file_source(name: &str, file: &str) -> Arc<dyn SourceAdapter> {
    Arc::new(JsonFileSource::new(name, fixture(file)))
}

fn open_store(dir: &TempDir) -> Arc<Store> {
    Arc::new(Store::open(&dir.path().join("briefwise.db")).unwrap())
}

#[tokio::test]
async fn test_briefing_from_fixture_files() {
    let mut engine = BriefingEngine::new().with_timeout(Duration::from_secs(5));
    engine.add_source(file_source("calendar", "calendar.json")).unwrap();
    engine.add_source(file_source("broken", "broken.json")).unwrap();
    engine.add_source(file_source("missing", "does-not-exist.json")).unwrap();
    engine.add_source(file_source("github", "github.json")).unwrap();

    let briefing = engine.generate_briefing().await;

    assert_eq!(briefing.sources, vec!["calendar", "github"]);
    let failed: Vec<&str> = briefing.errors.iter().map(|e| e.source.as_str()).collect();
    assert_eq!(failed, vec!["broken", "missing"]);
    assert!(briefing.errors.iter().all(|e| !e.error.is_empty()));

    let titles: Vec<&str> = briefing.results.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(
        titles,
        vec!["Quarterly review", "PR #42 awaiting review", "Standup"]
    );

    let stats = briefing.stats;
    assert_eq!(stats.total, briefing.results.len());
    assert_eq!(stats.total, stats.high + stats.medium + stats.low);
    assert_eq!(stats.actionable, 2);

    let review = &briefing.results[0];
    assert_eq!(review.priority, Priority::High);
    assert_eq!(review.metadata["attendees"], json!(12));

    let markdown = report::generate_briefing_markdown(&briefing);
    assert!(markdown.contains("**broken** is unavailable"));
    assert!(markdown.contains("**missing** is unavailable"));
    assert!(markdown.contains("Quarterly review"));
}

#[tokio::test]
async fn test_briefings_feed_the_metric_ledger() {
    let dir = TempDir::new().unwrap();
    let analytics = AnalyticsEngine::new(open_store(&dir));

    let mut engine = BriefingEngine::new();
    engine.add_source(file_source("calendar", "calendar.json")).unwrap();
    engine.add_source(file_source("github", "github.json")).unwrap();

    analytics
        .record_briefing(&Briefing::empty(), "2026-01-04")
        .unwrap();
    for date in ["2026-01-05", "2026-01-06"] {
        let briefing = engine.generate_briefing().await;
        analytics.record_briefing(&briefing, date).unwrap();
    }

    let totals: Vec<f64> = analytics
        .get_history(BRIEFING_ITEMS_METRIC, 7)
        .unwrap()
        .iter()
        .map(|p| p.value)
        .collect();
    assert_eq!(totals, vec![0.0, 3.0, 3.0]);

    let high: Vec<f64> = analytics
        .get_history(HIGH_PRIORITY_METRIC, 7)
        .unwrap()
        .iter()
        .map(|p| p.value)
        .collect();
    assert_eq!(high, vec![0.0, 1.0, 1.0]);

    let insights = analytics.generate_insights().unwrap();
    let volume = insights
        .iter()
        .find(|i| i.metric == BRIEFING_ITEMS_METRIC && i.kind == InsightKind::Trend)
        .unwrap();
    assert_eq!(
        volume.message,
        "briefing_items is trending up ↑ (100.0% change over 7 days)"
    );
}

#[test]
fn test_duplicate_source_keeps_first() {
    let mut engine = BriefingEngine::new();
    engine.add_source(file_source("calendar", "calendar.json")).unwrap();

    let err = engine
        .add_source(file_source("calendar", "github.json"))
        .unwrap_err();
    assert_eq!(
        err,
        RegistryError::DuplicateSource {
            name: "calendar".to_string()
        }
    );

    let briefing = tokio_test::block_on(engine.generate_briefing());
    assert_eq!(briefing.sources, vec!["calendar"]);
    assert_eq!(briefing.stats.total, 2);
}

#[test]
fn test_metric_scenarios_survive_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let analytics = AnalyticsEngine::new(open_store(&dir));
        for (i, value) in [2.0, 3.0, 5.0, 7.0, 8.0].into_iter().enumerate() {
            let date = format!("2026-01-{:02}", i + 1);
            analytics.record("meetings", value, "calendar", &date).unwrap();
        }
        for (i, value) in [5.0, 4.0, 6.0, 5.0, 5.0, 25.0].into_iter().enumerate() {
            let date = format!("2026-01-{:02}", i + 1);
            analytics.record("errors", value, "sentry", &date).unwrap();
        }
    }

    let analytics = AnalyticsEngine::new(open_store(&dir));

    let trend = analytics.detect_trend("meetings", 7).unwrap().unwrap();
    assert_eq!(trend.direction, TrendDirection::Up);
    assert!(trend.percent_change > 0.0);

    let anomalies = analytics.detect_anomalies("errors", 7).unwrap();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].value, 25.0);
    assert_eq!(anomalies[0].date, "2026-01-06");
    assert!(anomalies[0].deviation_factor > 2.0);

    assert_eq!(analytics.list_metrics().unwrap(), vec!["meetings", "errors"]);

    let insights = analytics.generate_insights().unwrap();
    assert!(insights.iter().any(|i| i.metric == "meetings"));
    assert!(insights.iter().any(|i| i.metric == "errors"));
}

#[test]
fn test_approval_lifecycle() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let gate = ApprovalGate::new(Arc::clone(&store));

    let context = json!({ "emailId": "xyz", "draft": "Sounds good." });
    let reply = gate
        .propose(
            NewProposal::new("me", "send_reply", "Reply to Dana", "gmail")
                .with_context(context.clone()),
        )
        .unwrap();
    let archive = gate
        .propose(NewProposal::new("me", "archive", "Archive newsletter", "gmail"))
        .unwrap();
    let label = gate
        .propose(NewProposal::new("me", "label", "Label invoices", "gmail"))
        .unwrap();
    gate.propose(NewProposal::new("someone-else", "archive", "Not mine", "gmail"))
        .unwrap();

    let loaded = gate.get_by_id(reply.id).unwrap().unwrap();
    assert_eq!(loaded.context, Some(context));

    gate.reject(archive.id, Some("keep it")).unwrap();
    match gate.approve(archive.id) {
        Err(ApprovalError::AlreadyResolved { status, .. }) => {
            assert_eq!(status, ApprovalStatus::Rejected)
        }
        other => panic!("expected AlreadyResolved, got {:?}", other),
    }

    assert_eq!(gate.approve_all("me").unwrap(), 2);
    assert!(gate.list_pending("me").unwrap().is_empty());
    assert_eq!(gate.list_pending("someone-else").unwrap().len(), 1);

    // Reopen and check the resolutions were persisted.
    drop(gate);
    drop(store);
    let gate = ApprovalGate::new(open_store(&dir));

    let log = gate.get_audit_log("me", None).unwrap();
    assert_eq!(log.len(), 3);
    assert_eq!(log[0].id, label.id);
    assert!(log.iter().all(|p| p.resolved_at.is_some()));

    let rejected = gate.get_by_id(archive.id).unwrap().unwrap();
    assert_eq!(rejected.status, ApprovalStatus::Rejected);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("keep it"));
}
