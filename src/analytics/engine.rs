//! Metric ledger and trend/anomaly detection.
//!
//! Observations are appended to the `data_points` table and never modified.
//! Trends, anomalies and insights are recomputed from history on every call.

use crate::analytics::stats::{mean, population_std_dev, split_halves};
use crate::errors::StoreError;
use crate::models::{Anomaly, Briefing, DataPoint, Insight, InsightKind, Trend, TrendDirection};
use crate::store::{from_millis, now, to_millis, Store};
use chrono::{Duration, NaiveDate};
use rusqlite::{params, Row};
use std::sync::Arc;
use tracing::{debug, info};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Metric holding the record count of each briefing.
pub const BRIEFING_ITEMS_METRIC: &str = "briefing_items";
/// Metric holding the high priority count of each briefing.
pub const HIGH_PRIORITY_METRIC: &str = "high_priority_items";
const BRIEFING_SOURCE: &str = "briefing";

/// Detection thresholds.
#[derive(Debug, Clone)]
pub struct AnalyticsSettings {
    /// Percent change beyond which a trend is up or down.
    pub trend_threshold_percent: f64,
    /// Deviation factor beyond which a point is anomalous.
    pub anomaly_threshold: f64,
    /// Fewer observations than this yield no signal.
    pub min_observations: usize,
    /// Window used by `generate_insights`.
    pub insight_window_days: u32,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            trend_threshold_percent: 10.0,
            anomaly_threshold: 2.0,
            min_observations: 3,
            insight_window_days: 7,
        }
    }
}

impl From<&crate::config::AnalyticsConfig> for AnalyticsSettings {
    fn from(config: &crate::config::AnalyticsConfig) -> Self {
        Self {
            trend_threshold_percent: config.trend_threshold_percent,
            anomaly_threshold: config.anomaly_threshold,
            min_observations: config.min_observations,
            insight_window_days: config.insight_window_days,
        }
    }
}

/// Per-metric time series with derived signals.
pub struct AnalyticsEngine {
    store: Arc<Store>,
    settings: AnalyticsSettings,
}

impl AnalyticsEngine {
    pub fn new(store: Arc<Store>) -> Self {
        Self::with_settings(store, AnalyticsSettings::default())
    }

    pub fn with_settings(store: Arc<Store>, settings: AnalyticsSettings) -> Self {
        Self { store, settings }
    }

    /// Append one observation, stamped with the current time.
    pub fn record(
        &self,
        metric: &str,
        value: f64,
        source: &str,
        date: &str,
    ) -> Result<DataPoint, StoreError> {
        let recorded_at = now();

        let id = self.store.write(|tx| {
            tx.execute(
                "INSERT INTO data_points (metric, value, source, date, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![metric, value, source, date, to_millis(recorded_at)],
            )?;
            Ok::<_, StoreError>(tx.last_insert_rowid())
        })?;

        debug!("Recorded {}={} for {} (id {})", metric, value, date, id);

        Ok(DataPoint {
            id,
            metric: metric.to_string(),
            value,
            source: source.to_string(),
            date: date.to_string(),
            recorded_at,
        })
    }

    /// Record the size of a generated briefing as two metrics for `date`,
    /// so briefing volume shows up in trends and insights.
    pub fn record_briefing(
        &self,
        briefing: &Briefing,
        date: &str,
    ) -> Result<[DataPoint; 2], StoreError> {
        let total = self.record(
            BRIEFING_ITEMS_METRIC,
            briefing.stats.total as f64,
            BRIEFING_SOURCE,
            date,
        )?;
        let high = self.record(
            HIGH_PRIORITY_METRIC,
            briefing.stats.high as f64,
            BRIEFING_SOURCE,
            date,
        )?;
        Ok([total, high])
    }

    /// Observations for `metric`, oldest date first, limited to the last
    /// `days` calendar days ending at the latest observed date.
    ///
    /// `days == 0` returns the full history.
    pub fn get_history(&self, metric: &str, days: u32) -> Result<Vec<DataPoint>, StoreError> {
        let rows = self.store.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, metric, value, source, date, recorded_at
                 FROM data_points WHERE metric = ?1 ORDER BY date ASC, id ASC",
            )?;
            let mapped = stmt.query_map([metric], RawPoint::from_row)?;
            mapped.collect::<Result<Vec<_>, rusqlite::Error>>()
        })?;

        let history = rows
            .into_iter()
            .map(RawPoint::into_point)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(apply_window(history, days))
    }

    /// Split-window trend, or `None` with too little history.
    pub fn detect_trend(&self, metric: &str, days: u32) -> Result<Option<Trend>, StoreError> {
        let history = self.get_history(metric, days)?;
        Ok(classify_trend(metric, &history, days, &self.settings))
    }

    /// Points deviating from the mean by more than the threshold, oldest first.
    pub fn detect_anomalies(&self, metric: &str, days: u32) -> Result<Vec<Anomaly>, StoreError> {
        let history = self.get_history(metric, days)?;
        Ok(find_anomalies(metric, &history, &self.settings))
    }

    /// Distinct metric names, in the order they were first recorded.
    pub fn list_metrics(&self) -> Result<Vec<String>, StoreError> {
        self.store.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT metric FROM data_points GROUP BY metric ORDER BY MIN(id) ASC",
            )?;
            let mapped = stmt.query_map([], |row| row.get(0))?;
            mapped
                .collect::<Result<Vec<String>, rusqlite::Error>>()
                .map_err(StoreError::from)
        })
    }

    /// Trend and anomaly insights across every known metric.
    pub fn generate_insights(&self) -> Result<Vec<Insight>, StoreError> {
        let days = self.settings.insight_window_days;
        let mut insights = Vec::new();

        for metric in self.list_metrics()? {
            if let Some(trend) = self.detect_trend(&metric, days)? {
                if trend.direction != TrendDirection::Stable {
                    insights.push(Insight {
                        message: format!(
                            "{} is trending {} {} ({:.1}% change over {} days)",
                            metric,
                            trend.direction,
                            trend.direction.arrow(),
                            trend.percent_change.abs(),
                            trend.period
                        ),
                        metric: metric.clone(),
                        kind: InsightKind::Trend,
                        data: serde_json::to_value(&trend)?,
                    });
                }
            }

            for anomaly in self.detect_anomalies(&metric, days)? {
                insights.push(Insight {
                    message: format!(
                        "{} had an unusual value of {} on {} (expected ~{:.1})",
                        metric, anomaly.value, anomaly.date, anomaly.mean
                    ),
                    metric: metric.clone(),
                    kind: InsightKind::Anomaly,
                    data: serde_json::to_value(&anomaly)?,
                });
            }
        }

        info!("Generated {} insights", insights.len());
        Ok(insights)
    }
}

/// Classify the change between the means of the two halves of `history`.
pub fn classify_trend(
    metric: &str,
    history: &[DataPoint],
    period: u32,
    settings: &AnalyticsSettings,
) -> Option<Trend> {
    if history.len() < settings.min_observations.max(1) {
        return None;
    }

    let values: Vec<f64> = history.iter().map(|p| p.value).collect();
    let (first, second) = split_halves(&values);
    let avg_first = mean(first);
    let avg_second = mean(second);

    let (direction, percent_change) = if avg_first == 0.0 {
        if avg_second > 0.0 {
            (TrendDirection::Up, 100.0)
        } else {
            (TrendDirection::Stable, 0.0)
        }
    } else {
        let change = (avg_second - avg_first) / avg_first * 100.0;
        let direction = if change > settings.trend_threshold_percent {
            TrendDirection::Up
        } else if change < -settings.trend_threshold_percent {
            TrendDirection::Down
        } else {
            TrendDirection::Stable
        };
        (direction, change)
    };

    Some(Trend {
        metric: metric.to_string(),
        direction,
        percent_change,
        period,
    })
}

/// Flag every point whose deviation factor exceeds the threshold.
pub fn find_anomalies(
    metric: &str,
    history: &[DataPoint],
    settings: &AnalyticsSettings,
) -> Vec<Anomaly> {
    if history.len() < settings.min_observations.max(1) {
        return Vec::new();
    }

    let values: Vec<f64> = history.iter().map(|p| p.value).collect();
    let avg = mean(&values);
    let std_dev = population_std_dev(&values);

    if std_dev == 0.0 {
        return Vec::new();
    }

    history
        .iter()
        .filter_map(|point| {
            let deviation_factor = (point.value - avg).abs() / std_dev;
            (deviation_factor > settings.anomaly_threshold).then(|| Anomaly {
                metric: metric.to_string(),
                value: point.value,
                date: point.date.clone(),
                mean: avg,
                std_dev,
                deviation_factor,
            })
        })
        .collect()
}

/// Keep points within `days` calendar days of the latest parseable date.
/// Points with unparseable dates cannot be placed and are always kept.
fn apply_window(history: Vec<DataPoint>, days: u32) -> Vec<DataPoint> {
    if days == 0 {
        return history;
    }

    let parse = |p: &DataPoint| NaiveDate::parse_from_str(&p.date, DATE_FORMAT).ok();
    let Some(latest) = history.iter().filter_map(parse).max() else {
        return history;
    };
    let Some(cutoff) = latest.checked_sub_signed(Duration::days(i64::from(days))) else {
        return history;
    };

    history
        .into_iter()
        .filter(|p| parse(p).map_or(true, |date| date > cutoff))
        .collect()
}

struct RawPoint {
    id: i64,
    metric: String,
    value: f64,
    source: String,
    date: String,
    recorded_at: i64,
}

impl RawPoint {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            metric: row.get(1)?,
            value: row.get(2)?,
            source: row.get(3)?,
            date: row.get(4)?,
            recorded_at: row.get(5)?,
        })
    }

    fn into_point(self) -> Result<DataPoint, StoreError> {
        Ok(DataPoint {
            id: self.id,
            metric: self.metric,
            value: self.value,
            source: self.source,
            date: self.date,
            recorded_at: from_millis("data_points", self.recorded_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> AnalyticsEngine {
        AnalyticsEngine::new(Arc::new(Store::open_in_memory().unwrap()))
    }

    fn record_series(engine: &AnalyticsEngine, metric: &str, values: &[f64]) {
        for (i, value) in values.iter().enumerate() {
            let date = format!("2026-01-{:02}", i + 1);
            engine.record(metric, *value, "test", &date).unwrap();
        }
    }

    #[test]
    fn test_record_assigns_ids() {
        let engine = engine();
        let a = engine.record("meetings", 3.0, "gcal", "2026-01-01").unwrap();
        let b = engine.record("meetings", 4.0, "gcal", "2026-01-02").unwrap();

        assert!(b.id > a.id);
        assert_eq!(a.metric, "meetings");
        assert_eq!(a.source, "gcal");
        assert_eq!(a.value, 3.0);
    }

    #[test]
    fn test_history_is_ordered_by_date() {
        let engine = engine();
        engine.record("emails", 3.0, "gmail", "2026-01-03").unwrap();
        engine.record("emails", 1.0, "gmail", "2026-01-01").unwrap();
        engine.record("emails", 2.0, "gmail", "2026-01-02").unwrap();
        engine.record("other", 9.0, "gmail", "2026-01-02").unwrap();

        let history = engine.get_history("emails", 7).unwrap();
        let values: Vec<f64> = history.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_history_same_date_keeps_insertion_order() {
        let engine = engine();
        engine.record("commits", 1.0, "github", "2026-01-01").unwrap();
        engine.record("commits", 2.0, "github", "2026-01-01").unwrap();

        let values: Vec<f64> = engine
            .get_history("commits", 7)
            .unwrap()
            .iter()
            .map(|p| p.value)
            .collect();
        assert_eq!(values, vec![1.0, 2.0]);
    }

    #[test]
    fn test_history_window_anchored_at_latest_date() {
        let engine = engine();
        record_series(&engine, "focus", &[1.0; 10]);

        let window = engine.get_history("focus", 3).unwrap();
        let dates: Vec<&str> = window.iter().map(|p| p.date.as_str()).collect();
        assert_eq!(dates, vec!["2026-01-08", "2026-01-09", "2026-01-10"]);

        assert_eq!(engine.get_history("focus", 0).unwrap().len(), 10);
        assert_eq!(engine.get_history("focus", 30).unwrap().len(), 10);
    }

    #[test]
    fn test_history_window_keeps_unparseable_dates() {
        let engine = engine();
        engine.record("mood", 1.0, "manual", "2025-06-01").unwrap();
        engine.record("mood", 2.0, "manual", "2026-01-10").unwrap();
        engine.record("mood", 3.0, "manual", "week-2").unwrap();

        let values: Vec<f64> = engine
            .get_history("mood", 7)
            .unwrap()
            .iter()
            .map(|p| p.value)
            .collect();
        assert_eq!(values, vec![2.0, 3.0]);
    }

    #[test]
    fn test_trend_requires_three_points() {
        let engine = engine();
        assert!(engine.detect_trend("meetings", 7).unwrap().is_none());

        record_series(&engine, "meetings", &[1.0, 5.0]);
        assert!(engine.detect_trend("meetings", 7).unwrap().is_none());
    }

    #[test]
    fn test_trend_up() {
        let engine = engine();
        record_series(&engine, "meetings", &[2.0, 3.0, 5.0, 7.0, 8.0]);

        let trend = engine.detect_trend("meetings", 7).unwrap().unwrap();
        assert_eq!(trend.direction, TrendDirection::Up);
        assert!(trend.percent_change > 0.0);
        assert_eq!(trend.period, 7);
        assert_eq!(trend.metric, "meetings");
    }

    #[test]
    fn test_trend_down() {
        let engine = engine();
        record_series(&engine, "sleep", &[10.0, 8.0, 6.0, 4.0, 2.0]);

        let trend = engine.detect_trend("sleep", 7).unwrap().unwrap();
        assert_eq!(trend.direction, TrendDirection::Down);
        assert!(trend.percent_change < -10.0);
    }

    #[test]
    fn test_trend_stable() {
        let engine = engine();
        record_series(&engine, "steps", &[100.0, 102.0, 99.0, 101.0, 100.0]);

        let trend = engine.detect_trend("steps", 7).unwrap().unwrap();
        assert_eq!(trend.direction, TrendDirection::Stable);
        assert!(trend.percent_change.abs() < 10.0);
    }

    #[test]
    fn test_trend_threshold_is_exclusive() {
        let engine = engine();

        record_series(&engine, "reviews", &[20.0, 20.0, 22.0, 22.0]);
        let trend = engine.detect_trend("reviews", 7).unwrap().unwrap();
        assert!((trend.percent_change - 10.0).abs() < 1e-9);
        assert_eq!(trend.direction, TrendDirection::Stable);

        record_series(&engine, "tickets", &[20.0, 20.0, 18.0, 18.0]);
        let trend = engine.detect_trend("tickets", 7).unwrap().unwrap();
        assert!((trend.percent_change + 10.0).abs() < 1e-9);
        assert_eq!(trend.direction, TrendDirection::Stable);

        record_series(&engine, "commits", &[20.0, 20.0, 23.0, 23.0]);
        let trend = engine.detect_trend("commits", 7).unwrap().unwrap();
        assert_eq!(trend.direction, TrendDirection::Up);
    }

    #[test]
    fn test_trend_from_zero_baseline() {
        let engine = engine();
        record_series(&engine, "bugs", &[0.0, 0.0, 5.0]);
        let trend = engine.detect_trend("bugs", 7).unwrap().unwrap();
        assert_eq!(trend.direction, TrendDirection::Up);
        assert_eq!(trend.percent_change, 100.0);

        record_series(&engine, "flat", &[0.0, 0.0, 0.0]);
        let trend = engine.detect_trend("flat", 7).unwrap().unwrap();
        assert_eq!(trend.direction, TrendDirection::Stable);
        assert_eq!(trend.percent_change, 0.0);
    }

    #[test]
    fn test_anomaly_single_outlier() {
        let engine = engine();
        record_series(&engine, "errors", &[5.0, 4.0, 6.0, 5.0, 5.0, 25.0]);

        let anomalies = engine.detect_anomalies("errors", 7).unwrap();
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].value, 25.0);
        assert_eq!(anomalies[0].date, "2026-01-06");
        assert!(anomalies[0].deviation_factor > 2.0);
        assert!((anomalies[0].mean - 50.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_anomaly_constant_series() {
        let engine = engine();
        record_series(&engine, "standups", &[1.0, 1.0, 1.0, 1.0]);
        assert!(engine.detect_anomalies("standups", 7).unwrap().is_empty());
    }

    #[test]
    fn test_anomaly_requires_three_points() {
        let engine = engine();
        record_series(&engine, "errors", &[1.0, 100.0]);
        assert!(engine.detect_anomalies("errors", 7).unwrap().is_empty());
    }

    #[test]
    fn test_record_briefing_stats() {
        use crate::models::{BriefingStats, Priority, ResultRecord};

        let engine = engine();
        let mut briefing = Briefing::empty();
        briefing.results = vec![
            ResultRecord::new("github", "pr", "Review #42", Priority::High),
            ResultRecord::new("gmail", "email", "Invoice", Priority::High),
            ResultRecord::new("calendar", "meeting", "Standup", Priority::Low),
        ];
        briefing.stats = BriefingStats::from_records(&briefing.results);

        let [total, high] = engine.record_briefing(&briefing, "2026-01-05").unwrap();
        assert_eq!(total.metric, BRIEFING_ITEMS_METRIC);
        assert_eq!(total.value, 3.0);
        assert_eq!(high.metric, HIGH_PRIORITY_METRIC);
        assert_eq!(high.value, 2.0);
        assert_eq!(high.source, "briefing");

        engine.record_briefing(&Briefing::empty(), "2026-01-06").unwrap();
        let history = engine.get_history(BRIEFING_ITEMS_METRIC, 7).unwrap();
        let values: Vec<f64> = history.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![3.0, 0.0]);
        assert_eq!(
            engine.list_metrics().unwrap(),
            vec![BRIEFING_ITEMS_METRIC, HIGH_PRIORITY_METRIC]
        );
    }

    #[test]
    fn test_list_metrics_first_recorded_order() {
        let engine = engine();
        engine.record("b", 1.0, "s", "2026-01-01").unwrap();
        engine.record("a", 1.0, "s", "2026-01-01").unwrap();
        engine.record("b", 2.0, "s", "2026-01-02").unwrap();

        assert_eq!(engine.list_metrics().unwrap(), vec!["b", "a"]);
    }

    #[test]
    fn test_generate_insights() {
        let engine = engine();
        assert!(engine.generate_insights().unwrap().is_empty());

        record_series(&engine, "meetings", &[2.0, 3.0, 5.0, 7.0, 8.0]);
        record_series(&engine, "standups", &[1.0, 1.0, 1.0]);
        record_series(&engine, "errors", &[5.0, 4.0, 6.0, 5.0, 5.0, 25.0]);
        engine.record("sparse", 4.0, "s", "2026-01-01").unwrap();

        let insights = engine.generate_insights().unwrap();

        let meetings: Vec<&Insight> = insights.iter().filter(|i| i.metric == "meetings").collect();
        assert_eq!(meetings.len(), 1);
        assert_eq!(meetings[0].kind, InsightKind::Trend);
        assert!(meetings[0].message.contains("trending up ↑"));
        assert!(meetings[0].message.contains("166.7%"));
        assert_eq!(meetings[0].data["direction"], "up");

        let anomaly = insights
            .iter()
            .find(|i| i.metric == "errors" && i.kind == InsightKind::Anomaly)
            .unwrap();
        assert!(anomaly.message.contains("unusual value of 25 on 2026-01-06"));

        assert!(insights.iter().all(|i| i.metric != "standups"));
        assert!(insights.iter().all(|i| i.metric != "sparse"));
    }

    #[test]
    fn test_downward_trend_insight() {
        let engine = engine();
        record_series(&engine, "sleep", &[10.0, 8.0, 6.0, 4.0, 2.0]);

        let insights = engine.generate_insights().unwrap();
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].kind, InsightKind::Trend);
        assert_eq!(
            insights[0].message,
            "sleep is trending down ↓ (55.6% change over 7 days)"
        );
        assert_eq!(insights[0].data["direction"], "down");
    }
}
