//! Metric time series, trends and anomalies.

pub mod engine;
pub mod stats;

pub use engine::{
    classify_trend, find_anomalies, AnalyticsEngine, AnalyticsSettings, BRIEFING_ITEMS_METRIC,
    HIGH_PRIORITY_METRIC,
};
