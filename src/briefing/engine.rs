//! Briefing aggregation.
//!
//! The engine owns an ordered registry of sources. Each briefing fans out
//! one task per source, waits for every task to settle, then merges,
//! ranks and counts the results. A source that errors, panics or times out
//! is reported in the briefing's `errors` list instead of failing the call.

use crate::briefing::sources::SourceAdapter;
use crate::errors::RegistryError;
use crate::models::{Briefing, BriefingStats, ResultRecord, SourceFailure};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of one source fetch.
struct FetchOutcome {
    name: String,
    result: Result<Vec<ResultRecord>, String>,
}

/// Aggregates registered sources into ranked briefings.
#[derive(Default)]
pub struct BriefingEngine {
    sources: Vec<Arc<dyn SourceAdapter>>,
    timeout: Option<Duration>,
}

impl BriefingEngine {
    /// Create an engine with no sources and no fetch timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound every source fetch by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Register a source. Fails if the name is already taken.
    pub fn add_source(&mut self, source: Arc<dyn SourceAdapter>) -> Result<(), RegistryError> {
        let name = source.name().to_string();
        if self.sources.iter().any(|s| s.name() == name) {
            return Err(RegistryError::DuplicateSource { name });
        }

        debug!("Registered source: {}", name);
        self.sources.push(source);
        Ok(())
    }

    /// Remove a source by name. Absent names are ignored.
    pub fn remove_source(&mut self, name: &str) {
        self.sources.retain(|s| s.name() != name);
    }

    /// Registered source names, in registration order.
    pub fn list_sources(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    /// Fetch every source concurrently and assemble a briefing.
    pub async fn generate_briefing(&self) -> Briefing {
        if self.sources.is_empty() {
            debug!("No sources registered, returning empty briefing");
            return Briefing::empty();
        }

        let handles = self.sources.iter().map(|source| {
            let source = Arc::clone(source);
            let timeout = self.timeout;
            let name = source.name().to_string();
            let handle = tokio::spawn(async move { fetch_one(source, timeout).await });
            (name, handle)
        });

        let (names, handles): (Vec<_>, Vec<_>) = handles.unzip();
        let joined = join_all(handles).await;

        let outcomes = names.into_iter().zip(joined).map(|(name, joined)| match joined {
            Ok(result) => FetchOutcome { name, result },
            Err(e) => FetchOutcome {
                name,
                result: Err(if e.is_panic() {
                    "source panicked during fetch".to_string()
                } else {
                    format!("fetch task failed: {}", e)
                }),
            },
        });

        let mut results = Vec::new();
        let mut sources = Vec::new();
        let mut errors = Vec::new();

        for outcome in outcomes {
            match outcome.result {
                Ok(records) => {
                    debug!("{} returned {} records", outcome.name, records.len());
                    sources.push(outcome.name);
                    results.extend(records);
                }
                Err(error) => {
                    warn!("Source {} unavailable: {}", outcome.name, error);
                    errors.push(SourceFailure {
                        source: outcome.name,
                        error,
                    });
                }
            }
        }

        rank_records(&mut results);
        let stats = BriefingStats::from_records(&results);

        info!(
            "Briefing generated: {} records from {} sources ({} failed)",
            stats.total,
            sources.len(),
            errors.len()
        );

        Briefing {
            results,
            stats,
            sources,
            errors,
            generated_at: Utc::now(),
        }
    }
}

async fn fetch_one(
    source: Arc<dyn SourceAdapter>,
    timeout: Option<Duration>,
) -> Result<Vec<ResultRecord>, String> {
    let fetched = match timeout {
        Some(limit) => match tokio::time::timeout(limit, source.fetch()).await {
            Ok(fetched) => fetched,
            Err(_) => return Err(format!("timed out after {}s", limit.as_secs_f64())),
        },
        None => source.fetch().await,
    };

    fetched.map_err(|e| {
        let message = format!("{:#}", e);
        if message.is_empty() {
            "unknown error".to_string()
        } else {
            message
        }
    })
}

/// Stable sort by priority rank (high first).
pub fn rank_records(records: &mut [ResultRecord]) {
    records.sort_by_key(|r| r.priority.rank());
}
