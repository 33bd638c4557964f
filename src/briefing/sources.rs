//! Source adapters.
//!
//! A source is anything that can produce a list of normalized
//! [`ResultRecord`]s on demand. Sources never touch engine state; a failing
//! source only costs its own records.

use crate::models::ResultRecord;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

/// Pluggable data source consumed by the briefing engine.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable registration name, unique within an engine.
    fn name(&self) -> &str;

    /// Produce this cycle's records.
    async fn fetch(&self) -> Result<Vec<ResultRecord>>;
}

/// A source serving a fixed list of records.
#[derive(Debug, Clone)]
pub struct StaticSource {
    name: String,
    records: Vec<ResultRecord>,
}

impl StaticSource {
    pub fn new(name: impl Into<String>, records: Vec<ResultRecord>) -> Self {
        Self {
            name: name.into(),
            records,
        }
    }
}

#[async_trait]
impl SourceAdapter for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<ResultRecord>> {
        Ok(self.records.clone())
    }
}

/// A source that reads a JSON array of records from disk on every fetch.
///
/// Records carrying an unknown priority fail the whole file.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    name: String,
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

#[async_trait]
impl SourceAdapter for JsonFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<ResultRecord>> {
        debug!("Reading records for {} from {}", self.name, self.path.display());

        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;

        let records: Vec<ResultRecord> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse records in {}", self.path.display()))?;

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_static_source_returns_records() {
        let source = StaticSource::new(
            "github",
            vec![ResultRecord::new("github", "pr", "Review #42", Priority::High)],
        );

        let records = tokio_test::block_on(source.fetch()).unwrap();
        assert_eq!(source.name(), "github");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Review #42");
    }

    #[tokio::test]
    async fn test_json_file_source_parses_records() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"source":"calendar","timestamp":"2026-01-05T09:00:00Z","category":"meeting",
                  "title":"Standup","summary":"Daily sync","priority":"medium",
                  "metadata":{{"room":"4A","attendees":3}},"actionable":false}},
                {{"source":"calendar","timestamp":"2026-01-05T14:00:00Z","category":"meeting",
                  "title":"1:1","summary":"Prep notes","priority":"high"}}
            ]"#
        )
        .unwrap();

        let source = JsonFileSource::new("calendar", file.path());
        let records = source.fetch().await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].metadata["room"], "4A");
        assert_eq!(records[1].priority, Priority::High);
    }

    #[tokio::test]
    async fn test_json_file_source_missing_file_fails() {
        let source = JsonFileSource::new("csv", "/nonexistent/briefwise/records.json");
        let err = source.fetch().await.unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read"));
    }

    #[tokio::test]
    async fn test_json_file_source_rejects_unknown_priority() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"source":"csv","timestamp":"2026-01-05T09:00:00Z","category":"row",
                 "title":"x","summary":"","priority":"urgent"}}]"#
        )
        .unwrap();

        let source = JsonFileSource::new("csv", file.path());
        let err = source.fetch().await.unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse records"));
    }
}
