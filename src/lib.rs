//! Briefwise - decision support for a personal workday.
//!
//! Three engines share one SQLite store:
//!
//! - [`briefing::BriefingEngine`] fans out to registered sources and merges
//!   their records into one priority-ranked [`models::Briefing`].
//! - [`analytics::AnalyticsEngine`] keeps per-metric time series and derives
//!   trends, anomalies and insights from them.
//! - [`approval::ApprovalGate`] holds proposed actions until a human
//!   approves or rejects them.

pub mod analytics;
pub mod approval;
pub mod briefing;
pub mod cli;
pub mod config;
pub mod errors;
pub mod models;
pub mod report;
pub mod store;

pub use errors::{ApprovalError, RegistryError, StoreError};
