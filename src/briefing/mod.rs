//! Briefing aggregation over pluggable sources.

pub mod engine;
pub mod sources;

pub use engine::{rank_records, BriefingEngine};
pub use sources::{JsonFileSource, SourceAdapter, StaticSource};
