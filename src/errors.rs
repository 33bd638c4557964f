//! Error types.
//!
//! Only configuration faults (duplicate source registration) and proposal
//! state conflicts surface as errors. Source failures and insufficient
//! metric history are reported as data instead.

use crate::models::ApprovalStatus;
use thiserror::Error;

/// Failures of the SQLite backing store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),

    #[error("Failed to encode stored value: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt row in {table}: {reason}")]
    Corrupt { table: &'static str, reason: String },
}

/// Source registry misconfiguration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Source \"{name}\" is already registered")]
    DuplicateSource { name: String },
}

/// Faults raised by the approval state machine.
#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("Proposal {id} not found")]
    NotFound { id: i64 },

    #[error("Proposal {id} is already resolved ({status})")]
    AlreadyResolved { id: i64, status: ApprovalStatus },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<rusqlite::Error> for ApprovalError {
    fn from(e: rusqlite::Error) -> Self {
        ApprovalError::Store(StoreError::Sqlite(e))
    }
}

impl ApprovalError {
    /// True for the two caller-visible state conflicts.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            ApprovalError::NotFound { .. } | ApprovalError::AlreadyResolved { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_resolved_message_carries_status() {
        let err = ApprovalError::AlreadyResolved {
            id: 7,
            status: ApprovalStatus::Approved,
        };
        assert_eq!(err.to_string(), "Proposal 7 is already resolved (approved)");
        assert!(err.is_conflict());
    }

    #[test]
    fn test_duplicate_source_message() {
        let err = RegistryError::DuplicateSource {
            name: "gmail".to_string(),
        };
        assert_eq!(err.to_string(), "Source \"gmail\" is already registered");
    }

    #[test]
    fn test_store_error_is_not_conflict() {
        let err = ApprovalError::from(StoreError::Migration("boom".to_string()));
        assert!(!err.is_conflict());
    }
}
