//! Human-in-the-loop approval of proposed actions.
//!
//! A proposal starts `pending` and moves exactly once to `approved` or
//! `rejected`. The transition is a conditional `UPDATE ... WHERE status =
//! 'pending'` inside an immediate transaction, so two racing resolutions of
//! the same proposal produce one winner and one `AlreadyResolved`.

use crate::errors::{ApprovalError, StoreError};
use crate::models::{ActionProposal, ApprovalStatus, NewProposal};
use crate::store::{from_millis, now, to_millis, Store};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Default number of entries returned by [`ApprovalGate::get_audit_log`].
pub const DEFAULT_AUDIT_LIMIT: usize = 1000;

const SELECT_COLUMNS: &str = "SELECT id, user_id, action, description, source, context, status,
        rejection_reason, created_at, resolved_at FROM proposals";

/// Proposal ledger plus the pending/approved/rejected state machine.
pub struct ApprovalGate {
    store: Arc<Store>,
    audit_limit: usize,
}

impl ApprovalGate {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            audit_limit: DEFAULT_AUDIT_LIMIT,
        }
    }

    /// Override the default audit log length.
    pub fn with_audit_limit(mut self, limit: usize) -> Self {
        self.audit_limit = limit;
        self
    }

    /// Record a new pending proposal.
    pub fn propose(&self, input: NewProposal) -> Result<ActionProposal, StoreError> {
        let created_at = now();
        let context = input
            .context
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let id = self.store.write(|tx| {
            tx.execute(
                "INSERT INTO proposals
                    (user_id, action, description, source, context, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6)",
                params![
                    input.user_id,
                    input.action,
                    input.description,
                    input.source,
                    context,
                    to_millis(created_at)
                ],
            )?;
            Ok::<_, StoreError>(tx.last_insert_rowid())
        })?;

        info!(
            "Proposal {} created for {}: {}",
            id, input.user_id, input.action
        );

        Ok(ActionProposal {
            id,
            user_id: input.user_id,
            action: input.action,
            description: input.description,
            source: input.source,
            context: input.context,
            status: ApprovalStatus::Pending,
            rejection_reason: None,
            created_at,
            resolved_at: None,
        })
    }

    pub fn get_by_id(&self, id: i64) -> Result<Option<ActionProposal>, StoreError> {
        self.store.read(|conn| load(conn, id))
    }

    /// Approve a pending proposal.
    pub fn approve(&self, id: i64) -> Result<ActionProposal, ApprovalError> {
        self.resolve(id, ApprovalStatus::Approved, None)
    }

    /// Reject a pending proposal, optionally recording why.
    pub fn reject(&self, id: i64, reason: Option<&str>) -> Result<ActionProposal, ApprovalError> {
        self.resolve(id, ApprovalStatus::Rejected, reason)
    }

    fn resolve(
        &self,
        id: i64,
        status: ApprovalStatus,
        reason: Option<&str>,
    ) -> Result<ActionProposal, ApprovalError> {
        let resolved_at = to_millis(now());

        let proposal = self.store.write(|tx| -> Result<ActionProposal, ApprovalError> {
            let changed = tx.execute(
                "UPDATE proposals SET status = ?1, rejection_reason = ?2, resolved_at = ?3
                 WHERE id = ?4 AND status = 'pending'",
                params![status.as_str(), reason, resolved_at, id],
            )?;

            let current = load(tx, id)?.ok_or(ApprovalError::NotFound { id })?;
            if changed == 0 {
                return Err(ApprovalError::AlreadyResolved {
                    id,
                    status: current.status,
                });
            }
            Ok(current)
        })?;

        info!("Proposal {} {}", id, status);
        Ok(proposal)
    }

    /// Pending proposals for a user, oldest first.
    pub fn list_pending(&self, user_id: &str) -> Result<Vec<ActionProposal>, StoreError> {
        self.store.read(|conn| {
            query(
                conn,
                &format!(
                    "{} WHERE user_id = ?1 AND status = 'pending' ORDER BY created_at ASC, id ASC",
                    SELECT_COLUMNS
                ),
                params![user_id],
            )
        })
    }

    /// Every proposal for a user, newest first, at most `limit` entries.
    pub fn get_audit_log(
        &self,
        user_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ActionProposal>, StoreError> {
        let limit = i64::try_from(limit.unwrap_or(self.audit_limit)).unwrap_or(i64::MAX);

        self.store.read(|conn| {
            query(
                conn,
                &format!(
                    "{} WHERE user_id = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2",
                    SELECT_COLUMNS
                ),
                params![user_id, limit],
            )
        })
    }

    /// Approve every pending proposal for a user with one shared
    /// resolution time. Returns how many were approved.
    pub fn approve_all(&self, user_id: &str) -> Result<usize, StoreError> {
        let resolved_at = to_millis(now());

        let changed = self.store.write(|tx| {
            tx.execute(
                "UPDATE proposals SET status = 'approved', resolved_at = ?1
                 WHERE user_id = ?2 AND status = 'pending'",
                params![resolved_at, user_id],
            )
        })?;

        info!("Approved {} pending proposals for {}", changed, user_id);
        Ok(changed)
    }
}

fn load(conn: &Connection, id: i64) -> Result<Option<ActionProposal>, StoreError> {
    let raw = conn
        .query_row(
            &format!("{} WHERE id = ?1", SELECT_COLUMNS),
            [id],
            RawProposal::from_row,
        )
        .optional()?;

    raw.map(RawProposal::into_proposal).transpose()
}

fn query(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<ActionProposal>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let mapped = stmt.query_map(params, RawProposal::from_row)?;
    let rows = mapped.collect::<Result<Vec<_>, rusqlite::Error>>()?;
    debug!("Loaded {} proposals", rows.len());

    rows.into_iter().map(RawProposal::into_proposal).collect()
}

struct RawProposal {
    id: i64,
    user_id: String,
    action: String,
    description: String,
    source: String,
    context: Option<String>,
    status: String,
    rejection_reason: Option<String>,
    created_at: i64,
    resolved_at: Option<i64>,
}

impl RawProposal {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            action: row.get(2)?,
            description: row.get(3)?,
            source: row.get(4)?,
            context: row.get(5)?,
            status: row.get(6)?,
            rejection_reason: row.get(7)?,
            created_at: row.get(8)?,
            resolved_at: row.get(9)?,
        })
    }

    fn into_proposal(self) -> Result<ActionProposal, StoreError> {
        let status = self
            .status
            .parse::<ApprovalStatus>()
            .map_err(|reason| StoreError::Corrupt {
                table: "proposals",
                reason,
            })?;
        let context: Option<Value> = self
            .context
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        let resolved_at: Option<DateTime<Utc>> = self
            .resolved_at
            .map(|ms| from_millis("proposals", ms))
            .transpose()?;

        Ok(ActionProposal {
            id: self.id,
            user_id: self.user_id,
            action: self.action,
            description: self.description,
            source: self.source,
            context,
            status,
            rejection_reason: self.rejection_reason,
            created_at: from_millis("proposals", self.created_at)?,
            resolved_at,
        })
    }
}
