use super::{is_unique_violation, CivicStore};
use crate::{error::CivicResult, types::ComplaintId};
use chrono::{DateTime, Utc};
use rusqlite::params;

impl CivicStore {
    // ── Support ledger ─────────────────────────────────────────────

    /// Record a support. Returns false if the user already supports the
    /// complaint; the unique constraint is the arbiter, not a prior read.
    pub fn insert_support(
        &self,
        complaint_id: ComplaintId,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> CivicResult<bool> {
        let result = self.conn.execute(
            "INSERT INTO complaint_support (complaint_id, user_id, created_at)
             VALUES (?1, ?2, ?3)",
            params![complaint_id, user_id, at],
        );
        match result {
            Ok(_) => Ok(true),
            Err(e) if is_unique_violation(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub fn count_supports(&self, complaint_id: ComplaintId) -> CivicResult<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM complaint_support WHERE complaint_id = ?1",
            params![complaint_id],
            |r| r.get(0),
        )?)
    }

    /// Recompute the denormalized counter from the ledger and return it.
    pub fn refresh_support_count(&self, complaint_id: ComplaintId) -> CivicResult<i64> {
        let count = self.count_supports(complaint_id)?;
        self.conn.execute(
            "UPDATE complaint SET support_count = ?1 WHERE complaint_id = ?2",
            params![count, complaint_id],
        )?;
        Ok(count)
    }

    pub fn stored_support_count(&self, complaint_id: ComplaintId) -> CivicResult<i64> {
        Ok(self.conn.query_row(
            "SELECT support_count FROM complaint WHERE complaint_id = ?1",
            params![complaint_id],
            |r| r.get(0),
        )?)
    }

    pub fn has_supported(&self, complaint_id: ComplaintId, user_id: &str) -> CivicResult<bool> {
        Ok(self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM complaint_support WHERE complaint_id = ?1 AND user_id = ?2)",
            params![complaint_id, user_id],
            |r| r.get(0),
        )?)
    }
}
