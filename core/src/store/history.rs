use super::CivicStore;
use crate::{
    complaint_subsystem::{HistoryAction, HistoryEntry},
    error::CivicResult,
    types::{ComplaintId, ComplaintStatus},
};
use chrono::{DateTime, Utc};
use rusqlite::{params, types::Type};

fn history_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<HistoryEntry> {
    let action: String = row.get(3)?;
    let status_after: String = row.get(4)?;
    Ok(HistoryEntry {
        seq: row.get(0)?,
        at: row.get(1)?,
        actor_id: row.get(2)?,
        action: action
            .parse::<HistoryAction>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, e.into()))?,
        status_after: status_after
            .parse::<ComplaintStatus>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, e.into()))?,
        notes: row.get(5)?,
    })
}

impl CivicStore {
    // ── Status history ─────────────────────────────────────────────

    /// Append the next entry for `complaint_id` and return its sequence
    /// number. Must run inside `immediate()` alongside the state write.
    pub fn append_history(
        &self,
        complaint_id: ComplaintId,
        at: DateTime<Utc>,
        actor_id: &str,
        action: HistoryAction,
        status_after: ComplaintStatus,
        notes: Option<&str>,
    ) -> CivicResult<u32> {
        let seq: u32 = self.conn.query_row(
            "SELECT COALESCE(MAX(seq), 0) + 1 FROM status_history WHERE complaint_id = ?1",
            params![complaint_id],
            |r| r.get(0),
        )?;
        self.conn.execute(
            "INSERT INTO status_history
                (complaint_id, seq, at, actor_id, action, status_after, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                complaint_id,
                seq,
                at,
                actor_id,
                action.as_str(),
                status_after.as_str(),
                notes,
            ],
        )?;
        Ok(seq)
    }

    pub fn history(&self, complaint_id: ComplaintId) -> CivicResult<Vec<HistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, at, actor_id, action, status_after, notes
             FROM status_history WHERE complaint_id = ?1 ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map(params![complaint_id], history_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
