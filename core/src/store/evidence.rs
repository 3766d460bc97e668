use super::{is_unique_violation, not_found_as, CivicStore};
use crate::{
    error::CivicResult,
    evidence::{ComplaintDocument, VerificationImage},
    types::ComplaintId,
};
use chrono::{DateTime, Utc};
use rusqlite::params;
use std::collections::HashSet;

/// Fields of a verification image that are known before insertion.
pub struct NewImageRow<'a> {
    pub complaint_id: ComplaintId,
    pub volunteer_id: &'a str,
    pub uploaded_at: DateTime<Utc>,
    pub content_type: &'a str,
    pub byte_len: i64,
    pub content_hash: Option<&'a str>,
    pub sharpness: Option<f64>,
    pub payload_ref: &'a str,
}

fn image_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<VerificationImage> {
    Ok(VerificationImage {
        id: row.get(0)?,
        complaint_id: row.get(1)?,
        volunteer_id: row.get(2)?,
        uploaded_at: row.get(3)?,
        content_type: row.get(4)?,
        byte_len: row.get(5)?,
        content_hash: row.get(6)?,
        sharpness: row.get(7)?,
        payload_ref: row.get(8)?,
    })
}

fn document_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<ComplaintDocument> {
    Ok(ComplaintDocument {
        id: row.get(0)?,
        complaint_id: row.get(1)?,
        file_name: row.get(2)?,
        file_size: row.get(3)?,
        uploaded_at: row.get(4)?,
    })
}

impl CivicStore {
    // ── Verification images ────────────────────────────────────────

    /// Content hashes of every image already attached to the complaint.
    pub fn image_hashes(&self, complaint_id: ComplaintId) -> CivicResult<HashSet<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT content_hash FROM verification_image
             WHERE complaint_id = ?1 AND content_hash IS NOT NULL",
        )?;
        let rows = stmt.query_map(params![complaint_id], |r| r.get::<_, String>(0))?;
        rows.collect::<Result<HashSet<_>, _>>().map_err(Into::into)
    }

    /// Insert an image row. Returns `Ok(None)` when an image with the same
    /// hash is already attached to the complaint.
    pub fn insert_image(&self, img: &NewImageRow<'_>) -> CivicResult<Option<i64>> {
        let result = self.conn.execute(
            "INSERT INTO verification_image
                (complaint_id, volunteer_id, uploaded_at, content_type, byte_len,
                 content_hash, sharpness, payload_ref)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                img.complaint_id,
                img.volunteer_id,
                img.uploaded_at,
                img.content_type,
                img.byte_len,
                img.content_hash,
                img.sharpness,
                img.payload_ref,
            ],
        );
        match result {
            Ok(_) => Ok(Some(self.conn.last_insert_rowid())),
            Err(e) if is_unique_violation(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn images(&self, complaint_id: ComplaintId) -> CivicResult<Vec<VerificationImage>> {
        let mut stmt = self.conn.prepare(
            "SELECT image_id, complaint_id, volunteer_id, uploaded_at, content_type,
                    byte_len, content_hash, sharpness, payload_ref
             FROM verification_image WHERE complaint_id = ?1 ORDER BY image_id ASC",
        )?;
        let rows = stmt.query_map(params![complaint_id], image_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ── Citizen documents ──────────────────────────────────────────

    pub fn insert_document(
        &self,
        complaint_id: ComplaintId,
        file_name: &str,
        file_size: i64,
        uploaded_at: DateTime<Utc>,
    ) -> CivicResult<i64> {
        self.conn.execute(
            "INSERT INTO complaint_document (complaint_id, file_name, file_size, uploaded_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![complaint_id, file_name, file_size, uploaded_at],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_document(&self, document_id: i64) -> CivicResult<ComplaintDocument> {
        self.conn
            .query_row(
                "SELECT document_id, complaint_id, file_name, file_size, uploaded_at
                 FROM complaint_document WHERE document_id = ?1",
                params![document_id],
                document_row_mapper,
            )
            .map_err(not_found_as("document", document_id))
    }

    pub fn delete_document(&self, document_id: i64) -> CivicResult<()> {
        self.conn.execute(
            "DELETE FROM complaint_document WHERE document_id = ?1",
            params![document_id],
        )?;
        Ok(())
    }

    pub fn documents(&self, complaint_id: ComplaintId) -> CivicResult<Vec<ComplaintDocument>> {
        let mut stmt = self.conn.prepare(
            "SELECT document_id, complaint_id, file_name, file_size, uploaded_at
             FROM complaint_document WHERE complaint_id = ?1 ORDER BY document_id ASC",
        )?;
        let rows = stmt.query_map(params![complaint_id], document_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
