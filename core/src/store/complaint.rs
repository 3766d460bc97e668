use super::{flag, is_unique_violation, not_found_as, CivicStore};
use crate::{
    complaint_subsystem::Complaint,
    error::CivicResult,
    types::{ComplaintId, ComplaintStatus, Department, Locality},
};
use rusqlite::{params, types::Type, OptionalExtension};

const COMPLAINT_COLUMNS: &str = "complaint_id, tracking_code, owner_id, title, description,
    department, department_confidence, latitude, longitude, location, ward, zone, area,
    status, is_public, support_count, is_escalated, verified_by_volunteer, verified_by,
    volunteer_verified_at, verification_notes, admin_verified, admin_verified_at,
    flag_for_admin_review, admin_review_reason, created_at, updated_at";

fn parse_column<T: std::str::FromStr<Err = String>>(
    idx: usize,
    raw: String,
) -> rusqlite::Result<T> {
    raw.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into())
    })
}

// Helper function for mapping complaint rows
fn complaint_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<Complaint> {
    Ok(Complaint {
        id: row.get(0)?,
        tracking_code: row.get(1)?,
        owner_id: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        department: parse_column::<Department>(5, row.get(5)?)?,
        department_confidence: row.get(6)?,
        latitude: row.get(7)?,
        longitude: row.get(8)?,
        location: row.get(9)?,
        locality: Locality {
            ward: row.get(10)?,
            zone: row.get(11)?,
            area: row.get(12)?,
        },
        status: parse_column::<ComplaintStatus>(13, row.get(13)?)?,
        is_public: row.get::<_, i32>(14)? != 0,
        support_count: row.get(15)?,
        is_escalated: row.get::<_, i32>(16)? != 0,
        verified_by_volunteer: row.get::<_, i32>(17)? != 0,
        verified_by: row.get(18)?,
        volunteer_verified_at: row.get(19)?,
        verification_notes: row.get(20)?,
        admin_verified: row.get::<_, i32>(21)? != 0,
        admin_verified_at: row.get(22)?,
        flag_for_admin_review: row.get::<_, i32>(23)? != 0,
        admin_review_reason: row.get(24)?,
        created_at: row.get(25)?,
        updated_at: row.get(26)?,
    })
}

impl CivicStore {
    // ── Complaint ──────────────────────────────────────────────────

    /// Insert a new complaint. `c.id` is ignored; the assigned id is
    /// returned. Returns `Ok(None)` if the tracking code is already taken.
    pub fn insert_complaint(&self, c: &Complaint) -> CivicResult<Option<ComplaintId>> {
        let result = self.conn.execute(
            "INSERT INTO complaint (
                tracking_code, owner_id, title, description, department,
                department_confidence, latitude, longitude, location, ward, zone, area,
                status, is_public, support_count, is_escalated, verified_by_volunteer,
                verified_by, volunteer_verified_at, verification_notes, admin_verified,
                admin_verified_at, flag_for_admin_review, admin_review_reason,
                created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                       ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26)",
            params![
                &c.tracking_code,
                &c.owner_id,
                &c.title,
                &c.description,
                c.department.label(),
                c.department_confidence,
                c.latitude,
                c.longitude,
                c.location.as_deref(),
                c.locality.ward.as_deref(),
                c.locality.zone.as_deref(),
                c.locality.area.as_deref(),
                c.status.as_str(),
                flag(c.is_public),
                c.support_count,
                flag(c.is_escalated),
                flag(c.verified_by_volunteer),
                c.verified_by.as_deref(),
                c.volunteer_verified_at,
                &c.verification_notes,
                flag(c.admin_verified),
                c.admin_verified_at,
                flag(c.flag_for_admin_review),
                &c.admin_review_reason,
                c.created_at,
                c.updated_at,
            ],
        );
        match result {
            Ok(_) => Ok(Some(self.conn.last_insert_rowid())),
            Err(e) if is_unique_violation(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_complaint(&self, complaint_id: ComplaintId) -> CivicResult<Complaint> {
        self.conn
            .query_row(
                &format!("SELECT {COMPLAINT_COLUMNS} FROM complaint WHERE complaint_id = ?1"),
                params![complaint_id],
                complaint_row_mapper,
            )
            .map_err(not_found_as("complaint", complaint_id))
    }

    pub fn find_by_tracking_code(&self, tracking_code: &str) -> CivicResult<Option<Complaint>> {
        self.conn
            .query_row(
                &format!("SELECT {COMPLAINT_COLUMNS} FROM complaint WHERE tracking_code = ?1"),
                params![tracking_code],
                complaint_row_mapper,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Persist every mutable lifecycle column. Identity, text, department
    /// and tracking code are never rewritten here.
    pub fn save_complaint_state(&self, c: &Complaint) -> CivicResult<()> {
        self.conn.execute(
            "UPDATE complaint SET
                status = ?1, is_public = ?2, is_escalated = ?3,
                verified_by_volunteer = ?4, verified_by = ?5, volunteer_verified_at = ?6,
                verification_notes = ?7, admin_verified = ?8, admin_verified_at = ?9,
                flag_for_admin_review = ?10, admin_review_reason = ?11, updated_at = ?12
             WHERE complaint_id = ?13",
            params![
                c.status.as_str(),
                flag(c.is_public),
                flag(c.is_escalated),
                flag(c.verified_by_volunteer),
                c.verified_by.as_deref(),
                c.volunteer_verified_at,
                &c.verification_notes,
                flag(c.admin_verified),
                c.admin_verified_at,
                flag(c.flag_for_admin_review),
                &c.admin_review_reason,
                c.updated_at,
                c.id,
            ],
        )?;
        Ok(())
    }

    pub fn flag_complaint_for_review(
        &self,
        complaint_id: ComplaintId,
        reason: &str,
        at: chrono::DateTime<chrono::Utc>,
    ) -> CivicResult<()> {
        self.conn.execute(
            "UPDATE complaint SET flag_for_admin_review = 1, admin_review_reason = ?1,
                updated_at = ?2
             WHERE complaint_id = ?3",
            params![reason, at, complaint_id],
        )?;
        Ok(())
    }

    /// Public complaints, newest first, optionally for one department.
    pub fn public_complaints(&self, department: Option<Department>) -> CivicResult<Vec<Complaint>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COMPLAINT_COLUMNS} FROM complaint
             WHERE is_public = 1 AND (?1 IS NULL OR department = ?1)
             ORDER BY created_at DESC, complaint_id DESC"
        ))?;
        let rows = stmt.query_map(params![department.map(|d| d.label())], complaint_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn complaints_for_owner(&self, owner_id: &str) -> CivicResult<Vec<Complaint>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COMPLAINT_COLUMNS} FROM complaint WHERE owner_id = ?1
             ORDER BY created_at DESC, complaint_id DESC"
        ))?;
        let rows = stmt.query_map(params![owner_id], complaint_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Complaints a volunteer assigned to `locality` should look at:
    /// any locality component matches, and the complaint is not closed as
    /// rejected. Oldest first so the backlog drains in filing order.
    pub fn complaints_in_locality(&self, locality: &Locality) -> CivicResult<Vec<Complaint>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COMPLAINT_COLUMNS} FROM complaint
             WHERE status != 'rejected'
               AND ((?1 IS NOT NULL AND ward = ?1)
                 OR (?2 IS NOT NULL AND zone = ?2)
                 OR (?3 IS NOT NULL AND area = ?3))
             ORDER BY created_at ASC, complaint_id ASC"
        ))?;
        let rows = stmt.query_map(
            params![
                locality.ward.as_deref(),
                locality.zone.as_deref(),
                locality.area.as_deref()
            ],
            complaint_row_mapper,
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn complaint_count(&self) -> CivicResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM complaint", [], |r| r.get(0))?)
    }

    pub fn complaint_counts_by_status(&self) -> CivicResult<Vec<(ComplaintStatus, i64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM complaint GROUP BY status")?;
        let rows = stmt.query_map([], |r| {
            Ok((parse_column::<ComplaintStatus>(0, r.get(0)?)?, r.get(1)?))
        })?;
        let mut counts = rows.collect::<Result<Vec<_>, _>>()?;
        counts.sort_by_key(|(status, _)| {
            ComplaintStatus::ALL.iter().position(|s| s == status)
        });
        Ok(counts)
    }

    pub fn complaint_counts_by_department(&self) -> CivicResult<Vec<(Department, i64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT department, COUNT(*) FROM complaint GROUP BY department")?;
        let rows = stmt.query_map([], |r| {
            Ok((parse_column::<Department>(0, r.get(0)?)?, r.get(1)?))
        })?;
        let mut counts = rows.collect::<Result<Vec<_>, _>>()?;
        counts.sort_by_key(|(department, _)| *department);
        Ok(counts)
    }

    pub fn flagged_complaint_count(&self) -> CivicResult<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM complaint WHERE flag_for_admin_review = 1",
            [],
            |r| r.get(0),
        )?)
    }
}
