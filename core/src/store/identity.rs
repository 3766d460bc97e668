use super::{flag, is_unique_violation, not_found_as, CivicStore};
use crate::{
    error::{CivicError, CivicResult},
    identity::{UserProfile, Volunteer},
    types::Locality,
};
use rusqlite::{params, OptionalExtension};

fn user_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserProfile> {
    Ok(UserProfile {
        user_id: row.get(0)?,
        email: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        address: row.get(4)?,
        city: row.get(5)?,
        state: row.get(6)?,
        phone_number: row.get(7)?,
        locality: Locality {
            ward: row.get(8)?,
            zone: row.get(9)?,
            area: row.get(10)?,
        },
        is_admin: row.get::<_, i32>(11)? != 0,
        joined_at: row.get(12)?,
    })
}

fn volunteer_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<Volunteer> {
    Ok(Volunteer {
        user_id: row.get(0)?,
        locality: Locality {
            ward: Some(row.get(1)?),
            zone: Some(row.get(2)?),
            area: Some(row.get(3)?),
        },
        is_approved: row.get::<_, i32>(4)? != 0,
    })
}

impl CivicStore {
    // ── Users ──────────────────────────────────────────────────────

    pub fn insert_user(&self, u: &UserProfile) -> CivicResult<()> {
        let result = self.conn.execute(
            "INSERT INTO app_user (
                user_id, email, first_name, last_name, address, city, state,
                phone_number, ward, zone, area, is_admin, joined_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                &u.user_id,
                &u.email,
                &u.first_name,
                &u.last_name,
                u.address.as_deref(),
                u.city.as_deref(),
                u.state.as_deref(),
                u.phone_number.as_deref(),
                u.locality.ward.as_deref(),
                u.locality.zone.as_deref(),
                u.locality.area.as_deref(),
                flag(u.is_admin),
                u.joined_at,
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(CivicError::InvalidRequest(format!(
                "user {} or email {} already registered",
                u.user_id, u.email
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Overwrite the editable profile fields. Email, admin flag and join
    /// date are not touched.
    pub fn update_user(&self, u: &UserProfile) -> CivicResult<()> {
        let changed = self.conn.execute(
            "UPDATE app_user SET first_name = ?1, last_name = ?2, address = ?3, city = ?4,
                state = ?5, phone_number = ?6, ward = ?7, zone = ?8, area = ?9
             WHERE user_id = ?10",
            params![
                &u.first_name,
                &u.last_name,
                u.address.as_deref(),
                u.city.as_deref(),
                u.state.as_deref(),
                u.phone_number.as_deref(),
                u.locality.ward.as_deref(),
                u.locality.zone.as_deref(),
                u.locality.area.as_deref(),
                &u.user_id,
            ],
        )?;
        if changed == 0 {
            return Err(CivicError::not_found("user", &u.user_id));
        }
        Ok(())
    }

    pub fn get_user(&self, user_id: &str) -> CivicResult<UserProfile> {
        self.find_user(user_id)?
            .ok_or_else(|| CivicError::not_found("user", user_id))
    }

    pub fn find_user(&self, user_id: &str) -> CivicResult<Option<UserProfile>> {
        self.conn
            .query_row(
                "SELECT user_id, email, first_name, last_name, address, city, state,
                        phone_number, ward, zone, area, is_admin, joined_at
                 FROM app_user WHERE user_id = ?1",
                params![user_id],
                user_row_mapper,
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn admin_user_ids(&self) -> CivicResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT user_id FROM app_user WHERE is_admin = 1 ORDER BY user_id ASC")?;
        let rows = stmt.query_map([], |r| r.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ── Volunteers ─────────────────────────────────────────────────

    pub fn upsert_volunteer(&self, user_id: &str, ward: &str, zone: &str, area: &str) -> CivicResult<()> {
        // Re-registering moves the volunteer but keeps the approval state.
        self.conn.execute(
            "INSERT INTO volunteer (user_id, ward, zone, area, is_approved)
             VALUES (?1, ?2, ?3, ?4, 0)
             ON CONFLICT(user_id) DO UPDATE SET ward = ?2, zone = ?3, area = ?4",
            params![user_id, ward, zone, area],
        )?;
        Ok(())
    }

    pub fn get_volunteer(&self, user_id: &str) -> CivicResult<Volunteer> {
        self.conn
            .query_row(
                "SELECT user_id, ward, zone, area, is_approved FROM volunteer WHERE user_id = ?1",
                params![user_id],
                volunteer_row_mapper,
            )
            .map_err(not_found_as("volunteer", user_id.to_string()))
    }

    pub fn set_volunteer_approved(&self, user_id: &str, approved: bool) -> CivicResult<()> {
        let changed = self.conn.execute(
            "UPDATE volunteer SET is_approved = ?1 WHERE user_id = ?2",
            params![flag(approved), user_id],
        )?;
        if changed == 0 {
            return Err(CivicError::not_found("volunteer", user_id));
        }
        Ok(())
    }

    pub fn user_count(&self) -> CivicResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM app_user", [], |r| r.get(0))?)
    }
}
