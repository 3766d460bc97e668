//! Identity directory: the slice of user and volunteer data the core needs
//! to authorise transitions and support.
//!
//! Token verification happens upstream. Callers hand in an already
//! authenticated user id and the directory resolves what that user may do.

use crate::{
    clock::Clock,
    error::{CivicError, CivicResult},
    store::CivicStore,
    types::{Locality, UserId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub phone_number: Option<String>,
    pub locality: Locality,
    pub is_admin: bool,
    pub joined_at: DateTime<Utc>,
}

fn filled(field: Option<&str>) -> bool {
    field.is_some_and(|v| !v.trim().is_empty())
}

impl UserProfile {
    /// Minimal profile for a fresh account. `joined_at` is overwritten on
    /// registration.
    pub fn new(user_id: impl Into<UserId>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            first_name: String::new(),
            last_name: String::new(),
            address: None,
            city: None,
            state: None,
            phone_number: None,
            locality: Locality::default(),
            is_admin: false,
            joined_at: DateTime::<Utc>::MIN_UTC,
        }
    }

    /// A complete profile is required before a user may support complaints.
    pub fn profile_complete(&self) -> bool {
        filled(Some(self.first_name.as_str()))
            && filled(self.phone_number.as_deref())
            && filled(self.address.as_deref())
            && filled(self.city.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volunteer {
    pub user_id: UserId,
    pub locality: Locality,
    pub is_approved: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Citizen,
    Volunteer,
    Admin,
}

/// An authenticated caller and the role it acts in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

pub struct IdentityDirectory {
    store: CivicStore,
    clock: Arc<dyn Clock>,
}

impl IdentityDirectory {
    pub fn new(store: CivicStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn register_user(&self, mut profile: UserProfile) -> CivicResult<UserProfile> {
        if profile.user_id.trim().is_empty() || profile.email.trim().is_empty() {
            return Err(CivicError::InvalidRequest(
                "user id and email are required".into(),
            ));
        }
        profile.joined_at = self.clock.now();
        self.store.insert_user(&profile)?;
        log::info!("Registered user {}", profile.user_id);
        Ok(profile)
    }

    pub fn update_profile(&self, profile: &UserProfile) -> CivicResult<UserProfile> {
        self.store.update_user(profile)?;
        self.store.get_user(&profile.user_id)
    }

    pub fn profile(&self, user_id: &str) -> CivicResult<UserProfile> {
        self.store.get_user(user_id)
    }

    pub fn register_volunteer(
        &self,
        user_id: &str,
        ward: &str,
        zone: &str,
        area: &str,
    ) -> CivicResult<Volunteer> {
        if [ward, zone, area].iter().any(|v| v.trim().is_empty()) {
            return Err(CivicError::InvalidRequest(
                "ward, zone and area are required".into(),
            ));
        }
        self.store.get_user(user_id)?;
        self.store
            .upsert_volunteer(user_id, ward.trim(), zone.trim(), area.trim())?;
        log::info!("Volunteer registration for {user_id} in ward {ward}");
        self.store.get_volunteer(user_id)
    }

    pub fn approve_volunteer(&self, admin: &Actor, volunteer_id: &str) -> CivicResult<Volunteer> {
        if !admin.is_admin() {
            return Err(CivicError::Forbidden(
                "only administrators can approve volunteers".into(),
            ));
        }
        self.store.set_volunteer_approved(volunteer_id, true)?;
        log::info!("Volunteer {volunteer_id} approved by {}", admin.user_id);
        self.store.get_volunteer(volunteer_id)
    }

    /// Registration state of a volunteer. NotFound if never registered.
    pub fn check_approval(&self, user_id: &str) -> CivicResult<Volunteer> {
        self.store.get_volunteer(user_id)
    }

    /// Resolve the role a user acts in.
    pub fn resolve(&self, user_id: &str) -> CivicResult<Actor> {
        let profile = self.store.get_user(user_id)?;
        let role = if profile.is_admin {
            Role::Admin
        } else {
            match self.store.get_volunteer(user_id) {
                Ok(v) if v.is_approved => Role::Volunteer,
                Ok(_) | Err(CivicError::NotFound { .. }) => Role::Citizen,
                Err(e) => return Err(e),
            }
        };
        Ok(Actor {
            user_id: profile.user_id,
            role,
        })
    }
}
