//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use civicpulse_core::{
    complaint_subsystem::{Complaint, NewComplaint},
    engine::CivicEngine,
    identity::{Actor, UserProfile},
    types::Locality,
};

pub const WARD: &str = "Ward 7";
pub const ZONE: &str = "East";
pub const AREA: &str = "Lakeside";

/// Register a citizen with a complete profile.
pub fn citizen(engine: &CivicEngine, user_id: &str) -> Actor {
    let mut profile = UserProfile::new(user_id, format!("{user_id}@example.org"));
    profile.first_name = "Test".into();
    profile.last_name = user_id.into();
    profile.phone_number = Some("555-0100".into());
    profile.address = Some("1 Civic Way".into());
    profile.city = Some("Springfield".into());
    engine.identity.register_user(profile).unwrap();
    engine.identity.resolve(user_id).unwrap()
}

pub fn admin(engine: &CivicEngine, user_id: &str) -> Actor {
    let mut profile = UserProfile::new(user_id, format!("{user_id}@example.org"));
    profile.first_name = "Admin".into();
    profile.is_admin = true;
    engine.identity.register_user(profile).unwrap();
    engine.identity.resolve(user_id).unwrap()
}

/// Register and approve a volunteer covering WARD / ZONE / AREA.
pub fn volunteer(engine: &CivicEngine, approver: &Actor, user_id: &str) -> Actor {
    citizen(engine, user_id);
    engine
        .identity
        .register_volunteer(user_id, WARD, ZONE, AREA)
        .unwrap();
    engine.identity.approve_volunteer(approver, user_id).unwrap();
    engine.identity.resolve(user_id).unwrap()
}

pub fn file(engine: &CivicEngine, owner: &Actor, title: &str, description: &str) -> Complaint {
    engine
        .complaints
        .file_complaint(
            &owner.user_id,
            NewComplaint {
                title: title.into(),
                description: description.into(),
                ..NewComplaint::default()
            },
        )
        .unwrap()
}

pub fn locality() -> Locality {
    Locality {
        ward: Some(WARD.into()),
        zone: Some(ZONE.into()),
        area: Some(AREA.into()),
    }
}
