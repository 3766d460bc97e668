//! Complaint lifecycle tests: creation, volunteer and admin verification,
//! escalation, status override and the history they leave behind.

mod common;

use civicpulse_core::{
    classifier::Classifier,
    complaint_subsystem::{HistoryAction, NewComplaint, ADMIN_REJECT_REASON, DEFAULT_TITLE},
    config::CivicConfig,
    engine::CivicEngine,
    error::{CivicError, ErrorKind},
    geocode::{GeocodeError, Geocoder},
    notify::LogNotifier,
    rng::is_tracking_code,
    types::{ComplaintStatus, Department, Locality},
};
use common::{admin, citizen, file, volunteer};
use std::sync::{Arc, Barrier};

#[test]
fn new_complaint_starts_pending_public_and_classified() {
    let t = CivicEngine::build_test().unwrap();
    let owner = citizen(&t, "asha");

    let c = file(&t, &owner, "", "Water pipe leak near the school gate");

    assert_eq!(c.status, ComplaintStatus::Pending);
    assert!(c.is_public, "Complaints are public by default");
    assert_eq!(c.title, DEFAULT_TITLE);
    assert_eq!(c.department, Department::Water);
    assert!(c.department_confidence > 0.0);
    assert!(is_tracking_code(&c.tracking_code), "Bad code {}", c.tracking_code);
    assert!(!c.verified_by_volunteer && !c.admin_verified && !c.is_escalated);
    assert_eq!(c.support_count, 0);
    assert!(
        t.complaints.history(c.id).unwrap().is_empty(),
        "Creation must not append a history entry"
    );
    assert_eq!(t.notifier.titles(), vec!["Complaint received"]);
}

#[test]
fn blank_description_is_rejected() {
    let t = CivicEngine::build_test().unwrap();
    let owner = citizen(&t, "asha");
    let err = t
        .complaints
        .file_complaint(
            &owner.user_id,
            NewComplaint {
                title: "Something".into(),
                description: "   ".into(),
                ..NewComplaint::default()
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
}

#[test]
fn unknown_owner_cannot_file() {
    let t = CivicEngine::build_test().unwrap();
    let err = t
        .complaints
        .file_complaint(
            "ghost",
            NewComplaint {
                description: "pothole".into(),
                ..NewComplaint::default()
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn tracking_codes_are_unique_and_trackable() {
    let t = CivicEngine::build_test().unwrap();
    let owner = citizen(&t, "asha");
    let a = file(&t, &owner, "One", "Street light broken");
    let b = file(&t, &owner, "Two", "Garbage pile near market");
    assert_ne!(a.tracking_code, b.tracking_code);

    let found = t.complaints.track(&a.tracking_code.to_lowercase()).unwrap();
    assert_eq!(found.id, a.id);
    assert_eq!(t.complaints.track("NOT-A-CODE").unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(t.complaints.track("000000000000").unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn volunteer_approval_moves_to_in_progress() {
    let t = CivicEngine::build_test().unwrap();
    let root = admin(&t, "root");
    let owner = citizen(&t, "asha");
    let vol = volunteer(&t, &root, "vikram");
    let c = file(&t, &owner, "Leak", "Water pipe leak");

    let c = t
        .complaints
        .volunteer_verify(&vol, c.id, "verified", "Confirmed on site")
        .unwrap();

    assert!(c.verified_by_volunteer);
    assert_eq!(c.verified_by.as_deref(), Some("vikram"));
    assert!(c.volunteer_verified_at.is_some());
    assert_eq!(c.verification_notes, "Confirmed on site");
    assert_eq!(c.status, ComplaintStatus::InProgress);

    let history = t.complaints.history(c.id).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].seq, 1);
    assert_eq!(history[0].action, HistoryAction::VolunteerApproved);
    assert_eq!(history[0].actor_id, "vikram");
    assert_eq!(history[0].notes.as_deref(), Some("Confirmed on site"));
}

#[test]
fn volunteer_rejection_closes_complaint() {
    let t = CivicEngine::build_test().unwrap();
    let root = admin(&t, "root");
    let owner = citizen(&t, "asha");
    let vol = volunteer(&t, &root, "vikram");
    let c = file(&t, &owner, "Leak", "Water pipe leak");

    let c = t.complaints.volunteer_verify(&vol, c.id, "rejected", "").unwrap();

    assert!(!c.verified_by_volunteer);
    assert_eq!(c.verified_by.as_deref(), Some("vikram"));
    assert_eq!(c.status, ComplaintStatus::Rejected);
    let history = t.complaints.history(c.id).unwrap();
    assert_eq!(history[0].action, HistoryAction::VolunteerRejected);
    assert_eq!(history[0].notes, None);
}

#[test]
fn volunteer_guards() {
    let t = CivicEngine::build_test().unwrap();
    let owner = citizen(&t, "asha");
    let c = file(&t, &owner, "Leak", "Water pipe leak");

    // Not registered as a volunteer at all.
    let err = t.complaints.volunteer_verify(&owner, c.id, "verified", "").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // Registered but not approved.
    let pending = citizen(&t, "pending-vol");
    t.identity
        .register_volunteer("pending-vol", common::WARD, common::ZONE, common::AREA)
        .unwrap();
    let err = t.complaints.volunteer_verify(&pending, c.id, "verified", "").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    // Bad action token.
    let root = admin(&t, "root");
    let vol = volunteer(&t, &root, "vikram");
    let err = t.complaints.volunteer_verify(&vol, c.id, "maybe", "").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);

    // Unknown complaint.
    let err = t.complaints.volunteer_verify(&vol, 9_999, "verified", "").unwrap_err();
    assert!(matches!(err, CivicError::NotFound { entity: "complaint", .. }));

    assert!(t.complaints.history(c.id).unwrap().is_empty());
}

#[test]
fn admin_accept_publishes() {
    let t = CivicEngine::build_test().unwrap();
    let root = admin(&t, "root");
    let owner = citizen(&t, "asha");
    let vol = volunteer(&t, &root, "vikram");
    let c = file(&t, &owner, "Leak", "Water pipe leak");
    t.complaints.volunteer_verify(&vol, c.id, "verified", "").unwrap();

    let c = t.complaints.admin_verify(&root, c.id, "accept", "Looks right").unwrap();

    assert!(c.admin_verified);
    assert!(c.admin_verified_at.is_some());
    assert!(c.is_public);
    assert!(c.verified_by_volunteer, "Accept keeps the volunteer verification");
    assert_eq!(c.status, ComplaintStatus::InProgress);
    let actions: Vec<_> = t.complaints.history(c.id).unwrap().iter().map(|h| h.action).collect();
    assert_eq!(actions, vec![HistoryAction::VolunteerApproved, HistoryAction::AdminAccepted]);
}

/// An admin reject is a full rollback of the volunteer's claim.
#[test]
fn admin_reject_rolls_back_volunteer_verification() {
    let t = CivicEngine::build_test().unwrap();
    let root = admin(&t, "root");
    let owner = citizen(&t, "asha");
    let vol = volunteer(&t, &root, "vikram");
    let c = file(&t, &owner, "Leak", "Water pipe leak");
    t.complaints.volunteer_verify(&vol, c.id, "verified", "").unwrap();

    let c = t.complaints.admin_verify(&root, c.id, "reject", "").unwrap();

    assert!(!c.verified_by_volunteer);
    assert_eq!(c.verified_by, None);
    assert_eq!(c.volunteer_verified_at, None);
    assert!(!c.admin_verified);
    assert!(c.admin_verified_at.is_some());
    assert!(!c.is_public);
    assert_eq!(c.status, ComplaintStatus::Rejected);
    assert_eq!(c.admin_review_reason, ADMIN_REJECT_REASON);

    let reloaded = t.complaints.get(c.id).unwrap();
    assert_eq!(reloaded, c, "Returned state must match what was committed");

    let history = t.complaints.history(c.id).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].action, HistoryAction::AdminRejected);
    assert_eq!(history[1].status_after, ComplaintStatus::Rejected);

    // The volunteer and the owner both hear about it.
    let last = t.notifier.sent().pop().unwrap();
    assert_eq!(last.title, "Volunteer verification rejected");
    assert!(last.recipients.contains(&"asha".to_string()));
    assert!(last.recipients.contains(&"vikram".to_string()));
}

#[test]
fn admin_reject_records_notes_as_review_reason() {
    let t = CivicEngine::build_test().unwrap();
    let root = admin(&t, "root");
    let owner = citizen(&t, "asha");
    let vol = volunteer(&t, &root, "vikram");
    let c = file(&t, &owner, "Leak", "Water pipe leak");
    t.complaints.volunteer_verify(&vol, c.id, "verified", "").unwrap();

    let c = t
        .complaints
        .admin_verify(&root, c.id, "reject", "Photo is from another street")
        .unwrap();
    assert_eq!(c.admin_review_reason, "Photo is from another street");
}

#[test]
fn admin_verify_requires_volunteer_verification() {
    let t = CivicEngine::build_test().unwrap();
    let root = admin(&t, "root");
    let owner = citizen(&t, "asha");
    let c = file(&t, &owner, "Leak", "Water pipe leak");

    for action in ["accept", "reject"] {
        let err = t.complaints.admin_verify(&root, c.id, action, "").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest, "action {action}");
    }
    let unchanged = t.complaints.get(c.id).unwrap();
    assert!(!unchanged.admin_verified);
    assert_eq!(unchanged.status, ComplaintStatus::Pending);
    assert!(t.complaints.history(c.id).unwrap().is_empty(), "Failed guard must not append");
}

#[test]
fn admin_verify_requires_admin() {
    let t = CivicEngine::build_test().unwrap();
    let root = admin(&t, "root");
    let owner = citizen(&t, "asha");
    let vol = volunteer(&t, &root, "vikram");
    let c = file(&t, &owner, "Leak", "Water pipe leak");
    t.complaints.volunteer_verify(&vol, c.id, "verified", "").unwrap();

    let err = t.complaints.admin_verify(&vol, c.id, "accept", "").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    let err = t.complaints.admin_verify(&root, c.id, "approve", "").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
}

#[test]
fn escalation_needs_volunteer_verification_and_keeps_status() {
    let t = CivicEngine::build_test().unwrap();
    let root = admin(&t, "root");
    let owner = citizen(&t, "asha");
    let vol = volunteer(&t, &root, "vikram");
    let c = file(&t, &owner, "Leak", "Water pipe leak");

    let err = t.complaints.escalate(&owner, c.id, "").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);

    t.complaints.volunteer_verify(&vol, c.id, "verified", "").unwrap();
    let stranger = citizen(&t, "stranger");
    let err = t.complaints.escalate(&stranger, c.id, "").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let c = t.complaints.escalate(&owner, c.id, "Still leaking after a week").unwrap();
    assert!(c.is_escalated);
    assert_eq!(c.status, ComplaintStatus::InProgress);

    let last = t.notifier.sent().pop().unwrap();
    assert_eq!(last.title, "Complaint escalated");
    assert!(last.recipients.contains(&"root".to_string()), "Admins are told about escalations");
}

/// The override is permissive: any of the four statuses, regardless of the
/// verification flags.
#[test]
fn admin_status_override_ignores_verification_axes() {
    let t = CivicEngine::build_test().unwrap();
    let root = admin(&t, "root");
    let owner = citizen(&t, "asha");
    let c = file(&t, &owner, "Leak", "Water pipe leak");

    let c = t.complaints.update_status(&root, c.id, "resolved", "Fixed by crew").unwrap();
    assert_eq!(c.status, ComplaintStatus::Resolved);
    assert!(!c.admin_verified);

    let err = t.complaints.update_status(&root, c.id, "closed", "").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    let err = t.complaints.update_status(&owner, c.id, "pending", "").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let history = t.complaints.history(c.id).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action, HistoryAction::StatusChanged);
    assert_eq!(t.notifier.titles().last().map(String::as_str), Some("Complaint status updated"));
}

/// After K accepted transitions the history has exactly K entries, numbered
/// 1..=K in acceptance order.
#[test]
fn history_length_equals_accepted_transitions() {
    let t = CivicEngine::build_test().unwrap();
    let root = admin(&t, "root");
    let owner = citizen(&t, "asha");
    let vol = volunteer(&t, &root, "vikram");
    let c = file(&t, &owner, "Leak", "Water pipe leak");

    let mut accepted = 0;
    t.complaints.volunteer_verify(&vol, c.id, "verified", "").unwrap();
    accepted += 1;
    assert!(t.complaints.update_status(&root, c.id, "bogus", "").is_err());
    t.complaints.escalate(&root, c.id, "").unwrap();
    accepted += 1;
    t.clock.advance(chrono::Duration::minutes(5));
    t.complaints.admin_verify(&root, c.id, "accept", "").unwrap();
    accepted += 1;
    assert!(t.complaints.admin_verify(&owner, c.id, "accept", "").is_err());
    t.complaints.update_status(&root, c.id, "resolved", "").unwrap();
    accepted += 1;
    t.complaints.admin_verify(&root, c.id, "reject", "").unwrap();
    accepted += 1;

    let history = t.complaints.history(c.id).unwrap();
    assert_eq!(history.len(), accepted);
    let seqs: Vec<u32> = history.iter().map(|h| h.seq).collect();
    assert_eq!(seqs, (1..=accepted as u32).collect::<Vec<_>>());
    assert!(history.windows(2).all(|w| w[0].at <= w[1].at));
    assert_eq!(history.last().unwrap().status_after, ComplaintStatus::Rejected);
}

#[test]
fn volunteer_queue_matches_locality_and_skips_rejected() {
    let geocoder = civicpulse_core::geocode::StaticGeocoder(common::locality());
    let t = CivicEngine::build_test_with(
        civicpulse_core::classifier::Classifier::fallback_only(),
        Some(std::sync::Arc::new(geocoder)),
    )
    .unwrap();
    let root = admin(&t, "root");
    let owner = citizen(&t, "asha");
    let vol = volunteer(&t, &root, "vikram");

    let located = t
        .complaints
        .file_complaint(
            &owner.user_id,
            NewComplaint {
                title: "Pothole".into(),
                description: "Deep pothole on the lane".into(),
                latitude: Some(18.52),
                longitude: Some(73.85),
                location: Some("Lake Rd".into()),
            },
        )
        .unwrap();
    assert_eq!(located.locality, common::locality());
    // No coordinates, so no locality.
    let elsewhere = file(&t, &owner, "Noise", "Loud music at night");
    assert_eq!(elsewhere.locality.ward, None);

    let queue = t.complaints.volunteer_queue(&vol).unwrap();
    assert_eq!(queue.iter().map(|c| c.id).collect::<Vec<_>>(), vec![located.id]);

    t.complaints.volunteer_verify(&vol, located.id, "rejected", "").unwrap();
    assert!(t.complaints.volunteer_queue(&vol).unwrap().is_empty());
}

#[test]
fn public_listing_hides_rejected_by_admin_and_filters_department() {
    let t = CivicEngine::build_test().unwrap();
    let root = admin(&t, "root");
    let owner = citizen(&t, "asha");
    let vol = volunteer(&t, &root, "vikram");
    let water = file(&t, &owner, "Leak", "Water pipe leak");
    let roads = file(&t, &owner, "Pothole", "Pothole on the road");

    let listed: Vec<_> = t.complaints.public_complaints(None).unwrap().iter().map(|c| c.id).collect();
    assert_eq!(listed, vec![roads.id, water.id], "Newest first");

    let only_roads = t.complaints.public_complaints(Some(Department::Roads)).unwrap();
    assert_eq!(only_roads.len(), 1);
    assert_eq!(only_roads[0].id, roads.id);

    t.complaints.volunteer_verify(&vol, water.id, "verified", "").unwrap();
    t.complaints.admin_verify(&root, water.id, "reject", "").unwrap();
    let listed: Vec<_> = t.complaints.public_complaints(None).unwrap().iter().map(|c| c.id).collect();
    assert_eq!(listed, vec![roads.id]);

    assert_eq!(t.complaints.complaints_for_owner("asha").unwrap().len(), 2);
}

struct DownGeocoder;

impl Geocoder for DownGeocoder {
    fn reverse(&self, _lat: f64, _lon: f64) -> Result<Locality, GeocodeError> {
        Err(GeocodeError::Unavailable("upstream timed out".into()))
    }
}

/// A geocoder outage leaves the locality empty; filing still succeeds.
#[test]
fn geocoder_failure_files_without_locality() {
    let t = CivicEngine::build_test_with(Classifier::fallback_only(), Some(Arc::new(DownGeocoder)))
        .unwrap();
    let owner = citizen(&t, "asha");

    let c = t
        .complaints
        .file_complaint(
            &owner.user_id,
            NewComplaint {
                title: "Pothole".into(),
                description: "Deep pothole on the lane".into(),
                latitude: Some(18.52),
                longitude: Some(73.85),
                location: Some("Lake Rd".into()),
            },
        )
        .unwrap();

    assert_eq!(c.locality, Locality::default());
    assert_eq!(c.latitude, Some(18.52));
    assert_eq!(c.status, ComplaintStatus::Pending);
    assert_eq!(t.complaints.get(c.id).unwrap().locality, Locality::default());
}

/// Admins racing on one complaint: every update lands, and history seq
/// values stay gapless and unique.
#[test]
fn concurrent_status_updates_serialize_history() {
    let _ = env_logger::builder().is_test(true).try_init();
    const THREADS: usize = 8;
    const STATUSES: [&str; 4] = ["pending", "in_progress", "resolved", "rejected"];

    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("civic.db");
    let db = db.to_str().unwrap().to_string();

    let engine =
        CivicEngine::build(&db, CivicConfig::default_test(), Arc::new(LogNotifier), None).unwrap();
    let root = admin(&engine, "root");
    let owner = citizen(&engine, "asha");
    let c = file(&engine, &owner, "Leak", "Water pipe leak");

    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let db = db.clone();
            let barrier = barrier.clone();
            let root = root.clone();
            std::thread::spawn(move || {
                let worker = CivicEngine::build(
                    &db,
                    CivicConfig::default_test(),
                    Arc::new(LogNotifier),
                    None,
                )
                .unwrap();
                barrier.wait();
                worker
                    .complaints
                    .update_status(&root, c.id, STATUSES[i % STATUSES.len()], &format!("pass {i}"))
                    .map(|_| ())
            })
        })
        .collect();

    for handle in handles {
        let result = handle.join().unwrap();
        assert!(result.is_ok(), "Update failed under contention: {result:?}");
    }

    let history = engine.complaints.history(c.id).unwrap();
    assert_eq!(history.len(), THREADS);
    let seqs: Vec<u32> = history.iter().map(|h| h.seq).collect();
    assert_eq!(seqs, (1..=THREADS as u32).collect::<Vec<_>>());

    let mut notes: Vec<String> = history.iter().filter_map(|h| h.notes.clone()).collect();
    notes.sort();
    let mut expected: Vec<String> = (0..THREADS).map(|i| format!("pass {i}")).collect();
    expected.sort();
    assert_eq!(notes, expected, "Every update leaves exactly one entry");

    // The last committed update is the one the row reflects.
    let last = history.last().unwrap();
    assert_eq!(last.action, HistoryAction::StatusChanged);
    assert_eq!(engine.complaints.get(c.id).unwrap().status, last.status_after);
}
