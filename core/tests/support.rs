//! Support ledger tests: idempotence, guards and the concurrent
//! double-support race.

mod common;

use civicpulse_core::{
    config::CivicConfig,
    engine::CivicEngine,
    error::ErrorKind,
    identity::UserProfile,
    notify::LogNotifier,
};
use common::{admin, citizen, file, volunteer};
use std::sync::{Arc, Barrier};

#[test]
fn support_is_idempotent() {
    let t = CivicEngine::build_test().unwrap();
    let owner = citizen(&t, "asha");
    let fan = citizen(&t, "bilal");
    let c = file(&t, &owner, "Leak", "Water pipe leak");

    let first = t.support.support(c.id, &fan.user_id).unwrap();
    assert!(first.created);
    assert_eq!(first.support_count, 1);

    let again = t.support.support(c.id, &fan.user_id).unwrap();
    assert!(!again.created, "Second support by the same user is the duplicate case");
    assert_eq!(again.support_count, 1);

    assert!(t.support.has_supported(c.id, "bilal").unwrap());
    assert!(!t.support.has_supported(c.id, "asha").unwrap());
    assert_eq!(t.support.support_count(c.id).unwrap(), 1);
    assert_eq!(t.complaints.get(c.id).unwrap().support_count, 1);
}

#[test]
fn count_tracks_distinct_supporters() {
    let t = CivicEngine::build_test().unwrap();
    let owner = citizen(&t, "asha");
    let c = file(&t, &owner, "Leak", "Water pipe leak");

    for i in 0..5 {
        let user = citizen(&t, &format!("fan-{i}"));
        let outcome = t.support.support(c.id, &user.user_id).unwrap();
        assert_eq!(outcome.support_count, i + 1);
    }
    assert_eq!(t.complaints.get(c.id).unwrap().support_count, 5);
}

#[test]
fn support_guards() {
    let t = CivicEngine::build_test().unwrap();
    let root = admin(&t, "root");
    let owner = citizen(&t, "asha");
    let vol = volunteer(&t, &root, "vikram");
    let c = file(&t, &owner, "Leak", "Water pipe leak");

    assert_eq!(t.support.support(9_999, "asha").unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(t.support.support(c.id, "ghost").unwrap_err().kind(), ErrorKind::NotFound);

    // Incomplete profile.
    t.identity
        .register_user(UserProfile::new("lurker", "lurker@example.org"))
        .unwrap();
    assert_eq!(
        t.support.support(c.id, "lurker").unwrap_err().kind(),
        ErrorKind::InvalidRequest
    );

    // Hidden after an admin reject.
    t.complaints.volunteer_verify(&vol, c.id, "verified", "").unwrap();
    t.complaints.admin_verify(&root, c.id, "reject", "").unwrap();
    assert_eq!(t.support.support(c.id, "asha").unwrap_err().kind(), ErrorKind::Forbidden);
    assert_eq!(t.support.support_count(c.id).unwrap(), 0);
}

/// N threads, each with its own connection, race to support the same
/// complaint as the same user. Exactly one wins and the count is 1.
#[test]
fn concurrent_double_support_creates_one_record() {
    let _ = env_logger::builder().is_test(true).try_init();
    const THREADS: usize = 8;

    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("civic.db");
    let db = db.to_str().unwrap().to_string();

    let engine =
        CivicEngine::build(&db, CivicConfig::default_test(), Arc::new(LogNotifier), None).unwrap();
    let owner = citizen(&engine, "asha");
    let fan = citizen(&engine, "bilal");
    let c = file(&engine, &owner, "Leak", "Water pipe leak");

    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let db = db.clone();
            let barrier = barrier.clone();
            let user = fan.user_id.clone();
            std::thread::spawn(move || {
                let worker = CivicEngine::build(
                    &db,
                    CivicConfig::default_test(),
                    Arc::new(LogNotifier),
                    None,
                )
                .unwrap();
                barrier.wait();
                worker.support.support(c.id, &user).unwrap()
            })
        })
        .collect();

    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let created = outcomes.iter().filter(|o| o.created).count();
    assert_eq!(created, 1, "Exactly one support must be recorded: {outcomes:?}");
    assert!(outcomes.iter().all(|o| o.support_count == 1), "{outcomes:?}");
    assert_eq!(engine.support.support_count(c.id).unwrap(), 1);
    assert_eq!(engine.complaints.get(c.id).unwrap().support_count, 1);
}

/// Many users racing on one complaint: the cached count equals the ledger.
#[test]
fn concurrent_distinct_supporters_keep_count_exact() {
    const THREADS: usize = 6;

    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("civic.db");
    let db = db.to_str().unwrap().to_string();

    let engine =
        CivicEngine::build(&db, CivicConfig::default_test(), Arc::new(LogNotifier), None).unwrap();
    let owner = citizen(&engine, "asha");
    let c = file(&engine, &owner, "Leak", "Water pipe leak");
    for i in 0..THREADS {
        citizen(&engine, &format!("fan-{i}"));
    }

    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let db = db.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                let worker = CivicEngine::build(
                    &db,
                    CivicConfig::default_test(),
                    Arc::new(LogNotifier),
                    None,
                )
                .unwrap();
                barrier.wait();
                worker.support.support(c.id, &format!("fan-{i}")).unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap().created);
    }
    assert_eq!(engine.support.support_count(c.id).unwrap(), THREADS as i64);
    assert_eq!(engine.complaints.get(c.id).unwrap().support_count, THREADS as i64);
}
