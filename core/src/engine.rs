//! CivicEngine: wires every component over one database.
//!
//! RULES:
//!   - Each component owns its own connection. Never share a CivicStore.
//!   - The classifier is built once and shared read-only.
//!   - Collaborator failures (notifier, geocoder) never fail an operation.

use crate::{
    classifier::Classifier,
    clock::{Clock, ManualClock, SystemClock},
    complaint_subsystem::{Collaborators, ComplaintSubsystem},
    config::CivicConfig,
    error::CivicResult,
    geocode::Geocoder,
    identity::IdentityDirectory,
    notify::{Notifier, RecordingNotifier},
    rng::TrackingCodes,
    store::CivicStore,
    support_ledger::SupportLedger,
};
use chrono::{TimeZone, Utc};
use std::{sync::Arc, time::Duration};

/// Seed for tracking codes in test engines.
pub const TEST_SEED: u64 = 0xC1_71C;

pub struct CivicEngine {
    pub identity: IdentityDirectory,
    pub complaints: ComplaintSubsystem,
    pub support: SupportLedger,
    pub config: CivicConfig,
    /// Keeps a shared in-memory database alive; source of fresh connections.
    store: CivicStore,
}

impl CivicEngine {
    /// Open (and migrate) `db_path` and build a fully wired engine.
    pub fn build(
        db_path: &str,
        config: CivicConfig,
        notifier: Arc<dyn Notifier>,
        geocoder: Option<Arc<dyn Geocoder>>,
    ) -> CivicResult<Self> {
        config.validate()?;
        let timeout = Duration::from_millis(config.busy_timeout_ms);
        // A private :memory: database cannot be reopened by the components,
        // so use a named shared-memory one instead.
        let store = if db_path == ":memory:" {
            let name = format!("civic_{}", uuid::Uuid::new_v4().simple());
            CivicStore::shared_memory(&name, timeout)?
        } else {
            CivicStore::open_with_timeout(db_path, timeout)?
        };
        store.migrate()?;
        let classifier = Classifier::from_config(&config.classifier)?;
        let deps = Collaborators {
            classifier: Arc::new(classifier),
            notifier,
            geocoder,
            clock: Arc::new(SystemClock),
            codes: Arc::new(TrackingCodes::from_entropy()),
        };
        Self::assemble(store, deps, config)
    }

    /// Test engine over a private shared-memory database, a manual clock, a
    /// seeded tracking-code stream and a recording notifier.
    pub fn build_test() -> CivicResult<TestEngine> {
        Self::build_test_with(Classifier::fallback_only(), None)
    }

    pub fn build_test_with(
        classifier: Classifier,
        geocoder: Option<Arc<dyn Geocoder>>,
    ) -> CivicResult<TestEngine> {
        let config = CivicConfig::default_test();
        let name = format!("civic_test_{}", uuid::Uuid::new_v4().simple());
        let store = CivicStore::shared_memory(&name, Duration::from_millis(config.busy_timeout_ms))?;
        store.migrate()?;

        let start = Utc
            .with_ymd_and_hms(2024, 1, 1, 9, 0, 0)
            .single()
            .unwrap_or_default();
        let clock = Arc::new(ManualClock::new(start));
        let notifier = Arc::new(RecordingNotifier::new());
        let deps = Collaborators {
            classifier: Arc::new(classifier),
            notifier: notifier.clone(),
            geocoder,
            clock: clock.clone(),
            codes: Arc::new(TrackingCodes::seeded(TEST_SEED)),
        };
        Ok(TestEngine {
            engine: Self::assemble(store, deps, config)?,
            clock,
            notifier,
        })
    }

    /// Wire components onto `store`'s database. Every component gets its own
    /// connection; `store` itself stays with the engine.
    pub fn assemble(store: CivicStore, deps: Collaborators, config: CivicConfig) -> CivicResult<Self> {
        let clock: Arc<dyn Clock> = deps.clock.clone();
        Ok(Self {
            identity: IdentityDirectory::new(store.reopen()?, clock.clone()),
            complaints: ComplaintSubsystem::new(store.reopen()?, deps, &config),
            support: SupportLedger::new(store.reopen()?, clock),
            config,
            store,
        })
    }

    /// A fresh connection to the engine's database.
    pub fn open_store(&self) -> CivicResult<CivicStore> {
        self.store.reopen()
    }
}

/// Engine plus the handles tests steer it with.
pub struct TestEngine {
    pub engine: CivicEngine,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
}

impl std::ops::Deref for TestEngine {
    type Target = CivicEngine;

    fn deref(&self) -> &CivicEngine {
        &self.engine
    }
}
