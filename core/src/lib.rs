//! CivicPulse core: complaint intake, classification, verification and
//! publication over SQLite.

pub mod analyzer;
pub mod classifier;
pub mod clock;
pub mod complaint_subsystem;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod evidence;
pub mod geocode;
pub mod identity;
pub mod image_gate;
pub mod notify;
pub mod rng;
pub mod store;
pub mod support_ledger;
pub mod training;
pub mod types;
