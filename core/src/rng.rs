//! Tracking-code generation.
//!
//! Codes come from a single PCG stream. Production seeds it from the
//! platform RNG; tests seed it explicitly so codes are reproducible.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;
use std::sync::Mutex;

/// Length of a tracking code in characters.
pub const TRACKING_CODE_LEN: usize = 12;

pub struct TrackingCodes {
    inner: Mutex<Pcg64Mcg>,
}

impl TrackingCodes {
    pub fn seeded(seed: u64) -> Self {
        Self {
            inner: Mutex::new(Pcg64Mcg::seed_from_u64(seed)),
        }
    }

    pub fn from_entropy() -> Self {
        Self::seeded(rand::random())
    }

    /// Draw the next code: 12 uppercase hex characters (48 bits).
    pub fn next_code(&self) -> String {
        let bits = self
            .inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .next_u64();
        format!("{:012X}", bits & 0xFFFF_FFFF_FFFF)
    }
}

/// True if `code` has the shape of a tracking code. Used to reject obviously
/// bad lookups before touching the store.
pub fn is_tracking_code(code: &str) -> bool {
    code.len() == TRACKING_CODE_LEN
        && code.chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
}
