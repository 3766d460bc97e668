//! Support ledger: one support per (complaint, user).
//!
//! DESIGN RULE: `complaint.support_count` is a cache of the ledger's
//! cardinality. It is recomputed from the ledger in the same transaction
//! as the insert, never incremented.

use crate::{
    clock::Clock,
    error::{CivicError, CivicResult},
    store::CivicStore,
    types::ComplaintId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportOutcome {
    /// False when the user had already supported the complaint.
    pub created: bool,
    pub support_count: i64,
}

pub struct SupportLedger {
    store: CivicStore,
    clock: Arc<dyn Clock>,
}

impl SupportLedger {
    pub fn new(store: CivicStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn support(&self, complaint_id: ComplaintId, user_id: &str) -> CivicResult<SupportOutcome> {
        let complaint = self.store.get_complaint(complaint_id)?;
        if !complaint.is_public {
            return Err(CivicError::Forbidden(format!(
                "complaint {} is not public",
                complaint.tracking_code
            )));
        }
        let user = self.store.get_user(user_id)?;
        if !user.profile_complete() {
            return Err(CivicError::InvalidRequest(
                "complete your profile (name, phone, address, city) before supporting".into(),
            ));
        }

        let now = self.clock.now();
        let outcome = self.store.immediate(|s| {
            if s.insert_support(complaint_id, user_id, now)? {
                Ok(SupportOutcome {
                    created: true,
                    support_count: s.refresh_support_count(complaint_id)?,
                })
            } else {
                Ok(SupportOutcome {
                    created: false,
                    support_count: s.stored_support_count(complaint_id)?,
                })
            }
        })?;

        if outcome.created {
            log::debug!(
                "{user_id} supports complaint {} ({} total)",
                complaint.tracking_code,
                outcome.support_count
            );
        }
        Ok(outcome)
    }

    pub fn has_supported(&self, complaint_id: ComplaintId, user_id: &str) -> CivicResult<bool> {
        self.store.has_supported(complaint_id, user_id)
    }

    /// Ledger cardinality, read from the ledger itself.
    pub fn support_count(&self, complaint_id: ComplaintId) -> CivicResult<i64> {
        self.store.get_complaint(complaint_id)?;
        self.store.count_supports(complaint_id)
    }
}
