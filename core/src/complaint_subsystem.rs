//! Complaint verification & publication state machine.
//!
//! Listens for nothing; every transition is driven by an actor. A transition
//! loads the complaint, checks its guard, writes the new state and appends
//! one history entry inside a single IMMEDIATE transaction. The matching
//! `ComplaintEvent` is dispatched only after commit.
//!
//! DESIGN RULE: the admin-verify axis sits on top of the volunteer axis.
//! `admin_verified` cannot become true unless `verified_by_volunteer` is
//! true at that moment, and an admin reject rolls the volunteer axis back.

use crate::{
    classifier::Classifier,
    clock::Clock,
    config::CivicConfig,
    error::{CivicError, CivicResult},
    event::ComplaintEvent,
    geocode::{locality_or_default, Geocoder},
    identity::Actor,
    image_gate::ImageGate,
    notify::{dispatch_best_effort, Notifier},
    rng::{is_tracking_code, TrackingCodes},
    store::CivicStore,
    types::{ComplaintId, ComplaintStatus, Department, Locality, UserId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, sync::Arc};

pub const DEFAULT_TITLE: &str = "No Title";
pub const ADMIN_REJECT_REASON: &str = "Rejected by admin";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Complaint {
    pub id: ComplaintId,
    pub tracking_code: String,
    pub owner_id: UserId,
    pub title: String,
    pub description: String,
    pub department: Department,
    pub department_confidence: f64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location: Option<String>,
    pub locality: Locality,
    pub status: ComplaintStatus,
    pub is_public: bool,
    pub support_count: i64,
    pub is_escalated: bool,
    pub verified_by_volunteer: bool,
    pub verified_by: Option<UserId>,
    pub volunteer_verified_at: Option<DateTime<Utc>>,
    pub verification_notes: String,
    pub admin_verified: bool,
    pub admin_verified_at: Option<DateTime<Utc>>,
    pub flag_for_admin_review: bool,
    pub admin_review_reason: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Citizen input for a new complaint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewComplaint {
    pub title: String,
    pub description: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    VolunteerApproved,
    VolunteerRejected,
    AdminAccepted,
    AdminRejected,
    Escalated,
    StatusChanged,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VolunteerApproved => "volunteer_approved",
            Self::VolunteerRejected => "volunteer_rejected",
            Self::AdminAccepted     => "admin_accepted",
            Self::AdminRejected     => "admin_rejected",
            Self::Escalated         => "escalated",
            Self::StatusChanged     => "status_changed",
        }
    }
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "volunteer_approved" => Self::VolunteerApproved,
            "volunteer_rejected" => Self::VolunteerRejected,
            "admin_accepted"     => Self::AdminAccepted,
            "admin_rejected"     => Self::AdminRejected,
            "escalated"          => Self::Escalated,
            "status_changed"     => Self::StatusChanged,
            other => return Err(format!("unknown history action: {other:?}")),
        })
    }
}

/// One immutable entry of a complaint's status history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// 1-based, gapless per complaint.
    pub seq: u32,
    pub at: DateTime<Utc>,
    pub actor_id: UserId,
    pub action: HistoryAction,
    pub status_after: ComplaintStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolunteerDecision {
    Verified,
    Rejected,
}

impl VolunteerDecision {
    pub fn parse(token: &str) -> CivicResult<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "verified" | "approve" | "approved" => Ok(Self::Verified),
            "rejected" | "reject" => Ok(Self::Rejected),
            other => Err(CivicError::InvalidRequest(format!(
                "unknown volunteer action {other:?}; expected \"verified\" or \"rejected\""
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminDecision {
    Accept,
    Reject,
}

impl AdminDecision {
    pub fn parse(token: &str) -> CivicResult<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "accept" => Ok(Self::Accept),
            "reject" => Ok(Self::Reject),
            other => Err(CivicError::InvalidRequest(format!(
                "unknown admin action {other:?}; expected \"accept\" or \"reject\""
            ))),
        }
    }
}

/// Trimmed notes, or None when blank.
fn clean_notes(notes: &str) -> Option<&str> {
    let trimmed = notes.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Shared collaborators injected into the state machine.
#[derive(Clone)]
pub struct Collaborators {
    pub classifier: Arc<Classifier>,
    pub notifier: Arc<dyn Notifier>,
    pub geocoder: Option<Arc<dyn Geocoder>>,
    pub clock: Arc<dyn Clock>,
    pub codes: Arc<TrackingCodes>,
}

pub struct ComplaintSubsystem {
    pub(crate) store: CivicStore,
    pub(crate) gate: ImageGate,
    pub(crate) deps: Collaborators,
    tracking_code_attempts: u32,
}

impl ComplaintSubsystem {
    pub fn new(store: CivicStore, deps: Collaborators, config: &CivicConfig) -> Self {
        Self {
            store,
            gate: ImageGate::standard(config.gate.clone()),
            deps,
            tracking_code_attempts: config.tracking_code_attempts.max(1),
        }
    }

    /// Swap the image gate, e.g. for one backed by a different analyzer.
    pub fn replace_gate(&mut self, gate: ImageGate) {
        self.gate = gate;
    }

    // ── Creation ───────────────────────────────────────────────────

    pub fn file_complaint(&self, owner_id: &str, input: NewComplaint) -> CivicResult<Complaint> {
        let description = input.description.trim();
        if description.is_empty() {
            return Err(CivicError::InvalidRequest("description is required".into()));
        }
        if let Some(lat) = input.latitude {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(CivicError::InvalidRequest(format!("latitude {lat} out of range")));
            }
        }
        if let Some(lon) = input.longitude {
            if !(-180.0..=180.0).contains(&lon) {
                return Err(CivicError::InvalidRequest(format!("longitude {lon} out of range")));
            }
        }
        self.store.get_user(owner_id)?;

        let title = match input.title.trim() {
            "" => DEFAULT_TITLE.to_string(),
            t => t.to_string(),
        };
        let classification = self
            .deps
            .classifier
            .classify(&format!("{title} {description}"));
        let locality = locality_or_default(
            self.deps.geocoder.as_deref(),
            input.latitude,
            input.longitude,
        );
        let now = self.deps.clock.now();

        let mut complaint = Complaint {
            id: 0,
            tracking_code: String::new(),
            owner_id: owner_id.to_string(),
            title,
            description: description.to_string(),
            department: classification.department,
            department_confidence: classification.confidence,
            latitude: input.latitude,
            longitude: input.longitude,
            location: input.location.filter(|l| !l.trim().is_empty()),
            locality,
            status: ComplaintStatus::Pending,
            is_public: true,
            support_count: 0,
            is_escalated: false,
            verified_by_volunteer: false,
            verified_by: None,
            volunteer_verified_at: None,
            verification_notes: String::new(),
            admin_verified: false,
            admin_verified_at: None,
            flag_for_admin_review: false,
            admin_review_reason: String::new(),
            created_at: now,
            updated_at: now,
        };

        for attempt in 1..=self.tracking_code_attempts {
            complaint.tracking_code = self.deps.codes.next_code();
            if let Some(id) = self.store.insert_complaint(&complaint)? {
                complaint.id = id;
                log::info!(
                    "Complaint {} filed by {owner_id}: {} ({:.2}, {:?})",
                    complaint.tracking_code,
                    complaint.department,
                    classification.confidence,
                    classification.strategy
                );
                self.notify(&ComplaintEvent::ComplaintFiled {
                    complaint_id: complaint.id,
                    tracking_code: complaint.tracking_code.clone(),
                    owner_id: complaint.owner_id.clone(),
                    department: complaint.department,
                });
                return Ok(complaint);
            }
            log::warn!(
                "Tracking code {} already taken (attempt {attempt})",
                complaint.tracking_code
            );
        }
        Err(anyhow::anyhow!(
            "no unique tracking code after {} attempts",
            self.tracking_code_attempts
        )
        .into())
    }

    // ── Queries ────────────────────────────────────────────────────

    pub fn get(&self, complaint_id: ComplaintId) -> CivicResult<Complaint> {
        self.store.get_complaint(complaint_id)
    }

    /// Public lookup by tracking code. Case-insensitive.
    pub fn track(&self, tracking_code: &str) -> CivicResult<Complaint> {
        let code = tracking_code.trim().to_ascii_uppercase();
        if !is_tracking_code(&code) {
            return Err(CivicError::not_found("complaint", tracking_code));
        }
        self.store
            .find_by_tracking_code(&code)?
            .ok_or_else(|| CivicError::not_found("complaint", code))
    }

    pub fn public_complaints(&self, department: Option<Department>) -> CivicResult<Vec<Complaint>> {
        self.store.public_complaints(department)
    }

    pub fn complaints_for_owner(&self, owner_id: &str) -> CivicResult<Vec<Complaint>> {
        self.store.complaints_for_owner(owner_id)
    }

    /// Complaints in the volunteer's ward, zone or area that still need
    /// attention.
    pub fn volunteer_queue(&self, actor: &Actor) -> CivicResult<Vec<Complaint>> {
        let volunteer = self.store.get_volunteer(&actor.user_id)?;
        if !volunteer.is_approved {
            return Err(CivicError::Forbidden(format!(
                "volunteer {} is not approved yet",
                actor.user_id
            )));
        }
        self.store.complaints_in_locality(&volunteer.locality)
    }

    pub fn history(&self, complaint_id: ComplaintId) -> CivicResult<Vec<HistoryEntry>> {
        self.store.get_complaint(complaint_id)?;
        self.store.history(complaint_id)
    }

    // ── Transitions ────────────────────────────────────────────────

    pub fn volunteer_verify(
        &self,
        actor: &Actor,
        complaint_id: ComplaintId,
        action: &str,
        notes: &str,
    ) -> CivicResult<Complaint> {
        let volunteer = self.store.get_volunteer(&actor.user_id)?;
        if !volunteer.is_approved {
            return Err(CivicError::Forbidden(format!(
                "volunteer {} is not approved yet",
                actor.user_id
            )));
        }
        let decision = VolunteerDecision::parse(action)?;
        let notes = clean_notes(notes);
        let history_action = match decision {
            VolunteerDecision::Verified => HistoryAction::VolunteerApproved,
            VolunteerDecision::Rejected => HistoryAction::VolunteerRejected,
        };

        let (complaint, ()) =
            self.transition(complaint_id, &actor.user_id, history_action, notes, |c, now| {
                c.verified_by_volunteer = decision == VolunteerDecision::Verified;
                c.verified_by = Some(actor.user_id.clone());
                c.volunteer_verified_at = Some(now);
                c.verification_notes = notes.unwrap_or_default().to_string();
                c.status = match decision {
                    VolunteerDecision::Verified => ComplaintStatus::InProgress,
                    VolunteerDecision::Rejected => ComplaintStatus::Rejected,
                };
                Ok(())
            })?;

        self.notify(&ComplaintEvent::VolunteerVerified {
            complaint_id,
            tracking_code: complaint.tracking_code.clone(),
            owner_id: complaint.owner_id.clone(),
            volunteer_id: actor.user_id.clone(),
            approved: decision == VolunteerDecision::Verified,
            notes: notes.unwrap_or_default().to_string(),
        });
        Ok(complaint)
    }

    pub fn admin_verify(
        &self,
        actor: &Actor,
        complaint_id: ComplaintId,
        action: &str,
        notes: &str,
    ) -> CivicResult<Complaint> {
        if !actor.is_admin() {
            return Err(CivicError::Forbidden(
                "only administrators can counter-verify complaints".into(),
            ));
        }
        let decision = AdminDecision::parse(action)?;
        let notes = clean_notes(notes);
        let history_action = match decision {
            AdminDecision::Accept => HistoryAction::AdminAccepted,
            AdminDecision::Reject => HistoryAction::AdminRejected,
        };

        let (complaint, volunteer_id) =
            self.transition(complaint_id, &actor.user_id, history_action, notes, |c, now| {
                if !c.verified_by_volunteer {
                    return Err(CivicError::InvalidRequest(format!(
                        "complaint {} has not been verified by a volunteer",
                        c.tracking_code
                    )));
                }
                let volunteer_id = c.verified_by.clone();
                match decision {
                    AdminDecision::Accept => {
                        c.admin_verified = true;
                        c.admin_verified_at = Some(now);
                        c.is_public = true;
                        c.status = ComplaintStatus::InProgress;
                    }
                    AdminDecision::Reject => {
                        c.verified_by_volunteer = false;
                        c.verified_by = None;
                        c.volunteer_verified_at = None;
                        c.admin_verified = false;
                        c.admin_verified_at = Some(now);
                        c.is_public = false;
                        c.status = ComplaintStatus::Rejected;
                        c.admin_review_reason =
                            notes.unwrap_or(ADMIN_REJECT_REASON).to_string();
                    }
                }
                Ok(volunteer_id)
            })?;

        self.notify(&ComplaintEvent::AdminVerified {
            complaint_id,
            tracking_code: complaint.tracking_code.clone(),
            owner_id: complaint.owner_id.clone(),
            admin_id: actor.user_id.clone(),
            volunteer_id,
            accepted: decision == AdminDecision::Accept,
            notes: notes.unwrap_or_default().to_string(),
        });
        Ok(complaint)
    }

    /// Escalate a volunteer-verified complaint. Admins and the complaint's
    /// owner may escalate. Status is left as is.
    pub fn escalate(&self, actor: &Actor, complaint_id: ComplaintId, notes: &str) -> CivicResult<Complaint> {
        let notes = clean_notes(notes);
        let (complaint, ()) = self.transition(
            complaint_id,
            &actor.user_id,
            HistoryAction::Escalated,
            notes,
            |c, _| {
                if !actor.is_admin() && c.owner_id != actor.user_id {
                    return Err(CivicError::Forbidden(
                        "only the owner or an administrator can escalate".into(),
                    ));
                }
                if !c.verified_by_volunteer {
                    return Err(CivicError::InvalidRequest(format!(
                        "complaint {} must be verified by a volunteer before escalation",
                        c.tracking_code
                    )));
                }
                c.is_escalated = true;
                Ok(())
            },
        )?;

        self.notify(&ComplaintEvent::Escalated {
            complaint_id,
            tracking_code: complaint.tracking_code.clone(),
            owner_id: complaint.owner_id.clone(),
            actor_id: actor.user_id.clone(),
            notes: notes.unwrap_or_default().to_string(),
        });
        Ok(complaint)
    }

    /// Operator override of the lifecycle status. Does not consult the
    /// verification axes.
    pub fn update_status(
        &self,
        actor: &Actor,
        complaint_id: ComplaintId,
        status: &str,
        notes: &str,
    ) -> CivicResult<Complaint> {
        if !actor.is_admin() {
            return Err(CivicError::Forbidden(
                "only administrators can change complaint status".into(),
            ));
        }
        let to: ComplaintStatus = status.parse().map_err(CivicError::InvalidRequest)?;
        let notes = clean_notes(notes);

        let (complaint, from) = self.transition(
            complaint_id,
            &actor.user_id,
            HistoryAction::StatusChanged,
            notes,
            |c, _| {
                let from = c.status;
                c.status = to;
                Ok(from)
            },
        )?;

        self.notify(&ComplaintEvent::StatusUpdated {
            complaint_id,
            tracking_code: complaint.tracking_code.clone(),
            owner_id: complaint.owner_id.clone(),
            admin_id: actor.user_id.clone(),
            from,
            to,
            notes: notes.unwrap_or_default().to_string(),
        });
        Ok(complaint)
    }

    /// Load, mutate, persist and append history as one unit of work.
    /// `apply` runs under the write lock and may reject the transition.
    fn transition<T, F>(
        &self,
        complaint_id: ComplaintId,
        actor_id: &str,
        action: HistoryAction,
        notes: Option<&str>,
        apply: F,
    ) -> CivicResult<(Complaint, T)>
    where
        F: FnOnce(&mut Complaint, DateTime<Utc>) -> CivicResult<T>,
    {
        let now = self.deps.clock.now();
        let (complaint, out, seq) = self.store.immediate(|s| {
            let mut complaint = s.get_complaint(complaint_id)?;
            let out = apply(&mut complaint, now)?;
            complaint.updated_at = now;
            s.save_complaint_state(&complaint)?;
            let seq = s.append_history(complaint_id, now, actor_id, action, complaint.status, notes)?;
            Ok((complaint, out, seq))
        })?;
        log::info!(
            "Complaint {} #{seq} {action} by {actor_id} -> {}",
            complaint.tracking_code,
            complaint.status
        );
        Ok((complaint, out))
    }

    /// Best-effort dispatch; never fails the caller.
    pub(crate) fn notify(&self, event: &ComplaintEvent) {
        let admins = match event {
            ComplaintEvent::Escalated { .. } | ComplaintEvent::ReviewFlagged { .. } => {
                self.store.admin_user_ids().unwrap_or_else(|e| {
                    log::warn!("Could not list administrators for {}: {e}", event.name());
                    Vec::new()
                })
            }
            _ => Vec::new(),
        };
        dispatch_best_effort(self.deps.notifier.as_ref(), event, &admins);
    }
}
