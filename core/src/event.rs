//! Events emitted by the complaint state machine.
//!
//! RULE: an event is built only after its transition has committed. It is
//! converted to a `Notification` and handed to the dispatcher; nothing in
//! the core waits on delivery.

use crate::types::{ComplaintId, ComplaintStatus, Department, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Variants are appended, never reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComplaintEvent {
    ComplaintFiled {
        complaint_id: ComplaintId,
        tracking_code: String,
        owner_id: UserId,
        department: Department,
    },
    VolunteerVerified {
        complaint_id: ComplaintId,
        tracking_code: String,
        owner_id: UserId,
        volunteer_id: UserId,
        approved: bool,
        notes: String,
    },
    AdminVerified {
        complaint_id: ComplaintId,
        tracking_code: String,
        owner_id: UserId,
        admin_id: UserId,
        /// The volunteer whose proof was reviewed.
        volunteer_id: Option<UserId>,
        accepted: bool,
        notes: String,
    },
    Escalated {
        complaint_id: ComplaintId,
        tracking_code: String,
        owner_id: UserId,
        actor_id: UserId,
        notes: String,
    },
    StatusUpdated {
        complaint_id: ComplaintId,
        tracking_code: String,
        owner_id: UserId,
        admin_id: UserId,
        from: ComplaintStatus,
        to: ComplaintStatus,
        notes: String,
    },
    ReviewFlagged {
        complaint_id: ComplaintId,
        tracking_code: String,
        volunteer_id: UserId,
        reason: String,
    },
}

/// Structured descriptor handed to the notification collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Idempotency key for the dispatcher.
    pub id: Uuid,
    pub title: String,
    pub actor_id: UserId,
    pub recipients: Vec<UserId>,
    pub body: String,
    pub complaint_id: ComplaintId,
    pub tracking_code: String,
}

impl ComplaintEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ComplaintFiled { .. }    => "complaint_filed",
            Self::VolunteerVerified { .. } => "volunteer_verified",
            Self::AdminVerified { .. }     => "admin_verified",
            Self::Escalated { .. }         => "escalated",
            Self::StatusUpdated { .. }     => "status_updated",
            Self::ReviewFlagged { .. }     => "review_flagged",
        }
    }

    /// Build the descriptor. `admins` are added as recipients for events
    /// that need an administrator's attention.
    pub fn notification(&self, admins: &[UserId]) -> Notification {
        let (complaint_id, tracking_code, actor_id, mut recipients, title, body) = match self {
            Self::ComplaintFiled { complaint_id, tracking_code, owner_id, department } => (
                *complaint_id,
                tracking_code,
                owner_id.clone(),
                vec![owner_id.clone()],
                "Complaint received".to_string(),
                format!("Your complaint {tracking_code} was filed and routed to {department}."),
            ),
            Self::VolunteerVerified {
                complaint_id, tracking_code, owner_id, volunteer_id, approved, notes,
            } => (
                *complaint_id,
                tracking_code,
                volunteer_id.clone(),
                vec![owner_id.clone()],
                if *approved {
                    "Complaint verified by volunteer".to_string()
                } else {
                    "Complaint rejected by volunteer".to_string()
                },
                with_notes(
                    format!(
                        "Complaint {tracking_code} was {} after field verification.",
                        if *approved { "verified" } else { "rejected" }
                    ),
                    notes,
                ),
            ),
            Self::AdminVerified {
                complaint_id, tracking_code, owner_id, admin_id, volunteer_id, accepted, notes,
            } => {
                let mut recipients = vec![owner_id.clone()];
                recipients.extend(volunteer_id.iter().cloned());
                (
                    *complaint_id,
                    tracking_code,
                    admin_id.clone(),
                    recipients,
                    if *accepted {
                        "Complaint published".to_string()
                    } else {
                        "Volunteer verification rejected".to_string()
                    },
                    with_notes(
                        if *accepted {
                            format!("Complaint {tracking_code} passed admin review and is now public.")
                        } else {
                            format!("The verification of complaint {tracking_code} was rejected by an administrator.")
                        },
                        notes,
                    ),
                )
            }
            Self::Escalated { complaint_id, tracking_code, owner_id, actor_id, notes } => (
                *complaint_id,
                tracking_code,
                actor_id.clone(),
                vec![owner_id.clone()],
                "Complaint escalated".to_string(),
                with_notes(format!("Complaint {tracking_code} was escalated."), notes),
            ),
            Self::StatusUpdated {
                complaint_id, tracking_code, owner_id, admin_id, from, to, notes,
            } => (
                *complaint_id,
                tracking_code,
                admin_id.clone(),
                vec![owner_id.clone()],
                "Complaint status updated".to_string(),
                with_notes(
                    format!("Complaint {tracking_code} moved from {from} to {to}."),
                    notes,
                ),
            ),
            Self::ReviewFlagged { complaint_id, tracking_code, volunteer_id, reason } => (
                *complaint_id,
                tracking_code,
                volunteer_id.clone(),
                Vec::new(),
                "Complaint flagged for review".to_string(),
                format!("Complaint {tracking_code} needs an admin look: {reason}"),
            ),
        };

        if matches!(self, Self::Escalated { .. } | Self::ReviewFlagged { .. }) {
            recipients.extend(admins.iter().cloned());
        }
        recipients.dedup();

        Notification {
            id: Uuid::new_v4(),
            title,
            actor_id,
            recipients,
            body,
            complaint_id,
            tracking_code: tracking_code.clone(),
        }
    }
}

fn with_notes(body: String, notes: &str) -> String {
    if notes.trim().is_empty() {
        body
    } else {
        format!("{body} Notes: {}", notes.trim())
    }
}
