//! Verification images and citizen documents attached to a complaint.
//!
//! Images pass through the `ImageGate` with no transaction open. The verdict
//! is then applied in one IMMEDIATE transaction: insert the image row and/or
//! raise the admin-review flag. A rejected upload still commits its flag
//! before the rejection is returned.

use crate::{
    complaint_subsystem::ComplaintSubsystem,
    error::{CivicError, CivicResult},
    event::ComplaintEvent,
    identity::Actor,
    image_gate::{GateReport, ImageUpload, DUPLICATE_MESSAGE},
    store::NewImageRow,
    types::{ComplaintId, UserId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationImage {
    pub id: i64,
    pub complaint_id: ComplaintId,
    pub volunteer_id: Option<UserId>,
    pub uploaded_at: DateTime<Utc>,
    pub content_type: String,
    pub byte_len: i64,
    /// Hex SHA-256. None when hashing failed at upload time.
    pub content_hash: Option<String>,
    pub sharpness: Option<f64>,
    /// Where the transport layer stored the bytes.
    pub payload_ref: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplaintDocument {
    pub id: i64,
    pub complaint_id: ComplaintId,
    pub file_name: String,
    pub file_size: i64,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub image: VerificationImage,
    pub report: GateReport,
}

impl ComplaintSubsystem {
    /// Run an approved volunteer's image through the gate and attach it.
    ///
    /// `payload_ref` names wherever the caller put the bytes; the core never
    /// stores them.
    pub fn upload_verification_image(
        &self,
        actor: &Actor,
        complaint_id: ComplaintId,
        upload: &ImageUpload<'_>,
        payload_ref: &str,
    ) -> CivicResult<UploadOutcome> {
        let volunteer = self.store.get_volunteer(&actor.user_id)?;
        if !volunteer.is_approved {
            return Err(CivicError::Forbidden(format!(
                "volunteer {} is not approved yet",
                actor.user_id
            )));
        }
        let complaint = self.store.get_complaint(complaint_id)?;

        let existing = self.store.image_hashes(complaint_id)?;
        let mut report = self.gate.evaluate(upload, &existing);

        let now = self.deps.clock.now();
        let image_id = self.store.immediate(|s| {
            let mut image_id = None;
            if report.accepted {
                let row = NewImageRow {
                    complaint_id,
                    volunteer_id: &actor.user_id,
                    uploaded_at: now,
                    content_type: upload.content_type,
                    byte_len: upload.bytes.len() as i64,
                    content_hash: report.content_hash.as_deref(),
                    sharpness: report.sharpness,
                    payload_ref,
                };
                image_id = s.insert_image(&row)?;
                if image_id.is_none() {
                    // Lost a race with an identical upload.
                    report.accepted = false;
                    report.duplicate = true;
                    report.flag_for_review = true;
                    report.errors.push(DUPLICATE_MESSAGE.to_string());
                }
            }
            if report.flag_for_review {
                s.flag_complaint_for_review(complaint_id, &report.review_reason(), now)?;
            }
            Ok(image_id)
        })?;

        if report.flag_for_review {
            log::warn!(
                "Complaint {} flagged for review: {}",
                complaint.tracking_code,
                report.review_reason()
            );
            self.notify(&ComplaintEvent::ReviewFlagged {
                complaint_id,
                tracking_code: complaint.tracking_code.clone(),
                volunteer_id: actor.user_id.clone(),
                reason: report.review_reason(),
            });
        }

        match image_id {
            Some(id) => {
                let image = VerificationImage {
                    id,
                    complaint_id,
                    volunteer_id: Some(actor.user_id.clone()),
                    uploaded_at: now,
                    content_type: upload.content_type.to_string(),
                    byte_len: upload.bytes.len() as i64,
                    content_hash: report.content_hash.clone(),
                    sharpness: report.sharpness,
                    payload_ref: payload_ref.to_string(),
                };
                Ok(UploadOutcome { image, report })
            }
            None => Err(CivicError::IntegrityRejected(report)),
        }
    }

    pub fn verification_images(&self, complaint_id: ComplaintId) -> CivicResult<Vec<VerificationImage>> {
        self.store.get_complaint(complaint_id)?;
        self.store.images(complaint_id)
    }

    // ── Documents ──────────────────────────────────────────────────

    pub fn attach_document(
        &self,
        actor: &Actor,
        complaint_id: ComplaintId,
        file_name: &str,
        file_size: i64,
    ) -> CivicResult<ComplaintDocument> {
        let complaint = self.store.get_complaint(complaint_id)?;
        if complaint.owner_id != actor.user_id {
            return Err(CivicError::Forbidden(
                "only the complaint owner can attach documents".into(),
            ));
        }
        let file_name = file_name.trim();
        if file_name.is_empty() || file_size < 0 {
            return Err(CivicError::InvalidRequest(
                "document needs a name and a non-negative size".into(),
            ));
        }
        let now = self.deps.clock.now();
        let id = self
            .store
            .insert_document(complaint_id, file_name, file_size, now)?;
        Ok(ComplaintDocument {
            id,
            complaint_id,
            file_name: file_name.to_string(),
            file_size,
            uploaded_at: now,
        })
    }

    pub fn delete_document(&self, actor: &Actor, document_id: i64) -> CivicResult<()> {
        let document = self.store.get_document(document_id)?;
        let complaint = self.store.get_complaint(document.complaint_id)?;
        if complaint.owner_id != actor.user_id {
            return Err(CivicError::Forbidden(
                "only the complaint owner can delete documents".into(),
            ));
        }
        self.store.delete_document(document_id)
    }

    pub fn documents(&self, complaint_id: ComplaintId) -> CivicResult<Vec<ComplaintDocument>> {
        self.store.get_complaint(complaint_id)?;
        self.store.documents(complaint_id)
    }
}
