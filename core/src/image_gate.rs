//! Verification-image integrity gate.
//!
//! CHECK ORDER (fixed):
//!   1. presence        hard reject
//!   2. content type    hard reject
//!   3. size            hard reject
//!   4. duplicate hash  hard reject + flag for review
//!   5. blur            warning + flag for review
//!
//! Hard rejects short-circuit. Analysis failures in steps 4 and 5 become
//! warnings and never block the upload.
//!
//! The gate is pure: it reads nothing from the store and takes no locks.
//! The caller supplies the hashes already attached to the complaint.

use crate::analyzer::{ImageAnalyzer, StandardAnalyzer};
use crate::config::GateConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const DUPLICATE_MESSAGE: &str = "This image has already been uploaded for this complaint";

/// An uploaded file as received from the transport layer.
#[derive(Debug, Clone, Copy)]
pub struct ImageUpload<'a> {
    pub bytes: &'a [u8],
    pub content_type: &'a str,
    pub file_name: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GateReport {
    pub accepted: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub flag_for_review: bool,
    pub content_hash: Option<String>,
    pub sharpness: Option<f64>,
    /// Set when the rejection was step 4.
    pub duplicate: bool,
}

impl GateReport {
    fn reject(mut self, error: String) -> Self {
        self.accepted = false;
        self.errors.push(error);
        self
    }

    /// Reason stored on the complaint when the report flags it.
    pub fn review_reason(&self) -> String {
        if self.duplicate {
            "Duplicate verification image upload attempt".to_string()
        } else {
            self.warnings.join("; ")
        }
    }
}

pub struct ImageGate {
    config: GateConfig,
    analyzer: Box<dyn ImageAnalyzer>,
}

impl ImageGate {
    pub fn new(config: GateConfig, analyzer: Box<dyn ImageAnalyzer>) -> Self {
        Self { config, analyzer }
    }

    pub fn standard(config: GateConfig) -> Self {
        Self::new(config, Box::new(StandardAnalyzer))
    }

    pub fn evaluate(&self, upload: &ImageUpload<'_>, existing_hashes: &HashSet<String>) -> GateReport {
        let mut report = GateReport {
            accepted: true,
            ..GateReport::default()
        };

        if upload.bytes.is_empty() {
            return report.reject("No file provided".to_string());
        }

        let content_type = upload.content_type.trim().to_ascii_lowercase();
        if !self
            .config
            .allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&content_type))
        {
            return report.reject(format!(
                "Invalid file type {:?}. Allowed types: {}",
                upload.content_type,
                self.config.allowed_content_types.join(", ")
            ));
        }

        let size = upload.bytes.len();
        if size > self.config.max_bytes {
            return report.reject(format!(
                "File too large: {size} bytes ({:.2} MiB). Maximum is {} bytes",
                size as f64 / (1024.0 * 1024.0),
                self.config.max_bytes
            ));
        }

        match self.analyzer.content_hash(upload.bytes) {
            Ok(hash) => {
                if existing_hashes.contains(&hash) {
                    report.duplicate = true;
                    report.flag_for_review = true;
                    report.content_hash = Some(hash);
                    return report.reject(DUPLICATE_MESSAGE.to_string());
                }
                report.content_hash = Some(hash);
            }
            Err(e) => {
                log::warn!("Hashing {} failed: {e}", upload.file_name);
                report
                    .warnings
                    .push(format!("Could not verify image uniqueness: {e}"));
            }
        }

        match self.analyzer.sharpness(upload.bytes) {
            Ok(sharpness) => {
                report.sharpness = Some(sharpness);
                if sharpness < self.config.blur_threshold {
                    report.flag_for_review = true;
                    report.warnings.push(format!(
                        "Image appears blurry (sharpness {sharpness:.1} below {:.0}); flagged for admin review",
                        self.config.blur_threshold
                    ));
                }
            }
            Err(e) => {
                log::debug!("Sharpness check on {} degraded: {e}", upload.file_name);
                report
                    .warnings
                    .push(format!("Could not verify image quality: {e}"));
            }
        }

        log::debug!(
            "Gate verdict for {}: accepted={} flag={} warnings={}",
            upload.file_name,
            report.accepted,
            report.flag_for_review,
            report.warnings.len()
        );
        report
    }
}
