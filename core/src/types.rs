//! Shared primitive types used across the core.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Internal complaint identifier (SQLite row id).
pub type ComplaintId = i64;

/// Opaque user identifier issued by the identity provider.
pub type UserId = String;

/// The closed department vocabulary.
///
/// Declaration order is significant: it is the fallback classifier's
/// tie-break order and the order used in summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Department {
    Water,
    Electricity,
    Roads,
    Sanitation,
    Health,
    #[serde(rename = "Public Safety")]
    PublicSafety,
    Education,
    Other,
}

impl Department {
    pub const ALL: [Department; 8] = [
        Self::Water,
        Self::Electricity,
        Self::Roads,
        Self::Sanitation,
        Self::Health,
        Self::PublicSafety,
        Self::Education,
        Self::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Water        => "Water",
            Self::Electricity  => "Electricity",
            Self::Roads        => "Roads",
            Self::Sanitation   => "Sanitation",
            Self::Health       => "Health",
            Self::PublicSafety => "Public Safety",
            Self::Education    => "Education",
            Self::Other        => "Other",
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Department {
    type Err = String;

    /// Accepts the display label case-insensitively, plus `public_safety`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', " ");
        Self::ALL
            .into_iter()
            .find(|d| d.label().to_ascii_lowercase() == normalized)
            .ok_or_else(|| format!("unknown department: {s:?}"))
    }
}

/// Lifecycle status of a complaint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintStatus {
    Pending,
    InProgress,
    Resolved,
    Rejected,
}

impl ComplaintStatus {
    pub const ALL: [ComplaintStatus; 4] =
        [Self::Pending, Self::InProgress, Self::Resolved, Self::Rejected];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending    => "pending",
            Self::InProgress => "in_progress",
            Self::Resolved   => "resolved",
            Self::Rejected   => "rejected",
        }
    }
}

impl fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplaintStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|st| st.as_str() == s.trim())
            .ok_or_else(|| format!("unknown status: {s:?}"))
    }
}

/// Ward / zone / area triple derived from a complaint's coordinates or
/// assigned to a volunteer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locality {
    pub ward: Option<String>,
    pub zone: Option<String>,
    pub area: Option<String>,
}
