//! Department classifier.
//!
//! Two strategies share one contract, `classify(text) -> Classification`:
//!
//!   1. Trained: token overlap against a keyword model produced by
//!      `training.rs`. Used when a model is loaded and at least one
//!      department overlaps.
//!   2. Keyword fallback: substring hits against a fixed lexicon.
//!
//! The classifier never fails. Anything it cannot make sense of is
//! `Department::Other` with confidence 0.0.
//!
//! TIE-BREAKS (both tested):
//!   - trained: first department in the model's stored order wins;
//!   - fallback: first department in `FALLBACK_LEXICON` order wins.

use crate::config::ClassifierConfig;
use crate::types::Department;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use thiserror::Error;

/// Fixed keyword lexicon for the fallback strategy, in tie-break order.
pub const FALLBACK_LEXICON: &[(Department, &[&str])] = &[
    (Department::Water, &[
        "water", "pipe", "leak", "supply", "sewage", "drainage", "tap", "well", "tanker",
        "purification",
    ]),
    (Department::Electricity, &[
        "electricity", "power", "light", "pole", "blackout", "wire", "voltage", "meter",
        "transformer",
    ]),
    (Department::Roads, &[
        "road", "pothole", "pavement", "street", "traffic", "highway", "lane", "asphalt",
        "damaged", "manhole",
    ]),
    (Department::Sanitation, &[
        "garbage", "waste", "cleaning", "dustbin", "hygiene", "litter", "sweeping", "trash",
    ]),
    (Department::Health, &[
        "hospital", "clinic", "health", "medical", "doctor", "nurse", "patient", "medicine",
        "disease",
    ]),
    (Department::PublicSafety, &[
        "police", "crime", "security", "safety", "accident", "theft", "robbery", "assault",
    ]),
    (Department::Education, &[
        "school", "college", "university", "education", "student", "teacher", "exam",
        "classroom",
    ]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Trained,
    Keyword,
    /// Nothing matched; catch-all department.
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub department: Department,
    pub confidence: f64,
    pub strategy: Strategy,
}

impl Classification {
    fn catch_all() -> Self {
        Self {
            department: Department::Other,
            confidence: 0.0,
            strategy: Strategy::Default,
        }
    }
}

/// Why the trained strategy produced no answer. The caller falls back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ClassifierUnavailable {
    #[error("no trained model loaded")]
    NoModel,
    #[error("no model keywords matched")]
    NoMatch,
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("cannot read model {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed model: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("model names unknown department {0:?}")]
    UnknownDepartment(String),
    #[error("training corpus line {line}: {reason}")]
    Corpus { line: usize, reason: String },
    #[error("training corpus is empty")]
    EmptyCorpus,
}

/// Lowercase, drop everything but ASCII alphanumerics and whitespace, split
/// on whitespace.
pub fn tokenize(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect();
    cleaned.split_whitespace().map(str::to_string).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DepartmentKeywords {
    pub keywords: BTreeSet<String>,
    #[serde(default)]
    pub sample_count: usize,
}

/// A keyword model keyed by department. Iteration order is the order the
/// departments were first seen in the training corpus and is preserved
/// through the JSON artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawModel", into = "RawModel")]
pub struct TrainedModel {
    pub version: String,
    pub per_department: IndexMap<Department, DepartmentKeywords>,
    pub corpus_size: usize,
}

/// On-disk shape. Labels stay strings until validated.
#[derive(Serialize, Deserialize)]
struct RawModel {
    #[serde(default)]
    version: String,
    departments: IndexMap<String, DepartmentKeywords>,
    #[serde(default)]
    corpus_size: usize,
}

impl TryFrom<RawModel> for TrainedModel {
    type Error = ModelError;

    fn try_from(raw: RawModel) -> Result<Self, Self::Error> {
        let mut per_department = IndexMap::with_capacity(raw.departments.len());
        for (label, mut entry) in raw.departments {
            let department: Department = label
                .parse()
                .map_err(|_| ModelError::UnknownDepartment(label.clone()))?;
            entry.keywords = entry.keywords.iter().map(|k| k.to_lowercase()).collect();
            per_department.insert(department, entry);
        }
        Ok(Self {
            version: raw.version,
            per_department,
            corpus_size: raw.corpus_size,
        })
    }
}

impl From<TrainedModel> for RawModel {
    fn from(model: TrainedModel) -> Self {
        Self {
            version: model.version,
            departments: model
                .per_department
                .into_iter()
                .map(|(d, k)| (d.label().to_string(), k))
                .collect(),
            corpus_size: model.corpus_size,
        }
    }
}

impl TrainedModel {
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        // Going through RawModel directly keeps the validation error typed.
        let raw: RawModel = serde_json::from_str(json)?;
        Self::try_from(raw)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| ModelError::Io {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Immutable after construction; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Classifier {
    model: Option<TrainedModel>,
    confidence_divisor: f64,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::fallback_only()
    }
}

impl Classifier {
    pub fn fallback_only() -> Self {
        Self {
            model: None,
            confidence_divisor: ClassifierConfig::default().trained_confidence_divisor,
        }
    }

    pub fn with_model(model: TrainedModel) -> Self {
        Self {
            model: Some(model),
            ..Self::fallback_only()
        }
    }

    /// Build from config. A configured path that does not exist falls back
    /// to keywords; a file that exists but does not parse is an error.
    pub fn from_config(config: &ClassifierConfig) -> Result<Self, ModelError> {
        let model = match config.model_path.as_deref() {
            Some(path) if Path::new(path).exists() => {
                let model = TrainedModel::load(path)?;
                log::info!(
                    "Loaded classifier model {path} (version {:?}, {} departments)",
                    model.version,
                    model.per_department.len()
                );
                Some(model)
            }
            Some(path) => {
                log::debug!("Classifier model {path} not found; using keyword fallback");
                None
            }
            None => None,
        };
        Ok(Self {
            model,
            confidence_divisor: config.trained_confidence_divisor,
        })
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    pub fn classify(&self, text: &str) -> Classification {
        if text.trim().is_empty() {
            return Classification::catch_all();
        }
        match self.classify_trained(text) {
            Ok(result) => result,
            Err(reason) => {
                log::debug!("Trained classifier unavailable ({reason}); using keyword fallback");
                classify_fallback(text)
            }
        }
    }

    /// Classify raw request bytes. Invalid UTF-8 is the catch-all.
    pub fn classify_bytes(&self, bytes: &[u8]) -> Classification {
        match std::str::from_utf8(bytes) {
            Ok(text) => self.classify(text),
            Err(_) => Classification::catch_all(),
        }
    }

    pub fn classify_trained(&self, text: &str) -> Result<Classification, ClassifierUnavailable> {
        let model = self.model.as_ref().ok_or(ClassifierUnavailable::NoModel)?;
        let tokens: HashSet<String> = tokenize(text).into_iter().collect();

        let mut best: Option<(Department, usize)> = None;
        for (department, entry) in &model.per_department {
            let overlap = tokens.iter().filter(|t| entry.keywords.contains(*t)).count();
            // Strictly greater: earlier departments keep ties.
            if overlap > 0 && best.map_or(true, |(_, b)| overlap > b) {
                best = Some((*department, overlap));
            }
        }

        let (department, overlap) = best.ok_or(ClassifierUnavailable::NoMatch)?;
        Ok(Classification {
            department,
            confidence: (overlap as f64 / self.confidence_divisor).min(1.0),
            strategy: Strategy::Trained,
        })
    }
}

/// Keyword fallback. Score is the number of distinct lexicon keywords that
/// occur anywhere in the lowercased text.
pub fn classify_fallback(text: &str) -> Classification {
    let lowered = text.to_lowercase();
    let mut best: Option<(Department, usize, usize)> = None;

    for (department, keywords) in FALLBACK_LEXICON {
        let score = keywords.iter().filter(|k| lowered.contains(*k)).count();
        if score > 0 && best.map_or(true, |(_, b, _)| score > b) {
            best = Some((*department, score, keywords.len()));
        }
    }

    match best {
        Some((department, score, total)) => Classification {
            department,
            confidence: (score as f64 / total as f64).min(1.0),
            strategy: Strategy::Keyword,
        },
        None => Classification::catch_all(),
    }
}
