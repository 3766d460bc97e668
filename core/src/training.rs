//! Builds a `TrainedModel` from a labelled corpus.
//!
//! The model is deliberately simple: each department's keyword set is the
//! union of the tokens of every sample labelled with it.

use crate::classifier::{tokenize, DepartmentKeywords, ModelError, TrainedModel};
use crate::types::Department;
use indexmap::IndexMap;
use std::io::BufRead;

pub const MODEL_VERSION: &str = "keyword-overlap-1";

#[derive(Debug, Clone, PartialEq)]
pub struct LabelledSample {
    pub text: String,
    pub department: Department,
}

/// Parse `text,department` lines. The first line is a header. Blank lines
/// are skipped. The split is on the last comma so sample text may contain
/// commas; surrounding double quotes are trimmed.
pub fn parse_labelled_csv<R: BufRead>(reader: R) -> Result<Vec<LabelledSample>, ModelError> {
    let mut samples = Vec::new();
    for (index, line) in reader.lines().enumerate().skip(1) {
        let line_no = index + 1;
        let line = line.map_err(|e| ModelError::Corpus {
            line: line_no,
            reason: e.to_string(),
        })?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((text, label)) = line.rsplit_once(',') else {
            return Err(ModelError::Corpus {
                line: line_no,
                reason: "expected `text,department`".into(),
            });
        };
        let department = label.trim().parse().map_err(|reason| ModelError::Corpus {
            line: line_no,
            reason,
        })?;
        samples.push(LabelledSample {
            text: text.trim().trim_matches('"').to_string(),
            department,
        });
    }
    Ok(samples)
}

impl TrainedModel {
    pub fn train<I>(samples: I) -> Result<Self, ModelError>
    where
        I: IntoIterator<Item = LabelledSample>,
    {
        let mut per_department: IndexMap<Department, DepartmentKeywords> = IndexMap::new();
        let mut corpus_size = 0;
        for sample in samples {
            let entry = per_department.entry(sample.department).or_default();
            entry.keywords.extend(tokenize(&sample.text));
            entry.sample_count += 1;
            corpus_size += 1;
        }
        if corpus_size == 0 {
            return Err(ModelError::EmptyCorpus);
        }
        log::info!(
            "Trained keyword model on {corpus_size} samples across {} departments",
            per_department.len()
        );
        Ok(Self {
            version: MODEL_VERSION.to_string(),
            per_department,
            corpus_size,
        })
    }

    /// Share of held-out samples the model labels correctly, trained path
    /// only (no fallback). Samples with no keyword overlap count as misses.
    pub fn accuracy(&self, samples: &[LabelledSample]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        let classifier = crate::classifier::Classifier::with_model(self.clone());
        let hits = samples
            .iter()
            .filter(|s| {
                classifier
                    .classify_trained(&s.text)
                    .is_ok_and(|c| c.department == s.department)
            })
            .count();
        hits as f64 / samples.len() as f64
    }
}
