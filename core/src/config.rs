//! Runtime configuration, loaded once at process start.
//!
//! Every field has a default, so a config file only needs to name what it
//! overrides.

use serde::{Deserialize, Serialize};

/// 10 MiB.
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

pub const DEFAULT_BLUR_THRESHOLD: f64 = 100.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub max_bytes: usize,
    pub allowed_content_types: Vec<String>,
    pub blur_threshold: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_IMAGE_BYTES,
            allowed_content_types: vec![
                "image/jpeg".into(),
                "image/png".into(),
                "image/gif".into(),
                "image/webp".into(),
            ],
            blur_threshold: DEFAULT_BLUR_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Trained keyword model. A missing file is not an error.
    pub model_path: Option<String>,
    /// Overlap count that maps to full confidence on the trained path.
    pub trained_confidence_divisor: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            trained_confidence_divisor: 5.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CivicConfig {
    pub gate: GateConfig,
    pub classifier: ClassifierConfig,
    /// How many fresh tracking codes to try before giving up on a collision.
    pub tracking_code_attempts: u32,
    pub busy_timeout_ms: u64,
}

impl Default for CivicConfig {
    fn default() -> Self {
        Self {
            gate: GateConfig::default(),
            classifier: ClassifierConfig::default(),
            tracking_code_attempts: 5,
            busy_timeout_ms: 5_000,
        }
    }
}

impl CivicConfig {
    /// Load from a JSON file.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: CivicConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.gate.max_bytes == 0 {
            anyhow::bail!("gate.max_bytes must be positive");
        }
        if self.gate.allowed_content_types.is_empty() {
            anyhow::bail!("gate.allowed_content_types must not be empty");
        }
        if !(self.classifier.trained_confidence_divisor > 0.0) {
            anyhow::bail!("classifier.trained_confidence_divisor must be positive");
        }
        if self.tracking_code_attempts == 0 {
            anyhow::bail!("tracking_code_attempts must be at least 1");
        }
        Ok(())
    }

    /// Config for unit and integration tests: defaults, no trained model.
    pub fn default_test() -> Self {
        Self {
            busy_timeout_ms: 10_000,
            ..Self::default()
        }
    }
}
