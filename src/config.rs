//! YAML configuration for the server and the analysis pipeline.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Version string stamped on every run record.
pub const AI_VERSION: &str = "v1.0";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// Shared secret checked against the `x-cron-secret` header on the
    /// batch trigger endpoint.
    pub cron_secret: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub trial_phase: TrialPhase,
    #[serde(default)]
    pub weights: FusionWeights,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StoreConfig {
    /// Optional JSON fixture of visit rows loaded into the in-memory store
    /// at startup.
    pub seed_path: Option<PathBuf>,
}

/// Protocol phase of the trial; selects the visit-gap rules applied by the
/// behavioral detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TrialPhase {
    #[serde(rename = "PHASE_2")]
    Phase2,
    #[default]
    #[serde(rename = "PHASE_3")]
    Phase3,
}

impl TrialPhase {
    /// Human-readable label used in signal explanations.
    pub fn label(&self) -> &'static str {
        match self {
            TrialPhase::Phase2 => "PHASE 2",
            TrialPhase::Phase3 => "PHASE 3",
        }
    }
}

/// Fixed fusion weights applied when combining the four detector scores.
/// Centralized here and passed into the fusion step so no second divergent
/// weight set can exist.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct FusionWeights {
    pub statistical: f64,
    pub behavioral: f64,
    pub cross_patient: f64,
    pub peer_deviation: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        FusionWeights {
            statistical: 0.20,
            behavioral: 0.20,
            cross_patient: 0.30,
            peer_deviation: 0.30,
        }
    }
}

impl FusionWeights {
    pub fn sum(&self) -> f64 {
        self.statistical + self.behavioral + self.cross_patient + self.peer_deviation
    }
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: Config = serde_yaml::from_str(&content)?;

    let weight_sum = config.analysis.weights.sum();
    if (weight_sum - 1.0).abs() > 1e-9 {
        return Err(ConfigError::Invalid(format!(
            "fusion weights must sum to 1.0, got {}",
            weight_sum
        )));
    }
    if config.api.cron_secret.is_empty() {
        return Err(ConfigError::Invalid("cron_secret must not be empty".to_string()));
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_one() {
        let weights = FusionWeights::default();
        assert!((weights.sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn phase_labels_drop_the_underscore() {
        assert_eq!(TrialPhase::Phase2.label(), "PHASE 2");
        assert_eq!(TrialPhase::Phase3.label(), "PHASE 3");
    }
}
