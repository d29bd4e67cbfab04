//! Baseline-relative z-score detection over field distributions.

use std::collections::BTreeMap;

use crate::detectors::{DetectorResult, DetectorResultMap, Signal, SIGMA_FLOOR, SIGNAL_THRESHOLD};
use crate::features::statistical::StatisticalFeatures;
use crate::stats::{self, round2, z_score};

const EXPLANATION_Z: f64 = 2.0;
const ROUNDING_RATIO_THRESHOLD: f64 = 0.4;

/// Trial-wide reference distribution for one field: mu/sigma of each
/// hospital's mean, std, and entropy.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldBaseline {
    pub mean_mu: f64,
    pub mean_sigma: f64,
    pub std_mu: f64,
    pub std_sigma: f64,
    pub entropy_mu: f64,
    pub entropy_sigma: f64,
}

/// field id -> baseline
pub type TrialBaseline = BTreeMap<String, FieldBaseline>;

pub fn build_trial_baseline(features: &StatisticalFeatures) -> TrialBaseline {
    let mut samples: BTreeMap<&str, (Vec<f64>, Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for hospital_fields in features.values() {
        for (field_id, field_stats) in hospital_fields {
            let entry = samples.entry(field_id.as_str()).or_default();
            entry.0.push(field_stats.mean);
            entry.1.push(field_stats.std);
            entry.2.push(field_stats.entropy);
        }
    }

    samples
        .into_iter()
        .map(|(field_id, (means, stds, entropies))| {
            (
                field_id.to_string(),
                FieldBaseline {
                    mean_mu: stats::mean(&means),
                    mean_sigma: stats::std_pop(&means) + SIGMA_FLOOR,
                    std_mu: stats::mean(&stds),
                    std_sigma: stats::std_pop(&stds) + SIGMA_FLOOR,
                    entropy_mu: stats::mean(&entropies),
                    entropy_sigma: stats::std_pop(&entropies) + SIGMA_FLOOR,
                },
            )
        })
        .collect()
}

/// Scores each (hospital, field) against the trial baseline. A hospital's
/// statistical score is the mean of its per-field scores, 0.0 if no field of
/// it could be evaluated.
pub fn detect_statistical_anomalies(
    features: &StatisticalFeatures,
    baseline: &TrialBaseline,
) -> DetectorResultMap {
    let mut results = DetectorResultMap::new();

    for (hospital_id, hospital_fields) in features {
        let mut total = 0.0;
        let mut evaluated = 0usize;
        let mut signals = Vec::new();

        for (field_id, field_stats) in hospital_fields {
            let Some(base) = baseline.get(field_id) else {
                continue;
            };

            let mean_z = z_score(field_stats.mean, base.mean_mu, base.mean_sigma);
            let std_z = z_score(field_stats.std, base.std_mu, base.std_sigma);
            let entropy_z = z_score(field_stats.entropy, base.entropy_mu, base.entropy_sigma);

            let field_score = (mean_z.max(std_z).max(entropy_z) / 3.0).min(1.0);

            if field_score > SIGNAL_THRESHOLD {
                let mut reasons = Vec::new();
                if std_z > EXPLANATION_Z {
                    reasons.push("Unusually low variance");
                }
                if entropy_z > EXPLANATION_Z {
                    reasons.push("Low randomness");
                }
                if field_stats.rounding_ratio > ROUNDING_RATIO_THRESHOLD {
                    reasons.push("Heavy rounding bias");
                }
                // A field can cross the threshold on its mean alone; never
                // persist an empty explanation.
                let reason = if reasons.is_empty() {
                    "Elevated deviation from trial-wide baseline".to_string()
                } else {
                    reasons.join(", ")
                };

                signals.push(Signal::StatisticalOutlier {
                    field_id: field_id.clone(),
                    score: round2(field_score),
                    reason,
                });
            }

            total += field_score;
            evaluated += 1;
        }

        let score = if evaluated > 0 {
            round2(total / evaluated as f64)
        } else {
            0.0
        };
        results.insert(hospital_id.clone(), DetectorResult { score, signals });
    }

    results
}
