//! Per (hospital, field) numeric distribution summaries.

use std::collections::BTreeMap;

use crate::stats;
use crate::store::VisitRow;

/// Fields with fewer observations than this carry too little evidence to
/// judge and are excluded entirely.
pub const MIN_FIELD_OBSERVATIONS: usize = 5;

const HISTOGRAM_BINS: usize = 10;
const ROUNDING_BASE: f64 = 5.0;

/// Distribution summary of one field's values at one hospital.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldStats {
    pub mean: f64,
    pub std: f64,
    pub iqr: f64,
    pub entropy: f64,
    /// Fraction of values exactly divisible by 5.
    pub rounding_ratio: f64,
    pub count: usize,
}

/// hospital id -> field id -> stats
pub type StatisticalFeatures = BTreeMap<String, BTreeMap<String, FieldStats>>;

fn rounding_ratio(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let rounded = values.iter().filter(|v| **v % ROUNDING_BASE == 0.0).count();
    rounded as f64 / values.len() as f64
}

pub fn extract_statistical_features(rows: &[VisitRow]) -> StatisticalFeatures {
    let mut groups: BTreeMap<(String, String), Vec<f64>> = BTreeMap::new();
    for row in rows {
        groups
            .entry((row.hospital_id.clone(), row.crf_field_id.clone()))
            .or_default()
            .push(row.value_number);
    }

    let mut features = StatisticalFeatures::new();
    for ((hospital_id, field_id), values) in groups {
        if values.len() < MIN_FIELD_OBSERVATIONS {
            continue;
        }

        features.entry(hospital_id).or_default().insert(
            field_id,
            FieldStats {
                mean: stats::mean(&values),
                std: stats::std_pop(&values),
                iqr: stats::iqr(&values),
                entropy: stats::histogram_entropy(&values, HISTOGRAM_BINS),
                rounding_ratio: rounding_ratio(&values),
                count: values.len(),
            },
        );
    }
    features
}
