//! Per-hospital score vectors assembled from the three upstream detectors.

use std::collections::{BTreeMap, BTreeSet};

use crate::detectors::DetectorResultMap;

/// Combined anomaly-score vector of one hospital, used only for
/// peer-deviation comparison.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScoreVector {
    pub statistical: f64,
    pub behavioral: f64,
    pub cross_patient: f64,
}

impl ScoreVector {
    pub fn euclidean_distance(&self, other: &ScoreVector) -> f64 {
        ((self.statistical - other.statistical).powi(2)
            + (self.behavioral - other.behavioral).powi(2)
            + (self.cross_patient - other.cross_patient).powi(2))
        .sqrt()
    }
}

/// hospital id -> score vector
pub type ScoreVectorMap = BTreeMap<String, ScoreVector>;

/// Unions the hospital ids of the three detector result sets; a hospital
/// missing from a set contributes 0.0 on that coordinate.
pub fn extract_cross_hospital_features(
    statistical: &DetectorResultMap,
    behavioral: &DetectorResultMap,
    cross_patient: &DetectorResultMap,
) -> ScoreVectorMap {
    let mut hospitals: BTreeSet<&String> = BTreeSet::new();
    hospitals.extend(statistical.keys());
    hospitals.extend(behavioral.keys());
    hospitals.extend(cross_patient.keys());

    hospitals
        .into_iter()
        .map(|hospital_id| {
            (
                hospital_id.clone(),
                ScoreVector {
                    statistical: statistical.get(hospital_id).map_or(0.0, |r| r.score),
                    behavioral: behavioral.get(hospital_id).map_or(0.0, |r| r.score),
                    cross_patient: cross_patient.get(hospital_id).map_or(0.0, |r| r.score),
                },
            )
        })
        .collect()
}
