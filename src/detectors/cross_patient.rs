//! Pairwise patient-signature comparison to flag templated records.

use crate::detectors::{DetectorResult, DetectorResultMap, Signal};
use crate::features::cross_patient::CrossPatientFeatures;
use crate::stats::round2;

/// Hospitals with fewer patients than this are never accused: too small a
/// population to tell templating from natural similarity.
pub const MIN_PATIENTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplatingConfig {
    /// Absolute tolerance on first/last value differences.
    pub value_tolerance: f64,
    /// Absolute tolerance on slope differences.
    pub slope_tolerance: f64,
    /// Fields that must match before a patient pair counts as templated.
    pub min_matching_fields: usize,
    /// Templated pairs required before any signal is emitted.
    pub min_pairs: usize,
}

impl Default for TemplatingConfig {
    fn default() -> Self {
        TemplatingConfig {
            value_tolerance: 0.1,
            slope_tolerance: 0.1,
            min_matching_fields: 4,
            min_pairs: 2,
        }
    }
}

/// Counts templated patient pairs per hospital. Below `min_pairs` the
/// hospital scores 0.0 and emits nothing; at or above it the score is
/// `min(pairs / min_pairs, 1.0)` with one generic signal.
pub fn detect_cross_patient_templating(
    features: &CrossPatientFeatures,
    config: &TemplatingConfig,
) -> DetectorResultMap {
    let mut results = DetectorResultMap::new();

    for (hospital_id, patients) in features {
        if patients.len() < MIN_PATIENTS {
            results.insert(hospital_id.clone(), DetectorResult::default());
            continue;
        }

        let signatures: Vec<_> = patients.values().collect();
        let mut templated_pairs = 0usize;

        for i in 0..signatures.len() {
            for j in (i + 1)..signatures.len() {
                let mut matching_fields = 0usize;
                for (field_id, f1) in signatures[i] {
                    let Some(f2) = signatures[j].get(field_id) else {
                        continue;
                    };
                    if (f1.first - f2.first).abs() <= config.value_tolerance
                        && (f1.last - f2.last).abs() <= config.value_tolerance
                        && (f1.slope - f2.slope).abs() <= config.slope_tolerance
                    {
                        matching_fields += 1;
                    }
                }
                if matching_fields >= config.min_matching_fields {
                    templated_pairs += 1;
                }
            }
        }

        if templated_pairs < config.min_pairs {
            results.insert(hospital_id.clone(), DetectorResult::default());
            continue;
        }

        let score = round2((templated_pairs as f64 / config.min_pairs as f64).min(1.0));
        let signals = vec![Signal::CrossPatientTemplating {
            score,
            reason: "Multiple patients exhibit near-identical longitudinal patterns \
                     across several clinical fields, which is inconsistent with \
                     natural patient variability and suggests template-based reporting"
                .to_string(),
        }];
        results.insert(hospital_id.clone(), DetectorResult { score, signals });
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::cross_patient::FieldSignature;
    use std::collections::BTreeMap;

    fn signature(first: f64, last: f64) -> FieldSignature {
        FieldSignature {
            first,
            last,
            slope: last - first,
            std: (last - first).abs() / 2.0,
        }
    }

    /// Builds one patient's signatures over `fields` with a per-patient
    /// offset applied to every value.
    fn patient(fields: &[&str], offset: f64) -> BTreeMap<String, FieldSignature> {
        fields
            .iter()
            .map(|f| (f.to_string(), signature(100.0 + offset, 110.0 + offset)))
            .collect()
    }

    fn hospital(
        patients: Vec<(&str, BTreeMap<String, FieldSignature>)>,
    ) -> CrossPatientFeatures {
        let mut features = CrossPatientFeatures::new();
        features.insert(
            "hosp-1".to_string(),
            patients
                .into_iter()
                .map(|(id, sigs)| (id.to_string(), sigs))
                .collect(),
        );
        features
    }

    const FIELDS: [&str; 5] = ["bp_sys", "bp_dia", "pulse", "weight", "temp"];

    #[test]
    fn fewer_than_three_patients_is_never_flagged() {
        // Two byte-identical patients: the population guard wins.
        let features = hospital(vec![
            ("pat-1", patient(&FIELDS, 0.0)),
            ("pat-2", patient(&FIELDS, 0.0)),
        ]);
        let results = detect_cross_patient_templating(&features, &TemplatingConfig::default());
        assert_eq!(results["hosp-1"].score, 0.0);
        assert!(results["hosp-1"].signals.is_empty());
    }

    #[test]
    fn single_templated_pair_stays_below_the_gate() {
        // pat-1 and pat-2 match on all five fields; pat-3 is far away.
        let features = hospital(vec![
            ("pat-1", patient(&FIELDS, 0.0)),
            ("pat-2", patient(&FIELDS, 0.05)),
            ("pat-3", patient(&FIELDS, 50.0)),
        ]);
        let results = detect_cross_patient_templating(&features, &TemplatingConfig::default());
        assert_eq!(results["hosp-1"].score, 0.0);
        assert!(results["hosp-1"].signals.is_empty());
    }

    #[test]
    fn three_identical_patients_form_three_pairs_and_saturate() {
        let features = hospital(vec![
            ("pat-1", patient(&FIELDS, 0.0)),
            ("pat-2", patient(&FIELDS, 0.0)),
            ("pat-3", patient(&FIELDS, 0.0)),
        ]);
        let results = detect_cross_patient_templating(&features, &TemplatingConfig::default());
        let result = &results["hosp-1"];
        assert_eq!(result.score, 1.0);
        assert_eq!(result.signals.len(), 1);
        match &result.signals[0] {
            Signal::CrossPatientTemplating { score, .. } => assert_eq!(*score, 1.0),
            other => panic!("unexpected signal {:?}", other),
        }
    }

    #[test]
    fn few_coincidental_field_matches_do_not_count() {
        // Only three common fields match: below min_matching_fields.
        let features = hospital(vec![
            ("pat-1", patient(&FIELDS[..3], 0.0)),
            ("pat-2", patient(&FIELDS[..3], 0.0)),
            ("pat-3", patient(&FIELDS[..3], 0.0)),
        ]);
        let results = detect_cross_patient_templating(&features, &TemplatingConfig::default());
        assert_eq!(results["hosp-1"].score, 0.0);
        assert!(results["hosp-1"].signals.is_empty());
    }

    #[test]
    fn tolerances_are_absolute_not_relative() {
        // Offsets of 0.1 sit exactly at the tolerance boundary and match;
        // 0.11 does not.
        let features = hospital(vec![
            ("pat-1", patient(&FIELDS, 0.0)),
            ("pat-2", patient(&FIELDS, 0.1)),
            ("pat-3", patient(&FIELDS, 0.0)),
        ]);
        let results = detect_cross_patient_templating(&features, &TemplatingConfig::default());
        // All three pairs match within tolerance: score saturates.
        assert_eq!(results["hosp-1"].score, 1.0);

        let features = hospital(vec![
            ("pat-1", patient(&FIELDS, 0.0)),
            ("pat-2", patient(&FIELDS, 0.11)),
            ("pat-3", patient(&FIELDS, 0.22)),
        ]);
        let results = detect_cross_patient_templating(&features, &TemplatingConfig::default());
        assert_eq!(results["hosp-1"].score, 0.0);
    }
}
