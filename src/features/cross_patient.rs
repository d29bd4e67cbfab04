//! Per (hospital, patient, field) longitudinal signatures.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::stats;
use crate::store::VisitRow;

/// A field needs at least this many values over time to carry longitudinal
/// information.
pub const MIN_LONGITUDINAL_VALUES: usize = 2;

/// Longitudinal shape of one field for one patient: value at the first and
/// last visit, net change, and spread.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSignature {
    pub first: f64,
    pub last: f64,
    pub slope: f64,
    pub std: f64,
}

/// hospital id -> patient id -> field id -> signature
pub type CrossPatientFeatures =
    BTreeMap<String, BTreeMap<String, BTreeMap<String, FieldSignature>>>;

pub fn extract_cross_patient_features(rows: &[VisitRow]) -> CrossPatientFeatures {
    let mut groups: BTreeMap<(String, String, String), Vec<(NaiveDateTime, f64)>> =
        BTreeMap::new();
    for row in rows {
        groups
            .entry((
                row.hospital_id.clone(),
                row.patient_id.clone(),
                row.crf_field_id.clone(),
            ))
            .or_default()
            .push((row.visit_date, row.value_number));
    }

    let mut features = CrossPatientFeatures::new();
    for ((hospital_id, patient_id, field_id), mut series) in groups {
        if series.len() < MIN_LONGITUDINAL_VALUES {
            continue;
        }
        series.sort_by_key(|(date, _)| *date);
        let values: Vec<f64> = series.iter().map(|(_, v)| *v).collect();

        let first = values[0];
        let last = values[values.len() - 1];
        features
            .entry(hospital_id)
            .or_default()
            .entry(patient_id)
            .or_default()
            .insert(
                field_id,
                FieldSignature {
                    first,
                    last,
                    slope: last - first,
                    std: stats::std_pop(&values),
                },
            );
    }
    features
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(patient: &str, field: &str, day: u32, value: f64) -> VisitRow {
        let visit_date = NaiveDate::from_ymd_opt(2025, 4, day)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        VisitRow {
            hospital_id: "hosp-1".to_string(),
            patient_id: patient.to_string(),
            visit_id: format!("{}-{}-{}", patient, field, day),
            visit_date,
            created_at: visit_date,
            crf_field_id: field.to_string(),
            value_number: value,
        }
    }

    #[test]
    fn single_value_fields_are_skipped() {
        let rows = vec![row("pat-1", "bp_sys", 1, 120.0)];
        assert!(extract_cross_patient_features(&rows).is_empty());
    }

    #[test]
    fn signature_is_computed_over_date_sorted_values() {
        // Rows arrive out of visit order; first/last must follow dates.
        let rows = vec![
            row("pat-1", "bp_sys", 15, 140.0),
            row("pat-1", "bp_sys", 1, 120.0),
            row("pat-1", "bp_sys", 8, 130.0),
        ];
        let features = extract_cross_patient_features(&rows);
        let sig = &features["hosp-1"]["pat-1"]["bp_sys"];
        assert_eq!(sig.first, 120.0);
        assert_eq!(sig.last, 140.0);
        assert_eq!(sig.slope, 20.0);
        assert!(sig.std > 0.0);
    }
}
