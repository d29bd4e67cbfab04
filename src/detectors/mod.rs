//! Anomaly detectors and their shared signal vocabulary.
//!
//! Each detector maps hospital ids to a [`DetectorResult`]: a score in [0, 1]
//! plus zero or more explanatory [`Signal`]s. Signals are a closed tagged set;
//! only behavioral signals carry a severity, mirroring the persisted record
//! shape, which has no severity column.

pub mod behavioral;
pub mod cross_hospital;
pub mod cross_patient;
pub mod statistical;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::store::SignalRecord;

/// Epsilon floor added to every baseline sigma so z-scores stay defined even
/// when a baseline has a single sample.
pub const SIGMA_FLOOR: f64 = 1e-6;

/// Score above which a detector emits an explanatory signal.
pub const SIGNAL_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    Major,
    Minor,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::Major => "MAJOR",
            Severity::Minor => "MINOR",
        }
    }
}

/// One explanatory anomaly finding.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    StatisticalOutlier {
        field_id: String,
        score: f64,
        reason: String,
    },
    BehavioralAnomaly {
        severity: Severity,
        score: f64,
        reason: String,
    },
    CrossPatientTemplating {
        score: f64,
        reason: String,
    },
    PeerDeviation {
        score: f64,
        reason: String,
    },
}

impl Signal {
    pub fn score(&self) -> f64 {
        match self {
            Signal::StatisticalOutlier { score, .. }
            | Signal::BehavioralAnomaly { score, .. }
            | Signal::CrossPatientTemplating { score, .. }
            | Signal::PeerDeviation { score, .. } => *score,
        }
    }

    /// Maps the signal onto the persisted row shape. Statistical signals
    /// carry the affected field id; the others carry none. Behavioral
    /// severity is an in-memory detail and is not persisted.
    pub fn to_record(&self) -> SignalRecord {
        match self {
            Signal::StatisticalOutlier { field_id, score, reason } => SignalRecord {
                signal_type: "statistical_abnormality".to_string(),
                signal_key: "statistical_outlier".to_string(),
                affected_field: Some(field_id.clone()),
                anomaly_score: *score,
                explanation: reason.clone(),
            },
            Signal::BehavioralAnomaly { score, reason, .. } => SignalRecord {
                signal_type: "behavioral_anomaly".to_string(),
                signal_key: "behavioral_pattern".to_string(),
                affected_field: None,
                anomaly_score: *score,
                explanation: reason.clone(),
            },
            Signal::CrossPatientTemplating { score, reason } => SignalRecord {
                signal_type: "cross_patient_similarity".to_string(),
                signal_key: "patient_templating".to_string(),
                affected_field: None,
                anomaly_score: *score,
                explanation: reason.clone(),
            },
            Signal::PeerDeviation { score, reason } => SignalRecord {
                signal_type: "peer_deviation".to_string(),
                signal_key: "hospital_peer_outlier".to_string(),
                affected_field: None,
                anomaly_score: *score,
                explanation: reason.clone(),
            },
        }
    }
}

/// Score and signals for one hospital from one detector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectorResult {
    pub score: f64,
    pub signals: Vec<Signal>,
}

/// hospital id -> result, for one detector over one trial.
pub type DetectorResultMap = BTreeMap<String, DetectorResult>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_mapping_keeps_field_only_for_statistical_signals() {
        let stat = Signal::StatisticalOutlier {
            field_id: "bp_sys".to_string(),
            score: 0.8,
            reason: "Unusually low variance".to_string(),
        };
        let record = stat.to_record();
        assert_eq!(record.signal_type, "statistical_abnormality");
        assert_eq!(record.affected_field.as_deref(), Some("bp_sys"));

        let beh = Signal::BehavioralAnomaly {
            severity: Severity::Critical,
            score: 1.0,
            reason: "gap violation".to_string(),
        };
        let record = beh.to_record();
        assert_eq!(record.signal_type, "behavioral_anomaly");
        assert_eq!(record.affected_field, None);
        assert_eq!(record.anomaly_score, 1.0);
    }
}
