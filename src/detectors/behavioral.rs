//! Behavioral anomaly detection: absolute protocol rules first, then
//! baseline-relative heuristics.

use crate::config::TrialPhase;
use crate::detectors::{
    DetectorResult, DetectorResultMap, Severity, Signal, SIGMA_FLOOR, SIGNAL_THRESHOLD,
};
use crate::features::behavioral::{BehavioralFeatureMap, BehavioralFeatures};
use crate::stats::{self, round2, z_score};

/// Raw ratio a concentration feature must exceed, on top of its z-score,
/// before a signal is emitted. Keeps naturally low ratios from being flagged
/// on small baseline deviations alone.
const RATIO_GATE: f64 = 0.4;

const SHORT_GAP_SCALE: f64 = 1.5;

/// Phase-dependent inter-visit gap rules. The hard gap is one day in every
/// phase; the protocol minimum tightens from PHASE_2 to PHASE_3.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisitGapRules {
    pub min_gap_days: f64,
    pub hard_gap_days: f64,
}

impl VisitGapRules {
    pub fn for_phase(phase: TrialPhase) -> Self {
        match phase {
            TrialPhase::Phase2 => VisitGapRules {
                min_gap_days: 3.0,
                hard_gap_days: 1.0,
            },
            TrialPhase::Phase3 => VisitGapRules {
                min_gap_days: 7.0,
                hard_gap_days: 1.0,
            },
        }
    }
}

/// Mu/sigma of one behavioral feature across hospitals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaselineStat {
    pub mu: f64,
    pub sigma: f64,
}

impl BaselineStat {
    fn from_samples(values: &[f64]) -> Self {
        BaselineStat {
            mu: stats::mean(values),
            sigma: stats::std_pop(values) + SIGMA_FLOOR,
        }
    }
}

/// Per-feature baseline for the heuristic checks. The absolute gap rules do
/// not depend on this.
#[derive(Debug, Clone, PartialEq)]
pub struct BehavioralBaseline {
    pub median_delay: BaselineStat,
    pub p90_delay: BaselineStat,
    pub burstiness: BaselineStat,
    pub same_hour: BaselineStat,
    pub weekend: BaselineStat,
    pub same_day: BaselineStat,
}

pub fn build_behavioral_baseline(features: &BehavioralFeatureMap) -> BehavioralBaseline {
    fn collect(features: &BehavioralFeatureMap, f: impl Fn(&BehavioralFeatures) -> f64) -> Vec<f64> {
        features.values().map(f).collect()
    }

    BehavioralBaseline {
        median_delay: BaselineStat::from_samples(&collect(features, |h| h.median_delay_days)),
        p90_delay: BaselineStat::from_samples(&collect(features, |h| h.p90_delay_days)),
        burstiness: BaselineStat::from_samples(&collect(features, |h| h.submission_burstiness)),
        same_hour: BaselineStat::from_samples(&collect(features, |h| h.same_hour_ratio)),
        weekend: BaselineStat::from_samples(&collect(features, |h| h.weekend_ratio)),
        same_day: BaselineStat::from_samples(&collect(features, |h| h.same_day_visit_ratio)),
    }
}

/// Detects behavioral anomalies per hospital.
///
/// A hard gap violation is an absolute CRITICAL outcome: the hospital scores
/// 1.0 with a single signal and no further checks run. Short-gap violations
/// emit a MAJOR signal whose score joins the aggregate. The five heuristic
/// scores are computed only when a baseline is supplied and always join the
/// aggregate, signal or not.
pub fn detect_behavioral_anomalies(
    features: &BehavioralFeatureMap,
    baseline: Option<&BehavioralBaseline>,
    phase: TrialPhase,
) -> DetectorResultMap {
    let rules = VisitGapRules::for_phase(phase);
    let mut results = DetectorResultMap::new();

    for (hospital_id, h) in features {
        let mut signals = Vec::new();
        let mut collected = Vec::new();

        if h.hard_gap_violations > 0 {
            signals.push(Signal::BehavioralAnomaly {
                severity: Severity::Critical,
                score: 1.0,
                reason: format!(
                    "One or more patient visits occurred less than 24 hours apart, \
                     which is clinically implausible in {} trials",
                    phase.label()
                ),
            });
            results.insert(hospital_id.clone(), DetectorResult { score: 1.0, signals });
            continue;
        }

        if h.short_gap_ratio > 0.0 {
            let score = round2(h.short_gap_ratio * SHORT_GAP_SCALE).min(1.0);
            signals.push(Signal::BehavioralAnomaly {
                severity: Severity::Major,
                score,
                reason: format!(
                    "{}% of patient visit intervals are shorter than {} days, \
                     indicating abnormal visit scheduling",
                    (h.short_gap_ratio * 100.0) as i64,
                    rules.min_gap_days
                ),
            });
            collected.push(score);
        }

        if let Some(base) = baseline {
            // Entry delay, combining median and p90 via max.
            let z_med = z_score(h.median_delay_days, base.median_delay.mu, base.median_delay.sigma);
            let z_p90 = z_score(h.p90_delay_days, base.p90_delay.mu, base.p90_delay.sigma);
            let delay_score = (z_med.max(z_p90) / 3.0).min(1.0);
            if delay_score > SIGNAL_THRESHOLD {
                signals.push(Signal::BehavioralAnomaly {
                    severity: Severity::Minor,
                    score: round2(delay_score),
                    reason: "Unusually high delay between visit date and data entry".to_string(),
                });
            }
            collected.push(delay_score);

            let z_burst =
                z_score(h.submission_burstiness, base.burstiness.mu, base.burstiness.sigma);
            let burst_score = (z_burst / 3.0).min(1.0);
            if burst_score > SIGNAL_THRESHOLD {
                signals.push(Signal::BehavioralAnomaly {
                    severity: Severity::Minor,
                    score: round2(burst_score),
                    reason: "Batch-style submission behavior detected".to_string(),
                });
            }
            collected.push(burst_score);

            let z_hour = z_score(h.same_hour_ratio, base.same_hour.mu, base.same_hour.sigma);
            let hour_score = (z_hour / 3.0).min(1.0);
            if hour_score > SIGNAL_THRESHOLD && h.same_hour_ratio > RATIO_GATE {
                signals.push(Signal::BehavioralAnomaly {
                    severity: Severity::Minor,
                    score: round2(hour_score),
                    reason: "Large fraction of visits entered in the same hour".to_string(),
                });
            }
            collected.push(hour_score);

            let z_weekend = z_score(h.weekend_ratio, base.weekend.mu, base.weekend.sigma);
            let weekend_score = (z_weekend / 3.0).min(1.0);
            if weekend_score > SIGNAL_THRESHOLD && h.weekend_ratio > RATIO_GATE {
                signals.push(Signal::BehavioralAnomaly {
                    severity: Severity::Minor,
                    score: round2(weekend_score),
                    reason: "Unusually high proportion of weekend data entry".to_string(),
                });
            }
            collected.push(weekend_score);

            let z_day = z_score(h.same_day_visit_ratio, base.same_day.mu, base.same_day.sigma);
            let day_score = (z_day / 3.0).min(1.0);
            if day_score > SIGNAL_THRESHOLD && h.same_day_visit_ratio > RATIO_GATE {
                signals.push(Signal::BehavioralAnomaly {
                    severity: Severity::Minor,
                    score: round2(day_score),
                    reason: "Large proportion of visits occurred on the same clinical day"
                        .to_string(),
                });
            }
            collected.push(day_score);
        }

        let score = if collected.is_empty() {
            0.0
        } else {
            round2(stats::mean(&collected))
        };
        results.insert(hospital_id.clone(), DetectorResult { score, signals });
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn quiet_features() -> BehavioralFeatures {
        BehavioralFeatures {
            min_visit_gap_days: Some(14.0),
            short_gap_ratio: 0.0,
            hard_gap_violations: 0,
            median_delay_days: 1.0,
            p90_delay_days: 2.0,
            submission_burstiness: 10.0,
            same_hour_ratio: 0.2,
            weekend_ratio: 0.1,
            same_day_visit_ratio: 0.2,
            visit_count: 20,
        }
    }

    fn map_of(entries: Vec<(&str, BehavioralFeatures)>) -> BehavioralFeatureMap {
        entries
            .into_iter()
            .map(|(id, f)| (id.to_string(), f))
            .collect()
    }

    #[test]
    fn phase_rules_pick_the_right_minimum_gap() {
        assert_eq!(VisitGapRules::for_phase(TrialPhase::Phase2).min_gap_days, 3.0);
        assert_eq!(VisitGapRules::for_phase(TrialPhase::Phase3).min_gap_days, 7.0);
        assert_eq!(VisitGapRules::for_phase(TrialPhase::Phase2).hard_gap_days, 1.0);
        assert_eq!(VisitGapRules::for_phase(TrialPhase::Phase3).hard_gap_days, 1.0);
    }

    #[test]
    fn hard_gap_violation_overrides_everything() {
        // Extreme benign values everywhere else must not matter.
        let mut violator = quiet_features();
        violator.hard_gap_violations = 1;
        violator.short_gap_ratio = 0.01;
        let features = map_of(vec![("hosp-1", violator), ("hosp-2", quiet_features())]);
        let baseline = build_behavioral_baseline(&features);

        let results =
            detect_behavioral_anomalies(&features, Some(&baseline), TrialPhase::Phase3);
        let result = &results["hosp-1"];
        assert_eq!(result.score, 1.0);
        assert_eq!(result.signals.len(), 1);
        match &result.signals[0] {
            Signal::BehavioralAnomaly { severity, score, reason } => {
                assert_eq!(*severity, Severity::Critical);
                assert_eq!(*score, 1.0);
                assert!(reason.contains("PHASE 3"), "{}", reason);
            }
            other => panic!("unexpected signal {:?}", other),
        }
    }

    #[test]
    fn short_gap_ratio_emits_a_major_signal_and_feeds_the_aggregate() {
        let mut violator = quiet_features();
        violator.short_gap_ratio = 0.5;
        let features = map_of(vec![("hosp-1", violator)]);

        // No baseline: only the MAJOR score is aggregated.
        let results = detect_behavioral_anomalies(&features, None, TrialPhase::Phase3);
        let result = &results["hosp-1"];
        assert_eq!(result.score, 0.75);
        assert_eq!(result.signals.len(), 1);
        match &result.signals[0] {
            Signal::BehavioralAnomaly { severity, score, reason } => {
                assert_eq!(*severity, Severity::Major);
                assert_eq!(*score, 0.75);
                assert!(reason.contains("50%"), "{}", reason);
                assert!(reason.contains("7 days"), "{}", reason);
            }
            other => panic!("unexpected signal {:?}", other),
        }
    }

    #[test]
    fn major_score_saturates_at_one() {
        let mut violator = quiet_features();
        violator.short_gap_ratio = 0.9;
        let features = map_of(vec![("hosp-1", violator)]);
        let results = detect_behavioral_anomalies(&features, None, TrialPhase::Phase3);
        assert_eq!(results["hosp-1"].signals[0].score(), 1.0);
    }

    #[test]
    fn ratio_gate_suppresses_signals_on_naturally_low_ratios() {
        // hosp-1's weekend ratio deviates strongly from the peers but stays
        // under the 0.4 raw gate: heuristic score counts, no signal.
        let mut deviant = quiet_features();
        deviant.weekend_ratio = 0.35;
        let mut peers = Vec::new();
        for i in 2..=6 {
            peers.push((format!("hosp-{}", i), quiet_features()));
        }
        let mut features: BehavioralFeatureMap = peers
            .into_iter()
            .collect::<BTreeMap<String, BehavioralFeatures>>();
        features.insert("hosp-1".to_string(), deviant);

        let baseline = build_behavioral_baseline(&features);
        let results =
            detect_behavioral_anomalies(&features, Some(&baseline), TrialPhase::Phase3);
        let result = &results["hosp-1"];
        assert!(result.signals.is_empty());
        // The aggregate still moved: five heuristic scores were collected.
        assert!(result.score > 0.0);
    }

    #[test]
    fn identical_hospitals_score_zero_with_baseline() {
        let features = map_of(vec![
            ("hosp-1", quiet_features()),
            ("hosp-2", quiet_features()),
        ]);
        let baseline = build_behavioral_baseline(&features);
        let results =
            detect_behavioral_anomalies(&features, Some(&baseline), TrialPhase::Phase3);
        assert_eq!(results["hosp-1"].score, 0.0);
        assert!(results["hosp-1"].signals.is_empty());
    }

    #[test]
    fn no_baseline_and_no_violations_scores_zero() {
        let features = map_of(vec![("hosp-1", quiet_features())]);
        let results = detect_behavioral_anomalies(&features, None, TrialPhase::Phase3);
        assert_eq!(results["hosp-1"].score, 0.0);
        assert!(results["hosp-1"].signals.is_empty());
    }
}
