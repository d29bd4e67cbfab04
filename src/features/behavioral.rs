//! Per-hospital visit-timing and submission-behavior signatures.

use std::collections::{BTreeMap, HashSet};

use chrono::{Datelike, Timelike};

use crate::stats;
use crate::store::VisitRow;

/// A hospital needs at least two distinct visits to be scored at all.
pub const MIN_HOSPITAL_VISITS: usize = 2;

const SECONDS_PER_DAY: f64 = 24.0 * 3600.0;
const SECONDS_PER_HOUR: f64 = 3600.0;

/// Timing signature of one hospital, computed over visit-level rows
/// (duplicate visit-id rows collapsed to one row per visit).
#[derive(Debug, Clone, PartialEq)]
pub struct BehavioralFeatures {
    /// Smallest inter-visit gap observed for any patient, in days.
    pub min_visit_gap_days: Option<f64>,
    /// Fraction of consecutive-visit pairs shorter than the configured
    /// protocol minimum.
    pub short_gap_ratio: f64,
    /// Count of consecutive-visit pairs under the hard gap (sub-24-hour).
    pub hard_gap_violations: usize,
    pub median_delay_days: f64,
    pub p90_delay_days: f64,
    /// Std of inter-arrival hours between consecutive submissions.
    pub submission_burstiness: f64,
    /// Share of submissions in the single most common hour-of-day.
    pub same_hour_ratio: f64,
    /// Share of submissions falling on Saturday or Sunday.
    pub weekend_ratio: f64,
    /// Share of visits sharing the single most common visit date.
    pub same_day_visit_ratio: f64,
    pub visit_count: usize,
}

/// hospital id -> features
pub type BehavioralFeatureMap = BTreeMap<String, BehavioralFeatures>;

/// Extracts behavioral features per hospital. `min_gap_days` and
/// `hard_gap_days` come from the trial phase's visit-gap rules so extraction
/// and detection cannot disagree on the protocol minimum.
pub fn extract_behavioral_features(
    rows: &[VisitRow],
    min_gap_days: f64,
    hard_gap_days: f64,
) -> BehavioralFeatureMap {
    // Collapse to one row per visit, keeping the first row seen.
    let mut by_hospital: BTreeMap<&str, Vec<&VisitRow>> = BTreeMap::new();
    let mut seen_visits: HashSet<&str> = HashSet::new();
    for row in rows {
        if seen_visits.insert(row.visit_id.as_str()) {
            by_hospital.entry(row.hospital_id.as_str()).or_default().push(row);
        }
    }

    let mut features = BehavioralFeatureMap::new();

    for (hospital_id, visits) in by_hospital {
        if visits.len() < MIN_HOSPITAL_VISITS {
            continue;
        }

        // Inter-visit gaps per patient.
        let mut by_patient: BTreeMap<&str, Vec<&VisitRow>> = BTreeMap::new();
        for visit in &visits {
            by_patient.entry(visit.patient_id.as_str()).or_default().push(visit);
        }

        let mut hard_violations = 0usize;
        let mut short_violations = 0usize;
        let mut total_pairs = 0usize;
        let mut min_gap: Option<f64> = None;

        for patient_visits in by_patient.values_mut() {
            if patient_visits.len() < 2 {
                continue;
            }
            patient_visits.sort_by_key(|v| v.visit_date);

            for pair in patient_visits.windows(2) {
                let gap = (pair[1].visit_date - pair[0].visit_date).num_seconds() as f64
                    / SECONDS_PER_DAY;
                total_pairs += 1;
                min_gap = Some(min_gap.map_or(gap, |m: f64| m.min(gap)));
                if gap < hard_gap_days {
                    hard_violations += 1;
                }
                if gap < min_gap_days {
                    short_violations += 1;
                }
            }
        }

        let short_gap_ratio = if total_pairs > 0 {
            short_violations as f64 / total_pairs as f64
        } else {
            0.0
        };

        // Entry delays; negative delays come from bad clocks and are dropped.
        let delays: Vec<f64> = visits
            .iter()
            .map(|v| (v.created_at - v.visit_date).num_seconds() as f64 / SECONDS_PER_DAY)
            .filter(|d| *d >= 0.0)
            .collect();
        let median_delay = stats::median(&delays);
        let p90_delay = stats::percentile(&delays, 90.0);

        // Submission burstiness over sorted creation timestamps.
        let mut created: Vec<_> = visits.iter().map(|v| v.created_at).collect();
        created.sort();
        let inter_arrival_hours: Vec<f64> = created
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).num_seconds() as f64 / SECONDS_PER_HOUR)
            .collect();
        let burstiness = stats::std_pop(&inter_arrival_hours);

        let same_hour_ratio = stats::mode_share(created.iter().map(|c| c.hour()));
        let weekend = created
            .iter()
            .filter(|c| c.weekday().number_from_monday() >= 6)
            .count();
        let weekend_ratio = weekend as f64 / created.len() as f64;

        let same_day_visit_ratio =
            stats::mode_share(visits.iter().map(|v| v.visit_date.date()));

        features.insert(
            hospital_id.to_string(),
            BehavioralFeatures {
                min_visit_gap_days: min_gap,
                short_gap_ratio,
                hard_gap_violations: hard_violations,
                median_delay_days: median_delay,
                p90_delay_days: p90_delay,
                submission_burstiness: burstiness,
                same_hour_ratio,
                weekend_ratio,
                same_day_visit_ratio,
                visit_count: visits.len(),
            },
        );
    }

    features
}
