//! Peer-centroid distance scoring across hospitals.

use crate::detectors::{DetectorResult, DetectorResultMap, Signal, SIGMA_FLOOR, SIGNAL_THRESHOLD};
use crate::features::cross_hospital::{ScoreVector, ScoreVectorMap};
use crate::stats::{self, round2};

/// Scores each hospital by how far its score vector sits from the peer
/// centroid, z-scored against the spread of all distances. Peer comparison
/// is undefined for fewer than two hospitals: every hospital then scores 0.0
/// with no signals.
pub fn detect_cross_hospital_deviation(vectors: &ScoreVectorMap) -> DetectorResultMap {
    let mut results = DetectorResultMap::new();

    if vectors.len() < 2 {
        for hospital_id in vectors.keys() {
            results.insert(hospital_id.clone(), DetectorResult::default());
        }
        return results;
    }

    let n = vectors.len() as f64;
    let centroid = ScoreVector {
        statistical: vectors.values().map(|v| v.statistical).sum::<f64>() / n,
        behavioral: vectors.values().map(|v| v.behavioral).sum::<f64>() / n,
        cross_patient: vectors.values().map(|v| v.cross_patient).sum::<f64>() / n,
    };

    let distances: Vec<(&String, f64)> = vectors
        .iter()
        .map(|(id, v)| (id, v.euclidean_distance(&centroid)))
        .collect();
    let distance_values: Vec<f64> = distances.iter().map(|(_, d)| *d).collect();
    let mean_distance = stats::mean(&distance_values);
    let std_distance = stats::std_pop(&distance_values) + SIGMA_FLOOR;

    for (hospital_id, distance) in distances {
        let z = (distance - mean_distance).abs() / std_distance;
        let score = round2((z / 3.0).min(1.0));

        let mut signals = Vec::new();
        if score > SIGNAL_THRESHOLD {
            signals.push(Signal::PeerDeviation {
                score,
                reason: "Hospital shows significant overall deviation from peer \
                         hospitals across multiple integrity dimensions"
                    .to_string(),
            });
        }
        results.insert(hospital_id.clone(), DetectorResult { score, signals });
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(s: f64, b: f64, c: f64) -> ScoreVector {
        ScoreVector {
            statistical: s,
            behavioral: b,
            cross_patient: c,
        }
    }

    fn vectors_of(entries: &[(&str, ScoreVector)]) -> ScoreVectorMap {
        entries.iter().map(|(id, v)| (id.to_string(), *v)).collect()
    }

    #[test]
    fn singleton_trial_scores_zero_without_signals() {
        let vectors = vectors_of(&[("hosp-1", vector(0.9, 0.9, 0.9))]);
        let results = detect_cross_hospital_deviation(&vectors);
        assert_eq!(results["hosp-1"].score, 0.0);
        assert!(results["hosp-1"].signals.is_empty());
    }

    #[test]
    fn two_identical_hospitals_both_score_zero() {
        let vectors = vectors_of(&[
            ("hosp-1", vector(0.5, 0.5, 0.5)),
            ("hosp-2", vector(0.5, 0.5, 0.5)),
        ]);
        let results = detect_cross_hospital_deviation(&vectors);
        assert_eq!(results["hosp-1"].score, 0.0);
        assert_eq!(results["hosp-2"].score, 0.0);
        assert!(results["hosp-1"].signals.is_empty());
        assert!(results["hosp-2"].signals.is_empty());
    }

    #[test]
    fn outlier_among_identical_peers_is_flagged() {
        // Five hospitals at the origin, one far out: the outlier's distance
        // z-score is sqrt(5) and crosses the signal threshold.
        let peers: Vec<String> = (1..=5).map(|i| format!("hosp-{}", i)).collect();
        let mut vectors = vectors_of(&[("hosp-6", vector(1.0, 1.0, 1.0))]);
        for id in &peers {
            vectors.insert(id.clone(), vector(0.0, 0.0, 0.0));
        }

        let results = detect_cross_hospital_deviation(&vectors);
        let outlier = &results["hosp-6"];
        assert!(outlier.score > SIGNAL_THRESHOLD);
        assert_eq!(outlier.signals.len(), 1);
        for id in &peers {
            assert!(results[id].score < SIGNAL_THRESHOLD);
            assert!(results[id].signals.is_empty());
        }
    }

    #[test]
    fn scores_stay_in_unit_interval() {
        let vectors = vectors_of(&[
            ("hosp-1", vector(0.0, 0.0, 0.0)),
            ("hosp-2", vector(0.0, 0.0, 0.0)),
            ("hosp-3", vector(0.0, 0.0, 0.0)),
            ("hosp-4", vector(1.0, 1.0, 1.0)),
        ]);
        let results = detect_cross_hospital_deviation(&vectors);
        for result in results.values() {
            assert!(result.score >= 0.0 && result.score <= 1.0);
        }
    }
}
