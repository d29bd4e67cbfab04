//! Shared numeric helpers used by the feature extractors and detectors.

use std::collections::BTreeMap;

/// Arithmetic mean; 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation; 0.0 for an empty slice.
pub fn std_pop(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Percentile with linear interpolation between closest ranks.
/// `q` is in [0, 100]; 0.0 for an empty slice.
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let pos = q / 100.0 * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let frac = pos - lower as f64;

    if lower + 1 < sorted.len() {
        sorted[lower] + frac * (sorted[lower + 1] - sorted[lower])
    } else {
        sorted[lower]
    }
}

pub fn median(values: &[f64]) -> f64 {
    percentile(values, 50.0)
}

/// Interquartile range (p75 - p25).
pub fn iqr(values: &[f64]) -> f64 {
    percentile(values, 75.0) - percentile(values, 25.0)
}

/// Shannon entropy (natural log) of an equal-width histogram of `values`.
/// Zero-count bins are dropped before the entropy calculation. Degenerate
/// distributions (fewer than two distinct values) have zero entropy.
pub fn histogram_entropy(values: &[f64], bins: usize) -> f64 {
    if values.is_empty() || bins == 0 {
        return 0.0;
    }
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max <= min {
        return 0.0;
    }

    let width = (max - min) / bins as f64;
    let mut counts = vec![0usize; bins];
    for &v in values {
        let idx = (((v - min) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }

    let total: usize = counts.iter().filter(|&&c| c > 0).sum();
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total as f64;
            -p * p.ln()
        })
        .sum()
}

/// Share of the single most frequent key. Ties break toward the smallest key
/// so repeated runs over the same data give identical results.
pub fn mode_share<K: Ord>(keys: impl IntoIterator<Item = K>) -> f64 {
    let mut counts: BTreeMap<K, usize> = BTreeMap::new();
    let mut total = 0usize;
    for k in keys {
        *counts.entry(k).or_insert(0) += 1;
        total += 1;
    }
    if total == 0 {
        return 0.0;
    }
    // Ascending key order plus strict `>` keeps the smallest key on ties.
    let mut best = 0usize;
    for &c in counts.values() {
        if c > best {
            best = c;
        }
    }
    best as f64 / total as f64
}

/// Absolute z-score against a baseline mu/sigma.
pub fn z_score(value: f64, mu: f64, sigma: f64) -> f64 {
    (value - mu).abs() / sigma
}

/// Round to two decimal places, the precision used at every persisted
/// score boundary.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
