//! Percentile threshold over label values.
//!
//! De-noising drops every label whose *value* falls below a percentile
//! (default 5th) of the non-zero values present. A heuristic over ids, not
//! region sizes.

/// Linear-interpolated percentile of a sorted-or-not sample, matching the
/// numpy default method. `p` is in [0, 100].
pub fn percentile(values: &[f64], p: f64) -> f64 {
    assert!(!values.is_empty(), "percentile of an empty sample");

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let weight = rank - lower as f64;
    sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}

/// Labels at or above the p-th percentile of the given non-zero values
pub fn surviving_labels(labels: &[u16], p: f64) -> Vec<u16> {
    if labels.is_empty() {
        return Vec::new();
    }
    let values: Vec<f64> = labels.iter().map(|&v| f64::from(v)).collect();
    let cutoff = percentile(&values, p);
    labels
        .iter()
        .copied()
        .filter(|&v| f64::from(v) >= cutoff)
        .collect()
}
