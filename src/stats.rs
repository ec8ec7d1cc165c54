//! Statistical utility functions shared across modules
//!
//! Contains tie-aware ranking, Pearson correlation and the rounding rule used
//! when turning proportions into cell counts.

use std::cmp::Ordering;

/// Ranks (1-based) of `values`, tied values share the average of their ranks.
///
/// NaN values sort after every finite value.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| total_order(values[a], values[b]));

    let mut ranks = vec![0.0; n];
    let mut start = 0;
    while start < n {
        let mut end = start + 1;
        while end < n && total_order(values[order[start]], values[order[end]]) == Ordering::Equal {
            end += 1;
        }
        // positions start..end (0-based) hold ranks start+1..=end
        let avg = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = avg;
        }
        start = end;
    }
    ranks
}

fn total_order(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Arithmetic mean, zero for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Pearson correlation coefficient.
///
/// Returns NaN when either input has zero variance or the lengths differ.
pub fn pearson_correlation(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.len() < 2 {
        return f64::NAN;
    }
    let mx = mean(x);
    let my = mean(y);

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (&xi, &yi) in x.iter().zip(y.iter()) {
        let dx = xi - mx;
        let dy = yi - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx <= 0.0 || syy <= 0.0 {
        return f64::NAN;
    }
    (sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0)
}

/// Round to the nearest integer, halves to the even neighbour
pub fn round_half_even(x: f64) -> f64 {
    x.round_ties_even()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_ranks_no_ties() {
        assert_eq!(average_ranks(&[3.0, 1.0, 2.0]), vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn test_average_ranks_ties() {
        // sorted: 0, 0, 0, 5, 7, 7
        let ranks = average_ranks(&[0.0, 7.0, 0.0, 5.0, 7.0, 0.0]);
        assert_eq!(ranks, vec![2.0, 5.5, 2.0, 4.0, 5.5, 2.0]);
    }

    #[test]
    fn test_average_ranks_sum() {
        let values = [1.0, 1.0, 2.0, 3.0, 3.0, 3.0, 9.0];
        let n = values.len() as f64;
        let total: f64 = average_ranks(&values).iter().sum();
        assert!((total - n * (n + 1.0) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_perfect() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [2.0, 4.0, 6.0, 8.0];
        assert!((pearson_correlation(&x, &y) - 1.0).abs() < 1e-12);

        let z = [8.0, 6.0, 4.0, 2.0];
        assert!((pearson_correlation(&x, &z) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_constant_is_nan() {
        assert!(pearson_correlation(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_nan());
    }

    #[test]
    fn test_round_half_even() {
        assert_eq!(round_half_even(0.5), 0.0);
        assert_eq!(round_half_even(1.5), 2.0);
        assert_eq!(round_half_even(2.5), 2.0);
        assert_eq!(round_half_even(2.6), 3.0);
    }
}
