//! ## Column Statistics
//!
//! Pure functions over materialized column values used by the stateful transformers.
//! Inputs are `Option<f64>` slices as produced by [`crate::table::numeric_columns`]; `None` and
//! `NaN` are treated as missing everywhere. Functions return `None` when a statistic is undefined
//! (no observations, zero variance, ...) instead of producing `NaN`.

use std::cmp::Ordering;
use std::collections::HashMap;

/// Returns the observed (non-null, non-NaN) values of a column.
pub fn observed(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().flatten().copied().filter(|v| !v.is_nan()).collect()
}

/// Returns the paired observations of two equally long columns, skipping rows where either is missing.
pub fn paired(x: &[Option<f64>], y: &[Option<f64>]) -> (Vec<f64>, Vec<f64>) {
    x.iter()
        .zip(y.iter())
        .filter_map(|(a, b)| match (a, b) {
            (Some(a), Some(b)) if !a.is_nan() && !b.is_nan() => Some((*a, *b)),
            _ => None,
        })
        .unzip()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Variance with `ddof` delta degrees of freedom (0 for population, 1 for sample).
pub fn variance(values: &[f64], ddof: usize) -> Option<f64> {
    if values.len() <= ddof {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some(ss / (values.len() - ddof) as f64)
}

/// Most frequent value; ties resolve to the smallest value.
pub fn most_frequent(values: &[f64]) -> Option<f64> {
    let mut counts: HashMap<u64, (f64, usize)> = HashMap::new();
    for v in values {
        // -0.0 and 0.0 count as the same category.
        let key = if *v == 0.0 { 0.0_f64.to_bits() } else { v.to_bits() };
        counts.entry(key).or_insert((*v, 0)).1 += 1;
    }
    counts
        .into_values()
        .max_by(|(va, ca), (vb, cb)| ca.cmp(cb).then_with(|| vb.total_cmp(va)))
        .map(|(v, _)| v)
}

/// Most frequent string; ties resolve to the lexicographically smallest value.
pub fn most_frequent_str(values: &[Option<String>]) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for v in values.iter().flatten() {
        *counts.entry(v.as_str()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|(va, ca), (vb, cb)| ca.cmp(cb).then_with(|| vb.cmp(va)))
        .map(|(v, _)| v.to_string())
}

/// Pearson correlation coefficient. `None` when either input has zero variance.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let mean_x = mean(x)?;
    let mean_y = mean(y)?;
    let cov: f64 = x
        .iter()
        .zip(y.iter())
        .map(|(a, b)| (a - mean_x) * (b - mean_y))
        .sum();
    let var_x: f64 = x.iter().map(|a| (a - mean_x).powi(2)).sum();
    let var_y: f64 = y.iter().map(|b| (b - mean_y).powi(2)).sum();
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    let corr = cov / (var_x.sqrt() * var_y.sqrt());
    corr.is_finite().then_some(corr)
}

/// Digamma function ψ(x) for x > 0.
pub fn digamma(mut x: f64) -> f64 {
    let mut result = 0.0;
    while x < 10.0 {
        result -= 1.0 / x;
        x += 1.0;
    }
    let inv = 1.0 / x;
    let inv2 = inv * inv;
    result + x.ln() - 0.5 * inv
        - inv2 * (1.0 / 12.0 - inv2 * (1.0 / 120.0 - inv2 * (1.0 / 252.0 - inv2 * (1.0 / 240.0))))
}

/// Divides by the population standard deviation without centering; constant inputs are left as is.
fn scale_unit_variance(values: &[f64]) -> Vec<f64> {
    match variance(values, 0).map(f64::sqrt) {
        Some(std) if std > 0.0 && std.is_finite() => values.iter().map(|v| v / std).collect(),
        _ => values.to_vec(),
    }
}

/// Mutual information between two continuous variables using the Kraskov (KSG) estimator.
///
/// Distances use the Chebyshev metric in the joint space. `k` is clamped to `n - 1`;
/// `None` is returned when fewer than two paired observations exist. The estimate is clipped at 0.
pub fn mutual_info_knn(x: &[f64], y: &[f64], k: usize) -> Option<f64> {
    let n = x.len();
    if n != y.len() || n < 2 {
        return None;
    }
    let k = k.min(n - 1);
    if k == 0 {
        return None;
    }
    let x = scale_unit_variance(x);
    let y = scale_unit_variance(y);

    let mut joint = Vec::with_capacity(n - 1);
    let mut digamma_sum = 0.0;
    for i in 0..n {
        joint.clear();
        joint.extend(
            (0..n)
                .filter(|&j| j != i)
                .map(|j| (x[i] - x[j]).abs().max((y[i] - y[j]).abs())),
        );
        let (_, kth, _) = joint.select_nth_unstable_by(k - 1, |a, b| {
            a.partial_cmp(b).unwrap_or(Ordering::Equal)
        });
        let radius = *kth;
        let within = |d: f64| if radius > 0.0 { d < radius } else { d == 0.0 };
        let nx = (0..n)
            .filter(|&j| j != i && within((x[i] - x[j]).abs()))
            .count();
        let ny = (0..n)
            .filter(|&j| j != i && within((y[i] - y[j]).abs()))
            .count();
        digamma_sum += digamma(nx as f64 + 1.0) + digamma(ny as f64 + 1.0);
    }
    let mi = digamma(n as f64) + digamma(k as f64) - digamma_sum / n as f64;
    Some(mi.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_observed_skips_null_and_nan() {
        let values = vec![Some(1.0), None, Some(f64::NAN), Some(3.0)];
        assert_eq!(observed(&values), vec![1.0, 3.0]);
    }

    #[test]
    fn test_paired_drops_incomplete_rows() {
        let x = vec![Some(1.0), None, Some(3.0), Some(4.0)];
        let y = vec![Some(10.0), Some(20.0), None, Some(40.0)];
        assert_eq!(paired(&x, &y), (vec![1.0, 4.0], vec![10.0, 40.0]));
    }

    #[test]
    fn test_mean_and_median() {
        assert_eq!(mean(&[]), None);
        assert_abs_diff_eq!(mean(&[1.0, 2.0, 4.0]).unwrap(), 7.0 / 3.0, epsilon = 1e-12);
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
    }

    #[test]
    fn test_variance_ddof() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_abs_diff_eq!(variance(&values, 0).unwrap(), 1.25, epsilon = 1e-12);
        assert_abs_diff_eq!(variance(&values, 1).unwrap(), 5.0 / 3.0, epsilon = 1e-12);
        assert_eq!(variance(&[5.0], 1), None);
    }

    #[test]
    fn test_most_frequent_prefers_smallest_on_ties() {
        assert_eq!(most_frequent(&[3.0, 1.0, 3.0, 1.0, 2.0]), Some(1.0));
        assert_eq!(most_frequent(&[2.0, 2.0, 1.0]), Some(2.0));
        assert_eq!(most_frequent(&[]), None);

        let strings = vec![
            Some("y".to_string()),
            None,
            Some("x".to_string()),
            Some("y".to_string()),
            Some("x".to_string()),
        ];
        assert_eq!(most_frequent_str(&strings), Some("x".to_string()));
    }

    #[test]
    fn test_pearson() {
        let x = [1.0, 2.0, 3.0, 4.0];
        assert_abs_diff_eq!(pearson(&x, &[2.0, 4.0, 6.0, 8.0]).unwrap(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(pearson(&x, &[8.0, 6.0, 4.0, 2.0]).unwrap(), -1.0, epsilon = 1e-12);
        assert_eq!(pearson(&x, &[5.0, 5.0, 5.0, 5.0]), None);
    }

    #[test]
    fn test_digamma_known_values() {
        // ψ(1) = -γ, ψ(2) = 1 - γ, ψ(0.5) = -γ - 2 ln 2
        let euler_gamma = 0.577_215_664_901_532_9;
        assert_abs_diff_eq!(digamma(1.0), -euler_gamma, epsilon = 1e-10);
        assert_abs_diff_eq!(digamma(2.0), 1.0 - euler_gamma, epsilon = 1e-10);
        assert_abs_diff_eq!(
            digamma(0.5),
            -euler_gamma - 2.0 * 2.0_f64.ln(),
            epsilon = 1e-10
        );
        assert_abs_diff_eq!(digamma(100.0), 4.600_161_852_738_087, epsilon = 1e-10);
    }

    #[test]
    fn test_mutual_info_dependent_beats_independent() {
        let x: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let dependent: Vec<f64> = x.iter().map(|v| 3.0 * v + 1.0).collect();
        // A fixed permutation with no monotone relation to x.
        let independent: Vec<f64> = (0..40).map(|i| ((i * 17) % 40) as f64).collect();

        let mi_dep = mutual_info_knn(&x, &dependent, 3).unwrap();
        let mi_ind = mutual_info_knn(&x, &independent, 3).unwrap();
        assert!(mi_dep > 1.0, "expected strong dependence, got {}", mi_dep);
        assert!(mi_dep > mi_ind);
        assert!(mi_ind >= 0.0);
    }

    #[test]
    fn test_mutual_info_degenerate_inputs() {
        assert_eq!(mutual_info_knn(&[1.0], &[2.0], 3), None);
        assert_eq!(mutual_info_knn(&[1.0, 2.0], &[2.0], 3), None);
        // k larger than n - 1 is clamped rather than rejected.
        assert!(mutual_info_knn(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0], 10).is_some());
    }
}
