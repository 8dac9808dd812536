//! Sample standard deviation (n-1), shared by the point-metric ensemble
//! spread and the per-grid-cell divergence field.

/// Sample standard deviation (ddof=1) of `values`. `None` when fewer
/// than two values are given — callers decide what that collapses to
/// (a point metric's spread is `0`, a grid cell's divergence is `NaN` —
/// callers pick whichever fallback fits their own shape).
pub fn sample_stddev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt())
}
