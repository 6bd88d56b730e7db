//! Small statistics helpers shared by the engines.
//!
//! All helpers are total: empty input or a zero denominator yields `0.0`
//! (or `None` where "no answer" must be distinguishable).

/// Arithmetic mean, 0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let avg = mean(values);
    values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64
}

/// Population standard deviation
pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Absolute z-score of every value, or `None` when the series is flat
pub fn abs_z_scores(values: &[f64]) -> Option<Vec<f64>> {
    let sd = std_dev(values);
    if sd == 0.0 || !sd.is_finite() {
        return None;
    }
    let avg = mean(values);
    Some(values.iter().map(|v| (v - avg).abs() / sd).collect())
}

/// Standard deviation relative to the mean
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    let avg = mean(values);
    if avg == 0.0 {
        return 0.0;
    }
    std_dev(values) / avg
}

/// Ordinary least-squares slope of `y` over `x`
///
/// `None` with fewer than two points or when every `x` is identical.
pub fn ols_slope(points: &[(f64, f64)]) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let sum_x: f64 = points.iter().map(|(x, _)| x).sum();
    let sum_y: f64 = points.iter().map(|(_, y)| y).sum();
    let sum_xy: f64 = points.iter().map(|(x, y)| x * y).sum();
    let sum_xx: f64 = points.iter().map(|(x, _)| x * x).sum();

    let denominator = n * sum_xx - sum_x * sum_x;
    if denominator.abs() < f64::EPSILON {
        return None;
    }
    Some((n * sum_xy - sum_x * sum_y) / denominator)
}

/// Milliseconds to hours
pub fn ms_to_hours(ms: u64) -> f64 {
    ms as f64 / 3_600_000.0
}
