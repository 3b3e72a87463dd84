//! Numeric helpers shared by the ledger, analyzer and monitor

/// Arithmetic mean, 0.0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance (mean squared deviation)
pub fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

/// Mean squared deviation divided by the mean
///
/// Returns 0.0 when the mean is not positive.
pub fn normalized_variance(values: &[f64]) -> f64 {
    let m = mean(values);
    if m <= f64::EPSILON {
        return 0.0;
    }
    population_variance(values) / m
}

/// Last value over first value
///
/// A zero or negative first value yields a neutral 1.0.
pub fn trend_ratio(values: &[f64]) -> f64 {
    match (values.first(), values.last()) {
        (Some(first), Some(last)) if *first > f64::EPSILON => last / first,
        _ => 1.0,
    }
}

/// Maximum value, 0.0 for an empty slice
pub fn max(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_variance() {
        let values = vec![10.0, 30.0, 50.0, 70.0, 90.0];
        assert!((mean(&values) - 50.0).abs() < 1e-9);
        assert!((population_variance(&values) - 800.0).abs() < 1e-9);
        assert!((normalized_variance(&values) - 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_trend_ratio() {
        assert!((trend_ratio(&[10.0, 20.0, 40.0]) - 4.0).abs() < 1e-9);
        assert_eq!(trend_ratio(&[0.0, 5.0]), 1.0);
        assert_eq!(trend_ratio(&[]), 1.0);
    }

    #[test]
    fn test_empty_values() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(population_variance(&[]), 0.0);
        assert_eq!(normalized_variance(&[]), 0.0);
        assert_eq!(max(&[]), 0.0);
    }

    #[test]
    fn test_max() {
        assert_eq!(max(&[3.0, 9.0, 1.0]), 9.0);
    }
}
