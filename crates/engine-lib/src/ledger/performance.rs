//! Derived performance metrics
//!
//! Turns a window of usage samples into the per-module `PerformanceMetrics`
//! consumed by the scaling decision engine.

use crate::models::{PerformanceMetrics, ResourceLimits, UsageSample};
use crate::stats::mean;
use chrono::{DateTime, Utc};

/// Number of most recent samples the metrics are computed over
pub const METRICS_WINDOW: usize = 100;

/// Samples per half when comparing recent and older CPU averages
const SCALING_SCORE_WINDOW: usize = 10;

const SCALING_SCORE_MIN: f64 = 0.5;
const SCALING_SCORE_MAX: f64 = 2.0;

/// Compute metrics for a module from its recent samples (oldest first)
pub fn compute(
    module_id: &str,
    samples: &[UsageSample],
    limits: &ResourceLimits,
    now: DateTime<Utc>,
) -> PerformanceMetrics {
    let response_times: Vec<f64> = samples.iter().map(|s| s.response_time).collect();
    let cpu: Vec<f64> = samples.iter().map(|s| s.cpu_usage).collect();
    let memory: Vec<f64> = samples.iter().map(|s| s.memory_usage).collect();

    PerformanceMetrics {
        module_id: module_id.to_string(),
        average_response_time: mean(&response_times),
        throughput: throughput(samples),
        error_rate: error_rate(samples),
        resource_efficiency: resource_efficiency(&memory, &cpu, limits),
        scaling_score: scaling_score(&cpu),
        last_updated: now,
    }
}

/// Samples per second across the observed time span
fn throughput(samples: &[UsageSample]) -> f64 {
    let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
        return 0.0;
    };
    let span_ms = (last.timestamp - first.timestamp).num_milliseconds();
    if span_ms <= 0 {
        return 0.0;
    }
    samples.len() as f64 / (span_ms as f64 / 1000.0)
}

/// Failed requests over observed requests, clamped to 0.0-1.0
///
/// Errors reported with no observed requests count as a full failure rate.
pub fn error_rate(samples: &[UsageSample]) -> f64 {
    let requests: u64 = samples.iter().map(|s| s.active_requests as u64).sum();
    let errors: u64 = samples.iter().map(|s| s.error_count as u64).sum();
    if requests == 0 {
        return if errors > 0 { 1.0 } else { 0.0 };
    }
    (errors as f64 / requests as f64).clamp(0.0, 1.0)
}

/// Mean of memory and cpu utilization against the module limits
fn resource_efficiency(memory: &[f64], cpu: &[f64], limits: &ResourceLimits) -> f64 {
    if memory.is_empty() {
        return 0.0;
    }
    let memory_ratio = if limits.memory > 0.0 {
        mean(memory) / limits.memory
    } else {
        0.0
    };
    let cpu_ratio = if limits.cpu > 0.0 {
        mean(cpu) / (limits.cpu * 100.0)
    } else {
        0.0
    };
    ((memory_ratio + cpu_ratio) / 2.0).clamp(0.0, 1.0)
}

/// Ratio of recent to older CPU averages, neutral until two full windows exist
fn scaling_score(cpu: &[f64]) -> f64 {
    let window = SCALING_SCORE_WINDOW;
    if cpu.len() < 2 * window {
        return 1.0;
    }
    let recent = &cpu[cpu.len() - window..];
    let older = &cpu[cpu.len() - 2 * window..cpu.len() - window];
    let older_mean = mean(older);
    if older_mean <= f64::EPSILON {
        return 1.0;
    }
    (mean(recent) / older_mean).clamp(SCALING_SCORE_MIN, SCALING_SCORE_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn samples(cpu: &[f64]) -> Vec<UsageSample> {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        cpu.iter()
            .enumerate()
            .map(|(i, c)| UsageSample {
                module_id: "m".to_string(),
                tenant_id: "t".to_string(),
                timestamp: start + Duration::seconds(i as i64),
                memory_usage: 256.0,
                cpu_usage: *c,
                storage_usage: 10.0,
                network_usage: 1.0,
                active_requests: 10,
                response_time: 100.0 + i as f64,
                error_count: 1,
            })
            .collect()
    }

    #[test]
    fn test_basic_metrics() {
        let data = samples(&[50.0; 11]);
        let metrics = compute("m", &data, &ResourceLimits::default(), Utc::now());
        assert!((metrics.average_response_time - 105.0).abs() < 1e-9);
        // 11 samples over 10 seconds
        assert!((metrics.throughput - 1.1).abs() < 1e-9);
        assert!((metrics.error_rate - 0.1).abs() < 1e-9);
        // memory 256/512 = 0.5, cpu 50/100 = 0.5
        assert!((metrics.resource_efficiency - 0.5).abs() < 1e-9);
        assert!((metrics.scaling_score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_scaling_score_clamped() {
        let mut cpu = vec![10.0; 10];
        cpu.extend(vec![90.0; 10]);
        let metrics = compute("m", &samples(&cpu), &ResourceLimits::default(), Utc::now());
        assert_eq!(metrics.scaling_score, 2.0);

        let mut cpu = vec![90.0; 10];
        cpu.extend(vec![10.0; 10]);
        let metrics = compute("m", &samples(&cpu), &ResourceLimits::default(), Utc::now());
        assert_eq!(metrics.scaling_score, 0.5);
    }

    #[test]
    fn test_scaling_score_neutral_below_two_windows() {
        let metrics = compute("m", &samples(&[5.0, 5.0, 10.0, 10.0]), &ResourceLimits::default(), Utc::now());
        assert_eq!(metrics.scaling_score, 1.0);

        let mut cpu = vec![10.0; 9];
        cpu.extend(vec![90.0; 10]);
        let metrics = compute("m", &samples(&cpu), &ResourceLimits::default(), Utc::now());
        assert_eq!(metrics.scaling_score, 1.0);
    }

    #[test]
    fn test_error_rate_without_requests() {
        let mut window = samples(&[10.0, 10.0]);
        for s in &mut window {
            s.active_requests = 0;
        }
        assert_eq!(error_rate(&window), 1.0);
        for s in &mut window {
            s.error_count = 0;
        }
        assert_eq!(error_rate(&window), 0.0);
    }

    #[test]
    fn test_single_sample() {
        let metrics = compute("m", &samples(&[40.0]), &ResourceLimits::default(), Utc::now());
        assert_eq!(metrics.throughput, 0.0);
        assert_eq!(metrics.scaling_score, 1.0);
    }

    #[test]
    fn test_empty_window() {
        let metrics = compute("m", &[], &ResourceLimits::default(), Utc::now());
        assert_eq!(metrics.average_response_time, 0.0);
        assert_eq!(metrics.error_rate, 0.0);
        assert_eq!(metrics.resource_efficiency, 0.0);
    }
}
