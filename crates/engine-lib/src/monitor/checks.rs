//! Weighted health check battery
//!
//! Turns one set of telemetry readings into five weighted checks, a
//! composite score and a status, plus the recovery actions the failing
//! checks call for. Evaluation is a pure function of the readings so the
//! same inputs always yield the same verdict.

use crate::models::{
    CheckStatus, HealthCheck, HealthState, Priority, RecoveryAction, RecoveryType,
};
use serde::{Deserialize, Serialize};

pub const RESPONSE_TIME_CHECK: &str = "response_time";
pub const CPU_CHECK: &str = "cpu_usage";
pub const ERROR_RATE_CHECK: &str = "error_rate";
pub const AVAILABILITY_CHECK: &str = "availability";
pub const MEMORY_CHECK: &str = "memory_stability";

/// A failing check at or above this weight forces `failed`
pub const CRITICAL_FAIL_WEIGHT: f64 = 0.2;

/// Raw telemetry for one module instance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthReadings {
    pub latency_ms: f64,
    /// Percent of one core
    pub cpu_percent: f64,
    /// Fraction of failed requests, 0.0-1.0
    pub error_rate: f64,
    /// Percent uptime, 0-100
    pub uptime_percent: f64,
    /// Ratio of current memory to the start of the observation window
    pub memory_growth: f64,
}

/// Check thresholds and weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthThresholds {
    pub response_time_ms: f64,
    pub cpu_percent: f64,
    pub error_rate: f64,
    pub uptime_percent: f64,
    pub memory_growth: f64,
    pub response_time_weight: f64,
    pub cpu_weight: f64,
    pub error_rate_weight: f64,
    pub availability_weight: f64,
    pub memory_weight: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            response_time_ms: 1000.0,
            cpu_percent: 80.0,
            error_rate: 0.05,
            uptime_percent: 99.0,
            memory_growth: 1.5,
            response_time_weight: 0.30,
            cpu_weight: 0.25,
            error_rate_weight: 0.25,
            availability_weight: 0.20,
            memory_weight: 0.15,
        }
    }
}

/// Result of evaluating one set of readings
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub status: HealthState,
    pub score: f64,
    pub checks: Vec<HealthCheck>,
    pub recovery_actions: Vec<RecoveryAction>,
}

/// Runs the check battery
#[derive(Debug, Clone, Default)]
pub struct HealthEvaluator {
    pub thresholds: HealthThresholds,
}

impl HealthEvaluator {
    pub fn new(thresholds: HealthThresholds) -> Self {
        Self { thresholds }
    }

    pub fn evaluate(&self, readings: &HealthReadings) -> Evaluation {
        let checks = self.run_checks(readings);
        let score = composite_score(&checks);
        let status = classify(score, &checks);
        let recovery_actions = recovery_actions(&checks, status);
        Evaluation {
            status,
            score,
            checks,
            recovery_actions,
        }
    }

    /// The five fixed checks, in order
    pub fn run_checks(&self, readings: &HealthReadings) -> Vec<HealthCheck> {
        let t = &self.thresholds;
        vec![
            upper_bound_check(
                RESPONSE_TIME_CHECK,
                readings.latency_ms,
                t.response_time_ms,
                0.7,
                t.response_time_weight,
                |v, th| format!("Response time {:.0}ms (threshold {:.0}ms)", v, th),
            ),
            upper_bound_check(
                CPU_CHECK,
                readings.cpu_percent,
                t.cpu_percent,
                0.8,
                t.cpu_weight,
                |v, th| format!("CPU usage {:.1}% (threshold {:.0}%)", v, th),
            ),
            upper_bound_check(
                ERROR_RATE_CHECK,
                readings.error_rate,
                t.error_rate,
                0.6,
                t.error_rate_weight,
                |v, th| format!("Error rate {:.2}% (threshold {:.2}%)", v * 100.0, th * 100.0),
            ),
            availability_check(readings.uptime_percent, t.uptime_percent, t.availability_weight),
            upper_bound_check(
                MEMORY_CHECK,
                readings.memory_growth,
                t.memory_growth,
                0.8,
                t.memory_weight,
                |v, th| format!("Memory growth {:.2}x (threshold {:.2}x)", v, th),
            ),
        ]
    }
}

/// Fail above `threshold`, warn above `threshold * warn_ratio`
fn upper_bound_check(
    name: &str,
    value: f64,
    threshold: f64,
    warn_ratio: f64,
    weight: f64,
    describe: impl Fn(f64, f64) -> String,
) -> HealthCheck {
    let status = if value > threshold {
        CheckStatus::Fail
    } else if value > threshold * warn_ratio {
        CheckStatus::Warn
    } else {
        CheckStatus::Pass
    };
    HealthCheck {
        name: name.to_string(),
        status,
        message: describe(value, threshold),
        value,
        threshold,
        weight,
    }
}

/// Fail below the threshold, warn below `threshold * 1.01`
fn availability_check(uptime: f64, threshold: f64, weight: f64) -> HealthCheck {
    let status = if uptime < threshold {
        CheckStatus::Fail
    } else if uptime < threshold * 1.01 {
        CheckStatus::Warn
    } else {
        CheckStatus::Pass
    };
    HealthCheck {
        name: AVAILABILITY_CHECK.to_string(),
        status,
        message: format!("Uptime {:.2}% (threshold {:.2}%)", uptime, threshold),
        value: uptime,
        threshold,
        weight,
    }
}

/// Weighted average of check points normalized by total weight, 0-100
pub fn composite_score(checks: &[HealthCheck]) -> f64 {
    let total_weight: f64 = checks.iter().map(|c| c.weight).sum();
    if total_weight <= 0.0 {
        return 100.0;
    }
    let weighted: f64 = checks.iter().map(|c| c.status.points() * c.weight).sum();
    (weighted / total_weight).clamp(0.0, 100.0)
}

/// Status from the score bands and the heavy-failure rule
pub fn classify(score: f64, checks: &[HealthCheck]) -> HealthState {
    let heavy_failure = checks
        .iter()
        .any(|c| c.status == CheckStatus::Fail && c.weight >= CRITICAL_FAIL_WEIGHT);

    if score < 30.0 || heavy_failure {
        HealthState::Failed
    } else if score < 60.0 {
        HealthState::Critical
    } else if score < 80.0 {
        HealthState::Warning
    } else {
        HealthState::Healthy
    }
}

/// Recovery actions for the failing checks, in check order
pub fn recovery_actions(checks: &[HealthCheck], status: HealthState) -> Vec<RecoveryAction> {
    let mut actions: Vec<RecoveryAction> = checks
        .iter()
        .filter(|c| c.status == CheckStatus::Fail)
        .filter_map(|c| match c.name.as_str() {
            RESPONSE_TIME_CHECK => Some(action(
                RecoveryType::Scale,
                "Scale up to reduce response time",
                Priority::High,
                true,
                5,
            )),
            CPU_CHECK => Some(action(
                RecoveryType::Scale,
                "Scale up CPU resources",
                Priority::High,
                true,
                3,
            )),
            ERROR_RATE_CHECK => Some(action(
                RecoveryType::Restart,
                "Restart module to clear elevated error rate",
                Priority::Medium,
                false,
                2,
            )),
            AVAILABILITY_CHECK => Some(action(
                RecoveryType::Migrate,
                "Migrate module to a healthier host",
                Priority::High,
                false,
                10,
            )),
            MEMORY_CHECK => Some(action(
                RecoveryType::Restart,
                "Restart module to reclaim leaked memory",
                Priority::Medium,
                true,
                3,
            )),
            _ => None,
        })
        .collect();

    if status == HealthState::Failed {
        actions.push(action(
            RecoveryType::NotifyAdmin,
            "Notify administrator of module failure",
            Priority::Critical,
            true,
            1,
        ));
    }
    actions
}

fn action(
    action_type: RecoveryType,
    description: &str,
    priority: Priority,
    automated: bool,
    estimated_duration: u32,
) -> RecoveryAction {
    RecoveryAction {
        action_type,
        description: description.to_string(),
        priority,
        automated,
        estimated_duration,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn healthy_readings() -> HealthReadings {
        HealthReadings {
            latency_ms: 150.0,
            cpu_percent: 40.0,
            error_rate: 0.01,
            uptime_percent: 99.995,
            memory_growth: 1.05,
        }
    }

    fn status_of(checks: &[HealthCheck], name: &str) -> CheckStatus {
        checks.iter().find(|c| c.name == name).unwrap().status
    }

    #[test]
    fn test_all_pass_is_healthy() {
        let eval = HealthEvaluator::default().evaluate(&healthy_readings());
        assert_eq!(eval.checks.len(), 5);
        assert!((eval.score - 100.0).abs() < 1e-9);
        assert_eq!(eval.status, HealthState::Healthy);
        assert!(eval.recovery_actions.is_empty());
    }

    #[test]
    fn test_weights_sum_to_one_fifteen() {
        let checks = HealthEvaluator::default().run_checks(&healthy_readings());
        let total: f64 = checks.iter().map(|c| c.weight).sum();
        assert!((total - 1.15).abs() < 1e-9);
    }

    #[test]
    fn test_threshold_bands() {
        let evaluator = HealthEvaluator::default();
        let mut r = healthy_readings();

        r.latency_ms = 701.0;
        r.cpu_percent = 65.0;
        r.error_rate = 0.031;
        r.uptime_percent = 99.5;
        r.memory_growth = 1.25;
        let checks = evaluator.run_checks(&r);
        for check in &checks {
            assert_eq!(check.status, CheckStatus::Warn, "{} should warn", check.name);
        }

        r.latency_ms = 1001.0;
        r.cpu_percent = 81.0;
        r.error_rate = 0.051;
        r.uptime_percent = 98.9;
        r.memory_growth = 1.51;
        let checks = evaluator.run_checks(&r);
        for check in &checks {
            assert_eq!(check.status, CheckStatus::Fail, "{} should fail", check.name);
        }
    }

    #[test]
    fn test_boundaries_are_exclusive() {
        let evaluator = HealthEvaluator::default();
        let mut r = healthy_readings();
        r.latency_ms = 1000.0;
        r.cpu_percent = 64.0;
        let checks = evaluator.run_checks(&r);
        assert_eq!(status_of(&checks, RESPONSE_TIME_CHECK), CheckStatus::Warn);
        assert_eq!(status_of(&checks, CPU_CHECK), CheckStatus::Pass);
    }

    #[test]
    fn test_slow_response_score() {
        let mut r = healthy_readings();
        r.latency_ms = 1500.0;
        let eval = HealthEvaluator::default().evaluate(&r);

        // (20 * 0.3 + 100 * 0.85) / 1.15
        let expected = (20.0 * 0.3 + 100.0 * 0.85) / 1.15;
        assert!((eval.score - expected).abs() < 1e-9);
        assert!((eval.score - 79.13).abs() < 0.01);
        // A failing 0.3-weight check forces the failed status
        assert_eq!(eval.status, HealthState::Failed);
        let types: Vec<RecoveryType> = eval.recovery_actions.iter().map(|a| a.action_type).collect();
        assert_eq!(types, vec![RecoveryType::Scale, RecoveryType::NotifyAdmin]);
    }

    #[test]
    fn test_score_bands_without_heavy_failure() {
        let p = |name: &str, status: CheckStatus, weight: f64| HealthCheck {
            name: name.to_string(),
            status,
            message: String::new(),
            value: 0.0,
            threshold: 0.0,
            weight,
        };

        // Only the memory check (0.15) fails: (100 + 3) / 1.15
        let checks = vec![
            p(RESPONSE_TIME_CHECK, CheckStatus::Pass, 0.3),
            p(CPU_CHECK, CheckStatus::Pass, 0.25),
            p(ERROR_RATE_CHECK, CheckStatus::Pass, 0.25),
            p(AVAILABILITY_CHECK, CheckStatus::Pass, 0.2),
            p(MEMORY_CHECK, CheckStatus::Fail, 0.15),
        ];
        let score = composite_score(&checks);
        assert!((score - 103.0 / 1.15).abs() < 1e-9);
        assert_eq!(classify(score, &checks), HealthState::Healthy);

        // Three warnings, rest passing: (60 * 0.8 + 100 * 0.35) / 1.15 ~ 72.2
        let mut warning = checks.clone();
        warning[4].status = CheckStatus::Pass;
        for check in warning.iter_mut().take(3) {
            check.status = CheckStatus::Warn;
        }
        let score = composite_score(&warning);
        assert!((score - 83.0 / 1.15).abs() < 1e-9);
        assert_eq!(classify(score, &warning), HealthState::Warning);

        let warns: Vec<HealthCheck> = checks
            .iter()
            .map(|c| HealthCheck { status: CheckStatus::Warn, ..c.clone() })
            .collect();

        // All warn and memory failing: (60 + 3) / 1.15 ~ 54.8
        let mut critical = warns.clone();
        critical[4].status = CheckStatus::Fail;
        let score = composite_score(&critical);
        assert!(score < 60.0 && score >= 30.0);
        assert_eq!(classify(score, &critical), HealthState::Critical);
    }

    #[test]
    fn test_score_always_in_range() {
        let evaluator = HealthEvaluator::default();
        let latencies = [0.0, 800.0, 5000.0];
        let cpus = [0.0, 70.0, 100.0];
        let uptimes = [100.0, 99.5, 50.0];
        for latency in latencies {
            for cpu in cpus {
                for uptime in uptimes {
                    let r = HealthReadings {
                        latency_ms: latency,
                        cpu_percent: cpu,
                        error_rate: 0.2,
                        uptime_percent: uptime,
                        memory_growth: 2.0,
                    };
                    let first = evaluator.evaluate(&r);
                    assert!((0.0..=100.0).contains(&first.score));
                    assert_eq!(first, evaluator.evaluate(&r));
                }
            }
        }
    }

    #[test]
    fn test_everything_failing() {
        let r = HealthReadings {
            latency_ms: 5000.0,
            cpu_percent: 95.0,
            error_rate: 0.5,
            uptime_percent: 90.0,
            memory_growth: 3.0,
        };
        let eval = HealthEvaluator::default().evaluate(&r);
        assert!((eval.score - 20.0).abs() < 1e-9);
        assert_eq!(eval.status, HealthState::Failed);

        let types: Vec<(RecoveryType, bool)> = eval
            .recovery_actions
            .iter()
            .map(|a| (a.action_type, a.automated))
            .collect();
        assert_eq!(
            types,
            vec![
                (RecoveryType::Scale, true),
                (RecoveryType::Scale, true),
                (RecoveryType::Restart, false),
                (RecoveryType::Migrate, false),
                (RecoveryType::Restart, true),
                (RecoveryType::NotifyAdmin, true),
            ]
        );
        let notify = eval.recovery_actions.last().unwrap();
        assert_eq!(notify.priority, Priority::Critical);
        assert_eq!(notify.estimated_duration, 1);
    }
}
