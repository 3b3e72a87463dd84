//! Scaling decisions
//!
//! Combines the usage pattern, a limit-violation check against the
//! module's performance metrics, and a short-horizon CPU forecast into a
//! single `ScalingDecision`. Missing history never fails: it degrades to a
//! low-confidence `maintain`.

use super::pattern::{PatternAnalyzer, MIN_SAMPLES_FOR_ANALYSIS};
use crate::error::Result;
use crate::ledger::UsageLedger;
use crate::models::{
    EstimatedImpact, PatternType, PerformanceMetrics, ScalingAction, ScalingDecision,
    UsagePattern,
};
use crate::stats::trend_ratio;
use std::sync::Arc;
use tracing::debug;

/// Minimum module-wide history required for a forecast
pub const MIN_SAMPLES_FOR_PREDICTION: usize = 20;

/// Samples used to extrapolate the next CPU value
const PREDICTION_TREND_WINDOW: usize = 5;

const RESPONSE_TIME_LIMIT_MS: f64 = 2000.0;
const ERROR_RATE_LIMIT: f64 = 0.05;
const LOW_EFFICIENCY: f64 = 0.3;

const PREDICTED_HIGH_UTILIZATION: f64 = 0.8;
const PREDICTED_LOW_UTILIZATION: f64 = 0.3;

/// Recommendation derived purely from limit violations
#[derive(Debug, Clone, PartialEq)]
struct LimitRecommendation {
    action: ScalingAction,
    factor: f64,
    confidence: f64,
    reason: String,
}

/// Produces scaling decisions from ledger history
pub struct ScalingEngine {
    ledger: Arc<UsageLedger>,
    analyzer: PatternAnalyzer,
}

impl ScalingEngine {
    pub fn new(ledger: Arc<UsageLedger>) -> Self {
        Self {
            ledger,
            analyzer: PatternAnalyzer::default(),
        }
    }

    pub fn with_analyzer(mut self, analyzer: PatternAnalyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Classify the recent usage of a pair, or of the whole module
    pub fn analyze_pattern(&self, module_id: &str, tenant_id: Option<&str>) -> Result<UsagePattern> {
        let mut samples = self.ledger.get_usage(module_id, tenant_id)?;
        if tenant_id.is_none() {
            samples.sort_by_key(|s| s.timestamp);
        }
        Ok(self.analyzer.analyze(&samples))
    }

    /// Decide from the current pattern, falling back to limit violations
    pub fn decide(&self, module_id: &str, tenant_id: Option<&str>) -> Result<ScalingDecision> {
        let pattern = self.analyze_pattern(module_id, tenant_id)?;
        if pattern.duration < MIN_SAMPLES_FOR_ANALYSIS {
            return Ok(build_decision(
                module_id,
                ScalingAction::Maintain,
                1.0,
                pattern.confidence,
                format!(
                    "Insufficient data for a decision: {} samples, need {}",
                    pattern.duration, MIN_SAMPLES_FOR_ANALYSIS
                ),
            ));
        }
        let limit = self
            .ledger
            .performance_metrics(module_id)
            .and_then(|m| limit_recommendation(&m));

        let decision = if pattern.pattern_type == PatternType::Spike && pattern.confidence > 0.6 {
            let factor = (1.0 + pattern.intensity * 0.5).min(2.0);
            build_decision(
                module_id,
                ScalingAction::ScaleUp,
                factor,
                pattern.confidence,
                format!(
                    "Spike pattern detected (intensity {:.2}, confidence {:.2})",
                    pattern.intensity, pattern.confidence
                ),
            )
        } else if pattern.pattern_type == PatternType::Declining && pattern.confidence > 0.7 {
            let factor = (1.0 - pattern.intensity * 0.3).max(0.5);
            build_decision(
                module_id,
                ScalingAction::ScaleDown,
                factor,
                pattern.confidence,
                format!(
                    "Declining usage pattern (intensity {:.2}, confidence {:.2})",
                    pattern.intensity, pattern.confidence
                ),
            )
        } else if let Some(limit) = limit {
            build_decision(module_id, limit.action, limit.factor, limit.confidence, limit.reason)
        } else {
            build_decision(
                module_id,
                ScalingAction::Maintain,
                1.0,
                pattern.confidence,
                format!(
                    "{} usage over {} samples, no limit violations",
                    pattern.pattern_type, pattern.duration
                ),
            )
        };

        debug!(
            module_id = %module_id,
            pattern = %pattern.pattern_type,
            action = %decision.action,
            factor = decision.factor,
            "Scaling decision computed"
        );
        Ok(decision)
    }

    /// Forecast the next CPU value from module-wide history
    pub fn predict(&self, module_id: &str) -> Result<ScalingDecision> {
        let history = self.ledger.history(module_id, None)?;
        if history.len() < MIN_SAMPLES_FOR_PREDICTION {
            return Ok(build_decision(
                module_id,
                ScalingAction::Maintain,
                1.0,
                0.1,
                format!(
                    "Insufficient data for prediction: {} samples, need {}",
                    history.len(),
                    MIN_SAMPLES_FOR_PREDICTION
                ),
            ));
        }

        let recent: Vec<f64> = history[history.len() - PREDICTION_TREND_WINDOW..]
            .iter()
            .map(|s| s.cpu_usage)
            .collect();
        let current = recent.last().copied().unwrap_or(0.0);
        let predicted_cpu = current * trend_ratio(&recent);

        let limits = self.ledger.limits_for(module_id);
        let capacity = limits.cpu * 100.0;
        let utilization = if capacity > 0.0 {
            predicted_cpu / capacity
        } else {
            0.0
        };

        let decision = if utilization > PREDICTED_HIGH_UTILIZATION {
            build_decision(
                module_id,
                ScalingAction::ScaleUp,
                1.3,
                0.75,
                format!("Predicted CPU utilization {:.0}% exceeds 80%", utilization * 100.0),
            )
        } else if utilization < PREDICTED_LOW_UTILIZATION {
            build_decision(
                module_id,
                ScalingAction::ScaleDown,
                0.8,
                0.65,
                format!("Predicted CPU utilization {:.0}% below 30%", utilization * 100.0),
            )
        } else {
            build_decision(
                module_id,
                ScalingAction::Maintain,
                1.0,
                0.8,
                format!("Predicted CPU utilization {:.0}% within range", utilization * 100.0),
            )
        };

        debug!(
            module_id = %module_id,
            predicted_cpu,
            utilization,
            action = %decision.action,
            "Predictive scaling computed"
        );
        Ok(decision)
    }
}

fn limit_recommendation(metrics: &PerformanceMetrics) -> Option<LimitRecommendation> {
    if metrics.average_response_time > RESPONSE_TIME_LIMIT_MS || metrics.error_rate > ERROR_RATE_LIMIT {
        return Some(LimitRecommendation {
            action: ScalingAction::ScaleUp,
            factor: 1.5,
            confidence: 0.7,
            reason: format!(
                "Performance limits exceeded (avg response {:.0}ms, error rate {:.1}%)",
                metrics.average_response_time,
                metrics.error_rate * 100.0
            ),
        });
    }
    if metrics.resource_efficiency < LOW_EFFICIENCY && metrics.scaling_score > 1.0 {
        return Some(LimitRecommendation {
            action: ScalingAction::ScaleDown,
            factor: 0.8,
            confidence: 0.6,
            reason: format!(
                "Low resource efficiency {:.0}% (scaling score {:.2})",
                metrics.resource_efficiency * 100.0,
                metrics.scaling_score
            ),
        });
    }
    None
}

fn build_decision(
    module_id: &str,
    action: ScalingAction,
    factor: f64,
    confidence: f64,
    reasoning: String,
) -> ScalingDecision {
    ScalingDecision {
        module_id: module_id.to_string(),
        action,
        factor,
        confidence: confidence.clamp(0.0, 1.0),
        reasoning,
        estimated_impact: estimate_impact(action, factor),
    }
}

/// Deterministic impact estimate for an action and factor
pub fn estimate_impact(action: ScalingAction, factor: f64) -> EstimatedImpact {
    let impact = match action {
        ScalingAction::ScaleUp => EstimatedImpact {
            performance_improvement: (factor - 1.0) * 0.5,
            cost_change: factor - 1.0,
            resource_utilization: -(factor - 1.0) * 0.3,
        },
        ScalingAction::ScaleDown => EstimatedImpact {
            performance_improvement: (1.0 - factor) * -0.2,
            cost_change: -(1.0 - factor),
            resource_utilization: (1.0 - factor) * 0.4,
        },
        ScalingAction::Maintain => EstimatedImpact::default(),
    };
    EstimatedImpact {
        performance_improvement: impact.performance_improvement.clamp(-1.0, 1.0),
        cost_change: impact.cost_change.clamp(-1.0, 1.0),
        resource_utilization: impact.resource_utilization.clamp(-1.0, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ResourceLimits, UsageSample};
    use chrono::{Duration, TimeZone, Utc};

    fn sample(tenant: &str, i: i64, cpu: f64) -> UsageSample {
        UsageSample {
            module_id: "m".to_string(),
            tenant_id: tenant.to_string(),
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(i * 30),
            memory_usage: 256.0,
            cpu_usage: cpu,
            storage_usage: 10.0,
            network_usage: 1.0,
            active_requests: 10,
            response_time: 150.0,
            error_count: 0,
        }
    }

    fn engine_with(cpu: &[f64]) -> ScalingEngine {
        let ledger = Arc::new(UsageLedger::new());
        for (i, c) in cpu.iter().enumerate() {
            ledger.record_usage(sample("t", i as i64, *c)).unwrap();
        }
        ScalingEngine::new(ledger)
    }

    #[test]
    fn test_rising_cpu_scales_up() {
        let engine = engine_with(&[10.0, 30.0, 50.0, 70.0, 90.0]);
        let pattern = engine.analyze_pattern("m", Some("t")).unwrap();
        assert_eq!(pattern.pattern_type, PatternType::Spike);

        let decision = engine.decide("m", Some("t")).unwrap();
        assert_eq!(decision.action, ScalingAction::ScaleUp);
        // intensity 1.8 -> 1 + 0.9
        assert!((decision.factor - 1.9).abs() < 1e-9);
        assert!(decision.estimated_impact.cost_change > 0.0);
    }

    #[test]
    fn test_declining_pattern_scales_down() {
        let ledger = Arc::new(UsageLedger::new());
        let cpu = [50.0, 48.0, 46.0, 44.0, 38.0];
        let memory = [200.0, 190.0, 180.0, 170.0, 150.0];
        for (i, (c, m)) in cpu.iter().zip(memory).enumerate() {
            let mut s = sample("t", i as i64, *c);
            s.memory_usage = m;
            ledger.record_usage(s).unwrap();
        }
        let decision = ScalingEngine::new(ledger).decide("m", Some("t")).unwrap();
        assert_eq!(decision.action, ScalingAction::ScaleDown);
        // intensity 0.25 -> 1 - 0.075
        assert!((decision.factor - 0.925).abs() < 1e-9);
    }

    #[test]
    fn test_insufficient_data_maintains_with_low_confidence() {
        let engine = engine_with(&[50.0, 50.0]);
        let decision = engine.decide("m", Some("t")).unwrap();
        assert_eq!(decision.action, ScalingAction::Maintain);
        assert!(decision.confidence <= 0.1);
        assert_eq!(decision.estimated_impact, EstimatedImpact::default());
    }

    #[test]
    fn test_short_history_never_follows_limits() {
        let ledger = Arc::new(UsageLedger::new());
        for (i, cpu) in [5.0, 5.0, 10.0, 10.0].iter().enumerate() {
            let mut s = sample("t", i as i64, *cpu);
            s.memory_usage = 50.0;
            ledger.record_usage(s).unwrap();
        }
        let engine = ScalingEngine::new(ledger.clone());
        let decision = engine.decide("m", Some("t")).unwrap();
        assert_eq!(decision.action, ScalingAction::Maintain);
        assert!(decision.confidence <= 0.1);
        assert_eq!(ledger.performance_metrics("m").unwrap().scaling_score, 1.0);

        // Slow responses on a short history are still advisory only
        let mut slow = sample("t", 4, 10.0);
        slow.response_time = 5000.0;
        let ledger = Arc::new(UsageLedger::new());
        ledger.record_usage(slow).unwrap();
        let decision = ScalingEngine::new(ledger).decide("m", Some("t")).unwrap();
        assert_eq!(decision.action, ScalingAction::Maintain);
    }

    #[test]
    fn test_limit_violation_when_pattern_is_quiet() {
        let ledger = Arc::new(UsageLedger::new());
        for i in 0..10 {
            let mut s = sample("t", i, 50.0);
            s.response_time = 2500.0;
            ledger.record_usage(s).unwrap();
        }
        let decision = ScalingEngine::new(ledger).decide("m", Some("t")).unwrap();
        assert_eq!(decision.action, ScalingAction::ScaleUp);
        assert_eq!(decision.factor, 1.5);
        assert!(decision.reasoning.contains("Performance limits exceeded"));
    }

    #[test]
    fn test_error_rate_violation() {
        let ledger = Arc::new(UsageLedger::new());
        for i in 0..10 {
            let mut s = sample("t", i, 50.0);
            s.error_count = 1;
            ledger.record_usage(s).unwrap();
        }
        let decision = ScalingEngine::new(ledger).decide("m", Some("t")).unwrap();
        assert_eq!(decision.action, ScalingAction::ScaleUp);
    }

    #[test]
    fn test_steady_usage_maintains() {
        let engine = engine_with(&[50.0; 10]);
        let decision = engine.decide("m", Some("t")).unwrap();
        assert_eq!(decision.action, ScalingAction::Maintain);
        assert_eq!(decision.factor, 1.0);
    }

    #[test]
    fn test_predict_requires_history() {
        let engine = engine_with(&[50.0; 19]);
        let decision = engine.predict("m").unwrap();
        assert_eq!(decision.action, ScalingAction::Maintain);
        assert_eq!(decision.confidence, 0.1);
    }

    #[test]
    fn test_predict_falling_cpu_scales_down() {
        // 80 down to 20 over 25 samples
        let cpu: Vec<f64> = (0..25).map(|i| 80.0 - i as f64 * 2.5).collect();
        let decision = engine_with(&cpu).predict("m").unwrap();
        assert_eq!(decision.action, ScalingAction::ScaleDown);
        assert_eq!(decision.factor, 0.8);
        assert_eq!(decision.confidence, 0.65);
    }

    #[test]
    fn test_predict_rising_cpu_scales_up() {
        let cpu: Vec<f64> = (0..25).map(|i| 40.0 + i as f64 * 2.5).collect();
        let decision = engine_with(&cpu).predict("m").unwrap();
        assert_eq!(decision.action, ScalingAction::ScaleUp);
        assert_eq!(decision.factor, 1.3);
        assert_eq!(decision.confidence, 0.75);
    }

    #[test]
    fn test_predict_moderate_cpu_maintains() {
        let decision = engine_with(&[50.0; 25]).predict("m").unwrap();
        assert_eq!(decision.action, ScalingAction::Maintain);
        assert_eq!(decision.confidence, 0.8);
    }

    #[test]
    fn test_predict_respects_module_cpu_limit() {
        let ledger = Arc::new(UsageLedger::new());
        ledger
            .set_module_limits(
                "m",
                ResourceLimits {
                    cpu: 4.0,
                    ..ResourceLimits::default()
                },
            )
            .unwrap();
        for i in 0..25 {
            ledger.record_usage(sample("t", i, 90.0)).unwrap();
        }
        // 90% of one core against a four core limit
        let decision = ScalingEngine::new(ledger).predict("m").unwrap();
        assert_eq!(decision.action, ScalingAction::ScaleDown);
    }

    #[test]
    fn test_estimated_impact_formulas() {
        let up = estimate_impact(ScalingAction::ScaleUp, 1.3);
        assert!((up.performance_improvement - 0.15).abs() < 1e-9);
        assert!((up.cost_change - 0.3).abs() < 1e-9);
        assert!((up.resource_utilization + 0.09).abs() < 1e-9);

        let down = estimate_impact(ScalingAction::ScaleDown, 0.8);
        assert!((down.performance_improvement + 0.04).abs() < 1e-9);
        assert!((down.cost_change + 0.2).abs() < 1e-9);
        assert!((down.resource_utilization - 0.08).abs() < 1e-9);

        assert_eq!(estimate_impact(ScalingAction::Maintain, 1.0), EstimatedImpact::default());
    }

    #[test]
    fn test_invalid_module_id() {
        let engine = engine_with(&[]);
        assert!(engine.decide("", None).is_err());
        assert!(engine.predict("").is_err());
    }
}
