//! Usage pattern classification
//!
//! Classifies a window of usage samples as a spike, steady, declining or
//! cyclical pattern. Rules are evaluated in a fixed order and the first
//! match wins, so a high-variance spike always outranks trend or cyclical
//! signals.

use crate::models::{PatternType, UsagePattern, UsageSample};
use crate::stats::{max, mean, normalized_variance, trend_ratio};

/// Minimum samples required for classification
pub const MIN_SAMPLES_FOR_ANALYSIS: usize = 5;

/// Confidence reported when there is not enough history
pub const INSUFFICIENT_DATA_CONFIDENCE: f64 = 0.1;

/// Classifies usage history into a `UsagePattern`
#[derive(Debug, Clone)]
pub struct PatternAnalyzer {
    /// Normalized variance above which the series is a spike
    pub variance_threshold: f64,
    /// Last/first ratio above which growth counts as a spike
    pub growth_threshold: f64,
    /// Last/first ratio below which both cpu and memory are declining
    pub decline_threshold: f64,
    /// Maximum normalized half-to-half difference for a cyclical series
    pub cyclical_tolerance: f64,
}

impl Default for PatternAnalyzer {
    fn default() -> Self {
        Self {
            variance_threshold: 0.5,
            growth_threshold: 1.2,
            decline_threshold: 0.8,
            cyclical_tolerance: 0.2,
        }
    }
}

impl PatternAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify samples, oldest first
    pub fn analyze(&self, samples: &[UsageSample]) -> UsagePattern {
        let duration = samples.len();
        if duration < MIN_SAMPLES_FOR_ANALYSIS {
            return UsagePattern {
                pattern_type: PatternType::Steady,
                confidence: INSUFFICIENT_DATA_CONFIDENCE,
                duration,
                intensity: 0.0,
            };
        }

        let cpu: Vec<f64> = samples.iter().map(|s| s.cpu_usage).collect();
        let memory: Vec<f64> = samples.iter().map(|s| s.memory_usage).collect();

        let variance = normalized_variance(&cpu);
        let cpu_trend = trend_ratio(&cpu);
        let memory_trend = trend_ratio(&memory);

        if variance > self.variance_threshold {
            let cpu_mean = mean(&cpu);
            return UsagePattern {
                pattern_type: PatternType::Spike,
                confidence: variance.min(0.9),
                duration,
                intensity: if cpu_mean > f64::EPSILON {
                    max(&cpu) / cpu_mean
                } else {
                    0.0
                },
            };
        }

        if cpu_trend > self.growth_threshold || memory_trend > self.growth_threshold {
            return UsagePattern {
                pattern_type: PatternType::Spike,
                confidence: 0.7,
                duration,
                intensity: cpu_trend.max(memory_trend),
            };
        }

        if cpu_trend < self.decline_threshold && memory_trend < self.decline_threshold {
            return UsagePattern {
                pattern_type: PatternType::Declining,
                confidence: 0.8,
                duration,
                intensity: 1.0 - cpu_trend.min(memory_trend),
            };
        }

        if self.is_cyclical(&cpu) {
            return UsagePattern {
                pattern_type: PatternType::Cyclical,
                confidence: 0.6,
                duration,
                intensity: variance,
            };
        }

        UsagePattern {
            pattern_type: PatternType::Steady,
            confidence: 0.8,
            duration,
            intensity: variance,
        }
    }

    /// Compare the two halves of the series point by point
    fn is_cyclical(&self, cpu: &[f64]) -> bool {
        let half = cpu.len() / 2;
        let cpu_mean = mean(cpu);
        if half == 0 || cpu_mean <= f64::EPSILON {
            return false;
        }
        let (first, second) = (&cpu[..half], &cpu[half..half * 2]);
        let avg_diff = first
            .iter()
            .zip(second)
            .map(|(a, b)| (a - b).abs())
            .sum::<f64>()
            / half as f64;
        avg_diff / cpu_mean < self.cyclical_tolerance
    }
}
