//! Scaling analysis
//!
//! This module provides:
//! - Usage pattern classification (spike, steady, declining, cyclical)
//! - Pattern and limit driven scaling decisions
//! - Short-horizon predictive scaling

mod decision;
mod pattern;

pub use decision::{estimate_impact, ScalingEngine, MIN_SAMPLES_FOR_PREDICTION};
pub use pattern::{PatternAnalyzer, INSUFFICIENT_DATA_CONFIDENCE, MIN_SAMPLES_FOR_ANALYSIS};
