//! Accuracy and stability statistics for an automatic track against a
//! manually annotated reference.
//!
//! Deviations at frames that were missing before alignment compare
//! interpolated positions, not observations, so long gaps bias the figures
//! toward agreement.

use std::fmt;

use crate::align::{align_sequences, AlignedPair};
use crate::path::PathSequence;

/// Errors raised by the evaluation stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    /// The aligned pair produced no comparable distances.
    #[error("no valid points to compare")]
    NoValidSamples,
}

/// Evaluation parameters.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// A frame fails when its deviation is strictly greater than this (pixels).
    pub failure_threshold_px: f64,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            failure_threshold_px: 10.0,
        }
    }
}

/// Summary statistics over per-frame deviations.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct TrackingMetrics {
    /// Mean Euclidean distance between manual and automatic points.
    pub average_deviation: f64,
    /// Population standard deviation of the distances.
    pub std_deviation: f64,
    pub max_deviation: f64,
    /// Percentage (0-100) of frames whose deviation exceeds the threshold.
    pub failure_rate: f64,
    /// Mean frame-to-frame displacement of the automatic track; NaN with
    /// fewer than two points.
    pub average_stability: f64,
    /// Number of compared frames.
    pub samples: usize,
}

impl fmt::Display for TrackingMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Average Deviation: {:.2}", self.average_deviation)?;
        writeln!(f, "Standard Deviation: {:.2}", self.std_deviation)?;
        writeln!(f, "Maximum Deviation: {:.2}", self.max_deviation)?;
        writeln!(f, "Failure Rate: {:.2}%", self.failure_rate)?;
        write!(f, "Average Stability: {:.2}", self.average_stability)
    }
}

/// Compute deviation and stability statistics over an aligned pair.
pub fn compute_metrics(
    pair: &AlignedPair,
    failure_threshold_px: f64,
) -> Result<TrackingMetrics, EvalError> {
    let distances: Vec<f64> = pair.pairs().map(|(m, a)| m.distance(a)).collect();
    if distances.is_empty() {
        return Err(EvalError::NoValidSamples);
    }

    let n = distances.len() as f64;
    let mean = distances.iter().sum::<f64>() / n;
    let variance = distances.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
    let max = distances.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let failures = distances
        .iter()
        .filter(|&&d| d > failure_threshold_px)
        .count();

    Ok(TrackingMetrics {
        average_deviation: mean,
        std_deviation: variance.sqrt(),
        max_deviation: max,
        failure_rate: failures as f64 / n * 100.0,
        average_stability: average_stability(pair.auto()),
        samples: distances.len(),
    })
}

/// Mean displacement between consecutive points; NaN for fewer than two.
pub fn average_stability(points: &[crate::geometry::Point]) -> f64 {
    if points.len() < 2 {
        return f64::NAN;
    }
    let total: f64 = points.windows(2).map(|w| w[0].distance(w[1])).sum();
    total / (points.len() - 1) as f64
}

/// Align `manual` against `auto` and compute metrics in one step.
pub fn evaluate(
    manual: &PathSequence,
    auto: &PathSequence,
    config: &EvalConfig,
) -> Result<TrackingMetrics, EvalError> {
    let pair = align_sequences(manual.entries(), auto.entries())?;
    let metrics = compute_metrics(&pair, config.failure_threshold_px)?;
    tracing::info!(
        "Evaluated {} frames: mean deviation {:.2}px, failure rate {:.2}%",
        metrics.samples,
        metrics.average_deviation,
        metrics.failure_rate
    );
    Ok(metrics)
}
