//! Run validation.
//!
//! Applies the configured policy to a filtered trace and returns a tagged
//! verdict. Checks run in a fixed order (distance, duration, point count,
//! speed, loop closure) and the first failure wins, so a short run is always
//! reported as too short regardless of anything else wrong with it.

use std::fmt;

use log::info;

use crate::geo_utils::{haversine_distance, implied_speed, polyline_length};
use crate::{GeoPoint, TerritoryConfig};

/// Why a run was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum InvalidReason {
    TooShortDistance,
    TooShortDuration,
    TooFewPoints,
    SpeedAnomaly,
    NotALoop,
}

impl InvalidReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TooShortDistance => "too-short-distance",
            Self::TooShortDuration => "too-short-duration",
            Self::TooFewPoints => "too-few-points",
            Self::SpeedAnomaly => "speed-anomaly",
            Self::NotALoop => "not-a-loop",
        }
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ValidationResult {
    Valid,
    Invalid(InvalidReason),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    pub fn reason(&self) -> Option<InvalidReason> {
        match self {
            Self::Valid => None,
            Self::Invalid(reason) => Some(*reason),
        }
    }
}

/// Measurements the policy is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunMetrics {
    /// Sum of great-circle segment lengths
    pub distance_m: f64,
    /// First to last timestamped fix, 0 without timestamps
    pub duration_s: f64,
    pub point_count: usize,
    /// Fastest consecutive-fix speed, 0 without timestamps
    pub max_speed_mps: f64,
    /// Start-to-end distance, `None` for an empty trace
    pub closure_distance_m: Option<f64>,
}

/// Stateless accept/reject policy.
#[derive(Debug, Clone)]
pub struct RunValidator {
    config: TerritoryConfig,
}

impl RunValidator {
    pub fn new(config: &TerritoryConfig) -> Self {
        Self { config: *config }
    }

    /// Measure a trace.
    pub fn measure(&self, trace: &[GeoPoint]) -> RunMetrics {
        let mut timestamps = trace.iter().filter_map(|p| p.timestamp);
        let first_ts = timestamps.next();
        let last_ts = timestamps.last().or(first_ts);
        let duration_s = match (first_ts, last_ts) {
            (Some(start), Some(end)) => (end - start).max(0.0),
            _ => 0.0,
        };

        let max_speed_mps = trace
            .windows(2)
            .filter_map(|w| implied_speed(&w[0], &w[1]))
            .fold(0.0, f64::max);

        let closure_distance_m = match (trace.first(), trace.last()) {
            (Some(start), Some(end)) => Some(haversine_distance(start, end)),
            _ => None,
        };

        RunMetrics {
            distance_m: polyline_length(trace),
            duration_s,
            point_count: trace.len(),
            max_speed_mps,
            closure_distance_m,
        }
    }

    /// Validate a filtered trace.
    pub fn validate(&self, trace: &[GeoPoint]) -> ValidationResult {
        self.check(&self.measure(trace))
    }

    /// Apply the policy to precomputed metrics.
    pub fn check(&self, metrics: &RunMetrics) -> ValidationResult {
        let verdict = self.first_failure(metrics).map_or(ValidationResult::Valid, ValidationResult::Invalid);

        if let ValidationResult::Invalid(reason) = verdict {
            info!(
                "Run rejected ({}): {:.0}m, {:.0}s, {} points, peak {:.1}m/s",
                reason,
                metrics.distance_m,
                metrics.duration_s,
                metrics.point_count,
                metrics.max_speed_mps
            );
        }

        verdict
    }

    fn first_failure(&self, metrics: &RunMetrics) -> Option<InvalidReason> {
        let config = &self.config;

        if metrics.distance_m < config.min_distance_m {
            return Some(InvalidReason::TooShortDistance);
        }
        if metrics.duration_s < config.min_duration_s {
            return Some(InvalidReason::TooShortDuration);
        }
        if metrics.point_count < config.min_points as usize {
            return Some(InvalidReason::TooFewPoints);
        }
        if metrics.max_speed_mps > config.verification_speed_limit() {
            return Some(InvalidReason::SpeedAnomaly);
        }
        if config.require_loop_closure {
            let closed = metrics
                .closure_distance_m
                .is_some_and(|d| d <= config.loop_closure_threshold_m);
            if !closed {
                return Some(InvalidReason::NotALoop);
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `count` fixes `spacing_m` apart heading east, evenly over `duration_s`.
    fn line_trace(count: usize, spacing_m: f64, duration_s: f64) -> Vec<GeoPoint> {
        let step_s = duration_s / (count.max(2) - 1) as f64;
        (0..count)
            .map(|i| {
                GeoPoint::new(40.0, -3.7 + i as f64 * spacing_m / 85_180.0)
                    .with_timestamp(i as f64 * step_s)
                    .with_accuracy(8.0)
            })
            .collect()
    }

    fn validator() -> RunValidator {
        RunValidator::new(&TerritoryConfig::default())
    }

    #[test]
    fn test_measure() {
        let trace = line_trace(11, 20.0, 100.0);
        let m = validator().measure(&trace);
        assert!((m.distance_m - 200.0).abs() < 2.0);
        assert_eq!(m.duration_s, 100.0);
        assert_eq!(m.point_count, 11);
        assert!((m.max_speed_mps - 2.0).abs() < 0.05);
        assert!((m.closure_distance_m.unwrap() - 200.0).abs() < 2.0);
    }

    #[test]
    fn test_measure_empty() {
        let m = validator().measure(&[]);
        assert_eq!(m.distance_m, 0.0);
        assert_eq!(m.duration_s, 0.0);
        assert_eq!(m.point_count, 0);
        assert!(m.closure_distance_m.is_none());
    }

    #[test]
    fn test_open_path_valid_by_default() {
        assert_eq!(validator().validate(&line_trace(11, 20.0, 100.0)), ValidationResult::Valid);
    }

    #[test]
    fn test_reasons_in_order() {
        let v = validator();
        assert_eq!(
            v.validate(&line_trace(3, 10.0, 5.0)),
            ValidationResult::Invalid(InvalidReason::TooShortDistance)
        );
        assert_eq!(
            v.validate(&line_trace(11, 20.0, 20.0)).reason(),
            Some(InvalidReason::TooShortDuration)
        );
        assert_eq!(
            v.validate(&line_trace(6, 40.0, 60.0)).reason(),
            Some(InvalidReason::TooFewPoints)
        );
    }

    #[test]
    fn test_speed_margin() {
        let v = validator();
        let mut trace = line_trace(12, 20.0, 110.0);
        // One 15 m/s segment sits inside the 1.5x allowance
        trace[6].timestamp = Some(trace[5].timestamp.unwrap() + 20.0 / 15.0);
        assert!(v.validate(&trace).is_valid());

        // 40 m/s does not
        trace[6].timestamp = Some(trace[5].timestamp.unwrap() + 0.5);
        assert_eq!(v.validate(&trace).reason(), Some(InvalidReason::SpeedAnomaly));
    }

    #[test]
    fn test_loop_closure_toggle() {
        let strict = RunValidator::new(&TerritoryConfig {
            require_loop_closure: true,
            ..Default::default()
        });
        assert_eq!(
            strict.validate(&line_trace(11, 20.0, 100.0)).reason(),
            Some(InvalidReason::NotALoop)
        );

        let mut out_and_back = line_trace(11, 20.0, 100.0);
        let back: Vec<GeoPoint> = out_and_back
            .iter()
            .rev()
            .skip(1)
            .enumerate()
            .map(|(i, p)| p.with_timestamp(100.0 + (i + 1) as f64 * 10.0))
            .collect();
        out_and_back.extend(back);
        assert!(strict.validate(&out_and_back).is_valid());
    }

    #[test]
    fn test_reason_strings() {
        assert_eq!(InvalidReason::TooShortDistance.to_string(), "too-short-distance");
        assert_eq!(InvalidReason::NotALoop.as_str(), "not-a-loop");
        assert!(ValidationResult::Valid.reason().is_none());
    }
}
