//! Engine configuration.
//!
//! All thresholds live in one flat [`TerritoryConfig`]. Services copy the
//! config at construction, so changing the resolution (or any policy) means
//! building a new engine rather than mutating a shared one.

use crate::error::{Result, TerritoryError};
use crate::hex_grid::MAX_RESOLUTION;

/// How a region's display boundary is derived from its cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BoundaryMode {
    /// Axis-aligned bounding box of every cell vertex (4 corners).
    #[default]
    BoundingBox,
    /// Convex hull of every cell vertex.
    ConvexHull,
}

/// Configuration for trace processing, run validation and claiming.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TerritoryConfig {
    /// Douglas-Peucker tolerance in meters.
    /// Default: 10.0
    pub simplification_tolerance_m: f64,

    /// Fixes with a reported horizontal accuracy above this are dropped.
    /// Default: 50.0 meters
    pub max_accuracy_m: f64,

    /// Implied speed ceiling between consecutive fixes.
    /// Default: 12.0 m/s
    pub max_speed_mps: f64,

    /// Jumps longer than this need a time gap consistent with `max_speed_mps`.
    /// Default: 200.0 meters
    pub max_teleport_m: f64,

    /// Minimum total run distance.
    /// Default: 100.0 meters
    pub min_distance_m: f64,

    /// Minimum run duration.
    /// Default: 30.0 seconds
    pub min_duration_s: f64,

    /// Minimum number of fixes after filtering.
    /// Default: 10
    pub min_points: u32,

    /// Allowance applied to `max_speed_mps` when validating a filtered trace.
    /// Default: 1.5
    pub speed_margin: f64,

    /// Hex grid resolution used for claims.
    /// Default: 9 (~0.1052 km² per cell)
    pub resolution: u8,

    /// Whether a run must end near its start to be valid.
    /// Default: false (open paths are valid claims)
    pub require_loop_closure: bool,

    /// Maximum start/end distance for a run to count as a closed loop.
    /// Default: 50.0 meters
    pub loop_closure_threshold_m: f64,

    /// Boundary derivation for grouped regions.
    /// Default: [`BoundaryMode::BoundingBox`]
    pub boundary_mode: BoundaryMode,

    /// Also claim every cell the path itself passes through.
    /// Default: false
    pub claim_path_corridor: bool,
}

impl Default for TerritoryConfig {
    fn default() -> Self {
        Self {
            simplification_tolerance_m: 10.0,
            max_accuracy_m: 50.0,
            max_speed_mps: 12.0,
            max_teleport_m: 200.0,
            min_distance_m: 100.0,
            min_duration_s: 30.0,
            min_points: 10,
            speed_margin: 1.5,
            resolution: 9,
            require_loop_closure: false,
            loop_closure_threshold_m: 50.0,
            boundary_mode: BoundaryMode::BoundingBox,
            claim_path_corridor: false,
        }
    }
}

impl TerritoryConfig {
    /// Check every threshold is usable.
    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("simplification_tolerance_m", self.simplification_tolerance_m),
            ("max_accuracy_m", self.max_accuracy_m),
            ("max_teleport_m", self.max_teleport_m),
            ("min_distance_m", self.min_distance_m),
            ("min_duration_s", self.min_duration_s),
            ("loop_closure_threshold_m", self.loop_closure_threshold_m),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(TerritoryError::InvalidConfig(format!(
                    "{} must be a finite, non-negative number (got {})",
                    name, value
                )));
            }
        }

        if !self.max_speed_mps.is_finite() || self.max_speed_mps <= 0.0 {
            return Err(TerritoryError::InvalidConfig(format!(
                "max_speed_mps must be positive (got {})",
                self.max_speed_mps
            )));
        }

        if !self.speed_margin.is_finite() || self.speed_margin < 1.0 {
            return Err(TerritoryError::InvalidConfig(format!(
                "speed_margin must be at least 1.0 (got {})",
                self.speed_margin
            )));
        }

        if self.resolution > MAX_RESOLUTION {
            return Err(TerritoryError::InvalidConfig(format!(
                "resolution must be at most {} (got {})",
                MAX_RESOLUTION, self.resolution
            )));
        }

        Ok(())
    }

    /// Load a config from JSON. Missing fields keep their defaults.
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| TerritoryError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Speed above which a filtered trace is treated as anomalous.
    pub fn verification_speed_limit(&self) -> f64 {
        self.max_speed_mps * self.speed_margin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(TerritoryConfig::default().validate().is_ok());
    }

    #[test]
    fn test_defaults_match_documented_values() {
        let config = TerritoryConfig::default();
        assert_eq!(config.simplification_tolerance_m, 10.0);
        assert_eq!(config.max_accuracy_m, 50.0);
        assert_eq!(config.max_speed_mps, 12.0);
        assert_eq!(config.max_teleport_m, 200.0);
        assert_eq!(config.min_points, 10);
        assert_eq!(config.resolution, 9);
        assert!(!config.require_loop_closure);
        assert_eq!(config.verification_speed_limit(), 18.0);
    }

    #[test]
    fn test_rejects_bad_values() {
        let config = TerritoryConfig { max_accuracy_m: -1.0, ..Default::default() };
        assert!(matches!(config.validate(), Err(TerritoryError::InvalidConfig(_))));

        let config = TerritoryConfig { speed_margin: 0.5, ..Default::default() };
        assert!(config.validate().is_err());

        let config = TerritoryConfig { resolution: MAX_RESOLUTION + 1, ..Default::default() };
        assert!(config.validate().is_err());

        let config = TerritoryConfig { max_speed_mps: f64::NAN, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_from_json_partial() {
        let config = TerritoryConfig::from_json(
            r#"{"require_loop_closure": true, "resolution": 10, "boundary_mode": "convex_hull"}"#,
        )
        .unwrap();
        assert!(config.require_loop_closure);
        assert_eq!(config.resolution, 10);
        assert_eq!(config.boundary_mode, BoundaryMode::ConvexHull);
        assert_eq!(config.min_points, 10);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_from_json_rejects_invalid() {
        assert!(TerritoryConfig::from_json(r#"{"max_speed_mps": 0}"#).is_err());
        assert!(TerritoryConfig::from_json("not json").is_err());
    }
}
