//! # Path Processing
//!
//! Turns a raw, noisy GPS trace into a clean shape in three passes:
//!
//! 1. **Hygiene + accuracy**: drop fixes with invalid coordinates, invalid
//!    (negative) accuracy, or accuracy worse than `max_accuracy_m`.
//! 2. **Plausibility**: drop fixes that imply a speed above `max_speed_mps`
//!    relative to the last kept fix. Without usable timestamps, jumps longer
//!    than `max_teleport_m` are dropped instead.
//! 3. **Simplification**: Douglas-Peucker with a tolerance in meters, so
//!    ten-per-second jitter does not rasterize into micro-polygons.
//!
//! Everything here is a pure transform over the input slice.

use geo::{LineString, SimplifyIdx};
use log::{debug, warn};

use crate::geo_utils::{elapsed_seconds, haversine_distance, LocalProjection};
use crate::{GeoPoint, TerritoryConfig};

/// Consecutive agreeing fixes needed to overrule an unconfirmed first fix.
pub const ANCHOR_CONFIRMATION_FIXES: usize = 3;

/// Output of [`PathProcessor::process`].
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProcessedTrace {
    /// Fixes that survived filtering, in original order
    pub filtered: Vec<GeoPoint>,
    /// Douglas-Peucker reduction of `filtered`
    pub simplified: Vec<GeoPoint>,
    /// Dropped for non-finite or out-of-range coordinates
    pub dropped_invalid: usize,
    /// Dropped for poor or invalid horizontal accuracy
    pub dropped_inaccurate: usize,
    /// Dropped as speed or teleport glitches
    pub dropped_implausible: usize,
}

/// Stateless trace cleaner.
#[derive(Debug, Clone)]
pub struct PathProcessor {
    config: TerritoryConfig,
}

impl PathProcessor {
    pub fn new(config: &TerritoryConfig) -> Self {
        Self { config: *config }
    }

    /// Run every pass over a raw trace.
    pub fn process(&self, raw: &[GeoPoint]) -> ProcessedTrace {
        let valid: Vec<GeoPoint> = raw.iter().filter(|p| p.is_valid()).copied().collect();
        let dropped_invalid = raw.len() - valid.len();

        let accurate = self.filter_accuracy(&valid);
        let dropped_inaccurate = valid.len() - accurate.len();

        let filtered = self.filter_implausible(&accurate);
        let dropped_implausible = accurate.len() - filtered.len();

        let simplified = self.simplify(&filtered);

        if filtered.is_empty() && !raw.is_empty() {
            warn!("All {} points of the trace were dropped by filtering", raw.len());
        }

        debug!(
            "Processed trace: {} raw -> {} filtered -> {} simplified (invalid {}, inaccurate {}, implausible {})",
            raw.len(),
            filtered.len(),
            simplified.len(),
            dropped_invalid,
            dropped_inaccurate,
            dropped_implausible
        );

        ProcessedTrace {
            filtered,
            simplified,
            dropped_invalid,
            dropped_inaccurate,
            dropped_implausible,
        }
    }

    /// Drop fixes whose accuracy is worse than the ceiling.
    ///
    /// Fixes without an accuracy reading are kept. Negative readings mean the
    /// device had no valid fix and are dropped.
    pub fn filter_accuracy(&self, points: &[GeoPoint]) -> Vec<GeoPoint> {
        points
            .iter()
            .filter(|p| match p.accuracy_m {
                Some(acc) => acc.is_finite() && acc >= 0.0 && acc <= self.config.max_accuracy_m,
                None => true,
            })
            .copied()
            .collect()
    }

    /// Drop speed and teleport glitches.
    ///
    /// Each fix is compared against the last KEPT fix, so one bad fix does not
    /// also take down the good fix after it.
    ///
    /// The first fix has nothing to be checked against, so it stays
    /// unconfirmed until a later fix agrees with it. If instead
    /// [`ANCHOR_CONFIRMATION_FIXES`] consecutive fixes agree with each other
    /// but not with it, the first fix is the glitch and is replaced by them.
    pub fn filter_implausible(&self, points: &[GeoPoint]) -> Vec<GeoPoint> {
        let mut kept: Vec<GeoPoint> = Vec::with_capacity(points.len());
        // Consecutive fixes rejected by an unconfirmed first fix
        let mut rivals: Vec<GeoPoint> = Vec::new();

        for point in points {
            let plausible = match kept.last() {
                Some(last) => self.is_plausible_step(last, point),
                None => true,
            };
            if plausible {
                kept.push(*point);
                rivals.clear();
                continue;
            }
            if kept.len() > 1 {
                continue;
            }

            let extends_rivals = match rivals.last() {
                Some(prev) => self.is_plausible_step(prev, point),
                None => true,
            };
            if !extends_rivals {
                rivals.clear();
            }
            rivals.push(*point);

            if rivals.len() >= ANCHOR_CONFIRMATION_FIXES {
                debug!("Dropped first fix contradicted by {} consistent fixes", rivals.len());
                kept = std::mem::take(&mut rivals);
            }
        }

        // Short trace whose first fix was never confirmed
        if kept.len() == 1 && rivals.len() > 1 {
            kept = rivals;
        }

        kept
    }

    /// A step is plausible when its implied speed stays under the ceiling.
    ///
    /// A jump longer than `max_teleport_m` needs a time gap of at least
    /// `distance / max_speed_mps`; without a positive time gap it is a glitch.
    fn is_plausible_step(&self, from: &GeoPoint, to: &GeoPoint) -> bool {
        let distance = haversine_distance(from, to);

        match elapsed_seconds(from, to) {
            Some(dt) if dt > 0.0 => distance / dt <= self.config.max_speed_mps,
            _ => distance <= self.config.max_teleport_m,
        }
    }

    /// Douglas-Peucker simplification using the configured tolerance.
    pub fn simplify(&self, points: &[GeoPoint]) -> Vec<GeoPoint> {
        simplify_path(points, self.config.simplification_tolerance_m)
    }
}

/// Douglas-Peucker reduction with a tolerance in meters.
///
/// Keeps the first and last point exactly. A tolerance of zero (or less)
/// returns the input unchanged.
///
/// # Example
///
/// ```rust
/// use territory_engine::{GeoPoint, path::simplify_path};
///
/// // A straight line with a 1m wobble collapses to its endpoints
/// let line: Vec<GeoPoint> = (0..20)
///     .map(|i| GeoPoint::new(51.5 + i as f64 * 0.0001, -0.12 + (i % 2) as f64 * 0.000014))
///     .collect();
///
/// let simplified = simplify_path(&line, 10.0);
/// assert_eq!(simplified.len(), 2);
/// assert_eq!(simplified[0], line[0]);
/// assert_eq!(simplified[1], line[19]);
/// ```
pub fn simplify_path(points: &[GeoPoint], tolerance_m: f64) -> Vec<GeoPoint> {
    if points.len() < 3 || !(tolerance_m > 0.0) {
        return points.to_vec();
    }

    let projection = LocalProjection::new(points[0]);
    let line: LineString<f64> = points.iter().map(|p| projection.project(p)).collect();

    let kept = line.simplify_idx(&tolerance_m);
    debug!(
        "Simplified {} points to {} (tolerance {:.1}m)",
        points.len(),
        kept.len(),
        tolerance_m
    );

    kept.into_iter().map(|i| points[i]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fixes `spacing_m` apart heading north, one per `interval_s`.
    fn straight_trace(count: usize, spacing_m: f64, interval_s: f64) -> Vec<GeoPoint> {
        (0..count)
            .map(|i| {
                GeoPoint::new(51.5 + i as f64 * spacing_m / 111_195.0, -0.12)
                    .with_timestamp(1_000.0 + i as f64 * interval_s)
                    .with_accuracy(5.0)
            })
            .collect()
    }

    fn processor() -> PathProcessor {
        PathProcessor::new(&TerritoryConfig::default())
    }

    #[test]
    fn test_accuracy_filter() {
        let points = vec![
            GeoPoint::new(51.5, -0.12).with_accuracy(10.0),
            GeoPoint::new(51.5, -0.12).with_accuracy(50.0),
            GeoPoint::new(51.5, -0.12).with_accuracy(51.0),
            GeoPoint::new(51.5, -0.12).with_accuracy(-1.0),
            GeoPoint::new(51.5, -0.12),
        ];
        let kept = processor().filter_accuracy(&points);
        assert_eq!(kept.len(), 3);
        assert_eq!(kept[0].accuracy_m, Some(10.0));
        assert_eq!(kept[1].accuracy_m, Some(50.0));
        assert_eq!(kept[2].accuracy_m, None);
    }

    #[test]
    fn test_speed_filter_drops_glitch_only() {
        let mut trace = straight_trace(10, 10.0, 5.0);
        // 500m sideways in 5 seconds
        trace[4].longitude += 0.0072;

        let kept = processor().filter_implausible(&trace);
        assert_eq!(kept.len(), 9);
        assert!(kept.iter().all(|p| p.longitude == -0.12));
    }

    #[test]
    fn test_teleport_without_timestamps() {
        let points = vec![
            GeoPoint::new(51.5, -0.12),
            GeoPoint::new(51.5005, -0.12),  // ~55m
            GeoPoint::new(51.5105, -0.12),  // ~1.1km jump
            GeoPoint::new(51.5010, -0.12),
        ];
        let kept = processor().filter_implausible(&points);
        assert_eq!(kept.len(), 3);
        assert_eq!(kept[2].latitude, 51.5010);
    }

    #[test]
    fn test_long_gap_allows_long_jump() {
        let points = vec![
            GeoPoint::new(51.5, -0.12).with_timestamp(0.0),
            // ~1.1km after 10 minutes (under 2 m/s)
            GeoPoint::new(51.51, -0.12).with_timestamp(600.0),
        ];
        assert_eq!(processor().filter_implausible(&points).len(), 2);
    }

    #[test]
    fn test_glitched_first_fix_is_dropped() {
        let clean = straight_trace(20, 10.0, 5.0);
        let mut trace = clean.clone();
        // 1.5km away, timestamped after the run
        trace.insert(0, GeoPoint::new(51.5, -0.1).with_timestamp(9_999.0));

        assert_eq!(processor().filter_implausible(&trace), clean);
    }

    #[test]
    fn test_glitched_first_fix_without_timestamps() {
        let clean: Vec<GeoPoint> = (0..20)
            .map(|i| GeoPoint::new(51.5 + i as f64 * 10.0 / 111_195.0, -0.12))
            .collect();
        let mut trace = clean.clone();
        trace.insert(0, GeoPoint::new(51.5, -0.1));

        assert_eq!(processor().filter_implausible(&trace), clean);
    }

    #[test]
    fn test_good_first_fix_survives_early_glitch() {
        let mut trace = straight_trace(20, 10.0, 5.0);
        trace[1].longitude += 0.02;
        trace[2].longitude += 0.02;

        let kept = processor().filter_implausible(&trace);
        assert_eq!(kept.len(), 18);
        assert_eq!(kept[0], trace[0]);
        assert!(kept.iter().all(|p| p.longitude == -0.12));
    }

    #[test]
    fn test_short_trace_prefers_agreeing_fixes() {
        let points = vec![
            GeoPoint::new(51.6, -0.12),
            GeoPoint::new(51.5, -0.12),
            GeoPoint::new(51.5001, -0.12),
        ];
        let kept = processor().filter_implausible(&points);
        assert_eq!(kept, points[1..].to_vec());
    }

    #[test]
    fn test_duplicate_timestamp_small_move_kept() {
        let points = vec![
            GeoPoint::new(51.5, -0.12).with_timestamp(10.0),
            GeoPoint::new(51.50002, -0.12).with_timestamp(10.0),
        ];
        assert_eq!(processor().filter_implausible(&points).len(), 2);
    }

    #[test]
    fn test_process_counts_drops() {
        let mut raw = straight_trace(12, 10.0, 5.0);
        raw.push(GeoPoint::new(f64::NAN, 0.0));
        raw[3].accuracy_m = Some(120.0);

        let processed = processor().process(&raw);
        assert_eq!(processed.dropped_invalid, 1);
        assert_eq!(processed.dropped_inaccurate, 1);
        assert_eq!(processed.dropped_implausible, 0);
        assert_eq!(processed.filtered.len(), 11);
        assert_eq!(processed.simplified.first(), processed.filtered.first());
        assert_eq!(processed.simplified.last(), processed.filtered.last());
    }

    #[test]
    fn test_simplify_zero_tolerance_is_identity() {
        let mut trace = straight_trace(30, 3.0, 1.0);
        for (i, p) in trace.iter_mut().enumerate() {
            p.longitude += (i % 3) as f64 * 0.00002;
        }
        assert_eq!(simplify_path(&trace, 0.0), trace);
    }

    #[test]
    fn test_simplify_huge_tolerance_keeps_endpoints() {
        let trace: Vec<GeoPoint> = (0..40)
            .map(|i| {
                let angle = i as f64 / 40.0 * std::f64::consts::PI;
                GeoPoint::new(51.5 + 0.002 * angle.sin(), -0.12 + 0.003 * angle.cos())
            })
            .collect();

        let simplified = simplify_path(&trace, 1_000_000.0);
        assert_eq!(simplified, vec![trace[0], trace[39]]);
    }

    #[test]
    fn test_simplify_keeps_corner() {
        // L-shape: 200m north, then 200m east
        let mut trace: Vec<GeoPoint> = (0..=20)
            .map(|i| GeoPoint::new(51.5 + i as f64 * 10.0 / 111_195.0, -0.12))
            .collect();
        let corner = trace[20];
        for i in 1..=20 {
            trace.push(GeoPoint::new(corner.latitude, -0.12 + i as f64 * 10.0 / 69_220.0));
        }

        let simplified = simplify_path(&trace, 10.0);
        assert_eq!(simplified.len(), 3);
        assert_eq!(simplified[1], corner);
    }

    #[test]
    fn test_simplify_short_inputs() {
        assert!(simplify_path(&[], 10.0).is_empty());
        let two = vec![GeoPoint::new(1.0, 1.0), GeoPoint::new(1.001, 1.0)];
        assert_eq!(simplify_path(&two, 10.0), two);
    }
}
