//! # Geographic Utilities
//!
//! Distance, timing and projection helpers shared by the path processor,
//! the validator and the hex grid.
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two fixes |
//! | [`polyline_length`] | Total length of a trace in meters |
//! | [`elapsed_seconds`] | Time between two timestamped fixes |
//! | [`implied_speed`] | Speed implied by two timestamped fixes |
//! | [`meters_to_degrees`] | Convert meters to approximate degrees at a latitude |
//! | [`LocalProjection`] | Flat meters-based projection around an origin |
//!
//! ## Example
//!
//! ```rust
//! use territory_engine::{GeoPoint, geo_utils};
//!
//! let a = GeoPoint::new(51.5074, -0.1278).with_timestamp(0.0);
//! let b = GeoPoint::new(51.5080, -0.1290).with_timestamp(30.0);
//!
//! let dist = geo_utils::haversine_distance(&a, &b);
//! let speed = geo_utils::implied_speed(&a, &b).unwrap();
//! assert!((speed - dist / 30.0).abs() < 1e-9);
//! ```

use geo::{Coord, Distance, Haversine, Point};

use crate::GeoPoint;

/// Meters per degree of latitude (and of longitude at the equator).
pub const METERS_PER_DEGREE: f64 = 111_320.0;

// =============================================================================
// Distance Functions
// =============================================================================

/// Great-circle distance in meters between two fixes (spherical Earth, 6,371 km).
///
/// ```rust
/// use territory_engine::{GeoPoint, geo_utils};
///
/// let london = GeoPoint::new(51.5074, -0.1278);
/// let paris = GeoPoint::new(48.8566, 2.3522);
///
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 1000.0); // ~344 km
/// ```
#[inline]
pub fn haversine_distance(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Total length of a trace in meters. Empty or single-point traces return 0.0.
pub fn polyline_length(points: &[GeoPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Convert meters to approximate degrees of longitude at a given latitude.
///
/// Uses a conservative (larger) value near the poles where longitude
/// degrees collapse.
#[inline]
pub fn meters_to_degrees(meters: f64, latitude: f64) -> f64 {
    let lat_rad = latitude.to_radians();
    let meters_per_degree = METERS_PER_DEGREE * lat_rad.cos().max(0.1);
    meters / meters_per_degree
}

// =============================================================================
// Time Functions
// =============================================================================

/// Seconds from `from` to `to`, or `None` if either fix lacks a timestamp.
///
/// The result may be zero or negative when the device repeats or reorders
/// timestamps.
#[inline]
pub fn elapsed_seconds(from: &GeoPoint, to: &GeoPoint) -> Option<f64> {
    match (from.timestamp, to.timestamp) {
        (Some(t0), Some(t1)) => Some(t1 - t0),
        _ => None,
    }
}

/// Speed in m/s between two fixes.
///
/// Returns `None` without timestamps or when the elapsed time is not positive.
pub fn implied_speed(from: &GeoPoint, to: &GeoPoint) -> Option<f64> {
    let dt = elapsed_seconds(from, to)?;
    if dt <= 0.0 {
        return None;
    }
    Some(haversine_distance(from, to) / dt)
}

// =============================================================================
// Projection
// =============================================================================

/// Equirectangular projection to meters around an origin.
///
/// Accurate enough for run-sized areas (a few kilometers), which is all the
/// simplifier needs to measure perpendicular distances in meters.
#[derive(Debug, Clone, Copy)]
pub struct LocalProjection {
    origin: GeoPoint,
    meters_per_deg_lng: f64,
}

impl LocalProjection {
    pub fn new(origin: GeoPoint) -> Self {
        let meters_per_deg_lng = METERS_PER_DEGREE * origin.latitude.to_radians().cos();
        Self { origin, meters_per_deg_lng }
    }

    /// Project to `x` (east) / `y` (north) meters from the origin.
    pub fn project(&self, point: &GeoPoint) -> Coord {
        Coord {
            x: (point.longitude - self.origin.longitude) * self.meters_per_deg_lng,
            y: (point.latitude - self.origin.latitude) * METERS_PER_DEGREE,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn test_haversine_distance_same_point() {
        let p = GeoPoint::new(51.5074, -0.1278);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_distance_known_value() {
        let london = GeoPoint::new(51.5074, -0.1278);
        let paris = GeoPoint::new(48.8566, 2.3522);
        let dist = haversine_distance(&london, &paris);
        assert!(approx_eq(dist, 343_560.0, 5000.0));
    }

    #[test]
    fn test_polyline_length_short_inputs() {
        assert_eq!(polyline_length(&[]), 0.0);
        assert_eq!(polyline_length(&[GeoPoint::new(51.5074, -0.1278)]), 0.0);
    }

    #[test]
    fn test_polyline_length_two_points() {
        let track = vec![
            GeoPoint::new(51.5074, -0.1278),
            GeoPoint::new(51.5080, -0.1280),
        ];
        let length = polyline_length(&track);
        assert!(length > 0.0);
        assert!(length < 100.0);
    }

    #[test]
    fn test_elapsed_and_speed() {
        let a = GeoPoint::new(0.0, 0.0).with_timestamp(100.0);
        let b = GeoPoint::new(0.001, 0.0).with_timestamp(110.0);
        assert_eq!(elapsed_seconds(&a, &b), Some(10.0));

        let speed = implied_speed(&a, &b).unwrap();
        assert!(approx_eq(speed, 11.1, 0.2));

        let untimed = GeoPoint::new(0.001, 0.0);
        assert!(elapsed_seconds(&a, &untimed).is_none());
        assert!(implied_speed(&a, &untimed).is_none());

        let same_time = GeoPoint::new(0.001, 0.0).with_timestamp(100.0);
        assert!(implied_speed(&a, &same_time).is_none());
    }

    #[test]
    fn test_local_projection() {
        let origin = GeoPoint::new(51.5, -0.12);
        let proj = LocalProjection::new(origin);
        let c = proj.project(&origin);
        assert_eq!((c.x, c.y), (0.0, 0.0));

        let north = proj.project(&GeoPoint::new(51.501, -0.12));
        assert!(approx_eq(north.y, 111.32, 0.01));
        assert!(approx_eq(north.x, 0.0, 1e-9));

        // Projected distance agrees with haversine over short spans
        let east_point = GeoPoint::new(51.5, -0.118);
        let east = proj.project(&east_point);
        let hav = haversine_distance(&origin, &east_point);
        assert!(approx_eq(east.x, hav, 1.0));
    }

    #[test]
    fn test_meters_to_degrees() {
        let deg = meters_to_degrees(111_320.0, 0.0);
        assert!(approx_eq(deg, 1.0, 0.01));

        let deg_45 = meters_to_degrees(111_320.0, 45.0);
        assert!(deg_45 > 1.0);
    }
}
