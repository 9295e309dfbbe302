//! # Territory Engine
//!
//! Turns noisy GPS runs into claims over a hexagonal grid and groups the
//! resulting ownership ledger into renderable territories.
//!
//! This library provides:
//! - Trace cleanup: accuracy and teleport/speed filtering, Douglas-Peucker simplification
//! - Run validation against distance, duration, point count, speed and loop policies
//! - A deterministic hex grid (`"{resolution}_{row}_{col}"` cell ids)
//! - Flood-fill grouping of owned cells into contiguous regions
//!
//! The engine is pure domain logic. Persistence sits behind the
//! [`TerritoryStore`] trait and rendering reads back [`Region`] values.
//!
//! ## Features
//!
//! - **`parallel`** - Group owners in parallel with rayon
//! - **`serde`** - Serialize value types, load [`TerritoryConfig`] from JSON
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use territory_engine::{GeoPoint, InMemoryTerritoryStore, TerritoryConfig, TerritoryEngine};
//!
//! let engine = TerritoryEngine::new(TerritoryConfig::default()).unwrap();
//! let store = InMemoryTerritoryStore::new();
//!
//! // A ~300m loop sampled every 4 seconds.
//! let trace: Vec<GeoPoint> = (0..15)
//!     .map(|i| {
//!         let angle = i as f64 / 15.0 * std::f64::consts::TAU;
//!         GeoPoint::new(51.5 + 0.00043 * angle.sin(), -0.12 + 0.00069 * angle.cos())
//!             .with_timestamp(1_700_000_000.0 + i as f64 * 4.0)
//!             .with_accuracy(8.0)
//!     })
//!     .collect();
//!
//! let run = engine.evaluate_run("run-1", "alice", &trace);
//! if run.verdict.is_valid() {
//!     engine.claim_run(&store, &run, 1_700_000_060).unwrap();
//! }
//!
//! let regions = engine.regions(&store.snapshot());
//! for region in &regions {
//!     println!("{} owns {} cells", region.owner_id, region.cells.len());
//! }
//! ```

use std::collections::BTreeSet;

pub mod config;
pub use config::{BoundaryMode, TerritoryConfig};

pub mod error;
pub use error::{Result, StoreError, TerritoryError};

pub mod geo_utils;

pub mod hex_grid;
pub use hex_grid::{CellId, HexGrid, MAX_RESOLUTION};

pub mod path;
pub use path::{PathProcessor, ProcessedTrace};

pub mod validation;
pub use validation::{InvalidReason, RunMetrics, RunValidator, ValidationResult};

pub mod store;
pub use store::{InMemoryTerritoryStore, TerritoryStore};

pub mod grouping;
pub use grouping::{OwnerStats, RegionIndex, TerritoryGrouper};

pub mod engine;
pub use engine::{ClaimSummary, TerritoryEngine};

#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
pub(crate) fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("TerritoryEngineRust"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
pub(crate) fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A GPS fix: coordinates plus the optional timestamp and horizontal accuracy
/// reported by the device.
///
/// # Example
/// ```
/// use territory_engine::GeoPoint;
/// let point = GeoPoint::new(51.5074, -0.1278)
///     .with_timestamp(1_700_000_000.0)
///     .with_accuracy(5.0);
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Seconds since the Unix epoch.
    pub timestamp: Option<f64>,
    /// Horizontal accuracy radius in meters.
    pub accuracy_m: Option<f64>,
}

impl GeoPoint {
    /// Create a point without timestamp or accuracy.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp: None,
            accuracy_m: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_accuracy(mut self, accuracy_m: f64) -> Self {
        self.accuracy_m = Some(accuracy_m);
        self
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from points.
    pub fn from_points(points: &[GeoPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_lat = f64::MAX;
        let mut max_lat = f64::MIN;
        let mut min_lng = f64::MAX;
        let mut max_lng = f64::MIN;

        for p in points {
            min_lat = min_lat.min(p.latitude);
            max_lat = max_lat.max(p.latitude);
            min_lng = min_lng.min(p.longitude);
            max_lng = max_lng.max(p.longitude);
        }

        Some(Self { min_lat, max_lat, min_lng, max_lng })
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }

    /// Corners in SW, SE, NE, NW order.
    pub fn corners(&self) -> Vec<GeoPoint> {
        vec![
            GeoPoint::new(self.min_lat, self.min_lng),
            GeoPoint::new(self.min_lat, self.max_lng),
            GeoPoint::new(self.max_lat, self.max_lng),
            GeoPoint::new(self.max_lat, self.min_lng),
        ]
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.latitude >= self.min_lat
            && point.latitude <= self.max_lat
            && point.longitude >= self.min_lng
            && point.longitude <= self.max_lng
    }
}

/// Current ownership record for one cell.
///
/// Only the latest owner is kept: writing a new claim for a cell replaces
/// the previous one.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Claim {
    pub cell_id: CellId,
    pub owner_id: String,
    /// Run that produced this claim
    pub source_run_id: String,
    /// Unix timestamp (seconds)
    pub claimed_at: i64,
    /// Distance of the source run in meters
    pub source_distance_m: f64,
}

/// A maximal connected set of cells held by one owner.
///
/// Regions are derived from the ledger on demand and never stored.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Region {
    pub owner_id: String,
    pub cells: BTreeSet<CellId>,
    /// Display outline, shape depends on [`BoundaryMode`]
    pub boundary: Vec<GeoPoint>,
    /// Bounding box of every cell vertex
    pub bounds: Bounds,
}

impl Region {
    /// Grid resolution of the region's cells.
    pub fn resolution(&self) -> Option<u8> {
        self.cells.iter().next().map(|c| c.resolution)
    }

    pub fn contains_cell(&self, cell: &CellId) -> bool {
        self.cells.contains(cell)
    }
}

/// One completed tracking session, evaluated once and never mutated.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Run {
    pub id: String,
    pub user_id: String,
    /// Trace after accuracy and plausibility filtering
    pub trace: Vec<GeoPoint>,
    /// Simplified outline used for rasterization
    pub simplified: Vec<GeoPoint>,
    pub distance_m: f64,
    pub duration_s: f64,
    pub verdict: ValidationResult,
    /// Cells covered by the run, sorted. Empty when the run is invalid.
    pub claimed_cells: Vec<CellId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_point_validation() {
        assert!(GeoPoint::new(51.5074, -0.1278).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, 181.0).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_geo_point_builders() {
        let p = GeoPoint::new(1.0, 2.0).with_timestamp(10.0).with_accuracy(4.0);
        assert_eq!(p.timestamp, Some(10.0));
        assert_eq!(p.accuracy_m, Some(4.0));
    }

    #[test]
    fn test_bounds_from_points() {
        assert!(Bounds::from_points(&[]).is_none());

        let bounds = Bounds::from_points(&[
            GeoPoint::new(51.50, -0.13),
            GeoPoint::new(51.51, -0.12),
        ])
        .unwrap();
        assert_eq!(bounds.min_lat, 51.50);
        assert_eq!(bounds.max_lng, -0.12);
        assert!(bounds.contains(&bounds.center()));
        assert_eq!(bounds.corners().len(), 4);
    }
}
