//! # Hex Grid
//!
//! Deterministic mapping between coordinates and hexagonal cells.
//!
//! ## Layout
//!
//! Cells are regular pointy-top hexagons laid out in rows over a planar
//! (longitude, latitude) degree space, with 111,320 m per degree on both axes.
//! For an edge length `s`:
//!
//! - rows are `1.5·s` tall: `row = floor(lat / row_height)`
//! - columns are `√3·s` wide, and odd rows are shifted east by half a column
//! - each cell's hexagon is centered in its row/column band, so bands and
//!   hexagons have the same area and neighbouring hexagons tile without gaps
//!
//! Cell area is 0.1052 km² at resolution 9 and changes by a factor of 7 per
//! resolution step. Because the grid is planar in degrees, the ground area of a
//! cell shrinks with `cos(latitude)` away from the equator.
//!
//! Cell ids are written as `"{resolution}_{row}_{col}"`, e.g. `"9_17085_-38"`.
//!
//! ## Example
//!
//! ```rust
//! use territory_engine::{GeoPoint, HexGrid};
//!
//! let grid = HexGrid::new();
//! let cell = grid.coordinate_to_cell(&GeoPoint::new(51.5074, -0.1278), 9);
//! let center = grid.cell_to_center(&cell);
//! assert_eq!(grid.coordinate_to_cell(&center, 9), cell);
//!
//! let id = cell.to_string();
//! assert_eq!(id.parse::<territory_engine::CellId>().unwrap(), cell);
//! ```

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use geo::{Contains, Coord, LineString, Point, Polygon};
use log::warn;

use crate::error::TerritoryError;
use crate::geo_utils::METERS_PER_DEGREE;
use crate::GeoPoint;

/// Highest resolution accepted by config and cell id parsing.
pub const MAX_RESOLUTION: u8 = 15;

/// Resolution whose cell area is [`REFERENCE_CELL_AREA_KM2`].
pub const REFERENCE_RESOLUTION: u8 = 9;

/// Cell area at [`REFERENCE_RESOLUTION`].
pub const REFERENCE_CELL_AREA_KM2: f64 = 0.1052;

/// Area ratio between consecutive resolutions.
pub const RESOLUTION_APERTURE: f64 = 7.0;

const SQRT_3: f64 = 1.732_050_807_568_877_2;

/// Widest longitude span rasterized; anything wider wraps the antimeridian.
const MAX_SPAN_DEG: f64 = 180.0;

/// Neighbour offsets `(d_row, d_col)` for even rows.
const EVEN_ROW_NEIGHBOURS: [(i64, i64); 6] = [
    (0, 1),   // E
    (-1, 0),  // SE
    (-1, -1), // SW
    (0, -1),  // W
    (1, -1),  // NW
    (1, 0),   // NE
];

/// Neighbour offsets `(d_row, d_col)` for odd rows (shifted east by half a cell).
const ODD_ROW_NEIGHBOURS: [(i64, i64); 6] = [
    (0, 1),  // E
    (-1, 1), // SE
    (-1, 0), // SW
    (0, -1), // W
    (1, 0),  // NW
    (1, 1),  // NE
];

// =============================================================================
// Cell Identity
// =============================================================================

/// Identifier of one hex cell: resolution plus offset row/column.
///
/// Equality and hashing are content-based, so the same coordinate at the same
/// resolution always yields an equal id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(into = "String", try_from = "String"))]
pub struct CellId {
    pub resolution: u8,
    pub row: i64,
    pub col: i64,
}

impl CellId {
    pub fn new(resolution: u8, row: i64, col: i64) -> Self {
        Self { resolution, row, col }
    }

    /// Odd rows are shifted east by half a column.
    #[inline]
    pub fn is_odd_row(&self) -> bool {
        self.row.rem_euclid(2) == 1
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.resolution, self.row, self.col)
    }
}

impl FromStr for CellId {
    type Err = TerritoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('_').collect();
        if parts.len() != 3 {
            return Err(TerritoryError::invalid_cell_id(
                s,
                format!("expected 3 '_'-separated parts, found {}", parts.len()),
            ));
        }

        let resolution: u8 = parts[0]
            .parse()
            .map_err(|_| TerritoryError::invalid_cell_id(s, "resolution is not an integer in 0..=255"))?;
        if resolution > MAX_RESOLUTION {
            return Err(TerritoryError::invalid_cell_id(
                s,
                format!("resolution {} exceeds maximum {}", resolution, MAX_RESOLUTION),
            ));
        }
        let row: i64 = parts[1]
            .parse()
            .map_err(|_| TerritoryError::invalid_cell_id(s, "row is not an integer"))?;
        let col: i64 = parts[2]
            .parse()
            .map_err(|_| TerritoryError::invalid_cell_id(s, "column is not an integer"))?;

        let grid = HexGrid::new();
        if row.unsigned_abs() > grid.max_row(resolution).unsigned_abs() {
            return Err(TerritoryError::invalid_cell_id(
                s,
                format!("row {} is outside the grid at resolution {}", row, resolution),
            ));
        }
        if col.unsigned_abs() > grid.max_col(resolution).unsigned_abs() {
            return Err(TerritoryError::invalid_cell_id(
                s,
                format!("column {} is outside the grid at resolution {}", col, resolution),
            ));
        }

        Ok(Self { resolution, row, col })
    }
}

impl From<CellId> for String {
    fn from(cell: CellId) -> Self {
        cell.to_string()
    }
}

impl TryFrom<String> for CellId {
    type Error = TerritoryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// =============================================================================
// Grid
// =============================================================================

/// Stateless hex grid service.
///
/// Every method takes the resolution explicitly; nothing is cached between
/// calls, so one instance can be shared freely.
#[derive(Debug, Clone, Copy, Default)]
pub struct HexGrid;

impl HexGrid {
    pub fn new() -> Self {
        Self
    }

    /// Nominal cell area in km² at a resolution.
    pub fn cell_area_km2(&self, resolution: u8) -> f64 {
        let steps = REFERENCE_RESOLUTION as i32 - resolution as i32;
        REFERENCE_CELL_AREA_KM2 * RESOLUTION_APERTURE.powi(steps)
    }

    /// Hexagon edge length (= circumradius) in meters at a resolution.
    pub fn edge_length_m(&self, resolution: u8) -> f64 {
        let area_m2 = self.cell_area_km2(resolution) * 1_000_000.0;
        (2.0 * area_m2 / (3.0 * SQRT_3)).sqrt()
    }

    #[inline]
    fn edge_deg(&self, resolution: u8) -> f64 {
        self.edge_length_m(resolution) / METERS_PER_DEGREE
    }

    /// Column spacing in degrees.
    #[inline]
    fn col_width_deg(&self, resolution: u8) -> f64 {
        SQRT_3 * self.edge_deg(resolution)
    }

    /// Row spacing in degrees.
    #[inline]
    fn row_height_deg(&self, resolution: u8) -> f64 {
        1.5 * self.edge_deg(resolution)
    }

    #[inline]
    fn row_offset(row: i64) -> f64 {
        if row.rem_euclid(2) == 1 {
            0.5
        } else {
            0.0
        }
    }

    /// Largest `|row|` any coordinate can map to at a resolution.
    pub fn max_row(&self, resolution: u8) -> i64 {
        (90.0 / self.row_height_deg(resolution)).ceil() as i64 + 1
    }

    /// Largest `|col|` any coordinate can map to at a resolution.
    pub fn max_col(&self, resolution: u8) -> i64 {
        (180.0 / self.col_width_deg(resolution)).ceil() as i64 + 1
    }

    /// Bucket a coordinate into its cell.
    ///
    /// Total for every finite coordinate; there is no error case. Coordinates
    /// outside ±90° / ±180° are clamped to the edge of the grid.
    pub fn coordinate_to_cell(&self, point: &GeoPoint, resolution: u8) -> CellId {
        self.cell_at(point.latitude, point.longitude, resolution)
    }

    fn cell_at(&self, latitude: f64, longitude: f64, resolution: u8) -> CellId {
        let latitude = latitude.clamp(-90.0, 90.0);
        let longitude = longitude.clamp(-180.0, 180.0);
        let row = (latitude / self.row_height_deg(resolution)).floor() as i64;
        let col = (longitude / self.col_width_deg(resolution) - Self::row_offset(row)).floor() as i64;
        CellId { resolution, row, col }
    }

    /// Center of a cell, computed from the bucketing arithmetic.
    pub fn cell_to_center(&self, cell: &CellId) -> GeoPoint {
        let latitude = (cell.row as f64 + 0.5) * self.row_height_deg(cell.resolution);
        let longitude = (cell.col as f64 + 0.5 + Self::row_offset(cell.row))
            * self.col_width_deg(cell.resolution);
        GeoPoint::new(latitude, longitude)
    }

    /// The six hexagon vertices, counter-clockwise from 30°.
    pub fn cell_boundary(&self, cell: &CellId) -> [GeoPoint; 6] {
        let center = self.cell_to_center(cell);
        let radius = self.edge_deg(cell.resolution);

        std::array::from_fn(|i| {
            let angle = (30.0 + 60.0 * i as f64).to_radians();
            GeoPoint::new(
                center.latitude + radius * angle.sin(),
                center.longitude + radius * angle.cos(),
            )
        })
    }

    /// The six cells sharing an edge with `cell`, at the same resolution.
    ///
    /// Ids built by hand past `i64` range saturate instead of wrapping; parsed
    /// and computed ids never get near it.
    pub fn adjacent_cells(&self, cell: &CellId) -> [CellId; 6] {
        let offsets = if cell.is_odd_row() {
            &ODD_ROW_NEIGHBOURS
        } else {
            &EVEN_ROW_NEIGHBOURS
        };

        std::array::from_fn(|i| {
            let (d_row, d_col) = offsets[i];
            CellId {
                resolution: cell.resolution,
                row: cell.row.saturating_add(d_row),
                col: cell.col.saturating_add(d_col),
            }
        })
    }

    /// Rasterize a polygon into cells.
    ///
    /// Returns every cell whose center lies inside the polygon, plus every cell
    /// containing a polygon vertex. Grid centers are sampled one cell apart, so
    /// coverage is approximate at the edges; the vertex cells keep thin or
    /// elongated shapes from vanishing entirely.
    ///
    /// The point sequence may be open or closed. Fewer than three points
    /// yield only the vertex cells.
    pub fn polygon_to_cells(&self, polygon: &[GeoPoint], resolution: u8) -> HashSet<CellId> {
        let valid: Vec<GeoPoint> = polygon.iter().filter(|p| p.is_valid()).copied().collect();
        let mut cells: HashSet<CellId> = valid
            .iter()
            .map(|p| self.coordinate_to_cell(p, resolution))
            .collect();

        if valid.len() < 3 {
            return cells;
        }
        let bounds = match crate::Bounds::from_points(&valid) {
            Some(b) => b,
            None => return cells,
        };
        if bounds.max_lng - bounds.min_lng > MAX_SPAN_DEG {
            // Crosses the antimeridian; the planar grid cannot fill it
            warn!(
                "Polygon spans {:.1} degrees of longitude, keeping {} vertex cells only",
                bounds.max_lng - bounds.min_lng,
                cells.len()
            );
            return cells;
        }
        let ring: Vec<Coord> = valid
            .iter()
            .map(|p| Coord { x: p.longitude, y: p.latitude })
            .collect();
        let shape = Polygon::new(LineString::new(ring), vec![]);

        let min_row = self.cell_at(bounds.min_lat, bounds.min_lng, resolution).row;
        let max_row = self.cell_at(bounds.max_lat, bounds.min_lng, resolution).row;

        for row in min_row..=max_row {
            let min_col = self.cell_at_row(row, bounds.min_lng, resolution);
            let max_col = self.cell_at_row(row, bounds.max_lng, resolution);

            for col in min_col..=max_col {
                let cell = CellId { resolution, row, col };
                let center = self.cell_to_center(&cell);
                if shape.contains(&Point::new(center.longitude, center.latitude)) {
                    cells.insert(cell);
                }
            }
        }

        cells
    }

    fn cell_at_row(&self, row: i64, longitude: f64, resolution: u8) -> i64 {
        let longitude = longitude.clamp(-180.0, 180.0);
        (longitude / self.col_width_deg(resolution) - Self::row_offset(row)).floor() as i64
    }

    /// Every cell a path passes through, sampled at half-cell steps.
    pub fn path_to_cells(&self, path: &[GeoPoint], resolution: u8) -> HashSet<CellId> {
        let points: Vec<&GeoPoint> = path.iter().filter(|p| p.is_valid()).collect();
        let mut cells = HashSet::new();

        if let Some(first) = points.first() {
            cells.insert(self.coordinate_to_cell(first, resolution));
        }

        let step = self.edge_deg(resolution) / 2.0;
        for pair in points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let d_lat = b.latitude - a.latitude;
            let d_lng = b.longitude - a.longitude;
            if d_lng.abs() > MAX_SPAN_DEG {
                cells.insert(self.coordinate_to_cell(b, resolution));
                continue;
            }
            let span = (d_lat * d_lat + d_lng * d_lng).sqrt();
            let steps = (span / step).ceil().max(1.0) as usize;

            for i in 1..=steps {
                let t = i as f64 / steps as f64;
                cells.insert(self.cell_at(a.latitude + t * d_lat, a.longitude + t * d_lng, resolution));
            }
        }

        cells
    }
}
