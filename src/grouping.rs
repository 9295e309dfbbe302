//! Territory grouping.
//!
//! Partitions an ownership ledger into regions: maximal sets of same-owner
//! cells connected through hex adjacency. Regions are recomputed from scratch
//! on every call and never patched incrementally.
//!
//! The flood fill uses an explicit queue and removes cells from the owner's
//! pool as they are reached, so each cell is visited once and large
//! territories cannot exhaust the call stack.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use geo::{ConvexHull, MultiPoint, Point};
use log::debug;
use rstar::{RTree, RTreeObject, AABB};

use crate::geo_utils::meters_to_degrees;
use crate::{BoundaryMode, Bounds, CellId, Claim, GeoPoint, HexGrid, Region, TerritoryConfig};

/// Per-owner summary of grouped territory.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OwnerStats {
    pub owner_id: String,
    pub cell_count: u32,
    pub region_count: u32,
    /// Cell count of the owner's largest region
    pub largest_region_cells: u32,
    /// Nominal area (cells × cell area)
    pub area_km2: f64,
}

/// Stateless region builder.
#[derive(Debug, Clone)]
pub struct TerritoryGrouper {
    grid: HexGrid,
    boundary_mode: BoundaryMode,
}

impl TerritoryGrouper {
    pub fn new(config: &TerritoryConfig) -> Self {
        Self {
            grid: HexGrid::new(),
            boundary_mode: config.boundary_mode,
        }
    }

    /// Group a ledger snapshot into regions.
    ///
    /// If a cell appears more than once, the later claim wins. Output is
    /// sorted by owner, then by region size (largest first), then by the
    /// region's smallest cell id.
    pub fn group(&self, claims: &[Claim]) -> Vec<Region> {
        let mut regions: Vec<Region> = Self::cells_by_owner(claims)
            .into_iter()
            .flat_map(|(owner_id, cells)| self.group_owner(owner_id, &cells))
            .collect();

        sort_regions(&mut regions);
        debug!("Grouped {} claims into {} regions", claims.len(), regions.len());
        regions
    }

    /// Same as [`group`](Self::group), with owners processed in parallel.
    #[cfg(feature = "parallel")]
    pub fn group_parallel(&self, claims: &[Claim]) -> Vec<Region> {
        use rayon::prelude::*;

        let by_owner: Vec<(&str, Vec<CellId>)> = Self::cells_by_owner(claims).into_iter().collect();
        let mut regions: Vec<Region> = by_owner
            .par_iter()
            .flat_map_iter(|(owner_id, cells)| self.group_owner(owner_id, cells))
            .collect();

        sort_regions(&mut regions);
        debug!("Grouped {} claims into {} regions (parallel)", claims.len(), regions.len());
        regions
    }

    /// Latest owner per cell, then cells per owner in first-seen order.
    fn cells_by_owner(claims: &[Claim]) -> HashMap<&str, Vec<CellId>> {
        let mut owner_of: HashMap<CellId, &str> = HashMap::with_capacity(claims.len());
        let mut order: Vec<CellId> = Vec::with_capacity(claims.len());
        for claim in claims {
            if owner_of.insert(claim.cell_id, claim.owner_id.as_str()).is_none() {
                order.push(claim.cell_id);
            }
        }

        let mut by_owner: HashMap<&str, Vec<CellId>> = HashMap::new();
        for cell in order {
            if let Some(&owner) = owner_of.get(&cell) {
                by_owner.entry(owner).or_default().push(cell);
            }
        }
        by_owner
    }

    /// Flood-fill one owner's cells into connected regions.
    ///
    /// An empty cell list yields no regions.
    pub fn group_owner(&self, owner_id: &str, cells: &[CellId]) -> Vec<Region> {
        let mut remaining: HashSet<CellId> = cells.iter().copied().collect();
        let mut regions = Vec::new();
        let mut queue: VecDeque<CellId> = VecDeque::new();

        for seed in cells {
            if !remaining.remove(seed) {
                continue;
            }

            let mut component = BTreeSet::new();
            queue.push_back(*seed);
            while let Some(cell) = queue.pop_front() {
                component.insert(cell);
                for neighbour in self.grid.adjacent_cells(&cell) {
                    if remaining.remove(&neighbour) {
                        queue.push_back(neighbour);
                    }
                }
            }

            regions.push(self.build_region(owner_id, component));
        }

        regions
    }

    fn build_region(&self, owner_id: &str, cells: BTreeSet<CellId>) -> Region {
        let vertices: Vec<GeoPoint> = cells
            .iter()
            .flat_map(|cell| self.grid.cell_boundary(cell))
            .collect();

        // Regions always hold at least one cell, hence six vertices
        let bounds = Bounds::from_points(&vertices).unwrap_or(Bounds {
            min_lat: 0.0,
            max_lat: 0.0,
            min_lng: 0.0,
            max_lng: 0.0,
        });

        let boundary = match self.boundary_mode {
            BoundaryMode::BoundingBox => bounds.corners(),
            BoundaryMode::ConvexHull => convex_hull(&vertices),
        };

        Region {
            owner_id: owner_id.to_string(),
            cells,
            boundary,
            bounds,
        }
    }

    /// Summarize regions per owner, sorted by owner id.
    pub fn owner_stats(&self, regions: &[Region]) -> Vec<OwnerStats> {
        let mut stats: HashMap<&str, OwnerStats> = HashMap::new();

        for region in regions {
            let area: f64 = region
                .cells
                .iter()
                .map(|c| self.grid.cell_area_km2(c.resolution))
                .sum();
            let size = region.cells.len() as u32;

            let entry = stats.entry(region.owner_id.as_str()).or_insert_with(|| OwnerStats {
                owner_id: region.owner_id.clone(),
                cell_count: 0,
                region_count: 0,
                largest_region_cells: 0,
                area_km2: 0.0,
            });
            entry.cell_count += size;
            entry.region_count += 1;
            entry.largest_region_cells = entry.largest_region_cells.max(size);
            entry.area_km2 += area;
        }

        let mut stats: Vec<OwnerStats> = stats.into_values().collect();
        stats.sort_by(|a, b| a.owner_id.cmp(&b.owner_id));
        stats
    }
}

fn sort_regions(regions: &mut [Region]) {
    regions.sort_by(|a, b| {
        a.owner_id
            .cmp(&b.owner_id)
            .then_with(|| b.cells.len().cmp(&a.cells.len()))
            .then_with(|| a.cells.first().cmp(&b.cells.first()))
    });
}

fn convex_hull(vertices: &[GeoPoint]) -> Vec<GeoPoint> {
    let points: MultiPoint<f64> = vertices
        .iter()
        .map(|v| Point::new(v.longitude, v.latitude))
        .collect();
    let hull = points.convex_hull();

    // Exterior ring is closed; drop the repeated first vertex
    let mut coords: Vec<GeoPoint> = hull
        .exterior()
        .coords()
        .map(|c| GeoPoint::new(c.y, c.x))
        .collect();
    if coords.len() > 1 && coords.first() == coords.last() {
        coords.pop();
    }
    coords
}

// =============================================================================
// Region Lookup
// =============================================================================

/// Region bounds entry for the R-tree.
#[derive(Debug, Clone)]
struct RegionBounds {
    index: usize,
    bounds: Bounds,
}

impl RTreeObject for RegionBounds {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bounds.min_lng, self.bounds.min_lat],
            [self.bounds.max_lng, self.bounds.max_lat],
        )
    }
}

/// Spatial index answering "whose territory is this?" for map taps.
#[derive(Debug)]
pub struct RegionIndex {
    grid: HexGrid,
    regions: Vec<Region>,
    rtree: RTree<RegionBounds>,
}

impl RegionIndex {
    pub fn new(regions: Vec<Region>) -> Self {
        let entries: Vec<RegionBounds> = regions
            .iter()
            .enumerate()
            .map(|(index, r)| RegionBounds { index, bounds: r.bounds })
            .collect();

        Self {
            grid: HexGrid::new(),
            rtree: RTree::bulk_load(entries),
            regions,
        }
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// The region whose cells contain `point`.
    pub fn region_at(&self, point: &GeoPoint) -> Option<&Region> {
        let envelope = AABB::from_point([point.longitude, point.latitude]);
        self.rtree
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| &self.regions[entry.index])
            .find(|region| match region.resolution() {
                Some(resolution) => region.contains_cell(&self.grid.coordinate_to_cell(point, resolution)),
                None => false,
            })
    }

    /// Regions whose bounds come within `radius_m` of `point`.
    pub fn regions_near(&self, point: &GeoPoint, radius_m: f64) -> Vec<&Region> {
        let lat_deg = radius_m / crate::geo_utils::METERS_PER_DEGREE;
        let lng_deg = meters_to_degrees(radius_m, point.latitude);
        let envelope = AABB::from_corners(
            [point.longitude - lng_deg, point.latitude - lat_deg],
            [point.longitude + lng_deg, point.latitude + lat_deg],
        );

        let mut indices: Vec<usize> = self
            .rtree
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| entry.index)
            .collect();
        indices.sort_unstable();
        indices.into_iter().map(|i| &self.regions[i]).collect()
    }
}
