//! Mobile bindings (uniffi).
//!
//! Cell ids cross the boundary as their `"{resolution}_{row}_{col}"` strings
//! so existing persisted ledgers on the device stay readable.

use log::{debug, info};

use crate::{
    init_logging, CellId, Claim, GeoPoint, OwnerStats, TerritoryConfig, TerritoryEngine,
    TerritoryError,
};

/// Run evaluation result for the mobile client.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRunResult {
    pub run_id: String,
    pub user_id: String,
    pub valid: bool,
    /// One of "too-short-distance", "too-short-duration", "too-few-points",
    /// "speed-anomaly", "not-a-loop"
    pub invalid_reason: Option<String>,
    pub distance_m: f64,
    pub duration_s: f64,
    /// Simplified outline for drawing the run
    pub simplified: Vec<GeoPoint>,
    pub cell_ids: Vec<String>,
}

/// Ownership record as stored by the client.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiClaim {
    pub cell_id: String,
    pub owner_id: String,
    pub source_run_id: String,
    pub claimed_at: i64,
    pub source_distance_m: f64,
}

/// Renderable region.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRegion {
    pub owner_id: String,
    pub cell_ids: Vec<String>,
    pub boundary: Vec<GeoPoint>,
}

impl TryFrom<FfiClaim> for Claim {
    type Error = TerritoryError;

    fn try_from(claim: FfiClaim) -> Result<Self, Self::Error> {
        Ok(Claim {
            cell_id: claim.cell_id.parse()?,
            owner_id: claim.owner_id,
            source_run_id: claim.source_run_id,
            claimed_at: claim.claimed_at,
            source_distance_m: claim.source_distance_m,
        })
    }
}

impl From<Claim> for FfiClaim {
    fn from(claim: Claim) -> Self {
        FfiClaim {
            cell_id: claim.cell_id.to_string(),
            owner_id: claim.owner_id,
            source_run_id: claim.source_run_id,
            claimed_at: claim.claimed_at,
            source_distance_m: claim.source_distance_m,
        }
    }
}

fn parse_claims(claims: Vec<FfiClaim>) -> Result<Vec<Claim>, TerritoryError> {
    claims.into_iter().map(Claim::try_from).collect()
}

/// Get default configuration.
#[uniffi::export]
pub fn default_territory_config() -> TerritoryConfig {
    init_logging();
    info!("[TerritoryEngineRust] default_territory_config called");
    TerritoryConfig::default()
}

/// Cell id for a coordinate.
#[uniffi::export]
pub fn ffi_coordinate_to_cell(latitude: f64, longitude: f64, resolution: u8) -> String {
    crate::HexGrid::new()
        .coordinate_to_cell(&GeoPoint::new(latitude, longitude), resolution)
        .to_string()
}

/// Hexagon outline for a cell id.
#[uniffi::export]
pub fn ffi_cell_boundary(cell_id: String) -> Result<Vec<GeoPoint>, TerritoryError> {
    let cell: CellId = cell_id.parse()?;
    Ok(crate::HexGrid::new().cell_boundary(&cell).to_vec())
}

/// Filter, simplify and validate a finished run.
#[uniffi::export]
pub fn ffi_evaluate_run(
    run_id: String,
    user_id: String,
    points: Vec<GeoPoint>,
    config: TerritoryConfig,
) -> Result<FfiRunResult, TerritoryError> {
    init_logging();
    info!(
        "[TerritoryEngineRust] evaluate_run {} for {} with {} points",
        run_id,
        user_id,
        points.len()
    );

    let start = std::time::Instant::now();
    let engine = TerritoryEngine::new(config)?;
    let run = engine.evaluate_run(&run_id, &user_id, &points);

    info!(
        "[TerritoryEngineRust] run {}: {:?}, {} cells in {:?}",
        run.id,
        run.verdict,
        run.claimed_cells.len(),
        start.elapsed()
    );

    Ok(FfiRunResult {
        run_id: run.id,
        user_id: run.user_id,
        valid: run.verdict.is_valid(),
        invalid_reason: run.verdict.reason().map(|r| r.to_string()),
        distance_m: run.distance_m,
        duration_s: run.duration_s,
        simplified: run.simplified,
        cell_ids: run.claimed_cells.iter().map(|c| c.to_string()).collect(),
    })
}

/// Claim records for a valid run's cells, ready for the client's batch write.
#[uniffi::export]
pub fn ffi_claims_for_run(
    run: FfiRunResult,
    claimed_at: i64,
) -> Result<Vec<FfiClaim>, TerritoryError> {
    if !run.valid {
        return Ok(Vec::new());
    }

    run.cell_ids
        .into_iter()
        .map(|cell_id| {
            let cell: CellId = cell_id.parse()?;
            Ok(FfiClaim::from(Claim {
                cell_id: cell,
                owner_id: run.user_id.clone(),
                source_run_id: run.run_id.clone(),
                claimed_at,
                source_distance_m: run.distance_m,
            }))
        })
        .collect()
}

/// Group the client's ledger into renderable regions.
#[uniffi::export]
pub fn ffi_group_territories(
    claims: Vec<FfiClaim>,
    config: TerritoryConfig,
) -> Result<Vec<FfiRegion>, TerritoryError> {
    init_logging();
    info!("[TerritoryEngineRust] group_territories called with {} claims", claims.len());

    let start = std::time::Instant::now();
    let engine = TerritoryEngine::new(config)?;
    let ledger = parse_claims(claims)?;
    let regions = engine.regions(&ledger);

    debug!(
        "[TerritoryEngineRust] grouped into {} regions in {:?}",
        regions.len(),
        start.elapsed()
    );

    Ok(regions
        .into_iter()
        .map(|r| FfiRegion {
            owner_id: r.owner_id,
            cell_ids: r.cells.iter().map(|c| c.to_string()).collect(),
            boundary: r.boundary,
        })
        .collect())
}

/// Per-owner totals for the client's ledger.
#[uniffi::export]
pub fn ffi_owner_stats(
    claims: Vec<FfiClaim>,
    config: TerritoryConfig,
) -> Result<Vec<OwnerStats>, TerritoryError> {
    init_logging();
    let engine = TerritoryEngine::new(config)?;
    let ledger = parse_claims(claims)?;
    Ok(engine.owner_stats(&ledger))
}
