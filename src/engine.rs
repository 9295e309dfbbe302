//! End-to-end claim flow.
//!
//! ```text
//! raw trace -> PathProcessor -> RunValidator -> HexGrid::polygon_to_cells
//!           -> TerritoryStore::set_batch
//! ledger snapshot -> TerritoryGrouper (on read, independent of claiming)
//! ```
//!
//! The engine is synchronous and holds no mutable state. Callers serialize
//! runs, fetch a stable ledger copy before grouping, and simply never call
//! [`TerritoryEngine::claim_run`] for an abandoned run.

use std::collections::HashSet;

use log::{debug, info};

use crate::error::{Result, StoreError};
use crate::grouping::{OwnerStats, TerritoryGrouper};
use crate::path::PathProcessor;
use crate::store::TerritoryStore;
use crate::validation::RunValidator;
use crate::{CellId, Claim, GeoPoint, HexGrid, Region, Run, TerritoryConfig};

/// What a claim write did to the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClaimSummary {
    pub run_id: String,
    /// Cells written in the batch
    pub cells_claimed: usize,
    /// Previously unowned cells
    pub cells_new: usize,
    /// Cells taken from another owner
    pub cells_captured: usize,
    /// Cells the runner already owned
    pub cells_renewed: usize,
}

/// Composes the grid, processor, validator and grouper for one configuration.
#[derive(Debug, Clone)]
pub struct TerritoryEngine {
    config: TerritoryConfig,
    grid: HexGrid,
    processor: PathProcessor,
    validator: RunValidator,
    grouper: TerritoryGrouper,
}

impl TerritoryEngine {
    /// Build an engine, rejecting unusable configuration.
    pub fn new(config: TerritoryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            grid: HexGrid::new(),
            processor: PathProcessor::new(&config),
            validator: RunValidator::new(&config),
            grouper: TerritoryGrouper::new(&config),
            config,
        })
    }

    pub fn config(&self) -> &TerritoryConfig {
        &self.config
    }

    pub fn grid(&self) -> &HexGrid {
        &self.grid
    }

    pub fn grouper(&self) -> &TerritoryGrouper {
        &self.grouper
    }

    /// Filter, simplify and validate a raw trace, producing an immutable run.
    ///
    /// Valid runs carry the cells they cover; invalid runs carry none.
    pub fn evaluate_run(&self, run_id: &str, user_id: &str, raw: &[GeoPoint]) -> Run {
        let processed = self.processor.process(raw);
        let metrics = self.validator.measure(&processed.filtered);
        let verdict = self.validator.check(&metrics);

        let claimed_cells = if verdict.is_valid() {
            self.cells_for_trace(&processed.simplified, &processed.filtered)
        } else {
            Vec::new()
        };

        debug!(
            "Run {} for {}: {:?}, {:.0}m, {} cells",
            run_id,
            user_id,
            verdict,
            metrics.distance_m,
            claimed_cells.len()
        );

        Run {
            id: run_id.to_string(),
            user_id: user_id.to_string(),
            trace: processed.filtered,
            simplified: processed.simplified,
            distance_m: metrics.distance_m,
            duration_s: metrics.duration_s,
            verdict,
            claimed_cells,
        }
    }

    fn cells_for_trace(&self, simplified: &[GeoPoint], filtered: &[GeoPoint]) -> Vec<CellId> {
        let resolution = self.config.resolution;
        let mut cells: HashSet<CellId> = self.grid.polygon_to_cells(simplified, resolution);
        if self.config.claim_path_corridor {
            cells.extend(self.grid.path_to_cells(filtered, resolution));
        }

        let mut cells: Vec<CellId> = cells.into_iter().collect();
        cells.sort();
        cells
    }

    /// Claim records for a run; empty when the run is invalid.
    pub fn claims_for_run(&self, run: &Run, claimed_at: i64) -> Vec<Claim> {
        if !run.verdict.is_valid() {
            return Vec::new();
        }

        run.claimed_cells
            .iter()
            .map(|cell| Claim {
                cell_id: *cell,
                owner_id: run.user_id.clone(),
                source_run_id: run.id.clone(),
                claimed_at,
                source_distance_m: run.distance_m,
            })
            .collect()
    }

    /// Write a run's claims to the store as one batch.
    ///
    /// Existing owners are overwritten without any check: the most recent
    /// valid run over a cell always wins. Invalid runs write nothing. Store
    /// errors are returned as-is and never retried.
    pub fn claim_run<S: TerritoryStore + ?Sized>(
        &self,
        store: &S,
        run: &Run,
        claimed_at: i64,
    ) -> std::result::Result<ClaimSummary, StoreError> {
        let claims = self.claims_for_run(run, claimed_at);
        let mut summary = ClaimSummary {
            run_id: run.id.clone(),
            ..Default::default()
        };
        if claims.is_empty() {
            return Ok(summary);
        }

        for claim in &claims {
            match store.get(&claim.cell_id) {
                None => summary.cells_new += 1,
                Some(previous) if previous.owner_id == claim.owner_id => summary.cells_renewed += 1,
                Some(_) => summary.cells_captured += 1,
            }
        }

        store.set_batch(&claims)?;
        summary.cells_claimed = claims.len();

        info!(
            "Run {} claimed {} cells for {} ({} new, {} captured, {} renewed)",
            run.id,
            summary.cells_claimed,
            run.user_id,
            summary.cells_new,
            summary.cells_captured,
            summary.cells_renewed
        );

        Ok(summary)
    }

    /// Group a fetched ledger snapshot into regions.
    pub fn regions(&self, ledger: &[Claim]) -> Vec<Region> {
        #[cfg(feature = "parallel")]
        let regions = self.grouper.group_parallel(ledger);

        #[cfg(not(feature = "parallel"))]
        let regions = self.grouper.group(ledger);

        regions
    }

    /// Per-owner totals for a ledger snapshot.
    pub fn owner_stats(&self, ledger: &[Claim]) -> Vec<OwnerStats> {
        self.grouper.owner_stats(&self.regions(ledger))
    }
}
