//! Ownership ledger contract.
//!
//! The engine needs only two operations from persistence: read one cell's
//! claim and write a batch of claims. Each claim in a batch is an independent
//! upsert; the last write for a cell wins and there is no merge. Taking a cell
//! from another owner is just writing a newer claim for it.
//!
//! Implementations must make a batch visible as a unit (all of a run's cells
//! or none of them) and own any retry policy. The engine calls `set_batch`
//! once per run and propagates its error untouched.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::error::StoreError;
use crate::{CellId, Claim};

/// Abstract ownership ledger keyed by cell id.
pub trait TerritoryStore: Send + Sync {
    /// Current claim for a cell, if any.
    fn get(&self, cell: &CellId) -> Option<Claim>;

    /// Upsert every claim in the batch atomically.
    fn set_batch(&self, claims: &[Claim]) -> Result<(), StoreError>;
}

/// Process-local ledger, mostly for tests and offline clients.
///
/// A batch is applied under a single write lock, so concurrent readers see
/// either none or all of it.
#[derive(Debug, Default)]
pub struct InMemoryTerritoryStore {
    claims: RwLock<HashMap<CellId, Claim>>,
}

impl InMemoryTerritoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of claimed cells.
    pub fn len(&self) -> usize {
        self.claims.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stable copy of the whole ledger, sorted by cell id.
    ///
    /// Group against this copy rather than the live store when the result
    /// must be consistent.
    pub fn snapshot(&self) -> Vec<Claim> {
        let guard = self.claims.read().unwrap_or_else(PoisonError::into_inner);
        let mut claims: Vec<Claim> = guard.values().cloned().collect();
        claims.sort_by(|a, b| a.cell_id.cmp(&b.cell_id));
        claims
    }
}

impl TerritoryStore for InMemoryTerritoryStore {
    fn get(&self, cell: &CellId) -> Option<Claim> {
        self.claims
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(cell)
            .cloned()
    }

    fn set_batch(&self, claims: &[Claim]) -> Result<(), StoreError> {
        let mut guard = self.claims.write().unwrap_or_else(PoisonError::into_inner);
        for claim in claims {
            guard.insert(claim.cell_id, claim.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claim(row: i64, owner: &str, run: &str) -> Claim {
        Claim {
            cell_id: CellId::new(9, row, 0),
            owner_id: owner.to_string(),
            source_run_id: run.to_string(),
            claimed_at: 1_700_000_000,
            source_distance_m: 1_000.0,
        }
    }

    #[test]
    fn test_empty_store() {
        let store = InMemoryTerritoryStore::new();
        assert!(store.is_empty());
        assert!(store.get(&CellId::new(9, 0, 0)).is_none());
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_last_writer_wins() {
        let store = InMemoryTerritoryStore::new();
        store.set_batch(&[claim(1, "alice", "r1"), claim(2, "alice", "r1")]).unwrap();
        store.set_batch(&[claim(2, "bob", "r2")]).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&CellId::new(9, 1, 0)).unwrap().owner_id, "alice");
        let taken = store.get(&CellId::new(9, 2, 0)).unwrap();
        assert_eq!(taken.owner_id, "bob");
        assert_eq!(taken.source_run_id, "r2");
    }

    #[test]
    fn test_duplicate_cell_within_batch() {
        let store = InMemoryTerritoryStore::new();
        store.set_batch(&[claim(1, "alice", "r1"), claim(1, "bob", "r1")]).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&CellId::new(9, 1, 0)).unwrap().owner_id, "bob");
    }

    #[test]
    fn test_snapshot_sorted() {
        let store = InMemoryTerritoryStore::new();
        store.set_batch(&[claim(5, "a", "r"), claim(-2, "a", "r"), claim(3, "a", "r")]).unwrap();
        let rows: Vec<i64> = store.snapshot().iter().map(|c| c.cell_id.row).collect();
        assert_eq!(rows, vec![-2, 3, 5]);
    }
}
