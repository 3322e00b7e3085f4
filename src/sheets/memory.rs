//! In-memory record store for dry runs and tests.

use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;

use crate::sheets::address::CellAddress;
use crate::sheets::error::{StoreError, StoreResult};
use crate::sheets::{RecordStore, StoreFuture};

/// Thread-safe store holding seeded ranges and every written cell.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    ranges: DashMap<(String, String), Vec<Vec<String>>>,
    cells: DashMap<(String, String), String>,
    fail_reads: AtomicBool,
    failing_cells: DashMap<(String, String), ()>,
}

impl InMemoryRecordStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the rows returned for `range`.
    #[must_use]
    pub fn with_range(self, sheet_id: &str, range: &str, rows: Vec<Vec<String>>) -> Self {
        self.ranges
            .insert((sheet_id.to_string(), range.to_string()), rows);
        self
    }

    /// Make every read fail.
    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    /// Make writes to `address` fail.
    pub fn fail_writes_to(&self, sheet_id: &str, address: &CellAddress) {
        self.failing_cells
            .insert((sheet_id.to_string(), address.to_string()), ());
    }

    /// Value written to `address`, if any.
    #[must_use]
    pub fn cell(&self, sheet_id: &str, address: &CellAddress) -> Option<String> {
        self.cells
            .get(&(sheet_id.to_string(), address.to_string()))
            .map(|entry| entry.value().clone())
    }

    /// Number of cells written so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.cells.len()
    }

    /// All written cells as `(address, value)`, sorted by address.
    #[must_use]
    pub fn written_cells(&self) -> Vec<(String, String)> {
        let mut cells: Vec<(String, String)> = self
            .cells
            .iter()
            .map(|entry| (entry.key().1.clone(), entry.value().clone()))
            .collect();
        cells.sort();
        cells
    }
}

impl RecordStore for InMemoryRecordStore {
    fn read_range(&self, sheet_id: &str, range: &str) -> StoreFuture<'_, StoreResult<Vec<Vec<String>>>> {
        let key = (sheet_id.to_string(), range.to_string());
        Box::pin(async move {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(StoreError::Api {
                    status: 503,
                    message: format!("read of {} unavailable", key.1),
                });
            }
            Ok(self
                .ranges
                .get(&key)
                .map(|entry| entry.value().clone())
                .unwrap_or_default())
        })
    }

    fn write_cell(
        &self,
        sheet_id: &str,
        address: &CellAddress,
        value: &str,
    ) -> StoreFuture<'_, StoreResult<()>> {
        let key = (sheet_id.to_string(), address.to_string());
        let value = value.to_string();
        Box::pin(async move {
            if self.failing_cells.contains_key(&key) {
                return Err(StoreError::Api {
                    status: 500,
                    message: format!("write to {} rejected", key.1),
                });
            }
            self.cells.insert(key, value);
            Ok(())
        })
    }
}
