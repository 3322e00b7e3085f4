//! Tabular record store.
//!
//! The pipeline only needs two operations from the spreadsheet: read a range
//! as a matrix of strings, and write one cell. Everything else about the
//! backing service stays behind `RecordStore`.

pub mod address;
pub mod auth;
pub mod error;
pub mod google;
pub mod memory;

pub use address::{CellAddress, Column, DATA_ROW_OFFSET};
pub use error::{StoreError, StoreResult};
pub use google::GoogleSheetsStore;
pub use memory::InMemoryRecordStore;

use std::future::Future;
use std::pin::Pin;

/// Boxed future type for record store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Record store trait.
pub trait RecordStore: Send + Sync {
    /// Read an A1 range as rows of cell strings. Trailing blank cells may be
    /// omitted from a row, and trailing blank rows from the matrix.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    fn read_range(&self, sheet_id: &str, range: &str) -> StoreFuture<'_, StoreResult<Vec<Vec<String>>>>;

    /// Overwrite a single cell with a raw string value.
    ///
    /// # Errors
    /// Returns an error if the write is rejected.
    fn write_cell(
        &self,
        sheet_id: &str,
        address: &CellAddress,
        value: &str,
    ) -> StoreFuture<'_, StoreResult<()>>;
}
