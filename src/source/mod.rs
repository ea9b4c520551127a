//! Data-source seam: how watched regions are fetched.
//!
//! The monitoring core only ever talks to [`SheetSource`]; the concrete
//! transport behind a table's `reference` is pluggable. [`WorkbookSource`]
//! resolves references as local workbook files.

pub mod workbook;

pub use workbook::WorkbookSource;

use crate::error::SourceError;
use crate::monitor::types::{Region, Snapshot};

/// Read-only access to tabular data.
///
/// `reference` is an opaque identifier the source knows how to resolve.
/// Implementations may block; callers run fetches on the blocking pool
/// and bound them with the configured timeout.
pub trait SheetSource: Send + Sync {
    /// Fetch the current content of one watched region.
    fn fetch(
        &self,
        reference: &str,
        worksheet_index: u32,
        region: &Region,
    ) -> Result<Snapshot, SourceError>;

    /// Reachability probe, run before a table is admitted to the
    /// registry.
    fn reachable(&self, reference: &str) -> Result<(), SourceError>;
}
