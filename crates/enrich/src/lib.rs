//! Claim-workbook enrichment.
//!
//! Locates the area and insured-person columns of a per-village claim
//! report (multi-row, possibly merged headers), appends the derived amount
//! and loss-degree columns, joins each row against the village's loss
//! records and re-applies the report layout.

pub mod config;
pub mod enricher;
pub mod error;
pub mod header;
pub mod layout;
pub mod lookup;
pub mod loss_import;
pub mod merge_index;
pub mod pipeline;
pub mod provision;
pub mod sqlite_store;
pub mod village;

pub use config::{EnrichConfig, LayoutConfig, LookupConfig};
pub use error::EnrichError;
pub use lookup::{LossRecord, LossStore, MemoryLossStore};
pub use pipeline::{flatten_file, process_batch, process_file, BatchSummary, FileReport, SheetReport};
pub use sqlite_store::SqliteLossStore;
