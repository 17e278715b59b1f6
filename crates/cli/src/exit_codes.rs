//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract — scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain      | Description                                   |
//! |---------|-------------|-----------------------------------------------|
//! | 0       | Universal   | Success                                       |
//! | 1       | Universal   | General error (unspecified)                   |
//! | 2       | Universal   | CLI usage error (bad args, missing file)      |
//! | 3-9     | enrich      | Configuration, lookup store and workbook I/O  |
//! | 10-19   | batch       | Batch commands that finished with failures    |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use lossgrid_enrich::EnrichError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Enrich (3-9)
// =============================================================================

/// Config file unreadable, malformed, or failing validation.
pub const EXIT_CONFIG: u8 = 3;

/// Loss-record database could not be opened or queried.
pub const EXIT_LOOKUP: u8 = 4;

/// Workbook could not be read.
pub const EXIT_READ: u8 = 5;

/// Workbook could not be written.
pub const EXIT_WRITE: u8 = 6;

// =============================================================================
// Batch (10-19)
// =============================================================================

/// `enrich` finished, but at least one file failed.
pub const EXIT_BATCH_FAILURES: u8 = 10;

/// `import-loss` finished, but at least one file failed.
pub const EXIT_IMPORT_FAILURES: u8 = 11;

/// `convert` finished, but at least one file failed.
pub const EXIT_CONVERT_FAILURES: u8 = 12;

/// Map an enrichment error to its exit code.
pub fn enrich_exit_code(err: &EnrichError) -> u8 {
    match err {
        EnrichError::ConfigParse(_) | EnrichError::ConfigValidation(_) => EXIT_CONFIG,
        EnrichError::Lookup(_) => EXIT_LOOKUP,
        EnrichError::UnreadableFile { .. } | EnrichError::Import { .. } => EXIT_READ,
        EnrichError::UnwritableOutput { .. } => EXIT_WRITE,
        EnrichError::MissingRequiredColumn { .. }
        | EnrichError::NonNumericSource { .. }
        | EnrichError::OverlappingMergeRequest { .. } => EXIT_ERROR,
    }
}
