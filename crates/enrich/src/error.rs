use std::fmt;
use std::path::PathBuf;

use lossgrid_engine::sheet::MergedRegion;

#[derive(Debug)]
pub enum EnrichError {
    /// A required header is absent from every candidate header row.
    MissingRequiredColumn { sheet: String, column: String, header_rows: Vec<usize> },
    /// The area cell of a data row does not hold a number.
    NonNumericSource { sheet: String, cell: String, value: String },
    /// A layout merge would intersect a merge already on the sheet.
    OverlappingMergeRequest { sheet: String, requested: MergedRegion, existing: MergedRegion },
    /// Workbook could not be opened or parsed.
    UnreadableFile { path: PathBuf, message: String },
    /// Workbook could not be written.
    UnwritableOutput { path: PathBuf, message: String },
    /// Loss-record store failure.
    Lookup(String),
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error.
    ConfigValidation(String),
    /// Loss-record workbook could not be imported.
    Import { path: PathBuf, message: String },
}

impl EnrichError {
    /// Per-row and per-merge conditions that are reported but never stop a file.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Self::MissingRequiredColumn { .. } | Self::NonNumericSource { .. } | Self::OverlappingMergeRequest { .. }
        )
    }

    /// Stable snake_case name, used in JSON reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingRequiredColumn { .. } => "missing_required_column",
            Self::NonNumericSource { .. } => "non_numeric_source",
            Self::OverlappingMergeRequest { .. } => "overlapping_merge_request",
            Self::UnreadableFile { .. } => "unreadable_file",
            Self::UnwritableOutput { .. } => "unwritable_output",
            Self::Lookup(_) => "lookup",
            Self::ConfigParse(_) => "config_parse",
            Self::ConfigValidation(_) => "config_validation",
            Self::Import { .. } => "import",
        }
    }
}

impl fmt::Display for EnrichError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRequiredColumn { sheet, column, header_rows } => {
                let rows: Vec<String> = header_rows.iter().map(|r| r.to_string()).collect();
                write!(
                    f,
                    "sheet '{sheet}': column '{column}' not found in header rows {}",
                    rows.join(",")
                )
            }
            Self::NonNumericSource { sheet, cell, value } => {
                write!(f, "sheet '{sheet}', cell {cell}: area value '{value}' is not numeric")
            }
            Self::OverlappingMergeRequest { sheet, requested, existing } => {
                write!(f, "sheet '{sheet}': skipped merge {requested}, overlaps existing merge {existing}")
            }
            Self::UnreadableFile { path, message } => {
                write!(f, "cannot read {}: {message}", path.display())
            }
            Self::UnwritableOutput { path, message } => {
                write!(f, "cannot write {}: {message}", path.display())
            }
            Self::Lookup(msg) => write!(f, "loss-record lookup failed: {msg}"),
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::Import { path, message } => {
                write!(f, "cannot import loss records from {}: {message}", path.display())
            }
        }
    }
}

impl std::error::Error for EnrichError {}

impl From<rusqlite::Error> for EnrichError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Lookup(e.to_string())
    }
}
