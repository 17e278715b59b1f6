//! Batch conversion of legacy `.xls` workbooks to `.xlsx`.
//!
//! Each `foo.xls` found under the root is written to a sibling `foo.xlsx`.
//! Conversion goes through the workbook model, so values, formulas and
//! merged regions carry over; legacy cell styling does not.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::xlsx;

/// Outcome of a conversion sweep
#[derive(Debug, Default)]
pub struct ConvertSummary {
    /// Newly written `.xlsx` files
    pub converted: Vec<PathBuf>,
    /// `.xls` files whose `.xlsx` sibling already existed
    pub skipped: Vec<PathBuf>,
    /// Files that failed, with the reason
    pub errors: Vec<(PathBuf, String)>,
}

impl ConvertSummary {
    pub fn summary(&self) -> String {
        format!(
            "{} converted, {} skipped, {} failed",
            self.converted.len(),
            self.skipped.len(),
            self.errors.len()
        )
    }
}

/// True for `.xls` files that are not Office lock files (`~$name.xls`).
pub fn is_legacy_workbook(path: &Path) -> bool {
    let is_xls = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xls"));
    let is_lock = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("~$"));
    is_xls && !is_lock
}

/// Convert a single `.xls` file to `output`.
pub fn convert_file(input: &Path, output: &Path) -> Result<xlsx::ExportResult, String> {
    let (workbook, import_result) = xlsx::import(input)?;
    for warning in &import_result.warnings {
        log::warn!("{}: {}", input.display(), warning);
    }
    xlsx::export(&workbook, output)
}

/// Walk `root` recursively and convert every `.xls` to a sibling `.xlsx`.
/// Files whose target already exists are skipped; per-file failures are
/// collected and do not stop the sweep.
pub fn convert_xls_tree(root: &Path) -> ConvertSummary {
    let mut summary = ConvertSummary::default();

    let mut sources: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("skipping unreadable entry under {}: {}", root.display(), e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_legacy_workbook(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    sources.sort();

    for source in sources {
        let target = source.with_extension("xlsx");
        if target.exists() {
            log::info!("skip {} (target exists)", source.display());
            summary.skipped.push(source);
            continue;
        }
        match convert_file(&source, &target) {
            Ok(_) => {
                log::info!("converted {} -> {}", source.display(), target.display());
                summary.converted.push(target);
            }
            Err(e) => {
                log::error!("failed to convert {}: {}", source.display(), e);
                summary.errors.push((source, e));
            }
        }
    }

    summary
}
