//! Per-file and batch enrichment.
//!
//! `process_file` runs one workbook through header resolution, column
//! provisioning, the row loop and the layout pass. `process_batch` walks a
//! directory tree and keeps going when a file fails.

use std::path::{Path, PathBuf};

use lossgrid_engine::sheet::Sheet;
use walkdir::WalkDir;

use crate::config::EnrichConfig;
use crate::enricher::{enrich_sheet, EnrichColumns, EnrichParams, EnrichStats};
use crate::error::EnrichError;
use crate::header::{normalize_header, resolve_headers};
use crate::layout::{apply_layout, flatten_merges};
use crate::lookup::{LossRecord, LossStore};
use crate::provision::ensure_column;
use crate::village::village_from_path;

/// What happened to one sheet.
#[derive(Debug, Clone, Default)]
pub struct SheetReport {
    pub sheet: String,
    /// `None` when a required column was missing and the sheet was skipped.
    pub columns: Option<EnrichColumns>,
    /// Derived columns appended to the sheet in this run.
    pub created_columns: Vec<String>,
    pub data_start_row: usize,
    pub stats: EnrichStats,
}

impl SheetReport {
    pub fn enriched(&self) -> bool {
        self.columns.is_some()
    }
}

/// What happened to one input file.
#[derive(Debug)]
pub struct FileReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub village: Option<String>,
    pub records: usize,
    pub sheets: Vec<SheetReport>,
    /// Recoverable conditions: missing columns, non-numeric areas, skipped merges.
    pub warnings: Vec<EnrichError>,
    /// False when no sheet could be enriched; the output is then not written.
    pub written: bool,
}

impl FileReport {
    pub fn sheets_enriched(&self) -> usize {
        self.sheets.iter().filter(|s| s.enriched()).count()
    }

    pub fn summary(&self) -> String {
        let rows: usize = self.sheets.iter().map(|s| s.stats.rows_processed).sum();
        let exact: usize = self.sheets.iter().map(|s| s.stats.exact_matches).sum();
        format!(
            "{}/{} sheets enriched · {} rows · {} exact matches · {} warnings",
            self.sheets_enriched(),
            self.sheets.len(),
            rows,
            exact,
            self.warnings.len()
        )
    }
}

/// Reports of a whole batch; a failing file ends up in `failures`.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub reports: Vec<FileReport>,
    pub failures: Vec<(PathBuf, EnrichError)>,
}

impl BatchSummary {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn warning_count(&self) -> usize {
        self.reports.iter().map(|r| r.warnings.len()).sum()
    }

    pub fn summary(&self) -> String {
        let written = self.reports.iter().filter(|r| r.written).count();
        format!(
            "{} files processed, {} written, {} failed, {} warnings",
            self.reports.len(),
            written,
            self.failures.len(),
            self.warning_count()
        )
    }
}

/// Enrich one sheet in place.
///
/// A sheet missing the area or person column is left untouched and reported
/// through `warnings`. Warnings are collected, not logged; `process_file`
/// logs them against the workbook path.
pub fn process_sheet(
    sheet: &mut Sheet,
    config: &EnrichConfig,
    params: &EnrichParams,
    records: &[LossRecord],
    warnings: &mut Vec<EnrichError>,
) -> SheetReport {
    let mut report = SheetReport { sheet: sheet.name.clone(), ..Default::default() };

    let [area_name, person_name, amount_name, loss_name] = config.target_headers();
    let mut targets = vec![area_name.clone(), person_name.clone(), amount_name.clone(), loss_name.clone()];
    let wide_name = config.layout.wide_column.as_deref().map(normalize_header);
    if let Some(wide) = &wide_name {
        targets.push(wide.clone());
    }

    let mut index = resolve_headers(sheet, &config.header_rows, &targets);

    let (Some(area), Some(person)) = (index.column(&area_name), index.column(&person_name)) else {
        for name in [&area_name, &person_name] {
            if index.contains(name) {
                continue;
            }
            let warning = EnrichError::MissingRequiredColumn {
                sheet: sheet.name.clone(),
                column: name.clone(),
                header_rows: config.header_rows.clone(),
            };
            warnings.push(warning);
        }
        return report;
    };

    let amount = ensure_column(sheet, &mut index, &amount_name, &area_name);
    let loss = ensure_column(sheet, &mut index, &loss_name, &area_name);
    for (created, name) in [(amount.created, &amount_name), (loss.created, &loss_name)] {
        if created {
            report.created_columns.push(name.clone());
        }
    }

    let columns = EnrichColumns { area, person, amount: amount.column, loss: loss.column };
    report.data_start_row = index.data_start_row();
    report.stats = enrich_sheet(sheet, columns, report.data_start_row, records, params, warnings);
    report.columns = Some(columns);

    let wide_column = wide_name.as_deref().and_then(|name| index.column(name));
    apply_layout(sheet, index.band(), wide_column, &config.layout, warnings);

    log::info!(
        "sheet '{}': {} rows, {} amounts, {} exact / {} fallback / {} unmatched",
        report.sheet,
        report.stats.rows_processed,
        report.stats.amounts_written,
        report.stats.exact_matches,
        report.stats.fallback_matches,
        report.stats.unmatched
    );
    report
}

/// Enrich one workbook and write it to `output` (which may equal `input`).
///
/// Loss records are fetched once for the village named by the file. Store,
/// read and write failures are errors; everything else is a warning in the
/// report.
pub fn process_file(
    input: &Path,
    output: &Path,
    config: &EnrichConfig,
    store: &dyn LossStore,
) -> Result<FileReport, EnrichError> {
    let params = EnrichParams {
        factor: config.factor,
        error_marker: config.error_marker.clone(),
        highlight: config.highlight_rgb()?,
    };

    let village = village_from_path(input, &config.village_suffixes);
    let records = match &village {
        Some(name) => store.find_by_village(name)?,
        None => {
            log::warn!("{}: no village name in file name, loss degree left empty", input.display());
            Vec::new()
        }
    };
    log::info!(
        "{}: village {}, {} loss records",
        input.display(),
        village.as_deref().unwrap_or("-"),
        records.len()
    );

    let (mut workbook, import) = lossgrid_io::xlsx::import(input)
        .map_err(|message| EnrichError::UnreadableFile { path: input.to_path_buf(), message })?;
    for warning in &import.warnings {
        log::warn!("{}: {}", input.display(), warning);
    }

    let mut report = FileReport {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        village,
        records: records.len(),
        sheets: Vec::new(),
        warnings: Vec::new(),
        written: false,
    };

    for sheet in workbook.sheets_mut() {
        let sheet_report = process_sheet(sheet, config, &params, &records, &mut report.warnings);
        report.sheets.push(sheet_report);
    }
    for warning in &report.warnings {
        log::warn!("{}: {}", input.display(), warning);
    }

    if report.sheets_enriched() == 0 {
        log::warn!("{}: no sheet enriched, output not written", input.display());
        return Ok(report);
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| EnrichError::UnwritableOutput {
            path: output.to_path_buf(),
            message: e.to_string(),
        })?;
    }
    lossgrid_io::xlsx::export(&workbook, output)
        .map_err(|message| EnrichError::UnwritableOutput { path: output.to_path_buf(), message })?;
    report.written = true;

    log::info!("{} → {}: {}", input.display(), output.display(), report.summary());
    Ok(report)
}

fn is_lock_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("~$"))
}

/// `.xlsx` files under `input_dir`, sorted. Office lock files and anything
/// under `exclude` (an output directory nested in the input) are skipped.
pub fn collect_inputs(input_dir: &Path, exclude: Option<&Path>) -> Vec<PathBuf> {
    let excluded = exclude.and_then(|p| p.canonicalize().ok());
    let mut files: Vec<PathBuf> = WalkDir::new(input_dir)
        .into_iter()
        .filter_entry(|entry| {
            if !entry.file_type().is_dir() {
                return true;
            }
            match (&excluded, entry.path().canonicalize()) {
                (Some(skip), Ok(path)) => &path != skip,
                _ => true,
            }
        })
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            let is_xlsx = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"));
            is_xlsx && !is_lock_file(path)
        })
        .collect();
    files.sort();
    files
}

/// Where `input` is written: mirrored under `output_dir`, or in place.
pub fn output_path_for(input: &Path, input_dir: &Path, output_dir: Option<&Path>) -> PathBuf {
    match output_dir {
        Some(out) => match input.strip_prefix(input_dir) {
            Ok(relative) => out.join(relative),
            Err(_) => out.join(input.file_name().unwrap_or(input.as_os_str())),
        },
        None => input.to_path_buf(),
    }
}

/// Enrich every workbook under `input_dir`.
pub fn process_batch(
    input_dir: &Path,
    output_dir: Option<&Path>,
    config: &EnrichConfig,
    store: &dyn LossStore,
) -> BatchSummary {
    let mut summary = BatchSummary::default();
    let inputs = collect_inputs(input_dir, output_dir);
    log::info!("{}: {} workbooks to process", input_dir.display(), inputs.len());

    for input in inputs {
        let output = output_path_for(&input, input_dir, output_dir);
        match process_file(&input, &output, config, store) {
            Ok(report) => summary.reports.push(report),
            Err(e) => {
                log::warn!("{}: {}", input.display(), e);
                summary.failures.push((input, e));
            }
        }
    }

    log::info!("{}", summary.summary());
    summary
}

/// Unmerge-and-flatten every sheet of `input` into `output`. Returns the
/// number of merged regions removed.
pub fn flatten_file(input: &Path, output: &Path) -> Result<usize, EnrichError> {
    let (mut workbook, _) = lossgrid_io::xlsx::import(input)
        .map_err(|message| EnrichError::UnreadableFile { path: input.to_path_buf(), message })?;

    let flattened: usize = workbook.sheets_mut().iter_mut().map(flatten_merges).sum();

    lossgrid_io::xlsx::export(&workbook, output)
        .map_err(|message| EnrichError::UnwritableOutput { path: output.to_path_buf(), message })?;
    log::info!("{} → {}: {} merged regions flattened", input.display(), output.display(), flattened);
    Ok(flattened)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::MemoryLossStore;
    use lossgrid_engine::cell::CellValue;
    use lossgrid_engine::sheet::MergedRegion;

    fn params() -> EnrichParams {
        EnrichParams { factor: 23.0, error_marker: "数据错误".into(), highlight: [255, 255, 0] }
    }

    fn claim_sheet() -> Sheet {
        let mut sheet = Sheet::new("Sheet1");
        sheet.set_value(1, 1, "张庄村小麦种植险理赔公示");
        sheet.set_value(4, 1, "投保单位：张庄村");
        for (col, label) in ["序号", "被保险人", "身份证号", "投保面积"].iter().enumerate() {
            sheet.set_value(5, col + 1, *label);
            sheet.add_merge(MergedRegion::new(5, col + 1, 6, col + 1)).unwrap();
        }
        sheet.set_value(7, 1, 1.0);
        sheet.set_value(7, 2, "A");
        sheet.set_value(7, 3, "410000199001011234");
        sheet.set_value(7, 4, 2.0);
        sheet.set_value(8, 1, 2.0);
        sheet.set_value(8, 2, "C");
        sheet.set_value(8, 4, "两亩");
        sheet
    }

    fn records() -> Vec<LossRecord> {
        vec![
            LossRecord::new("张庄村", Some("A"), Some(0.3), Some(0.25)),
            LossRecord::new("张庄村", Some("B"), Some(0.5), Some(0.45)),
        ]
    }

    #[test]
    fn test_process_sheet_end_to_end() {
        let mut sheet = claim_sheet();
        let mut warnings = Vec::new();
        let report = process_sheet(&mut sheet, &EnrichConfig::default(), &params(), &records(), &mut warnings);

        let columns = report.columns.unwrap();
        assert_eq!(columns, EnrichColumns { area: 4, person: 2, amount: 5, loss: 6 });
        assert_eq!(report.created_columns, vec!["赔偿款".to_string(), "损失程度".to_string()]);
        assert_eq!(report.data_start_row, 7);

        assert_eq!(sheet.value(5, 5), &CellValue::Text("赔偿款".into()));
        assert_eq!(sheet.merge_at(6, 5), Some(&MergedRegion::new(5, 5, 6, 5)));
        assert_eq!(sheet.value(7, 5), &CellValue::Number(46.0));
        assert_eq!(sheet.value(7, 6), &CellValue::Text("30.0%".into()));
        assert_eq!(sheet.value(8, 5), &CellValue::Text("数据错误".into()));
        assert_eq!(sheet.value(8, 6), &CellValue::Text("25.0%".into()));
        assert_eq!(sheet.format(7, 1).fill_color, Some([255, 255, 0]));
        assert_eq!(sheet.format(8, 1).fill_color, None);

        // Layout: title across all six columns, ID column widened
        assert_eq!(sheet.merge_at(1, 6), Some(&MergedRegion::new(1, 1, 3, 6)));
        assert_eq!(sheet.col_widths.get(&3), Some(&22.0));

        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind(), "non_numeric_source");
    }

    #[test]
    fn test_process_sheet_rerun_reuses_columns() {
        let mut sheet = claim_sheet();
        let config = EnrichConfig::default();
        let mut warnings = Vec::new();
        process_sheet(&mut sheet, &config, &params(), &records(), &mut warnings);
        let max_col = sheet.max_col();
        let merges = sheet.merged_regions().to_vec();

        let mut warnings = Vec::new();
        let report = process_sheet(&mut sheet, &config, &params(), &records(), &mut warnings);
        assert!(report.created_columns.is_empty());
        assert_eq!(sheet.max_col(), max_col);
        assert_eq!(sheet.merged_regions(), merges.as_slice());
        assert_eq!(sheet.value(7, 5), &CellValue::Number(46.0));
        assert!(warnings.iter().all(|w| w.kind() == "non_numeric_source"));
    }

    #[test]
    fn test_single_row_header_enriches_first_data_row() {
        let mut sheet = Sheet::new("Sheet1");
        sheet.set_value(5, 1, "被保险人");
        sheet.set_value(5, 2, "投保面积");
        sheet.set_value(6, 1, "A");
        sheet.set_value(6, 2, 2.0);
        sheet.set_value(7, 1, "B");
        sheet.set_value(7, 2, 1.5);
        let mut warnings = Vec::new();
        let report = process_sheet(&mut sheet, &EnrichConfig::default(), &params(), &records(), &mut warnings);

        assert_eq!(report.data_start_row, 6);
        assert_eq!(report.stats.rows_processed, 2);
        assert_eq!(sheet.value(5, 3), &CellValue::Text("赔偿款".into()));
        assert_eq!(sheet.value(6, 3), &CellValue::Number(46.0));
        assert_eq!(sheet.value(6, 4), &CellValue::Text("30.0%".into()));
        assert_eq!(sheet.value(7, 3), &CellValue::Number(34.5));
        assert_eq!(sheet.value(7, 4), &CellValue::Text("50.0%".into()));
        assert!(sheet.format(5, 1).bold);
        assert!(!sheet.format(6, 1).bold);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_missing_column_leaves_sheet_untouched() {
        let mut sheet = Sheet::new("说明");
        sheet.set_value(1, 1, "本表仅供参考");
        let mut warnings = Vec::new();
        let report = process_sheet(&mut sheet, &EnrichConfig::default(), &params(), &records(), &mut warnings);

        assert!(!report.enriched());
        assert_eq!(sheet.max_col(), 1);
        assert!(sheet.merged_regions().is_empty());
        assert_eq!(warnings.len(), 2);
        assert_eq!(
            warnings[0].to_string(),
            "sheet '说明': column '投保面积' not found in header rows 5,6"
        );
    }

    #[test]
    fn test_output_path_for() {
        let input = Path::new("/in/东乡/张庄村委会.xlsx");
        assert_eq!(
            output_path_for(input, Path::new("/in"), Some(Path::new("/out"))),
            PathBuf::from("/out/东乡/张庄村委会.xlsx")
        );
        assert_eq!(output_path_for(input, Path::new("/in"), None), input.to_path_buf());
    }

    #[test]
    fn test_collect_inputs_skips_locks_and_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::create_dir_all(dir.path().join("东乡")).unwrap();
        for name in ["b.xlsx", "a.xlsx", "~$a.xlsx", "old.xls", "东乡/c.XLSX", "out/b.xlsx"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }

        let names: Vec<String> = collect_inputs(dir.path(), Some(&out))
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["a.xlsx", "b.xlsx", "东乡/c.XLSX"]);
    }

    #[test]
    fn test_batch_continues_after_unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("坏文件.xlsx"), b"not a workbook").unwrap();
        std::fs::write(dir.path().join("损坏村委会.xlsx"), b"also not").unwrap();

        let store = MemoryLossStore::new(records());
        let summary = process_batch(dir.path(), None, &EnrichConfig::default(), &store);
        assert!(summary.reports.is_empty());
        assert_eq!(summary.failures.len(), 2);
        assert!(summary
            .failures
            .iter()
            .all(|(_, e)| matches!(e, EnrichError::UnreadableFile { .. })));
        assert_eq!(summary.summary(), "0 files processed, 0 written, 2 failed, 0 warnings");
    }
}
