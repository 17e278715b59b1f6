//! Loss-statistics workbooks → `loss_records`.
//!
//! One workbook per township survey: headers on row 1, one sampled plot per
//! row, the `村委` column filled only on the first row of each village.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use lossgrid_engine::cell::CellValue;
use lossgrid_engine::sheet::Sheet;
use walkdir::WalkDir;

use crate::error::EnrichError;
use crate::sqlite_store::SqliteLossStore;
use crate::village::canonical_village;

pub const COL_TOWNSHIP: &str = "乡镇";
pub const COL_VILLAGE: &str = "村委";
pub const COL_RISK_DATE: &str = "出险时间";
pub const COL_GROWTH_STAGE: &str = "出险时间对应生长时期";
pub const COL_LOSS_LEVEL: &str = "报损程度";
pub const COL_FARMER: &str = "抽样农户名称";
pub const COL_PLOT: &str = "地块名称";
pub const COL_SPIKES: &str = "平均亩穗（万/亩）";
pub const COL_GRAINS: &str = "平均穗粒数（粒/穗）";
pub const COL_GRAIN_WEIGHT: &str = "平均千粒重（克）";
pub const COL_CURRENT_YIELD: &str = "抽样地块平均产量（kg/亩）";
pub const COL_HISTORICAL_YIELD: &str = "当地前三年平均产量（kg/亩）";
pub const COL_LOSS: &str = "损失程度%";

const REQUIRED_COLUMNS: [&str; 3] = [COL_VILLAGE, COL_FARMER, COL_LOSS];

/// One row of a loss-statistics workbook, flattened for storage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LossSample {
    pub township: Option<String>,
    pub village: String,
    /// ISO date (`2024-05-20`), or the source text when it was not a date.
    pub risk_date: Option<String>,
    pub growth_stage: Option<String>,
    pub loss_level: Option<String>,
    pub farmer_name: Option<String>,
    pub plot_name: Option<String>,
    pub average_spikes_per_mu: Option<f64>,
    pub average_grains_per_spike: Option<f64>,
    pub thousand_grain_weight: Option<f64>,
    pub current_yield_kg_per_mu: Option<f64>,
    pub historical_yield_kg_per_mu: Option<f64>,
    pub loss_percentage: Option<f64>,
    pub avg_loss_same_level: Option<f64>,
    pub source_file: String,
    pub import_date: DateTime<Utc>,
    pub is_calculated_yield: bool,
    pub is_calculated_loss: bool,
}

/// Samples read from one workbook plus the rows that could not be used.
#[derive(Debug, Default)]
pub struct LossSheet {
    pub samples: Vec<LossSample>,
    /// Rows before the first village name (nothing to fill forward from).
    pub rows_without_village: usize,
}

/// Outcome of importing a directory tree.
#[derive(Debug, Default)]
pub struct LossImportSummary {
    pub imported: Vec<(PathBuf, usize)>,
    pub failures: Vec<(PathBuf, EnrichError)>,
}

impl LossImportSummary {
    pub fn records(&self) -> usize {
        self.imported.iter().map(|(_, n)| n).sum()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} records from {} files, {} failed",
            self.records(),
            self.imported.len(),
            self.failures.len()
        )
    }
}

/// `" 损失 程度%\n"` → `"损失_程度%"`.
pub fn clean_column_name(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Excel serial date → ISO text. Whole days give `YYYY-MM-DD`, otherwise
/// `YYYY-MM-DDTHH:MM:SS`.
pub fn excel_serial_to_iso(serial: f64) -> Option<String> {
    if !serial.is_finite() || !(0.0..=2_958_466.0).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    let datetime = epoch.checked_add_signed(Duration::milliseconds(millis))?;
    if datetime.num_seconds_from_midnight() == 0 {
        Some(datetime.format("%Y-%m-%d").to_string())
    } else {
        Some(datetime.format("%Y-%m-%dT%H:%M:%S").to_string())
    }
}

fn text_of(value: &CellValue) -> Option<String> {
    let text = value.display();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Numbers, or text that parses as one; anything else is missing.
fn number_of(value: &CellValue) -> Option<f64> {
    match value {
        CellValue::Number(n) if n.is_finite() => Some(*n),
        CellValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn date_of(value: &CellValue) -> Option<String> {
    match value {
        CellValue::Number(n) => excel_serial_to_iso(*n),
        other => text_of(other),
    }
}

static EMPTY: CellValue = CellValue::Empty;

/// Row-1 header names (cleaned) → column.
struct HeaderColumns<'a> {
    sheet: &'a Sheet,
    columns: HashMap<String, usize>,
}

impl<'a> HeaderColumns<'a> {
    fn read(sheet: &'a Sheet) -> Self {
        let mut columns = HashMap::new();
        for col in 1..=sheet.max_col() {
            if let Some(name) = text_of(sheet.value(1, col)) {
                columns.entry(clean_column_name(&name)).or_insert(col);
            }
        }
        Self { sheet, columns }
    }

    fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    fn value(&self, row: usize, name: &str) -> &'a CellValue {
        match self.columns.get(name) {
            Some(&col) => self.sheet.value(row, col),
            None => &EMPTY,
        }
    }

    fn has_formula(&self, row: usize, name: &str) -> bool {
        self.columns
            .get(name)
            .and_then(|&col| self.sheet.cell(row, col))
            .is_some_and(|cell| cell.formula.is_some())
    }
}

/// Read the first sheet of a loss-statistics workbook.
///
/// `村委` is filled forward, villages are canonicalised with `suffixes`, and
/// each row's `avg_loss_same_level` is the mean `损失程度%` of all rows
/// sharing its `报损程度` (rows without a loss level get none).
pub fn read_loss_sheet(
    sheet: &Sheet,
    source_file: &str,
    suffixes: &[String],
    import_date: DateTime<Utc>,
) -> Result<LossSheet, String> {
    let columns = HeaderColumns::read(sheet);
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|name| !columns.contains(name))
        .collect();
    if !missing.is_empty() {
        return Err(format!("missing column(s) {} in header row 1", missing.join(", ")));
    }
    let read = |row: usize, name: &str| columns.value(row, name);

    let mut result = LossSheet::default();
    let mut current_village: Option<String> = None;

    for row in 2..=sheet.max_row() {
        if sheet.is_row_empty(row) {
            continue;
        }
        if let Some(raw) = text_of(read(row, COL_VILLAGE)) {
            current_village = canonical_village(&raw, suffixes);
        }
        let Some(village) = current_village.clone() else {
            log::warn!("{source_file}: row {row} has no village, skipped");
            result.rows_without_village += 1;
            continue;
        };

        result.samples.push(LossSample {
            township: text_of(read(row, COL_TOWNSHIP)),
            village,
            risk_date: date_of(read(row, COL_RISK_DATE)),
            growth_stage: text_of(read(row, COL_GROWTH_STAGE)),
            loss_level: text_of(read(row, COL_LOSS_LEVEL)),
            farmer_name: text_of(read(row, COL_FARMER)),
            plot_name: text_of(read(row, COL_PLOT)),
            average_spikes_per_mu: number_of(read(row, COL_SPIKES)),
            average_grains_per_spike: number_of(read(row, COL_GRAINS)),
            thousand_grain_weight: number_of(read(row, COL_GRAIN_WEIGHT)),
            current_yield_kg_per_mu: number_of(read(row, COL_CURRENT_YIELD)),
            historical_yield_kg_per_mu: number_of(read(row, COL_HISTORICAL_YIELD)),
            loss_percentage: number_of(read(row, COL_LOSS)),
            avg_loss_same_level: None,
            source_file: source_file.to_string(),
            import_date,
            is_calculated_yield: columns.has_formula(row, COL_CURRENT_YIELD),
            is_calculated_loss: columns.has_formula(row, COL_LOSS),
        });
    }

    fill_level_averages(&mut result.samples);
    Ok(result)
}

/// Mean loss per loss level, ignoring rows without a loss value.
fn fill_level_averages(samples: &mut [LossSample]) {
    let mut sums: HashMap<String, (f64, usize)> = HashMap::new();
    for sample in samples.iter() {
        if let (Some(level), Some(loss)) = (&sample.loss_level, sample.loss_percentage) {
            let entry = sums.entry(level.clone()).or_insert((0.0, 0));
            entry.0 += loss;
            entry.1 += 1;
        }
    }
    for sample in samples.iter_mut() {
        sample.avg_loss_same_level = sample
            .loss_level
            .as_ref()
            .and_then(|level| sums.get(level))
            .map(|(sum, count)| sum / *count as f64);
    }
}

/// Import one workbook into the store. Returns the number of records inserted.
pub fn import_loss_file(store: &mut SqliteLossStore, path: &Path, suffixes: &[String]) -> Result<usize, EnrichError> {
    let import_err = |message: String| EnrichError::Import { path: path.to_path_buf(), message };

    let (workbook, _) = lossgrid_io::xlsx::import(path).map_err(import_err)?;
    let sheet = workbook
        .sheet(0)
        .ok_or_else(|| import_err("workbook has no sheets".to_string()))?;

    let source_file = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let loss_sheet = read_loss_sheet(sheet, &source_file, suffixes, Utc::now()).map_err(import_err)?;

    if loss_sheet.samples.is_empty() {
        log::info!("{source_file}: no loss records");
        return Ok(0);
    }
    let inserted = store.insert_samples(&loss_sheet.samples)?;
    log::info!("{source_file}: inserted {inserted} loss records");
    Ok(inserted)
}

/// `.xls`/`.xlsx` files under `root`, sorted, Office lock files excluded.
pub fn collect_loss_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            let is_lock = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("~$"));
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase());
            !is_lock && matches!(ext.as_deref(), Some("xls") | Some("xlsx"))
        })
        .collect();
    files.sort();
    files
}

/// Import every loss workbook under `root`; a failing file is recorded and
/// the walk continues.
pub fn import_loss_tree(store: &mut SqliteLossStore, root: &Path, suffixes: &[String]) -> LossImportSummary {
    let mut summary = LossImportSummary::default();
    for path in collect_loss_files(root) {
        match import_loss_file(store, &path, suffixes) {
            Ok(n) => summary.imported.push((path, n)),
            Err(e) => {
                log::warn!("{e}");
                summary.failures.push((path, e));
            }
        }
    }
    summary
}
