//! Per-row derivation and loss-record join.

use lossgrid_engine::cell::CellValue;
use lossgrid_engine::sheet::{cell_address, Sheet};
use serde::Serialize;

use crate::error::EnrichError;
use crate::lookup::LossRecord;

/// Resolved columns for one sheet (all 1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnrichColumns {
    pub area: usize,
    pub person: usize,
    pub amount: usize,
    pub loss: usize,
}

/// Scalar inputs of the row loop.
#[derive(Debug, Clone)]
pub struct EnrichParams {
    pub factor: f64,
    pub error_marker: String,
    pub highlight: [u8; 3],
}

/// Counters for one enriched sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrichStats {
    pub rows_processed: usize,
    pub rows_skipped_empty: usize,
    pub amounts_written: usize,
    pub non_numeric: usize,
    pub exact_matches: usize,
    pub fallback_matches: usize,
    pub unmatched: usize,
}

/// How a row's insured person was matched against the village's records.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JoinOutcome<'r> {
    /// First record whose trimmed farmer name equals the person.
    Exact(&'r LossRecord),
    /// No exact match; the village's first record stands in.
    Fallback(&'r LossRecord),
    /// The village has no records.
    NoRecords,
}

impl JoinOutcome<'_> {
    /// Text written to the loss-degree column.
    pub fn loss_degree(&self) -> String {
        match self {
            JoinOutcome::Exact(r) => format_loss_degree(r.loss_percentage),
            JoinOutcome::Fallback(r) => format_loss_degree(r.avg_loss_same_level),
            JoinOutcome::NoRecords => String::new(),
        }
    }
}

/// Three-tier join: exact → first record's level average → nothing.
///
/// The fallback deliberately takes the *first* record in store order,
/// whatever its farmer. A blank person never matches exactly.
pub fn join<'r>(records: &'r [LossRecord], person: &str) -> JoinOutcome<'r> {
    let person = person.trim();
    if !person.is_empty() {
        if let Some(record) = records.iter().find(|r| r.join_key() == Some(person)) {
            return JoinOutcome::Exact(record);
        }
    }
    match records.first() {
        Some(first) => JoinOutcome::Fallback(first),
        None => JoinOutcome::NoRecords,
    }
}

/// `0.3` → `"30.0%"`; missing or non-finite → empty.
pub fn format_loss_degree(fraction: Option<f64>) -> String {
    match fraction {
        Some(v) if v.is_finite() => format!("{:.1}%", round_to(v * 100.0, 1)),
        _ => String::new(),
    }
}

/// `area * factor` rounded to cents; `None` when the area is not a number.
pub fn derive_amount(area: &CellValue, factor: f64) -> Option<f64> {
    area.as_number()
        .filter(|n| n.is_finite())
        .map(|n| round_to(n * factor, 2))
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Enrich every non-empty row from `data_start_row` to the last used row.
///
/// Writes the derived amount (or the error marker) and the loss degree, and
/// fills the whole row with the highlight colour on an exact match. Non-numeric
/// areas are reported through `warnings`; nothing here aborts the sheet.
pub fn enrich_sheet(
    sheet: &mut Sheet,
    columns: EnrichColumns,
    data_start_row: usize,
    records: &[LossRecord],
    params: &EnrichParams,
    warnings: &mut Vec<EnrichError>,
) -> EnrichStats {
    let mut stats = EnrichStats::default();
    let max_row = sheet.max_row();
    let max_col = sheet.max_col();

    for row in data_start_row..=max_row {
        if sheet.is_row_empty(row) {
            stats.rows_skipped_empty += 1;
            continue;
        }
        stats.rows_processed += 1;

        let area = sheet.value(row, columns.area).clone();
        match derive_amount(&area, params.factor) {
            Some(amount) => {
                sheet.set_value(row, columns.amount, amount);
                stats.amounts_written += 1;
            }
            None => {
                let warning = EnrichError::NonNumericSource {
                    sheet: sheet.name.clone(),
                    cell: cell_address(row, columns.area),
                    value: area.display(),
                };
                warnings.push(warning);
                sheet.set_value(row, columns.amount, params.error_marker.as_str());
                stats.non_numeric += 1;
            }
        }

        let person = sheet.value(row, columns.person).display();
        let outcome = join(records, &person);
        sheet.set_value(row, columns.loss, outcome.loss_degree());

        match outcome {
            JoinOutcome::Exact(_) => {
                for col in 1..=max_col {
                    sheet.update_format(row, col, |f| f.fill_color = Some(params.highlight));
                }
                stats.exact_matches += 1;
            }
            JoinOutcome::Fallback(_) => stats.fallback_matches += 1,
            JoinOutcome::NoRecords => stats.unmatched += 1,
        }
    }

    stats
}
