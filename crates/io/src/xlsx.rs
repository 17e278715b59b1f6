// Excel file import/export (xlsx, xlsm, xls)
//
// Values come from calamine; formatting, dimensions and merges for OOXML
// files come from the style parser in xlsx_styles. Export goes through
// rust_xlsxwriter. The workbook model is 1-based; both libraries are 0-based,
// so every coordinate crosses that boundary here and nowhere else.

use std::path::Path;
use std::time::Instant;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use lossgrid_engine::cell::{Alignment, BorderStyle, CellFormat, CellValue, VerticalAlignment};
use lossgrid_engine::sheet::{cell_address, MergedRegion, Sheet};
use lossgrid_engine::workbook::Workbook;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Formula, Workbook as XlsxWorkbook, Worksheet};

use crate::xlsx_styles;

/// Number format applied to date cells that carry no explicit format (xls).
const DEFAULT_DATE_FORMAT: &str = "yyyy-mm-dd";

/// Maximum number of cells to import (prevents DoS from huge files)
const MAX_CELLS: usize = 5_000_000;

/// Per-sheet import statistics
#[derive(Debug, Default, Clone)]
pub struct SheetStats {
    pub name: String,
    pub cells_imported: usize,
    pub formulas_imported: usize,
    pub dates_imported: usize,
}

/// Result of an Excel import operation
#[derive(Debug, Default)]
pub struct ImportResult {
    /// Number of sheets imported
    pub sheets_imported: usize,
    /// Total cells imported
    pub cells_imported: usize,
    /// Formulas imported (cached value kept alongside the source)
    pub formulas_imported: usize,
    /// Cells that received formatting from styles.xml
    pub styles_imported: usize,
    /// Distinct style records in styles.xml
    pub unique_styles: usize,
    /// Total merged cell regions imported
    pub merges_imported: usize,
    /// Merged regions dropped due to overlap with existing merges
    pub merges_dropped_overlap: usize,
    /// Merged regions dropped due to invalid or single-cell references
    pub merges_dropped_invalid: usize,
    /// True if the cell limit cut the import short
    pub truncated: bool,
    /// Per-sheet statistics
    pub sheet_stats: Vec<SheetStats>,
    /// Warnings generated during import
    pub warnings: Vec<String>,
    /// Import duration in milliseconds
    pub import_duration_ms: u128,
}

impl ImportResult {
    /// Returns a summary message suitable for display
    pub fn summary(&self) -> String {
        let mut parts = vec![
            format!("{} sheet{}", self.sheets_imported, if self.sheets_imported == 1 { "" } else { "s" }),
            format!("{} cells", self.cells_imported),
        ];
        if self.formulas_imported > 0 {
            parts.push(format!("{} formulas", self.formulas_imported));
        }
        if self.styles_imported > 0 {
            parts.push(format!("formatting: {} cells ({} styles)", self.styles_imported, self.unique_styles));
        }
        if self.merges_imported > 0 {
            let dropped = self.merges_dropped_overlap + self.merges_dropped_invalid;
            if dropped > 0 {
                parts.push(format!("{} merged regions ({} dropped)", self.merges_imported, dropped));
            } else {
                parts.push(format!("{} merged regions", self.merges_imported));
            }
        }
        parts.join(" · ")
    }

    /// Returns true if there are actionable warnings
    pub fn has_warnings(&self) -> bool {
        self.truncated
            || !self.warnings.is_empty()
            || self.merges_dropped_overlap > 0
            || self.merges_dropped_invalid > 0
    }
}

/// Import an Excel file (xlsx, xlsm, xls)
pub fn import(path: &Path) -> Result<(Workbook, ImportResult), String> {
    let start_time = Instant::now();

    let mut workbook: Sheets<_> = open_workbook_auto(path)
        .map_err(|e| format!("Failed to open Excel file: {}", e))?;

    let mut result = ImportResult::default();
    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();

    if sheet_names.is_empty() {
        return Err("Excel file contains no sheets".to_string());
    }

    let mut sheets: Vec<Sheet> = Vec::with_capacity(sheet_names.len());
    let mut total_cells = 0usize;

    for sheet_name in &sheet_names {
        let range = workbook
            .worksheet_range(sheet_name)
            .map_err(|e| format!("Failed to read sheet '{}': {}", sheet_name, e))?;

        let mut sheet = Sheet::new(sheet_name);
        let mut stats = SheetStats {
            name: sheet_name.clone(),
            ..Default::default()
        };

        // Range start offset (data may not begin at A1)
        let (start_row, start_col) = range.start().unwrap_or((0, 0));

        'rows: for (row_idx, row) in range.rows().enumerate() {
            let target_row = start_row as usize + row_idx + 1;
            for (col_idx, data) in row.iter().enumerate() {
                let target_col = start_col as usize + col_idx + 1;

                if total_cells >= MAX_CELLS {
                    result.truncated = true;
                    result.warnings.push(format!("Import stopped at {} cells (limit reached)", MAX_CELLS));
                    break 'rows;
                }

                let value = match data_to_value(data) {
                    Some(v) => v,
                    None => continue,
                };
                if matches!(data, Data::DateTime(_)) {
                    sheet.update_format(target_row, target_col, |f| {
                        f.num_format = Some(DEFAULT_DATE_FORMAT.to_string())
                    });
                    stats.dates_imported += 1;
                }
                sheet.set_value(target_row, target_col, value);
                stats.cells_imported += 1;
                total_cells += 1;
            }
        }

        // Formula sources; the cached result imported above stays as the value
        if !result.truncated {
            if let Ok(formula_range) = workbook.worksheet_formula(sheet_name) {
                // Formula range may start at a different offset than data range
                let (f_start_row, f_start_col) = formula_range.start().unwrap_or((0, 0));
                for (row_idx, row) in formula_range.rows().enumerate() {
                    for (col_idx, formula) in row.iter().enumerate() {
                        if formula.is_empty() {
                            continue;
                        }
                        let target_row = f_start_row as usize + row_idx + 1;
                        let target_col = f_start_col as usize + col_idx + 1;
                        let cached = sheet.value(target_row, target_col).clone();
                        if sheet.cell(target_row, target_col).is_none() {
                            stats.cells_imported += 1;
                            total_cells += 1;
                        }
                        sheet.set_formula(target_row, target_col, formula, cached);
                        stats.formulas_imported += 1;
                    }
                }
            }
        }

        result.cells_imported += stats.cells_imported;
        result.formulas_imported += stats.formulas_imported;
        log::debug!(
            "imported sheet '{}': {} cells, {} formulas",
            sheet_name,
            stats.cells_imported,
            stats.formulas_imported
        );

        sheets.push(sheet);
        result.sheets_imported += 1;
        result.sheet_stats.push(stats);
    }

    // xls merges come straight from calamine; OOXML merges from the sheet XML
    let mut xls_merges: Vec<Vec<(usize, usize, usize, usize)>> = Vec::new();
    if let Sheets::Xls(ref xls) = workbook {
        for sheet_name in &sheet_names {
            let regions = xls
                .worksheet_merge_cells(sheet_name)
                .unwrap_or_default()
                .iter()
                .map(|d| {
                    (
                        d.start.0 as usize + 1,
                        d.start.1 as usize + 1,
                        d.end.0 as usize + 1,
                        d.end.1 as usize + 1,
                    )
                })
                .collect();
            xls_merges.push(regions);
        }
    }

    let mut workbook = Workbook::from_sheets(sheets, 0);

    if is_ooxml(path) {
        import_formatting(path, &sheet_names, &mut workbook, &mut result);
    } else {
        for (sheet_idx, regions) in xls_merges.iter().enumerate() {
            if let Some(sheet) = workbook.sheet_mut(sheet_idx) {
                import_merges(sheet, regions, &mut result);
            }
        }
    }

    result.import_duration_ms = start_time.elapsed().as_millis();
    log::debug!("imported {}: {}", path.display(), result.summary());
    Ok((workbook, result))
}

/// Map a calamine cell to the model's value. `None` for empty cells.
fn data_to_value(data: &Data) -> Option<CellValue> {
    match data {
        Data::Empty => None,
        Data::String(s) if s.is_empty() => None,
        Data::String(s) => Some(CellValue::Text(s.clone())),
        Data::Float(n) => Some(CellValue::Number(*n)),
        Data::Int(n) => Some(CellValue::Number(*n as f64)),
        Data::Bool(b) => Some(CellValue::Text(if *b { "TRUE" } else { "FALSE" }.to_string())),
        Data::Error(e) => Some(CellValue::Text(e.to_string())),
        Data::DateTime(dt) => Some(CellValue::Number(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(CellValue::Text(s.clone())),
    }
}

fn is_ooxml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "xlsx" | "xlsm"))
        .unwrap_or(false)
}

// =============================================================================
// XLSX Formatting Import
// =============================================================================

/// Layer formatting, dimensions and merges from the XLSX archive onto the
/// workbook. Formatting failures degrade to an unformatted import.
fn import_formatting(path: &Path, sheet_names: &[String], workbook: &mut Workbook, result: &mut ImportResult) {
    let (style_table, sheet_formats, stats) = match xlsx_styles::parse_xlsx_formatting(path, sheet_names) {
        Ok(data) => data,
        Err(e) => {
            log::warn!("formatting not imported from {}: {}", path.display(), e);
            result.warnings.push(format!("Formatting not imported: {}", e));
            return;
        }
    };
    result.unique_styles = stats.unique_styles;

    for (sheet_idx, sheet_fmt) in sheet_formats.iter().enumerate() {
        let sheet = match workbook.sheet_mut(sheet_idx) {
            Some(s) => s,
            None => continue,
        };

        for &(row, col, style_id) in &sheet_fmt.cell_styles {
            let resolved = match style_table.get(style_id) {
                Some(f) if f.is_styled() => f,
                _ => continue,
            };

            // Styled-empty cells are only kept when the style shows on screen
            let has_cell = sheet.cell(row, col).is_some();
            if has_cell || resolved.is_visually_relevant() {
                sheet.set_format(row, col, resolved.clone());
                result.styles_imported += 1;
            }
        }

        sheet
            .col_widths
            .extend(sheet_fmt.col_widths.iter().map(|(c, w)| (*c, stored_to_char_width(*w))));
        sheet.row_heights.extend(sheet_fmt.row_heights.iter().map(|(r, h)| (*r, *h)));

        import_merges(sheet, &sheet_fmt.merged_regions, result);
    }

    for feature in stats.unsupported_features {
        result.warnings.push(format!("Unsupported formatting: {}", feature));
    }
}

/// Convert a stored `<col width>` (which includes cell padding) back to the
/// character width shown in Excel and accepted by `set_column_width`.
/// Assumes the default 7px maximum digit width.
fn stored_to_char_width(stored: f64) -> f64 {
    let pixels = (stored * 7.0).round();
    if pixels <= 12.0 {
        pixels / 12.0
    } else {
        (pixels - 5.0) / 7.0
    }
}

fn import_merges(sheet: &mut Sheet, regions: &[(usize, usize, usize, usize)], result: &mut ImportResult) {
    for &(sr, sc, er, ec) in regions {
        let region = MergedRegion::new(sr, sc, er, ec);
        if !region.is_valid() || region.is_single_cell() {
            result.merges_dropped_invalid += 1;
            continue;
        }
        match sheet.add_merge(region) {
            Ok(()) => result.merges_imported += 1,
            Err(conflict) => {
                log::warn!("sheet '{}': dropped {}", sheet.name, conflict);
                result.merges_dropped_overlap += 1;
                result.warnings.push(format!("dropped merge: {}", conflict));
            }
        }
    }
}

// =============================================================================
// XLSX Export
// =============================================================================

/// Result of an Excel export operation
#[derive(Debug, Default)]
pub struct ExportResult {
    /// Number of sheets exported
    pub sheets_exported: usize,
    /// Total cells exported
    pub cells_exported: usize,
    /// Formulas exported as formulas
    pub formulas_exported: usize,
    /// Total merged cell regions exported
    pub merges_exported: usize,
    /// Export duration in milliseconds
    pub export_duration_ms: u128,
}

impl ExportResult {
    /// Returns a summary message suitable for display
    pub fn summary(&self) -> String {
        let mut parts = vec![
            format!("{} sheet{}", self.sheets_exported, if self.sheets_exported == 1 { "" } else { "s" }),
            format!("{} cells", self.cells_exported),
        ];
        if self.formulas_exported > 0 {
            parts.push(format!("{} formulas", self.formulas_exported));
        }
        if self.merges_exported > 0 {
            parts.push(format!("{} merged regions", self.merges_exported));
        }
        parts.join(", ")
    }
}

/// Export a workbook to XLSX format
pub fn export(workbook: &Workbook, path: &Path) -> Result<ExportResult, String> {
    let start_time = Instant::now();
    let mut result = ExportResult::default();

    let mut xlsx_workbook = XlsxWorkbook::new();

    for sheet in workbook.sheets() {
        let worksheet = xlsx_workbook
            .add_worksheet()
            .set_name(&sheet.name)
            .map_err(|e| format!("Failed to create sheet '{}': {}", sheet.name, e))?;

        // Merges first: merge_range() writes blanks to every covered cell,
        // then export_sheet_cells() overwrites the anchor with its typed value.
        for merge in sheet.merged_regions() {
            let (anchor_row, anchor_col) = merge.anchor();
            let format = build_excel_format(&sheet.format(anchor_row, anchor_col));
            worksheet
                .merge_range(
                    (merge.min_row - 1) as u32,
                    (merge.min_col - 1) as u16,
                    (merge.max_row - 1) as u32,
                    (merge.max_col - 1) as u16,
                    "",
                    &format,
                )
                .map_err(|e| format!("Failed to write merge {}: {}", merge, e))?;
            result.merges_exported += 1;
        }

        let (cells, formulas) = export_sheet_cells(sheet, worksheet)?;
        result.cells_exported += cells;
        result.formulas_exported += formulas;

        apply_dimensions(sheet, worksheet)?;
        result.sheets_exported += 1;
    }

    if let Ok(ws) = xlsx_workbook.worksheet_from_index(workbook.active_sheet_index()) {
        ws.set_active(true);
    }

    xlsx_workbook
        .save(path)
        .map_err(|e| format!("Failed to save XLSX file: {}", e))?;

    result.export_duration_ms = start_time.elapsed().as_millis();
    log::debug!("exported {}: {}", path.display(), result.summary());
    Ok(result)
}

/// Export cells from a sheet to an Excel worksheet.
/// Returns (cells_exported, formulas_exported).
fn export_sheet_cells(sheet: &Sheet, worksheet: &mut Worksheet) -> Result<(usize, usize), String> {
    let mut cells_exported = 0;
    let mut formulas_exported = 0;

    for ((row, col), cell) in sheet.cells_iter() {
        // Only the anchor of a merge carries content
        if sheet.is_merge_hidden(*row, *col) {
            continue;
        }

        let row32 = (*row - 1) as u32;
        let col16 = (*col - 1) as u16;
        let format = build_excel_format(&cell.format);
        let write_err = |e: rust_xlsxwriter::XlsxError| format!("Failed to write cell {}: {}", cell_address(*row, *col), e);

        if let Some(source) = &cell.formula {
            let formula = Formula::new(source.as_str()).set_result(cell.value.display());
            worksheet
                .write_formula_with_format(row32, col16, formula, &format)
                .map_err(write_err)?;
            formulas_exported += 1;
            cells_exported += 1;
            continue;
        }

        match &cell.value {
            CellValue::Empty => {
                if cell.format.is_styled() {
                    worksheet.write_blank(row32, col16, &format).map_err(write_err)?;
                    cells_exported += 1;
                }
            }
            CellValue::Text(s) => {
                worksheet
                    .write_string_with_format(row32, col16, s, &format)
                    .map_err(write_err)?;
                cells_exported += 1;
            }
            CellValue::Number(n) => {
                worksheet
                    .write_number_with_format(row32, col16, *n, &format)
                    .map_err(write_err)?;
                cells_exported += 1;
            }
        }
    }

    Ok((cells_exported, formulas_exported))
}

fn apply_dimensions(sheet: &Sheet, worksheet: &mut Worksheet) -> Result<(), String> {
    for (col, width) in &sheet.col_widths {
        worksheet
            .set_column_width((*col - 1) as u16, *width)
            .map_err(|e| format!("Failed to set column {} width: {}", col, e))?;
    }
    for (row, height) in &sheet.row_heights {
        worksheet
            .set_row_height((*row - 1) as u32, *height)
            .map_err(|e| format!("Failed to set row {} height: {}", row, e))?;
    }
    Ok(())
}

fn rgb(color: [u8; 3]) -> Color {
    Color::RGB(((color[0] as u32) << 16) | ((color[1] as u32) << 8) | (color[2] as u32))
}

/// Build an Excel Format from a CellFormat
fn build_excel_format(cell_format: &CellFormat) -> Format {
    let mut format = Format::new();

    if cell_format.bold {
        format = format.set_bold();
    }
    if cell_format.italic {
        format = format.set_italic();
    }
    if let Some(size) = cell_format.font_size {
        format = format.set_font_size(size as f64);
    }
    if let Some(ref name) = cell_format.font_name {
        format = format.set_font_name(name);
    }
    if let Some(color) = cell_format.font_color {
        format = format.set_font_color(rgb(color));
    }

    format = match cell_format.alignment {
        Alignment::General => format,
        Alignment::Left => format.set_align(FormatAlign::Left),
        Alignment::Center => format.set_align(FormatAlign::Center),
        Alignment::Right => format.set_align(FormatAlign::Right),
    };
    format = match cell_format.vertical_alignment {
        VerticalAlignment::Top => format.set_align(FormatAlign::Top),
        VerticalAlignment::Center => format.set_align(FormatAlign::VerticalCenter),
        VerticalAlignment::Bottom => format,
    };
    if cell_format.wrap {
        format = format.set_text_wrap();
    }

    if let Some(color) = cell_format.fill_color {
        format = format.set_background_color(rgb(color));
    }

    let borders = &cell_format.borders;
    if borders.top != BorderStyle::None {
        format = format.set_border_top(border_style_to_xlsx(borders.top));
    }
    if borders.right != BorderStyle::None {
        format = format.set_border_right(border_style_to_xlsx(borders.right));
    }
    if borders.bottom != BorderStyle::None {
        format = format.set_border_bottom(border_style_to_xlsx(borders.bottom));
    }
    if borders.left != BorderStyle::None {
        format = format.set_border_left(border_style_to_xlsx(borders.left));
    }

    if let Some(ref code) = cell_format.num_format {
        format = format.set_num_format(code);
    }

    format
}

fn border_style_to_xlsx(style: BorderStyle) -> FormatBorder {
    match style {
        BorderStyle::None => FormatBorder::None,
        BorderStyle::Thin => FormatBorder::Thin,
        BorderStyle::Medium => FormatBorder::Medium,
        BorderStyle::Thick => FormatBorder::Thick,
    }
}
