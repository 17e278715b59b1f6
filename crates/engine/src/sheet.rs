// Sheet model: sparse cells, merged regions, column/row dimensions.
//
// Rows and columns are 1-based throughout (A1 = (1, 1)). The io layer
// converts to the 0-based coordinates used by calamine and rust_xlsxwriter.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cell::{Cell, CellFormat, CellValue};

/// A rectangular merged cell region (inclusive bounds, 1-based).
///
/// The top-left cell is the anchor and holds the region's value and format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MergedRegion {
    pub min_row: usize,
    pub min_col: usize,
    pub max_row: usize,
    pub max_col: usize,
}

impl MergedRegion {
    pub fn new(min_row: usize, min_col: usize, max_row: usize, max_col: usize) -> Self {
        Self { min_row, min_col, max_row, max_col }
    }

    pub fn anchor(&self) -> (usize, usize) {
        (self.min_row, self.min_col)
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        row >= self.min_row && row <= self.max_row && col >= self.min_col && col <= self.max_col
    }

    pub fn overlaps(&self, other: &MergedRegion) -> bool {
        self.min_row <= other.max_row
            && other.min_row <= self.max_row
            && self.min_col <= other.max_col
            && other.min_col <= self.max_col
    }

    /// Single-cell regions are legal in OOXML but carry no meaning.
    pub fn is_single_cell(&self) -> bool {
        self.min_row == self.max_row && self.min_col == self.max_col
    }

    pub fn is_valid(&self) -> bool {
        self.min_row >= 1 && self.min_col >= 1 && self.min_row <= self.max_row && self.min_col <= self.max_col
    }

    pub fn cell_count(&self) -> usize {
        (self.max_row - self.min_row + 1) * (self.max_col - self.min_col + 1)
    }

    /// Iterate every (row, col) covered by the region, anchor first.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (self.min_row..=self.max_row)
            .flat_map(move |r| (self.min_col..=self.max_col).map(move |c| (r, c)))
    }
}

impl fmt::Display for MergedRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            cell_address(self.min_row, self.min_col),
            cell_address(self.max_row, self.max_col)
        )
    }
}

/// Rejected merge: the requested region intersects one already on the sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeConflict {
    pub requested: MergedRegion,
    pub existing: MergedRegion,
}

impl fmt::Display for MergeConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "merge {} overlaps existing merge {}", self.requested, self.existing)
    }
}

impl std::error::Error for MergeConflict {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    cells: BTreeMap<(usize, usize), Cell>,
    merged_regions: Vec<MergedRegion>,
    /// Column index -> width in Excel character units
    pub col_widths: BTreeMap<usize, f64>,
    /// Row index -> height in points
    pub row_heights: BTreeMap<usize, f64>,
}

impl Sheet {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    // ------------------------------------------------------------------
    // Cells
    // ------------------------------------------------------------------

    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.cells.get(&(row, col))
    }

    /// Get or create the cell at (row, col).
    pub fn cell_mut(&mut self, row: usize, col: usize) -> &mut Cell {
        self.cells.entry((row, col)).or_default()
    }

    pub fn value(&self, row: usize, col: usize) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        self.cells.get(&(row, col)).map(|c| &c.value).unwrap_or(&EMPTY)
    }

    /// Set a cell's value, keeping its format. Clears any formula.
    pub fn set_value(&mut self, row: usize, col: usize, value: impl Into<CellValue>) {
        let cell = self.cell_mut(row, col);
        cell.value = value.into();
        cell.formula = None;
    }

    pub fn set_formula(&mut self, row: usize, col: usize, formula: &str, cached: CellValue) {
        let cell = self.cell_mut(row, col);
        cell.formula = Some(formula.trim_start_matches('=').to_string());
        cell.value = cached;
    }

    pub fn format(&self, row: usize, col: usize) -> CellFormat {
        self.cells.get(&(row, col)).map(|c| c.format.clone()).unwrap_or_default()
    }

    pub fn set_format(&mut self, row: usize, col: usize, format: CellFormat) {
        self.cell_mut(row, col).format = format;
    }

    /// Apply an in-place edit to a cell's format, creating the cell if needed.
    pub fn update_format(&mut self, row: usize, col: usize, f: impl FnOnce(&mut CellFormat)) {
        f(&mut self.cell_mut(row, col).format);
    }

    /// Iterate over all materialised cells in row-major order.
    pub fn cells_iter(&self) -> impl Iterator<Item = (&(usize, usize), &Cell)> {
        self.cells.iter()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// True if every cell of `row` within 1..=max_col holds no value.
    pub fn is_row_empty(&self, row: usize) -> bool {
        self.cells
            .range((row, 0)..=(row, usize::MAX))
            .all(|(_, cell)| cell.value.is_empty())
    }

    /// Last row touched by any cell or merge (0 for an empty sheet).
    pub fn max_row(&self) -> usize {
        let cells = self.cells.keys().map(|(r, _)| *r).max().unwrap_or(0);
        let merges = self.merged_regions.iter().map(|m| m.max_row).max().unwrap_or(0);
        cells.max(merges)
    }

    /// Last column touched by any cell or merge (0 for an empty sheet).
    pub fn max_col(&self) -> usize {
        let cells = self.cells.keys().map(|(_, c)| *c).max().unwrap_or(0);
        let merges = self.merged_regions.iter().map(|m| m.max_col).max().unwrap_or(0);
        cells.max(merges)
    }

    // ------------------------------------------------------------------
    // Merged regions
    // ------------------------------------------------------------------

    pub fn merged_regions(&self) -> &[MergedRegion] {
        &self.merged_regions
    }

    /// Add a merged region. Fails if it overlaps an existing region.
    pub fn add_merge(&mut self, region: MergedRegion) -> Result<(), MergeConflict> {
        if let Some(existing) = self.merged_regions.iter().find(|m| m.overlaps(&region)) {
            return Err(MergeConflict { requested: region, existing: *existing });
        }
        self.merged_regions.push(region);
        Ok(())
    }

    /// Remove an exact region. Returns false if it was not present.
    pub fn remove_merge(&mut self, region: &MergedRegion) -> bool {
        let before = self.merged_regions.len();
        self.merged_regions.retain(|m| m != region);
        self.merged_regions.len() != before
    }

    pub fn merge_at(&self, row: usize, col: usize) -> Option<&MergedRegion> {
        self.merged_regions.iter().find(|m| m.contains(row, col))
    }

    /// First existing region that intersects `region`, if any.
    pub fn overlapping_merge(&self, region: &MergedRegion) -> Option<&MergedRegion> {
        self.merged_regions.iter().find(|m| m.overlaps(region))
    }

    /// A cell covered by a merge that is not the merge's anchor.
    pub fn is_merge_hidden(&self, row: usize, col: usize) -> bool {
        self.merge_at(row, col).is_some_and(|m| m.anchor() != (row, col))
    }
}

/// Convert a 1-based column index to letters (1 = A, 27 = AA).
pub fn col_to_letter(col: usize) -> String {
    let mut result = String::new();
    let mut n = col;
    while n > 0 {
        let rem = (n - 1) % 26;
        result.insert(0, (b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    result
}

/// 1-based (row, col) to an A1 address.
pub fn cell_address(row: usize, col: usize) -> String {
    format!("{}{}", col_to_letter(col), row)
}
