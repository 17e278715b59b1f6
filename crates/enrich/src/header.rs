//! Header resolution across a multi-row, possibly merged, header band.

use std::collections::HashMap;

use lossgrid_engine::sheet::Sheet;

use crate::merge_index::MergeIndex;

/// Canonical form of a header label: line breaks removed, surrounding
/// whitespace trimmed. Interior spaces are kept.
pub fn normalize_header(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != '\n' && *c != '\r')
        .collect::<String>()
        .trim()
        .to_string()
}

/// Where a header label lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderLocation {
    /// Anchor column of the label (1-based).
    pub column: usize,
    /// Header row in which the label was first seen.
    pub row: usize,
    /// Bottom row of the label's cell (differs from `row` when merged vertically).
    pub last_row: usize,
}

/// Normalized header name → location, plus the first data row.
#[derive(Debug, Clone, Default)]
pub struct HeaderIndex {
    locations: HashMap<String, HeaderLocation>,
    /// Header rows that exist on the sheet, in scan order.
    band_rows: Vec<usize>,
    data_start_row: usize,
}

impl HeaderIndex {
    pub fn get(&self, name: &str) -> Option<HeaderLocation> {
        self.locations.get(&normalize_header(name)).copied()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.get(name).map(|l| l.column)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Record a new label. Existing names keep their first location.
    pub fn insert(&mut self, name: &str, location: HeaderLocation) {
        self.locations.entry(normalize_header(name)).or_insert(location);
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Entries ordered by column, then row.
    pub fn entries(&self) -> Vec<(&str, HeaderLocation)> {
        let mut entries: Vec<(&str, HeaderLocation)> =
            self.locations.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        entries.sort_by_key(|(_, l)| (l.column, l.row));
        entries
    }

    /// First row below the header band.
    pub fn data_start_row(&self) -> usize {
        self.data_start_row
    }

    /// (first, last) header rows present on the sheet.
    pub fn band(&self) -> Option<(usize, usize)> {
        Some((*self.band_rows.first()?, *self.band_rows.last()?))
    }
}

/// Scan `header_rows` in order and locate `targets`.
///
/// Every non-empty label seen is recorded; the first occurrence of a name
/// wins. Label scanning stops after the row in which the last outstanding
/// target was found. Rows beyond the sheet are ignored, and the band ends
/// before the first candidate row that already holds data.
pub fn resolve_headers(sheet: &Sheet, header_rows: &[usize], targets: &[String]) -> HeaderIndex {
    let merges = MergeIndex::build(sheet);
    let max_row = sheet.max_row();
    let max_col = sheet.max_col();

    let mut index = HeaderIndex::default();
    let mut scanning = true;

    for row in header_rows.iter().copied().filter(|r| *r <= max_row) {
        if !index.band_rows.is_empty() && holds_data(&merges, row, max_col, &index, targets) {
            log::debug!("sheet '{}': row {} holds data, header band ends at row {}", sheet.name, row, row.saturating_sub(1));
            break;
        }
        index.band_rows.push(row);
        if !scanning {
            continue;
        }

        for col in 1..=max_col {
            let (anchor_row, anchor_col) = merges.anchor_of(row, col);
            // A label merged across columns is reported once, at its anchor column
            if anchor_col != col {
                continue;
            }
            let label = normalize_header(&merges.resolve(row, col).display());
            if label.is_empty() {
                continue;
            }
            let last_row = merges.region_at(row, col).map(|r| r.max_row).unwrap_or(row);
            index.insert(&label, HeaderLocation { column: col, row: anchor_row.min(row), last_row });
        }

        if targets.iter().all(|t| index.contains(t)) {
            log::debug!("sheet '{}': all header targets found by row {}", sheet.name, row);
            scanning = false;
        }
    }

    let band_bottom = index.band_rows.last().copied().unwrap_or_else(|| header_rows.last().copied().unwrap_or(0));
    let merged_bottom = index.locations.values().map(|l| l.last_row).max().unwrap_or(0);
    index.data_start_row = band_bottom.max(merged_bottom) + 1;
    index
}

/// A row below the first header row is data when a cell of its own holds a
/// number, or when a cell sits directly under an unmerged target label.
fn holds_data(merges: &MergeIndex, row: usize, max_col: usize, index: &HeaderIndex, targets: &[String]) -> bool {
    let own = |col: usize| merges.anchor_of(row, col) == (row, col);
    let sheet = merges.sheet();

    if (1..=max_col).any(|col| own(col) && sheet.value(row, col).as_number().is_some()) {
        return true;
    }
    targets.iter().filter_map(|t| index.get(t)).any(|loc| {
        loc.last_row < row
            && merges.region_at(loc.row, loc.column).is_none()
            && own(loc.column)
            && !sheet.value(row, loc.column).is_empty()
    })
}
