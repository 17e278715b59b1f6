use lossgrid_engine::sheet::{col_to_letter, MergedRegion, Sheet};

use crate::header::{normalize_header, HeaderIndex, HeaderLocation};

/// Result of [`ensure_column`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Provisioned {
    pub column: usize,
    pub created: bool,
}

/// Return the column labelled `name`, appending it after the last used
/// column when absent.
///
/// A new label is written at the row where `reference` sits in the header
/// band (or the band's first row), and takes the same vertical span as the
/// reference label when that span can be merged without overlap. The index
/// is updated in place, so a second call with the same name returns the
/// same column.
pub fn ensure_column(sheet: &mut Sheet, index: &mut HeaderIndex, name: &str, reference: &str) -> Provisioned {
    if let Some(existing) = index.get(name) {
        return Provisioned { column: existing.column, created: false };
    }

    let column = sheet.max_col() + 1;
    let (row, last_row) = match index.get(reference) {
        Some(loc) => (loc.row, loc.last_row),
        None => {
            let first = index.band().map(|(first, _)| first).unwrap_or_else(|| index.data_start_row().saturating_sub(1).max(1));
            (first, first)
        }
    };

    let label = normalize_header(name);
    sheet.set_value(row, column, label.as_str());

    let mut placed_last_row = row;
    if last_row > row {
        let region = MergedRegion::new(row, column, last_row, column);
        match sheet.add_merge(region) {
            Ok(()) => placed_last_row = last_row,
            Err(conflict) => log::debug!("sheet '{}': label merge not mirrored: {}", sheet.name, conflict),
        }
    }

    index.insert(&label, HeaderLocation { column, row, last_row: placed_last_row });
    log::info!("sheet '{}': created column '{}' at {}", sheet.name, label, col_to_letter(column));
    Provisioned { column, created: true }
}
