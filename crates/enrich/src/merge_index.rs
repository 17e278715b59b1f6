//! Anchor lookup for merged cells.
//!
//! Built once per sheet. Regions are bucketed by every row they span, so a
//! lookup only scans the handful of regions touching that row instead of
//! every region on the sheet.

use std::collections::HashMap;

use lossgrid_engine::cell::CellValue;
use lossgrid_engine::sheet::{MergedRegion, Sheet};

pub struct MergeIndex<'a> {
    sheet: &'a Sheet,
    by_row: HashMap<usize, Vec<MergedRegion>>,
}

impl<'a> MergeIndex<'a> {
    pub fn build(sheet: &'a Sheet) -> Self {
        let mut by_row: HashMap<usize, Vec<MergedRegion>> = HashMap::new();
        for region in sheet.merged_regions() {
            for row in region.min_row..=region.max_row {
                by_row.entry(row).or_default().push(*region);
            }
        }
        Self { sheet, by_row }
    }

    /// The merged region covering (row, col), if any.
    pub fn region_at(&self, row: usize, col: usize) -> Option<&MergedRegion> {
        self.by_row.get(&row)?.iter().find(|r| r.contains(row, col))
    }

    /// Anchor of the region covering (row, col), or the cell itself.
    pub fn anchor_of(&self, row: usize, col: usize) -> (usize, usize) {
        self.region_at(row, col).map(|r| r.anchor()).unwrap_or((row, col))
    }

    /// Value shown at (row, col): the anchor's value when merged.
    pub fn resolve(&self, row: usize, col: usize) -> &'a CellValue {
        let (r, c) = self.anchor_of(row, col);
        self.sheet.value(r, c)
    }

    pub fn sheet(&self) -> &'a Sheet {
        self.sheet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_sheet() -> Sheet {
        let mut sheet = Sheet::new("s");
        sheet.set_value(5, 1, "序号");
        sheet.add_merge(MergedRegion::new(5, 1, 6, 1)).unwrap();
        sheet.set_value(5, 3, "投保面积");
        sheet.add_merge(MergedRegion::new(5, 3, 5, 5)).unwrap();
        sheet.set_value(6, 3, "亩");
        sheet
    }

    #[test]
    fn test_resolve_returns_anchor_value() {
        let sheet = header_sheet();
        let index = MergeIndex::build(&sheet);
        for col in 3..=5 {
            assert_eq!(index.resolve(5, col), &CellValue::Text("投保面积".into()));
            assert_eq!(index.anchor_of(5, col), (5, 3));
        }
        // Vertical merge
        assert_eq!(index.resolve(6, 1), &CellValue::Text("序号".into()));
    }

    #[test]
    fn test_unmerged_cells_resolve_to_themselves() {
        let sheet = header_sheet();
        let index = MergeIndex::build(&sheet);
        assert_eq!(index.resolve(6, 3), &CellValue::Text("亩".into()));
        assert_eq!(index.anchor_of(6, 4), (6, 4));
        assert!(index.resolve(6, 4).is_empty());
        assert!(index.region_at(7, 1).is_none());
    }

    #[test]
    fn test_repeated_queries_are_stable() {
        let sheet = header_sheet();
        let index = MergeIndex::build(&sheet);
        let first = index.resolve(5, 4).clone();
        for _ in 0..10 {
            assert_eq!(index.resolve(5, 4), &first);
        }
    }
}
