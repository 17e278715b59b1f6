//! Fixed report layout and the unmerge-and-flatten transform.

use lossgrid_engine::cell::{Alignment, VerticalAlignment};
use lossgrid_engine::sheet::{MergedRegion, Sheet};

use crate::config::LayoutConfig;
use crate::error::EnrichError;

/// Outcome of a single merge request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MergeOutcome {
    Created,
    AlreadyPresent,
    Skipped,
}

/// Merge `region` unless it is already there or collides with another merge.
fn request_merge(sheet: &mut Sheet, region: MergedRegion, warnings: &mut Vec<EnrichError>) -> MergeOutcome {
    if sheet.merged_regions().contains(&region) {
        return MergeOutcome::AlreadyPresent;
    }
    match sheet.add_merge(region) {
        Ok(()) => MergeOutcome::Created,
        Err(conflict) => {
            let warning = EnrichError::OverlappingMergeRequest {
                sheet: sheet.name.clone(),
                requested: conflict.requested,
                existing: conflict.existing,
            };
            warnings.push(warning);
            MergeOutcome::Skipped
        }
    }
}

/// Apply the report layout after all data has been written.
///
/// - rows `1..=title_rows` merged across every column, large bold title
/// - `subtitle_row` merged across every column
/// - header band merged vertically per column where the lower band cells
///   are empty and no merge covers the column yet; band labels bold
/// - every cell centred
/// - uniform column width, `wide_column` widened
///
/// Values are never modified. Existing merges are kept; any requested merge
/// that would overlap one is skipped and reported through `warnings`.
/// Running it twice leaves the sheet unchanged.
pub fn apply_layout(
    sheet: &mut Sheet,
    band: Option<(usize, usize)>,
    wide_column: Option<usize>,
    layout: &LayoutConfig,
    warnings: &mut Vec<EnrichError>,
) {
    let max_row = sheet.max_row();
    let max_col = sheet.max_col();
    if max_col == 0 {
        return;
    }

    // Title banner
    if max_row >= layout.title_rows {
        let title = MergedRegion::new(1, 1, layout.title_rows, max_col);
        if request_merge(sheet, title, warnings) != MergeOutcome::Skipped {
            sheet.update_format(1, 1, |f| {
                f.font_size = Some(layout.title_font_size);
                f.bold = true;
            });
        }
    }

    // Subtitle row
    if max_row >= layout.subtitle_row && max_col > 1 {
        let subtitle = MergedRegion::new(layout.subtitle_row, 1, layout.subtitle_row, max_col);
        request_merge(sheet, subtitle, warnings);
    }

    // Header band
    if let Some((first, last)) = band {
        for col in 1..=max_col {
            if last > first {
                merge_band_column(sheet, first, last, col, warnings);
            }
            for row in first..=last {
                if !sheet.is_merge_hidden(row, col) && !sheet.value(row, col).is_empty() {
                    sheet.update_format(row, col, |f| f.bold = true);
                }
            }
        }
    }

    // Centre everything in the used grid
    for row in 1..=max_row {
        for col in 1..=max_col {
            if sheet.is_merge_hidden(row, col) {
                continue;
            }
            sheet.update_format(row, col, |f| {
                f.alignment = Alignment::Center;
                f.vertical_alignment = VerticalAlignment::Center;
            });
        }
    }

    for col in 1..=max_col {
        sheet.col_widths.insert(col, layout.column_width);
    }
    if let Some(col) = wide_column {
        sheet.col_widths.insert(col, layout.wide_column_width);
    }
}

/// Vertically merge one column of the header band.
///
/// Columns already touched by a merge (a horizontal header label, a banner,
/// an earlier pass) are left alone, as are columns whose lower band cells
/// hold values that a merge would hide.
fn merge_band_column(sheet: &mut Sheet, first: usize, last: usize, col: usize, warnings: &mut Vec<EnrichError>) {
    let region = MergedRegion::new(first, col, last, col);
    if let Some(existing) = sheet.overlapping_merge(&region) {
        if *existing != region {
            log::debug!("sheet '{}': band column {} already covered by {}", sheet.name, col, existing);
        }
        return;
    }
    if ((first + 1)..=last).any(|row| !sheet.value(row, col).is_empty()) {
        log::debug!("sheet '{}': band column {} has sub-labels, not merged", sheet.name, col);
        return;
    }
    if sheet.value(first, col).is_empty() {
        return;
    }
    request_merge(sheet, region, warnings);
}

/// Remove every merge, copying the anchor's value and number format into
/// each cell the region covered. Returns the number of regions flattened.
///
/// Formulas are not copied: covered cells get the anchor's cached value.
pub fn flatten_merges(sheet: &mut Sheet) -> usize {
    let regions: Vec<MergedRegion> = sheet.merged_regions().to_vec();

    for region in &regions {
        let (anchor_row, anchor_col) = region.anchor();
        let value = sheet.value(anchor_row, anchor_col).clone();
        let num_format = sheet.format(anchor_row, anchor_col).num_format;

        sheet.remove_merge(region);
        for (row, col) in region.cells().skip(1) {
            sheet.set_value(row, col, value.clone());
            sheet.update_format(row, col, |f| f.num_format = num_format.clone());
        }
    }

    log::debug!("sheet '{}': flattened {} merged regions", sheet.name, regions.len());
    regions.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lossgrid_engine::cell::CellValue;

    fn report_sheet() -> Sheet {
        let mut sheet = Sheet::new("Sheet1");
        sheet.set_value(1, 1, "2024年小麦种植险理赔公示");
        sheet.set_value(4, 1, "投保单位：张庄村");
        sheet.set_value(5, 1, "序号");
        sheet.set_value(5, 2, "被保险人");
        sheet.set_value(5, 3, "投保面积");
        sheet.add_merge(MergedRegion::new(5, 3, 5, 4)).unwrap();
        sheet.set_value(6, 3, "小麦");
        sheet.set_value(6, 4, "玉米");
        sheet.set_value(5, 5, "身份证号");
        sheet.set_value(7, 1, 1.0);
        sheet.set_value(7, 2, "张三");
        sheet.set_value(7, 3, 2.5);
        sheet
    }

    fn apply(sheet: &mut Sheet) -> Vec<EnrichError> {
        let mut warnings = Vec::new();
        apply_layout(sheet, Some((5, 6)), Some(5), &LayoutConfig::default(), &mut warnings);
        warnings
    }

    #[test]
    fn test_layout_merges_and_fonts() {
        let mut sheet = report_sheet();
        let warnings = apply(&mut sheet);
        assert!(warnings.is_empty());

        assert_eq!(sheet.merge_at(2, 5), Some(&MergedRegion::new(1, 1, 3, 5)));
        assert_eq!(sheet.merge_at(4, 3), Some(&MergedRegion::new(4, 1, 4, 5)));
        let title = sheet.format(1, 1);
        assert!(title.bold);
        assert_eq!(title.font_size, Some(24.0));
        assert_eq!(title.alignment, Alignment::Center);

        // Band columns without sub-labels merged vertically
        assert_eq!(sheet.merge_at(6, 1), Some(&MergedRegion::new(5, 1, 6, 1)));
        assert_eq!(sheet.merge_at(6, 2), Some(&MergedRegion::new(5, 2, 6, 2)));
        assert_eq!(sheet.merge_at(6, 5), Some(&MergedRegion::new(5, 5, 6, 5)));
        // Horizontal label with sub-labels left as is
        assert_eq!(sheet.merge_at(5, 3), Some(&MergedRegion::new(5, 3, 5, 4)));
        assert!(sheet.merge_at(6, 3).is_none());
        assert!(sheet.format(5, 2).bold);
        assert!(sheet.format(6, 3).bold);
        assert!(!sheet.format(7, 2).bold);
    }

    #[test]
    fn test_layout_centres_and_sets_widths() {
        let mut sheet = report_sheet();
        apply(&mut sheet);
        assert_eq!(sheet.format(7, 3).alignment, Alignment::Center);
        assert_eq!(sheet.format(7, 3).vertical_alignment, VerticalAlignment::Center);
        assert_eq!(sheet.col_widths.get(&1), Some(&15.0));
        assert_eq!(sheet.col_widths.get(&5), Some(&22.0));
    }

    #[test]
    fn test_layout_preserves_values() {
        let mut sheet = report_sheet();
        let before: Vec<_> = sheet.cells_iter().map(|(k, c)| (*k, c.value.clone())).collect();
        apply(&mut sheet);
        for (key, value) in before {
            assert_eq!(sheet.value(key.0, key.1), &value);
        }
    }

    #[test]
    fn test_layout_twice_is_stable() {
        let mut sheet = report_sheet();
        assert!(apply(&mut sheet).is_empty());
        let merges = sheet.merged_regions().to_vec();
        let widths = sheet.col_widths.clone();
        let title = sheet.format(1, 1);
        let header = sheet.format(5, 2);

        let warnings = apply(&mut sheet);
        assert!(warnings.is_empty(), "second pass warned: {warnings:?}");
        assert_eq!(sheet.merged_regions(), merges.as_slice());
        assert_eq!(sheet.col_widths, widths);
        assert_eq!(sheet.format(1, 1), title);
        assert_eq!(sheet.format(5, 2), header);
    }

    #[test]
    fn test_overlapping_title_is_skipped_with_warning() {
        let mut sheet = report_sheet();
        sheet.add_merge(MergedRegion::new(2, 2, 2, 3)).unwrap();
        let warnings = apply(&mut sheet);

        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            &warnings[0],
            EnrichError::OverlappingMergeRequest { existing, .. } if *existing == MergedRegion::new(2, 2, 2, 3)
        ));
        assert!(sheet.merged_regions().contains(&MergedRegion::new(2, 2, 2, 3)));
        assert!(sheet.merge_at(1, 1).is_none());
        assert_eq!(sheet.format(1, 1).font_size, None);
    }

    #[test]
    fn test_flatten_copies_value_and_format() {
        let mut sheet = Sheet::new("s");
        sheet.set_value(1, 1, 0.1234);
        sheet.update_format(1, 1, |f| f.num_format = Some("0.00%".into()));
        sheet.add_merge(MergedRegion::new(1, 1, 3, 1)).unwrap();

        assert_eq!(flatten_merges(&mut sheet), 1);
        assert!(sheet.merged_regions().is_empty());
        for row in 1..=3 {
            assert_eq!(sheet.value(row, 1), &CellValue::Number(0.1234));
            assert_eq!(sheet.format(row, 1).num_format.as_deref(), Some("0.00%"));
        }
    }

    #[test]
    fn test_flatten_keeps_other_formatting_and_cells() {
        let mut sheet = Sheet::new("s");
        sheet.set_value(2, 2, "张庄村委会");
        sheet.add_merge(MergedRegion::new(2, 2, 2, 4)).unwrap();
        sheet.update_format(2, 3, |f| f.bold = true);
        sheet.set_value(5, 5, "other");

        flatten_merges(&mut sheet);
        assert_eq!(sheet.value(2, 3), &CellValue::Text("张庄村委会".into()));
        assert!(sheet.format(2, 3).bold);
        assert_eq!(sheet.format(2, 4).num_format, None);
        assert_eq!(sheet.value(5, 5), &CellValue::Text("other".into()));
    }
}
