use std::path::{Path, PathBuf};

use lossgrid_engine::cell::CellValue;
use lossgrid_engine::sheet::MergedRegion;
use lossgrid_enrich::loss_import::import_loss_file;
use lossgrid_enrich::{flatten_file, process_batch, EnrichConfig, LossStore, SqliteLossStore};
use rust_xlsxwriter::{Format, Workbook};

const YELLOW: [u8; 3] = [255, 255, 0];

/// Township survey: A 轻度 0.3, B 重度 0.5, D 轻度 0.2, village filled only
/// on the first row.
fn write_survey(path: &Path) {
    let mut workbook = Workbook::new();
    let ws = workbook.add_worksheet();
    let headers = ["乡镇", "村委", "报损程度", "抽样农户名称", "损失程度%"];
    for (col, h) in headers.iter().enumerate() {
        ws.write_string(0, col as u16, *h).unwrap();
    }
    let rows: [(&str, &str, &str, f64); 3] = [("张庄村委会", "轻度", "A", 0.3), ("", "重度", "B", 0.5), ("", "轻度", "D", 0.2)];
    for (i, (village, level, farmer, loss)) in rows.iter().enumerate() {
        let row = i as u32 + 1;
        ws.write_string(row, 0, "东乡").unwrap();
        if !village.is_empty() {
            ws.write_string(row, 1, *village).unwrap();
        }
        ws.write_string(row, 2, *level).unwrap();
        ws.write_string(row, 3, *farmer).unwrap();
        ws.write_number(row, 4, *loss).unwrap();
    }
    workbook.save(path).unwrap();
}

/// Claim report with a two-row merged header band (rows 5-6) and a notes sheet.
fn write_claim_report(path: &Path) {
    let mut workbook = Workbook::new();
    let plain = Format::new();

    let ws = workbook.add_worksheet();
    ws.set_name("理赔清单").unwrap();
    ws.write_string(0, 0, "张庄村小麦种植险理赔公示").unwrap();
    ws.write_string(3, 0, "投保单位：张庄村委会").unwrap();
    for (col, label) in ["序号", "被保险人", "身份证号", "投保面积"].iter().enumerate() {
        ws.merge_range(4, col as u16, 5, col as u16, label, &plain).unwrap();
    }
    ws.write_number(6, 0, 1.0).unwrap();
    ws.write_string(6, 1, "A").unwrap();
    ws.write_string(6, 2, "410000199001011234").unwrap();
    ws.write_number(6, 3, 2.0).unwrap();
    ws.write_number(7, 0, 2.0).unwrap();
    ws.write_string(7, 1, "C").unwrap();
    ws.write_number(7, 3, 1.5).unwrap();
    ws.write_number(8, 0, 3.0).unwrap();
    ws.write_string(8, 1, " B ").unwrap();
    ws.write_string(8, 3, "待核").unwrap();

    let notes = workbook.add_worksheet();
    notes.set_name("说明").unwrap();
    notes.write_string(0, 0, "本表仅供公示").unwrap();

    workbook.save(path).unwrap();
}

fn setup() -> (tempfile::TempDir, PathBuf, SqliteLossStore) {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input");
    std::fs::create_dir_all(input.join("东乡")).unwrap();
    write_claim_report(&input.join("东乡").join("张庄村委会.xlsx"));

    let survey = dir.path().join("东乡损失统计.xlsx");
    write_survey(&survey);
    let mut store = SqliteLossStore::open(&dir.path().join("loss.db")).unwrap();
    let suffixes = EnrichConfig::default().village_suffixes;
    assert_eq!(import_loss_file(&mut store, &survey, &suffixes).unwrap(), 3);

    (dir, input, store)
}

#[test]
fn survey_import_feeds_village_lookup() {
    let (_dir, _input, store) = setup();
    let records = store.find_by_village("张庄村").unwrap();
    let farmers: Vec<_> = records.iter().filter_map(|r| r.farmer_name.as_deref()).collect();
    assert_eq!(farmers, vec!["A", "B", "D"]);
    assert!((records[0].avg_loss_same_level.unwrap() - 0.25).abs() < 1e-12);
    assert_eq!(records[1].avg_loss_same_level, Some(0.5));
}

#[test]
fn batch_enriches_into_mirrored_output_tree() {
    let (dir, input, store) = setup();
    let output = dir.path().join("output");
    let config = EnrichConfig::default();

    let summary = process_batch(&input, Some(&output), &config, &store);
    assert!(!summary.has_failures(), "{:?}", summary.failures);
    assert_eq!(summary.reports.len(), 1);

    let report = &summary.reports[0];
    assert!(report.written);
    assert_eq!(report.village.as_deref(), Some("张庄村"));
    assert_eq!(report.records, 3);
    assert_eq!(report.sheets_enriched(), 1);
    let kinds: Vec<_> = report.warnings.iter().map(|w| w.kind()).collect();
    assert_eq!(
        kinds,
        vec!["non_numeric_source", "missing_required_column", "missing_required_column"]
    );

    let written = output.join("东乡").join("张庄村委会.xlsx");
    let (workbook, _) = lossgrid_io::xlsx::import(&written).unwrap();
    let sheet = workbook.sheet_by_name("理赔清单").unwrap();

    assert_eq!(sheet.value(5, 5), &CellValue::Text("赔偿款".into()));
    assert_eq!(sheet.value(5, 6), &CellValue::Text("损失程度".into()));
    assert_eq!(sheet.merge_at(6, 5), Some(&MergedRegion::new(5, 5, 6, 5)));

    assert_eq!(sheet.value(7, 5), &CellValue::Number(46.0));
    assert_eq!(sheet.value(7, 6), &CellValue::Text("30.0%".into()));
    assert_eq!(sheet.format(7, 2).fill_color, Some(YELLOW));

    assert_eq!(sheet.value(8, 5), &CellValue::Number(34.5));
    assert_eq!(sheet.value(8, 6), &CellValue::Text("25.0%".into()));
    assert_eq!(sheet.format(8, 2).fill_color, None);

    assert_eq!(sheet.value(9, 5), &CellValue::Text("数据错误".into()));
    assert_eq!(sheet.value(9, 6), &CellValue::Text("50.0%".into()));
    assert_eq!(sheet.format(9, 1).fill_color, Some(YELLOW));

    // Untouched cells and layout
    assert_eq!(sheet.value(7, 3), &CellValue::Text("410000199001011234".into()));
    assert_eq!(sheet.value(9, 2), &CellValue::Text(" B ".into()));
    assert_eq!(sheet.merge_at(2, 6), Some(&MergedRegion::new(1, 1, 3, 6)));
    assert_eq!(sheet.format(1, 1).font_size, Some(24.0));

    // The input is left alone when an output directory is given
    let (original, _) = lossgrid_io::xlsx::import(&input.join("东乡").join("张庄村委会.xlsx")).unwrap();
    assert_eq!(original.sheet(0).unwrap().max_col(), 4);
}

#[test]
fn rerun_in_place_is_stable() {
    let (_dir, input, store) = setup();
    let config = EnrichConfig::default();
    let file = input.join("东乡").join("张庄村委会.xlsx");

    let first = process_batch(&input, None, &config, &store);
    assert!(!first.has_failures());
    let (after_first, _) = lossgrid_io::xlsx::import(&file).unwrap();

    let second = process_batch(&input, None, &config, &store);
    assert!(!second.has_failures());
    let report = &second.reports[0];
    assert!(report.sheets[0].created_columns.is_empty());
    assert!(report.warnings.iter().all(|w| w.kind() != "overlapping_merge_request"));

    let (after_second, _) = lossgrid_io::xlsx::import(&file).unwrap();
    let a = after_first.sheet(0).unwrap();
    let b = after_second.sheet(0).unwrap();
    assert_eq!(b.max_col(), 6);
    assert_eq!(a.merged_regions().len(), b.merged_regions().len());
    for row in 1..=a.max_row() {
        for col in 1..=a.max_col() {
            assert_eq!(a.value(row, col), b.value(row, col), "({row},{col})");
        }
    }
    assert_eq!(a.col_widths, b.col_widths);
}

#[test]
fn flatten_file_copies_percentage_into_every_cell() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("merged.xlsx");
    let target = dir.path().join("flat.xlsx");

    let mut workbook = Workbook::new();
    let ws = workbook.add_worksheet();
    let pct = Format::new().set_num_format("0.00%");
    ws.merge_range(0, 0, 2, 0, "", &pct).unwrap();
    ws.write_number_with_format(0, 0, 0.1234, &pct).unwrap();
    ws.write_string(0, 1, "村委").unwrap();
    workbook.save(&source).unwrap();

    assert_eq!(flatten_file(&source, &target).unwrap(), 1);

    let (flat, _) = lossgrid_io::xlsx::import(&target).unwrap();
    let sheet = flat.sheet(0).unwrap();
    assert!(sheet.merged_regions().is_empty());
    for row in 1..=3 {
        assert_eq!(sheet.value(row, 1), &CellValue::Number(0.1234));
        assert_eq!(sheet.format(row, 1).num_format.as_deref(), Some("0.00%"));
    }
    assert_eq!(sheet.value(1, 2), &CellValue::Text("村委".into()));
}
