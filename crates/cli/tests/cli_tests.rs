// Integration tests for the `lossgrid` binary.
// Run with: cargo test -p lossgrid-cli --test cli_tests -- --nocapture

use std::path::Path;
use std::process::{Command, Output};

use rust_xlsxwriter::{Format, Workbook};

fn lossgrid(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_lossgrid"));
    // Keep any real user config out of the tests
    cmd.env("XDG_CONFIG_HOME", home)
        .env_remove("LOSSGRID_DB")
        .env_remove("LOSSGRID_CONFIG")
        .env("LOSSGRID_LOG", "warn");
    cmd
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn write_survey(path: &Path) {
    let mut workbook = Workbook::new();
    let ws = workbook.add_worksheet();
    for (col, h) in ["村委", "报损程度", "抽样农户名称", "损失程度%"].iter().enumerate() {
        ws.write_string(0, col as u16, *h).unwrap();
    }
    ws.write_string(1, 0, "张庄村委会").unwrap();
    ws.write_string(1, 1, "轻度").unwrap();
    ws.write_string(1, 2, "A").unwrap();
    ws.write_number(1, 3, 0.3).unwrap();
    ws.write_string(2, 1, "轻度").unwrap();
    ws.write_string(2, 2, "B").unwrap();
    ws.write_number(2, 3, 0.5).unwrap();
    workbook.save(path).unwrap();
}

fn write_claim(path: &Path) {
    let mut workbook = Workbook::new();
    let plain = Format::new();
    let ws = workbook.add_worksheet();
    ws.write_string(0, 0, "张庄村理赔公示").unwrap();
    for (col, label) in ["被保险人", "投保面积"].iter().enumerate() {
        ws.merge_range(4, col as u16, 5, col as u16, label, &plain).unwrap();
    }
    ws.write_string(6, 0, "A").unwrap();
    ws.write_number(6, 1, 1.5).unwrap();
    ws.write_string(7, 0, "Z").unwrap();
    ws.write_number(7, 1, 2.0).unwrap();
    workbook.save(path).unwrap();
}

/// tempdir with `loss.db` built from a survey and `claims/张庄村委会.xlsx`.
fn prepared() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let survey = dir.path().join("survey.xlsx");
    write_survey(&survey);
    std::fs::create_dir_all(dir.path().join("claims")).unwrap();
    write_claim(&dir.path().join("claims").join("张庄村委会.xlsx"));

    let db = dir.path().join("loss.db");
    let output = lossgrid(dir.path())
        .args(["import-loss", survey.to_str().unwrap(), "--db", db.to_str().unwrap()])
        .output()
        .expect("lossgrid import-loss");
    assert!(output.status.success(), "import-loss failed: {}", stderr(&output));
    assert!(stdout(&output).contains("2 records"));
    dir
}

// ---------------------------------------------------------------------------
// enrich
// ---------------------------------------------------------------------------

#[test]
fn enrich_json_report() {
    let dir = prepared();
    let out = dir.path().join("out");
    let output = lossgrid(dir.path())
        .args(["enrich", "claims", "--output-dir", "out", "--db", "loss.db", "--factor", "10", "--json"])
        .current_dir(dir.path())
        .output()
        .expect("lossgrid enrich");
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("valid JSON");
    assert_eq!(report["summary"]["processed"], 1);
    assert_eq!(report["summary"]["written"], 1);
    let file = &report["files"][0];
    assert_eq!(file["village"], "张庄村");
    assert_eq!(file["records"], 2);
    let sheet = &file["sheets"][0];
    assert_eq!(sheet["enriched"], true);
    assert_eq!(sheet["columns"]["amount"], 3);
    assert_eq!(sheet["columns"]["loss"], 4);
    assert_eq!(sheet["stats"]["exact_matches"], 1);
    assert_eq!(sheet["stats"]["fallback_matches"], 1);

    let (workbook, _) = lossgrid_io::xlsx::import(&out.join("张庄村委会.xlsx")).unwrap();
    let enriched = workbook.sheet(0).unwrap();
    assert_eq!(enriched.value(7, 3).as_number(), Some(15.0));
    assert_eq!(enriched.value(7, 4).display(), "30.0%");
    assert_eq!(enriched.value(8, 4).display(), "40.0%");
}

#[test]
fn enrich_db_from_environment() {
    let dir = prepared();
    let output = lossgrid(dir.path())
        .args(["enrich", "claims"])
        .env("LOSSGRID_DB", dir.path().join("loss.db"))
        .current_dir(dir.path())
        .output()
        .expect("lossgrid enrich");
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("1 files processed, 1 written, 0 failed"));
}

#[test]
fn enrich_without_db_is_usage_error() {
    let dir = prepared();
    let output = lossgrid(dir.path())
        .args(["enrich", "claims"])
        .current_dir(dir.path())
        .output()
        .expect("lossgrid enrich");
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("hint:"));
}

#[test]
fn enrich_with_failed_file_exits_batch_code() {
    let dir = prepared();
    std::fs::write(dir.path().join("claims").join("李庄村委会.xlsx"), b"not a workbook").unwrap();
    let output = lossgrid(dir.path())
        .args(["enrich", "claims", "--db", "loss.db"])
        .current_dir(dir.path())
        .output()
        .expect("lossgrid enrich");
    assert_eq!(output.status.code(), Some(10));
    assert!(stdout(&output).contains("1 written, 1 failed"));
    assert!(stderr(&output).contains("李庄村委会.xlsx"));
}

#[test]
fn warnings_on_stderr_name_the_workbook() {
    let dir = prepared();
    let mut workbook = Workbook::new();
    let plain = Format::new();
    let ws = workbook.add_worksheet();
    for (col, label) in ["被保险人", "投保面积"].iter().enumerate() {
        ws.merge_range(4, col as u16, 5, col as u16, label, &plain).unwrap();
    }
    ws.write_string(6, 0, "A").unwrap();
    ws.write_string(6, 1, "两亩").unwrap();
    workbook.save(dir.path().join("claims").join("李庄村委会.xlsx")).unwrap();

    let output = lossgrid(dir.path())
        .args(["enrich", "claims", "--db", "loss.db"])
        .current_dir(dir.path())
        .output()
        .expect("lossgrid enrich");
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let err = stderr(&output);
    assert!(
        err.contains("李庄村委会.xlsx: sheet 'Sheet1', cell B7: area value '两亩' is not numeric"),
        "stderr: {}",
        err
    );
}

#[test]
fn invalid_config_exits_config_code() {
    let dir = prepared();
    let config = dir.path().join("bad.toml");
    std::fs::write(&config, "header_rows = [6, 5]\n").unwrap();
    let output = lossgrid(dir.path())
        .args(["enrich", "claims", "--db", "loss.db", "--config", "bad.toml"])
        .current_dir(dir.path())
        .output()
        .expect("lossgrid enrich");
    assert_eq!(output.status.code(), Some(3));
    assert!(stderr(&output).contains("strictly increasing"));
}

#[test]
fn user_config_file_is_picked_up() {
    let dir = prepared();
    let config_dir = dir.path().join("lossgrid");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(config_dir.join("config.toml"), "factor = 2.0\n").unwrap();

    let output = lossgrid(dir.path())
        .args(["enrich", "claims", "--db", "loss.db", "--json"])
        .current_dir(dir.path())
        .output()
        .expect("lossgrid enrich");
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let (workbook, _) = lossgrid_io::xlsx::import(&dir.path().join("claims").join("张庄村委会.xlsx")).unwrap();
    assert_eq!(workbook.sheet(0).unwrap().value(7, 3).as_number(), Some(3.0));
}

// ---------------------------------------------------------------------------
// headers / flatten / convert
// ---------------------------------------------------------------------------

#[test]
fn headers_json_reports_anchor_columns() {
    let dir = prepared();
    let output = lossgrid(dir.path())
        .args(["headers", "claims/张庄村委会.xlsx", "--json"])
        .current_dir(dir.path())
        .output()
        .expect("lossgrid headers");
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let sheets: Vec<serde_json::Value> = serde_json::from_str(&stdout(&output)).expect("valid JSON array");
    assert_eq!(sheets.len(), 1);
    assert_eq!(sheets[0]["data_start_row"], 7);
    assert_eq!(sheets[0]["band"], serde_json::json!([5, 6]));
    let headers = sheets[0]["headers"].as_array().unwrap();
    assert_eq!(headers[0]["name"], "被保险人");
    assert_eq!(headers[1]["name"], "投保面积");
    assert_eq!(headers[1]["letter"], "B");
    assert!(sheets[0]["missing"].as_array().unwrap().is_empty());
}

#[test]
fn flatten_writes_output() {
    let dir = prepared();
    let output = lossgrid(dir.path())
        .args(["flatten", "claims/张庄村委会.xlsx", "flat.xlsx"])
        .current_dir(dir.path())
        .output()
        .expect("lossgrid flatten");
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("2 merged ranges flattened"));

    let (workbook, _) = lossgrid_io::xlsx::import(&dir.path().join("flat.xlsx")).unwrap();
    let sheet = workbook.sheet(0).unwrap();
    assert!(sheet.merged_regions().is_empty());
    assert_eq!(sheet.value(6, 2).display(), "投保面积");
}

#[test]
fn convert_empty_tree() {
    let dir = tempfile::tempdir().unwrap();
    let output = lossgrid(dir.path())
        .args(["convert", dir.path().to_str().unwrap()])
        .output()
        .expect("lossgrid convert");
    assert!(output.status.success());
    assert!(stdout(&output).contains("0 converted, 0 skipped, 0 failed"));
}

#[test]
fn missing_input_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = lossgrid(dir.path())
        .args(["flatten", "nope.xlsx", "out.xlsx"])
        .current_dir(dir.path())
        .output()
        .expect("lossgrid flatten");
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).starts_with("error: no such file"));
}
