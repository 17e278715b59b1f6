// enrich / headers commands

use std::path::PathBuf;

use lossgrid_engine::sheet::col_to_letter;
use lossgrid_enrich::header::{normalize_header, resolve_headers};
use lossgrid_enrich::{process_batch, BatchSummary, FileReport, SheetReport, SqliteLossStore};
use serde_json::{json, Value};

use crate::exit_codes::{EXIT_BATCH_FAILURES, EXIT_READ, EXIT_USAGE};
use crate::settings::{load_config, require_db, Overrides};
use crate::CliError;

pub fn cmd_enrich(
    input_dir: PathBuf,
    output_dir: Option<PathBuf>,
    factor: Option<f64>,
    db: Option<PathBuf>,
    config_path: Option<PathBuf>,
    header_rows: Option<Vec<usize>>,
    json: bool,
) -> Result<(), CliError> {
    if !input_dir.is_dir() {
        return Err(CliError::new(EXIT_USAGE, format!("not a directory: {}", input_dir.display())));
    }

    let config = load_config(config_path.as_deref(), Overrides { factor, header_rows, db })?;
    let db_path = require_db(&config)?;
    if !db_path.is_file() {
        return Err(CliError::args(format!("loss-record database not found: {}", db_path.display()))
            .with_hint("build it first with `lossgrid import-loss <dir> --db <PATH>`"));
    }
    let store = SqliteLossStore::open(&db_path).map_err(CliError::enrich)?;

    let summary = process_batch(&input_dir, output_dir.as_deref(), &config, &store);

    if json {
        println!("{}", serde_json::to_string_pretty(&batch_json(&summary)).unwrap_or_default());
    } else {
        for report in &summary.reports {
            let marker = if report.written { "✓" } else { "-" };
            println!("{} {}: {}", marker, report.input.display(), report.summary());
        }
        for (path, err) in &summary.failures {
            eprintln!("✗ {}: {}", path.display(), err);
        }
        println!("{}", summary.summary());
    }

    if summary.has_failures() {
        return Err(CliError::new(
            EXIT_BATCH_FAILURES,
            format!("{} of {} files failed", summary.failures.len(), summary.failures.len() + summary.reports.len()),
        ));
    }
    Ok(())
}

fn sheet_json(sheet: &SheetReport) -> Value {
    json!({
        "sheet": sheet.sheet,
        "enriched": sheet.enriched(),
        "columns": sheet.columns,
        "created_columns": sheet.created_columns,
        "data_start_row": sheet.data_start_row,
        "stats": sheet.stats,
    })
}

fn file_json(report: &FileReport) -> Value {
    json!({
        "input": report.input.display().to_string(),
        "output": report.output.display().to_string(),
        "village": report.village,
        "records": report.records,
        "written": report.written,
        "sheets": report.sheets.iter().map(sheet_json).collect::<Vec<_>>(),
        "warnings": report.warnings.iter().map(|w| json!({
            "kind": w.kind(),
            "message": w.to_string(),
        })).collect::<Vec<_>>(),
    })
}

fn batch_json(summary: &BatchSummary) -> Value {
    json!({
        "files": summary.reports.iter().map(file_json).collect::<Vec<_>>(),
        "failures": summary.failures.iter().map(|(path, err)| json!({
            "input": path.display().to_string(),
            "kind": err.kind(),
            "message": err.to_string(),
        })).collect::<Vec<_>>(),
        "summary": {
            "processed": summary.reports.len(),
            "written": summary.reports.iter().filter(|r| r.written).count(),
            "failed": summary.failures.len(),
            "warnings": summary.warning_count(),
        },
    })
}

pub fn cmd_headers(
    file: PathBuf,
    config_path: Option<PathBuf>,
    header_rows: Option<Vec<usize>>,
    json: bool,
) -> Result<(), CliError> {
    let config = load_config(config_path.as_deref(), Overrides { header_rows, ..Default::default() })?;
    let (workbook, _) = lossgrid_io::xlsx::import(&file)
        .map_err(|e| CliError::new(EXIT_READ, format!("cannot read {}: {}", file.display(), e)))?;

    let mut targets: Vec<String> = config.target_headers().to_vec();
    if let Some(wide) = &config.layout.wide_column {
        targets.push(normalize_header(wide));
    }

    let mut sheets = Vec::new();
    for sheet in workbook.sheets() {
        let index = resolve_headers(sheet, &config.header_rows, &targets);
        let headers: Vec<Value> = index
            .entries()
            .into_iter()
            .map(|(name, loc)| {
                json!({
                    "name": name,
                    "column": loc.column,
                    "letter": col_to_letter(loc.column),
                    "row": loc.row,
                })
            })
            .collect();
        let missing: Vec<&String> = targets[..2].iter().filter(|t| !index.contains(t)).collect();

        if !json {
            println!("{}  (data from row {})", sheet.name, index.data_start_row());
            for (name, loc) in index.entries() {
                println!("  {:>4}  row {}  {}", col_to_letter(loc.column), loc.row, name);
            }
            for name in &missing {
                println!("  missing: {}", name);
            }
        }

        sheets.push(json!({
            "sheet": sheet.name,
            "band": index.band().map(|(first, last)| vec![first, last]),
            "data_start_row": index.data_start_row(),
            "headers": headers,
            "missing": missing,
        }));
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&Value::Array(sheets)).unwrap_or_default());
    }
    Ok(())
}
