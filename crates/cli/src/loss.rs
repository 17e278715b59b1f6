// import-loss command

use std::path::PathBuf;

use lossgrid_enrich::loss_import::{import_loss_file, import_loss_tree};
use lossgrid_enrich::SqliteLossStore;

use crate::exit_codes::{EXIT_IMPORT_FAILURES, EXIT_USAGE};
use crate::settings::{load_config, require_db, Overrides};
use crate::CliError;

pub fn cmd_import_loss(path: PathBuf, db: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<(), CliError> {
    if !path.exists() {
        return Err(CliError::new(EXIT_USAGE, format!("no such file or directory: {}", path.display())));
    }
    let config = load_config(config_path.as_deref(), Overrides { db, ..Default::default() })?;
    let db_path = require_db(&config)?;
    let mut store = SqliteLossStore::open(&db_path).map_err(CliError::enrich)?;
    let suffixes = &config.village_suffixes;

    if path.is_file() {
        let inserted = import_loss_file(&mut store, &path, suffixes).map_err(CliError::enrich)?;
        println!("{}: {} records", path.display(), inserted);
        return Ok(());
    }

    let summary = import_loss_tree(&mut store, &path, suffixes);
    for (file, inserted) in &summary.imported {
        println!("{}: {} records", file.display(), inserted);
    }
    for (file, err) in &summary.failures {
        eprintln!("✗ {}: {}", file.display(), err);
    }
    println!("{}", summary.summary());

    if !summary.failures.is_empty() {
        return Err(CliError::new(
            EXIT_IMPORT_FAILURES,
            format!("{} loss workbooks could not be imported", summary.failures.len()),
        ));
    }
    Ok(())
}
