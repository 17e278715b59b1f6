// flatten / convert commands

use std::path::PathBuf;

use lossgrid_enrich::flatten_file;

use crate::exit_codes::{EXIT_CONVERT_FAILURES, EXIT_USAGE};
use crate::CliError;

pub fn cmd_flatten(input: PathBuf, output: PathBuf) -> Result<(), CliError> {
    if !input.is_file() {
        return Err(CliError::new(EXIT_USAGE, format!("no such file: {}", input.display())));
    }
    let flattened = flatten_file(&input, &output).map_err(CliError::enrich)?;
    println!("{} → {}: {} merged ranges flattened", input.display(), output.display(), flattened);
    Ok(())
}

pub fn cmd_convert(dir: PathBuf) -> Result<(), CliError> {
    if !dir.is_dir() {
        return Err(CliError::new(EXIT_USAGE, format!("not a directory: {}", dir.display())));
    }
    let summary = lossgrid_io::convert::convert_xls_tree(&dir);
    for path in &summary.converted {
        println!("✓ {}", path.display());
    }
    for (path, err) in &summary.errors {
        eprintln!("✗ {}: {}", path.display(), err);
    }
    println!("{}", summary.summary());

    if !summary.errors.is_empty() {
        return Err(CliError::new(
            EXIT_CONVERT_FAILURES,
            format!("{} workbooks could not be converted", summary.errors.len()),
        ));
    }
    Ok(())
}
