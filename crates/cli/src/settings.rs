// Config resolution: --config, then the user config file, then defaults.
// Command-line overrides are applied last and the result validated once.

use std::path::{Path, PathBuf};

use lossgrid_enrich::EnrichConfig;

use crate::CliError;

/// Per-user config file: `<config_dir>/lossgrid/config.toml`.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("lossgrid").join("config.toml"))
}

/// Flags that override the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub factor: Option<f64>,
    pub header_rows: Option<Vec<usize>>,
    pub db: Option<PathBuf>,
}

pub fn load_config(explicit: Option<&Path>, overrides: Overrides) -> Result<EnrichConfig, CliError> {
    let mut config = match explicit {
        Some(path) => {
            tracing::debug!("config: {}", path.display());
            EnrichConfig::load(path).map_err(CliError::enrich)?
        }
        None => match user_config_path().filter(|p| p.is_file()) {
            Some(path) => {
                tracing::debug!("config: {}", path.display());
                EnrichConfig::load(&path)
                    .map_err(CliError::enrich)
                    .map_err(|e| e.with_hint(format!("fix or remove {}", path.display())))?
            }
            None => {
                tracing::debug!("config: built-in defaults");
                EnrichConfig::default()
            }
        },
    };

    if let Some(factor) = overrides.factor {
        config.factor = factor;
    }
    if let Some(rows) = overrides.header_rows {
        config.header_rows = rows;
    }
    if let Some(db) = overrides.db {
        config.lookup.db_path = Some(db);
    }

    config.validate().map_err(CliError::enrich)?;
    Ok(config)
}

/// The loss-record database, or a usage error naming both ways to set it.
pub fn require_db(config: &EnrichConfig) -> Result<PathBuf, CliError> {
    config.lookup.db_path.clone().ok_or_else(|| {
        CliError::args("no loss-record database configured")
            .with_hint("pass --db <PATH>, set LOSSGRID_DB, or set [lookup] db_path in the config file")
    })
}
