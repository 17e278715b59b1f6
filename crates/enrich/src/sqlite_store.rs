// Loss-record store backed by SQLite

use std::path::Path;

use rusqlite::{params, Connection};

use crate::error::EnrichError;
use crate::loss_import::LossSample;
use crate::lookup::{LossRecord, LossStore};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS loss_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    township TEXT,
    village TEXT NOT NULL,
    risk_date TEXT,                      -- ISO date when the source held a date
    growth_stage TEXT,
    loss_level TEXT,
    farmer_name TEXT,
    plot_name TEXT,
    average_spikes_per_mu REAL,
    average_grains_per_spike REAL,
    thousand_grain_weight REAL,
    current_yield_kg_per_mu REAL,
    historical_yield_kg_per_mu REAL,
    loss_percentage REAL,                -- fraction, 0.3 = 30%
    avg_loss_same_level REAL,
    source_file TEXT NOT NULL,
    import_date TEXT NOT NULL,           -- RFC 3339
    is_calculated_yield INTEGER NOT NULL DEFAULT 0,
    is_calculated_loss INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_loss_records_township ON loss_records (township);
CREATE INDEX IF NOT EXISTS idx_loss_records_village ON loss_records (village);
CREATE INDEX IF NOT EXISTS idx_loss_records_risk_date ON loss_records (risk_date);
CREATE INDEX IF NOT EXISTS idx_loss_records_farmer_name ON loss_records (farmer_name);
CREATE INDEX IF NOT EXISTS idx_loss_records_loss_percentage ON loss_records (loss_percentage);
"#;

pub struct SqliteLossStore {
    conn: Connection,
}

impl SqliteLossStore {
    /// Open (or create) the database and make sure the schema exists.
    pub fn open(path: &Path) -> Result<Self, EnrichError> {
        let conn = Connection::open(path)
            .map_err(|e| EnrichError::Lookup(format!("{}: {e}", path.display())))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, EnrichError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, EnrichError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Insert all samples in one transaction. Returns the number inserted.
    pub fn insert_samples(&mut self, samples: &[LossSample]) -> Result<usize, EnrichError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO loss_records (township, village, risk_date, growth_stage, loss_level, farmer_name, plot_name, \
                 average_spikes_per_mu, average_grains_per_spike, thousand_grain_weight, current_yield_kg_per_mu, \
                 historical_yield_kg_per_mu, loss_percentage, avg_loss_same_level, source_file, import_date, \
                 is_calculated_yield, is_calculated_loss) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            )?;
            for s in samples {
                stmt.execute(params![
                    s.township,
                    s.village,
                    s.risk_date,
                    s.growth_stage,
                    s.loss_level,
                    s.farmer_name,
                    s.plot_name,
                    s.average_spikes_per_mu,
                    s.average_grains_per_spike,
                    s.thousand_grain_weight,
                    s.current_yield_kg_per_mu,
                    s.historical_yield_kg_per_mu,
                    s.loss_percentage,
                    s.avg_loss_same_level,
                    s.source_file,
                    s.import_date.to_rfc3339(),
                    s.is_calculated_yield,
                    s.is_calculated_loss,
                ])?;
            }
        }
        tx.commit()?;
        Ok(samples.len())
    }

    pub fn count(&self) -> Result<usize, EnrichError> {
        let n: i64 = self.conn.query_row("SELECT COUNT(*) FROM loss_records", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

impl LossStore for SqliteLossStore {
    fn find_by_village(&self, village: &str) -> Result<Vec<LossRecord>, EnrichError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT village, farmer_name, loss_percentage, avg_loss_same_level \
             FROM loss_records WHERE village = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![village.trim()], |row| {
            Ok(LossRecord {
                village: row.get(0)?,
                farmer_name: row.get(1)?,
                loss_percentage: row.get(2)?,
                avg_loss_same_level: row.get(3)?,
            })
        })?;
        let records = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}
