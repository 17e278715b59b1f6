use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::EnrichError;
use crate::header::normalize_header;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Everything the pipeline needs, passed explicitly into each entry point.
///
/// Every field has a default, so an empty TOML document is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichConfig {
    /// Multiplier applied to the insured area to derive the amount.
    pub factor: f64,
    /// Candidate header rows, scanned in order (1-based).
    pub header_rows: Vec<usize>,
    /// Insured-area column (required, numeric).
    pub area_header: String,
    /// Insured-person column (required, join key).
    pub person_header: String,
    /// Derived amount column (created if absent).
    pub amount_header: String,
    /// Derived loss-degree column (created if absent).
    pub loss_header: String,
    /// Written to the amount column when the area is not a number.
    pub error_marker: String,
    /// Fill applied to rows with an exact loss-record match, as `RRGGBB`.
    pub highlight_color: String,
    /// Administrative suffixes stripped when deriving a village name.
    pub village_suffixes: Vec<String>,
    pub layout: LayoutConfig,
    pub lookup: LookupConfig,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            factor: 23.0,
            header_rows: vec![5, 6],
            area_header: "投保面积".into(),
            person_header: "被保险人".into(),
            amount_header: "赔偿款".into(),
            loss_header: "损失程度".into(),
            error_marker: "数据错误".into(),
            highlight_color: "FFFF00".into(),
            village_suffixes: vec!["村民委员会".into(), "村委会".into(), "村委".into(), "居委会".into()],
            layout: LayoutConfig::default(),
            lookup: LookupConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Rows 1..=title_rows form the title banner.
    pub title_rows: usize,
    /// Single row merged across the sheet below the banner.
    pub subtitle_row: usize,
    pub title_font_size: f32,
    /// Uniform width for every column, in Excel character units.
    pub column_width: f64,
    /// Header of a column that gets its own width (identifier-like column).
    pub wide_column: Option<String>,
    pub wide_column_width: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            title_rows: 3,
            subtitle_row: 4,
            title_font_size: 24.0,
            column_width: 15.0,
            wide_column: Some("身份证号".into()),
            wide_column_width: 22.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// SQLite database holding `loss_records`.
    pub db_path: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Loading + validation
// ---------------------------------------------------------------------------

impl EnrichConfig {
    pub fn from_toml(input: &str) -> Result<Self, EnrichError> {
        let config: EnrichConfig =
            toml::from_str(input).map_err(|e| EnrichError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, EnrichError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| EnrichError::ConfigParse(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> Result<(), EnrichError> {
        if !self.factor.is_finite() {
            return Err(EnrichError::ConfigValidation(format!(
                "factor must be a finite number, got {}",
                self.factor
            )));
        }

        if self.header_rows.is_empty() {
            return Err(EnrichError::ConfigValidation("header_rows must not be empty".into()));
        }
        if self.header_rows.contains(&0) {
            return Err(EnrichError::ConfigValidation("header_rows are 1-based; 0 is not a row".into()));
        }
        if self.header_rows.windows(2).any(|w| w[0] >= w[1]) {
            return Err(EnrichError::ConfigValidation(format!(
                "header_rows must be strictly increasing, got {:?}",
                self.header_rows
            )));
        }

        for (field, value) in [
            ("area_header", &self.area_header),
            ("person_header", &self.person_header),
            ("amount_header", &self.amount_header),
            ("loss_header", &self.loss_header),
        ] {
            if normalize_header(value).is_empty() {
                return Err(EnrichError::ConfigValidation(format!("{field} must not be blank")));
            }
        }
        if normalize_header(&self.amount_header) == normalize_header(&self.loss_header) {
            return Err(EnrichError::ConfigValidation(
                "amount_header and loss_header must differ".into(),
            ));
        }

        self.highlight_rgb()?;

        let layout = &self.layout;
        if layout.title_rows == 0 || layout.subtitle_row <= layout.title_rows {
            return Err(EnrichError::ConfigValidation(format!(
                "layout.subtitle_row ({}) must come after the title rows (1..={})",
                layout.subtitle_row, layout.title_rows
            )));
        }
        if self.header_rows[0] <= layout.subtitle_row {
            return Err(EnrichError::ConfigValidation(format!(
                "header rows must start below layout.subtitle_row ({})",
                layout.subtitle_row
            )));
        }
        if !(layout.column_width > 0.0 && layout.wide_column_width > 0.0) {
            return Err(EnrichError::ConfigValidation("column widths must be positive".into()));
        }

        Ok(())
    }

    /// `highlight_color` as RGB bytes.
    pub fn highlight_rgb(&self) -> Result<[u8; 3], EnrichError> {
        let hex = self.highlight_color.trim().trim_start_matches('#');
        let invalid = || {
            EnrichError::ConfigValidation(format!(
                "highlight_color must be 6 hex digits (RRGGBB), got '{}'",
                self.highlight_color
            ))
        };
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let value = u32::from_str_radix(hex, 16).map_err(|_| invalid())?;
        Ok([(value >> 16) as u8, (value >> 8) as u8, value as u8])
    }

    /// The four header names the resolver looks for, normalized.
    pub fn target_headers(&self) -> [String; 4] {
        [
            normalize_header(&self.area_header),
            normalize_header(&self.person_header),
            normalize_header(&self.amount_header),
            normalize_header(&self.loss_header),
        ]
    }
}
