// lossgrid CLI - claim-workbook enrichment from the command line

mod enrich;
mod exit_codes;
mod files;
mod loss;
mod settings;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use lossgrid_enrich::EnrichError;
use tracing_subscriber::EnvFilter;

use exit_codes::{enrich_exit_code, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "lossgrid")]
#[command(about = "Enrich per-village claim workbooks with compensation amounts and loss degrees")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// More log output (debug)
    #[arg(long, short = 'v', global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Less log output (warnings and errors only)
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by the commands that read the enrichment config.
#[derive(Args, Debug)]
struct ConfigArgs {
    /// Config file (default: <config dir>/lossgrid/config.toml when present)
    #[arg(long, value_name = "FILE", env = "LOSSGRID_CONFIG")]
    config: Option<PathBuf>,

    /// Header rows to scan, 1-based (e.g. 5,6)
    #[arg(long, value_name = "ROWS", value_delimiter = ',')]
    header_rows: Option<Vec<usize>>,
}

#[derive(Subcommand)]
enum Commands {
    /// Enrich every .xlsx workbook under a directory
    #[command(after_help = "\
Examples:
  lossgrid enrich ./理赔文件 --db loss.db
  lossgrid enrich ./理赔文件 --output-dir ./输出 --factor 17
  lossgrid enrich ./理赔文件 --header-rows 6,7 --json

The village is taken from each file name (张庄村委会.xlsx → 张庄村).
Without --output-dir, workbooks are rewritten in place.")]
    Enrich {
        /// Directory holding the claim workbooks (searched recursively)
        input_dir: PathBuf,

        /// Write results here, mirroring the input subdirectories
        #[arg(long, short = 'o', value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Compensation per unit of insured area
        #[arg(long)]
        factor: Option<f64>,

        /// Loss-record database (SQLite)
        #[arg(long, value_name = "PATH", env = "LOSSGRID_DB")]
        db: Option<PathBuf>,

        #[command(flatten)]
        config: ConfigArgs,

        /// Print a JSON report on stdout
        #[arg(long)]
        json: bool,
    },

    /// Unmerge every merged range, copying the anchor value and number format into each cell
    #[command(after_help = "\
Examples:
  lossgrid flatten 损失统计.xlsx 损失统计-展开.xlsx")]
    Flatten {
        /// Source workbook
        input: PathBuf,

        /// Destination workbook (may equal the source)
        output: PathBuf,
    },

    /// Convert every .xls under a directory to .xlsx
    #[command(after_help = "\
Examples:
  lossgrid convert ./理赔文件

Existing .xlsx files are never overwritten.")]
    Convert {
        /// Directory to search recursively
        dir: PathBuf,
    },

    /// Load loss-statistics workbooks into the loss-record database
    #[command(name = "import-loss", after_help = "\
Examples:
  lossgrid import-loss ./损失统计 --db loss.db
  lossgrid import-loss 东乡损失统计.xlsx --db loss.db

Row 1 holds the headers; 村委, 抽样农户名称 and 损失程度% are required.")]
    ImportLoss {
        /// A workbook, or a directory searched recursively for .xls/.xlsx
        path: PathBuf,

        /// Loss-record database (SQLite, created when missing)
        #[arg(long, value_name = "PATH", env = "LOSSGRID_DB")]
        db: Option<PathBuf>,

        /// Config file (for the village suffix list)
        #[arg(long, value_name = "FILE", env = "LOSSGRID_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Show the header columns the enricher would see in a workbook
    #[command(after_help = "\
Examples:
  lossgrid headers 张庄村委会.xlsx
  lossgrid headers 张庄村委会.xlsx --header-rows 6,7 --json")]
    Headers {
        /// Workbook to inspect
        file: PathBuf,

        #[command(flatten)]
        config: ConfigArgs,

        /// Print JSON on stdout
        #[arg(long)]
        json: bool,
    },
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nbuild:   debug",
            "\ntarget:  ", env!("TARGET"),
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nbuild:   release",
            "\ntarget:  ", env!("TARGET"),
        )
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_env("LOSSGRID_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Enrich { input_dir, output_dir, factor, db, config, json } => {
            enrich::cmd_enrich(input_dir, output_dir, factor, db, config.config, config.header_rows, json)
        }
        Commands::Flatten { input, output } => files::cmd_flatten(input, output),
        Commands::Convert { dir } => files::cmd_convert(dir),
        Commands::ImportLoss { path, db, config } => loss::cmd_import_loss(path, db, config),
        Commands::Headers { file, config, json } => {
            enrich::cmd_headers(file, config.config, config.header_rows, json)
        }
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    /// Create error from an enrichment error with the registry's exit code.
    pub fn enrich(err: EnrichError) -> Self {
        let hint = match &err {
            EnrichError::ConfigParse(_) => Some("check the TOML syntax and field names".to_string()),
            EnrichError::Lookup(_) => Some("is --db pointing at a database built by `lossgrid import-loss`?".to_string()),
            _ => None,
        };
        Self { code: enrich_exit_code(&err), message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
