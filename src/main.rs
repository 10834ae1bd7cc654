use anyhow::Context;
use clap::{Parser, Subcommand};
use gridforge::cli;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gridforge")]
#[command(about = "Spreadsheet table engine: formula columns and Excel-compatible workbook decoding")]
#[command(long_about = "gridforge - typed tables with formula columns, and workbook decoding

COMMANDS:
  inspect   - Decode a workbook (.xlsx, or a JSON/YAML workbook dump)
  eval      - Evaluate the formula columns of a YAML table

EXAMPLES:
  gridforge inspect roster.xlsx
  gridforge inspect roster.xlsx --json > roster.json
  gridforge eval parts.yaml --sort qty:desc --filter status=open
  gridforge eval parts.yaml --formula \"=IF(qty>10,\\\"big\\\",\\\"small\\\")\"

LOGGING:
  Set GRIDFORGE_LOG (or RUST_LOG), e.g. GRIDFORGE_LOG=gridforge=debug")]
#[command(version)]
struct Cli {
    /// Engine configuration file (YAML)
    #[arg(long, global = true, env = "GRIDFORGE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(long_about = "Decode every sheet of a workbook.

Resolves sheet dimensions (capped by decode.max_rows / decode.max_cols),
cell values and display text, styles, borders and merged ranges.

INPUT FORMATS:
  .xlsx / .xlsm   read through calamine (values, formulas, merges)
  .json / .yaml   a serialized in-memory workbook

Prints a per-sheet summary, or the decoded worksheets with --json.")]
    /// Decode a workbook and summarize its sheets
    Inspect {
        /// Workbook file
        file: PathBuf,

        /// Print the decoded worksheets as JSON
        #[arg(long)]
        json: bool,
    },

    #[command(long_about = "Evaluate a YAML table document.

The table file holds 'columns' and 'rows'. Formula columns are evaluated
for every row; filters and sort shape which rows are shown and in what
order. Validation issues are reported after the rows.

EXAMPLES:
  gridforge eval parts.yaml
  gridforge eval parts.yaml --sort name
  gridforge eval parts.yaml --filter status=open --filter name=bolt
  gridforge eval parts.yaml --formula \"=SUM(qty)\"")]
    /// Evaluate formula columns of a YAML table
    Eval {
        /// Table document (YAML)
        file: PathBuf,

        /// Evaluate this formula for every row instead of printing the columns
        #[arg(short, long)]
        formula: Option<String>,

        /// Sort by column, optionally with a direction (col:desc)
        #[arg(short, long)]
        sort: Option<String>,

        /// Keep rows whose column contains a substring (col=sub), repeatable
        #[arg(long)]
        filter: Vec<String>,

        /// Use the structured formula parser (nested calls, [Column Name])
        #[arg(long)]
        structured: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("GRIDFORGE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| "gridforge=warn".into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { file, json } => cli::inspect(file.clone(), cli.config, json)
            .with_context(|| format!("Failed to inspect {}", file.display())),

        Commands::Eval {
            file,
            formula,
            sort,
            filter,
            structured,
        } => cli::eval(
            file.clone(),
            cli::EvalOptions {
                config: cli.config,
                formula,
                sort,
                filters: filter,
                structured,
            },
        )
        .with_context(|| format!("Failed to evaluate {}", file.display())),
    }
}
