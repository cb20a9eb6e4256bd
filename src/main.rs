use clap::{Parser, Subcommand};
use colored::Colorize;
use sheetfill::cli::commands;
use sheetfill::error::FillResult;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sheetfill")]
#[command(about = "Fill spreadsheet templates from data")]
#[command(long_about = "sheetfill - template-driven xlsx report generator

Author a report template in any spreadsheet editor, then fill it here:

  {{name}}                 insert a value from the data
  {{helper arg \"lit\"}}     call a registered helper
  {{range key}} / {{end}}  repeat the enclosed rows per element

EXAMPLES:
  sheetfill render invoice.xlsx --data invoice.json --out out.xlsx
  sheetfill check invoice.xlsx

Helpers are registered through the library API; templates rendered from the
command line use plain value substitution and ranges.")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template workbook against a JSON data file
    Render {
        /// Path to the template .xlsx
        template: PathBuf,

        /// Path to a JSON file with the data context
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Where to write the rendered workbook
        #[arg(short, long, default_value = "out.xlsx")]
        out: PathBuf,
    },

    /// Validate template syntax without rendering
    Check {
        /// Path to the template .xlsx
        template: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sheetfill=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let result: FillResult<()> = match cli.command {
        Commands::Render {
            template,
            data,
            out,
        } => commands::render(template, data, out),
        Commands::Check { template } => commands::check(template),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
