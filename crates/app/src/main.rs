use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use iesal_ocr::MimeHint;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "iesal")]
#[command(about = "Read amount, transaction number and date-time off transfer receipts", long_about = None)]
struct Cli {
    /// Extraction config (TOML). Defaults to <config dir>/iesal/config.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// OCR language hint, e.g. `ara+eng`. An empty value disables the hint.
    #[arg(long, global = true)]
    lang: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full pipeline on a receipt image and print the result as JSON
    Scan {
        image: PathBuf,
        /// Declared encoding (png or jpeg); derived from the extension otherwise
        #[arg(long)]
        format: Option<MimeHint>,
        /// Use the contents of this file as the OCR output instead of an engine
        #[arg(long)]
        ocr_text: Option<PathBuf>,
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
    },
    /// Extract fields from already-recognized text (file or stdin)
    Parse { file: Option<PathBuf> },
    /// Write the binarized image the OCR engine would see
    Preprocess { image: PathBuf, out: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the JSON result.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = commands::resolve_config(cli.config.as_deref(), cli.lang)?;

    match cli.command {
        Commands::Scan { image, format, ocr_text, timeout_secs } => {
            commands::scan(config, &image, format, ocr_text.as_deref(), timeout_secs).await
        }
        Commands::Parse { file } => commands::parse(config, file.as_deref()).await,
        Commands::Preprocess { image, out } => commands::preprocess(&config, &image, &out).await,
    }
}
