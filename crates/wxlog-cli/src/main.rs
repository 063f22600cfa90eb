use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use wxlog_cli::{export, load_dataset, parse_time_arg, run_query, write_labels, write_range, QueryRequest};
use wxlog_config::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "wxlog", about = "Query weather station export files")]
struct Cli {
    /// Configuration file (defaults to $WXLOG_CONFIG or ./wxlog.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List selectable column labels
    Labels { dir: Option<PathBuf> },
    /// Print the first and last timestamp
    Range { dir: Option<PathBuf> },
    /// Print columns for a time window
    Query {
        dir: Option<PathBuf>,
        /// Exclusive window start
        #[arg(long)]
        from: Option<String>,
        /// Inclusive window end
        #[arg(long)]
        to: Option<String>,
        /// Column label or key; repeatable
        #[arg(short, long = "column", required = true)]
        columns: Vec<String>,
        /// Add a polynomial trend of this degree per column
        #[arg(long)]
        fit: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Write the merged, normalized series to one file
    Export {
        dir: Option<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    wxlog_obs::init("wxlog");

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    }
    .context("Failed to load configuration")?;
    let display_format = config.display_time_format();

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Command::Labels { dir } => {
            let (_, dataset) = load_dataset(&config, dir.as_deref())?;
            write_labels(&dataset, &mut out)?;
        }
        Command::Range { dir } => {
            let (_, dataset) = load_dataset(&config, dir.as_deref())?;
            write_range(&dataset, &display_format, &mut out)?;
        }
        Command::Query {
            dir,
            from,
            to,
            columns,
            fit,
            json,
        } => {
            let from = from
                .map(|v| parse_time_arg(&v, &display_format))
                .transpose()?;
            let to = to.map(|v| parse_time_arg(&v, &display_format)).transpose()?;
            let (_, dataset) = load_dataset(&config, dir.as_deref())?;
            let request = QueryRequest {
                columns,
                from,
                to,
                fit_degree: fit,
                json,
            };
            run_query(&dataset, &request, &display_format, &mut out)?;
        }
        Command::Export { dir, output } => {
            let (options, dataset) = load_dataset(&config, dir.as_deref())?;
            let file = File::create(&output)
                .with_context(|| format!("Failed to create {}", output.display()))?;
            let mut writer = BufWriter::new(file);
            let written = export(&dataset, &options, &mut writer)?;
            writer.flush()?;
            tracing::info!(records = written, output = %output.display(), "Export written");
        }
    }

    out.flush()?;
    Ok(())
}
