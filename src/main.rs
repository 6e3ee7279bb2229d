use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;

use file_joiner::config::{Config, DropPolicy};
use file_joiner::joiner::{JoinRequest, Joiner, NormalizeOptions};
use file_joiner::types::{JoinedTable, OutputFormat};
use file_joiner::{files, logging, metrics, server};

#[derive(Parser)]
#[command(name = "file_joiner")]
#[command(about = "Join tab-separated exports sharing a filename prefix into one spreadsheet")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file (defaults to $JOINER_CONFIG, then joiner.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join the given files and write the result
    Join {
        /// Files to join, in order
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Output name prefix (defaults to the files' common prefix)
        #[arg(long)]
        stub: Option<String>,
        /// Output format: xlsx or csv
        #[arg(long)]
        format: Option<OutputFormat>,
        /// Directory the joined file is written to
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Fail when the "#" column is missing instead of skipping the drop
        #[arg(long)]
        strict_drop: bool,
        /// Keep each row's original per-file row number
        #[arg(long)]
        keep_index: bool,
        /// Print the first N joined rows
        #[arg(long, value_name = "N")]
        preview: Option<usize>,
    },
    /// Check file naming and show the suggested stub
    Inspect {
        files: Vec<PathBuf>,
    },
    /// Serve the upload form
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
}

fn print_preview(table: &JoinedTable, limit: usize) {
    println!("\n{}", table.columns.join("\t"));
    for row in table.rows.iter().take(limit) {
        let cells: Vec<String> = row.cells.iter().map(|c| c.to_string()).collect();
        println!("{}", cells.join("\t"));
    }
    if table.row_count() > limit {
        println!("... {} more rows", table.row_count() - limit);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let _guard = logging::init_logging(&config.logging.dir);

    match cli.command {
        Commands::Join {
            files: paths,
            stub,
            format,
            output_dir,
            strict_drop,
            keep_index,
            preview,
        } => {
            let mut options: NormalizeOptions = config.normalize.clone().into();
            if strict_drop {
                options.drop_policy = DropPolicy::Strict;
            }
            if keep_index {
                options.reset_index = false;
            }
            let joiner = Joiner::from_config(&config)?.with_normalize_options(options);

            let inputs = files::load_inputs(&paths)?;
            let outcome = match joiner.run(JoinRequest {
                files: inputs,
                stub,
                format,
            }) {
                Ok(o) => o,
                Err(e) => {
                    let p = e.to_presentation();
                    error!("Join failed: {}", e);
                    println!("⚠️  {}: {}", p.title, p.message);
                    std::process::exit(if e.is_user_error() { 2 } else { 1 });
                }
            };

            let dir = output_dir.unwrap_or_else(|| config.output.dir.clone());
            let path = files::write_artifact(&dir, &outcome.artifact)?;

            let summary = &outcome.summary;
            println!("\n📊 Join Results for '{}':", summary.stub);
            println!("   Files joined: {}", summary.file_count);
            println!("   Files with the same prefix: {}", summary.matching_count);
            println!("   Rows: {}", summary.row_count);
            println!("   Columns: {}", summary.columns.join(", "));
            println!("   Output file: {}", path.display());

            if let Some(limit) = preview {
                print_preview(&outcome.table, limit);
            }
        }
        Commands::Inspect { files: paths } => {
            let joiner = Joiner::from_config(&config)?;
            let inputs = files::load_inputs(&paths)?;
            match joiner.inspect(&inputs, None) {
                Ok(report) => println!("{}", serde_json::to_string_pretty(&report)?),
                Err(e) => {
                    let p = e.to_presentation();
                    println!("⚠️  {}: {}", p.title, p.message);
                    std::process::exit(2);
                }
            }
        }
        Commands::Serve { port } => {
            metrics::init_metrics();
            let joiner = Arc::new(Joiner::from_config(&config)?);
            let port = port.unwrap_or(config.server.port);
            server::start_server(joiner, port, config.server.max_upload_bytes).await?;
        }
    }
    Ok(())
}
