use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::Env;

use sqlite_probe::query::run_suite;
use sqlite_probe::{Database, QueryConfig};

#[derive(Parser)]
#[command(name = "sqlite-probe")]
#[command(author, version, about = "Read-only SQLite B-tree query prober with page-I/O telemetry")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the twelve-query suite and report per-query telemetry
    Run {
        /// JSON configuration file (database paths and query constants)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Display the header and catalog of a database file
    Info {
        /// Path to the database file
        #[arg(value_name = "DATABASE")]
        database: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run { config, output } => {
            let config = match config {
                Some(path) => QueryConfig::from_file(&path)?,
                None => QueryConfig::default(),
            };

            match output {
                Some(path) => {
                    let mut out = BufWriter::new(File::create(&path)?);
                    run_suite(&config, &mut out)?;
                    out.flush()?;
                }
                None => {
                    let stdout = io::stdout();
                    let mut out = stdout.lock();
                    run_suite(&config, &mut out)?;
                }
            }
        }

        Commands::Info { database } => {
            let db = Database::open(&database)?;
            println!("File: {}", database.display());
            println!("Page size: {} bytes", db.header().page_size);
            println!("Page count: {}", db.page_count());
            println!("Catalog:");
            for entry in db.catalog()?.entries() {
                println!(
                    "  {} {} (root page {})",
                    entry.kind.as_str(),
                    entry.name,
                    entry.root_page
                );
            }
        }
    }

    Ok(())
}
