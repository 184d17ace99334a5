//! nsfslite CLI
//!
//! Command-line tools for nsfslite stores.
//!
//! # Commands
//!
//! - `inspect` - Display header slots, variables and free space
//! - `dump-wal` - Dump WAL records for debugging
//! - `read` - Print bytes of a variable
//! - `recover` - Replay the WAL into the storage file

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// nsfslite command-line store tools.
#[derive(Parser)]
#[command(name = "nsfslite")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the storage file
    #[arg(global = true, short, long)]
    db: Option<PathBuf>,

    /// Path to the write-ahead log
    #[arg(global = true, short, long)]
    wal: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display header slots, variables and free extents
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Dump WAL records for debugging
    DumpWal {
        /// Maximum number of records to dump
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print bytes of a variable
    Read {
        /// Variable name
        #[arg(short, long)]
        name: String,

        /// First position
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        start: i64,

        /// Stop position, exclusive (defaults to the variable length)
        #[arg(long, allow_negative_numbers = true)]
        stop: Option<i64>,

        /// Distance between positions
        #[arg(long, default_value = "1", allow_negative_numbers = true)]
        step: i64,

        /// Print hex instead of raw bytes
        #[arg(long)]
        hex: bool,
    },

    /// Replay the WAL into the storage file and close
    Recover,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { format } => {
            let db = cli.db.ok_or("--db is required for inspect")?;
            commands::inspect::run(&db, &format)?;
        }
        Commands::DumpWal { limit, format } => {
            let wal = cli.wal.ok_or("--wal is required for dump-wal")?;
            commands::dump_wal::run(&wal, limit, &format)?;
        }
        Commands::Read {
            name,
            start,
            stop,
            step,
            hex,
        } => {
            let db = cli.db.ok_or("--db is required for read")?;
            let wal = cli.wal.ok_or("--wal is required for read")?;
            let range = commands::read::Range { start, stop, step };
            commands::read::run(&db, &wal, &name, range, hex)?;
        }
        Commands::Recover => {
            let db = cli.db.ok_or("--db is required for recover")?;
            let wal = cli.wal.ok_or("--wal is required for recover")?;
            commands::recover::run(&db, &wal)?;
        }
        Commands::Version => {
            println!("nsfslite CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("nsfslite Core v{}", nsfslite_core::VERSION);
        }
    }

    Ok(())
}
