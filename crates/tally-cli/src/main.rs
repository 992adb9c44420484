//! `tally` CLI for building and querying static count indexes.
//!
//! Usage:
//!   `tally create data.csv -o out.tally`
//!   `tally query out.tally 'country = "DE" ; city'`
//!   `tally schema out.tally --full`

// CLI binary - relax pedantic lints for ergonomics
#![allow(clippy::pedantic)]

mod create;
mod query;
mod schema;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "tally")]
#[command(version)]
#[command(about = "Static index to quickly count rows and optionally group them", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Output format for query results
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum FormatArg {
    #[default]
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an index file from a CSV file
    Create {
        /// Input CSV file; the first record is the header
        input: PathBuf,

        /// Output index file
        #[arg(short, long, default_value = "out.tally")]
        output: PathBuf,

        /// Build through an on-disk scratch sorter (for inputs larger
        /// than memory)
        #[arg(long)]
        external: bool,

        /// Scratch file for --external (default: a temporary file)
        #[arg(long, requires = "external")]
        scratch: Option<PathBuf>,
    },

    /// Run a query against an index file
    Query {
        /// Index file to query
        index: PathBuf,

        /// Query text, e.g. 'country = "DE" & active = "true" ; city'
        query: String,

        /// Positional placeholder bindings ($1, $2, ...)
        #[arg(short, long = "arg")]
        args: Vec<String>,

        /// Decode all postings into memory at open time
        #[arg(short, long)]
        preload: bool,

        /// Bitmap cache size in bytes (0 disables the cache)
        #[arg(short, long)]
        cache_size: Option<u64>,

        /// Configuration file (default: ./tally.toml if present)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: FormatArg,
    },

    /// Show the schema of an index file
    Schema {
        /// Index file to inspect
        index: PathBuf,

        /// List every value instead of per-column value counts
        #[arg(long)]
        full: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Create {
            input,
            output,
            external,
            scratch,
        } => create::run(&input, &output, external, scratch.as_deref()),
        Commands::Query {
            index,
            query,
            args,
            preload,
            cache_size,
            config,
            format,
        } => query::run(
            &index,
            &query,
            &args,
            preload,
            cache_size,
            config.as_deref(),
            format,
        ),
        Commands::Schema { index, full } => schema::run(&index, full),
    }
}
