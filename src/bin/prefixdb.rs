mod cli_utils;
mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::{cmd_bench, cmd_import, cmd_inspect, cmd_search};

#[derive(Parser)]
#[command(name = "prefixdb")]
#[command(
    about = "Build and query compact IPv4 prefix databases",
    long_about = "prefixdb - Embeddable IPv4 prefix-matching database\n\n\
    Builds a compact binary database from a list of IPv4 prefixes and answers\n\
    whether addresses fall inside any of them. Databases can be memory-mapped\n\
    and queried without parsing.\n\n\
    Examples:\n\
      prefixdb import blocklist.txt blocklist.pfdb\n\
      prefixdb search blocklist.pfdb 192.168.3.4 10.1.2.3\n\
      prefixdb inspect blocklist.pfdb --json\n\
      prefixdb bench -n 100000"
)]
#[command(version, infer_subcommands = true)]
struct Cli {
    /// Log library diagnostics to stderr (RUST_LOG overrides the level)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a database from a text prefix list
    Import {
        /// Prefix list, one prefix per line ("-" for stdin, .gz accepted)
        #[arg(value_name = "LIST")]
        list: PathBuf,

        /// Database file to write
        #[arg(value_name = "DATABASE")]
        database: PathBuf,
    },

    /// Search addresses in a database
    Search {
        /// Path to the database
        #[arg(value_name = "DATABASE")]
        database: PathBuf,

        /// Dotted-quad addresses to look up
        #[arg(value_name = "ADDRESS", required = true)]
        addresses: Vec<String>,

        /// Print results as a JSON array
        #[arg(short, long)]
        json: bool,

        /// Memory-map the database instead of reading it
        #[arg(long)]
        mmap: bool,
    },

    /// Show the footer and geometry of a database
    Inspect {
        /// Path to the database
        #[arg(value_name = "DATABASE")]
        database: PathBuf,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Test and benchmark the library (build, save, load, search)
    Bench {
        /// Number of random prefixes to add
        #[arg(short = 'n', long, default_value = "500000")]
        prefixes: usize,

        /// Number of random addresses to search
        #[arg(short = 'q', long, default_value = "500000")]
        searches: usize,

        /// Output file for the test database (temp file if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep the generated database file after benchmarking
        #[arg(short, long)]
        keep: bool,
    },
}

fn init_tracing(verbose: bool) {
    // Library events stay quiet unless asked for; RUST_LOG wins when set
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Import { list, database } => cmd_import(list, database),
        Commands::Search {
            database,
            addresses,
            json,
            mmap,
        } => cmd_search(database, addresses, json, mmap),
        Commands::Inspect { database, json } => cmd_inspect(database, json),
        Commands::Bench {
            prefixes,
            searches,
            output,
            keep,
        } => cmd_bench(prefixes, searches, output, keep),
    }
}
