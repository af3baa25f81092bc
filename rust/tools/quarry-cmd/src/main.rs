use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "quarry-cmd")]
#[command(about = "Command-line utility for Quarry postings segments")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a text file into a segment, one document per line
    Ingest {
        /// Name of the indexed field
        #[arg(long, default_value = "body")]
        field: String,

        /// Index token positions
        #[arg(long)]
        positions: bool,

        /// Index token positions and byte offsets
        #[arg(long)]
        offsets: bool,

        /// Text file to index
        input: String,

        /// Output segment directory
        segment_dir: String,
    },

    /// Inspect a segment and display summary information
    Inspect {
        /// Increase verbosity (-v adds terms, -vv adds postings)
        #[arg(short, long, action = clap::ArgAction::Count)]
        verbose: u8,

        /// Segment directory to inspect
        segment_dir: String,
    },

    /// Verify the headers, footers and checksums of a segment
    Check {
        /// Segment directory to check
        segment_dir: String,
    },
}

fn main() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quarry=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest {
            field,
            positions,
            offsets,
            input,
            segment_dir,
        } => commands::ingest::run(field, positions, offsets, input, segment_dir),
        Commands::Inspect {
            verbose,
            segment_dir,
        } => commands::inspect::run(verbose, segment_dir),
        Commands::Check { segment_dir } => commands::check::run(segment_dir),
    }
}
