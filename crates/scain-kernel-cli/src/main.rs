//! scain - SCAIN Kernel administration CLI
//!
//! Issues and redeems claim codes, records and verifies events, and hashes
//! JSON payloads against a local SQLite database.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scain_kernel::{DeviceType, HashAlgorithm, Scain, ScainConfig};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod commands;
mod input;

use commands::{claims, events, hash};

#[derive(Parser, Debug)]
#[command(name = "scain")]
#[command(version, about = "SCAIN Kernel claim codes and event fingerprints", long_about = None)]
struct Cli {
    /// Path to the SQLite database
    #[arg(long, global = true, default_value = "scain.db")]
    db: PathBuf,

    /// Digest algorithm for hashing and newly recorded events
    #[arg(long, global = true, default_value = "sha256")]
    algorithm: HashAlgorithm,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    // === Claim codes ===
    /// Issue new claim codes
    Issue {
        /// Device type (ESP32, ExpressLink, LoRaWAN, Tracker)
        #[arg(long = "type")]
        device_type: DeviceType,

        /// Number of codes to issue
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,

        /// Hours until the codes expire (default: never)
        #[arg(long)]
        ttl_hours: Option<u64>,
    },

    /// Redeem a claim code
    Claim {
        /// The 8-character code
        code: String,

        /// Device type being claimed
        #[arg(long = "type")]
        device_type: DeviceType,

        /// Bind this device id instead of deriving one
        #[arg(long)]
        device_id: Option<String>,
    },

    /// List claim codes
    #[command(alias = "ls")]
    List {
        /// Only codes for this device type
        #[arg(long = "type")]
        device_type: Option<DeviceType>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    // === Events ===
    /// Record a JSON payload as an event
    Record {
        /// Input JSON file (or stdin if not provided)
        input: Option<PathBuf>,
    },

    /// Transform and record a raw device reading
    Ingest {
        /// Input JSON file (or stdin if not provided)
        input: Option<PathBuf>,
    },

    /// Verify a recorded event
    Verify {
        /// Event id (32 hex characters)
        event_id: String,
    },

    /// Show a recorded event and its canonical payload
    Show {
        /// Event id (32 hex characters)
        event_id: String,
    },

    // === Hashing ===
    /// Print the digest of a JSON payload
    Hash {
        /// Input JSON file (or stdin if not provided)
        input: Option<PathBuf>,

        /// Print the canonical bytes instead of the digest
        #[arg(long)]
        canonical: bool,

        /// Exit with an error unless the digest equals this value
        #[arg(long)]
        expect: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    // Hashing needs no database.
    if let Commands::Hash {
        input,
        canonical,
        expect,
    } = &cli.command
    {
        return hash::run(input.as_deref(), cli.algorithm, *canonical, expect.as_deref());
    }

    let config = ScainConfig {
        hash_algorithm: cli.algorithm,
        ..ScainConfig::default()
    };
    let scain = Scain::open(&cli.db, config)
        .with_context(|| format!("failed to open database {}", cli.db.display()))?;

    let result = match cli.command {
        Commands::Issue {
            device_type,
            count,
            ttl_hours,
        } => claims::issue(&scain, device_type, count, ttl_hours).await,
        Commands::Claim {
            code,
            device_type,
            device_id,
        } => claims::claim(&scain, &code, device_type, device_id).await,
        Commands::List { device_type, json } => claims::list(&scain, device_type, json).await,
        Commands::Record { input } => events::record(&scain, input.as_deref()).await,
        Commands::Ingest { input } => events::ingest(&scain, input.as_deref()).await,
        Commands::Verify { event_id } => events::verify(&scain, &event_id).await,
        Commands::Show { event_id } => events::show(&scain, &event_id).await,
        Commands::Hash { .. } => Ok(()),
    };

    scain.shutdown().await;
    result
}
