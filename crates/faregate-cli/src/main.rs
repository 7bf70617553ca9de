//! faregate — operator CLI for the face-recognition fare gate.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;

use commands::{enroll, roster, scan};

#[derive(Parser)]
#[command(name = "faregate", about = "Face-recognition fare gate CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a rider from a face image
    Register {
        /// Rider id (letters, digits and '-')
        #[arg(long)]
        id: String,
        /// Display name
        #[arg(long)]
        name: String,
        /// Department or group label, kept on the roster row
        #[arg(long)]
        department: Option<String>,
        /// Mark the fare as already settled
        #[arg(long)]
        paid: bool,
        /// Path to the enrollment image
        image: PathBuf,
    },
    /// Remove an enrolled rider and their face artifact
    Remove {
        id: String,
    },
    /// List enrolled riders
    List {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Rebuild the embedding store from a directory of face images
    ///
    /// Files must be named identity_displayName.png (or .jpg/.jpeg);
    /// underscores in the name part read as spaces.
    Rebuild {
        directory: PathBuf,
    },
    /// Scan one image and decide access
    Scan {
        image: PathBuf,
        /// Minimum confidence for a recognition to count
        #[arg(long)]
        min_confidence: Option<f32>,
        /// Save a capture image for denied or unrecognized faces
        #[arg(long)]
        save_captures: bool,
        /// Emit the result and decision as JSON
        #[arg(long)]
        json: bool,
    },
    /// Scan a batch of frames as one gate session
    GroupScan {
        /// Frame images, scanned in order
        #[arg(required = true)]
        images: Vec<PathBuf>,
        #[arg(long)]
        min_confidence: Option<f32>,
        /// Also write the session report to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Manage the rider roster
    Roster {
        #[command(subcommand)]
        command: roster::RosterCommands,
    },
    /// Show recent gate decisions
    Logs {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = config::GateConfig::load()?;

    match cli.command {
        Commands::Register { id, name, department, paid, image } => {
            enroll::register(&config, &id, &name, department.as_deref(), paid, &image)
        }
        Commands::Remove { id } => enroll::remove(&config, &id),
        Commands::List { json } => enroll::list(&config, json),
        Commands::Rebuild { directory } => enroll::rebuild(&config, &directory),
        Commands::Scan { image, min_confidence, save_captures, json } => {
            scan::scan(&config, &image, min_confidence, save_captures, json)
        }
        Commands::GroupScan { images, min_confidence, report } => {
            scan::group_scan(&config, &images, min_confidence, report.as_deref())
        }
        Commands::Roster { command } => roster::run(&config, command),
        Commands::Logs { limit } => roster::logs(&config, limit),
    }
}
