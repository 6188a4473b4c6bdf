mod session;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pulsedeck_core::PatternCatalog;
use tracing_subscriber::EnvFilter;

fn main() -> pulsedeck_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            folder,
            duration,
            seed,
            config,
            callouts,
        } => session::run(session::SessionOptions {
            folder,
            duration_secs: duration,
            seed,
            config_path: config,
            callout_dir: callouts,
        }),
        Commands::Patterns => list_patterns(),
    }
}

fn list_patterns() -> pulsedeck_core::Result<()> {
    let catalog = PatternCatalog::builtin();
    for pattern in catalog.iter() {
        println!("{:<20} {:?}", pattern.name(), pattern.steps());
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Media slideshow with a stochastic beat cueing engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a session: cycle media while the beat engine pulses.
    Run {
        /// Folder of images, GIFs, and videos to cycle through.
        folder: Option<PathBuf>,
        /// Session length in seconds; runs until interrupted if omitted.
        #[arg(short, long)]
        duration: Option<u64>,
        /// Seed for all random decisions, for reproducible sessions.
        #[arg(long)]
        seed: Option<u64>,
        /// Path to the settings file.
        #[arg(short, long, default_value = "pulsedeck.json")]
        config: PathBuf,
        /// Directory of per-language callout text files.
        #[arg(long, default_value = "callouts")]
        callouts: PathBuf,
    },
    /// List the built-in rhythm pattern catalog.
    Patterns,
}
