//! AimTune CLI: analyze gameplay recordings and recommend a sensitivity change.
//!
//! Usage:
//!   aimtune analyze <INPUT>          Analyze one recording or frame directory
//!   aimtune batch <INPUT>...         Analyze several recordings concurrently
//!   aimtune probe <VIDEO>            Show container/stream information
//!   aimtune check                    Check for ffmpeg/ffprobe
//!   aimtune config init|show         Manage the configuration file

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "aimtune",
    about = "Aim analysis and sensitivity recommendations from gameplay video",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit structured JSON logs on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by `analyze` and `batch`.
#[derive(clap::Args, Clone)]
pub struct SessionArgs {
    /// Combat event log (JSONL, one `{"t": ns, "kind": ...}` per line)
    #[arg(long)]
    combat_events: Option<PathBuf>,

    /// Configuration file (defaults to the standard location)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the sampling rate (Hz)
    #[arg(long)]
    sampling_rate: Option<f64>,

    /// Override the horizontal field of view (degrees)
    #[arg(long)]
    fov: Option<f64>,

    /// Native frame rate of image-sequence inputs (directories)
    #[arg(long, default_value = "60")]
    frames_dir_fps: f64,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one recording
    Analyze {
        /// Video file, or a directory of still frames
        input: PathBuf,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        session: SessionArgs,
    },

    /// Analyze several recordings concurrently
    Batch {
        /// Video files or frame directories
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Maximum concurrent sessions
        #[arg(short, long, default_value = "2")]
        jobs: usize,

        /// Directory for the per-input reports
        #[arg(long, default_value = "aimtune-reports")]
        output_dir: PathBuf,

        #[command(flatten)]
        session: SessionArgs,
    },

    /// Show container and stream information
    Probe {
        /// Video file
        path: PathBuf,
    },

    /// Check system capabilities
    Check,

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write the default configuration
    Init {
        /// Target path (defaults to the standard location)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show {
        /// Configuration file (defaults to the standard location)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    aimtune_common::logging::init_logging(&aimtune_common::config::LoggingConfig {
        level: log_level.to_string(),
        json: cli.json_logs,
    });

    match cli.command {
        Commands::Analyze {
            input,
            output,
            session,
        } => commands::analyze::run(input, output, session).await,
        Commands::Batch {
            inputs,
            jobs,
            output_dir,
            session,
        } => commands::batch::run(inputs, jobs, output_dir, session).await,
        Commands::Probe { path } => commands::probe::run(path),
        Commands::Check => commands::check::run(),
        Commands::Config { action } => match action {
            ConfigAction::Init { path, force } => commands::config::init(path, force),
            ConfigAction::Show { path } => commands::config::show(path),
        },
    }
}
