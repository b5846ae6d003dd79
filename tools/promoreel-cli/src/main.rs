//! PromoReel CLI: compose captioned promo videos from a composition file.
//!
//! Usage:
//!   promoreel compose <CONFIG>   Run the full pipeline
//!   promoreel plan <CONFIG>      Print every stage's command without running it
//!   promoreel layout <TEXT>      Show how a caption line wraps and is styled
//!   promoreel validate <CONFIG>  Check a composition file and its inputs
//!   promoreel init <PATH>        Write a sample composition file (and app config)
//!   promoreel check              Check for the encoder and prober binaries

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use promoreel_common::config::{config_file_path, AppConfig};
use promoreel_composition_model::CleanupPolicy;

mod commands;

#[derive(Parser)]
#[command(
    name = "promoreel",
    about = "Captioned promo video composition on top of ffmpeg",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Application config file (defaults to the per-user location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the composition pipeline
    Compose {
        /// Path to the composition file
        path: PathBuf,

        /// Override the artifact cleanup policy
        #[arg(long, value_enum)]
        cleanup: Option<CleanupArg>,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the planned encoder invocations without running them
    Plan {
        /// Path to the composition file
        path: PathBuf,
    },

    /// Wrap and classify a caption line
    Layout {
        /// Caption text
        text: String,

        /// Pixel budget per line
        #[arg(long, default_value = "600")]
        width: f64,

        /// Font size for regular lines (emphasized lines use --emphasis-size)
        #[arg(long, default_value = "26")]
        font_size: u32,

        /// Font size for emphasized lines
        #[arg(long, default_value = "48")]
        emphasis_size: u32,
    },

    /// Validate a composition file
    Validate {
        /// Path to the composition file
        path: PathBuf,
    },

    /// Write a sample composition file
    Init {
        /// Destination path
        #[arg(default_value = "composition.json")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,

        /// Also write a default application config (to --config or the per-user location)
        #[arg(long)]
        app_config: bool,
    },

    /// Check that the external tools are installed
    Check,
}

#[derive(Clone, Copy, ValueEnum)]
enum CleanupArg {
    Always,
    KeepOnFailure,
    Never,
}

impl From<CleanupArg> for CleanupPolicy {
    fn from(arg: CleanupArg) -> Self {
        match arg {
            CleanupArg::Always => CleanupPolicy::Always,
            CleanupArg::KeepOnFailure => CleanupPolicy::KeepOnFailure,
            CleanupArg::Never => CleanupPolicy::Never,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut app_config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };

    if cli.verbose {
        app_config.logging.level = "debug".to_string();
    }
    promoreel_common::logging::init_logging(&app_config.logging);
    tracing::debug!(tools = ?app_config.tools, "Loaded application config");

    match cli.command {
        Commands::Compose {
            path,
            cleanup,
            json,
        } => commands::compose::run(&app_config, path, cleanup.map(Into::into), json).await,
        Commands::Plan { path } => commands::plan::run(&app_config, path),
        Commands::Layout {
            text,
            width,
            font_size,
            emphasis_size,
        } => commands::layout::run(&text, width, font_size, emphasis_size),
        Commands::Validate { path } => commands::validate::run(path),
        Commands::Init {
            path,
            force,
            app_config: write_app_config,
        } => {
            commands::init::run(path, force)?;
            if write_app_config {
                let config_path = cli.config.clone().unwrap_or_else(config_file_path);
                commands::init::write_app_config(&config_path, force)?;
            }
            Ok(())
        }
        Commands::Check => commands::check::run(&app_config),
    }
}
