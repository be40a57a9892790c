// SPDX-License-Identifier: GPL-3.0-only

use capscreens::backends::DeviceSelector;
use capscreens::config::{Config, LocationBackendType, PermissionPolicy, ScannerBackendType};
use capscreens::{i18n, terminal};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Mutex;

mod cli;

#[derive(Parser)]
#[command(name = "capscreens")]
#[command(about = "Permission-gated code scanning and location screens")]
#[command(version = env!("GIT_VERSION"))]
#[command(subcommand_required = false)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Use scripted camera and location backends instead of hardware
    #[arg(long, global = true)]
    simulate: bool,

    /// How permission requests are answered: prompt, grant or deny
    #[arg(long, global = true, value_name = "POLICY")]
    permission: Option<PermissionPolicy>,

    /// Configuration file (default: ~/.config/capscreens/config.json)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Replay location fixes from a JSON-lines file
    #[arg(long, global = true, value_name = "PATH")]
    replay: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    Devices,

    /// Scan one batch of codes and print the summary
    Scan {
        /// Camera index to use (from 'capscreens devices')
        #[arg(short, long)]
        camera: Option<usize>,

        /// Decode these image files instead of a camera (repeatable)
        #[arg(short, long, value_name = "PATH")]
        image: Vec<PathBuf>,
    },

    /// Print the current position
    Locate,

    /// Print every position update until Ctrl+C
    Track {
        /// Stop after this many fixes
        #[arg(short = 'n', long)]
        count: Option<u64>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // The terminal UI owns the screen, so its logs go to a file
    init_logging(cli.command.is_none());

    // Get the system's preferred languages.
    let requested_languages = i18n_embed::DesktopLanguageRequester::requested_languages();
    i18n::init(&requested_languages);

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(policy) = cli.permission {
        config.permission_policy = policy;
    }
    if let Some(path) = cli.replay {
        config.location_backend = LocationBackendType::Replay;
        config.replay_path = Some(path);
    }
    if let Some(Commands::Scan { camera, image }) = &cli.command {
        if let Some(index) = camera {
            config.camera = DeviceSelector::Index(*index);
        }
        if !image.is_empty() {
            config.scanner_backend = ScannerBackendType::Images;
            config.image_sources = image.clone();
        }
    }
    config.validate()?;

    match cli.command {
        None => terminal::run(&config, cli.simulate).await,
        Some(Commands::Devices) => cli::list_devices(&config, cli.simulate),
        Some(Commands::Scan { .. }) => cli::scan(&config, cli.simulate).await,
        Some(Commands::Locate) => cli::locate(&config, cli.simulate).await,
        Some(Commands::Track { count }) => cli::track(&config, cli.simulate, count).await,
    }
}

/// Initialize logging
///
/// Set RUST_LOG environment variable to control log level
/// Examples: RUST_LOG=debug, RUST_LOG=capscreens=debug, RUST_LOG=info
fn init_logging(to_file: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true);

    if to_file && let Some(file) = open_log_file() {
        subscriber
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else {
        subscriber.with_writer(std::io::stderr).init();
    }
}

fn open_log_file() -> Option<std::fs::File> {
    let path = terminal::log_path()?;
    std::fs::create_dir_all(path.parent()?).ok()?;
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .ok()
}

/// An explicit config path must exist; the default one may be missing
fn load_config(path: Option<&std::path::Path>) -> Result<Config, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Config::read(path)?
            .ok_or_else(|| format!("config file not found: {}", path.display()).into()),
        None => Ok(Config::default_path()
            .map(|path| Config::load(&path))
            .unwrap_or_default()),
    }
}
