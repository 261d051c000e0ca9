//! deck-scout - Opponent deck scouting from a live game overlay
//!
//! A read-only screen parsing tool: reads the opponent's name and clan off
//! the screen, looks the player up in the public directory and compares
//! their current deck with recent ladder decks.

mod analysis;
mod app;
mod capture;
mod config;
mod directory;
mod error;
mod lookup;
mod shared;
mod storage;
mod vision;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::app::ScanSession;
use crate::capture::{list_monitors, ScreenFrameSource};
use crate::config::{AppConfig, Calibration};
use crate::directory::{ApiClient, Directory, EntityResolver, ReqwestTransport};
use crate::error::ConfigError;
use crate::lookup::{find_opponent, LookupOutcome};
use crate::shared::PipelineEvent;
use crate::vision::{TesseractCli, TextRecognizer};

/// Consumer drain cadence
const DRAIN_INTERVAL: Duration = Duration::from_millis(100);

/// deck-scout - Opponent deck scouting overlay reader
#[derive(Parser, Debug)]
#[command(name = "deck-scout")]
#[command(about = "Reads the opponent banner via OCR and scouts their deck history")]
struct Args {
    /// Settings file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory API token (overrides the settings file)
    #[arg(long, env = "CLASH_TOKEN", global = true, hide_env_values = true)]
    token: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch the screen and look up every new opponent
    Scan {
        /// Calibration JSON written by the calibration tool
        #[arg(long)]
        calibration: Option<PathBuf>,

        /// Stop after this many ticks
        #[arg(long)]
        ticks: Option<u64>,
    },
    /// Look up a player by name within a clan
    Lookup {
        /// Clan name
        #[arg(long)]
        clan: String,

        /// Player name
        #[arg(long)]
        player: String,

        /// Print the profile as JSON
        #[arg(long)]
        json: bool,
    },
    /// List monitors and exit
    Monitors,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_filter = if args.verbose { "deck_scout=debug,info" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Monitors => print_monitors(),
        Command::Lookup { ref clan, ref player, json } => {
            let config = load_settings(&args)?;
            run_manual_lookup(&config, clan, player, json)
        }
        Command::Scan { ref calibration, ticks } => {
            let mut config = load_settings(&args)?;
            if ticks.is_some() {
                config.scan.max_ticks = ticks;
            }
            let calibration = resolve_calibration(&config, calibration.as_deref())?;
            run_scan(&config, calibration)
        }
    }
}

/// Load settings and apply the command-line token
fn load_settings(args: &Args) -> Result<AppConfig> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => storage::default_config_path()?,
    };
    let mut config = config::load_or_default(&path)
        .with_context(|| format!("Failed to load settings from {:?}", path))?;
    info!("Settings: {:?}", path);

    if let Some(token) = &args.token {
        config.api.token = Some(token.clone());
    }
    Ok(config)
}

/// Calibration file, else inline calibration, else the default calibration file
fn resolve_calibration(config: &AppConfig, path: Option<&std::path::Path>) -> Result<Calibration> {
    if let Some(path) = path {
        return config::load_calibration(path)
            .with_context(|| format!("Failed to load calibration from {:?}", path));
    }
    if let Some(calibration) = config.calibration {
        return Ok(calibration);
    }
    let default_path = storage::default_calibration_path()?;
    if default_path.exists() {
        return config::load_calibration(&default_path)
            .with_context(|| format!("Failed to load calibration from {:?}", default_path));
    }
    Err(ConfigError::MissingCalibration.into())
}

fn build_directory(config: &AppConfig) -> Result<Arc<dyn Directory>> {
    let token = config.api.require_token()?;
    let transport = ReqwestTransport::new(&config.api, token)?;
    Ok(Arc::new(ApiClient::new(transport, config.api.retry_delay())))
}

fn build_recognizer(config: &AppConfig) -> TextRecognizer {
    let tesseract = TesseractCli::new(
        config.ocr.tesseract_cmd.clone(),
        config.ocr.language.clone(),
        config.ocr.tessdata_dir.clone(),
    );
    match tesseract.probe() {
        Ok(version) => info!("OCR engine: {}", version),
        Err(e) => warn!("{} - every tick will be skipped until it is available", e),
    }
    TextRecognizer::new(Box::new(tesseract))
}

fn run_scan(config: &AppConfig, calibration: Calibration) -> Result<()> {
    info!("deck-scout starting...");
    info!("Read-only mode: Screen capture and analysis only");

    let directory = build_directory(config)?;
    let source = ScreenFrameSource::new(calibration.capture_region)
        .context("Failed to set up screen capture")?;
    let recognizer = build_recognizer(config);

    let (session, events) = ScanSession::start(
        config,
        calibration,
        Box::new(source),
        recognizer,
        directory,
    )?;

    // Drain on a fixed cadence until the worker ends
    loop {
        for event in events.try_iter() {
            print_event(&event);
        }
        if !session.is_running() {
            for event in events.try_iter() {
                print_event(&event);
            }
            break;
        }
        std::thread::sleep(DRAIN_INTERVAL);
    }

    drop(session);
    info!("deck-scout shutdown complete");
    Ok(())
}

fn print_event(event: &PipelineEvent) {
    match event {
        PipelineEvent::Status(text) => println!("{}", text),
        PipelineEvent::Ocr(summary) => debug!("ocr {}", summary),
        PipelineEvent::Loading(loading) => debug!("loading={}", loading),
        PipelineEvent::Resolved { name, clan } => println!("Opponent: {} [{}]", name, clan),
        PipelineEvent::Deck(profile) => println!("{}\n", profile.render()),
    }
}

fn run_manual_lookup(config: &AppConfig, clan: &str, player: &str, json: bool) -> Result<()> {
    let directory = build_directory(config)?;
    let resolver = EntityResolver::new(directory, config.scan.min_player_similarity);

    let outcome = find_opponent(&resolver, player.trim(), clan.trim(), config.analytics.history_window)
        .context("Lookup failed")?;
    match outcome {
        LookupOutcome::Found {
            profile,
            history_error,
        } => {
            if json {
                println!("{}", serde_json::to_string_pretty(&profile)?);
            } else {
                println!("{}", profile.render());
            }
            if let Some(e) = history_error {
                warn!("Battle log unavailable, deck history omitted: {}", e);
            }
        }
        LookupOutcome::ClanNotFound { suggestions } => {
            println!("Clan '{}' not found", clan);
            print_suggestions(&suggestions);
        }
        LookupOutcome::PlayerNotFound { clan, suggestions } => {
            println!("Player '{}' not found in {}", player, clan);
            print_suggestions(&suggestions);
        }
    }
    Ok(())
}

fn print_suggestions(suggestions: &[String]) {
    if !suggestions.is_empty() {
        println!("Did you mean:");
        for s in suggestions {
            println!("  {}", s);
        }
    }
}

fn print_monitors() -> Result<()> {
    println!("Available monitors:");
    let monitors = list_monitors()?;
    if monitors.is_empty() {
        println!("  No monitors detected");
    }
    for monitor in &monitors {
        println!(
            "  [{}] {} - {}x{} at ({}, {}){}",
            monitor.index,
            monitor.name,
            monitor.width,
            monitor.height,
            monitor.x,
            monitor.y,
            if monitor.is_primary { " (primary)" } else { "" }
        );
    }
    Ok(())
}
