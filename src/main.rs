//! PasteQuick - Main entry point
//!
//! Runs the clipboard history engine as a daemon until Ctrl+C.
//!
//! ```bash
//! pastequick                          # default config
//! pastequick --config ./config.toml   # custom config
//! RUST_LOG=pastequick=debug pastequick
//! ```

use pastequick::{
    hotkey::{HotkeyManager, NoopRegistrar},
    pasteboard, restore, ClipboardEngine, Config, HistoryChange, HistoryStore, Persistence,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn parse_args() -> Option<PathBuf> {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-v" => {
                println!("PasteQuick v{}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                i += 1;
                if i < args.len() {
                    config_path = Some(PathBuf::from(&args[i]));
                }
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                eprintln!("Use --help for usage information.");
                std::process::exit(1);
            }
        }
        i += 1;
    }

    config_path
}

fn print_help() {
    println!(
        r#"PasteQuick - Clipboard history daemon

USAGE:
    pastequick [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Config file (default: {})
    -h, --help             Print help
    -v, --version          Print version

Set RUST_LOG to override the configured log level."#,
        Config::default_config_path().display()
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match parse_args() {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    };

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.general.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    info!("Starting PasteQuick");

    if !config.general.enabled {
        info!("Capture is disabled in configuration, exiting");
        return Ok(());
    }

    let pasteboard = pasteboard::system()?;

    // Restore state
    let persistence = Arc::new(Persistence::new(config.data_dir()));
    let settings = persistence.load_settings();
    let items = persistence.load(settings.history_limit);
    info!(
        "History: {} items, capacity {}, file {:?}",
        items.len(),
        settings.history_limit,
        persistence.history_path()
    );

    let mut history = HistoryStore::with_items(items, settings.history_limit);
    history.attach_persistence(Arc::clone(&persistence).spawn_writer());

    // Log history changes
    let mut events = history.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event.change {
                HistoryChange::Inserted(id) | HistoryChange::Promoted(id) => {
                    if let Some(item) = event.items.iter().find(|item| item.id == id) {
                        info!("{:?}: {} \"{}\"", event.change, item.kind.as_str(), item.preview);
                    }
                }
                change => info!("{:?} ({} items)", change, event.items.len()),
            }
        }
    });

    let (handle, commands) = ClipboardEngine::<Box<dyn pasteboard::Pasteboard>>::channel();

    // Global hotkey binding is owned by the UI layer; the daemon only records it
    let mut hotkey = HotkeyManager::new(NoopRegistrar::default(), settings.hotkey, Arc::new(|| {}))
        .with_persistence(Arc::clone(&persistence));
    if let Err(e) = hotkey.register() {
        warn!("Hotkey unavailable: {}", e);
    }
    info!("Hotkey: {}", hotkey.description());

    let mut engine = ClipboardEngine::new(
        &config,
        pasteboard,
        history,
        restore::system_keystroke_sender(),
    )
    .with_persistence(Arc::clone(&persistence));

    info!("Press Ctrl+C to stop");

    engine
        .run(commands, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    drop(handle);
    info!("Shutting down...");
    engine.shutdown().await;

    Ok(())
}
