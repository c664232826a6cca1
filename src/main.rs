use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use syncd::app_config::AppConfig;
use syncd::engine::SyncEngine;
use syncd::git_adapter::GitAdapter;
use syncd::model::target::TargetStatus;
use syncd::store::Store;
use syncd::watcher::{Side, TargetWatcher};

/// syncd — bidirectional sync engine for AI-assistant configuration
/// artifacts between per-machine target directories and a git-backed
/// store.
#[derive(Parser)]
#[command(name = "syncd")]
#[command(version, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine in the foreground until SIGINT/SIGTERM.
    Run,

    /// Create or verify the store git repository and metadata store schema.
    Init,

    /// Print config path, data dir, machine id, and store health.
    Doctor,
}

fn main() -> Result<()> {
    syncd::telemetry::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run => cmd_run(),
        Commands::Init => cmd_init(),
        Commands::Doctor => cmd_doctor(),
    }
}

fn cmd_init() -> Result<()> {
    let config = AppConfig::load_or_init().context("loading app config")?;
    GitAdapter::init(&config.store_root()).context("initializing store git repository")?;
    let store = Store::open(&config.database_path()).context("opening metadata store")?;
    store
        .seed_default_patterns(default_include_patterns(), default_ignore_patterns())
        .context("seeding default patterns")?;
    println!("syncd initialized at {}", config.store_root().display());
    Ok(())
}

fn cmd_doctor() -> Result<()> {
    let config = AppConfig::load_or_init().context("loading app config")?;
    println!("data dir:    {}", config.data_dir.display());
    println!("machine id:  {}", config.machine_id);
    println!("machine:     {}", config.machine_name);
    let store_root = config.store_root();
    println!("store root:  {}", store_root.display());
    println!(
        "store is a valid git repo: {}",
        syncd::app_config::looks_like_git_repo(&store_root)
    );
    Ok(())
}

fn cmd_run() -> Result<()> {
    let config = AppConfig::load_or_init().context("loading app config")?;
    let git = GitAdapter::init(&config.store_root()).context("initializing store git repository")?;
    let store = Store::open(&config.database_path()).context("opening metadata store")?;
    let engine = Arc::new(SyncEngine::new(store, git, config.store_root()).context("building sync engine")?);

    syncd::machines::register_current_machine(
        &config.store_root(),
        &config.machine_id,
        &config.machine_name,
        now_unix(),
    )
    .context("registering machine")?;
    syncd::machines::seed(engine.store(), &config.store_root(), &config.machine_id)
        .context("seeding machine mappings")?;

    let shutdown = Arc::new(AtomicBool::new(false));
    install_signal_handlers(&shutdown)?;

    let (tx, rx) = mpsc::channel();
    let mut watchers = Vec::new();
    for target in engine.store().list_targets().context("listing targets")? {
        if target.status != TargetStatus::Active {
            continue;
        }
        let settings = engine.store().global_settings().context("loading global settings")?;
        let debounce = Duration::from_millis(settings.debounce_ms);

        let tx_store = tx.clone();
        watchers.push(
            TargetWatcher::start(
                &config.store_root().join(&target.store_path),
                target.id,
                Side::Store,
                debounce,
                engine.self_change_table(),
                move |event| {
                    let _ = tx_store.send(event.target_id);
                },
            )
            .context("starting store watcher")?,
        );

        let tx_target = tx.clone();
        watchers.push(
            TargetWatcher::start(
                &target.local_path,
                target.id,
                Side::Target,
                debounce,
                engine.self_change_table(),
                move |event| {
                    let _ = tx_target.send(event.target_id);
                },
            )
            .context("starting target watcher")?,
        );

        engine.sync_target(&target).context("initial sync pass")?;
    }
    drop(tx);

    tracing::info!(targets = watchers.len() / 2, "syncd running");

    while !shutdown.load(Ordering::SeqCst) {
        match rx.recv_timeout(Duration::from_millis(250)) {
            Ok(target_id) => {
                if let Some(target) = engine.store().get_target(target_id)? {
                    if let Err(e) = engine.sync_target(&target) {
                        tracing::warn!(target = target_id, error = %e, "sync pass failed");
                    }
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    drop(watchers);
    tracing::info!("shutting down, flushing pending work");
    Ok(())
}

fn default_include_patterns() -> &'static [&'static str] {
    &["**/*.md", "**/AGENTS.md", ".claude/**", ".cursor/**", ".github/copilot-instructions.md"]
}

fn default_ignore_patterns() -> &'static [&'static str] {
    &["**/node_modules/**", "**/.git/**", "**/target/**"]
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[cfg(unix)]
fn install_signal_handlers(shutdown: &Arc<AtomicBool>) -> Result<()> {
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(shutdown))
        .context("registering SIGINT handler")?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(shutdown))
        .context("registering SIGTERM handler")?;
    Ok(())
}

#[cfg(not(unix))]
fn install_signal_handlers(_shutdown: &Arc<AtomicBool>) -> Result<()> {
    Ok(())
}
