//! SC2 MMR Reader
//!
//! Entry point. Runs the config-file flow (first-run wizard, version
//! upgrade), initialises structured logging, starts the poll engine,
//! and waits for a quit command (`q` on stdin) or Ctrl+C before
//! shutting down cleanly.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::io::AsyncBufReadExt;
use tracing::info;

use sc2_mmr_reader::api::LadderApiClient;
use sc2_mmr_reader::config;
use sc2_mmr_reader::reader::ReaderEngine;

const BANNER: &str = r#"
  ____   ____ ____    __  __ __  __ ____    ____                _
 / ___| / ___|___ \  |  \/  |  \/  |  _ \  |  _ \ ___  __ _  __| | ___ _ __
 \___ \| |     __) | | |\/| | |\/| | |_) | | |_) / _ \/ _` |/ _` |/ _ \ '__|
  ___) | |___ / __/  | |  | | |  | |  _ <  |  _ <  __/ (_| | (_| |  __/ |
 |____/ \____|_____| |_|  |_|_|  |_|_| \_\ |_| \_\___|\__,_|\__,_|\___|_|

  v0.1.0 — ladder MMR to a file, every few seconds
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    init_logging();
    println!("{BANNER}");

    let exe_dir = exe_directory()?;
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| exe_dir.join("Config.json"));

    // Wizard / upgrade flows exit without running the engine.
    let Some(cfg) = config::run_config_flow(&config_path, &exe_dir)? else {
        return Ok(());
    };

    info!(
        region = %cfg.region_id,
        profile_id = cfg.profile_id,
        ladder_id = cfg.ladder_id,
        interval_ms = cfg.ms_per_read,
        "Configuration loaded"
    );

    std::fs::create_dir_all(&cfg.data_directory)
        .with_context(|| format!("Failed to create data directory {}", cfg.data_directory))?;

    let client = LadderApiClient::new()?;
    let mut engine = ReaderEngine::new(&cfg, client)?;
    engine.start()?;

    println!("Running. Enter q to quit (or press Ctrl+C).");
    wait_for_quit().await;

    println!("Stopping...");
    engine.request_stop().await;
    println!("Done. Exiting.");

    Ok(())
}

/// Block until the user asks to quit: a `q` line on stdin or Ctrl+C.
async fn wait_for_quit() {
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                return;
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(entry)) if entry.trim().eq_ignore_ascii_case("q") => return,
                    Ok(Some(_)) => println!("Unknown command. Enter q to quit."),
                    // stdin closed (detached/service run): Ctrl+C is the
                    // only quit signal left.
                    Ok(None) | Err(_) => {
                        let _ = tokio::signal::ctrl_c().await;
                        info!("Shutdown signal received.");
                        return;
                    }
                }
            }
        }
    }
}

/// Directory containing the running executable; config and relative
/// output paths resolve against it.
fn exe_directory() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("Failed to locate the executable")?;
    Ok(exe
        .parent()
        .context("Executable has no parent directory")?
        .to_path_buf())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sc2_mmr_reader=info"));

    let json_logging = std::env::var("SC2_MMR_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
