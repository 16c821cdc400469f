//! The reader engine.
//!
//! Composition root: wires the token cache, the API client, and the
//! poll scheduler together, and exposes `start` / `request_stop` to the
//! application shell. Holds no polling logic of its own beyond the
//! per-tick refresh chain; retry policy is simply "try again next
//! tick".

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::api::RatingSource;
use crate::config::ReaderConfig;
use crate::scheduler::{PollScheduler, TickHandler};
use crate::storage;
use crate::token::{TokenCache, TokenExchange};
use crate::types::Region;

/// One refresh: obtain a valid token, look up the ladder, write the
/// rating to the output file.
///
/// Every failure is absorbed here — logged and forgotten — so that a
/// bad tick never takes the poll loop down. On failure the output file
/// keeps its previous value.
pub struct MmrRefresher<C> {
    client: C,
    token_cache: TokenCache,
    region: Region,
    realm_id: i32,
    profile_id: i64,
    ladder_id: i64,
    client_id: String,
    client_secret: String,
    mmr_file: PathBuf,
}

#[async_trait]
impl<C> TickHandler for MmrRefresher<C>
where
    C: TokenExchange + RatingSource + 'static,
{
    async fn on_tick(&mut self) {
        let now_ms = Utc::now().timestamp_millis();

        let Some(token) = self
            .token_cache
            .get_valid_token(now_ms, &self.client, &self.client_id, &self.client_secret)
            .await
        else {
            // Already logged by the cache; nothing to publish this tick.
            return;
        };

        match self
            .client
            .fetch_rating(
                self.region,
                self.realm_id,
                self.profile_id,
                self.ladder_id,
                &token,
            )
            .await
        {
            Ok(mmr) => {
                if let Err(e) = storage::write_mmr(&self.mmr_file, mmr) {
                    error!(error = %e, "Failed to write the MMR file");
                } else {
                    info!(mmr, "MMR refreshed");
                }
            }
            Err(e) => {
                warn!(error = %e, "Ladder poll failed; keeping the previous value");
            }
        }
    }
}

/// The engine: a poll scheduler driving an `MmrRefresher`.
///
/// Single-shot lifecycle: construct, `start`, and eventually
/// `request_stop` — which returns only once the background loop has
/// fully exited and no further file writes can happen.
pub struct ReaderEngine<C> {
    scheduler: PollScheduler,
    interval: Duration,
    refresher: Option<MmrRefresher<C>>,
}

impl<C> ReaderEngine<C>
where
    C: TokenExchange + RatingSource + 'static,
{
    /// Build an engine from a validated configuration and an API client.
    ///
    /// The configuration must already be validated (region known, paths
    /// absolute, interval positive) — see `ReaderConfig::validate`.
    pub fn new(config: &ReaderConfig, client: C) -> Result<Self> {
        let region = config
            .region()
            .context("Configuration contains an unknown region")?;

        let refresher = MmrRefresher {
            client,
            token_cache: TokenCache::new(config.access_cache_file()),
            region,
            realm_id: config.realm_id,
            profile_id: config.profile_id,
            ladder_id: config.ladder_id,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            mmr_file: PathBuf::from(&config.mmr_file_path),
        };

        Ok(Self {
            scheduler: PollScheduler::new(),
            interval: Duration::from_millis(config.ms_per_read as u64),
            refresher: Some(refresher),
        })
    }

    /// Start polling. The first refresh fires immediately.
    pub fn start(&mut self) -> Result<()> {
        let refresher = self
            .refresher
            .take()
            .context("Reader engine has already been started")?;

        info!(
            interval_ms = self.interval.as_millis() as u64,
            "Starting the MMR poll loop"
        );
        self.scheduler.start(self.interval, refresher)
    }

    /// Request shutdown and block until the poll loop has exited.
    pub async fn request_stop(&mut self) {
        info!("Stop requested; waiting for the poll loop to exit");
        self.scheduler.stop().await;
        info!("Poll loop stopped");
    }

    /// Whether the poll loop is currently running.
    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
