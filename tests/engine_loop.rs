//! End-to-end engine tests.
//!
//! Drives the full chain — token cache, ladder fetch, rounding, output
//! write, scheduling, shutdown — against a scripted in-memory upstream.
//! The upstream serves raw JSON bodies through the production parsing
//! helpers, so everything but the HTTP transport itself is exercised.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sc2_mmr_reader::api::{parse_ladder_response, parse_token_response, round_mmr, RatingSource};
use sc2_mmr_reader::config::{ReaderConfig, CONFIG_VERSION};
use sc2_mmr_reader::reader::ReaderEngine;
use sc2_mmr_reader::token::TokenExchange;
use sc2_mmr_reader::types::{ReaderError, Region, TokenGrant};

// ---------------------------------------------------------------------------
// Scripted upstream
// ---------------------------------------------------------------------------

struct UpstreamState {
    token_body: Mutex<String>,
    ladder_body: Mutex<String>,
    network_down: AtomicBool,
    token_calls: AtomicUsize,
    rating_calls: AtomicUsize,
}

/// An in-memory stand-in for both upstream endpoints. Bodies are
/// scripted per test and run through the real response parsers.
#[derive(Clone)]
struct ScriptedUpstream(Arc<UpstreamState>);

impl ScriptedUpstream {
    fn new(token_body: &str, ladder_body: &str) -> Self {
        Self(Arc::new(UpstreamState {
            token_body: Mutex::new(token_body.to_string()),
            ladder_body: Mutex::new(ladder_body.to_string()),
            network_down: AtomicBool::new(false),
            token_calls: AtomicUsize::new(0),
            rating_calls: AtomicUsize::new(0),
        }))
    }

    fn set_ladder_body(&self, body: &str) {
        *self.0.ladder_body.lock().unwrap() = body.to_string();
    }

    fn set_network_down(&self, down: bool) {
        self.0.network_down.store(down, Ordering::SeqCst);
    }

    fn token_calls(&self) -> usize {
        self.0.token_calls.load(Ordering::SeqCst)
    }

    fn rating_calls(&self) -> usize {
        self.0.rating_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenExchange for ScriptedUpstream {
    async fn request_token(
        &self,
        _client_id: &str,
        _client_secret: &str,
    ) -> Result<TokenGrant, ReaderError> {
        self.0.token_calls.fetch_add(1, Ordering::SeqCst);
        if self.0.network_down.load(Ordering::SeqCst) {
            return Err(ReaderError::Network("connection timed out".to_string()));
        }
        let body = self.0.token_body.lock().unwrap().clone();
        parse_token_response(&body)
    }
}

#[async_trait]
impl RatingSource for ScriptedUpstream {
    async fn fetch_rating(
        &self,
        _region: Region,
        _realm_id: i32,
        _profile_id: i64,
        _ladder_id: i64,
        _token: &str,
    ) -> Result<i64, ReaderError> {
        self.0.rating_calls.fetch_add(1, Ordering::SeqCst);
        if self.0.network_down.load(Ordering::SeqCst) {
            return Err(ReaderError::Network("connection timed out".to_string()));
        }
        let body = self.0.ladder_body.lock().unwrap().clone();
        parse_ladder_response(&body).map(round_mmr)
    }
}

// ---------------------------------------------------------------------------
// Test fixtures
// ---------------------------------------------------------------------------

const TOKEN_BODY: &str = r#"{"access_token":"abc","expires_in":3600}"#;
const LADDER_BODY: &str = r#"{"ranksAndPools":[{"mmr":3724.4}]}"#;

struct Fixture {
    config: ReaderConfig,
    data_dir: PathBuf,
    mmr_file: PathBuf,
}

impl Fixture {
    fn new(ms_per_read: i64) -> Self {
        let mut data_dir = std::env::temp_dir();
        data_dir.push(format!("engine_loop_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&data_dir).unwrap();

        let mmr_file = data_dir.join("mmr.txt");

        let config = ReaderConfig {
            version: CONFIG_VERSION,
            ms_per_read,
            data_directory: data_dir.to_string_lossy().into_owned(),
            mmr_file_path: mmr_file.to_string_lossy().into_owned(),
            region_id: "US".to_string(),
            realm_id: 1,
            profile_id: 1986271,
            ladder_id: 274006,
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
        };

        Self {
            config,
            data_dir,
            mmr_file,
        }
    }

    fn mmr_contents(&self) -> Option<String> {
        std::fs::read_to_string(&self.mmr_file).ok()
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.data_dir);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_engine_publishes_rounded_mmr() {
    let fixture = Fixture::new(5000);
    let upstream = ScriptedUpstream::new(TOKEN_BODY, LADDER_BODY);

    let mut engine = ReaderEngine::new(&fixture.config, upstream.clone()).unwrap();
    engine.start().unwrap();

    // First tick fires immediately.
    tokio::time::sleep(Duration::from_millis(10)).await;
    engine.request_stop().await;

    assert_eq!(fixture.mmr_contents().as_deref(), Some("3724"));
    assert_eq!(upstream.token_calls(), 1);
    assert_eq!(upstream.rating_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_engine_reuses_token_across_ticks() {
    let fixture = Fixture::new(5000);
    let upstream = ScriptedUpstream::new(TOKEN_BODY, LADDER_BODY);

    let mut engine = ReaderEngine::new(&fixture.config, upstream.clone()).unwrap();
    engine.start().unwrap();

    // Ticks at t=0, 5s, 10s.
    tokio::time::sleep(Duration::from_millis(12_000)).await;
    engine.request_stop().await;

    assert_eq!(upstream.rating_calls(), 3);
    assert_eq!(
        upstream.token_calls(),
        1,
        "a valid cached token must keep later ticks off the identity endpoint"
    );

    // The token landed in the cache file with the granted string.
    let cache_file = fixture.data_dir.join("Access.tmp");
    let cached = std::fs::read_to_string(cache_file).unwrap();
    assert!(cached.contains("\"AccessToken\": \"abc\""));
}

#[tokio::test(start_paused = true)]
async fn test_engine_keeps_prior_value_through_outage() {
    let fixture = Fixture::new(5000);
    let upstream = ScriptedUpstream::new(TOKEN_BODY, LADDER_BODY);

    let mut engine = ReaderEngine::new(&fixture.config, upstream.clone()).unwrap();
    engine.start().unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(fixture.mmr_contents().as_deref(), Some("3724"));

    // Upstream goes dark: ticks keep firing, the file keeps its value.
    upstream.set_network_down(true);
    upstream.set_ladder_body(r#"{"ranksAndPools":[{"mmr":9999.0}]}"#);
    tokio::time::sleep(Duration::from_millis(10_000)).await;

    assert_eq!(fixture.mmr_contents().as_deref(), Some("3724"));
    assert!(upstream.rating_calls() >= 2, "outage must not stop the loop");

    // Recovery on the next tick, no restart needed.
    upstream.set_network_down(false);
    tokio::time::sleep(Duration::from_millis(5_000)).await;
    engine.request_stop().await;

    assert_eq!(fixture.mmr_contents().as_deref(), Some("9999"));
}

#[tokio::test(start_paused = true)]
async fn test_engine_survives_malformed_ladder_response() {
    let fixture = Fixture::new(5000);
    let upstream = ScriptedUpstream::new(TOKEN_BODY, r#"{"ranksAndPools":[]}"#);

    let mut engine = ReaderEngine::new(&fixture.config, upstream.clone()).unwrap();
    engine.start().unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(fixture.mmr_contents(), None);

    upstream.set_ladder_body(LADDER_BODY);
    tokio::time::sleep(Duration::from_millis(5_000)).await;
    engine.request_stop().await;

    assert_eq!(fixture.mmr_contents().as_deref(), Some("3724"));
}

#[tokio::test(start_paused = true)]
async fn test_no_writes_after_stop_returns() {
    let fixture = Fixture::new(5000);
    let upstream = ScriptedUpstream::new(TOKEN_BODY, LADDER_BODY);

    let mut engine = ReaderEngine::new(&fixture.config, upstream.clone()).unwrap();
    engine.start().unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;
    engine.request_stop().await;
    assert!(!engine.is_running());

    let calls_at_stop = upstream.rating_calls();
    tokio::time::sleep(Duration::from_secs(3600)).await;

    assert_eq!(upstream.rating_calls(), calls_at_stop);
}

#[tokio::test(start_paused = true)]
async fn test_engine_double_start_fails() {
    let fixture = Fixture::new(5000);
    let upstream = ScriptedUpstream::new(TOKEN_BODY, LADDER_BODY);

    let mut engine = ReaderEngine::new(&fixture.config, upstream).unwrap();
    engine.start().unwrap();
    assert!(engine.start().is_err());

    engine.request_stop().await;
}

#[tokio::test]
async fn test_engine_rejects_unknown_region() {
    let mut fixture = Fixture::new(5000);
    fixture.config.region_id = "XX".to_string();
    let upstream = ScriptedUpstream::new(TOKEN_BODY, LADDER_BODY);

    assert!(ReaderEngine::new(&fixture.config, upstream).is_err());
}
