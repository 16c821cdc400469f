//! Blizzard API client.
//!
//! Stateless wrapper over the two network operations a refresh needs:
//! the OAuth client-credentials exchange against the identity endpoint,
//! and the profile-ladder lookup that carries the MMR.
//!
//! No retries happen here — a failed call simply means no rating this
//! tick, and the scheduler tries again on the next one.
//!
//! Identity endpoint: https://us.battle.net/oauth/token
//! Ladder endpoint:   https://us.api.blizzard.com/sc2/profile/...

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::token::TokenExchange;
use crate::types::{ReaderError, Region, TokenGrant};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const IDENTITY_URL: &str = "https://us.battle.net/oauth/token";
const LADDER_BASE_URL: &str = "https://us.api.blizzard.com/sc2";

/// Request timeout for both endpoints. The upstream has no SLA; anything
/// still in flight after this long counts as a failed tick.
const HTTP_TIMEOUT_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// API response types (Blizzard JSON → Rust)
// ---------------------------------------------------------------------------

/// Shape of the identity endpoint's token grant response. Fields are
/// optional so that "absent" maps to a clean `Auth` error instead of a
/// deserialization failure.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    /// Token lifetime in seconds.
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Shape of the profile-ladder response. We only deserialize the one
/// nested field we need.
#[derive(Debug, Deserialize)]
struct LadderResponse {
    #[serde(rename = "ranksAndPools", default)]
    ranks_and_pools: Vec<RankEntry>,
}

#[derive(Debug, Deserialize)]
struct RankEntry {
    #[serde(default)]
    mmr: Option<f64>,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Parse the identity endpoint's response body into a `TokenGrant`.
///
/// A body that is not the expected schema, or that lacks a non-empty
/// `access_token` or an `expires_in`, is an `Auth` error.
pub fn parse_token_response(body: &str) -> Result<TokenGrant, ReaderError> {
    let response: TokenResponse = serde_json::from_str(body)
        .map_err(|e| ReaderError::Auth(format!("unexpected token response: {e}")))?;

    let access_token = match response.access_token {
        Some(token) if !token.is_empty() => token,
        _ => {
            return Err(ReaderError::Auth(
                "token response is missing access_token".to_string(),
            ))
        }
    };

    let expires_in_secs = response.expires_in.ok_or_else(|| {
        ReaderError::Auth("token response is missing expires_in".to_string())
    })?;

    Ok(TokenGrant {
        access_token,
        expires_in_secs,
    })
}

/// Extract the raw MMR from a ladder response body: the `mmr` field of
/// the first entry of `ranksAndPools`.
pub fn parse_ladder_response(body: &str) -> Result<f64, ReaderError> {
    let response: LadderResponse = serde_json::from_str(body)
        .map_err(|e| ReaderError::Parse(format!("unexpected ladder response: {e}")))?;

    response
        .ranks_and_pools
        .first()
        .and_then(|entry| entry.mmr)
        .ok_or_else(|| {
            ReaderError::Parse(
                "ladder response has no ranksAndPools entry with a numeric mmr".to_string(),
            )
        })
}

/// Round a raw MMR to the nearest integer.
///
/// Uses `f64::round`: ties round away from zero (3724.5 → 3725).
pub fn round_mmr(raw: f64) -> i64 {
    raw.round() as i64
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Abstraction over the profile-ladder lookup.
///
/// Implemented by `LadderApiClient` for production; tests inject
/// deterministic in-memory implementations.
#[async_trait]
pub trait RatingSource: Send + Sync {
    async fn fetch_rating(
        &self,
        region: Region,
        realm_id: i32,
        profile_id: i64,
        ladder_id: i64,
        token: &str,
    ) -> Result<i64, ReaderError>;
}

/// HTTP client for the identity and ladder endpoints.
pub struct LadderApiClient {
    http: Client,
    identity_url: String,
    ladder_base_url: String,
}

impl LadderApiClient {
    /// Create a client against the production endpoints.
    pub fn new() -> Result<Self> {
        Self::with_endpoints(IDENTITY_URL, LADDER_BASE_URL)
    }

    /// Create a client against custom endpoints (used by tests).
    pub fn with_endpoints(identity_url: &str, ladder_base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))
            .user_agent("sc2-mmr-reader/0.1.0")
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            identity_url: identity_url.to_string(),
            ladder_base_url: ladder_base_url.to_string(),
        })
    }

    /// Build the profile-ladder lookup URL.
    fn ladder_url(
        &self,
        region: Region,
        realm_id: i32,
        profile_id: i64,
        ladder_id: i64,
        token: &str,
    ) -> String {
        format!(
            "{}/profile/{}/{}/{}/ladder/{}?locale=en_US&access_token={}",
            self.ladder_base_url,
            region.code(),
            realm_id,
            profile_id,
            ladder_id,
            urlencoding::encode(token),
        )
    }
}

#[async_trait]
impl RatingSource for LadderApiClient {
    /// Fetch the current MMR for a profile on a specific ladder.
    ///
    /// Issues a single GET and extracts the first ranked-pool entry's
    /// `mmr`, rounded to the nearest integer.
    async fn fetch_rating(
        &self,
        region: Region,
        realm_id: i32,
        profile_id: i64,
        ladder_id: i64,
        token: &str,
    ) -> Result<i64, ReaderError> {
        let url = self.ladder_url(region, realm_id, profile_id, ladder_id, token);
        debug!(region = %region, ladder_id, "Fetching ladder data");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ReaderError::Network(format!("ladder request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(ReaderError::Network(format!(
                "ladder endpoint returned HTTP {}",
                resp.status()
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| ReaderError::Network(format!("reading ladder response failed: {e}")))?;

        let raw = parse_ladder_response(&body)?;
        Ok(round_mmr(raw))
    }
}

#[async_trait]
impl TokenExchange for LadderApiClient {
    /// Perform a client-credentials exchange against the identity endpoint.
    ///
    /// The body is parsed regardless of HTTP status: a rejection comes
    /// back as a JSON error document without an `access_token`, which
    /// surfaces as an `Auth` error.
    async fn request_token(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Result<TokenGrant, ReaderError> {
        debug!("Requesting a fresh access token");

        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ];

        let resp = self
            .http
            .post(&self.identity_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| ReaderError::Network(format!("token request failed: {e}")))?;

        let body = resp
            .text()
            .await
            .map_err(|e| ReaderError::Network(format!("reading token response failed: {e}")))?;

        parse_token_response(&body)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
