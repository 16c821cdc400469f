//! Shared types for the MMR reader.
//!
//! These types form the data model used across all modules: the region
//! enumeration with its ladder-endpoint codes, the cached OAuth token,
//! and the error taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Region
// ---------------------------------------------------------------------------

/// A ladder region, as configured ("US", "EU", "KO", "CN").
///
/// Each region maps to the numeric code the profile-ladder endpoint
/// expects in its URL path (from the Blizzard API docs: 1=US, 2=EU,
/// 3=KO and TW, 5=CN).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Region {
    Us,
    Eu,
    Ko,
    Cn,
}

impl Region {
    /// The numeric region code used in the ladder endpoint URL.
    pub fn code(&self) -> u8 {
        match self {
            Region::Us => 1,
            Region::Eu => 2,
            Region::Ko => 3,
            Region::Cn => 5,
        }
    }

    /// All known regions, in config-string form.
    pub const KNOWN: [&'static str; 4] = ["US", "EU", "KO", "CN"];
}

impl FromStr for Region {
    type Err = ReaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "US" => Ok(Region::Us),
            "EU" => Ok(Region::Eu),
            "KO" => Ok(Region::Ko),
            "CN" => Ok(Region::Cn),
            other => Err(ReaderError::Region(other.to_string())),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Region::Us => "US",
            Region::Eu => "EU",
            Region::Ko => "KO",
            Region::Cn => "CN",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// An access token granted by the identity endpoint, together with the
/// absolute instant (ms since the Unix epoch) at which it expires.
///
/// Serialized to and from the single-slot cache file. Field names match
/// the cache file format (`{"AccessToken": ..., "ExpirationTimeMs": ...}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CachedToken {
    pub access_token: String,
    pub expiration_time_ms: i64,
}

impl CachedToken {
    /// Whether this token can still be used at `now_ms`.
    pub fn is_valid_at(&self, now_ms: i64) -> bool {
        !self.access_token.is_empty() && now_ms < self.expiration_time_ms
    }
}

/// The result of one successful client-credentials exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    /// Lifetime of the token in seconds, as reported by the endpoint.
    pub expires_in_secs: i64,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error taxonomy for the refresh pipeline.
///
/// All of these are absorbed at the tick boundary — logged, never allowed
/// to terminate the poll loop.
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Auth error: {0}")]
    Auth(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Token cache corrupted: {0}")]
    CacheCorruption(String),

    #[error("Unknown region: {0}")]
    Region(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
