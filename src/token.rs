//! Access-token lifecycle.
//!
//! `TokenCache` owns the single cached token: load it from the cache
//! file, hand it out while it is still valid, and go back to the
//! identity endpoint when it is not. The common path — a valid token
//! already in memory — performs no I/O at all.
//!
//! The scheduler serialises ticks, so no two refreshes ever overlap
//! and the cache needs no locking of its own.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::storage;
use crate::types::{CachedToken, ReaderError, TokenGrant};

/// Abstraction over the client-credentials exchange.
///
/// Implemented by `LadderApiClient` for production; tests inject
/// deterministic in-memory implementations.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    async fn request_token(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Result<TokenGrant, ReaderError>;
}

/// Disk-backed cache of the one access token the reader uses.
pub struct TokenCache {
    cache_file: PathBuf,
    cached: Option<CachedToken>,
}

impl TokenCache {
    /// Create a cache backed by the given single-slot file.
    pub fn new(cache_file: PathBuf) -> Self {
        Self {
            cache_file,
            cached: None,
        }
    }

    /// Return a token that is valid at `now_ms`, or `None` if one could
    /// not be obtained — the caller then skips the rest of the tick.
    ///
    /// Resolution order:
    /// 1. An in-memory token still valid at `now_ms` is returned as-is.
    /// 2. Otherwise the cache file is consulted (once, on the first
    ///    tick); a corrupt file is deleted and treated as absent.
    /// 3. Otherwise a fresh token is requested. Its expiration is
    ///    `now_ms + expires_in * 1000`, and it is persisted best-effort:
    ///    a failed write is logged but the token is still usable.
    pub async fn get_valid_token(
        &mut self,
        now_ms: i64,
        exchange: &dyn TokenExchange,
        client_id: &str,
        client_secret: &str,
    ) -> Option<String> {
        if self.cached.is_none() {
            self.cached = self.load_from_disk();
        }

        if let Some(token) = &self.cached {
            if token.is_valid_at(now_ms) {
                return Some(token.access_token.clone());
            }
        }

        match exchange.request_token(client_id, client_secret).await {
            Ok(grant) => {
                let token = CachedToken {
                    access_token: grant.access_token,
                    expiration_time_ms: now_ms + grant.expires_in_secs * 1000,
                };

                if let Err(e) = storage::save_cached_token(&self.cache_file, &token) {
                    warn!(error = %e, "Failed to cache the access token");
                }

                info!(
                    expires_at_ms = token.expiration_time_ms,
                    "Obtained a fresh access token"
                );

                let access_token = token.access_token.clone();
                self.cached = Some(token);
                Some(access_token)
            }
            Err(e) => {
                warn!(error = %e, "Token exchange failed; no rating this tick");
                None
            }
        }
    }

    /// Read the cache file. A corrupt file is removed (best-effort) so
    /// the next refresh starts clean.
    fn load_from_disk(&self) -> Option<CachedToken> {
        match storage::load_cached_token(&self.cache_file) {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Token cache unreadable; removing and refreshing");
                if let Err(del) = storage::delete_cached_token(&self.cache_file) {
                    warn!(error = %del, "Could not delete the token cache file");
                }
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
