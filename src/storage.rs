//! Persistence layer.
//!
//! Two single-slot files, both exclusively written by the engine:
//! the token cache (`Access.tmp`, JSON) and the MMR output file
//! (plain decimal text). Each write overwrites the prior value
//! wholesale.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

use crate::types::{CachedToken, ReaderError};

/// Load the cached token from disk.
///
/// Returns `Ok(None)` if the file does not exist. An unreadable or
/// unparseable file is a `CacheCorruption` error — the caller treats
/// that as "no cached token" and regenerates it.
pub fn load_cached_token(path: &Path) -> Result<Option<CachedToken>, ReaderError> {
    if !path.exists() {
        debug!(path = %path.display(), "No token cache file");
        return Ok(None);
    }

    let json = std::fs::read_to_string(path)
        .map_err(|e| ReaderError::CacheCorruption(format!("unreadable cache file: {e}")))?;

    let token: CachedToken = serde_json::from_str(&json)
        .map_err(|e| ReaderError::CacheCorruption(format!("unparseable cache file: {e}")))?;

    debug!(path = %path.display(), "Token cache loaded from disk");
    Ok(Some(token))
}

/// Save the cached token to disk, overwriting any prior value.
pub fn save_cached_token(path: &Path, token: &CachedToken) -> Result<()> {
    let json = serde_json::to_string_pretty(token).context("Failed to serialise token")?;

    std::fs::write(path, &json)
        .with_context(|| format!("Failed to write token cache to {}", path.display()))?;

    debug!(path = %path.display(), "Token cache saved");
    Ok(())
}

/// Delete the token cache file. Succeeds if the file is already gone.
pub fn delete_cached_token(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to delete token cache {}", path.display()))?;
    }
    Ok(())
}

/// Write the rating to the output file as plain decimal text.
pub fn write_mmr(path: &Path, mmr: i64) -> Result<()> {
    std::fs::write(path, mmr.to_string())
        .with_context(|| format!("Failed to write MMR to {}", path.display()))?;

    debug!(path = %path.display(), mmr, "MMR written");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
