//! Configuration loading, validation, and the first-run wizard.
//!
//! The config file is versioned JSON (`Config.json`) whose field names
//! are fixed — renaming a field means bumping `CONFIG_VERSION` and
//! handling the upgrade. Credentials can be overridden at runtime via
//! `SC2_CLIENT_ID` / `SC2_CLIENT_SECRET` so the secret never has to
//! live on disk.

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::types::{ReaderError, Region};

/// Current config file format version. Increment on any breaking change
/// to the field set.
pub const CONFIG_VERSION: i32 = 1;

/// Default polling interval for new config files.
const DEFAULT_MS_PER_READ: i64 = 5000;

/// Environment overrides for the client credentials.
const ENV_CLIENT_ID: &str = "SC2_CLIENT_ID";
const ENV_CLIENT_SECRET: &str = "SC2_CLIENT_SECRET";

// ---------------------------------------------------------------------------
// Config model
// ---------------------------------------------------------------------------

/// The reader's configuration, as stored in `Config.json`.
///
/// Field names are PascalCase on disk (`MsPerRead`, `DataDirectory`, ...)
/// so config files from earlier releases keep loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReaderConfig {
    /// Config file format version. Files from before versioning load as 0.
    #[serde(default)]
    pub version: i32,

    /// Milliseconds between refreshes.
    pub ms_per_read: i64,

    /// Directory for cached files (the token cache lives here).
    pub data_directory: String,

    /// Where to write the MMR output.
    pub mmr_file_path: String,

    /// "US", "EU", "KO" or "CN".
    pub region_id: String,

    /// 1 or 2, from the profile URL. Defaults to 1 for config files
    /// that predate the field.
    #[serde(default = "default_realm_id")]
    pub realm_id: i32,

    /// From the profile URL: `.../profile/<region>/<realm>/<profileId>/...`.
    pub profile_id: i64,

    /// From the ladder URL query: `...?ladderId=<ladderId>`.
    pub ladder_id: i64,

    /// Blizzard API developer credentials.
    pub client_id: String,
    pub client_secret: String,
}

fn default_realm_id() -> i32 {
    1
}

impl ReaderConfig {
    /// A config with defaults filled in; profile and credential fields
    /// are left for the user.
    pub fn create_default() -> Self {
        Self {
            version: CONFIG_VERSION,
            ms_per_read: DEFAULT_MS_PER_READ,
            data_directory: String::new(),
            mmr_file_path: "mmr.txt".to_string(),
            region_id: String::new(),
            realm_id: default_realm_id(),
            profile_id: 0,
            ladder_id: 0,
            client_id: String::new(),
            client_secret: String::new(),
        }
    }

    /// Load a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: ReaderConfig = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Save this config, pretty-printed.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialise config")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// The configured region, parsed.
    pub fn region(&self) -> Result<Region, ReaderError> {
        self.region_id.parse()
    }

    /// Path of the single-slot token cache file.
    pub fn access_cache_file(&self) -> PathBuf {
        Path::new(&self.data_directory).join("Access.tmp")
    }

    /// Make relative paths absolute with respect to `base_dir`
    /// (the executable's directory).
    pub fn resolve_paths(&mut self, base_dir: &Path) {
        if !Path::new(&self.mmr_file_path).is_absolute() {
            self.mmr_file_path = base_dir
                .join(&self.mmr_file_path)
                .to_string_lossy()
                .into_owned();
        }
        if !Path::new(&self.data_directory).is_absolute() {
            self.data_directory = base_dir
                .join(&self.data_directory)
                .to_string_lossy()
                .into_owned();
        }
    }

    /// Apply `SC2_CLIENT_ID` / `SC2_CLIENT_SECRET` overrides if set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var(ENV_CLIENT_ID) {
            self.client_id = id;
        }
        if let Ok(secret) = std::env::var(ENV_CLIENT_SECRET) {
            self.client_secret = secret;
        }
    }

    /// Check every invariant the engine relies on. The engine itself
    /// never re-validates.
    pub fn validate(&self) -> Result<()> {
        if self.ms_per_read <= 0 {
            bail!("MsPerRead must be positive, got {}", self.ms_per_read);
        }
        self.region()
            .with_context(|| format!("RegionId must be one of {:?}", Region::KNOWN))?;
        if self.mmr_file_path.is_empty() {
            bail!("MmrFilePath must not be empty");
        }
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            bail!(
                "ClientId and ClientSecret must be set (config file or {}/{})",
                ENV_CLIENT_ID,
                ENV_CLIENT_SECRET
            );
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Ladder URL parsing
// ---------------------------------------------------------------------------

/// Profile/ladder coordinates extracted from a pasted ladder URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LadderRef {
    pub region_id: String,
    pub realm_id: i32,
    pub profile_id: i64,
    pub ladder_id: i64,
}

/// Parse a ladder URL of the form
/// `https://starcraft2.com/<locale>/profile/<regionId>/<realmId>/<profileId>/ladders?ladderId=<ladderId>`.
///
/// The numeric region index in the URL maps 1=US, 2=EU, 3=KO, 5=CN.
/// Returns `None` for anything else — including profile pages without a
/// ladder id.
pub fn parse_ladder_url(url: &str) -> Option<LadderRef> {
    // The numeric URL index 4 is unassigned.
    const REGION_BY_INDEX: [&str; 6] = ["", "US", "EU", "KO", "", "CN"];

    let re =
        Regex::new(r"/profile/([0-9])/([0-9])/([0-9]+)/ladders\?ladderId=([0-9]+)").ok()?;
    let caps = re.captures(url)?;

    let region_index: usize = caps[1].parse().ok()?;
    let region_id = REGION_BY_INDEX.get(region_index).copied().unwrap_or("");
    if region_id.is_empty() {
        return None;
    }

    Some(LadderRef {
        region_id: region_id.to_string(),
        realm_id: caps[2].parse().ok()?,
        profile_id: caps[3].parse().ok()?,
        ladder_id: caps[4].parse().ok()?,
    })
}

// ---------------------------------------------------------------------------
// Interactive config flow
// ---------------------------------------------------------------------------

/// Run the full config-file flow: create the file if missing (wizard),
/// load it, offer a version upgrade, resolve paths, apply env
/// overrides, and validate.
///
/// Returns `Ok(None)` when the application should exit without running
/// (wizard declined, upgrade performed, version too new).
pub fn run_config_flow(config_path: &Path, exe_dir: &Path) -> Result<Option<ReaderConfig>> {
    if !config_path.exists() {
        run_create_config_flow(config_path)?;
        if !config_path.exists() {
            // User declined or cancelled the wizard.
            return Ok(None);
        }
    }

    let mut config = ReaderConfig::load(config_path)?;

    if config.version < CONFIG_VERSION {
        println!("The config file at {} is an older version.", config_path.display());
        println!("Upgrade it to the current format? New parameters get default values.");
        if prompt_choice(&["yes", "no"])? == "no" {
            return Ok(None);
        }

        config.version = CONFIG_VERSION;
        config.save(config_path)?;
        println!("The config file has been updated. Please check the settings and restart:");
        println!("\t{}", config_path.display());
        return Ok(None);
    }

    if config.version > CONFIG_VERSION {
        println!(
            "The config file at {} is for a newer release. Update the reader, or downgrade \
             the config file to version {}.",
            config_path.display(),
            CONFIG_VERSION
        );
        return Ok(None);
    }

    config.resolve_paths(exe_dir);
    config.apply_env_overrides();
    config.validate()?;

    println!("Using the config file at: {}", config_path.display());
    println!("Outputting MMR to: {}", config.mmr_file_path);
    println!();

    Ok(Some(config))
}

/// Walk the user through creating a config file. If they decline or
/// cancel partway through, no file is written.
fn run_create_config_flow(config_path: &Path) -> Result<()> {
    println!("You do not appear to have a config file at:");
    println!("\t{}", config_path.display());
    println!();
    println!("Would you like to create one?");
    if prompt_choice(&["yes", "no"])? == "no" {
        return Ok(());
    }

    let mut config = ReaderConfig::create_default();

    println!();
    println!("First we need the ladder you want to read the MMR for.");
    println!("Log in at starcraft2.com, open View Profile -> Ladders, pick a ladder");
    println!("under CURRENT SEASON LEAGUES, and paste the page URL below.");
    println!("    Example: https://starcraft2.com/en-us/profile/1/1/1986271/ladders?ladderId=274006");
    println!();

    let ladder = loop {
        let response = prompt("  (enter a URL, or q to quit): ")?;
        if response.eq_ignore_ascii_case("q") {
            println!("Exiting.");
            return Ok(());
        }
        match parse_ladder_url(&response) {
            Some(ladder) => break ladder,
            None => println!(
                "That URL is not valid. Make sure it is a specific ladder page, not your profile."
            ),
        }
    };

    config.region_id = ladder.region_id;
    config.realm_id = ladder.realm_id;
    config.profile_id = ladder.profile_id;
    config.ladder_id = ladder.ladder_id;

    println!();
    println!("Now the Blizzard API credentials (from a developer account at develop.battle.net).");
    config.client_id = prompt_nonempty("  (ClientId): ")?;
    config.client_secret = prompt_nonempty("  (ClientSecret): ")?;

    config
        .save(config_path)
        .with_context(|| format!("Could not save the config to {}", config_path.display()))?;

    println!();
    println!("All set. You can edit your settings at any time at:");
    println!("\t{}", config_path.display());
    println!();

    Ok(())
}

/// Print a prompt and read one trimmed line from stdin.
fn prompt(message: &str) -> Result<String> {
    print!("{message}");
    std::io::stdout().flush().context("Failed to flush stdout")?;

    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim().to_string())
}

/// Prompt until the user enters a non-empty line.
fn prompt_nonempty(message: &str) -> Result<String> {
    loop {
        let response = prompt(message)?;
        if !response.is_empty() {
            return Ok(response);
        }
    }
}

/// Prompt until the user enters one of `options`; returns the match.
fn prompt_choice<'a>(options: &[&'a str]) -> Result<&'a str> {
    let line = format!("  ({}): ", options.join("/"));
    loop {
        let response = prompt(&line)?;
        if let Some(option) = options.iter().find(|o| **o == response) {
            return Ok(*option);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
