//! Configuration file parser for ~/.config/newsdesk/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are accepted but logged, since they are usually typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::refresh::{BackoffPolicy, RefreshSettings};
use crate::util::RewriteRules;

/// Boilerplate appended to every TechCrunch description.
const TECHCRUNCH_FOOTER: &str = "© 2024 TechCrunch. All rights reserved. For personal use only.";

/// Embedded images in descriptions.
const IMG_TAG_PATTERN: &str = r"(?is)<img\b[^>]*>";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("Invalid strip pattern: {0}")]
    Pattern(#[from] regex::Error),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds to sleep between refresh cycles.
    pub refresh_interval_secs: u64,

    /// Per-feed fetch timeout in seconds.
    pub fetch_timeout_secs: u64,

    /// Items shown in each feed's section.
    pub max_items_per_feed: usize,

    /// Feeds fetched in parallel within a cycle. 1 fetches one at a time.
    pub fetch_concurrency: usize,

    /// Backoff after the first failure, doubled per further failure.
    pub backoff_base_secs: u64,

    /// Upper bound on the backoff.
    pub backoff_max_secs: u64,

    /// Literal phrases removed from descriptions, in order.
    pub strip_phrases: Vec<String>,

    /// Regular expressions removed from descriptions after the phrases.
    pub strip_patterns: Vec<String>,

    /// SQLite database path. Defaults to `newsdesk.db` in the config directory.
    pub database_path: Option<PathBuf>,

    /// Also write each published page to this file.
    pub output_path: Option<PathBuf>,

    /// Write per-feed refresh status as JSON to this file after every cycle.
    pub status_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 300,
            fetch_timeout_secs: 30,
            max_items_per_feed: 10,
            fetch_concurrency: 1,
            backoff_base_secs: 120,
            backoff_max_secs: 7200,
            strip_phrases: vec![TECHCRUNCH_FOOTER.to_string()],
            strip_patterns: vec![IMG_TAG_PATTERN.to_string()],
            database_path: None,
            output_path: None,
            status_path: None,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 11] = [
        "refresh_interval_secs",
        "fetch_timeout_secs",
        "max_items_per_feed",
        "fetch_concurrency",
        "backoff_base_secs",
        "backoff_max_secs",
        "strip_phrases",
        "strip_patterns",
        "database_path",
        "output_path",
        "status_path",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Out-of-range values → `Err(ConfigError::Invalid)`
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::info!(
            path = %path.display(),
            interval_secs = config.refresh_interval_secs,
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("refresh_interval_secs", self.refresh_interval_secs),
            ("fetch_timeout_secs", self.fetch_timeout_secs),
            ("max_items_per_feed", self.max_items_per_feed as u64),
            ("fetch_concurrency", self.fetch_concurrency as u64),
            ("backoff_base_secs", self.backoff_base_secs),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    key,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        if self.backoff_max_secs < self.backoff_base_secs {
            return Err(ConfigError::Invalid {
                key: "backoff_max_secs",
                reason: format!(
                    "{} is below backoff_base_secs ({})",
                    self.backoff_max_secs, self.backoff_base_secs
                ),
            });
        }
        Ok(())
    }

    /// Scheduler settings derived from this configuration.
    pub fn refresh_settings(&self) -> Result<RefreshSettings, ConfigError> {
        self.validate()?;
        Ok(RefreshSettings {
            interval: Duration::from_secs(self.refresh_interval_secs),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            max_items_per_feed: self.max_items_per_feed,
            concurrency: self.fetch_concurrency,
            backoff: BackoffPolicy::new(
                Duration::from_secs(self.backoff_base_secs),
                Duration::from_secs(self.backoff_max_secs),
            ),
            rewrites: RewriteRules::from_config(&self.strip_phrases, &self.strip_patterns)?,
            export_path: self.output_path.clone(),
            status_path: self.status_path.clone(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
