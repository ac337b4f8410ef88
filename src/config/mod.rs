// SPDX-License-Identifier: MPL-2.0
//! This module handles the tracker's configuration, including loading and
//! saving settings to a `tracker.toml` file.
//!
//! # Examples
//!
//! ```no_run
//! use watchtrack::config::{self, TrackerConfig};
//!
//! // Load existing configuration
//! let mut config = config::load().unwrap_or_default();
//!
//! // Modify a setting
//! config.save_threshold_secs = Some(15.0);
//!
//! // Save the modified configuration
//! config::save(&config).expect("Failed to save config");
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod defaults;

const CONFIG_FILE: &str = "tracker.toml";
const APP_NAME: &str = "WatchTrack";

/// Tracker settings, all optional in the file; absent fields fall back to
/// the constants in [`defaults`].
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TrackerConfig {
    /// Base URL of the session backend, e.g. `https://example.org/api`.
    pub api_base_url: Option<String>,
    /// Origin substring inbound player messages must match.
    pub trusted_origin: Option<String>,
    #[serde(default)]
    pub tick_interval_ms: Option<u64>,
    #[serde(default)]
    pub position_poll_interval_ms: Option<u64>,
    #[serde(default)]
    pub save_threshold_secs: Option<f64>,
    #[serde(default)]
    pub embed_retry_limit: Option<u32>,
    #[serde(default)]
    pub embed_retry_interval_ms: Option<u64>,
    #[serde(default)]
    pub autoplay_delay_ms: Option<u64>,
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    #[serde(default)]
    pub request_retry_limit: Option<u32>,
}

impl TrackerConfig {
    /// Accumulator sampling tick.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(
            self.tick_interval_ms
                .unwrap_or(defaults::DEFAULT_TICK_INTERVAL_MS),
        )
    }

    /// Interval between position queries to the embedded player.
    #[must_use]
    pub fn position_poll_interval(&self) -> Duration {
        Duration::from_millis(
            self.position_poll_interval_ms
                .unwrap_or(defaults::DEFAULT_POSITION_POLL_INTERVAL_MS),
        )
    }

    /// Watched-time advance that triggers a threshold push.
    #[must_use]
    pub fn save_threshold(&self) -> f64 {
        self.save_threshold_secs
            .unwrap_or(defaults::DEFAULT_SAVE_THRESHOLD_SECS)
    }

    /// Maximum embed discovery attempts before degraded mode.
    #[must_use]
    pub fn embed_retry_limit(&self) -> u32 {
        self.embed_retry_limit
            .unwrap_or(defaults::DEFAULT_EMBED_RETRY_LIMIT)
    }

    /// Interval between embed discovery attempts.
    #[must_use]
    pub fn embed_retry_interval(&self) -> Duration {
        Duration::from_millis(
            self.embed_retry_interval_ms
                .unwrap_or(defaults::DEFAULT_EMBED_RETRY_INTERVAL_MS),
        )
    }

    /// Delay between a resume seek and the follow-up play command.
    #[must_use]
    pub fn autoplay_delay(&self) -> Duration {
        Duration::from_millis(
            self.autoplay_delay_ms
                .unwrap_or(defaults::DEFAULT_AUTOPLAY_DELAY_MS),
        )
    }

    /// Per-request timeout for session endpoints.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(
            self.request_timeout_ms
                .unwrap_or(defaults::DEFAULT_REQUEST_TIMEOUT_MS),
        )
    }

    /// Retries after a failed session endpoint call.
    #[must_use]
    pub fn request_retry_limit(&self) -> u32 {
        self.request_retry_limit
            .unwrap_or(defaults::DEFAULT_REQUEST_RETRY_LIMIT)
    }

    /// Trusted origin substring for inbound player messages.
    #[must_use]
    pub fn trusted_origin(&self) -> &str {
        self.trusted_origin
            .as_deref()
            .unwrap_or(defaults::DEFAULT_TRUSTED_ORIGIN)
    }
}

fn get_default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|mut path| {
        path.push(APP_NAME);
        path.push(CONFIG_FILE);
        path
    })
}

pub fn load() -> Result<TrackerConfig> {
    if let Some(path) = get_default_config_path() {
        if path.exists() {
            return load_from_path(&path);
        }
    }
    Ok(TrackerConfig::default())
}

pub fn save(config: &TrackerConfig) -> Result<()> {
    if let Some(path) = get_default_config_path() {
        return save_to_path(config, &path);
    }
    Ok(())
}

pub fn load_from_path(path: &Path) -> Result<TrackerConfig> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content).unwrap_or_default())
}

pub fn save_to_path(config: &TrackerConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    fs::write(path, content)?;
    Ok(())
}
