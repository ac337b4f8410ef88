// SPDX-License-Identifier: MPL-2.0
//! Centralized default values for all tracker configuration constants.
//!
//! This module serves as the single source of truth for default values
//! used across the engine. Constants are organized by category.
//!
//! # Categories
//!
//! - **Sampling**: Accumulator tick and position poll cadence
//! - **Persistence**: Progress push threshold
//! - **Embed discovery**: Retry bounds for finding the embedded player
//! - **Resume**: Delayed autoplay after a resume seek
//! - **Transport**: Session endpoint timeout and retry policy

// ==========================================================================
// Sampling Defaults
// ==========================================================================

/// Default accumulator sampling tick in milliseconds.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 100;

/// Default interval between position/duration queries to the embedded
/// player, in milliseconds.
pub const DEFAULT_POSITION_POLL_INTERVAL_MS: u64 = 1_000;

// ==========================================================================
// Persistence Defaults
// ==========================================================================

/// Watched-time advance (in seconds) that triggers a threshold push.
pub const DEFAULT_SAVE_THRESHOLD_SECS: f64 = 10.0;

// ==========================================================================
// Embed Discovery Defaults
// ==========================================================================

/// Maximum attempts to locate the embedded player element before the
/// video is declared untracked (degraded mode).
pub const DEFAULT_EMBED_RETRY_LIMIT: u32 = 20;

/// Interval between embed discovery attempts, in milliseconds.
pub const DEFAULT_EMBED_RETRY_INTERVAL_MS: u64 = 500;

/// Origin substring inbound cross-document messages must match.
pub const DEFAULT_TRUSTED_ORIGIN: &str = "player.vimeo.com";

// ==========================================================================
// Resume Defaults
// ==========================================================================

/// Delay between issuing a resume seek and the follow-up play command,
/// giving the underlying player time to finish seeking, in milliseconds.
pub const DEFAULT_AUTOPLAY_DELAY_MS: u64 = 500;

// ==========================================================================
// Transport Defaults
// ==========================================================================

/// Per-request timeout for session endpoints, in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

/// Retries after a failed session endpoint call (on top of the first
/// attempt).
pub const DEFAULT_REQUEST_RETRY_LIMIT: u32 = 1;
