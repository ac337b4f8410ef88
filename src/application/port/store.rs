// SPDX-License-Identifier: MPL-2.0
//! Session store port definition.
//!
//! This module defines the [`SessionStore`] trait for the backend session
//! endpoints. Infrastructure adapters (like the HTTP store) implement this
//! trait; the engine never talks to a network directly.
//!
//! # Design Notes
//!
//! - Every method is a suspension point: the engine tolerates arbitrary
//!   delay or failure at each call without corrupting local state
//! - Methods return `impl Future + Send` so the runtime can run calls as
//!   spawned tasks and feed completions back into the event loop
//! - Failures are [`StoreError`]s, never panics; the engine degrades to
//!   session-less tracking instead of surfacing errors to the viewer

use crate::domain::newtypes::{VideoId, ViewId};
use crate::domain::session::ProgressSnapshot;
use chrono::{DateTime, Utc};
use std::fmt;
use std::future::Future;

// =============================================================================
// Outcomes
// =============================================================================

/// A previously persisted, not-yet-completed session eligible for resume.
#[derive(Debug, Clone, PartialEq)]
pub struct ResumableSessionInfo {
    pub view_id: ViewId,
    pub playhead_secs: f64,
    pub watched_secs: f64,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Result of a resumable-session check.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    /// A resumable session with a non-zero playhead exists.
    Resumable(ResumableSessionInfo),
    /// Nothing to resume; a fresh session may be started on first play.
    NoSession,
}

/// Result of opening a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StartOutcome {
    pub view_id: ViewId,
    /// Watched seconds already recorded on the reopened session; zero for
    /// a brand-new one.
    pub watched_secs: f64,
}

/// Result of re-opening an existing session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResumeOutcome {
    pub view_id: ViewId,
    pub playhead_secs: f64,
    pub watched_secs: f64,
}

/// Result of a progress update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateOutcome {
    /// True once the backend judged the session complete.
    pub is_complete: bool,
}

// =============================================================================
// Errors
// =============================================================================

/// Which endpoint an error came from, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    Check,
    Start,
    Resume,
    Update,
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreOperation::Check => write!(f, "check"),
            StoreOperation::Start => write!(f, "start"),
            StoreOperation::Resume => write!(f, "resume"),
            StoreOperation::Update => write!(f, "update"),
        }
    }
}

/// Failure of a session store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Network-level failure (connect, DNS, broken pipe).
    Transport(String),
    /// The endpoint answered with a non-success status.
    Status(u16),
    /// The response body could not be decoded.
    Protocol(String),
    /// The call did not complete within the configured timeout.
    Timeout,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Transport(msg) => write!(f, "transport failure: {}", msg),
            StoreError::Status(code) => write!(f, "unexpected status: {}", code),
            StoreError::Protocol(msg) => write!(f, "malformed response: {}", msg),
            StoreError::Timeout => write!(f, "request timed out"),
        }
    }
}

impl From<StoreError> for crate::error::Error {
    fn from(err: StoreError) -> Self {
        crate::error::Error::Transport(err.to_string())
    }
}

// =============================================================================
// SessionStore Trait
// =============================================================================

/// Port for the backend session endpoints.
///
/// # Endpoints
///
/// - `check`: does a resumable session exist for this user and video?
/// - `start`: open a session (`force_new` abandons any resumable one)
/// - `resume`: re-open a known session by id
/// - `update`: push one capped progress snapshot
pub trait SessionStore {
    /// Checks for a resumable session.
    fn check(
        &self,
        video_id: VideoId,
    ) -> impl Future<Output = Result<CheckOutcome, StoreError>> + Send;

    /// Opens a session for the video.
    fn start(
        &self,
        video_id: VideoId,
        force_new: bool,
    ) -> impl Future<Output = Result<StartOutcome, StoreError>> + Send;

    /// Re-opens an existing session.
    fn resume(
        &self,
        video_id: VideoId,
        view_id: ViewId,
    ) -> impl Future<Output = Result<ResumeOutcome, StoreError>> + Send;

    /// Pushes a progress snapshot.
    fn update(
        &self,
        video_id: VideoId,
        snapshot: ProgressSnapshot,
    ) -> impl Future<Output = Result<UpdateOutcome, StoreError>> + Send;
}
