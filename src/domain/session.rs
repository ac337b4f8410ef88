// SPDX-License-Identifier: MPL-2.0
//! Watch-session state and completion rules.
//!
//! A [`WatchSession`] records how much of one video one user has actually
//! watched. It is owned exclusively by the lifecycle manager; the
//! accumulator and the persistence gateway touch individual fields only
//! through manager-exposed operations.

use super::newtypes::{UserId, VideoId, ViewId};
use chrono::{DateTime, Utc};

/// Completion thresholds.
///
/// Videos longer than [`LONG_VIDEO_SECS`] complete at 90 % playhead
/// coverage, shorter ones at 80 %. The backend applies the same predicate
/// authoritatively on every progress update; the client computes it to
/// send an `isComplete` hint with capped, duration-bounded values.
pub mod completion {
    /// Boundary between "short" and "long" videos, in seconds.
    pub const LONG_VIDEO_SECS: f64 = 300.0;
    /// Completion ratio for videos longer than the boundary.
    pub const LONG_RATIO: f64 = 0.90;
    /// Completion ratio for videos at or under the boundary.
    pub const SHORT_RATIO: f64 = 0.80;
}

/// Returns true once the playhead has covered enough of the video for the
/// session to count as complete.
#[must_use]
pub fn completion_reached(playhead_secs: f64, duration_secs: f64) -> bool {
    if duration_secs <= 0.0 {
        return false;
    }
    let ratio = playhead_secs / duration_secs;
    if duration_secs > completion::LONG_VIDEO_SECS {
        ratio >= completion::LONG_RATIO
    } else {
        ratio >= completion::SHORT_RATIO
    }
}

/// Phase of the per-video session lifecycle.
///
/// Transitions are driven exclusively by the lifecycle manager:
///
/// ```text
/// None ──▶ Checking ──▶ Resumable ──▶ Starting ──▶ Active ──▶ Completed
///              │             ▲            ▲           │
///              └──▶ Ready ───┼────────────┘           ▼
///                            └──────────────── PausedHidden
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// No session; set whenever the video identity changes.
    #[default]
    None,

    /// A backend query for a resumable session is in flight.
    Checking,

    /// A resumable session was found (or a hide/show cycle occurred);
    /// the resume prompt controller owns the next transition.
    Resumable,

    /// No resumable session; waiting for the first play signal before
    /// opening a session (sessions are never created by page load alone).
    Ready,

    /// A session-start or session-resume call is in flight. Guards
    /// against duplicate concurrent session-start calls.
    Starting,

    /// A session is open; watch time accumulates and progress persists.
    Active,

    /// The tab went hidden while active; playback was force-paused and a
    /// final snapshot pushed. Becoming visible re-prompts.
    PausedHidden,

    /// Terminal. The backend reported completion; no further updates.
    Completed,
}

impl SessionPhase {
    /// Returns true if a session-obtaining call may be issued from here.
    #[must_use]
    pub fn accepts_play(self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Returns true if the session is open for accumulation.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Returns true if this phase is terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns true if a backend call may still attach a view id.
    #[must_use]
    pub fn accepts_session_id(self) -> bool {
        matches!(self, Self::Starting | Self::Active | Self::PausedHidden)
    }
}

/// Client-side record of one viewing of one video by one user.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchSession {
    /// Backend-allocated session id. `None` while tracking in degraded
    /// (session-less) mode; persistence is skipped until it exists.
    pub view_id: Option<ViewId>,
    pub user_id: UserId,
    pub video_id: VideoId,
    /// Seconds of engaged playback measured by the accumulator.
    pub watched_secs: f64,
    /// Current playhead position within the video's own timeline.
    pub playhead_secs: f64,
    /// Video duration, once known from the catalog or the player.
    pub duration_secs: Option<f64>,
    /// One-way completion flag: once true it is never unset.
    is_complete: bool,
    /// Watched seconds confirmed received by the backend.
    pub last_persisted_watched_secs: f64,
    pub created_at: DateTime<Utc>,
}

impl WatchSession {
    /// Creates a fresh session record with zero progress.
    #[must_use]
    pub fn new(user_id: UserId, video_id: VideoId, duration_secs: Option<f64>) -> Self {
        Self {
            view_id: None,
            user_id,
            video_id,
            watched_secs: 0.0,
            playhead_secs: 0.0,
            duration_secs,
            is_complete: false,
            last_persisted_watched_secs: 0.0,
            created_at: Utc::now(),
        }
    }

    /// Returns the completion flag.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    /// Marks the session complete. Terminal: there is no way back.
    pub fn mark_complete(&mut self) {
        self.is_complete = true;
    }

    /// Returns true if watched time has advanced past what the backend
    /// has confirmed.
    #[must_use]
    pub fn has_unpersisted_progress(&self) -> bool {
        self.watched_secs > self.last_persisted_watched_secs
    }

    /// Returns the client-side completion hint for the current playhead.
    #[must_use]
    pub fn completion_hint(&self) -> bool {
        if self.is_complete {
            return true;
        }
        match self.duration_secs {
            Some(duration) => completion_reached(self.playhead_secs, duration),
            None => false,
        }
    }
}

/// One capped progress report bound for the backend.
///
/// `version` increases monotonically per session so the backend can
/// discard out-of-order updates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub view_id: ViewId,
    pub watch_time_secs: u64,
    pub playhead_secs: f64,
    pub is_complete: bool,
    pub version: u64,
}
