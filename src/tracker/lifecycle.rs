// SPDX-License-Identifier: MPL-2.0
//! Session lifecycle manager.
//!
//! Owns the [`WatchSession`] record and the [`SessionPhase`] state machine
//! for exactly one (user, video) pair at a time. Every transition is a
//! guarded method: illegal transitions are refused rather than performed,
//! which is what makes duplicate session-start calls and stale async
//! results impossible instead of merely unlikely.
//!
//! Each video identity change bumps an epoch. Async results carry the
//! epoch they were issued under; results from an earlier epoch are
//! silently dropped by the engine.

use crate::domain::newtypes::{UserId, VideoId, ViewId};
use crate::domain::session::{SessionPhase, WatchSession};

/// State machine for one user's session on the current video.
#[derive(Debug)]
pub struct SessionLifecycle {
    user_id: UserId,
    video_id: Option<VideoId>,
    phase: SessionPhase,
    session: Option<WatchSession>,
    epoch: u64,
}

impl SessionLifecycle {
    /// Creates a lifecycle with no video loaded.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            video_id: None,
            phase: SessionPhase::None,
            session: None,
            epoch: 0,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the current phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Returns the current epoch.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Returns true if `epoch` belongs to the current video identity.
    #[must_use]
    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch == epoch
    }

    /// Returns the loaded video id.
    #[must_use]
    pub fn video_id(&self) -> Option<VideoId> {
        self.video_id
    }

    /// Returns the session record.
    #[must_use]
    pub fn session(&self) -> Option<&WatchSession> {
        self.session.as_ref()
    }

    /// Returns the session record for field updates.
    pub fn session_mut(&mut self) -> Option<&mut WatchSession> {
        self.session.as_mut()
    }

    /// Returns true while tracking without a backend session id.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.phase.is_active()
            && self
                .session
                .as_ref()
                .is_none_or(|session| session.view_id.is_none())
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Loads a new video identity: clears all session state, bumps the
    /// epoch, and enters `Checking`. Returns the new epoch.
    pub fn load_video(&mut self, video_id: VideoId, duration_secs: Option<f64>) -> u64 {
        self.video_id = Some(video_id);
        self.session = Some(WatchSession::new(self.user_id, video_id, duration_secs));
        self.phase = SessionPhase::Checking;
        self.epoch += 1;
        self.epoch
    }

    /// Concludes the check with a resumable session found.
    pub fn check_concluded_resumable(&mut self) -> bool {
        if self.phase != SessionPhase::Checking {
            return false;
        }
        self.phase = SessionPhase::Resumable;
        true
    }

    /// Concludes the check with nothing to resume (or a failed check,
    /// which degrades to the same thing: ready for a fresh session).
    pub fn check_concluded_ready(&mut self) -> bool {
        if self.phase != SessionPhase::Checking {
            return false;
        }
        self.phase = SessionPhase::Ready;
        true
    }

    /// Guarded `Ready -> Starting` transition on the first play signal.
    ///
    /// Returns true exactly once per readiness: a second play signal
    /// while the start call is in flight is refused, which is what
    /// prevents duplicate concurrent session-start calls.
    pub fn try_begin_start(&mut self) -> bool {
        if !self.phase.accepts_play() {
            return false;
        }
        self.phase = SessionPhase::Starting;
        true
    }

    /// Guarded `Resumable -> Starting` transition for a resume decision.
    pub fn begin_resume(&mut self) -> bool {
        if self.phase != SessionPhase::Resumable {
            return false;
        }
        self.phase = SessionPhase::Starting;
        true
    }

    /// Guarded `Resumable -> Starting` transition for a start-over
    /// decision. Resets local progress to zero; the forced-new session id
    /// arrives asynchronously.
    pub fn begin_start_over(&mut self) -> bool {
        if self.phase != SessionPhase::Resumable {
            return false;
        }
        if let Some(session) = self.session.as_mut() {
            session.view_id = None;
            session.watched_secs = 0.0;
            session.playhead_secs = 0.0;
            session.last_persisted_watched_secs = 0.0;
        }
        self.phase = SessionPhase::Starting;
        true
    }

    /// Attaches a backend-allocated session id.
    ///
    /// Accepted while `Starting`, `Active`, or `PausedHidden` (a slow
    /// start response is still useful after a hide). Refused otherwise,
    /// so a stale response cannot resurrect a finished session.
    pub fn attach_view(&mut self, view_id: ViewId) -> bool {
        if !self.phase.accepts_session_id() {
            return false;
        }
        if let Some(session) = self.session.as_mut() {
            session.view_id = Some(view_id);
            return true;
        }
        false
    }

    /// `Starting -> Active` once a session-obtaining call settled.
    pub fn activate(&mut self) -> bool {
        if self.phase != SessionPhase::Starting {
            return false;
        }
        self.phase = SessionPhase::Active;
        true
    }

    /// `Starting -> Active` without a session id: local-only
    /// accumulation. Persistence is skipped until an id exists.
    pub fn degrade(&mut self) -> bool {
        if self.phase != SessionPhase::Starting {
            return false;
        }
        self.phase = SessionPhase::Active;
        true
    }

    /// `Resumable -> Active` for a resume resolved locally (degraded
    /// resume fallback or tab-return without a backend session).
    pub fn activate_from_prompt(&mut self) -> bool {
        if !matches!(self.phase, SessionPhase::Resumable | SessionPhase::Starting) {
            return false;
        }
        self.phase = SessionPhase::Active;
        true
    }

    /// `Active -> PausedHidden` when the tab goes hidden mid-playback.
    pub fn hide(&mut self) -> bool {
        if self.phase != SessionPhase::Active {
            return false;
        }
        self.phase = SessionPhase::PausedHidden;
        true
    }

    /// `PausedHidden -> Resumable` when the tab becomes visible again:
    /// progress is offered for resumption rather than silently continued.
    pub fn reprompt(&mut self) -> bool {
        if self.phase != SessionPhase::PausedHidden {
            return false;
        }
        self.phase = SessionPhase::Resumable;
        true
    }

    /// Terminal transition once the backend reports completion. Clears
    /// the session id so no further updates are sent; returns the id the
    /// session completed under.
    pub fn complete(&mut self) -> Option<ViewId> {
        if self.phase.is_terminal() {
            return None;
        }
        self.phase = SessionPhase::Completed;
        let session = self.session.as_mut()?;
        session.mark_complete();
        session.view_id.take()
    }

    /// Clears everything on component teardown.
    pub fn teardown(&mut self) {
        self.phase = SessionPhase::None;
        self.video_id = None;
        self.session = None;
    }

    /// Copies live progress into the session record. Called on every
    /// accumulator tick; the session never regresses its watched time
    /// through this path.
    pub fn sync_progress(
        &mut self,
        watched_secs: f64,
        playhead_secs: f64,
        duration_secs: Option<f64>,
    ) {
        if let Some(session) = self.session.as_mut() {
            if watched_secs > session.watched_secs {
                session.watched_secs = watched_secs;
            }
            session.playhead_secs = playhead_secs;
            if session.duration_secs.is_none() {
                session.duration_secs = duration_secs;
            }
        }
    }
}
