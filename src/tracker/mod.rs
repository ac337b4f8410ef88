// SPDX-License-Identifier: MPL-2.0
//! Watch-session tracking engine.
//!
//! [`WatchTracker`] is a synchronous state machine: host signals and
//! async-call completions go in as [`Message`]s, side effects to perform
//! come out as [`Effect`]s. It owns every component of the subsystem:
//!
//! - [`Normalizer`]: folds producer signals into one player state
//! - [`WatchTimeAccumulator`]: integrates engaged playback time
//! - [`SessionLifecycle`]: the per-video session state machine
//! - [`ProgressGateway`]: decides when and what to persist
//! - [`ResumeController`]: the resume-or-start-over prompt
//!
//! The engine never performs I/O and never reads the clock; callers pass
//! `now` into [`WatchTracker::handle`]. The [`runtime`] module drives it
//! against real timers, a real store, and a real player channel.

pub mod accumulator;
pub mod lifecycle;
pub mod normalizer;
pub mod persistence;
pub mod resume;
pub mod runtime;

use std::time::Instant;

use crate::application::port::channel::{EmbedEventName, PlayerCommand};
use crate::application::port::store::{
    CheckOutcome, ResumeOutcome, StartOutcome, StoreError, StoreOperation, UpdateOutcome,
};
use crate::config::TrackerConfig;
use crate::diagnostics::{DegradedReason, DiagnosticsHandle, PushReason, TrackingEvent};
use crate::domain::newtypes::{UserId, VideoId, ViewId};
use crate::domain::playback::{
    NormalizedPlayerState, PlaybackEvent, PlaybackEventKind, SourceId,
};
use crate::domain::session::{ProgressSnapshot, SessionPhase};
use crate::infrastructure::embed::{self, EmbedInbound};

pub use accumulator::WatchTimeAccumulator;
pub use lifecycle::SessionLifecycle;
pub use normalizer::{ConnectorPoll, EmbedConnector, Normalizer, SignalInterpreter, Transition};
pub use persistence::{ProgressGateway, SnapshotOutcome};
pub use resume::{PromptOrigin, ResumeChoice, ResumeController, ResumePrompt};
pub use runtime::{HostSignal, TrackerHandle, TrackerRuntime};

// =============================================================================
// Messages
// =============================================================================

/// Inputs to the engine: host signals and async-call completions.
#[derive(Debug, Clone)]
pub enum Message {
    // ═══════════════════════════════════════════════════════════════════════
    // HOST SIGNALS
    // ═══════════════════════════════════════════════════════════════════════
    /// The video identity changed; all tracking state resets.
    VideoLoaded {
        video_id: VideoId,
        /// Catalog duration, when known up front.
        duration_secs: Option<f64>,
    },

    /// One embed discovery attempt concluded.
    EmbedProbe { embed_present: bool },

    /// A raw cross-document message arrived.
    EmbedMessage { origin: String, payload: String },

    /// A playback signal from a producer the host feeds directly
    /// (typically the native media element).
    Playback {
        source: SourceId,
        kind: PlaybackEventKind,
        position_secs: Option<f64>,
        duration_secs: Option<f64>,
    },

    /// Accumulator sampling tick.
    Tick,

    /// The document's visibility changed.
    VisibilityChanged { hidden: bool },

    /// The viewer decided a resume prompt.
    ResumeDecision(ResumeChoice),

    // ═══════════════════════════════════════════════════════════════════════
    // ASYNC COMPLETIONS
    // ═══════════════════════════════════════════════════════════════════════
    /// A resumable-session check settled.
    CheckFinished {
        epoch: u64,
        result: Result<CheckOutcome, StoreError>,
    },

    /// A session-start call settled.
    StartFinished {
        epoch: u64,
        force_new: bool,
        result: Result<StartOutcome, StoreError>,
    },

    /// A session-resume call settled.
    ResumeFinished {
        epoch: u64,
        result: Result<ResumeOutcome, StoreError>,
    },

    /// A progress update settled.
    UpdateFinished {
        epoch: u64,
        /// Session id the update was sent for; a settle for an abandoned
        /// id (the viewer started over mid-flight) is dropped.
        view_id: ViewId,
        result: Result<UpdateOutcome, StoreError>,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // LIFECYCLE
    // ═══════════════════════════════════════════════════════════════════════
    /// The tracking component is going away; final persistence runs now.
    Teardown,
}

// =============================================================================
// Effects
// =============================================================================

/// Side effects for the driver to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Query the store for a resumable session.
    CheckSession { video_id: VideoId, epoch: u64 },

    /// Open a session on the store.
    StartSession {
        video_id: VideoId,
        force_new: bool,
        epoch: u64,
    },

    /// Re-open an existing session on the store.
    ResumeSession {
        video_id: VideoId,
        view_id: ViewId,
        epoch: u64,
    },

    /// Push one progress snapshot to the store.
    PushProgress {
        video_id: VideoId,
        snapshot: ProgressSnapshot,
        epoch: u64,
    },

    /// Send one command to the embedded player.
    Player(PlayerCommand),

    /// Send a play command after the configured autoplay delay, giving
    /// the player time to finish a pending seek.
    PlayAfterDelay,

    /// Present a resume prompt to the viewer.
    PromptResume(ResumePrompt),
}

// =============================================================================
// WatchTracker
// =============================================================================

/// The watch-session tracking engine.
pub struct WatchTracker {
    lifecycle: SessionLifecycle,
    normalizer: Normalizer,
    interpreter: SignalInterpreter,
    connector: EmbedConnector,
    accumulator: WatchTimeAccumulator,
    gateway: ProgressGateway,
    resume: ResumeController,
    trusted_origin: String,
    save_threshold_secs: f64,
    embed_retry_limit: u32,
    diagnostics: Option<DiagnosticsHandle>,
}

impl WatchTracker {
    /// Creates an engine for one user with the given settings.
    #[must_use]
    pub fn new(
        user_id: UserId,
        config: &TrackerConfig,
        diagnostics: Option<DiagnosticsHandle>,
    ) -> Self {
        Self {
            lifecycle: SessionLifecycle::new(user_id),
            normalizer: Normalizer::new(),
            interpreter: SignalInterpreter::new(),
            connector: EmbedConnector::new(config.embed_retry_limit()),
            accumulator: WatchTimeAccumulator::new(),
            gateway: ProgressGateway::new(config.save_threshold()),
            resume: ResumeController::new(),
            trusted_origin: config.trusted_origin().to_string(),
            save_threshold_secs: config.save_threshold(),
            embed_retry_limit: config.embed_retry_limit(),
            diagnostics,
        }
    }

    /// Returns the normalized player state.
    #[must_use]
    pub fn player_state(&self) -> &NormalizedPlayerState {
        self.normalizer.state()
    }

    /// Returns the current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.lifecycle.phase()
    }

    /// Returns the watched seconds counted so far.
    #[must_use]
    pub fn watched_secs(&self) -> f64 {
        self.accumulator.watched_secs()
    }

    /// Returns the session record, when a video is loaded.
    #[must_use]
    pub fn session(&self) -> Option<&crate::domain::session::WatchSession> {
        self.lifecycle.session()
    }

    /// Returns true while tracking without a backend session id.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.lifecycle.is_degraded()
    }

    /// Returns true once the embedded player element has been discovered.
    #[must_use]
    pub fn embed_connected(&self) -> bool {
        self.connector.is_connected()
    }

    /// Processes one message at time `now` and returns the effects to
    /// perform. Messages are processed in arrival order; all ordering
    /// between conflicting playback signals happens inside the
    /// normalizer's timestamped log.
    pub fn handle(&mut self, message: Message, now: Instant) -> Vec<Effect> {
        match message {
            Message::VideoLoaded {
                video_id,
                duration_secs,
            } => self.on_video_loaded(video_id, duration_secs),
            Message::EmbedProbe { embed_present } => self.on_embed_probe(embed_present),
            Message::EmbedMessage { origin, payload } => {
                self.on_embed_message(&origin, &payload, now)
            }
            Message::Playback {
                source,
                kind,
                position_secs,
                duration_secs,
            } => self.apply_playback_event(
                PlaybackEvent {
                    kind,
                    source,
                    position_secs,
                    duration_secs,
                    observed_at: now,
                },
                now,
            ),
            Message::Tick => self.on_tick(now),
            Message::VisibilityChanged { hidden } => self.on_visibility(hidden, now),
            Message::ResumeDecision(choice) => self.on_resume_decision(choice, now),
            Message::CheckFinished { epoch, result } => self.on_check_finished(epoch, result),
            Message::StartFinished {
                epoch,
                force_new,
                result,
            } => self.on_start_finished(epoch, force_new, result, now),
            Message::ResumeFinished { epoch, result } => {
                self.on_resume_finished(epoch, result, now)
            }
            Message::UpdateFinished {
                epoch,
                view_id,
                result,
            } => self.on_update_finished(epoch, view_id, result),
            Message::Teardown => self.on_teardown(now),
        }
    }

    // =========================================================================
    // Host signals
    // =========================================================================

    fn on_video_loaded(&mut self, video_id: VideoId, duration_secs: Option<f64>) -> Vec<Effect> {
        let epoch = self.lifecycle.load_video(video_id, duration_secs);

        self.normalizer.reset();
        self.interpreter.reset();
        self.connector = EmbedConnector::new(self.embed_retry_limit);
        self.accumulator = WatchTimeAccumulator::new();
        if let Some(duration) = duration_secs {
            self.accumulator.set_duration(duration);
        }
        self.gateway = ProgressGateway::new(self.save_threshold_secs);
        self.resume.reset();

        vec![Effect::CheckSession { video_id, epoch }]
    }

    fn on_embed_probe(&mut self, embed_present: bool) -> Vec<Effect> {
        match self.connector.poll(embed_present) {
            ConnectorPoll::Connected => Self::subscription_burst(),
            ConnectorPoll::Degraded { attempts } => {
                self.record(TrackingEvent::DegradedTracking {
                    reason: DegradedReason::EmbedNotFound { attempts },
                });
                Vec::new()
            }
            ConnectorPoll::Searching | ConnectorPoll::Settled => Vec::new(),
        }
    }

    fn on_embed_message(&mut self, origin: &str, payload: &str, now: Instant) -> Vec<Effect> {
        let Some(inbound) = embed::parse_inbound(origin, payload, &self.trusted_origin) else {
            return Vec::new();
        };

        let mut effects = Vec::new();
        // The player re-announces readiness after reloads; re-send the
        // event subscriptions each time.
        if inbound == EmbedInbound::Ready {
            effects.extend(Self::subscription_burst());
        }

        for event in self.interpreter.interpret(inbound, now) {
            effects.extend(self.apply_playback_event(event, now));
        }
        effects
    }

    fn apply_playback_event(&mut self, event: PlaybackEvent, now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();
        let kind = event.kind;

        if kind == PlaybackEventKind::Seeked {
            // The seek gap must not count as engaged time.
            self.accumulator.rebaseline(now);
        }

        let transition = self.normalizer.ingest(event);
        self.adopt_observed_duration();

        if transition.started_playing() {
            self.accumulator.set_playing(true, now);
            if self.lifecycle.try_begin_start() {
                if let Some(video_id) = self.lifecycle.video_id() {
                    effects.push(Effect::StartSession {
                        video_id,
                        force_new: false,
                        epoch: self.lifecycle.epoch(),
                    });
                }
            }
        }

        if transition.stopped_playing() {
            self.accumulator.set_playing(false, now);
        }

        self.sync_session();

        // Pause and end both flush any unconfirmed advance; end is also
        // the last chance to report a completion-worthy playhead.
        let stopped = transition.stopped_playing() || kind == PlaybackEventKind::Ended;
        if stopped
            && self.lifecycle.phase().is_active()
            && self.gateway.advanced(self.accumulator.watched_secs())
        {
            effects.extend(self.push_progress(PushReason::PlaybackStopped));
        }

        effects
    }

    fn on_tick(&mut self, now: Instant) -> Vec<Effect> {
        let watched = self.accumulator.tick(now);
        self.sync_session();

        if self.lifecycle.phase().is_active() && self.gateway.threshold_due(watched) {
            return self.push_progress(PushReason::Threshold);
        }
        Vec::new()
    }

    fn on_visibility(&mut self, hidden: bool, now: Instant) -> Vec<Effect> {
        if hidden {
            if !(self.lifecycle.phase().is_active() && self.accumulator.is_playing()) {
                return Vec::new();
            }

            self.accumulator.set_playing(false, now);
            self.sync_session();

            let mut effects = vec![Effect::Player(PlayerCommand::Pause)];
            effects.extend(self.push_progress(PushReason::Hidden));
            self.lifecycle.hide();
            effects
        } else {
            if !self.lifecycle.reprompt() {
                return Vec::new();
            }

            let Some(session) = self.lifecycle.session() else {
                return Vec::new();
            };
            let prompt = ResumePrompt {
                view_id: session.view_id,
                playhead_secs: session.playhead_secs,
                watched_secs: session.watched_secs,
                last_updated_at: Some(chrono::Utc::now()),
                origin: PromptOrigin::TabReturn,
            };
            self.resume.offer(prompt.clone());
            self.record(TrackingEvent::PromptShown { tab_return: true });
            vec![Effect::PromptResume(prompt)]
        }
    }

    fn on_resume_decision(&mut self, choice: ResumeChoice, now: Instant) -> Vec<Effect> {
        let Some(prompt) = self.resume.decide(choice) else {
            return Vec::new();
        };
        self.record(TrackingEvent::PromptDecided {
            resumed: choice == ResumeChoice::Resume,
        });

        match choice {
            ResumeChoice::Resume => {
                if let (Some(view_id), Some(video_id)) = (prompt.view_id, self.lifecycle.video_id())
                {
                    if self.lifecycle.begin_resume() {
                        return vec![Effect::ResumeSession {
                            video_id,
                            view_id,
                            epoch: self.lifecycle.epoch(),
                        }];
                    }
                }
                // No backend session to re-open: resume locally.
                self.resume.finish_resolution();
                self.apply_resume_values(
                    prompt.view_id,
                    prompt.watched_secs,
                    prompt.playhead_secs,
                    now,
                )
            }
            ResumeChoice::StartOver => {
                if !self.lifecycle.begin_start_over() {
                    return Vec::new();
                }
                self.accumulator.reset(0.0, now);
                self.gateway.reset();

                let mut effects = Vec::new();
                if let Some(video_id) = self.lifecycle.video_id() {
                    effects.push(Effect::StartSession {
                        video_id,
                        force_new: true,
                        epoch: self.lifecycle.epoch(),
                    });
                }
                effects.push(Effect::Player(PlayerCommand::SeekTo(0.0)));
                effects.push(Effect::PlayAfterDelay);
                effects
            }
        }
    }

    // =========================================================================
    // Async completions
    // =========================================================================

    fn on_check_finished(
        &mut self,
        epoch: u64,
        result: Result<CheckOutcome, StoreError>,
    ) -> Vec<Effect> {
        if !self.lifecycle.is_current(epoch) {
            return Vec::new();
        }

        match result {
            Ok(CheckOutcome::Resumable(info)) => {
                if !self.lifecycle.check_concluded_resumable() {
                    return Vec::new();
                }
                self.record(TrackingEvent::SessionChecked { resumable: true });

                let prompt = ResumePrompt {
                    view_id: Some(info.view_id),
                    playhead_secs: info.playhead_secs,
                    watched_secs: info.watched_secs,
                    last_updated_at: info.updated_at,
                    origin: PromptOrigin::PageLoad,
                };
                self.resume.offer(prompt.clone());
                self.record(TrackingEvent::PromptShown { tab_return: false });
                vec![Effect::PromptResume(prompt)]
            }
            Ok(CheckOutcome::NoSession) => {
                self.lifecycle.check_concluded_ready();
                self.record(TrackingEvent::SessionChecked { resumable: false });
                self.start_if_already_playing()
            }
            Err(error) => {
                // A failed check never blocks playback: fall through to
                // ready so a fresh session can still be started.
                self.lifecycle.check_concluded_ready();
                self.record(TrackingEvent::TransportFailure {
                    operation: StoreOperation::Check,
                    detail: error.to_string(),
                });
                self.start_if_already_playing()
            }
        }
    }

    /// Covers the race where playback began while the check was still in
    /// flight: the play edge already passed, so readiness itself must
    /// open the session.
    fn start_if_already_playing(&mut self) -> Vec<Effect> {
        if !self.accumulator.is_playing() || !self.lifecycle.try_begin_start() {
            return Vec::new();
        }
        match self.lifecycle.video_id() {
            Some(video_id) => vec![Effect::StartSession {
                video_id,
                force_new: false,
                epoch: self.lifecycle.epoch(),
            }],
            None => Vec::new(),
        }
    }

    fn on_start_finished(
        &mut self,
        epoch: u64,
        force_new: bool,
        result: Result<StartOutcome, StoreError>,
        now: Instant,
    ) -> Vec<Effect> {
        if !self.lifecycle.is_current(epoch) {
            return Vec::new();
        }

        match result {
            Ok(outcome) => {
                if !self.lifecycle.attach_view(outcome.view_id) {
                    return Vec::new();
                }
                self.lifecycle.activate();

                // A reopened session carries prior watch time; seed the
                // accumulator with it so the counter continues, not restarts.
                if !force_new && outcome.watched_secs > 0.0 {
                    self.accumulator.reset(outcome.watched_secs, now);
                    self.gateway.seed(outcome.watched_secs);
                    if let Some(session) = self.lifecycle.session_mut() {
                        session.watched_secs = outcome.watched_secs;
                        session.last_persisted_watched_secs = outcome.watched_secs;
                    }
                }

                self.record(TrackingEvent::SessionStarted {
                    view_id: outcome.view_id,
                    forced: force_new,
                });
                Vec::new()
            }
            Err(error) => {
                self.lifecycle.degrade();
                self.record(TrackingEvent::TransportFailure {
                    operation: StoreOperation::Start,
                    detail: error.to_string(),
                });
                self.record(TrackingEvent::DegradedTracking {
                    reason: DegradedReason::SessionUnavailable,
                });
                Vec::new()
            }
        }
    }

    fn on_resume_finished(
        &mut self,
        epoch: u64,
        result: Result<ResumeOutcome, StoreError>,
        now: Instant,
    ) -> Vec<Effect> {
        if !self.lifecycle.is_current(epoch) {
            self.resume.finish_resolution();
            return Vec::new();
        }

        match result {
            Ok(outcome) => {
                self.resume.finish_resolution();
                self.record(TrackingEvent::SessionResumed {
                    view_id: outcome.view_id,
                });
                self.apply_resume_values(
                    Some(outcome.view_id),
                    outcome.watched_secs,
                    outcome.playhead_secs,
                    now,
                )
            }
            Err(error) => {
                self.record(TrackingEvent::TransportFailure {
                    operation: StoreOperation::Resume,
                    detail: error.to_string(),
                });
                // Fall back to the prompt's stored values: resuming
                // locally beats discarding the viewer's decision.
                match self.resume.finish_resolution() {
                    Some(prompt) => self.apply_resume_values(
                        prompt.view_id,
                        prompt.watched_secs,
                        prompt.playhead_secs,
                        now,
                    ),
                    None => Vec::new(),
                }
            }
        }
    }

    fn on_update_finished(
        &mut self,
        epoch: u64,
        view_id: ViewId,
        result: Result<UpdateOutcome, StoreError>,
    ) -> Vec<Effect> {
        if !self.lifecycle.is_current(epoch) {
            return Vec::new();
        }
        // A start-over swaps the session id while an update may still be
        // in flight; a settle for the abandoned id must neither confirm
        // progress nor complete the fresh session.
        if self.lifecycle.session().and_then(|s| s.view_id) != Some(view_id) {
            return Vec::new();
        }

        match result {
            Ok(outcome) => {
                self.gateway.confirm();
                let confirmed = self.gateway.last_sent_secs();
                if let Some(session) = self.lifecycle.session_mut() {
                    if confirmed > session.last_persisted_watched_secs {
                        session.last_persisted_watched_secs = confirmed;
                    }
                }

                if outcome.is_complete {
                    if let Some(view_id) = self.lifecycle.complete() {
                        self.record(TrackingEvent::SessionCompleted { view_id });
                    }
                }
                Vec::new()
            }
            Err(error) => {
                self.gateway.abort();
                self.record(TrackingEvent::TransportFailure {
                    operation: StoreOperation::Update,
                    detail: error.to_string(),
                });
                Vec::new()
            }
        }
    }

    fn on_teardown(&mut self, now: Instant) -> Vec<Effect> {
        self.accumulator.set_playing(false, now);
        self.sync_session();

        let mut effects = Vec::new();
        if !self.lifecycle.phase().is_terminal()
            && self.gateway.advanced(self.accumulator.watched_secs())
        {
            effects.extend(self.push_progress(PushReason::Teardown));
        }
        self.lifecycle.teardown();
        effects
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn subscription_burst() -> Vec<Effect> {
        EmbedEventName::subscription_set()
            .iter()
            .map(|event| Effect::Player(PlayerCommand::Subscribe(*event)))
            .collect()
    }

    /// Applies a settled (or locally assumed) resume: seed the counter,
    /// seek the player, and play after a short delay.
    fn apply_resume_values(
        &mut self,
        view_id: Option<ViewId>,
        watched_secs: f64,
        playhead_secs: f64,
        now: Instant,
    ) -> Vec<Effect> {
        if let Some(id) = view_id {
            self.lifecycle.attach_view(id);
        }
        self.lifecycle.activate_from_prompt();

        self.accumulator.reset(watched_secs, now);
        self.gateway.seed(watched_secs);
        if let Some(session) = self.lifecycle.session_mut() {
            session.watched_secs = watched_secs;
            session.playhead_secs = playhead_secs;
            session.last_persisted_watched_secs = watched_secs;
        }

        vec![
            Effect::Player(PlayerCommand::SeekTo(playhead_secs)),
            Effect::PlayAfterDelay,
        ]
    }

    fn adopt_observed_duration(&mut self) {
        if let Some(duration) = self.normalizer.state().duration_secs {
            let unknown = self
                .lifecycle
                .session()
                .is_none_or(|session| session.duration_secs.is_none());
            if unknown {
                if let Some(session) = self.lifecycle.session_mut() {
                    session.duration_secs = Some(duration);
                }
            }
            if let Some(known) = self.lifecycle.session().and_then(|s| s.duration_secs) {
                self.accumulator.set_duration(known);
            }
        }
    }

    fn sync_session(&mut self) {
        let watched = self.accumulator.watched_secs();
        let position = self.normalizer.state().position_secs;
        let duration = self.normalizer.state().duration_secs;
        self.lifecycle.sync_progress(watched, position, duration);
    }

    fn push_progress(&mut self, reason: PushReason) -> Vec<Effect> {
        let Some(session) = self.lifecycle.session() else {
            return Vec::new();
        };
        let Some(outcome) = self.gateway.build(session) else {
            // Degraded mode: no session id, persistence skipped.
            return Vec::new();
        };

        if outcome.clamped {
            self.record(TrackingEvent::OvershootClamped {
                watched_secs: session.watched_secs,
                duration_secs: session.duration_secs.unwrap_or(0.0),
            });
        }
        self.record(TrackingEvent::ProgressPushed {
            watch_time_secs: outcome.snapshot.watch_time_secs,
            version: outcome.snapshot.version,
            reason,
        });

        match self.lifecycle.video_id() {
            Some(video_id) => vec![Effect::PushProgress {
                video_id,
                snapshot: outcome.snapshot,
                epoch: self.lifecycle.epoch(),
            }],
            None => Vec::new(),
        }
    }

    fn record(&self, event: TrackingEvent) {
        if let Some(handle) = &self.diagnostics {
            handle.record(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::port::store::ResumableSessionInfo;
    use std::time::Duration;

    fn tracker() -> WatchTracker {
        WatchTracker::new(UserId::new(1), &TrackerConfig::default(), None)
    }

    fn at(base: Instant, ms: u64) -> Instant {
        base + Duration::from_millis(ms)
    }

    fn play_msg() -> Message {
        Message::Playback {
            source: SourceId::Native,
            kind: PlaybackEventKind::Play,
            position_secs: None,
            duration_secs: None,
        }
    }

    fn pause_msg() -> Message {
        Message::Playback {
            source: SourceId::Native,
            kind: PlaybackEventKind::Pause,
            position_secs: None,
            duration_secs: None,
        }
    }

    /// Loads a video and settles the check as "nothing to resume".
    fn load_ready(tracker: &mut WatchTracker, base: Instant) -> u64 {
        let effects = tracker.handle(
            Message::VideoLoaded {
                video_id: VideoId::new(7),
                duration_secs: Some(310.0),
            },
            base,
        );
        let epoch = match effects.as_slice() {
            [Effect::CheckSession { epoch, .. }] => *epoch,
            other => panic!("expected a check effect, got {:?}", other),
        };
        tracker.handle(
            Message::CheckFinished {
                epoch,
                result: Ok(CheckOutcome::NoSession),
            },
            base,
        );
        epoch
    }

    /// Drives the tracker into an active session with the given view id.
    fn activate(tracker: &mut WatchTracker, base: Instant, view: u64) -> u64 {
        let epoch = load_ready(tracker, base);
        let effects = tracker.handle(play_msg(), at(base, 10));
        assert!(matches!(
            effects.as_slice(),
            [Effect::StartSession { force_new: false, .. }]
        ));
        tracker.handle(
            Message::StartFinished {
                epoch,
                force_new: false,
                result: Ok(StartOutcome {
                    view_id: ViewId::new(view),
                    watched_secs: 0.0,
                }),
            },
            at(base, 20),
        );
        assert_eq!(tracker.phase(), SessionPhase::Active);
        epoch
    }

    #[test]
    fn video_load_checks_for_resumable_session() {
        let base = Instant::now();
        let mut tracker = tracker();
        let effects = tracker.handle(
            Message::VideoLoaded {
                video_id: VideoId::new(7),
                duration_secs: None,
            },
            base,
        );
        assert!(matches!(effects.as_slice(), [Effect::CheckSession { .. }]));
        assert_eq!(tracker.phase(), SessionPhase::Checking);
    }

    #[test]
    fn session_opens_lazily_on_first_play() {
        let base = Instant::now();
        let mut tracker = tracker();
        load_ready(&mut tracker, base);
        assert_eq!(tracker.phase(), SessionPhase::Ready);

        let effects = tracker.handle(play_msg(), at(base, 10));
        assert!(matches!(
            effects.as_slice(),
            [Effect::StartSession { force_new: false, .. }]
        ));
        assert_eq!(tracker.phase(), SessionPhase::Starting);

        // A duplicate play signal cannot issue a second start call.
        let effects = tracker.handle(play_msg(), at(base, 20));
        assert!(effects.is_empty());
    }

    #[test]
    fn play_during_check_opens_session_once_ready() {
        let base = Instant::now();
        let mut tracker = tracker();
        let epoch = match tracker
            .handle(
                Message::VideoLoaded {
                    video_id: VideoId::new(7),
                    duration_secs: None,
                },
                base,
            )
            .as_slice()
        {
            [Effect::CheckSession { epoch, .. }] => *epoch,
            _ => unreachable!(),
        };

        // Playback starts while the check is still in flight.
        let effects = tracker.handle(play_msg(), at(base, 5));
        assert!(effects.is_empty());

        // The late check conclusion opens the session itself.
        let effects = tracker.handle(
            Message::CheckFinished {
                epoch,
                result: Ok(CheckOutcome::NoSession),
            },
            at(base, 500),
        );
        assert!(matches!(
            effects.as_slice(),
            [Effect::StartSession { force_new: false, .. }]
        ));
        assert_eq!(tracker.phase(), SessionPhase::Starting);
    }

    #[test]
    fn stale_check_result_is_dropped() {
        let base = Instant::now();
        let mut tracker = tracker();
        let old_epoch = match tracker
            .handle(
                Message::VideoLoaded {
                    video_id: VideoId::new(7),
                    duration_secs: None,
                },
                base,
            )
            .as_slice()
        {
            [Effect::CheckSession { epoch, .. }] => *epoch,
            _ => unreachable!(),
        };

        // The viewer navigated to another video before the check settled.
        tracker.handle(
            Message::VideoLoaded {
                video_id: VideoId::new(8),
                duration_secs: None,
            },
            at(base, 5),
        );

        let effects = tracker.handle(
            Message::CheckFinished {
                epoch: old_epoch,
                result: Ok(CheckOutcome::Resumable(ResumableSessionInfo {
                    view_id: ViewId::new(1),
                    playhead_secs: 10.0,
                    watched_secs: 10.0,
                    updated_at: None,
                })),
            },
            at(base, 10),
        );
        assert!(effects.is_empty());
        assert_eq!(tracker.phase(), SessionPhase::Checking);
    }

    #[test]
    fn watch_time_accumulates_only_while_playing() {
        let base = Instant::now();
        let mut tracker = tracker();
        activate(&mut tracker, base, 1);

        tracker.handle(Message::Tick, at(base, 5_020));
        let watched = tracker.watched_secs();
        assert!(watched > 4.9 && watched < 5.1, "watched = {watched}");

        tracker.handle(pause_msg(), at(base, 6_020));
        tracker.handle(Message::Tick, at(base, 60_000));
        let after_pause = tracker.watched_secs();
        assert!(after_pause > 5.9 && after_pause < 6.1);
    }

    #[test]
    fn threshold_push_fires_and_confirms() {
        let base = Instant::now();
        let mut tracker = tracker();
        let epoch = activate(&mut tracker, base, 1);

        // 9 s of playback: below the 10 s threshold.
        assert!(tracker.handle(Message::Tick, at(base, 9_010)).is_empty());

        // Past the threshold: one push with version 1.
        let effects = tracker.handle(Message::Tick, at(base, 11_010));
        let snapshot = match effects.as_slice() {
            [Effect::PushProgress { snapshot, .. }] => *snapshot,
            other => panic!("expected push, got {:?}", other),
        };
        assert_eq!(snapshot.view_id, ViewId::new(1));
        assert!(snapshot.watch_time_secs >= 10);
        assert_eq!(snapshot.version, 1);

        // While the push is in flight, no duplicate fires.
        assert!(tracker.handle(Message::Tick, at(base, 12_010)).is_empty());

        tracker.handle(
            Message::UpdateFinished {
                epoch,
                view_id: ViewId::new(1),
                result: Ok(UpdateOutcome { is_complete: false }),
            },
            at(base, 12_020),
        );
        assert!(tracker.session().unwrap().last_persisted_watched_secs >= 10.0);
    }

    #[test]
    fn degraded_start_keeps_counting_but_never_pushes() {
        let base = Instant::now();
        let mut tracker = tracker();
        let epoch = load_ready(&mut tracker, base);
        tracker.handle(play_msg(), at(base, 10));
        tracker.handle(
            Message::StartFinished {
                epoch,
                force_new: false,
                result: Err(StoreError::Timeout),
            },
            at(base, 20),
        );

        assert_eq!(tracker.phase(), SessionPhase::Active);
        assert!(tracker.is_degraded());

        let effects = tracker.handle(Message::Tick, at(base, 30_010));
        assert!(effects.is_empty());
        assert!(tracker.watched_secs() > 29.0);
    }

    #[test]
    fn completion_terminates_the_session() {
        let base = Instant::now();
        let mut tracker = tracker();
        let epoch = activate(&mut tracker, base, 1);

        tracker.handle(Message::Tick, at(base, 11_010));
        tracker.handle(
            Message::UpdateFinished {
                epoch,
                view_id: ViewId::new(1),
                result: Ok(UpdateOutcome { is_complete: true }),
            },
            at(base, 11_020),
        );

        assert_eq!(tracker.phase(), SessionPhase::Completed);
        assert_eq!(tracker.session().unwrap().view_id, None);

        // No further pushes for this viewing, even at teardown.
        let effects = tracker.handle(Message::Teardown, at(base, 20_000));
        assert!(effects.is_empty());
    }

    #[test]
    fn stale_update_for_abandoned_session_is_ignored() {
        let base = Instant::now();
        let mut tracker = tracker();
        let epoch = activate(&mut tracker, base, 1);

        // A threshold push for view 1 goes out and stays in flight.
        let effects = tracker.handle(Message::Tick, at(base, 11_010));
        assert!(matches!(effects.as_slice(), [Effect::PushProgress { .. }]));

        // The viewer hides, returns, and starts over before it settles.
        tracker.handle(Message::VisibilityChanged { hidden: true }, at(base, 12_000));
        tracker.handle(Message::VisibilityChanged { hidden: false }, at(base, 13_000));
        tracker.handle(Message::ResumeDecision(ResumeChoice::StartOver), at(base, 13_100));
        assert_eq!(tracker.phase(), SessionPhase::Starting);

        // The old push settles with a completion verdict: dropped, the
        // fresh session is untouched.
        tracker.handle(
            Message::UpdateFinished {
                epoch,
                view_id: ViewId::new(1),
                result: Ok(UpdateOutcome { is_complete: true }),
            },
            at(base, 13_200),
        );
        assert_eq!(tracker.phase(), SessionPhase::Starting);

        tracker.handle(
            Message::StartFinished {
                epoch,
                force_new: true,
                result: Ok(StartOutcome {
                    view_id: ViewId::new(2),
                    watched_secs: 0.0,
                }),
            },
            at(base, 13_300),
        );
        assert_eq!(tracker.phase(), SessionPhase::Active);
        assert_eq!(tracker.session().unwrap().view_id, Some(ViewId::new(2)));
        assert!(!tracker.session().unwrap().is_complete());
    }

    #[test]
    fn hidden_tab_pauses_pushes_and_reprompts() {
        let base = Instant::now();
        let mut tracker = tracker();
        activate(&mut tracker, base, 1);
        tracker.handle(Message::Tick, at(base, 5_020));

        let effects = tracker.handle(Message::VisibilityChanged { hidden: true }, at(base, 5_030));
        assert!(matches!(effects[0], Effect::Player(PlayerCommand::Pause)));
        assert!(matches!(effects[1], Effect::PushProgress { .. }));
        assert_eq!(tracker.phase(), SessionPhase::PausedHidden);

        // Hidden time never accumulates.
        tracker.handle(Message::Tick, at(base, 65_000));
        assert!(tracker.watched_secs() < 5.2);

        let effects = tracker.handle(Message::VisibilityChanged { hidden: false }, at(base, 66_000));
        match effects.as_slice() {
            [Effect::PromptResume(prompt)] => {
                assert_eq!(prompt.origin, PromptOrigin::TabReturn);
                assert!(prompt.watched_secs > 4.9);
            }
            other => panic!("expected prompt, got {:?}", other),
        }
        assert_eq!(tracker.phase(), SessionPhase::Resumable);
    }

    #[test]
    fn visibility_noise_is_ignored() {
        let base = Instant::now();
        let mut tracker = tracker();
        load_ready(&mut tracker, base);

        // Hidden while not playing: nothing happens.
        assert!(tracker
            .handle(Message::VisibilityChanged { hidden: true }, at(base, 10))
            .is_empty());
        // Visible while never hidden: nothing happens.
        assert!(tracker
            .handle(Message::VisibilityChanged { hidden: false }, at(base, 20))
            .is_empty());
    }

    #[test]
    fn resume_round_trip_restores_counter_and_seeks() {
        let base = Instant::now();
        let mut tracker = tracker();
        let epoch = match tracker
            .handle(
                Message::VideoLoaded {
                    video_id: VideoId::new(7),
                    duration_secs: Some(310.0),
                },
                base,
            )
            .as_slice()
        {
            [Effect::CheckSession { epoch, .. }] => *epoch,
            _ => unreachable!(),
        };

        let effects = tracker.handle(
            Message::CheckFinished {
                epoch,
                result: Ok(CheckOutcome::Resumable(ResumableSessionInfo {
                    view_id: ViewId::new(9),
                    playhead_secs: 150.0,
                    watched_secs: 123.0,
                    updated_at: None,
                })),
            },
            at(base, 10),
        );
        assert!(matches!(effects.as_slice(), [Effect::PromptResume(_)]));

        let effects = tracker.handle(Message::ResumeDecision(ResumeChoice::Resume), at(base, 20));
        assert!(matches!(
            effects.as_slice(),
            [Effect::ResumeSession { view_id, .. }] if *view_id == ViewId::new(9)
        ));

        let effects = tracker.handle(
            Message::ResumeFinished {
                epoch,
                result: Ok(ResumeOutcome {
                    view_id: ViewId::new(9),
                    playhead_secs: 150.0,
                    watched_secs: 123.0,
                }),
            },
            at(base, 30),
        );
        assert_eq!(
            effects,
            vec![
                Effect::Player(PlayerCommand::SeekTo(150.0)),
                Effect::PlayAfterDelay,
            ]
        );
        assert_eq!(tracker.watched_secs(), 123.0);
        assert_eq!(tracker.phase(), SessionPhase::Active);
        assert_eq!(tracker.session().unwrap().view_id, Some(ViewId::new(9)));
    }

    #[test]
    fn failed_resume_falls_back_to_prompt_values() {
        let base = Instant::now();
        let mut tracker = tracker();
        let epoch = match tracker
            .handle(
                Message::VideoLoaded {
                    video_id: VideoId::new(7),
                    duration_secs: None,
                },
                base,
            )
            .as_slice()
        {
            [Effect::CheckSession { epoch, .. }] => *epoch,
            _ => unreachable!(),
        };
        tracker.handle(
            Message::CheckFinished {
                epoch,
                result: Ok(CheckOutcome::Resumable(ResumableSessionInfo {
                    view_id: ViewId::new(9),
                    playhead_secs: 88.0,
                    watched_secs: 70.0,
                    updated_at: None,
                })),
            },
            at(base, 10),
        );
        tracker.handle(Message::ResumeDecision(ResumeChoice::Resume), at(base, 20));

        let effects = tracker.handle(
            Message::ResumeFinished {
                epoch,
                result: Err(StoreError::Transport("down".into())),
            },
            at(base, 30),
        );
        assert_eq!(
            effects,
            vec![
                Effect::Player(PlayerCommand::SeekTo(88.0)),
                Effect::PlayAfterDelay,
            ]
        );
        assert_eq!(tracker.watched_secs(), 70.0);
        assert_eq!(tracker.session().unwrap().view_id, Some(ViewId::new(9)));
    }

    #[test]
    fn start_over_resets_and_forces_new_session() {
        let base = Instant::now();
        let mut tracker = tracker();
        let epoch = match tracker
            .handle(
                Message::VideoLoaded {
                    video_id: VideoId::new(7),
                    duration_secs: None,
                },
                base,
            )
            .as_slice()
        {
            [Effect::CheckSession { epoch, .. }] => *epoch,
            _ => unreachable!(),
        };
        tracker.handle(
            Message::CheckFinished {
                epoch,
                result: Ok(CheckOutcome::Resumable(ResumableSessionInfo {
                    view_id: ViewId::new(9),
                    playhead_secs: 150.0,
                    watched_secs: 123.0,
                    updated_at: None,
                })),
            },
            at(base, 10),
        );

        let effects = tracker.handle(Message::ResumeDecision(ResumeChoice::StartOver), at(base, 20));
        assert_eq!(
            effects,
            vec![
                Effect::StartSession {
                    video_id: VideoId::new(7),
                    force_new: true,
                    epoch,
                },
                Effect::Player(PlayerCommand::SeekTo(0.0)),
                Effect::PlayAfterDelay,
            ]
        );
        assert_eq!(tracker.watched_secs(), 0.0);

        tracker.handle(
            Message::StartFinished {
                epoch,
                force_new: true,
                result: Ok(StartOutcome {
                    view_id: ViewId::new(10),
                    watched_secs: 0.0,
                }),
            },
            at(base, 30),
        );
        assert_eq!(tracker.session().unwrap().view_id, Some(ViewId::new(10)));
        assert_eq!(tracker.watched_secs(), 0.0);
    }

    #[test]
    fn teardown_pushes_exactly_once() {
        let base = Instant::now();
        let mut tracker = tracker();
        activate(&mut tracker, base, 1);
        tracker.handle(Message::Tick, at(base, 3_010));

        let effects = tracker.handle(Message::Teardown, at(base, 3_020));
        assert_eq!(
            effects
                .iter()
                .filter(|e| matches!(e, Effect::PushProgress { .. }))
                .count(),
            1
        );

        // A second teardown finds no session and pushes nothing.
        let effects = tracker.handle(Message::Teardown, at(base, 3_030));
        assert!(effects.is_empty());
    }

    #[test]
    fn embed_ready_resubscribes_event_listeners() {
        let base = Instant::now();
        let mut tracker = tracker();
        load_ready(&mut tracker, base);

        let effects = tracker.handle(
            Message::EmbedMessage {
                origin: "https://player.vimeo.com".into(),
                payload: r#"{"event":"ready"}"#.into(),
            },
            at(base, 10),
        );
        let subscriptions = effects
            .iter()
            .filter(|e| matches!(e, Effect::Player(PlayerCommand::Subscribe(_))))
            .count();
        assert_eq!(subscriptions, EmbedEventName::subscription_set().len());
    }

    #[test]
    fn foreign_embed_messages_are_ignored() {
        let base = Instant::now();
        let mut tracker = tracker();
        load_ready(&mut tracker, base);

        let effects = tracker.handle(
            Message::EmbedMessage {
                origin: "https://attacker.example".into(),
                payload: r#"{"event":"play"}"#.into(),
            },
            at(base, 10),
        );
        assert!(effects.is_empty());
        assert!(!tracker.player_state().is_playing);
    }

    #[test]
    fn embed_probe_degrades_after_retry_budget() {
        let base = Instant::now();
        let mut tracker = tracker();
        load_ready(&mut tracker, base);

        for _ in 0..20 {
            tracker.handle(Message::EmbedProbe { embed_present: false }, base);
        }
        // Budget exhausted; further probes are inert.
        let effects = tracker.handle(Message::EmbedProbe { embed_present: true }, base);
        assert!(effects.is_empty());
    }

    #[test]
    fn embed_probe_subscribes_on_discovery() {
        let base = Instant::now();
        let mut tracker = tracker();
        load_ready(&mut tracker, base);

        tracker.handle(Message::EmbedProbe { embed_present: false }, base);
        let effects = tracker.handle(Message::EmbedProbe { embed_present: true }, base);
        assert!(!effects.is_empty());
        assert!(effects
            .iter()
            .all(|e| matches!(e, Effect::Player(PlayerCommand::Subscribe(_)))));
    }

    #[test]
    fn late_duration_caps_watched_time() {
        let base = Instant::now();
        let mut tracker = tracker();
        // No catalog duration.
        let epoch = match tracker
            .handle(
                Message::VideoLoaded {
                    video_id: VideoId::new(7),
                    duration_secs: None,
                },
                base,
            )
            .as_slice()
        {
            [Effect::CheckSession { epoch, .. }] => *epoch,
            _ => unreachable!(),
        };
        tracker.handle(
            Message::CheckFinished {
                epoch,
                result: Ok(CheckOutcome::NoSession),
            },
            base,
        );
        tracker.handle(play_msg(), at(base, 10));
        tracker.handle(
            Message::StartFinished {
                epoch,
                force_new: false,
                result: Ok(StartOutcome {
                    view_id: ViewId::new(1),
                    watched_secs: 0.0,
                }),
            },
            at(base, 20),
        );

        // 30 s of playback, then the embed reports an 8 s duration.
        tracker.handle(Message::Tick, at(base, 30_010));
        tracker.handle(
            Message::Playback {
                source: SourceId::Fallback,
                kind: PlaybackEventKind::TimeUpdate,
                position_secs: Some(7.5),
                duration_secs: Some(8.0),
            },
            at(base, 30_020),
        );
        assert_eq!(tracker.watched_secs(), 8.0);
    }
}
