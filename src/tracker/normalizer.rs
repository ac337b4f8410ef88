// SPDX-License-Identifier: MPL-2.0
//! Player event normalizer.
//!
//! Three producers report playback state: structured request/response
//! traffic with the embedded player, untyped broadcast events on the same
//! channel, and the native media element. None of them is reliable alone,
//! and two may disagree within the same instant.
//!
//! The normalizer resolves this by event sourcing: every producer's
//! signal lands as a timestamped [`PlaybackEvent`] in one bounded ordered
//! log, and [`NormalizedPlayerState`] is the fold of that log. Conflicting
//! near-simultaneous signals are therefore resolved by observation
//! timestamp (ingest order breaks exact ties), never by which callback
//! happened to run last.

use crate::domain::playback::{
    NormalizedPlayerState, PlaybackEvent, PlaybackEventKind, SourceId,
};
use crate::infrastructure::embed::EmbedInbound;
use std::collections::VecDeque;
use std::time::Instant;

/// Events retained in the ordered log. Older entries are folded into the
/// base snapshot as they fall off.
const LOG_CAPACITY: usize = 64;

/// Progress percentage above which a `playProgress` report no longer
/// implies active playback (the tail of the video).
const PROGRESS_PLAYING_CEILING: f64 = 0.999;

// =============================================================================
// Normalizer
// =============================================================================

/// Observed state transition produced by one ingested event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub previous: NormalizedPlayerState,
    pub current: NormalizedPlayerState,
}

impl Transition {
    /// Returns true if this event opened the play gate.
    #[must_use]
    pub fn started_playing(&self) -> bool {
        !self.previous.is_playing && self.current.is_playing
    }

    /// Returns true if this event closed the play gate.
    #[must_use]
    pub fn stopped_playing(&self) -> bool {
        self.previous.is_playing && !self.current.is_playing
    }

    /// Returns true if this event completed player initialization.
    #[must_use]
    pub fn became_ready(&self) -> bool {
        !self.previous.is_ready && self.current.is_ready
    }
}

/// Folds producer events into one authoritative player state.
#[derive(Debug)]
pub struct Normalizer {
    /// Snapshot of everything already evicted from the log.
    base: NormalizedPlayerState,
    /// Ordered by `(observed_at, seq)`, bounded by [`LOG_CAPACITY`].
    log: VecDeque<LogEntry>,
    state: NormalizedPlayerState,
    next_seq: u64,
}

#[derive(Debug)]
struct LogEntry {
    seq: u64,
    event: PlaybackEvent,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    /// Creates an empty normalizer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: NormalizedPlayerState::default(),
            log: VecDeque::with_capacity(LOG_CAPACITY),
            state: NormalizedPlayerState::default(),
            next_seq: 0,
        }
    }

    /// Returns the current authoritative snapshot.
    #[must_use]
    pub fn state(&self) -> &NormalizedPlayerState {
        &self.state
    }

    /// Ingests one producer event and re-derives the snapshot.
    ///
    /// Events may arrive out of observation order; insertion keeps the
    /// log sorted so the fold is always timestamp-ordered.
    pub fn ingest(&mut self, event: PlaybackEvent) -> Transition {
        let previous = self.state;

        let seq = self.next_seq;
        self.next_seq += 1;

        let key = (event.observed_at, seq);
        let position = self
            .log
            .partition_point(|entry| (entry.event.observed_at, entry.seq) <= key);
        self.log.insert(position, LogEntry { seq, event });

        while self.log.len() > LOG_CAPACITY {
            if let Some(oldest) = self.log.pop_front() {
                self.base.apply(&oldest.event);
            }
        }

        let mut state = self.base;
        for entry in &self.log {
            state.apply(&entry.event);
        }
        self.state = state;

        Transition {
            previous,
            current: self.state,
        }
    }

    /// Drops all recorded history, e.g. when the video identity changes.
    pub fn reset(&mut self) {
        self.base = NormalizedPlayerState::default();
        self.log.clear();
        self.state = NormalizedPlayerState::default();
    }
}

// =============================================================================
// Signal interpretation
// =============================================================================

/// Turns decoded embed messages into playback events.
///
/// The fallback broadcast producer infers "is playing" both from explicit
/// play/pause/finish events and heuristically from `playProgress`
/// percentages; a per-producer last-known-state comparison makes repeated
/// identical signals no-ops.
#[derive(Debug, Default)]
pub struct SignalInterpreter {
    fallback_playing: Option<bool>,
    structured_playing: Option<bool>,
}

impl SignalInterpreter {
    /// Creates an interpreter with no remembered state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets remembered play state, e.g. when the video changes.
    pub fn reset(&mut self) {
        self.fallback_playing = None;
        self.structured_playing = None;
    }

    /// Interprets one inbound embed message.
    pub fn interpret(&mut self, inbound: EmbedInbound, observed_at: Instant) -> Vec<PlaybackEvent> {
        match inbound {
            EmbedInbound::Ready => vec![PlaybackEvent::bare(
                PlaybackEventKind::Ready,
                SourceId::Fallback,
                observed_at,
            )],

            EmbedInbound::Play => self
                .fallback_play_state(true, observed_at)
                .into_iter()
                .collect(),

            EmbedInbound::Pause => self
                .fallback_play_state(false, observed_at)
                .into_iter()
                .collect(),

            EmbedInbound::Finish => {
                // Finish always lands as Ended; the dedup only guards the
                // play flag it implies.
                self.fallback_playing = Some(false);
                vec![PlaybackEvent {
                    kind: PlaybackEventKind::Ended,
                    source: SourceId::Fallback,
                    position_secs: None,
                    duration_secs: None,
                    observed_at,
                }]
            }

            EmbedInbound::PlayProgress {
                seconds,
                duration,
                percent,
            } => {
                let mut events = vec![PlaybackEvent {
                    kind: PlaybackEventKind::TimeUpdate,
                    source: SourceId::Fallback,
                    position_secs: Some(seconds),
                    duration_secs: (duration > 0.0).then_some(duration),
                    observed_at,
                }];
                // Backup play detection: mid-video progress implies playback.
                if percent > 0.0 && percent < PROGRESS_PLAYING_CEILING {
                    if let Some(play) = self.fallback_play_state(true, observed_at) {
                        events.push(play);
                    }
                }
                events
            }

            EmbedInbound::TimeResponse { seconds } => vec![PlaybackEvent {
                kind: PlaybackEventKind::TimeUpdate,
                source: SourceId::Structured,
                position_secs: Some(seconds),
                duration_secs: None,
                observed_at,
            }],

            EmbedInbound::DurationResponse { seconds } => vec![PlaybackEvent {
                kind: PlaybackEventKind::TimeUpdate,
                source: SourceId::Structured,
                position_secs: None,
                duration_secs: (seconds > 0.0).then_some(seconds),
                observed_at,
            }],

            EmbedInbound::PausedResponse { paused } => {
                let playing = !paused;
                if self.structured_playing == Some(playing) {
                    return Vec::new();
                }
                self.structured_playing = Some(playing);
                let kind = if playing {
                    PlaybackEventKind::Play
                } else {
                    PlaybackEventKind::Pause
                };
                vec![PlaybackEvent::bare(kind, SourceId::Structured, observed_at)]
            }
        }
    }

    fn fallback_play_state(
        &mut self,
        playing: bool,
        observed_at: Instant,
    ) -> Option<PlaybackEvent> {
        if self.fallback_playing == Some(playing) {
            return None;
        }
        self.fallback_playing = Some(playing);
        let kind = if playing {
            PlaybackEventKind::Play
        } else {
            PlaybackEventKind::Pause
        };
        Some(PlaybackEvent::bare(kind, SourceId::Fallback, observed_at))
    }
}

// =============================================================================
// Embed discovery
// =============================================================================

/// Outcome of one embed discovery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorPoll {
    /// The embed was found on this attempt; subscriptions should be sent.
    Connected,
    /// Not found yet; keep retrying.
    Searching,
    /// The retry budget ran out. Reported exactly once; playback for this
    /// video will be untracked.
    Degraded { attempts: u32 },
    /// Discovery already concluded; nothing to do.
    Settled,
}

/// Bounded retry loop looking for the embedded player element.
#[derive(Debug)]
pub struct EmbedConnector {
    attempts: u32,
    limit: u32,
    connected: bool,
    degraded_reported: bool,
}

impl EmbedConnector {
    /// Creates a connector with the given attempt budget.
    #[must_use]
    pub fn new(limit: u32) -> Self {
        Self {
            attempts: 0,
            limit,
            connected: false,
            degraded_reported: false,
        }
    }

    /// Returns true once the embed has been found.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Records one discovery attempt.
    pub fn poll(&mut self, embed_present: bool) -> ConnectorPoll {
        if self.connected || self.degraded_reported {
            return ConnectorPoll::Settled;
        }
        if embed_present {
            self.connected = true;
            return ConnectorPoll::Connected;
        }
        self.attempts += 1;
        if self.attempts >= self.limit {
            self.degraded_reported = true;
            ConnectorPoll::Degraded {
                attempts: self.attempts,
            }
        } else {
            ConnectorPoll::Searching
        }
    }

    /// Starts a fresh discovery round for a new video.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.connected = false;
        self.degraded_reported = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(base: Instant, ms: u64) -> Instant {
        base + Duration::from_millis(ms)
    }

    fn play(source: SourceId, observed_at: Instant) -> PlaybackEvent {
        PlaybackEvent::bare(PlaybackEventKind::Play, source, observed_at)
    }

    fn pause(source: SourceId, observed_at: Instant) -> PlaybackEvent {
        PlaybackEvent::bare(PlaybackEventKind::Pause, source, observed_at)
    }

    // -------------------------------------------------------------------------
    // Normalizer tests
    // -------------------------------------------------------------------------

    #[test]
    fn fold_applies_events_in_timestamp_order() {
        let base = Instant::now();
        let mut normalizer = Normalizer::new();

        // Pause observed later than play, but ingested first.
        normalizer.ingest(pause(SourceId::Fallback, at(base, 200)));
        let transition = normalizer.ingest(play(SourceId::Native, at(base, 100)));

        // Timestamp order: play(100) then pause(200) -> not playing.
        assert!(!transition.current.is_playing);
    }

    #[test]
    fn conflicting_simultaneous_signals_resolved_by_ingest_order() {
        let base = Instant::now();
        let mut normalizer = Normalizer::new();
        let t = at(base, 100);

        normalizer.ingest(play(SourceId::Native, t));
        let transition = normalizer.ingest(pause(SourceId::Fallback, t));

        // Equal timestamps: the later-ingested event wins deterministically.
        assert!(!transition.current.is_playing);
    }

    #[test]
    fn transition_edges_are_detected() {
        let base = Instant::now();
        let mut normalizer = Normalizer::new();

        let started = normalizer.ingest(play(SourceId::Native, at(base, 0)));
        assert!(started.started_playing());
        assert!(!started.stopped_playing());

        let repeated = normalizer.ingest(play(SourceId::Fallback, at(base, 50)));
        assert!(!repeated.started_playing());

        let stopped = normalizer.ingest(pause(SourceId::Native, at(base, 100)));
        assert!(stopped.stopped_playing());
    }

    #[test]
    fn log_eviction_preserves_folded_state() {
        let base = Instant::now();
        let mut normalizer = Normalizer::new();

        normalizer.ingest(play(SourceId::Native, at(base, 0)));
        for i in 0..(LOG_CAPACITY as u64 * 2) {
            let mut event = PlaybackEvent::bare(
                PlaybackEventKind::TimeUpdate,
                SourceId::Fallback,
                at(base, 10 + i),
            );
            event.position_secs = Some(i as f64);
            normalizer.ingest(event);
        }

        // The play event was evicted long ago but survives in the base.
        assert!(normalizer.state().is_playing);
        assert!(normalizer.state().position_secs > 0.0);
    }

    #[test]
    fn reset_drops_history() {
        let base = Instant::now();
        let mut normalizer = Normalizer::new();
        normalizer.ingest(play(SourceId::Native, at(base, 0)));
        normalizer.reset();
        assert_eq!(*normalizer.state(), NormalizedPlayerState::default());
    }

    // -------------------------------------------------------------------------
    // SignalInterpreter tests
    // -------------------------------------------------------------------------

    #[test]
    fn repeated_play_broadcast_is_deduplicated() {
        let now = Instant::now();
        let mut interpreter = SignalInterpreter::new();

        let first = interpreter.interpret(EmbedInbound::Play, now);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].kind, PlaybackEventKind::Play);

        let second = interpreter.interpret(EmbedInbound::Play, now);
        assert!(second.is_empty());
    }

    #[test]
    fn progress_heuristic_detects_playback() {
        let now = Instant::now();
        let mut interpreter = SignalInterpreter::new();

        let events = interpreter.interpret(
            EmbedInbound::PlayProgress {
                seconds: 12.0,
                duration: 200.0,
                percent: 0.06,
            },
            now,
        );

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, PlaybackEventKind::TimeUpdate);
        assert_eq!(events[0].position_secs, Some(12.0));
        assert_eq!(events[0].duration_secs, Some(200.0));
        assert_eq!(events[1].kind, PlaybackEventKind::Play);
    }

    #[test]
    fn progress_at_the_tail_does_not_imply_playback() {
        let now = Instant::now();
        let mut interpreter = SignalInterpreter::new();

        let events = interpreter.interpret(
            EmbedInbound::PlayProgress {
                seconds: 199.9,
                duration: 200.0,
                percent: 0.9995,
            },
            now,
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, PlaybackEventKind::TimeUpdate);
    }

    #[test]
    fn progress_heuristic_respects_dedup() {
        let now = Instant::now();
        let mut interpreter = SignalInterpreter::new();
        interpreter.interpret(EmbedInbound::Play, now);

        let events = interpreter.interpret(
            EmbedInbound::PlayProgress {
                seconds: 5.0,
                duration: 100.0,
                percent: 0.05,
            },
            now,
        );
        // Already known playing: only the time update remains.
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn finish_maps_to_ended() {
        let now = Instant::now();
        let mut interpreter = SignalInterpreter::new();
        interpreter.interpret(EmbedInbound::Play, now);

        let events = interpreter.interpret(EmbedInbound::Finish, now);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, PlaybackEventKind::Ended);

        // A later pause is deduplicated: finish already recorded stopped.
        assert!(interpreter.interpret(EmbedInbound::Pause, now).is_empty());
    }

    #[test]
    fn paused_response_toggles_structured_state() {
        let now = Instant::now();
        let mut interpreter = SignalInterpreter::new();

        let playing = interpreter.interpret(EmbedInbound::PausedResponse { paused: false }, now);
        assert_eq!(playing[0].kind, PlaybackEventKind::Play);
        assert_eq!(playing[0].source, SourceId::Structured);

        // Same answer on the next poll: silence.
        assert!(interpreter
            .interpret(EmbedInbound::PausedResponse { paused: false }, now)
            .is_empty());

        let paused = interpreter.interpret(EmbedInbound::PausedResponse { paused: true }, now);
        assert_eq!(paused[0].kind, PlaybackEventKind::Pause);
    }

    #[test]
    fn duration_response_ignores_zero() {
        let now = Instant::now();
        let mut interpreter = SignalInterpreter::new();
        let events = interpreter.interpret(EmbedInbound::DurationResponse { seconds: 0.0 }, now);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].duration_secs, None);
    }

    // -------------------------------------------------------------------------
    // EmbedConnector tests
    // -------------------------------------------------------------------------

    #[test]
    fn connector_connects_when_embed_appears() {
        let mut connector = EmbedConnector::new(20);
        assert_eq!(connector.poll(false), ConnectorPoll::Searching);
        assert_eq!(connector.poll(true), ConnectorPoll::Connected);
        assert!(connector.is_connected());
        assert_eq!(connector.poll(true), ConnectorPoll::Settled);
    }

    #[test]
    fn connector_degrades_after_budget_runs_out() {
        let mut connector = EmbedConnector::new(20);
        for _ in 0..19 {
            assert_eq!(connector.poll(false), ConnectorPoll::Searching);
        }
        assert_eq!(connector.poll(false), ConnectorPoll::Degraded { attempts: 20 });
        // Reported exactly once.
        assert_eq!(connector.poll(false), ConnectorPoll::Settled);
        assert!(!connector.is_connected());
    }

    #[test]
    fn connector_reset_restores_budget() {
        let mut connector = EmbedConnector::new(1);
        assert!(matches!(connector.poll(false), ConnectorPoll::Degraded { .. }));
        connector.reset();
        assert_eq!(connector.poll(true), ConnectorPoll::Connected);
    }
}
