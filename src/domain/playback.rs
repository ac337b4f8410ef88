// SPDX-License-Identifier: MPL-2.0
//! Playback signal types.
//!
//! Playback state is observed through several unreliable producers (an
//! embedded player reachable only by cross-document messages, plus the
//! native media element). Each producer emits [`PlaybackEvent`]s; folding
//! them in timestamp order yields one [`NormalizedPlayerState`].

use std::time::Instant;

/// Which producer observed a playback signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceId {
    /// Typed request/response traffic with the embedded player.
    Structured,
    /// Untyped broadcast events from the embedded player.
    Fallback,
    /// The native media element's own callbacks.
    Native,
}

/// The kind of playback signal observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEventKind {
    /// The player finished initializing and accepts commands.
    Ready,
    /// Playback started or resumed.
    Play,
    /// Playback paused.
    Pause,
    /// The playhead jumped to a new position.
    Seeked,
    /// Periodic position/duration report.
    TimeUpdate,
    /// Playback reached the end of the video.
    Ended,
}

/// A single observed playback signal.
///
/// Ephemeral: produced by a signal source, consumed immediately by the
/// normalizer's event log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackEvent {
    pub kind: PlaybackEventKind,
    pub source: SourceId,
    /// Playhead position in seconds, when the signal carries one.
    pub position_secs: Option<f64>,
    /// Video duration in seconds, when the signal carries one.
    pub duration_secs: Option<f64>,
    /// Monotonic observation timestamp, used to order the event log.
    pub observed_at: Instant,
}

impl PlaybackEvent {
    /// Creates an event carrying no position or duration.
    #[must_use]
    pub fn bare(kind: PlaybackEventKind, source: SourceId, observed_at: Instant) -> Self {
        Self {
            kind,
            source,
            position_secs: None,
            duration_secs: None,
            observed_at,
        }
    }
}

/// Single authoritative snapshot of player state.
///
/// Mutated only by the normalizer; read by the accumulator and the
/// lifecycle manager. Invariant: `position_secs` never exceeds the
/// duration once the duration is known.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NormalizedPlayerState {
    pub is_playing: bool,
    pub position_secs: f64,
    pub duration_secs: Option<f64>,
    pub is_ready: bool,
}

impl NormalizedPlayerState {
    /// Applies one event to the snapshot (a single fold step).
    ///
    /// Duration reports only ever widen knowledge: a zero or negative
    /// duration is ignored. Positions are clamped to the known duration.
    pub fn apply(&mut self, event: &PlaybackEvent) {
        if let Some(duration) = event.duration_secs {
            if duration > 0.0 {
                self.duration_secs = Some(duration);
            }
        }

        if let Some(position) = event.position_secs {
            self.position_secs = match self.duration_secs {
                Some(duration) => position.clamp(0.0, duration),
                None => position.max(0.0),
            };
        }

        match event.kind {
            PlaybackEventKind::Ready => self.is_ready = true,
            PlaybackEventKind::Play => self.is_playing = true,
            PlaybackEventKind::Pause | PlaybackEventKind::Ended => self.is_playing = false,
            PlaybackEventKind::Seeked | PlaybackEventKind::TimeUpdate => {}
        }
    }

    /// Returns the fraction of the video covered by the playhead, if the
    /// duration is known and positive.
    #[must_use]
    pub fn progress_ratio(&self) -> Option<f64> {
        match self.duration_secs {
            Some(duration) if duration > 0.0 => Some(self.position_secs / duration),
            _ => None,
        }
    }
}
