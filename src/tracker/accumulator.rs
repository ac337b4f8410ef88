// SPDX-License-Identifier: MPL-2.0
//! Watch-time accumulator.
//!
//! Integrates wall-clock time into a monotonic "seconds actually watched"
//! counter, gated strictly by normalized play state. Deliberately
//! decoupled from the playhead: rewatching a segment after seeking
//! backward still accumulates watch time.
//!
//! All methods take `now` explicitly so the caller's clock is the single
//! time source and tests stay deterministic.

use std::time::Instant;

/// Monotonic watched-seconds counter.
///
/// While playing, each tick folds the wall-clock delta since the previous
/// tick into the counter, then caps at the video duration if known. Once
/// the cap is reached, ticking suspends until an explicit reset.
#[derive(Debug, Clone)]
pub struct WatchTimeAccumulator {
    watched_secs: f64,
    duration_secs: Option<f64>,
    playing: bool,
    /// Baseline for the next delta. `None` while not playing.
    last_tick: Option<Instant>,
    capped: bool,
}

impl Default for WatchTimeAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchTimeAccumulator {
    /// Creates an accumulator at zero with no known duration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            watched_secs: 0.0,
            duration_secs: None,
            playing: false,
            last_tick: None,
            capped: false,
        }
    }

    /// Returns the watched seconds counted so far.
    #[must_use]
    pub fn watched_secs(&self) -> f64 {
        self.watched_secs
    }

    /// Returns true while the play gate is open.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Returns true once the counter reached the duration cap.
    #[must_use]
    pub fn is_capped(&self) -> bool {
        self.capped
    }

    /// Adopts a duration. Reports of zero or less are ignored.
    pub fn set_duration(&mut self, duration_secs: f64) {
        if duration_secs > 0.0 {
            self.duration_secs = Some(duration_secs);
            self.enforce_cap();
        }
    }

    /// Opens or closes the play gate.
    ///
    /// Opening records a fresh baseline; closing folds the outstanding
    /// delta first so no engaged time is lost. Repeating the current
    /// state is a no-op.
    pub fn set_playing(&mut self, playing: bool, now: Instant) {
        if playing == self.playing {
            return;
        }
        if playing {
            self.last_tick = Some(now);
        } else {
            self.fold(now);
            self.last_tick = None;
        }
        self.playing = playing;
    }

    /// Sampling tick: folds the delta since the last tick while playing.
    ///
    /// Returns the current watched seconds. Suspended once capped.
    pub fn tick(&mut self, now: Instant) -> f64 {
        if self.playing && !self.capped {
            self.fold(now);
        }
        self.watched_secs
    }

    /// Resets the baseline without folding, e.g. after a seek, so the
    /// seek gap never inflates watched time.
    pub fn rebaseline(&mut self, now: Instant) {
        if self.playing {
            self.last_tick = Some(now);
        }
    }

    /// Resets the counter to an explicit initial value with a fresh
    /// baseline of `now` (never re-derived from a stale baseline).
    ///
    /// Used for a new video (0), a restart (0), or a resume seeded with
    /// the server-confirmed watch time.
    pub fn reset(&mut self, initial_secs: f64, now: Instant) {
        self.watched_secs = initial_secs.max(0.0);
        self.capped = false;
        self.enforce_cap();
        if self.playing {
            self.last_tick = Some(now);
        } else {
            self.last_tick = None;
        }
    }

    fn fold(&mut self, now: Instant) {
        if let Some(last) = self.last_tick {
            self.watched_secs += now.saturating_duration_since(last).as_secs_f64();
        }
        self.last_tick = Some(now);
        self.enforce_cap();
    }

    fn enforce_cap(&mut self) {
        if let Some(duration) = self.duration_secs {
            if self.watched_secs >= duration {
                self.watched_secs = duration;
                self.capped = true;
            }
        }
    }
}
