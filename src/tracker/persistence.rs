// SPDX-License-Identifier: MPL-2.0
//! Progress persistence gateway.
//!
//! Decides when a progress snapshot ships to the backend and what it
//! contains. Threshold pushes fire once watched time has advanced at
//! least the configured number of seconds past the last successfully
//! sent value; lifecycle pushes (pause, hidden, ended, teardown) bypass
//! the threshold. All transmitted values are capped to the video duration
//! so transient overshoot never reaches the backend.
//!
//! Every snapshot carries a per-session version that increases
//! monotonically, letting the backend discard out-of-order updates.

use crate::domain::session::{ProgressSnapshot, WatchSession};

/// Result of assembling a snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotOutcome {
    pub snapshot: ProgressSnapshot,
    /// True if raw values exceeded the known duration and were clamped.
    pub clamped: bool,
}

/// Gatekeeper between the session state and the backend store.
#[derive(Debug, Clone)]
pub struct ProgressGateway {
    threshold_secs: f64,
    /// Watched seconds last confirmed received by the backend.
    last_sent_secs: f64,
    /// Watched seconds carried by the snapshot currently in flight.
    in_flight_secs: Option<f64>,
    version: u64,
}

impl ProgressGateway {
    /// Creates a gateway with the given threshold.
    #[must_use]
    pub fn new(threshold_secs: f64) -> Self {
        Self {
            threshold_secs,
            last_sent_secs: 0.0,
            in_flight_secs: None,
            version: 0,
        }
    }

    /// Watched seconds confirmed by the backend so far.
    #[must_use]
    pub fn last_sent_secs(&self) -> f64 {
        self.last_sent_secs
    }

    /// Returns true if a threshold push is due.
    ///
    /// Suppressed while a snapshot is in flight: a slow backend must not
    /// cause a burst of identical updates.
    #[must_use]
    pub fn threshold_due(&self, watched_secs: f64) -> bool {
        self.in_flight_secs.is_none()
            && watched_secs - self.last_sent_secs >= self.threshold_secs
    }

    /// Returns true if any unconfirmed advance exists, however small.
    /// Lifecycle pushes (pause, hidden, teardown) use this.
    #[must_use]
    pub fn advanced(&self, watched_secs: f64) -> bool {
        watched_secs > self.last_sent_secs
    }

    /// Assembles the next snapshot from the session, capping values to
    /// the duration and bumping the version.
    ///
    /// Returns `None` while the session has no backend id: persistence is
    /// skipped entirely in degraded mode.
    pub fn build(&mut self, session: &WatchSession) -> Option<SnapshotOutcome> {
        let view_id = session.view_id?;

        let (watch_time, playhead, clamped) = match session.duration_secs {
            Some(duration) if duration > 0.0 => {
                let clamped =
                    session.watched_secs > duration || session.playhead_secs > duration;
                (
                    session.watched_secs.min(duration),
                    session.playhead_secs.min(duration),
                    clamped,
                )
            }
            _ => (session.watched_secs, session.playhead_secs, false),
        };

        self.version += 1;
        self.in_flight_secs = Some(watch_time);

        Some(SnapshotOutcome {
            snapshot: ProgressSnapshot {
                view_id,
                watch_time_secs: watch_time.round().max(0.0) as u64,
                playhead_secs: playhead.max(0.0),
                is_complete: session.completion_hint(),
                version: self.version,
            },
            clamped,
        })
    }

    /// Marks the in-flight snapshot as received by the backend.
    pub fn confirm(&mut self) {
        if let Some(sent) = self.in_flight_secs.take() {
            if sent > self.last_sent_secs {
                self.last_sent_secs = sent;
            }
        }
    }

    /// Abandons the in-flight snapshot after a failed push; the advance
    /// will be retried on the next natural trigger.
    pub fn abort(&mut self) {
        self.in_flight_secs = None;
    }

    /// Seeds the confirmed marker, e.g. when resuming a session whose
    /// watch time the backend already holds.
    pub fn seed(&mut self, watched_secs: f64) {
        self.last_sent_secs = watched_secs;
        self.in_flight_secs = None;
    }

    /// Starts over for a new session. The version restarts too: versions
    /// are scoped per session id.
    pub fn reset(&mut self) {
        self.last_sent_secs = 0.0;
        self.in_flight_secs = None;
        self.version = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::newtypes::{UserId, VideoId, ViewId};

    fn session_with(view_id: Option<ViewId>, watched: f64, playhead: f64, duration: Option<f64>) -> WatchSession {
        let mut session = WatchSession::new(UserId::new(1), VideoId::new(2), duration);
        session.view_id = view_id;
        session.watched_secs = watched;
        session.playhead_secs = playhead;
        session
    }

    #[test]
    fn threshold_fires_after_configured_advance() {
        let gateway = ProgressGateway::new(10.0);
        assert!(!gateway.threshold_due(9.9));
        assert!(gateway.threshold_due(10.0));
    }

    #[test]
    fn threshold_measures_from_last_confirmed_value() {
        let mut gateway = ProgressGateway::new(10.0);
        let session = session_with(Some(ViewId::new(1)), 12.0, 12.0, None);

        gateway.build(&session).unwrap();
        gateway.confirm();
        assert!(!gateway.threshold_due(21.0));
        assert!(gateway.threshold_due(22.0));
    }

    #[test]
    fn in_flight_snapshot_suppresses_threshold() {
        let mut gateway = ProgressGateway::new(10.0);
        let session = session_with(Some(ViewId::new(1)), 15.0, 15.0, None);

        gateway.build(&session).unwrap();
        assert!(!gateway.threshold_due(30.0));

        gateway.abort();
        assert!(gateway.threshold_due(30.0));
    }

    #[test]
    fn degraded_session_builds_nothing() {
        let mut gateway = ProgressGateway::new(10.0);
        let session = session_with(None, 50.0, 50.0, Some(100.0));
        assert!(gateway.build(&session).is_none());
    }

    #[test]
    fn values_are_capped_to_duration() {
        let mut gateway = ProgressGateway::new(10.0);
        let session = session_with(Some(ViewId::new(1)), 210.0, 205.0, Some(200.0));

        let outcome = gateway.build(&session).unwrap();
        assert!(outcome.clamped);
        assert_eq!(outcome.snapshot.watch_time_secs, 200);
        assert_eq!(outcome.snapshot.playhead_secs, 200.0);
    }

    #[test]
    fn unknown_duration_sends_values_uncapped() {
        let mut gateway = ProgressGateway::new(10.0);
        let session = session_with(Some(ViewId::new(1)), 37.4, 40.0, None);

        let outcome = gateway.build(&session).unwrap();
        assert!(!outcome.clamped);
        assert_eq!(outcome.snapshot.watch_time_secs, 37);
        assert_eq!(outcome.snapshot.playhead_secs, 40.0);
    }

    #[test]
    fn versions_increase_monotonically() {
        let mut gateway = ProgressGateway::new(10.0);
        let session = session_with(Some(ViewId::new(1)), 10.0, 10.0, None);

        let first = gateway.build(&session).unwrap().snapshot.version;
        gateway.confirm();
        let second = gateway.build(&session).unwrap().snapshot.version;
        gateway.confirm();
        assert!(second > first);
    }

    #[test]
    fn completion_hint_rides_along() {
        let mut gateway = ProgressGateway::new(10.0);
        // 310 s video at 280 s playhead: past the 90 % threshold.
        let session = session_with(Some(ViewId::new(1)), 100.0, 280.0, Some(310.0));
        let outcome = gateway.build(&session).unwrap();
        assert!(outcome.snapshot.is_complete);
    }

    #[test]
    fn seed_and_reset_adjust_markers() {
        let mut gateway = ProgressGateway::new(10.0);
        gateway.seed(123.0);
        assert!(!gateway.advanced(123.0));
        assert!(gateway.advanced(123.5));
        assert!(!gateway.threshold_due(130.0));
        assert!(gateway.threshold_due(133.0));

        gateway.reset();
        assert!(gateway.advanced(0.1));
    }
}
