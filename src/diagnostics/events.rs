// SPDX-License-Identifier: MPL-2.0
//! Diagnostic event types for tracking observability.
//!
//! Tracking degrades silently from the viewer's perspective; these events
//! are the hook that makes the degradation observable. Every noteworthy
//! lifecycle step, transport failure, and invariant clamp is captured here.

use serde::{Deserialize, Serialize};

use crate::application::port::store::StoreOperation;
use crate::domain::newtypes::ViewId;

/// Why a progress snapshot was pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushReason {
    /// Watched time advanced past the save threshold.
    Threshold,
    /// Playback paused or ended with unpersisted progress.
    PlaybackStopped,
    /// The tab went hidden while active.
    Hidden,
    /// The tracking component is being torn down.
    Teardown,
}

/// Why tracking entered degraded mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradedReason {
    /// The embedded player element was never found.
    EmbedNotFound {
        /// Discovery attempts made before giving up.
        attempts: u32,
    },
    /// Session start or resume failed; accumulating without a view id.
    SessionUnavailable,
}

/// Events captured during watch-session tracking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TrackingEvent {
    // ==========================================================================
    // Session Lifecycle
    // ==========================================================================
    /// A resumable-session check finished.
    SessionChecked {
        resumable: bool,
    },

    /// A session was opened on the backend.
    SessionStarted {
        view_id: ViewId,
        forced: bool,
    },

    /// An existing session was re-opened.
    SessionResumed {
        view_id: ViewId,
    },

    /// The backend reported the session complete.
    SessionCompleted {
        view_id: ViewId,
    },

    // ==========================================================================
    // Persistence
    // ==========================================================================
    /// A progress snapshot was handed to the store.
    ProgressPushed {
        watch_time_secs: u64,
        version: u64,
        reason: PushReason,
    },

    /// A session endpoint call failed; tracking continues degraded.
    TransportFailure {
        operation: StoreOperation,
        detail: String,
    },

    // ==========================================================================
    // Degraded Mode
    // ==========================================================================
    /// Tracking entered degraded mode. Never silent: this event is the
    /// required signal.
    DegradedTracking {
        reason: DegradedReason,
    },

    /// Watched time exceeded the known duration and was clamped before
    /// transmission.
    OvershootClamped {
        watched_secs: f64,
        duration_secs: f64,
    },

    // ==========================================================================
    // Resume Prompting
    // ==========================================================================
    /// A resume prompt was presented.
    PromptShown {
        /// True for the tab-return trigger, false for page load.
        tab_return: bool,
    },

    /// The viewer decided the prompt.
    PromptDecided {
        resumed: bool,
    },
}

// The StoreOperation on TransportFailure serializes with the event.
impl Serialize for StoreOperation {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for StoreOperation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        match raw.as_str() {
            "check" => Ok(StoreOperation::Check),
            "start" => Ok(StoreOperation::Start),
            "resume" => Ok(StoreOperation::Resume),
            "update" => Ok(StoreOperation::Update),
            other => Err(serde::de::Error::custom(format!(
                "unknown store operation: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_snake_case_tags() {
        let event = TrackingEvent::DegradedTracking {
            reason: DegradedReason::EmbedNotFound { attempts: 20 },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""event":"degraded_tracking""#));
        assert!(json.contains(r#""attempts":20"#));
    }

    #[test]
    fn transport_failure_round_trips() {
        let event = TrackingEvent::TransportFailure {
            operation: StoreOperation::Update,
            detail: "status 503".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: TrackingEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn push_reason_serializes_snake_case() {
        let json = serde_json::to_string(&PushReason::PlaybackStopped).unwrap();
        assert_eq!(json, r#""playback_stopped""#);
    }

    #[test]
    fn unknown_store_operation_fails_deserialization() {
        let result: Result<StoreOperation, _> = serde_json::from_str(r#""delete""#);
        assert!(result.is_err());
    }
}
