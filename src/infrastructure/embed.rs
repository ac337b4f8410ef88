// SPDX-License-Identifier: MPL-2.0
//! Wire codec for the embedded player's cross-document message protocol.
//!
//! Outbound commands are JSON `{method, value}` objects; inbound traffic
//! is either a broadcast event `{event, data}` or a method response
//! `{method, value}`. Inbound messages are filtered by trusted origin
//! before parsing; anything malformed or foreign is silently discarded
//! (it is ordinary cross-document noise, not an error).

use crate::application::port::channel::PlayerCommand;
use serde::{Deserialize, Serialize};

// =============================================================================
// Outbound
// =============================================================================

#[derive(Debug, Serialize)]
struct OutboundFrame<'a> {
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<serde_json::Value>,
}

/// Encodes one player command as a wire frame.
///
/// The encoding is infallible for every command shape; serialization of a
/// flat `{method, value}` object cannot fail.
#[must_use]
pub fn encode_command(command: PlayerCommand) -> String {
    let frame = match command {
        PlayerCommand::Play => OutboundFrame {
            method: "play",
            value: None,
        },
        PlayerCommand::Pause => OutboundFrame {
            method: "pause",
            value: None,
        },
        PlayerCommand::SeekTo(secs) => OutboundFrame {
            method: "setCurrentTime",
            value: Some(serde_json::json!(secs)),
        },
        PlayerCommand::Subscribe(event) => OutboundFrame {
            method: "addEventListener",
            value: Some(serde_json::json!(event.as_str())),
        },
        PlayerCommand::QueryPosition => OutboundFrame {
            method: "getCurrentTime",
            value: None,
        },
        PlayerCommand::QueryDuration => OutboundFrame {
            method: "getDuration",
            value: None,
        },
        PlayerCommand::QueryPaused => OutboundFrame {
            method: "getPaused",
            value: None,
        },
    };
    serde_json::to_string(&frame).unwrap_or_default()
}

// =============================================================================
// Inbound
// =============================================================================

/// A decoded inbound message from the embedded player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EmbedInbound {
    /// The player finished initializing.
    Ready,
    /// Broadcast: playback started.
    Play,
    /// Broadcast: playback paused.
    Pause,
    /// Broadcast: playback reached the end.
    Finish,
    /// Broadcast: periodic progress report.
    PlayProgress {
        seconds: f64,
        duration: f64,
        percent: f64,
    },
    /// Response to a `getCurrentTime` query.
    TimeResponse { seconds: f64 },
    /// Response to a `getDuration` query.
    DurationResponse { seconds: f64 },
    /// Response to a `getPaused` query.
    PausedResponse { paused: bool },
}

#[derive(Debug, Deserialize)]
struct InboundFrame {
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    data: Option<ProgressData>,
    #[serde(default)]
    value: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ProgressData {
    #[serde(default)]
    seconds: f64,
    #[serde(default)]
    duration: f64,
    #[serde(default)]
    percent: f64,
}

/// Returns true if a message origin is the embedded player's.
#[must_use]
pub fn is_trusted_origin(origin: &str, trusted: &str) -> bool {
    origin.contains(trusted)
}

/// Parses one inbound cross-document message.
///
/// Returns `None` for foreign origins, non-JSON payloads, and frames that
/// are not part of the protocol. Discarding is silent: the window
/// channel carries plenty of unrelated traffic.
#[must_use]
pub fn parse_inbound(origin: &str, payload: &str, trusted: &str) -> Option<EmbedInbound> {
    if !is_trusted_origin(origin, trusted) {
        return None;
    }
    let frame: InboundFrame = serde_json::from_str(payload).ok()?;

    if let Some(event) = frame.event.as_deref() {
        return match event {
            "ready" => Some(EmbedInbound::Ready),
            "play" => Some(EmbedInbound::Play),
            "pause" => Some(EmbedInbound::Pause),
            "finish" => Some(EmbedInbound::Finish),
            "playProgress" => frame.data.map(|data| EmbedInbound::PlayProgress {
                seconds: data.seconds,
                duration: data.duration,
                percent: data.percent,
            }),
            _ => None,
        };
    }

    match frame.method.as_deref() {
        Some("getCurrentTime") => Some(EmbedInbound::TimeResponse {
            seconds: frame.value.as_ref().and_then(serde_json::Value::as_f64)?,
        }),
        Some("getDuration") => Some(EmbedInbound::DurationResponse {
            seconds: frame.value.as_ref().and_then(serde_json::Value::as_f64)?,
        }),
        Some("getPaused") => Some(EmbedInbound::PausedResponse {
            paused: frame.value.as_ref().and_then(serde_json::Value::as_bool)?,
        }),
        _ => None,
    }
}
