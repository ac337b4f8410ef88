// SPDX-License-Identifier: MPL-2.0
//! Player channel port definition.
//!
//! This module defines the [`PlayerChannel`] trait for the cross-document
//! message channel to the embedded player. The engine emits semantic
//! [`PlayerCommand`]s; the adapter encodes them into the wire protocol.
//!
//! # Design Notes
//!
//! - `post` is fire-and-forget: the embedded player never acknowledges
//!   commands, so delivery failures only mean the embed is gone
//! - `embed_present` backs the bounded discovery retry loop; it must be
//!   cheap to call repeatedly

use std::fmt;

/// Named broadcast events the embedded player can be subscribed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedEventName {
    Ready,
    Play,
    Pause,
    Finish,
    PlayProgress,
}

impl EmbedEventName {
    /// Wire name of the event.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EmbedEventName::Ready => "ready",
            EmbedEventName::Play => "play",
            EmbedEventName::Pause => "pause",
            EmbedEventName::Finish => "finish",
            EmbedEventName::PlayProgress => "playProgress",
        }
    }

    /// Events subscribed to once the embed is found, and re-subscribed
    /// whenever the player reports `ready`.
    #[must_use]
    pub fn subscription_set() -> &'static [EmbedEventName] {
        &[
            EmbedEventName::Ready,
            EmbedEventName::Play,
            EmbedEventName::Pause,
            EmbedEventName::Finish,
            EmbedEventName::PlayProgress,
        ]
    }
}

/// A semantic command for the embedded player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerCommand {
    Play,
    Pause,
    /// Seek to an absolute position in seconds.
    SeekTo(f64),
    /// Subscribe to a named broadcast event.
    Subscribe(EmbedEventName),
    /// Ask for the current playhead position.
    QueryPosition,
    /// Ask for the video duration.
    QueryDuration,
    /// Ask whether playback is paused.
    QueryPaused,
}

/// Failure to deliver a command over the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelError(pub String);

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player channel error: {}", self.0)
    }
}

/// Port for the cross-document message channel.
///
/// Implementations must be `Send + Sync`: the runtime posts commands from
/// the event loop and from short-lived delay tasks.
pub trait PlayerChannel: Send + Sync {
    /// Returns true if the embedded player element is currently present.
    fn embed_present(&self) -> bool;

    /// Posts one command to the embedded player.
    ///
    /// # Errors
    ///
    /// Returns a [`ChannelError`] if the message could not be handed to
    /// the channel (e.g. the embed disappeared).
    fn post(&self, command: PlayerCommand) -> Result<(), ChannelError>;
}
