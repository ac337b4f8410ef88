// SPDX-License-Identifier: MPL-2.0
//! Domain layer - Core watch-session types with ZERO I/O dependencies.
//!
//! This module contains pure domain types, value objects, and business rules.
//! Everything here is synchronous and side-effect free, so the state machine
//! built on top of it can be tested without timers, sockets, or a player.
//!
//! # Modules
//!
//! - [`newtypes`]: Identifier newtypes ([`VideoId`](newtypes::VideoId),
//!   [`UserId`](newtypes::UserId), [`ViewId`](newtypes::ViewId))
//! - [`playback`]: Playback signal types ([`PlaybackEvent`](playback::PlaybackEvent),
//!   [`NormalizedPlayerState`](playback::NormalizedPlayerState))
//! - [`session`]: Watch-session types ([`WatchSession`](session::WatchSession),
//!   [`SessionPhase`](session::SessionPhase), completion threshold rules)

pub mod newtypes;
pub mod playback;
pub mod session;

pub use newtypes::{UserId, VideoId, ViewId};
pub use playback::{NormalizedPlayerState, PlaybackEvent, PlaybackEventKind, SourceId};
pub use session::{
    completion_reached, ProgressSnapshot, SessionPhase, WatchSession,
};
