// SPDX-License-Identifier: MPL-2.0
//! Port definitions.
//!
//! Ports are the seams between the session engine and its collaborators:
//! the backend session store and the embedded player's message channel.
//! Infrastructure adapters implement these traits; tests substitute
//! in-memory fakes.

pub mod channel;
pub mod store;

pub use channel::{ChannelError, EmbedEventName, PlayerChannel, PlayerCommand};
pub use store::{
    CheckOutcome, ResumableSessionInfo, ResumeOutcome, SessionStore, StartOutcome, StoreError,
    StoreOperation, UpdateOutcome,
};
