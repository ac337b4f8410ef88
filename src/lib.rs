// SPDX-License-Identifier: MPL-2.0
//! `watchtrack` is a client-side video watch-session tracking and resume
//! engine.
//!
//! It answers, authoritatively and continuously, "how much of this video
//! has this user actually watched" while reconciling signals from
//! multiple unreliable producers (an embedded player reachable only via
//! cross-document messages, a native media element, tab-visibility
//! transitions, and periodic polling), and synchronizes that state with
//! a backend session store so playback resumes exactly where it left off.
//!
//! The core is a synchronous state machine ([`tracker::WatchTracker`])
//! fed by [`tracker::Message`]s and answering with [`tracker::Effect`]s;
//! [`tracker::TrackerRuntime`] drives it against real timers, an HTTP
//! session store, and a player channel.

#![doc(html_root_url = "https://docs.rs/watchtrack/0.1.0")]

pub mod application;
pub mod config;
pub mod diagnostics;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod tracker;

pub use error::{Error, Result};
