// SPDX-License-Identifier: MPL-2.0
//! Infrastructure layer - adapters for the engine's ports.
//!
//! # Modules
//!
//! - [`embed`]: JSON codec for the embedded player's cross-document
//!   message protocol
//! - [`http`]: [`HttpSessionStore`](http::HttpSessionStore), a reqwest
//!   adapter for the backend session endpoints

pub mod embed;
pub mod http;

pub use http::HttpSessionStore;
