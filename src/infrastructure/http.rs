// SPDX-License-Identifier: MPL-2.0
//! HTTP adapter for the backend session endpoints.
//!
//! Wraps a `reqwest::Client` and implements [`SessionStore`] against:
//!
//! - `POST {base}/videos/{id}/view/check`
//! - `POST {base}/videos/{id}/view/start`
//! - `POST {base}/videos/{id}/view/resume`
//! - `POST {base}/videos/{id}/view/update`
//!
//! Every call runs under a bounded timeout and is retried once on
//! transport failure or a 5xx status. Tracking must never block playback,
//! so callers treat any [`StoreError`] as a cue to degrade, not to abort.

use crate::application::port::store::{
    CheckOutcome, ResumableSessionInfo, ResumeOutcome, SessionStore, StartOutcome, StoreError,
    UpdateOutcome,
};
use crate::config::TrackerConfig;
use crate::domain::newtypes::{VideoId, ViewId};
use crate::domain::session::ProgressSnapshot;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// =============================================================================
// Wire DTOs
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckResponse {
    has_resumable_session: bool,
    #[serde(default)]
    view_id: Option<u64>,
    #[serde(default)]
    playhead_position: f64,
    #[serde(default)]
    watch_time_seconds: f64,
    #[serde(default)]
    updated_at: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartRequest {
    force_new: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartResponse {
    view_id: u64,
    #[serde(default)]
    watch_time_seconds: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResumeRequest {
    view_id: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResumeResponse {
    view_id: u64,
    #[serde(default)]
    playhead_position: f64,
    #[serde(default)]
    watch_time_seconds: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRequest {
    view_id: u64,
    watch_time_seconds: u64,
    playhead_position: f64,
    is_complete: bool,
    version: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateResponse {
    #[serde(default)]
    is_complete: bool,
}

// =============================================================================
// HttpSessionStore
// =============================================================================

/// Session store adapter over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSessionStore {
    client: reqwest::Client,
    base_url: String,
    retry_limit: u32,
}

impl HttpSessionStore {
    /// Builds a store from the tracker configuration.
    ///
    /// # Errors
    ///
    /// Returns a config error if no API base URL is configured, or a
    /// transport error if the HTTP client fails to build.
    pub fn from_config(config: &TrackerConfig) -> Result<Self> {
        let base_url = config
            .api_base_url
            .clone()
            .ok_or_else(|| Error::Config("api_base_url is not set".to_string()))?;
        Self::new(base_url, config.request_timeout(), config.request_retry_limit())
    }

    /// Builds a store with explicit transport settings.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the HTTP client fails to build.
    pub fn new(base_url: String, timeout: Duration, retry_limit: u32) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(concat!("WatchTrack/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry_limit,
        })
    }

    fn endpoint(&self, video_id: VideoId, operation: &str) -> String {
        format!("{}/videos/{}/view/{}", self.base_url, video_id, operation)
    }

    /// Posts `body` to a session endpoint, retrying once on transport
    /// failure, timeout, or a 5xx status.
    async fn post_json<B, R>(&self, url: &str, body: &B) -> std::result::Result<R, StoreError>
    where
        B: Serialize,
        R: for<'de> Deserialize<'de>,
    {
        let mut last_error = StoreError::Transport("no attempt made".to_string());

        for _attempt in 0..=self.retry_limit {
            let sent = self.client.post(url).json(body).send().await;
            match sent {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .json::<R>()
                            .await
                            .map_err(|e| StoreError::Protocol(e.to_string()));
                    }
                    last_error = StoreError::Status(status.as_u16());
                    if !status.is_server_error() {
                        // Client errors will not improve on retry.
                        return Err(last_error);
                    }
                }
                Err(e) => {
                    last_error = if e.is_timeout() {
                        StoreError::Timeout
                    } else {
                        StoreError::Transport(e.to_string())
                    };
                }
            }
        }

        Err(last_error)
    }
}

fn parse_updated_at(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.and_then(|value| {
        DateTime::parse_from_rfc3339(&value)
            .ok()
            .map(|parsed| parsed.with_timezone(&Utc))
    })
}

impl SessionStore for HttpSessionStore {
    async fn check(&self, video_id: VideoId) -> std::result::Result<CheckOutcome, StoreError> {
        let url = self.endpoint(video_id, "check");
        let response: CheckResponse = self.post_json(&url, &serde_json::json!({})).await?;

        if response.has_resumable_session && response.playhead_position > 0.0 {
            let view_id = response
                .view_id
                .ok_or_else(|| StoreError::Protocol("resumable session without viewId".into()))?;
            Ok(CheckOutcome::Resumable(ResumableSessionInfo {
                view_id: ViewId::new(view_id),
                playhead_secs: response.playhead_position,
                watched_secs: response.watch_time_seconds,
                updated_at: parse_updated_at(response.updated_at),
            }))
        } else {
            Ok(CheckOutcome::NoSession)
        }
    }

    async fn start(
        &self,
        video_id: VideoId,
        force_new: bool,
    ) -> std::result::Result<StartOutcome, StoreError> {
        let url = self.endpoint(video_id, "start");
        let response: StartResponse = self.post_json(&url, &StartRequest { force_new }).await?;
        Ok(StartOutcome {
            view_id: ViewId::new(response.view_id),
            watched_secs: response.watch_time_seconds,
        })
    }

    async fn resume(
        &self,
        video_id: VideoId,
        view_id: ViewId,
    ) -> std::result::Result<ResumeOutcome, StoreError> {
        let url = self.endpoint(video_id, "resume");
        let response: ResumeResponse = self
            .post_json(
                &url,
                &ResumeRequest {
                    view_id: view_id.value(),
                },
            )
            .await?;
        Ok(ResumeOutcome {
            view_id: ViewId::new(response.view_id),
            playhead_secs: response.playhead_position,
            watched_secs: response.watch_time_seconds,
        })
    }

    async fn update(
        &self,
        video_id: VideoId,
        snapshot: ProgressSnapshot,
    ) -> std::result::Result<UpdateOutcome, StoreError> {
        let url = self.endpoint(video_id, "update");
        let response: UpdateResponse = self
            .post_json(
                &url,
                &UpdateRequest {
                    view_id: snapshot.view_id.value(),
                    watch_time_seconds: snapshot.watch_time_secs,
                    playhead_position: snapshot.playhead_secs,
                    is_complete: snapshot.is_complete,
                    version: snapshot.version,
                },
            )
            .await?;
        Ok(UpdateOutcome {
            is_complete: response.is_complete,
        })
    }
}
