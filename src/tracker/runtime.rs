// SPDX-License-Identifier: MPL-2.0
//! Tokio runtime loop for the tracking engine.
//!
//! The engine itself is synchronous; this module connects it to real
//! timers, the session store, and the player channel:
//!
//! - a sampling interval drives accumulator ticks
//! - a discovery interval retries embed detection until settled
//! - a poll interval queries the embedded player for position/duration
//! - store calls run as spawned tasks whose completions re-enter the
//!   loop as epoch-tagged messages, so a slow backend never blocks the
//!   engine and stale results are dropped by the epoch guard
//!
//! Everything is torn down when the host requests shutdown (or drops its
//! handle): the final progress push is awaited directly so teardown
//! cannot lose the last seconds of a session.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use super::{Effect, Message, ResumeChoice, ResumePrompt, WatchTracker};
use crate::application::port::channel::{PlayerChannel, PlayerCommand};
use crate::application::port::store::SessionStore;
use crate::config::TrackerConfig;
use crate::domain::newtypes::VideoId;
use crate::domain::playback::{PlaybackEventKind, SourceId};

/// Host-facing signals feeding the runtime.
#[derive(Debug, Clone)]
pub enum HostSignal {
    /// The host navigated to a video.
    VideoLoaded {
        video_id: VideoId,
        duration_secs: Option<f64>,
    },
    /// A raw cross-document message arrived at the host window.
    EmbedMessage { origin: String, payload: String },
    /// A playback callback fired on a host-owned producer.
    Playback {
        source: SourceId,
        kind: PlaybackEventKind,
        position_secs: Option<f64>,
        duration_secs: Option<f64>,
    },
    /// The document's visibility changed.
    VisibilityChanged { hidden: bool },
    /// The viewer decided a resume prompt.
    ResumeDecision(ResumeChoice),
    /// Stop tracking; push final progress and exit the loop.
    Shutdown,
}

/// Cheap-to-clone handle the host uses to feed the runtime.
#[derive(Debug, Clone)]
pub struct TrackerHandle {
    tx: mpsc::UnboundedSender<HostSignal>,
}

impl TrackerHandle {
    /// Announces a video identity change.
    pub fn load_video(&self, video_id: VideoId, duration_secs: Option<f64>) {
        let _ = self.tx.send(HostSignal::VideoLoaded {
            video_id,
            duration_secs,
        });
    }

    /// Forwards one raw cross-document message.
    pub fn embed_message(&self, origin: impl Into<String>, payload: impl Into<String>) {
        let _ = self.tx.send(HostSignal::EmbedMessage {
            origin: origin.into(),
            payload: payload.into(),
        });
    }

    /// Forwards a native media element callback.
    pub fn playback(
        &self,
        kind: PlaybackEventKind,
        position_secs: Option<f64>,
        duration_secs: Option<f64>,
    ) {
        let _ = self.tx.send(HostSignal::Playback {
            source: SourceId::Native,
            kind,
            position_secs,
            duration_secs,
        });
    }

    /// Forwards a visibility change.
    pub fn visibility_changed(&self, hidden: bool) {
        let _ = self.tx.send(HostSignal::VisibilityChanged { hidden });
    }

    /// Forwards the viewer's resume decision.
    pub fn resume_decision(&self, choice: ResumeChoice) {
        let _ = self.tx.send(HostSignal::ResumeDecision(choice));
    }

    /// Requests shutdown with a final persistence attempt.
    pub fn shutdown(&self) {
        let _ = self.tx.send(HostSignal::Shutdown);
    }
}

/// The runtime loop driving one [`WatchTracker`].
pub struct TrackerRuntime<S, C> {
    engine: WatchTracker,
    store: Arc<S>,
    channel: Arc<C>,
    host_rx: mpsc::UnboundedReceiver<HostSignal>,
    completion_tx: mpsc::UnboundedSender<Message>,
    completion_rx: mpsc::UnboundedReceiver<Message>,
    prompt_tx: mpsc::UnboundedSender<ResumePrompt>,
    config: TrackerConfig,
}

impl<S, C> TrackerRuntime<S, C>
where
    S: SessionStore + Send + Sync + 'static,
    C: PlayerChannel + 'static,
{
    /// Builds a runtime around an engine and its adapters.
    ///
    /// Returns the runtime, the host handle, and the receiver on which
    /// resume prompts are delivered for display.
    pub fn new(
        engine: WatchTracker,
        store: Arc<S>,
        channel: Arc<C>,
        config: TrackerConfig,
    ) -> (Self, TrackerHandle, mpsc::UnboundedReceiver<ResumePrompt>) {
        let (host_tx, host_rx) = mpsc::unbounded_channel();
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (prompt_tx, prompt_rx) = mpsc::unbounded_channel();
        (
            Self {
                engine,
                store,
                channel,
                host_rx,
                completion_tx,
                completion_rx,
                prompt_tx,
                config,
            },
            TrackerHandle { tx: host_tx },
            prompt_rx,
        )
    }

    /// Runs until shutdown is requested or every host handle is dropped.
    pub async fn run(mut self) {
        let mut tick = tokio::time::interval(self.config.tick_interval());
        let mut discovery = tokio::time::interval(self.config.embed_retry_interval());
        let mut poll = tokio::time::interval(self.config.position_poll_interval());
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        discovery.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    self.dispatch(Message::Tick);
                }

                _ = discovery.tick() => {
                    let embed_present = self.channel.embed_present();
                    self.dispatch(Message::EmbedProbe { embed_present });
                }

                _ = poll.tick() => {
                    if self.engine.embed_connected() {
                        let _ = self.channel.post(PlayerCommand::QueryPosition);
                        let _ = self.channel.post(PlayerCommand::QueryDuration);
                        let _ = self.channel.post(PlayerCommand::QueryPaused);
                    }
                }

                signal = self.host_rx.recv() => {
                    match signal {
                        Some(HostSignal::Shutdown) | None => {
                            self.shutdown().await;
                            return;
                        }
                        Some(signal) => {
                            let message = Self::host_message(signal);
                            self.dispatch(message);
                        }
                    }
                }

                Some(message) = self.completion_rx.recv() => {
                    self.dispatch(message);
                }
            }
        }
    }

    fn host_message(signal: HostSignal) -> Message {
        match signal {
            HostSignal::VideoLoaded {
                video_id,
                duration_secs,
            } => Message::VideoLoaded {
                video_id,
                duration_secs,
            },
            HostSignal::EmbedMessage { origin, payload } => {
                Message::EmbedMessage { origin, payload }
            }
            HostSignal::Playback {
                source,
                kind,
                position_secs,
                duration_secs,
            } => Message::Playback {
                source,
                kind,
                position_secs,
                duration_secs,
            },
            HostSignal::VisibilityChanged { hidden } => Message::VisibilityChanged { hidden },
            HostSignal::ResumeDecision(choice) => Message::ResumeDecision(choice),
            HostSignal::Shutdown => unreachable!("shutdown is handled before mapping"),
        }
    }

    fn dispatch(&mut self, message: Message) {
        let effects = self.engine.handle(message, Instant::now());
        for effect in effects {
            self.perform(effect);
        }
    }

    fn perform(&mut self, effect: Effect) {
        match effect {
            Effect::CheckSession { video_id, epoch } => {
                let store = Arc::clone(&self.store);
                let tx = self.completion_tx.clone();
                tokio::spawn(async move {
                    let result = store.check(video_id).await;
                    let _ = tx.send(Message::CheckFinished { epoch, result });
                });
            }

            Effect::StartSession {
                video_id,
                force_new,
                epoch,
            } => {
                let store = Arc::clone(&self.store);
                let tx = self.completion_tx.clone();
                tokio::spawn(async move {
                    let result = store.start(video_id, force_new).await;
                    let _ = tx.send(Message::StartFinished {
                        epoch,
                        force_new,
                        result,
                    });
                });
            }

            Effect::ResumeSession {
                video_id,
                view_id,
                epoch,
            } => {
                let store = Arc::clone(&self.store);
                let tx = self.completion_tx.clone();
                tokio::spawn(async move {
                    let result = store.resume(video_id, view_id).await;
                    let _ = tx.send(Message::ResumeFinished { epoch, result });
                });
            }

            Effect::PushProgress {
                video_id,
                snapshot,
                epoch,
            } => {
                let store = Arc::clone(&self.store);
                let tx = self.completion_tx.clone();
                tokio::spawn(async move {
                    let result = store.update(video_id, snapshot).await;
                    let _ = tx.send(Message::UpdateFinished {
                        epoch,
                        view_id: snapshot.view_id,
                        result,
                    });
                });
            }

            Effect::Player(command) => {
                // Fire-and-forget: a vanished embed only means playback
                // control is lost, not that tracking should stop.
                let _ = self.channel.post(command);
            }

            Effect::PlayAfterDelay => {
                let channel = Arc::clone(&self.channel);
                let delay = self.config.autoplay_delay();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = channel.post(PlayerCommand::Play);
                });
            }

            Effect::PromptResume(prompt) => {
                let _ = self.prompt_tx.send(prompt);
            }
        }
    }

    /// Final teardown: the last progress push is awaited in place, not
    /// spawned, so process exit cannot race it away.
    async fn shutdown(&mut self) {
        let effects = self.engine.handle(Message::Teardown, Instant::now());
        for effect in effects {
            match effect {
                Effect::PushProgress {
                    video_id, snapshot, ..
                } => {
                    let _ = self.store.update(video_id, snapshot).await;
                }
                other => self.perform(other),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::port::channel::ChannelError;
    use crate::application::port::store::{
        CheckOutcome, ResumeOutcome, StartOutcome, StoreError, UpdateOutcome,
    };
    use crate::diagnostics::{BufferCapacity, DiagnosticsCollector};
    use crate::domain::newtypes::{UserId, ViewId};
    use crate::domain::session::ProgressSnapshot;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeStore {
        updates: Mutex<Vec<ProgressSnapshot>>,
        starts: Mutex<u64>,
    }

    impl SessionStore for FakeStore {
        async fn check(&self, _video_id: VideoId) -> Result<CheckOutcome, StoreError> {
            Ok(CheckOutcome::NoSession)
        }

        async fn start(
            &self,
            _video_id: VideoId,
            _force_new: bool,
        ) -> Result<StartOutcome, StoreError> {
            let mut starts = self.starts.lock().unwrap();
            *starts += 1;
            Ok(StartOutcome {
                view_id: ViewId::new(100 + *starts),
                watched_secs: 0.0,
            })
        }

        async fn resume(
            &self,
            _video_id: VideoId,
            view_id: ViewId,
        ) -> Result<ResumeOutcome, StoreError> {
            Ok(ResumeOutcome {
                view_id,
                playhead_secs: 0.0,
                watched_secs: 0.0,
            })
        }

        async fn update(
            &self,
            _video_id: VideoId,
            snapshot: ProgressSnapshot,
        ) -> Result<UpdateOutcome, StoreError> {
            self.updates.lock().unwrap().push(snapshot);
            Ok(UpdateOutcome { is_complete: false })
        }
    }

    #[derive(Default)]
    struct FakeChannel {
        posted: Mutex<Vec<PlayerCommand>>,
    }

    impl PlayerChannel for FakeChannel {
        fn embed_present(&self) -> bool {
            true
        }

        fn post(&self, command: PlayerCommand) -> Result<(), ChannelError> {
            self.posted.lock().unwrap().push(command);
            Ok(())
        }
    }

    fn fast_config() -> TrackerConfig {
        TrackerConfig {
            tick_interval_ms: Some(5),
            embed_retry_interval_ms: Some(5),
            position_poll_interval_ms: Some(10),
            autoplay_delay_ms: Some(5),
            ..TrackerConfig::default()
        }
    }

    #[tokio::test]
    async fn runtime_tracks_playback_and_flushes_on_shutdown() {
        let config = fast_config();
        let store = Arc::new(FakeStore::default());
        let channel = Arc::new(FakeChannel::default());
        let engine = WatchTracker::new(UserId::new(1), &config, None);

        let (runtime, handle, _prompts) =
            TrackerRuntime::new(engine, Arc::clone(&store), Arc::clone(&channel), config);
        let worker = tokio::spawn(runtime.run());

        handle.load_video(VideoId::new(7), Some(310.0));
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.playback(PlaybackEventKind::Play, None, None);
        tokio::time::sleep(Duration::from_millis(120)).await;
        handle.shutdown();
        worker.await.unwrap();

        // One session was started lazily on the play signal.
        assert_eq!(*store.starts.lock().unwrap(), 1);

        // Teardown flushed the accumulated watch time exactly once.
        let updates = store.updates.lock().unwrap();
        assert_eq!(updates.len(), 1);
        assert!(updates[0].playhead_secs >= 0.0);
    }

    #[tokio::test]
    async fn runtime_subscribes_once_embed_is_discovered() {
        let config = fast_config();
        let store = Arc::new(FakeStore::default());
        let channel = Arc::new(FakeChannel::default());
        let engine = WatchTracker::new(UserId::new(1), &config, None);

        let (runtime, handle, _prompts) =
            TrackerRuntime::new(engine, Arc::clone(&store), Arc::clone(&channel), config);
        let worker = tokio::spawn(runtime.run());

        handle.load_video(VideoId::new(7), None);
        tokio::time::sleep(Duration::from_millis(60)).await;
        handle.shutdown();
        worker.await.unwrap();

        let posted = channel.posted.lock().unwrap();
        assert!(posted
            .iter()
            .any(|c| matches!(c, PlayerCommand::Subscribe(_))));
        // Structured polling started after discovery.
        assert!(posted
            .iter()
            .any(|c| matches!(c, PlayerCommand::QueryPosition)));
    }

    #[tokio::test]
    async fn diagnostics_capture_session_lifecycle() {
        let config = fast_config();
        let store = Arc::new(FakeStore::default());
        let channel = Arc::new(FakeChannel::default());
        let (mut collector, diag_handle) = DiagnosticsCollector::new(BufferCapacity::default());
        let engine = WatchTracker::new(UserId::new(1), &config, Some(diag_handle));

        let (runtime, handle, _prompts) =
            TrackerRuntime::new(engine, Arc::clone(&store), Arc::clone(&channel), config);
        let worker = tokio::spawn(runtime.run());

        handle.load_video(VideoId::new(7), Some(310.0));
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.playback(PlaybackEventKind::Play, None, None);
        tokio::time::sleep(Duration::from_millis(60)).await;
        handle.shutdown();
        worker.await.unwrap();

        collector.drain();
        let events: Vec<_> = collector.events().map(|c| c.event.clone()).collect();
        assert!(events
            .iter()
            .any(|e| matches!(e, crate::diagnostics::TrackingEvent::SessionStarted { .. })));
    }
}
