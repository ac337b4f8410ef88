// SPDX-License-Identifier: MPL-2.0
//! Resume prompt controller.
//!
//! Owns the binary resume-or-start-over decision. A prompt is raised in
//! two situations: page load discovered a resumable session, or the tab
//! was hidden while playing and became visible again. The prompt is held
//! here until the viewer decides; a Resume decision keeps the prompt
//! values around until the backend call resolves, so a failed call can
//! fall back to resuming locally.

use crate::domain::newtypes::ViewId;
use chrono::{DateTime, Utc};

/// What raised the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptOrigin {
    /// Page load found a resumable session on the backend.
    PageLoad,
    /// The tab returned to visibility after hiding mid-playback.
    TabReturn,
}

/// The stored position offered to the viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct ResumePrompt {
    /// Backend session id, when one exists. Absent in degraded mode.
    pub view_id: Option<ViewId>,
    pub playhead_secs: f64,
    pub watched_secs: f64,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub origin: PromptOrigin,
}

/// The viewer's decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeChoice {
    /// Continue from the stored playhead with the stored watch time.
    Resume,
    /// Discard progress: new session, zero watch time, seek to zero.
    StartOver,
}

/// Holds at most one pending prompt and one resolving resume.
#[derive(Debug, Default)]
pub struct ResumeController {
    pending: Option<ResumePrompt>,
    /// Prompt whose Resume decision is waiting on the backend.
    resolving: Option<ResumePrompt>,
}

impl ResumeController {
    /// Creates a controller with nothing pending.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises a prompt, replacing any earlier undecided one.
    pub fn offer(&mut self, prompt: ResumePrompt) {
        self.pending = Some(prompt);
    }

    /// Returns the undecided prompt, if any.
    #[must_use]
    pub fn pending(&self) -> Option<&ResumePrompt> {
        self.pending.as_ref()
    }

    /// Consumes the pending prompt for a decision.
    ///
    /// For [`ResumeChoice::Resume`] the prompt is retained as "resolving"
    /// until [`Self::finish_resolution`], so transport failures can fall
    /// back to its values.
    pub fn decide(&mut self, choice: ResumeChoice) -> Option<ResumePrompt> {
        let prompt = self.pending.take()?;
        if choice == ResumeChoice::Resume {
            self.resolving = Some(prompt.clone());
        }
        Some(prompt)
    }

    /// Returns the prompt whose resume call is in flight.
    #[must_use]
    pub fn resolving(&self) -> Option<&ResumePrompt> {
        self.resolving.as_ref()
    }

    /// Drops the resolving prompt once the resume call settled.
    pub fn finish_resolution(&mut self) -> Option<ResumePrompt> {
        self.resolving.take()
    }

    /// Clears everything, e.g. when the video identity changes.
    pub fn reset(&mut self) {
        self.pending = None;
        self.resolving = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt(origin: PromptOrigin) -> ResumePrompt {
        ResumePrompt {
            view_id: Some(ViewId::new(7)),
            playhead_secs: 150.0,
            watched_secs: 123.0,
            last_updated_at: None,
            origin,
        }
    }

    #[test]
    fn offer_then_decide_consumes_prompt() {
        let mut controller = ResumeController::new();
        controller.offer(prompt(PromptOrigin::PageLoad));
        assert!(controller.pending().is_some());

        let decided = controller.decide(ResumeChoice::StartOver).unwrap();
        assert_eq!(decided.playhead_secs, 150.0);
        assert!(controller.pending().is_none());
        // Start-over needs no fallback values.
        assert!(controller.resolving().is_none());
    }

    #[test]
    fn resume_decision_retains_fallback_values() {
        let mut controller = ResumeController::new();
        controller.offer(prompt(PromptOrigin::TabReturn));
        controller.decide(ResumeChoice::Resume);

        let resolving = controller.resolving().unwrap();
        assert_eq!(resolving.watched_secs, 123.0);

        let finished = controller.finish_resolution().unwrap();
        assert_eq!(finished.view_id, Some(ViewId::new(7)));
        assert!(controller.resolving().is_none());
    }

    #[test]
    fn decision_without_prompt_is_none() {
        let mut controller = ResumeController::new();
        assert!(controller.decide(ResumeChoice::Resume).is_none());
    }

    #[test]
    fn later_offer_replaces_earlier_prompt() {
        let mut controller = ResumeController::new();
        controller.offer(prompt(PromptOrigin::PageLoad));
        let mut second = prompt(PromptOrigin::TabReturn);
        second.playhead_secs = 42.0;
        controller.offer(second);

        assert_eq!(controller.pending().unwrap().playhead_secs, 42.0);
        assert_eq!(controller.pending().unwrap().origin, PromptOrigin::TabReturn);
    }

    #[test]
    fn reset_clears_all_state() {
        let mut controller = ResumeController::new();
        controller.offer(prompt(PromptOrigin::PageLoad));
        controller.decide(ResumeChoice::Resume);
        controller.reset();
        assert!(controller.pending().is_none());
        assert!(controller.resolving().is_none());
    }
}
