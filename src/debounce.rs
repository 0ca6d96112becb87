//! Turns flickering per-frame candidates into one event per held gesture.
//!
//! A candidate must repeat for `consecutive_detections_required` frames in a row before it is
//! confirmed, and nothing is confirmed while the cooldown after the previous confirmation is
//! running. Swipes are the exception: a swipe following a confirmed swipe within twice the
//! cooldown fires immediately, so quick repeated swipes are not swallowed.

use serde::Serialize;

use crate::config::Thresholds;
use crate::gestures::{GestureCandidate, GestureEvent, GestureLabel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DebouncePhase {
    #[default]
    Idle,
    Accumulating,
    /// Emitted on the last step.
    Confirmed,
    Cooldown,
}

/// Cross-frame memory of the debouncer.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct DebounceState {
    pub last_confirmed_label: GestureLabel,
    pub last_confirmed_at_ms: Option<u64>,
    pub pending_label: GestureLabel,
    pub pending_count: u32,
}

#[derive(Debug)]
pub struct Debouncer {
    required: u32,
    confidence_threshold: f32,
    cooldown_ms: u64,
    state: DebounceState,
    phase: DebouncePhase,
}

impl Debouncer {
    pub fn new(th: &Thresholds) -> Self {
        Self {
            required: th.consecutive_detections_required.max(1),
            confidence_threshold: th.confidence_threshold,
            cooldown_ms: th.gesture_cooldown_ms,
            state: DebounceState::default(),
            phase: DebouncePhase::Idle,
        }
    }

    pub fn step(&mut self, candidate: GestureCandidate, now_ms: u64) -> GestureEvent {
        let cooling = self.in_cooldown(now_ms);
        let label = candidate.label;

        if label.is_none() {
            self.clear_accumulation();
            self.phase = if cooling {
                DebouncePhase::Cooldown
            } else {
                DebouncePhase::Idle
            };
            return GestureEvent::none(candidate.confidence);
        }

        if self.state.pending_label == label {
            self.state.pending_count = self.state.pending_count.saturating_add(1);
        } else {
            self.state.pending_label = label;
            self.state.pending_count = 1;
        }

        let confident = candidate.confidence >= self.confidence_threshold;

        if confident && label.is_swipe() && self.swipe_continues(now_ms) {
            return self.confirm(candidate, now_ms);
        }
        if cooling {
            self.phase = DebouncePhase::Cooldown;
            return GestureEvent::none(candidate.confidence);
        }
        if confident && self.state.pending_count >= self.required {
            return self.confirm(candidate, now_ms);
        }

        self.phase = DebouncePhase::Accumulating;
        GestureEvent::none(candidate.confidence)
    }

    fn swipe_continues(&self, now_ms: u64) -> bool {
        self.state.last_confirmed_label.is_swipe()
            && self
                .state
                .last_confirmed_at_ms
                .is_some_and(|t| now_ms.saturating_sub(t) < self.cooldown_ms.saturating_mul(2))
    }

    fn confirm(&mut self, candidate: GestureCandidate, now_ms: u64) -> GestureEvent {
        self.state.last_confirmed_label = candidate.label;
        self.state.last_confirmed_at_ms = Some(now_ms);
        self.clear_accumulation();
        self.phase = DebouncePhase::Confirmed;
        GestureEvent {
            label: candidate.label,
            confidence: candidate.confidence,
        }
    }

    pub fn in_cooldown(&self, now_ms: u64) -> bool {
        self.state
            .last_confirmed_at_ms
            .is_some_and(|t| now_ms.saturating_sub(t) < self.cooldown_ms)
    }

    /// Drop the pending run but keep the cooldown (tracking gaps).
    pub fn clear_accumulation(&mut self) {
        self.state.pending_label = GestureLabel::None;
        self.state.pending_count = 0;
    }

    /// Forget everything, cooldown included (session boundary).
    pub fn reset(&mut self) {
        self.state = DebounceState::default();
        self.phase = DebouncePhase::Idle;
    }

    pub fn state(&self) -> &DebounceState {
        &self.state
    }

    pub fn phase(&self) -> DebouncePhase {
        self.phase
    }
}
