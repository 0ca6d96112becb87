//! One tracked hand, one engine: fingers → motion → rules → debounce.

use log::debug;
use serde::Serialize;

use crate::config::Thresholds;
use crate::debounce::{DebouncePhase, Debouncer};
use crate::fingers;
use crate::frame::HandFrame;
use crate::gestures::{self, GestureEvent, GestureLabel};
use crate::tracker::MotionTracker;

/// Introspection for status reports.
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub phase: DebouncePhase,
    pub pending_label: GestureLabel,
    pub pending_count: u32,
    pub last_confirmed_label: GestureLabel,
    pub last_confirmed_at_ms: Option<u64>,
    pub motion_samples: usize,
    pub swipe_armed: bool,
    pub frames_seen: u64,
    pub events_emitted: u64,
}

#[derive(Debug)]
pub struct GestureEngine {
    th: Thresholds,
    tracker: MotionTracker,
    debouncer: Debouncer,
    frames_seen: u64,
    events_emitted: u64,
}

impl GestureEngine {
    pub fn new(th: Thresholds) -> Self {
        Self {
            tracker: MotionTracker::new(th.clone()),
            debouncer: Debouncer::new(&th),
            th,
            frames_seen: 0,
            events_emitted: 0,
        }
    }

    /// Classify one detection cycle. `None` means the pose source saw no hand.
    ///
    /// Never fails: missing, malformed and low-confidence frames all yield a `none` event and
    /// drop motion history and the pending run. An active cooldown survives such gaps.
    pub fn classify(&mut self, frame: Option<&HandFrame>, now_ms: u64) -> GestureEvent {
        self.frames_seen += 1;

        let frame = match frame {
            Some(f) if f.is_well_formed() => f,
            _ => {
                self.tracking_lost();
                return GestureEvent::none(0.0);
            }
        };
        if frame.hand_score < self.th.confidence_threshold {
            self.tracking_lost();
            return GestureEvent::none(frame.hand_score);
        }

        let fingers = fingers::classify(frame, &self.th);
        let motion = self.tracker.update(frame, fingers.all_four(), now_ms);
        let candidate = gestures::evaluate(&fingers, &motion, frame, &self.th);
        let event = self.debouncer.step(candidate, now_ms);

        if !event.is_none() {
            if event.label.is_swipe() {
                self.tracker.clear_swipe_anchor();
            }
            self.events_emitted += 1;
            debug!(
                "confirmed {} ({:.2}) at {now_ms}ms",
                event.label.as_str(),
                event.confidence
            );
        }
        event
    }

    fn tracking_lost(&mut self) {
        if !self.tracker.is_empty() {
            debug!("hand tracking lost; clearing motion history");
        }
        self.tracker.clear();
        self.debouncer.clear_accumulation();
    }

    /// Clear all cross-frame state, cooldown included.
    pub fn reset(&mut self) {
        self.tracker.clear();
        self.debouncer.reset();
    }

    /// Swap tuning (profile reload). Starts a fresh session.
    pub fn set_thresholds(&mut self, th: Thresholds) {
        if th == self.th {
            return;
        }
        self.tracker = MotionTracker::new(th.clone());
        self.debouncer = Debouncer::new(&th);
        self.th = th;
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.th
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let st = self.debouncer.state();
        EngineSnapshot {
            phase: self.debouncer.phase(),
            pending_label: st.pending_label,
            pending_count: st.pending_count,
            last_confirmed_label: st.last_confirmed_label,
            last_confirmed_at_ms: st.last_confirmed_at_ms,
            motion_samples: self.tracker.len(),
            swipe_armed: self.tracker.is_armed(),
            frames_seen: self.frames_seen,
            events_emitted: self.events_emitted,
        }
    }
}
