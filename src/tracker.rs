//! Palm position history and swipe arming.

use std::collections::VecDeque;

use serde::Serialize;

use crate::config::Thresholds;
use crate::frame::HandFrame;
use crate::geometry::{Point2, palm_center};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    pub x: f32,
    pub y: f32,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MotionState {
    /// Palm x travel from the swipe anchor, or from the oldest sample when unarmed.
    pub displacement_x: f32,
    pub displacement_y: f32,
    /// |Δx| per second between the two newest samples.
    pub velocity: f32,
    /// Open hand travelling far and fast enough, mostly sideways.
    pub is_open_hand_moving: bool,
}

#[derive(Debug)]
pub struct MotionTracker {
    th: Thresholds,
    samples: VecDeque<MotionSample>,
    // first sample of the current open-hand run, while unarmed
    run_start: Option<MotionSample>,
    // set once the run has travelled past the noise floor
    anchor: Option<MotionSample>,
}

impl MotionTracker {
    pub fn new(th: Thresholds) -> Self {
        let cap = th.motion_window.max(2);
        Self {
            th,
            samples: VecDeque::with_capacity(cap),
            run_start: None,
            anchor: None,
        }
    }

    /// Feed the palm position of a tracked frame.
    ///
    /// `open_hand` is whether index, middle, ring and pinky are all extended; the swipe anchor
    /// only lives while it holds.
    pub fn update(&mut self, frame: &HandFrame, open_hand: bool, now_ms: u64) -> MotionState {
        let Some(palm) = palm_center(frame) else {
            self.clear();
            return MotionState::default();
        };

        // timestamps went backwards: treat as a fresh start
        if self.samples.back().is_some_and(|s| s.timestamp_ms > now_ms) {
            self.clear();
        }
        self.evict_stale(now_ms);

        let prev = self.samples.back().copied();
        let sample = MotionSample {
            x: palm.x,
            y: palm.y,
            timestamp_ms: now_ms,
        };
        self.samples.push_back(sample);
        while self.samples.len() > self.th.motion_window.max(2) {
            self.samples.pop_front();
        }

        if !open_hand {
            self.run_start = None;
            self.anchor = None;
        } else if self.anchor.is_none() {
            // a run starts at the first open-hand sample, so a pose change that shifts the
            // palm centre is never counted as travel
            let start = *self.run_start.get_or_insert(sample);
            if (palm.x - start.x).abs() > self.th.swipe_noise_floor {
                self.anchor = Some(start);
                self.run_start = None;
            }
        }

        self.motion_state(palm, prev, open_hand, now_ms)
    }

    fn motion_state(
        &self,
        palm: Point2,
        prev: Option<MotionSample>,
        open_hand: bool,
        now_ms: u64,
    ) -> MotionState {
        let reference = self.anchor.or_else(|| self.samples.front().copied());
        let (dx, dy) = match reference {
            Some(r) => (palm.x - r.x, palm.y - r.y),
            None => (0.0, 0.0),
        };

        let velocity = match prev {
            Some(p) if now_ms > p.timestamp_ms => {
                let dt_s = (now_ms - p.timestamp_ms) as f32 / 1000.0;
                (palm.x - p.x).abs() / dt_s
            }
            _ => 0.0,
        };

        let is_open_hand_moving = open_hand
            && self.anchor.is_some()
            && dx.abs() > self.th.swipe_displacement_threshold
            && velocity >= self.th.swipe_velocity_min
            && dx.abs() > dy.abs() * self.th.swipe_axis_ratio;

        MotionState {
            displacement_x: dx,
            displacement_y: dy,
            velocity,
            is_open_hand_moving,
        }
    }

    fn evict_stale(&mut self, now_ms: u64) {
        let max_age = self.th.motion_stale_ms;
        while self
            .samples
            .front()
            .is_some_and(|s| now_ms.saturating_sub(s.timestamp_ms) > max_age)
        {
            self.samples.pop_front();
        }
        let stale = |s: Option<MotionSample>| {
            s.is_some_and(|s| now_ms.saturating_sub(s.timestamp_ms) > max_age)
        };
        if self.samples.is_empty() || stale(self.anchor) {
            self.anchor = None;
        }
        if self.samples.is_empty() || stale(self.run_start) {
            self.run_start = None;
        }
    }

    /// Forget the anchor after a confirmed swipe. The next run starts at the newest sample.
    pub fn clear_swipe_anchor(&mut self) {
        self.anchor = None;
        self.run_start = self.samples.back().copied();
    }

    /// Drop all history (tracking lost).
    pub fn clear(&mut self) {
        self.samples.clear();
        self.run_start = None;
        self.anchor = None;
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_armed(&self) -> bool {
        self.anchor.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{INDEX_MCP, LANDMARK_COUNT, Landmark, PINKY_MCP, WRIST};

    fn palm_at(x: f32, y: f32) -> HandFrame {
        let mut kp = vec![Landmark::new(x, y); LANDMARK_COUNT];
        kp[WRIST] = Landmark::new(x, y + 0.1);
        kp[INDEX_MCP] = Landmark::new(x - 0.05, y - 0.05);
        kp[PINKY_MCP] = Landmark::new(x + 0.05, y - 0.05);
        HandFrame::new(kp, 0.9)
    }

    #[test]
    fn buffer_is_bounded() {
        let mut t = MotionTracker::new(Thresholds::default());
        for i in 0..20u64 {
            t.update(&palm_at(0.5, 0.5), true, i * 10);
        }
        assert_eq!(t.len(), Thresholds::default().motion_window);
    }

    #[test]
    fn jitter_does_not_arm() {
        let mut t = MotionTracker::new(Thresholds::default());
        for (i, x) in [0.5, 0.51, 0.5, 0.505, 0.495].into_iter().enumerate() {
            let m = t.update(&palm_at(x, 0.5), true, i as u64 * 33);
            assert!(!m.is_open_hand_moving);
        }
        assert!(!t.is_armed());
    }

    #[test]
    fn sustained_sideways_motion_confirms() {
        let mut t = MotionTracker::new(Thresholds::default());
        let mut last = MotionState::default();
        for i in 0..6u64 {
            let x = 0.2 + 0.05 * i as f32;
            last = t.update(&palm_at(x, 0.5), true, i * 30);
        }
        assert!(t.is_armed());
        assert!(last.is_open_hand_moving);
        assert!(last.displacement_x > 0.2);
        assert!(last.velocity > 1.0);
    }

    #[test]
    fn leftward_motion_has_negative_displacement() {
        let mut t = MotionTracker::new(Thresholds::default());
        let mut last = MotionState::default();
        for i in 0..6u64 {
            let x = 0.8 - 0.05 * i as f32;
            last = t.update(&palm_at(x, 0.5), true, i * 30);
        }
        assert!(last.is_open_hand_moving);
        assert!(last.displacement_x < -0.2);
    }

    #[test]
    fn closing_the_hand_disarms() {
        let mut t = MotionTracker::new(Thresholds::default());
        t.update(&palm_at(0.2, 0.5), true, 0);
        t.update(&palm_at(0.3, 0.5), true, 30);
        assert!(t.is_armed());
        let m = t.update(&palm_at(0.4, 0.5), false, 60);
        assert!(!t.is_armed());
        assert!(!m.is_open_hand_moving);
    }

    #[test]
    fn opening_the_hand_does_not_arm_from_a_closed_sample() {
        let mut t = MotionTracker::new(Thresholds::default());
        t.update(&palm_at(0.5, 0.5), false, 0);
        t.update(&palm_at(0.2, 0.5), true, 30);
        assert!(!t.is_armed());
        t.update(&palm_at(0.25, 0.5), true, 60);
        assert!(t.is_armed());
    }

    #[test]
    fn small_steps_arm_once_the_run_adds_up() {
        let mut t = MotionTracker::new(Thresholds::default());
        // 0.018 per 33 ms: under the noise floor per frame, above the velocity floor
        let mut last = MotionState::default();
        let mut armed_at = None;
        for i in 0..12u64 {
            last = t.update(&palm_at(0.2 + 0.018 * i as f32, 0.5), true, i * 33);
            if armed_at.is_none() && t.is_armed() {
                armed_at = Some(i);
            }
        }
        assert_eq!(armed_at, Some(2));
        assert!(last.displacement_x > 0.15);
        assert!(last.is_open_hand_moving);
    }

    #[test]
    fn confirmed_swipe_restarts_the_run_from_the_newest_sample() {
        let mut t = MotionTracker::new(Thresholds::default());
        for i in 0..4u64 {
            t.update(&palm_at(0.2 + 0.05 * i as f32, 0.5), true, i * 30);
        }
        assert!(t.is_armed());
        t.clear_swipe_anchor();
        assert!(!t.is_armed());
        let m = t.update(&palm_at(0.38, 0.5), true, 120);
        assert!(t.is_armed());
        assert!((m.displacement_x - 0.03).abs() < 1e-4);
    }

    #[test]
    fn slow_drift_is_not_a_swipe() {
        let mut t = MotionTracker::new(Thresholds::default());
        let mut last = MotionState::default();
        // 0.03 per 100 ms = 0.3/s, under the velocity floor
        for i in 0..5u64 {
            last = t.update(&palm_at(0.2 + 0.03 * i as f32, 0.5), true, i * 100);
        }
        assert!(last.displacement_x > 0.1);
        assert!(!last.is_open_hand_moving);
    }

    #[test]
    fn diagonal_motion_is_not_a_swipe() {
        let mut t = MotionTracker::new(Thresholds::default());
        let mut last = MotionState::default();
        for i in 0..6u64 {
            let d = 0.05 * i as f32;
            last = t.update(&palm_at(0.2 + d, 0.2 + d), true, i * 30);
        }
        assert!(!last.is_open_hand_moving);
    }

    #[test]
    fn stale_samples_are_evicted() {
        let mut t = MotionTracker::new(Thresholds::default());
        t.update(&palm_at(0.2, 0.5), true, 0);
        t.update(&palm_at(0.3, 0.5), true, 30);
        assert!(t.is_armed());
        t.update(&palm_at(0.3, 0.5), true, 2_000);
        assert_eq!(t.len(), 1);
        assert!(!t.is_armed());
    }

    #[test]
    fn clear_forgets_everything() {
        let mut t = MotionTracker::new(Thresholds::default());
        t.update(&palm_at(0.2, 0.5), true, 0);
        t.update(&palm_at(0.3, 0.5), true, 30);
        t.clear();
        assert!(t.is_empty());
        assert!(!t.is_armed());
    }
}
