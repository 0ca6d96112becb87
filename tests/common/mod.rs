// Synthetic hands for engine tests
//
// Extended digits are straight lines (180 degrees at the middle joint), curled digits fold the
// tip back towards the knuckle. The palm centre (wrist, index MCP, pinky MCP) sits at `x`.

#![allow(dead_code)]

use handctl::config::Thresholds;
use handctl::engine::GestureEngine;
use handctl::frame::*;
use handctl::gestures::{GestureEvent, GestureLabel};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Thumb {
    Curled,
    /// Out to the side, tip below the index tip.
    Out,
    /// Pointing up, tip above the index tip.
    Up,
    /// Extended, tip level with the index tip.
    Level,
}

#[derive(Debug, Clone, Copy)]
pub struct Hand {
    pub x: f32,
    pub score: f32,
    pub thumb: Thumb,
    /// index, middle, ring, pinky
    pub fingers: [bool; 4],
    pub pointing_down: bool,
}

impl Hand {
    pub fn new(fingers: [bool; 4], thumb: Thumb) -> Self {
        Self {
            x: 0.5,
            score: 0.9,
            thumb,
            fingers,
            pointing_down: false,
        }
    }

    /// Level thumb: an open hand at rest reads as nothing rather than volume.
    pub fn open() -> Self {
        Self::new([true; 4], Thumb::Level)
    }

    pub fn fist() -> Self {
        Self::new([false; 4], Thumb::Curled)
    }

    pub fn index_only() -> Self {
        Self::new([true, false, false, false], Thumb::Curled)
    }

    pub fn at(mut self, x: f32) -> Self {
        self.x = x;
        self
    }

    pub fn score(mut self, s: f32) -> Self {
        self.score = s;
        self
    }

    pub fn down(mut self) -> Self {
        self.pointing_down = true;
        self
    }

    pub fn frame(&self) -> HandFrame {
        let ox = self.x;
        let mut kp = vec![Landmark::new(ox, 0.7); LANDMARK_COUNT];
        kp[WRIST] = Landmark::new(ox, 0.8);

        let offsets = [-0.06, -0.02, 0.02, 0.06];
        for (i, &(mcp, pip, tip)) in FINGER_JOINTS.iter().enumerate() {
            let mx = ox + offsets[i];
            kp[mcp] = Landmark::new(mx, 0.6);
            match (self.fingers[i], self.pointing_down) {
                (true, false) => {
                    kp[pip] = Landmark::new(mx, 0.5);
                    kp[pip + 1] = Landmark::new(mx, 0.45);
                    kp[tip] = Landmark::new(mx, 0.4);
                }
                (true, true) => {
                    kp[pip] = Landmark::new(mx, 0.7);
                    kp[pip + 1] = Landmark::new(mx, 0.75);
                    kp[tip] = Landmark::new(mx, 0.8);
                }
                (false, _) => {
                    kp[pip] = Landmark::new(mx, 0.5);
                    kp[pip + 1] = Landmark::new(mx + 0.01, 0.55);
                    kp[tip] = Landmark::new(mx + 0.01, 0.58);
                }
            }
        }

        let (cmc, mcp, ip, tip) = match self.thumb {
            Thumb::Curled => ((0.05, 0.75), (0.1, 0.7), (0.08, 0.72), (0.06, 0.73)),
            Thumb::Out => ((0.05, 0.75), (0.1, 0.7), (0.15, 0.65), (0.2, 0.6)),
            Thumb::Up => ((0.08, 0.7), (0.1, 0.5), (0.11, 0.4), (0.12, 0.3)),
            Thumb::Level => ((0.09, 0.56), (0.13, 0.52), (0.17, 0.48), (0.25, 0.4)),
        };
        for (idx, (dx, y)) in [(THUMB_CMC, cmc), (THUMB_MCP, mcp), (THUMB_IP, ip), (THUMB_TIP, tip)] {
            kp[idx] = Landmark::new(ox + dx, y);
        }

        HandFrame::new(kp, self.score)
    }
}

/// Feed `hands` at a fixed frame interval starting at `t0`; returns every non-none event
/// with its timestamp.
pub fn run(
    engine: &mut GestureEngine,
    hands: &[Option<Hand>],
    t0: u64,
    step_ms: u64,
) -> Vec<(u64, GestureEvent)> {
    let mut out = Vec::new();
    for (i, h) in hands.iter().enumerate() {
        let t = t0 + i as u64 * step_ms;
        let frame = h.map(|h| h.frame());
        let ev = engine.classify(frame.as_ref(), t);
        if !ev.is_none() {
            out.push((t, ev));
        }
    }
    out
}

pub fn engine() -> GestureEngine {
    GestureEngine::new(Thresholds::default())
}

pub fn labels(events: &[(u64, GestureEvent)]) -> Vec<GestureLabel> {
    events.iter().map(|(_, e)| e.label).collect()
}

/// Open hand sliding right from `from` by `dx` per frame.
pub fn sweep(from: f32, dx: f32, frames: usize) -> Vec<Option<Hand>> {
    (0..frames)
        .map(|i| Some(Hand::open().at(from + dx * i as f32)))
        .collect()
}
