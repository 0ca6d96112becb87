//! Hand landmark frames as delivered by the pose source.
//!
//! Index layout follows the common 21-point hand topology: wrist, then four joints per digit
//! from the base outwards.

use serde::{Deserialize, Serialize};

pub const LANDMARK_COUNT: usize = 21;

pub const WRIST: usize = 0;
pub const THUMB_CMC: usize = 1;
pub const THUMB_MCP: usize = 2;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_PIP: usize = 14;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_PIP: usize = 18;
pub const PINKY_TIP: usize = 20;

/// (MCP, PIP, TIP) for index, middle, ring, pinky.
pub const FINGER_JOINTS: [(usize, usize, usize); 4] = [
    (INDEX_MCP, INDEX_PIP, INDEX_TIP),
    (MIDDLE_MCP, MIDDLE_PIP, MIDDLE_TIP),
    (RING_MCP, RING_PIP, RING_TIP),
    (PINKY_MCP, PINKY_PIP, PINKY_TIP),
];

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            z: None,
            score: None,
        }
    }
}

/// One observation of one hand at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandFrame {
    pub keypoints: Vec<Landmark>,
    #[serde(rename = "score")]
    pub hand_score: f32,
}

impl HandFrame {
    pub fn new(keypoints: Vec<Landmark>, hand_score: f32) -> Self {
        Self {
            keypoints,
            hand_score,
        }
    }

    /// Enough landmarks, all with finite planar coordinates, and a finite score.
    pub fn is_well_formed(&self) -> bool {
        self.keypoints.len() >= LANDMARK_COUNT
            && self.hand_score.is_finite()
            && self
                .keypoints
                .iter()
                .take(LANDMARK_COUNT)
                .all(|l| l.x.is_finite() && l.y.is_finite())
    }

    /// Landmark by index. Callers only index well-formed frames.
    pub fn at(&self, idx: usize) -> &Landmark {
        &self.keypoints[idx]
    }
}
