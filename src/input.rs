//! Pose-source wire format: one JSON object per line.
//!
//! ```text
//! {"t": 1200, "hand": {"score": 0.93, "keypoints": [{"x": 0.41, "y": 0.77}, ...]}}
//! {"t": 1233, "hand": null}
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::frame::{HandFrame, LANDMARK_COUNT, Landmark};

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid pose message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("pose message has no usable timestamp")]
    MissingTimestamp,
    #[error("expected at least 21 keypoints, got {0}")]
    TooFewKeypoints(usize),
    #[error("keypoint {0} is missing a coordinate")]
    MissingCoordinate(usize),
    #[error("keypoint {0} has a non-finite coordinate")]
    NonFinite(usize),
    #[error("hand score is missing or not a number")]
    BadScore,
}

/// What the pose source reported for one detection cycle.
#[derive(Debug)]
pub enum HandObservation {
    Absent,
    Present(HandFrame),
    /// A hand was reported but cannot be used; handled like `Absent`.
    Malformed(FrameError),
}

impl HandObservation {
    pub fn frame(&self) -> Option<&HandFrame> {
        match self {
            HandObservation::Present(f) => Some(f),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct PoseMessage {
    pub timestamp_ms: u64,
    pub hand: HandObservation,
}

#[derive(Deserialize)]
struct RawMessage {
    t: Option<f64>,
    #[serde(default)]
    hand: Option<RawHand>,
}

#[derive(Deserialize)]
struct RawHand {
    #[serde(default)]
    keypoints: Vec<RawLandmark>,
    score: Option<f32>,
}

#[derive(Deserialize)]
struct RawLandmark {
    x: Option<f32>,
    y: Option<f32>,
    z: Option<f32>,
    score: Option<f32>,
}

/// Decode one line. `Err` means the whole line is unusable and should be skipped; a hand that
/// is merely malformed comes back as [`HandObservation::Malformed`].
pub fn decode_line(line: &str) -> Result<PoseMessage, FrameError> {
    let raw: RawMessage = serde_json::from_str(line)?;
    let timestamp_ms = match raw.t {
        Some(t) if t.is_finite() && t >= 0.0 => t as u64,
        _ => return Err(FrameError::MissingTimestamp),
    };
    let hand = match raw.hand {
        None => HandObservation::Absent,
        Some(h) => match hand_frame(h) {
            Ok(f) => HandObservation::Present(f),
            Err(e) => HandObservation::Malformed(e),
        },
    };
    Ok(PoseMessage { timestamp_ms, hand })
}

fn hand_frame(raw: RawHand) -> Result<HandFrame, FrameError> {
    if raw.keypoints.len() < LANDMARK_COUNT {
        return Err(FrameError::TooFewKeypoints(raw.keypoints.len()));
    }
    let score = raw
        .score
        .filter(|s| s.is_finite())
        .ok_or(FrameError::BadScore)?;

    let mut keypoints = Vec::with_capacity(raw.keypoints.len());
    for (i, kp) in raw.keypoints.into_iter().enumerate() {
        let (Some(x), Some(y)) = (kp.x, kp.y) else {
            return Err(FrameError::MissingCoordinate(i));
        };
        if !x.is_finite() || !y.is_finite() {
            return Err(FrameError::NonFinite(i));
        }
        keypoints.push(Landmark {
            x,
            y,
            z: kp.z,
            score: kp.score,
        });
    }
    Ok(HandFrame::new(keypoints, score))
}

#[derive(Serialize)]
struct OutMessage<'a> {
    t: u64,
    hand: Option<&'a HandFrame>,
}

/// Encode one line (no trailing newline). Used by recorders and replay fixtures.
pub fn encode_line(timestamp_ms: u64, hand: Option<&HandFrame>) -> serde_json::Result<String> {
    serde_json::to_string(&OutMessage {
        t: timestamp_ms,
        hand,
    })
}
