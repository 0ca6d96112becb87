//! Per-finger extension from joint angles.

use serde::Serialize;

use crate::config::Thresholds;
use crate::frame::{FINGER_JOINTS, HandFrame, THUMB_CMC, THUMB_MCP, THUMB_TIP};
use crate::geometry::{Point2, angle};

/// Coarse pose of one digit. Only `Extended` counts as extended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerPose {
    Extended,
    Ambiguous,
    Curved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FingerExtensionState {
    pub thumb: bool,
    pub index: bool,
    pub middle: bool,
    pub ring: bool,
    pub pinky: bool,
}

impl FingerExtensionState {
    /// Index, middle, ring and pinky all extended.
    pub fn all_four(&self) -> bool {
        self.index && self.middle && self.ring && self.pinky
    }

    /// None of index, middle, ring, pinky extended.
    pub fn none_of_four(&self) -> bool {
        !self.index && !self.middle && !self.ring && !self.pinky
    }
}

/// Thumb, index, middle, ring, pinky.
pub type FingerPoses = [FingerPose; 5];

pub fn classify(frame: &HandFrame, th: &Thresholds) -> FingerExtensionState {
    let [thumb, index, middle, ring, pinky] = poses(frame, th).map(|p| p == FingerPose::Extended);
    FingerExtensionState {
        thumb,
        index,
        middle,
        ring,
        pinky,
    }
}

/// Detailed per-digit poses; malformed frames report every digit as ambiguous.
pub fn poses(frame: &HandFrame, th: &Thresholds) -> FingerPoses {
    if !frame.is_well_formed() {
        return [FingerPose::Ambiguous; 5];
    }
    let pt = |i: usize| Point2::from(frame.at(i));

    let thumb = match angle(pt(THUMB_CMC), pt(THUMB_MCP), pt(THUMB_TIP)) {
        Some(a) if a > th.thumb_extended_deg => FingerPose::Extended,
        Some(a) if a < th.finger_curved_deg => FingerPose::Curved,
        _ => FingerPose::Ambiguous,
    };

    let mut out = [thumb; 5];
    for (slot, &(mcp, pip, tip)) in out[1..].iter_mut().zip(FINGER_JOINTS.iter()) {
        *slot = finger_pose(angle(pt(mcp), pt(pip), pt(tip)), th);
    }
    out
}

fn finger_pose(a: Option<f32>, th: &Thresholds) -> FingerPose {
    match a {
        Some(a) if a > th.finger_extended_deg => FingerPose::Extended,
        Some(a) if a < th.finger_curved_deg => FingerPose::Curved,
        _ => FingerPose::Ambiguous,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{INDEX_MCP, INDEX_PIP, INDEX_TIP, LANDMARK_COUNT, Landmark};

    fn frame_with(points: &[(usize, f32, f32)]) -> HandFrame {
        let mut kp: Vec<Landmark> = (0..LANDMARK_COUNT)
            .map(|i| Landmark::new(i as f32 * 0.01, 0.9))
            .collect();
        for &(i, x, y) in points {
            kp[i] = Landmark::new(x, y);
        }
        HandFrame::new(kp, 0.9)
    }

    #[test]
    fn straight_index_is_extended() {
        let f = frame_with(&[
            (INDEX_MCP, 0.5, 0.6),
            (INDEX_PIP, 0.5, 0.5),
            (INDEX_TIP, 0.5, 0.3),
        ]);
        let st = classify(&f, &Thresholds::default());
        assert!(st.index);
    }

    #[test]
    fn folded_index_is_curved() {
        let f = frame_with(&[
            (INDEX_MCP, 0.5, 0.6),
            (INDEX_PIP, 0.5, 0.5),
            (INDEX_TIP, 0.52, 0.58),
        ]);
        let th = Thresholds::default();
        assert_eq!(poses(&f, &th)[1], FingerPose::Curved);
        assert!(!classify(&f, &th).index);
    }

    #[test]
    fn half_bent_is_ambiguous_and_not_extended() {
        // 90 degrees at the PIP
        let f = frame_with(&[
            (INDEX_MCP, 0.5, 0.6),
            (INDEX_PIP, 0.5, 0.5),
            (INDEX_TIP, 0.6, 0.5),
        ]);
        let th = Thresholds::default();
        assert_eq!(poses(&f, &th)[1], FingerPose::Ambiguous);
        assert!(!classify(&f, &th).index);
    }

    #[test]
    fn coincident_joints_are_not_extended() {
        let f = frame_with(&[
            (INDEX_MCP, 0.5, 0.5),
            (INDEX_PIP, 0.5, 0.5),
            (INDEX_TIP, 0.5, 0.3),
        ]);
        assert!(!classify(&f, &Thresholds::default()).index);
    }

    #[test]
    fn thumb_uses_its_own_threshold() {
        // ~130 degrees at the thumb MCP: above the thumb bar, below the finger bar
        let f = frame_with(&[
            (THUMB_CMC, 0.0, 0.0),
            (THUMB_MCP, 1.0, 0.0),
            (THUMB_TIP, 1.643, 0.766),
        ]);
        let st = classify(&f, &Thresholds::default());
        assert!(st.thumb);
    }

    #[test]
    fn malformed_frame_has_nothing_extended() {
        let f = HandFrame::new(vec![Landmark::new(0.5, 0.5); 5], 0.9);
        assert_eq!(
            classify(&f, &Thresholds::default()),
            FingerExtensionState::default()
        );
    }
}
