//! Gesture labels and the per-frame rule table.

use serde::{Deserialize, Serialize};

use crate::config::Thresholds;
use crate::fingers::FingerExtensionState;
use crate::frame::{FINGER_JOINTS, HandFrame, INDEX_TIP, THUMB_TIP};
use crate::tracker::MotionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureLabel {
    #[default]
    None,
    Tap,
    SwipeLeft,
    SwipeRight,
    ScrollUp,
    ScrollDown,
    VolumeUp,
    VolumeDown,
    FollowCursor,
    CloseCursor,
    Return,
}

impl GestureLabel {
    pub const ALL: [GestureLabel; 11] = [
        Self::None,
        Self::Tap,
        Self::SwipeLeft,
        Self::SwipeRight,
        Self::ScrollUp,
        Self::ScrollDown,
        Self::VolumeUp,
        Self::VolumeDown,
        Self::FollowCursor,
        Self::CloseCursor,
        Self::Return,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Tap => "tap",
            Self::SwipeLeft => "swipe_left",
            Self::SwipeRight => "swipe_right",
            Self::ScrollUp => "scroll_up",
            Self::ScrollDown => "scroll_down",
            Self::VolumeUp => "volume_up",
            Self::VolumeDown => "volume_down",
            Self::FollowCursor => "follow_cursor",
            Self::CloseCursor => "close_cursor",
            Self::Return => "return",
        }
    }

    /// Accepts `swipe_left` as well as the dotted `swipe.left` used by nested binding tables.
    pub fn from_name(name: &str) -> Option<Self> {
        let norm = name.trim().replace('.', "_").to_ascii_lowercase();
        Self::ALL.into_iter().find(|l| l.as_str() == norm)
    }

    pub fn is_swipe(&self) -> bool {
        matches!(self, Self::SwipeLeft | Self::SwipeRight)
    }

    pub fn is_none(&self) -> bool {
        *self == Self::None
    }
}

/// Per-frame classification before debouncing.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GestureCandidate {
    pub label: GestureLabel,
    pub confidence: f32,
}

impl GestureCandidate {
    pub fn none() -> Self {
        Self::default()
    }
}

/// What the engine reports for every frame; `label == None` when nothing was confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GestureEvent {
    #[serde(rename = "gesture")]
    pub label: GestureLabel,
    pub confidence: f32,
}

impl GestureEvent {
    pub fn none(confidence: f32) -> Self {
        Self {
            label: GestureLabel::None,
            confidence,
        }
    }

    pub fn is_none(&self) -> bool {
        self.label.is_none()
    }
}

/// Priority-ordered rules; the first match wins.
///
/// Tap only looks at finger extension. Volume is the fallback for any other pose with the index
/// extended: thumb tip above the index tip is up, below is down, level is nothing.
pub fn evaluate(
    fingers: &FingerExtensionState,
    motion: &MotionState,
    frame: &HandFrame,
    th: &Thresholds,
) -> GestureCandidate {
    if !frame.is_well_formed() || frame.hand_score < th.confidence_threshold {
        return GestureCandidate::none();
    }
    let label = pick_label(fingers, motion, frame);
    GestureCandidate {
        label,
        confidence: frame.hand_score,
    }
}

fn pick_label(f: &FingerExtensionState, motion: &MotionState, frame: &HandFrame) -> GestureLabel {
    let open = f.all_four();
    let closed = f.none_of_four();

    if open && motion.is_open_hand_moving {
        return if motion.displacement_x < 0.0 {
            GestureLabel::SwipeLeft
        } else {
            GestureLabel::SwipeRight
        };
    }
    if open && fingertips_below_knuckles(frame) {
        return GestureLabel::ScrollDown;
    }
    if closed && !f.thumb {
        return GestureLabel::ScrollUp;
    }
    if closed && f.thumb {
        return GestureLabel::Return;
    }
    if f.index && !f.middle && !f.ring && !f.pinky && !f.thumb {
        return GestureLabel::Tap;
    }
    if f.index && f.middle && !f.ring && !f.pinky {
        return GestureLabel::FollowCursor;
    }
    if f.index && f.middle && f.ring && !f.pinky {
        return GestureLabel::CloseCursor;
    }
    if f.index {
        let thumb_y = frame.at(THUMB_TIP).y;
        let index_y = frame.at(INDEX_TIP).y;
        if thumb_y < index_y {
            return GestureLabel::VolumeUp;
        }
        if thumb_y > index_y {
            return GestureLabel::VolumeDown;
        }
    }
    GestureLabel::None
}

/// Image y grows downwards, so "below" means a larger y.
fn fingertips_below_knuckles(frame: &HandFrame) -> bool {
    FINGER_JOINTS
        .iter()
        .all(|&(mcp, _, tip)| frame.at(tip).y > frame.at(mcp).y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{INDEX_MCP, LANDMARK_COUNT, Landmark};

    fn fingers(thumb: bool, index: bool, middle: bool, ring: bool, pinky: bool) -> FingerExtensionState {
        FingerExtensionState {
            thumb,
            index,
            middle,
            ring,
            pinky,
        }
    }

    /// Fingertips above their knuckles, thumb tip level with index tip.
    fn upright_frame(score: f32) -> HandFrame {
        let mut kp = vec![Landmark::new(0.5, 0.5); LANDMARK_COUNT];
        for &(mcp, _, tip) in FINGER_JOINTS.iter() {
            kp[mcp] = Landmark::new(0.5, 0.6);
            kp[tip] = Landmark::new(0.5, 0.3);
        }
        kp[THUMB_TIP] = Landmark::new(0.4, 0.3);
        HandFrame::new(kp, score)
    }

    fn still() -> MotionState {
        MotionState::default()
    }

    fn label(f: FingerExtensionState, m: &MotionState, frame: &HandFrame) -> GestureLabel {
        evaluate(&f, m, frame, &Thresholds::default()).label
    }

    #[test]
    fn confidence_gate_beats_everything() {
        let frame = upright_frame(0.79);
        let c = evaluate(&fingers(false, true, false, false, false), &still(), &frame, &Thresholds::default());
        assert_eq!(c, GestureCandidate::none());
    }

    #[test]
    fn confidence_is_hand_score() {
        let frame = upright_frame(0.93);
        let c = evaluate(&fingers(false, true, false, false, false), &still(), &frame, &Thresholds::default());
        assert_eq!(c.label, GestureLabel::Tap);
        assert_eq!(c.confidence, 0.93);
    }

    #[test]
    fn swipe_direction_from_displacement_sign() {
        let frame = upright_frame(0.9);
        let open = fingers(false, true, true, true, true);
        let mut m = MotionState {
            displacement_x: 0.2,
            is_open_hand_moving: true,
            ..Default::default()
        };
        assert_eq!(label(open, &m, &frame), GestureLabel::SwipeRight);
        m.displacement_x = -0.2;
        assert_eq!(label(open, &m, &frame), GestureLabel::SwipeLeft);
    }

    #[test]
    fn swipe_needs_open_hand() {
        let frame = upright_frame(0.9);
        let m = MotionState {
            displacement_x: 0.2,
            is_open_hand_moving: true,
            ..Default::default()
        };
        assert_eq!(
            label(fingers(false, true, true, false, false), &m, &frame),
            GestureLabel::FollowCursor
        );
    }

    #[test]
    fn open_hand_at_rest_falls_back_to_volume() {
        let mut frame = upright_frame(0.9);
        let open = fingers(true, true, true, true, true);
        // thumb tip level with the index tip
        assert_eq!(label(open, &still(), &frame), GestureLabel::None);

        frame.keypoints[THUMB_TIP].y = 0.1;
        assert_eq!(label(open, &still(), &frame), GestureLabel::VolumeUp);
        frame.keypoints[THUMB_TIP].y = 0.6;
        assert_eq!(label(open, &still(), &frame), GestureLabel::VolumeDown);
    }

    #[test]
    fn any_index_pose_left_over_is_volume() {
        let mut frame = upright_frame(0.9);
        frame.keypoints[THUMB_TIP].y = 0.6;
        for f in [
            fingers(true, true, false, true, false),
            fingers(false, true, false, false, true),
            fingers(true, true, true, false, true),
        ] {
            assert_eq!(label(f, &still(), &frame), GestureLabel::VolumeDown, "{f:?}");
        }
        // no index, no volume
        assert_eq!(
            label(fingers(true, false, true, true, true), &still(), &frame),
            GestureLabel::None
        );
    }

    #[test]
    fn open_hand_pointing_down_scrolls_down() {
        let mut frame = upright_frame(0.9);
        for &(mcp, _, tip) in FINGER_JOINTS.iter() {
            frame.keypoints[mcp].y = 0.4;
            frame.keypoints[tip].y = 0.7;
        }
        assert_eq!(
            label(fingers(false, true, true, true, true), &still(), &frame),
            GestureLabel::ScrollDown
        );

        // one finger still up
        frame.keypoints[INDEX_MCP].y = 0.8;
        assert_eq!(
            label(fingers(false, true, true, true, true), &still(), &frame),
            GestureLabel::None
        );
    }

    #[test]
    fn static_poses() {
        let frame = upright_frame(0.9);
        let cases = [
            (fingers(false, false, false, false, false), GestureLabel::ScrollUp),
            (fingers(true, false, false, false, false), GestureLabel::Return),
            (fingers(false, true, false, false, false), GestureLabel::Tap),
            (fingers(false, true, true, false, false), GestureLabel::FollowCursor),
            (fingers(true, true, true, false, false), GestureLabel::FollowCursor),
            (fingers(false, true, true, true, false), GestureLabel::CloseCursor),
            (fingers(false, false, true, false, false), GestureLabel::None),
            (fingers(false, false, false, false, true), GestureLabel::None),
        ];
        for (f, want) in cases {
            assert_eq!(label(f, &still(), &frame), want, "{f:?}");
        }
    }

    #[test]
    fn index_only_resolution() {
        // every thumb/height combination of the index-only pose
        let mut frame = upright_frame(0.9);
        let index_only = fingers(false, true, false, false, false);
        let index_thumb = fingers(true, true, false, false, false);

        for thumb_y in [0.1, 0.3, 0.6] {
            frame.keypoints[THUMB_TIP].y = thumb_y;
            assert_eq!(label(index_only, &still(), &frame), GestureLabel::Tap);
        }

        frame.keypoints[THUMB_TIP].y = 0.1;
        assert_eq!(label(index_thumb, &still(), &frame), GestureLabel::VolumeUp);
        frame.keypoints[THUMB_TIP].y = 0.6;
        assert_eq!(label(index_thumb, &still(), &frame), GestureLabel::VolumeDown);
        frame.keypoints[THUMB_TIP].y = 0.3;
        assert_eq!(label(index_thumb, &still(), &frame), GestureLabel::None);
    }

    #[test]
    fn label_names_round_trip() {
        for l in GestureLabel::ALL {
            assert_eq!(GestureLabel::from_name(l.as_str()), Some(l));
        }
        assert_eq!(GestureLabel::from_name("swipe.left"), Some(GestureLabel::SwipeLeft));
        assert_eq!(GestureLabel::from_name("wave"), None);
    }
}
