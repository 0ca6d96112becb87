//! Pure keypoint geometry: joint angles, centroids, vector lengths.

use crate::frame::{HandFrame, Landmark, INDEX_MCP, PINKY_MCP, WRIST};

/// Rays shorter than this are treated as coincident points.
const MIN_RAY_LEN: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl From<&Landmark> for Point2 {
    fn from(l: &Landmark) -> Self {
        Self { x: l.x, y: l.y }
    }
}

/// Angle in degrees at `vertex` between the rays `vertex→p1` and `vertex→p2`, in `[0, 180]`.
///
/// Returns `None` when either ray has zero length or any coordinate is non-finite; callers
/// treat that as "ambiguous". The result is symmetric in `p1` and `p2`.
pub fn angle(p1: Point2, vertex: Point2, p2: Point2) -> Option<f32> {
    let (ax, ay) = (p1.x - vertex.x, p1.y - vertex.y);
    let (bx, by) = (p2.x - vertex.x, p2.y - vertex.y);
    let (la, lb) = (magnitude(ax, ay), magnitude(bx, by));
    if !la.is_finite() || !lb.is_finite() || la < MIN_RAY_LEN || lb < MIN_RAY_LEN {
        return None;
    }

    let radians = by.atan2(bx) - ay.atan2(ax);
    let deg = radians.to_degrees().abs();
    // reflect into [0, 180]
    let deg = if deg > 180.0 { 360.0 - deg } else { deg };
    Some(deg.clamp(0.0, 180.0))
}

/// Arithmetic mean of the points, `None` for an empty set.
pub fn centroid(points: &[Point2]) -> Option<Point2> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f32;
    let sx: f32 = points.iter().map(|p| p.x).sum();
    let sy: f32 = points.iter().map(|p| p.y).sum();
    Some(Point2 { x: sx / n, y: sy / n })
}

/// Palm center: mean of wrist, index MCP and pinky MCP.
///
/// This anchors the palm itself rather than the fingertip spread, so curling fingers during a
/// swipe does not move the tracked position.
pub fn palm_center(frame: &HandFrame) -> Option<Point2> {
    let kp = &frame.keypoints;
    let pts = [WRIST, INDEX_MCP, PINKY_MCP].map(|i| kp.get(i).map(Point2::from));
    match pts {
        [Some(a), Some(b), Some(c)] => centroid(&[a, b, c]),
        _ => None,
    }
}

pub fn magnitude(dx: f32, dy: f32) -> f32 {
    (dx * dx + dy * dy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f32, y: f32) -> Point2 {
        Point2 { x, y }
    }

    #[test]
    fn straight_line_is_180() {
        let a = angle(p(0.0, 0.0), p(1.0, 0.0), p(2.0, 0.0)).unwrap();
        assert!((a - 180.0).abs() < 1e-3, "got {a}");
    }

    #[test]
    fn right_angle() {
        let a = angle(p(1.0, 0.0), p(0.0, 0.0), p(0.0, 1.0)).unwrap();
        assert!((a - 90.0).abs() < 1e-3, "got {a}");
    }

    #[test]
    fn reflex_difference_is_folded() {
        // atan2 difference here is ~ -350°, folded to 10°
        let a = angle(p(-1.0, 0.0875), p(0.0, 0.0), p(-1.0, -0.0875)).unwrap();
        assert!(a < 11.0 && a > 9.0, "got {a}");
    }

    #[test]
    fn symmetric_in_outer_points() {
        let samples = [
            (p(0.1, 0.9), p(0.3, 0.4), p(0.8, 0.2)),
            (p(-1.0, 2.0), p(0.5, 0.5), p(3.0, -4.0)),
            (p(0.0, 1.0), p(0.0, 0.0), p(-1.0, -0.01)),
            (p(5.0, 5.0), p(1.0, 1.0), p(5.0, 5.1)),
        ];
        for (a, v, b) in samples {
            let l = angle(a, v, b).unwrap();
            let r = angle(b, v, a).unwrap();
            assert!((l - r).abs() < 1e-4, "{l} != {r}");
        }
    }

    #[test]
    fn coincident_points_are_ambiguous() {
        assert_eq!(angle(p(1.0, 1.0), p(1.0, 1.0), p(2.0, 2.0)), None);
        assert_eq!(angle(p(0.0, 0.0), p(1.0, 1.0), p(1.0, 1.0)), None);
        assert_eq!(angle(p(f32::NAN, 0.0), p(1.0, 1.0), p(2.0, 2.0)), None);
    }

    #[test]
    fn centroid_of_points() {
        assert_eq!(centroid(&[]), None);
        let c = centroid(&[p(0.0, 0.0), p(1.0, 0.0), p(0.5, 3.0)]).unwrap();
        assert!((c.x - 0.5).abs() < 1e-6);
        assert!((c.y - 1.0).abs() < 1e-6);
    }
}
