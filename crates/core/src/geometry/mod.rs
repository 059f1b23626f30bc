//! Stateless measurements derived from a [`SmoothedFrame`].
//!
//! Every frame-level measurement is optional: `None` means the landmarks it
//! needs were absent or not visible, and callers skip the frame instead of
//! treating it as a fault.

use serde::{Deserialize, Serialize};

use crate::{
    config::JointTriplet,
    landmark::{hand, Handedness, LandmarkId, SmoothedFrame},
};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn to(self, other: Point) -> (f32, f32) {
        (other.x - self.x, other.y - self.y)
    }
}

/// Axis-aligned rectangle, `min` inclusive and `max` inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Rect {
    pub const fn new(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.width() > 0.0 && self.height() > 0.0)
    }

    pub fn contains(&self, point: Point) -> bool {
        (self.min_x..=self.max_x).contains(&point.x) && (self.min_y..=self.max_y).contains(&point.y)
    }

    pub fn clamp(&self, point: Point) -> Point {
        Point::new(
            point.x.clamp(self.min_x, self.max_x),
            point.y.clamp(self.min_y, self.max_y),
        )
    }
}

/// Euclidean distance between two points.
pub fn distance(p: Point, q: Point) -> f32 {
    let (dx, dy) = p.to(q);
    (dx * dx + dy * dy).sqrt()
}

/// Angle in degrees, within `[0, 360)`, swept from ray `b→a` to ray `b→c`.
pub fn directed_angle(a: Point, b: Point, c: Point) -> f32 {
    let (ux, uy) = b.to(a);
    let (vx, vy) = b.to(c);
    let cross = ux * vy - uy * vx;
    let dot = ux * vx + uy * vy;

    let mut degrees = cross.atan2(dot).to_degrees();
    if degrees < 0.0 {
        degrees += 360.0;
    }
    if degrees >= 360.0 {
        degrees -= 360.0;
    }
    degrees
}

/// Interior angle at `b` in degrees, within `[0, 180]`.
///
/// This is [`directed_angle`] with reflex values folded back (`360 - x`), which
/// makes it independent of the order of `a` and `c`. Coincident points yield 0.
pub fn angle(a: Point, b: Point, c: Point) -> f32 {
    let (ux, uy) = b.to(a);
    let (vx, vy) = b.to(c);
    let cross = ux * vy - uy * vx;
    let dot = ux * vx + uy * vy;
    cross.abs().atan2(dot).to_degrees()
}

/// Linearly remaps `point` from `source` into `dest`, clamping the result so
/// it never leaves `dest`.
pub fn map_to_screen(point: Point, source: Rect, dest: Rect) -> Point {
    let normalise = |value: f32, min: f32, extent: f32| {
        if extent.abs() <= f32::EPSILON {
            0.0
        } else {
            (value - min) / extent
        }
    };

    let tx = normalise(point.x, source.min_x, source.width());
    let ty = normalise(point.y, source.min_y, source.height());
    dest.clamp(Point::new(
        dest.min_x + tx * dest.width(),
        dest.min_y + ty * dest.height(),
    ))
}

/// Angle at the triplet's vertex, if all three landmarks are visible and the
/// limb segments have non-zero length.
pub fn joint_angle(frame: &SmoothedFrame, joint: JointTriplet) -> Option<f32> {
    let a = frame.point(joint.first)?;
    let b = frame.point(joint.vertex)?;
    let c = frame.point(joint.last)?;

    if distance(a, b) <= f32::EPSILON || distance(c, b) <= f32::EPSILON {
        return None;
    }
    Some(angle(a, b, c))
}

/// Axis-aligned bounds of every visible landmark.
pub fn bounding_box(frame: &SmoothedFrame) -> Option<Rect> {
    frame.visible().fold(None, |bounds, landmark| {
        let p = landmark.point();
        Some(match bounds {
            None => Rect::new(p.x, p.y, p.x, p.y),
            Some(r) => Rect::new(
                r.min_x.min(p.x),
                r.min_y.min(p.y),
                r.max_x.max(p.x),
                r.max_y.max(p.y),
            ),
        })
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const ALL: [Finger; 5] = [
        Finger::Thumb,
        Finger::Index,
        Finger::Middle,
        Finger::Ring,
        Finger::Pinky,
    ];
}

/// Up/down state of each finger, thumb first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FingerStates(pub [bool; 5]);

impl FingerStates {
    pub fn is_up(&self, finger: Finger) -> bool {
        self.0[finger as usize]
    }

    /// Number of raised fingers, thumb included.
    pub fn count(&self) -> usize {
        self.0.iter().filter(|up| **up).count()
    }

    /// True when exactly the given fingers (ignoring the thumb) are raised.
    pub fn only(&self, raised: &[Finger]) -> bool {
        Finger::ALL[1..]
            .iter()
            .all(|finger| self.is_up(*finger) == raised.contains(finger))
    }
}

/// Which fingers are raised. Image y grows downwards, so a finger is up when
/// its tip sits above its PIP joint. The thumb is judged sideways against its
/// IP joint, mirrored by handedness, and counts as down while occluded.
///
/// `None` only when one of the index..pinky landmarks is unavailable.
pub fn finger_states(frame: &SmoothedFrame, handedness: Option<Handedness>) -> Option<FingerStates> {
    let mut states = [false; 5];

    if let (Some(tip), Some(ip)) = (frame.point(hand::THUMB_TIP), frame.point(hand::THUMB_IP)) {
        states[0] = match handedness {
            Some(Handedness::Right) => tip.x < ip.x,
            _ => tip.x > ip.x,
        };
    }

    for (slot, tip_id) in hand::TIPS.iter().enumerate().skip(1) {
        let tip = frame.point(*tip_id)?;
        let pip = frame.point(tip_id - 2)?;
        states[slot] = tip.y < pip.y;
    }

    Some(FingerStates(states))
}

/// Named measurements for a single frame. `None` marks a measurement whose
/// landmarks were unavailable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeometryResult {
    /// Cursor landmark position in camera space.
    pub cursor: Option<Point>,
    pub pinch_distance: Option<f32>,
    pub joint_angle: Option<f32>,
    pub fingers: Option<FingerStates>,
    pub bounds: Option<Rect>,
}

/// Which landmarks feed each measurement.
#[derive(Debug, Clone)]
pub struct GeometryEngine {
    cursor: LandmarkId,
    pinch: (LandmarkId, LandmarkId),
    joint: Option<JointTriplet>,
}

impl Default for GeometryEngine {
    fn default() -> Self {
        Self {
            cursor: hand::INDEX_TIP,
            pinch: (hand::THUMB_TIP, hand::INDEX_TIP),
            joint: None,
        }
    }
}

impl GeometryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also measure the angle at `joint` on every frame.
    pub fn with_joint(mut self, joint: JointTriplet) -> Self {
        self.joint = Some(joint);
        self
    }

    pub fn measure(&self, frame: &SmoothedFrame) -> GeometryResult {
        let (thumb, index) = self.pinch;
        let pinch_distance = frame
            .point(thumb)
            .zip(frame.point(index))
            .map(|(p, q)| distance(p, q));

        GeometryResult {
            cursor: frame.point(self.cursor),
            pinch_distance,
            joint_angle: self.joint.and_then(|joint| joint_angle(frame, joint)),
            fingers: finger_states(frame, frame.handedness),
            bounds: bounding_box(frame),
        }
    }
}
