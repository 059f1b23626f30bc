//! Landmark frames as delivered by the external tracker, and their smoothed
//! counterparts produced by [`crate::Smoother`].

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect};

/// Stable identifier of a tracked anatomical point.
pub type LandmarkId = u32;

/// Hand landmark indices (21-point hand model).
pub mod hand {
    use super::LandmarkId;

    pub const THUMB_IP: LandmarkId = 3;
    pub const THUMB_TIP: LandmarkId = 4;
    pub const INDEX_PIP: LandmarkId = 6;
    pub const INDEX_TIP: LandmarkId = 8;
    pub const MIDDLE_PIP: LandmarkId = 10;
    pub const MIDDLE_TIP: LandmarkId = 12;
    pub const RING_PIP: LandmarkId = 14;
    pub const RING_TIP: LandmarkId = 16;
    pub const PINKY_PIP: LandmarkId = 18;
    pub const PINKY_TIP: LandmarkId = 20;

    /// Fingertips ordered thumb to pinky.
    pub const TIPS: [LandmarkId; 5] = [THUMB_TIP, INDEX_TIP, MIDDLE_TIP, RING_TIP, PINKY_TIP];
}

/// Body landmark indices (33-point pose model).
pub mod pose {
    use super::LandmarkId;

    pub const LEFT_SHOULDER: LandmarkId = 11;
    pub const RIGHT_SHOULDER: LandmarkId = 12;
    pub const LEFT_ELBOW: LandmarkId = 13;
    pub const RIGHT_ELBOW: LandmarkId = 14;
    pub const LEFT_WRIST: LandmarkId = 15;
    pub const RIGHT_WRIST: LandmarkId = 16;
    pub const LEFT_HIP: LandmarkId = 23;
    pub const RIGHT_HIP: LandmarkId = 24;
    pub const LEFT_KNEE: LandmarkId = 25;
    pub const RIGHT_KNEE: LandmarkId = 26;
    pub const LEFT_ANKLE: LandmarkId = 27;
    pub const RIGHT_ANKLE: LandmarkId = 28;
}

/// Which hand a frame was reported for. Only the thumb test depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Handedness {
    Left,
    Right,
}

/// Coordinate convention used by the tracker for a whole session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSpace {
    /// Coordinates in `[0, 1]`, origin top-left.
    Normalized,
    /// Pixel coordinates within a capture frame of the given size.
    Pixel { width: f32, height: f32 },
}

impl Default for CoordinateSpace {
    fn default() -> Self {
        Self::Normalized
    }
}

impl CoordinateSpace {
    /// Full extent of the capture frame in this space.
    pub fn bounds(&self) -> Rect {
        match *self {
            Self::Normalized => Rect::new(0.0, 0.0, 1.0, 1.0),
            Self::Pixel { width, height } => Rect::new(0.0, 0.0, width, height),
        }
    }

    /// Scales a region given as fractions of the capture frame into this space.
    pub fn from_unit_rect(&self, unit: Rect) -> Rect {
        let bounds = self.bounds();
        Rect::new(
            bounds.min_x + unit.min_x * bounds.width(),
            bounds.min_y + unit.min_y * bounds.height(),
            bounds.min_x + unit.max_x * bounds.width(),
            bounds.min_y + unit.max_y * bounds.height(),
        )
    }

    /// Scales a length given as a fraction of the frame width into this space.
    pub fn from_unit_length(&self, unit: f32) -> f32 {
        unit * self.bounds().width()
    }
}

fn full_visibility() -> f32 {
    1.0
}

/// A single raw landmark reported by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub id: LandmarkId,
    pub x: f32,
    pub y: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f32>,
    /// Detection confidence in `[0, 1]`. Trackers that do not report one are
    /// treated as fully visible.
    #[serde(default = "full_visibility")]
    pub visibility: f32,
}

impl Landmark {
    pub fn new(id: LandmarkId, x: f32, y: f32) -> Self {
        Self {
            id,
            x,
            y,
            z: None,
            visibility: 1.0,
        }
    }

    pub fn with_visibility(mut self, visibility: f32) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// One tracker output, produced once per captured image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    /// Seconds since the start of the session.
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handedness: Option<Handedness>,
    #[serde(default)]
    pub landmarks: Vec<Landmark>,
}

impl LandmarkFrame {
    pub fn new(timestamp: f64) -> Self {
        Self {
            timestamp,
            handedness: None,
            landmarks: Vec::new(),
        }
    }

    pub fn with_handedness(mut self, handedness: Handedness) -> Self {
        self.handedness = Some(handedness);
        self
    }

    pub fn with_landmark(mut self, landmark: Landmark) -> Self {
        self.landmarks.push(landmark);
        self
    }

    /// Convenience builder for a fully visible point.
    pub fn with_point(self, id: LandmarkId, x: f32, y: f32) -> Self {
        self.with_landmark(Landmark::new(id, x, y))
    }

    pub fn get(&self, id: LandmarkId) -> Option<&Landmark> {
        self.landmarks.iter().find(|landmark| landmark.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }
}

/// A landmark after temporal filtering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmoothedLandmark {
    pub id: LandmarkId,
    pub x: f32,
    pub y: f32,
    pub z: Option<f32>,
    pub visibility: f32,
    /// Whether the raw sample in this frame cleared the visibility threshold.
    /// Invisible landmarks carry their last-known-good position.
    pub visible: bool,
}

impl SmoothedLandmark {
    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Same shape as [`LandmarkFrame`] with filtered coordinates.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SmoothedFrame {
    pub timestamp: f64,
    pub handedness: Option<Handedness>,
    pub landmarks: Vec<SmoothedLandmark>,
}

impl SmoothedFrame {
    pub fn get(&self, id: LandmarkId) -> Option<&SmoothedLandmark> {
        self.landmarks.iter().find(|landmark| landmark.id == id)
    }

    /// Position of `id` if it is present and visible in this frame.
    pub fn point(&self, id: LandmarkId) -> Option<Point> {
        self.get(id)
            .filter(|landmark| landmark.visible)
            .map(SmoothedLandmark::point)
    }

    pub fn visible(&self) -> impl Iterator<Item = &SmoothedLandmark> {
        self.landmarks.iter().filter(|landmark| landmark.visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialises_tracker_json() {
        let json = r#"{"timestamp":0.5,"handedness":"Right",
            "landmarks":[{"id":8,"x":0.25,"y":0.75},{"id":4,"x":0.1,"y":0.2,"visibility":0.3}]}"#;
        let frame: LandmarkFrame = serde_json::from_str(json).unwrap();

        assert_eq!(frame.handedness, Some(Handedness::Right));
        assert_eq!(frame.get(8).unwrap().visibility, 1.0);
        assert_eq!(frame.get(4).unwrap().visibility, 0.3);
        assert!(frame.get(12).is_none());
    }

    #[test]
    fn invisible_landmarks_have_no_point() {
        let frame = SmoothedFrame {
            timestamp: 0.0,
            handedness: None,
            landmarks: vec![
                SmoothedLandmark {
                    id: 1,
                    x: 1.0,
                    y: 2.0,
                    z: None,
                    visibility: 0.9,
                    visible: true,
                },
                SmoothedLandmark {
                    id: 2,
                    x: 3.0,
                    y: 4.0,
                    z: None,
                    visibility: 0.1,
                    visible: false,
                },
            ],
        };

        assert_eq!(frame.point(1), Some(Point::new(1.0, 2.0)));
        assert_eq!(frame.point(2), None);
        assert_eq!(frame.visible().count(), 1);
    }

    #[test]
    fn pixel_space_bounds_match_capture_size() {
        let space = CoordinateSpace::Pixel {
            width: 1280.0,
            height: 720.0,
        };
        assert_eq!(space.bounds(), Rect::new(0.0, 0.0, 1280.0, 720.0));
    }

    #[test]
    fn unit_regions_scale_with_the_frame() {
        let unit = Rect::new(0.1, 0.1, 0.9, 0.9);
        assert_eq!(CoordinateSpace::Normalized.from_unit_rect(unit), unit);

        let pixels = CoordinateSpace::Pixel {
            width: 1000.0,
            height: 500.0,
        };
        assert_eq!(pixels.from_unit_rect(unit), Rect::new(100.0, 50.0, 900.0, 450.0));
        assert_eq!(pixels.from_unit_length(0.05), 50.0);
    }
}
