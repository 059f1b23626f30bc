//! Gesture classification with per-gesture hysteresis.
//!
//! A gesture activates only after its condition has held for `enter_frames`
//! consecutive frames and releases only after it has failed for
//! `release_frames` consecutive frames. Frames where the condition cannot be
//! evaluated leave the counters untouched.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    config::GestureConfig,
    geometry::{Finger, GeometryResult},
    landmark::CoordinateSpace,
};

/// Recognised hand gestures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GestureKind {
    /// Thumb and index fingertips close together.
    Pinch,
    /// Index finger raised, other fingers curled.
    Point,
    /// Index through pinky curled.
    Fist,
    /// Index and middle fingers raised.
    Hover,
}

impl GestureKind {
    /// Reporting order when more than one gesture is active.
    pub const PRIORITY: [GestureKind; 4] = [
        GestureKind::Pinch,
        GestureKind::Fist,
        GestureKind::Point,
        GestureKind::Hover,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pinch => "pinch",
            Self::Point => "point",
            Self::Fist => "fist",
            Self::Hover => "hover",
        }
    }
}

/// Classifier output for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GestureEvent {
    None,
    Active {
        kind: GestureKind,
        /// Frames since the gesture activated, the activating frame being 1.
        held_frames: u32,
    },
}

impl Default for GestureEvent {
    fn default() -> Self {
        Self::None
    }
}

impl GestureEvent {
    pub fn kind(&self) -> Option<GestureKind> {
        match self {
            Self::None => None,
            Self::Active { kind, .. } => Some(*kind),
        }
    }

    pub fn is(&self, kind: GestureKind) -> bool {
        self.kind() == Some(kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HysteresisState {
    Idle,
    Active,
}

/// Consecutive-frame debouncer for a single boolean condition.
#[derive(Debug, Clone)]
pub struct Hysteresis {
    enter_frames: u32,
    release_frames: u32,
    state: HysteresisState,
    /// Consecutive frames pushing towards the other state.
    streak: u32,
    held_frames: u32,
}

impl Hysteresis {
    pub fn new(enter_frames: u32, release_frames: u32) -> Self {
        Self {
            enter_frames: enter_frames.max(1),
            release_frames: release_frames.max(1),
            state: HysteresisState::Idle,
            streak: 0,
            held_frames: 0,
        }
    }

    pub fn state(&self) -> HysteresisState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == HysteresisState::Active
    }

    pub fn held_frames(&self) -> u32 {
        self.held_frames
    }

    /// Feeds one frame. `None` means the condition could not be evaluated.
    pub fn update(&mut self, condition: Option<bool>) -> HysteresisState {
        match (self.state, condition) {
            (HysteresisState::Idle, Some(true)) => {
                self.streak += 1;
                if self.streak >= self.enter_frames {
                    self.state = HysteresisState::Active;
                    self.streak = 0;
                    self.held_frames = 1;
                }
            }
            (HysteresisState::Idle, Some(false)) => self.streak = 0,
            (HysteresisState::Active, Some(false)) => {
                self.streak += 1;
                if self.streak >= self.release_frames {
                    self.state = HysteresisState::Idle;
                    self.streak = 0;
                    self.held_frames = 0;
                } else {
                    self.held_frames += 1;
                }
            }
            (HysteresisState::Active, Some(true)) => {
                self.streak = 0;
                self.held_frames += 1;
            }
            (HysteresisState::Active, None) => self.held_frames += 1,
            (HysteresisState::Idle, None) => {}
        }
        self.state
    }

    pub fn reset(&mut self) {
        self.state = HysteresisState::Idle;
        self.streak = 0;
        self.held_frames = 0;
    }
}

/// Maps geometry to gesture events. Owns one [`Hysteresis`] per gesture.
#[derive(Debug, Clone)]
pub struct GestureClassifier {
    pinch_threshold: f32,
    pinch: Hysteresis,
    point: Hysteresis,
    fist: Hysteresis,
    hover: Hysteresis,
}

impl GestureClassifier {
    /// The pinch threshold is scaled into `space`.
    pub fn new(config: &GestureConfig, space: CoordinateSpace) -> Self {
        let debouncer = || Hysteresis::new(config.enter_frames, config.release_frames);
        Self {
            pinch_threshold: space.from_unit_length(config.pinch_threshold),
            pinch: debouncer(),
            point: debouncer(),
            fist: debouncer(),
            hover: debouncer(),
        }
    }

    fn debouncer(&self, kind: GestureKind) -> &Hysteresis {
        match kind {
            GestureKind::Pinch => &self.pinch,
            GestureKind::Point => &self.point,
            GestureKind::Fist => &self.fist,
            GestureKind::Hover => &self.hover,
        }
    }

    fn debouncer_mut(&mut self, kind: GestureKind) -> &mut Hysteresis {
        match kind {
            GestureKind::Pinch => &mut self.pinch,
            GestureKind::Point => &mut self.point,
            GestureKind::Fist => &mut self.fist,
            GestureKind::Hover => &mut self.hover,
        }
    }

    fn condition(&self, kind: GestureKind, geometry: &GeometryResult) -> Option<bool> {
        match kind {
            GestureKind::Pinch => geometry
                .pinch_distance
                .map(|distance| distance < self.pinch_threshold),
            GestureKind::Point => geometry.fingers.map(|f| f.only(&[Finger::Index])),
            GestureKind::Fist => geometry.fingers.map(|f| f.only(&[])),
            GestureKind::Hover => geometry
                .fingers
                .map(|f| f.only(&[Finger::Index, Finger::Middle])),
        }
    }

    pub fn classify(&mut self, geometry: &GeometryResult) -> GestureEvent {
        for kind in GestureKind::PRIORITY {
            let condition = self.condition(kind, geometry);
            let debouncer = self.debouncer_mut(kind);
            let before = debouncer.state();
            let after = debouncer.update(condition);
            if before != after {
                debug!(gesture = kind.as_str(), state = ?after, "gesture transition");
            }
        }

        GestureKind::PRIORITY
            .iter()
            .map(|kind| (*kind, self.debouncer(*kind)))
            .find(|(_, debouncer)| debouncer.is_active())
            .map(|(kind, debouncer)| GestureEvent::Active {
                kind,
                held_frames: debouncer.held_frames(),
            })
            .unwrap_or(GestureEvent::None)
    }

    pub fn is_active(&self, kind: GestureKind) -> bool {
        self.debouncer(kind).is_active()
    }

    pub fn reset(&mut self) {
        for kind in GestureKind::PRIORITY {
            self.debouncer_mut(kind).reset();
        }
    }
}
