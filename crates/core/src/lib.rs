//! Core library for Landmark Pilot.
//!
//! Interprets a stream of body and hand landmarks from an external tracker.
//! Each frame flows through a fixed pipeline: smoothing, geometry, gesture
//! classification and one mode controller (mouse, painter or trainer). The
//! trainer's per-frame log is buffered by a [`SessionRecorder`] until the host
//! flushes it.

pub mod config;
pub mod controller;
pub mod error;
pub mod geometry;
pub mod gesture;
pub mod landmark;
pub mod record;
pub mod session;
pub mod smoothing;

pub use config::{
    ExerciseConfig, GestureConfig, JointTriplet, MappingConfig, PainterConfig, PilotConfig,
    SmoothingConfig, SmoothingMode, Swatch,
};
pub use controller::{
    Action, Mode, ModeController, ModeKind, MouseController, PainterController, RepCounter,
    RepState, Stage, Stroke, TrainerController,
};
pub use error::{PilotError, Result};
pub use geometry::{
    angle, directed_angle, distance, map_to_screen, FingerStates, GeometryEngine, GeometryResult,
    Point, Rect,
};
pub use gesture::{GestureClassifier, GestureEvent, GestureKind, Hysteresis};
pub use landmark::{
    CoordinateSpace, Handedness, Landmark, LandmarkFrame, LandmarkId, SmoothedFrame,
    SmoothedLandmark,
};
pub use record::{
    CsvSink, JsonLinesSink, LogFormat, LogRecord, MemorySink, RecordSink, RecordingSettings,
    SessionRecorder,
};
pub use session::Session;
pub use smoothing::Smoother;
