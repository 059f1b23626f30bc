use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    geometry::{Point, Rect},
    landmark::{pose, CoordinateSpace, LandmarkId},
    record::RecordingSettings,
    PilotError, Result,
};

/// Top-level configuration structure for a session. Static once the session
/// has started.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PilotConfig {
    pub coordinate_space: CoordinateSpace,
    /// Landmarks reported below this confidence are treated as missing.
    pub min_visibility: f32,
    pub smoothing: SmoothingConfig,
    pub gesture: GestureConfig,
    pub mapping: MappingConfig,
    pub painter: PainterConfig,
    pub exercise: ExerciseConfig,
    pub recording: RecordingSettings,
}

impl Default for PilotConfig {
    fn default() -> Self {
        Self {
            coordinate_space: CoordinateSpace::Normalized,
            min_visibility: 0.5,
            smoothing: SmoothingConfig::default(),
            gesture: GestureConfig::default(),
            mapping: MappingConfig::default(),
            painter: PainterConfig::default(),
            exercise: ExerciseConfig::bicep_curl(),
            recording: RecordingSettings::default(),
        }
    }
}

impl PilotConfig {
    /// Parses a JSON document. Missing sections fall back to their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Rejects configurations the pipeline cannot run with. Called by
    /// [`crate::Session::new`] before any frame is processed.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_visibility) {
            return Err(PilotError::config(format!(
                "min_visibility must be within [0, 1], got {}",
                self.min_visibility
            )));
        }
        if let CoordinateSpace::Pixel { width, height } = self.coordinate_space {
            if width <= 0.0 || height <= 0.0 {
                return Err(PilotError::config("pixel space needs a positive frame size"));
            }
        }
        self.smoothing.validate()?;
        self.gesture.validate()?;
        self.mapping.validate()?;
        self.painter.validate()?;
        self.exercise.validate()
    }
}

/// Weighting applied across the smoothing window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SmoothingMode {
    /// Every sample in the window weighs the same.
    Moving,
    /// Sample weights decay by `1 - alpha` per frame of age.
    Exponential { alpha: f32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Number of past visible samples kept per landmark (K).
    pub window: usize,
    pub mode: SmoothingMode,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            window: 5,
            mode: SmoothingMode::Moving,
        }
    }
}

impl SmoothingConfig {
    fn validate(&self) -> Result<()> {
        if self.window == 0 {
            return Err(PilotError::config("smoothing window must hold at least one frame"));
        }
        if let SmoothingMode::Exponential { alpha } = self.mode {
            if !(alpha > 0.0 && alpha <= 1.0) {
                return Err(PilotError::config(format!(
                    "exponential smoothing alpha must be within (0, 1], got {alpha}"
                )));
            }
        }
        Ok(())
    }
}

/// Thresholds and debounce counts for the gesture classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Thumb-to-index distance below which a pinch is considered held, as a
    /// fraction of the capture frame width.
    pub pinch_threshold: f32,
    /// Consecutive frames a condition must hold before a gesture activates (N).
    pub enter_frames: u32,
    /// Consecutive frames a condition must fail before a gesture releases (M).
    pub release_frames: u32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            pinch_threshold: 0.05,
            enter_frames: 3,
            release_frames: 3,
        }
    }
}

impl GestureConfig {
    fn validate(&self) -> Result<()> {
        if self.pinch_threshold <= 0.0 {
            return Err(PilotError::config("pinch threshold must be positive"));
        }
        if self.enter_frames == 0 || self.release_frames == 0 {
            return Err(PilotError::config("hysteresis frame counts must be at least one"));
        }
        Ok(())
    }
}

/// Camera-to-screen mapping used by the mouse controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    /// Active region as fractions of the capture frame, whatever the
    /// coordinate space. Points outside it pin to the screen edge.
    pub source: Rect,
    /// Destination screen region in pixels.
    pub screen: Rect,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            source: Rect::new(0.1, 0.1, 0.9, 0.9),
            screen: Rect::new(0.0, 0.0, 1920.0, 1080.0),
        }
    }
}

impl MappingConfig {
    fn validate(&self) -> Result<()> {
        if self.source.is_degenerate() {
            return Err(PilotError::config("mapping source region is empty"));
        }
        let unit = Rect::new(0.0, 0.0, 1.0, 1.0);
        let corners = [
            Point::new(self.source.min_x, self.source.min_y),
            Point::new(self.source.max_x, self.source.max_y),
        ];
        if !corners.iter().all(|corner| unit.contains(*corner)) {
            return Err(PilotError::config(
                "mapping source must be given as fractions of the capture frame",
            ));
        }
        if self.screen.is_degenerate() {
            return Err(PilotError::config("mapping screen region is empty"));
        }
        Ok(())
    }
}

/// A palette entry shown in the painter header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Swatch {
    pub name: String,
    pub color: [u8; 3],
    #[serde(default)]
    pub eraser: bool,
}

impl Swatch {
    pub fn paint(name: &str, color: [u8; 3]) -> Self {
        Self {
            name: name.to_string(),
            color,
            eraser: false,
        }
    }

    pub fn eraser() -> Self {
        Self {
            name: "Eraser".to_string(),
            color: [0, 0, 0],
            eraser: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PainterConfig {
    /// Canvas region the whole capture frame maps onto.
    pub canvas: Rect,
    /// Height of the palette band at the top of the canvas.
    pub header_height: f32,
    pub palette: Vec<Swatch>,
    pub brush_thickness: f32,
    pub eraser_thickness: f32,
}

impl Default for PainterConfig {
    fn default() -> Self {
        Self {
            canvas: Rect::new(0.0, 0.0, 1280.0, 720.0),
            header_height: 125.0,
            palette: vec![
                Swatch::paint("Magenta", [255, 0, 255]),
                Swatch::paint("Blue", [0, 0, 255]),
                Swatch::paint("Green", [0, 255, 0]),
                Swatch::eraser(),
            ],
            brush_thickness: 15.0,
            eraser_thickness: 50.0,
        }
    }
}

impl PainterConfig {
    fn validate(&self) -> Result<()> {
        if self.canvas.is_degenerate() {
            return Err(PilotError::config("painter canvas is empty"));
        }
        if self.palette.is_empty() {
            return Err(PilotError::config("painter palette needs at least one swatch"));
        }
        if self.header_height < 0.0 || self.header_height > self.canvas.height() {
            return Err(PilotError::config("painter header must fit inside the canvas"));
        }
        if self.brush_thickness <= 0.0 || self.eraser_thickness <= 0.0 {
            return Err(PilotError::config("brush thickness must be positive"));
        }
        Ok(())
    }
}

/// Three landmarks whose angle at `vertex` is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JointTriplet {
    pub first: LandmarkId,
    pub vertex: LandmarkId,
    pub last: LandmarkId,
}

impl JointTriplet {
    pub const fn new(first: LandmarkId, vertex: LandmarkId, last: LandmarkId) -> Self {
        Self {
            first,
            vertex,
            last,
        }
    }
}

/// Per-exercise joint selection and stage thresholds, in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseConfig {
    pub name: String,
    pub joint: JointTriplet,
    /// At or above this angle the limb counts as extended (`Down`).
    pub upper_threshold: f32,
    /// At or below this angle the limb counts as flexed (`Up`).
    pub lower_threshold: f32,
}

impl Default for ExerciseConfig {
    fn default() -> Self {
        Self::bicep_curl()
    }
}

impl ExerciseConfig {
    pub fn bicep_curl() -> Self {
        Self {
            name: "bicep-curl".to_string(),
            joint: JointTriplet::new(pose::RIGHT_SHOULDER, pose::RIGHT_ELBOW, pose::RIGHT_WRIST),
            upper_threshold: 160.0,
            lower_threshold: 30.0,
        }
    }

    pub fn squat() -> Self {
        Self {
            name: "squat".to_string(),
            joint: JointTriplet::new(pose::RIGHT_HIP, pose::RIGHT_KNEE, pose::RIGHT_ANKLE),
            upper_threshold: 160.0,
            lower_threshold: 90.0,
        }
    }

    pub fn push_up() -> Self {
        Self {
            name: "push-up".to_string(),
            joint: JointTriplet::new(pose::RIGHT_SHOULDER, pose::RIGHT_ELBOW, pose::RIGHT_WRIST),
            upper_threshold: 160.0,
            lower_threshold: 90.0,
        }
    }

    /// Built-in exercises, in the order the CLI lists them.
    pub fn presets() -> Vec<Self> {
        vec![Self::bicep_curl(), Self::squat(), Self::push_up()]
    }

    pub fn preset(name: &str) -> Option<Self> {
        Self::presets()
            .into_iter()
            .find(|exercise| exercise.name.eq_ignore_ascii_case(name))
    }

    fn validate(&self) -> Result<()> {
        let in_range = |angle: f32| (0.0..=180.0).contains(&angle);
        if !in_range(self.lower_threshold) || !in_range(self.upper_threshold) {
            return Err(PilotError::config(format!(
                "exercise `{}` thresholds must lie within [0, 180] degrees",
                self.name
            )));
        }
        if self.lower_threshold >= self.upper_threshold {
            return Err(PilotError::config(format!(
                "exercise `{}` lower threshold {} must be below upper threshold {}",
                self.name, self.lower_threshold, self.upper_threshold
            )));
        }
        let JointTriplet {
            first,
            vertex,
            last,
        } = self.joint;
        if first == vertex || vertex == last || first == last {
            return Err(PilotError::config(format!(
                "exercise `{}` joint needs three distinct landmarks",
                self.name
            )));
        }
        Ok(())
    }
}
