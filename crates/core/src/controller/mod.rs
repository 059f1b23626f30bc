//! Mode controllers. Exactly one runs per session; each turns smoothed frames
//! and gesture events into [`Action`]s for the host.

mod mouse;
mod painter;
mod trainer;

use serde::{Deserialize, Serialize};

pub use mouse::MouseController;
pub use painter::{PainterController, Stroke};
pub use trainer::{RepCounter, RepState, Stage, TrainerController};

use crate::{
    geometry::Point, gesture::GestureEvent, landmark::SmoothedFrame, record::LogRecord,
    PilotConfig,
};

/// Output of a mode controller for the external collaborators (input
/// injection, canvas rendering, session log).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Move the pointer to screen coordinates.
    Move { x: f32, y: f32 },
    Click,
    /// A new segment was appended to the open stroke.
    StrokeSegment {
        from: Point,
        to: Point,
        color: [u8; 3],
        thickness: f32,
        erase: bool,
    },
    /// The open stroke was finished and can no longer change.
    StrokeSealed { stroke: Stroke },
    /// Every sealed stroke was discarded.
    ClearCanvas,
    BrushSelected { name: String },
    RepCompleted { reps: u32 },
    Log { record: LogRecord },
}

/// Per-frame contract shared by every mode.
pub trait ModeController {
    fn name(&self) -> &'static str;

    fn process(&mut self, frame: &SmoothedFrame, gesture: &GestureEvent) -> Vec<Action>;

    /// Returns the controller to its session-start state.
    fn reset(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeKind {
    Mouse,
    Painter,
    Trainer,
}

/// The controller selected for a session.
#[derive(Debug, Clone)]
pub enum Mode {
    Mouse(MouseController),
    Painter(PainterController),
    Trainer(TrainerController),
}

impl Mode {
    pub fn from_config(kind: ModeKind, config: &PilotConfig) -> Self {
        match kind {
            ModeKind::Mouse => Self::Mouse(MouseController::new(
                &config.mapping,
                config.coordinate_space,
            )),
            ModeKind::Painter => Self::Painter(PainterController::new(
                &config.painter,
                config.coordinate_space.bounds(),
            )),
            ModeKind::Trainer => Self::Trainer(TrainerController::new(config.exercise.clone())),
        }
    }

    pub fn kind(&self) -> ModeKind {
        match self {
            Self::Mouse(_) => ModeKind::Mouse,
            Self::Painter(_) => ModeKind::Painter,
            Self::Trainer(_) => ModeKind::Trainer,
        }
    }

    fn controller(&mut self) -> &mut dyn ModeController {
        match self {
            Self::Mouse(controller) => controller,
            Self::Painter(controller) => controller,
            Self::Trainer(controller) => controller,
        }
    }
}

impl ModeController for Mode {
    fn name(&self) -> &'static str {
        match self {
            Self::Mouse(controller) => controller.name(),
            Self::Painter(controller) => controller.name(),
            Self::Trainer(controller) => controller.name(),
        }
    }

    fn process(&mut self, frame: &SmoothedFrame, gesture: &GestureEvent) -> Vec<Action> {
        self.controller().process(frame, gesture)
    }

    fn reset(&mut self) {
        self.controller().reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_controller_by_kind() {
        let config = PilotConfig::default();
        for kind in [ModeKind::Mouse, ModeKind::Painter, ModeKind::Trainer] {
            let mode = Mode::from_config(kind, &config);
            assert_eq!(mode.kind(), kind);
        }
        assert_eq!(Mode::from_config(ModeKind::Trainer, &config).name(), "trainer");
    }

    #[test]
    fn actions_serialise_with_tag() {
        let json = serde_json::to_string(&Action::Move { x: 1.0, y: 2.0 }).unwrap();
        assert_eq!(json, r#"{"action":"move","x":1.0,"y":2.0}"#);
        let json = serde_json::to_string(&Action::Click).unwrap();
        assert_eq!(json, r#"{"action":"click"}"#);
    }
}
