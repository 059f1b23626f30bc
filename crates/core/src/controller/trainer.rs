use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use super::{Action, ModeController};
use crate::{
    config::ExerciseConfig,
    geometry::joint_angle,
    gesture::GestureEvent,
    landmark::SmoothedFrame,
    record::LogRecord,
};

/// Phase of a repetition at a given frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// Limb extended: angle at or above the upper threshold.
    Down,
    /// Limb flexed: angle at or below the lower threshold.
    Up,
    Transitioning,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Down => "Down",
            Self::Up => "Up",
            Self::Transitioning => "Transitioning",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RepState {
    pub stage: Stage,
    pub reps: u32,
    /// Angle of the last frame that updated the state.
    pub last_angle: Option<f32>,
}

impl Default for RepState {
    fn default() -> Self {
        Self {
            stage: Stage::Transitioning,
            reps: 0,
            last_angle: None,
        }
    }
}

/// Progress through the current Down → Up → Down cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cycle {
    /// Nothing seen yet that starts a cycle.
    Unarmed,
    /// Reached Down; waiting for Up.
    Extended,
    /// Reached Up after Down; the next Down completes the rep.
    Flexed,
}

/// Threshold state machine counting full extend-flex-extend cycles.
#[derive(Debug, Clone)]
pub struct RepCounter {
    upper: f32,
    lower: f32,
    state: RepState,
    cycle: Cycle,
}

impl RepCounter {
    pub fn new(upper: f32, lower: f32) -> Self {
        Self {
            upper,
            lower,
            state: RepState::default(),
            cycle: Cycle::Unarmed,
        }
    }

    pub fn state(&self) -> &RepState {
        &self.state
    }

    fn stage_for(&self, angle: f32) -> Stage {
        if angle >= self.upper {
            Stage::Down
        } else if angle <= self.lower {
            Stage::Up
        } else {
            Stage::Transitioning
        }
    }

    /// Feeds one measured angle. Returns the new total when it completed a rep.
    pub fn update(&mut self, angle: f32) -> Option<u32> {
        let stage = self.stage_for(angle);
        let mut completed = None;

        match stage {
            Stage::Down => {
                if self.cycle == Cycle::Flexed {
                    self.state.reps += 1;
                    completed = Some(self.state.reps);
                }
                self.cycle = Cycle::Extended;
            }
            Stage::Up => {
                if self.cycle == Cycle::Extended {
                    self.cycle = Cycle::Flexed;
                }
            }
            Stage::Transitioning => {}
        }

        if stage != self.state.stage {
            debug!(from = %self.state.stage, to = %stage, angle, "stage change");
        }
        self.state.stage = stage;
        self.state.last_angle = Some(angle);
        completed
    }

    pub fn reset(&mut self) {
        self.state = RepState::default();
        self.cycle = Cycle::Unarmed;
    }
}

/// Counts repetitions of one exercise and emits a log record per measured frame.
#[derive(Debug, Clone)]
pub struct TrainerController {
    exercise: ExerciseConfig,
    counter: RepCounter,
}

impl TrainerController {
    pub fn new(exercise: ExerciseConfig) -> Self {
        let counter = RepCounter::new(exercise.upper_threshold, exercise.lower_threshold);
        Self { exercise, counter }
    }

    pub fn exercise(&self) -> &ExerciseConfig {
        &self.exercise
    }

    pub fn state(&self) -> &RepState {
        self.counter.state()
    }
}

impl ModeController for TrainerController {
    fn name(&self) -> &'static str {
        "trainer"
    }

    fn process(&mut self, frame: &SmoothedFrame, _gesture: &GestureEvent) -> Vec<Action> {
        let Some(angle) = joint_angle(frame, self.exercise.joint) else {
            trace!(timestamp = frame.timestamp, "joint not visible, frame skipped");
            return Vec::new();
        };

        let mut actions = Vec::with_capacity(2);
        if let Some(reps) = self.counter.update(angle) {
            info!(exercise = %self.exercise.name, reps, "repetition completed");
            actions.push(Action::RepCompleted { reps });
        }

        let state = self.counter.state();
        actions.push(Action::Log {
            record: LogRecord {
                timestamp: frame.timestamp,
                joint_angle: angle,
                rep_count: state.reps,
                stage: state.stage,
            },
        });
        actions
    }

    fn reset(&mut self) {
        self.counter.reset();
    }
}
