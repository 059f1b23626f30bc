use tracing::debug;

use super::{Action, ModeController};
use crate::{
    config::MappingConfig,
    geometry::{map_to_screen, Point, Rect},
    gesture::{GestureEvent, GestureKind},
    landmark::{hand, CoordinateSpace, LandmarkId, SmoothedFrame},
};

/// Drives the pointer from the index fingertip. Clicks are edge-triggered on
/// pinch activation, so a held pinch clicks once.
#[derive(Debug, Clone)]
pub struct MouseController {
    cursor: LandmarkId,
    source: Rect,
    screen: Rect,
    pinch_was_active: bool,
    last_position: Option<Point>,
}

impl MouseController {
    /// `space` is the tracker's coordinate convention; the mapping source is
    /// scaled into it.
    pub fn new(mapping: &MappingConfig, space: CoordinateSpace) -> Self {
        Self {
            cursor: hand::INDEX_TIP,
            source: space.from_unit_rect(mapping.source),
            screen: mapping.screen,
            pinch_was_active: false,
            last_position: None,
        }
    }

    /// Last screen position the pointer was moved to.
    pub fn last_position(&self) -> Option<Point> {
        self.last_position
    }
}

impl ModeController for MouseController {
    fn name(&self) -> &'static str {
        "mouse"
    }

    fn process(&mut self, frame: &SmoothedFrame, gesture: &GestureEvent) -> Vec<Action> {
        let mut actions = Vec::with_capacity(2);

        if let Some(tip) = frame.point(self.cursor) {
            let position = map_to_screen(tip, self.source, self.screen);
            self.last_position = Some(position);
            actions.push(Action::Move {
                x: position.x,
                y: position.y,
            });
        }

        let pinching = gesture.is(GestureKind::Pinch);
        if pinching && !self.pinch_was_active {
            debug!(position = ?self.last_position, "click");
            actions.push(Action::Click);
        }
        self.pinch_was_active = pinching;

        actions
    }

    fn reset(&mut self) {
        self.pinch_was_active = false;
        self.last_position = None;
    }
}
