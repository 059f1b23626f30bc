use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Action, ModeController};
use crate::{
    config::{PainterConfig, Swatch},
    geometry::{map_to_screen, Point, Rect},
    gesture::{GestureEvent, GestureKind},
    landmark::{hand, LandmarkId, SmoothedFrame},
};

/// An ordered run of canvas points drawn with one brush.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub points: Vec<Point>,
    pub color: [u8; 3],
    pub thickness: f32,
    pub erase: bool,
}

/// Freehand drawing. Point draws, releasing it seals the stroke, a fist
/// clears the canvas and hovering over the header picks a swatch.
#[derive(Debug, Clone)]
pub struct PainterController {
    cursor: LandmarkId,
    source: Rect,
    canvas: Rect,
    header_height: f32,
    palette: Vec<Swatch>,
    brush_thickness: f32,
    eraser_thickness: f32,
    brush: usize,
    open: Option<Stroke>,
    sealed: Vec<Stroke>,
    fist_was_active: bool,
}

impl PainterController {
    /// `source` is the extent of the capture frame in tracker coordinates.
    pub fn new(config: &PainterConfig, source: Rect) -> Self {
        Self {
            cursor: hand::INDEX_TIP,
            source,
            canvas: config.canvas,
            header_height: config.header_height,
            palette: config.palette.clone(),
            brush_thickness: config.brush_thickness,
            eraser_thickness: config.eraser_thickness,
            brush: 0,
            open: None,
            sealed: Vec::new(),
            fist_was_active: false,
        }
    }

    pub fn sealed(&self) -> &[Stroke] {
        &self.sealed
    }

    pub fn open_stroke(&self) -> Option<&Stroke> {
        self.open.as_ref()
    }

    pub fn brush(&self) -> Option<&Swatch> {
        self.palette.get(self.brush)
    }

    fn swatch_at(&self, position: Point) -> Option<usize> {
        if self.palette.is_empty() || position.y > self.canvas.min_y + self.header_height {
            return None;
        }
        let width = self.canvas.width() / self.palette.len() as f32;
        let index = ((position.x - self.canvas.min_x) / width).floor();
        Some((index.max(0.0) as usize).min(self.palette.len() - 1))
    }

    fn extend_stroke(&mut self, position: Point, actions: &mut Vec<Action>) {
        if self.open.is_none() {
            let (color, erase) = self
                .palette
                .get(self.brush)
                .map(|swatch| (swatch.color, swatch.eraser))
                .unwrap_or(([255, 255, 255], false));
            let thickness = if erase {
                self.eraser_thickness
            } else {
                self.brush_thickness
            };
            self.open = Some(Stroke {
                points: vec![position],
                color,
                thickness,
                erase,
            });
            return;
        }

        let Some(stroke) = self.open.as_mut() else {
            return;
        };
        let Some(&from) = stroke.points.last() else {
            stroke.points.push(position);
            return;
        };
        if from == position {
            return;
        }
        stroke.points.push(position);
        actions.push(Action::StrokeSegment {
            from,
            to: position,
            color: stroke.color,
            thickness: stroke.thickness,
            erase: stroke.erase,
        });
    }

    fn seal(&mut self, actions: &mut Vec<Action>) {
        if let Some(stroke) = self.open.take() {
            debug!(points = stroke.points.len(), "stroke sealed");
            actions.push(Action::StrokeSealed {
                stroke: stroke.clone(),
            });
            self.sealed.push(stroke);
        }
    }
}

impl ModeController for PainterController {
    fn name(&self) -> &'static str {
        "painter"
    }

    fn process(&mut self, frame: &SmoothedFrame, gesture: &GestureEvent) -> Vec<Action> {
        let mut actions = Vec::new();
        let position = frame
            .point(self.cursor)
            .map(|tip| map_to_screen(tip, self.source, self.canvas));

        match (gesture.kind(), position) {
            (Some(GestureKind::Point), Some(position)) => {
                self.extend_stroke(position, &mut actions)
            }
            // Drawing continues through frames that lost the fingertip.
            (Some(GestureKind::Point), None) => {}
            _ => self.seal(&mut actions),
        }

        if let (Some(GestureKind::Hover), Some(position)) = (gesture.kind(), position) {
            if let Some(index) = self.swatch_at(position) {
                if index != self.brush {
                    self.brush = index;
                    let name = self.palette[index].name.clone();
                    debug!(brush = %name, "brush selected");
                    actions.push(Action::BrushSelected { name });
                }
            }
        }

        let fist = gesture.is(GestureKind::Fist);
        if fist && !self.fist_was_active {
            debug!(strokes = self.sealed.len(), "canvas cleared");
            self.sealed.clear();
            actions.push(Action::ClearCanvas);
        }
        self.fist_was_active = fist;

        actions
    }

    fn reset(&mut self) {
        self.brush = 0;
        self.open = None;
        self.sealed.clear();
        self.fist_was_active = false;
    }
}
