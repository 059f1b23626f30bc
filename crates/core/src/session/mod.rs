//! Frame-synchronous pipeline tying every component of a session together.

use tracing::{debug, info};

use crate::{
    controller::{Action, Mode, ModeController, ModeKind},
    geometry::{GeometryEngine, GeometryResult},
    gesture::{GestureClassifier, GestureEvent},
    landmark::LandmarkFrame,
    record::{LogRecord, RecordSink, SessionRecorder},
    smoothing::Smoother,
    PilotConfig, PilotError, Result,
};

/// One independent interpretation session. Owns all cross-frame state.
#[derive(Debug)]
pub struct Session {
    smoother: Smoother,
    geometry: GeometryEngine,
    classifier: GestureClassifier,
    mode: Mode,
    recorder: SessionRecorder,
    last_timestamp: Option<f64>,
    last_gesture: GestureEvent,
    last_geometry: GeometryResult,
    frames: u64,
}

impl Session {
    /// Validates `config` and builds a session running the `kind` controller.
    pub fn new(config: &PilotConfig, kind: ModeKind) -> Result<Self> {
        config.validate()?;

        let geometry = match kind {
            ModeKind::Trainer => GeometryEngine::new().with_joint(config.exercise.joint),
            ModeKind::Mouse | ModeKind::Painter => GeometryEngine::new(),
        };
        let mode = Mode::from_config(kind, config);
        info!(mode = mode.name(), window = config.smoothing.window, "session started");

        Ok(Self {
            smoother: Smoother::new(&config.smoothing, config.min_visibility),
            geometry,
            classifier: GestureClassifier::new(&config.gesture, config.coordinate_space),
            mode,
            recorder: SessionRecorder::new(),
            last_timestamp: None,
            last_gesture: GestureEvent::None,
            last_geometry: GeometryResult::default(),
            frames: 0,
        })
    }

    /// Runs one frame through smoother, geometry, classifier and controller.
    /// Trainer log records are appended to the recorder. A rejected frame
    /// leaves every component untouched.
    pub fn process_frame(&mut self, frame: &LandmarkFrame) -> Result<Vec<Action>> {
        let previous = match (self.last_timestamp, self.recorder.last_timestamp()) {
            (Some(frame_time), Some(record_time)) => Some(frame_time.max(record_time)),
            (frame_time, record_time) => frame_time.or(record_time),
        };
        if let Some(previous) = previous {
            if frame.timestamp <= previous {
                return Err(PilotError::OutOfOrder {
                    previous,
                    current: frame.timestamp,
                });
            }
        }

        let smoothed = self.smoother.smooth(frame);
        let geometry = self.geometry.measure(&smoothed);
        let gesture = self.classifier.classify(&geometry);
        let actions = self.mode.process(&smoothed, &gesture);

        for action in &actions {
            if let Action::Log { record } = action {
                self.recorder.record(*record)?;
            }
        }

        self.last_timestamp = Some(frame.timestamp);
        self.last_gesture = gesture;
        self.last_geometry = geometry;
        self.frames += 1;
        Ok(actions)
    }

    /// Writes unflushed log records to `sink`. Safe to call repeatedly.
    pub fn flush(&mut self, sink: &mut dyn RecordSink) -> Result<usize> {
        let written = self.recorder.flush(sink)?;
        if written > 0 {
            debug!(written, frames = self.frames, "session log flushed");
        }
        Ok(written)
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn recorder(&self) -> &SessionRecorder {
        &self.recorder
    }

    pub fn last_gesture(&self) -> GestureEvent {
        self.last_gesture
    }

    pub fn last_geometry(&self) -> &GeometryResult {
        &self.last_geometry
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames
    }

    /// Clears all per-session state and starts a fresh log. Records that were
    /// never flushed are handed back to the caller.
    pub fn restart(&mut self) -> Vec<LogRecord> {
        let pending = self.recorder.take_pending();
        self.smoother.reset();
        self.classifier.reset();
        self.mode.reset();
        self.last_timestamp = None;
        self.last_gesture = GestureEvent::None;
        self.last_geometry = GeometryResult::default();
        self.frames = 0;
        info!(mode = self.mode.name(), unflushed = pending.len(), "session restarted");
        pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{ExerciseConfig, JointTriplet, SmoothingConfig, SmoothingMode},
        controller::{RepState, Stage},
        gesture::GestureKind,
        landmark::{hand, pose, Landmark},
        record::MemorySink,
    };

    fn config() -> PilotConfig {
        let mut config = PilotConfig::default();
        config.smoothing = SmoothingConfig {
            window: 1,
            mode: SmoothingMode::Moving,
        };
        config
    }

    fn hand_frame(t: f64, pinch_distance: f32) -> LandmarkFrame {
        LandmarkFrame::new(t)
            .with_point(hand::THUMB_TIP, 0.5, 0.5)
            .with_point(hand::INDEX_TIP, 0.5 + pinch_distance, 0.5)
    }

    fn elbow_frame(t: f64, degrees: f32, elbow_visibility: f32) -> LandmarkFrame {
        let radians = degrees.to_radians();
        LandmarkFrame::new(t)
            .with_point(pose::RIGHT_SHOULDER, 0.7, 0.5)
            .with_landmark(
                Landmark::new(pose::RIGHT_ELBOW, 0.5, 0.5).with_visibility(elbow_visibility),
            )
            .with_point(
                pose::RIGHT_WRIST,
                0.5 + 0.2 * radians.cos(),
                0.5 - 0.2 * radians.sin(),
            )
    }

    #[test]
    fn rejects_invalid_config_before_processing() {
        let mut config = config();
        config.exercise.lower_threshold = 170.0;
        let err = Session::new(&config, ModeKind::Trainer).unwrap_err();
        assert!(matches!(err, PilotError::InvalidConfig(_)));
    }

    #[test]
    fn pinch_stays_active_until_release_is_confirmed() {
        let mut config = config();
        config.gesture.enter_frames = 3;
        config.gesture.release_frames = 4;
        let mut session = Session::new(&config, ModeKind::Mouse).unwrap();

        let mut clicks = 0;
        let distances = [0.01, 0.01, 0.01, 0.2, 0.2];
        for (i, distance) in distances.iter().enumerate() {
            let actions = session.process_frame(&hand_frame(i as f64, *distance)).unwrap();
            clicks += actions.iter().filter(|a| **a == Action::Click).count();
            if i >= 2 {
                assert!(session.last_gesture().is(GestureKind::Pinch), "frame {i}");
            } else {
                assert_eq!(session.last_gesture(), GestureEvent::None);
            }
        }
        assert_eq!(clicks, 1);
    }

    #[test]
    fn invisible_joint_frame_is_not_logged() {
        let mut session = Session::new(&config(), ModeKind::Trainer).unwrap();
        session.process_frame(&elbow_frame(0.0, 170.0, 1.0)).unwrap();
        session.process_frame(&elbow_frame(0.1, 20.0, 1.0)).unwrap();

        let Mode::Trainer(trainer) = session.mode() else {
            panic!("trainer session expected");
        };
        let before = *trainer.state();

        let actions = session.process_frame(&elbow_frame(0.2, 170.0, 0.1)).unwrap();
        assert!(actions.is_empty());
        assert_eq!(session.recorder().len(), 2);
        let Mode::Trainer(trainer) = session.mode() else {
            unreachable!()
        };
        assert_eq!(*trainer.state(), before);
        assert_eq!(trainer.state().stage, Stage::Up);
    }

    #[test]
    fn trainer_session_logs_and_flushes_once() {
        let mut config = config();
        config.exercise = ExerciseConfig {
            name: "curl".to_string(),
            joint: JointTriplet::new(pose::RIGHT_SHOULDER, pose::RIGHT_ELBOW, pose::RIGHT_WRIST),
            upper_threshold: 160.0,
            lower_threshold: 50.0,
        };
        let mut session = Session::new(&config, ModeKind::Trainer).unwrap();

        let angles = [170.0, 120.0, 40.0, 30.0, 120.0, 175.0];
        for (i, angle) in angles.iter().enumerate() {
            session
                .process_frame(&elbow_frame(i as f64 * 0.033, *angle, 1.0))
                .unwrap();
        }

        let mut sink = MemorySink::default();
        assert_eq!(session.flush(&mut sink).unwrap(), angles.len());
        assert_eq!(session.flush(&mut sink).unwrap(), 0);

        let last = sink.records.last().unwrap();
        assert_eq!(last.rep_count, 1);
        assert_eq!(last.stage, Stage::Down);
        assert!(sink
            .records
            .windows(2)
            .all(|pair| pair[0].timestamp < pair[1].timestamp));
    }

    #[test]
    fn out_of_order_frames_are_rejected() {
        let mut session = Session::new(&config(), ModeKind::Painter).unwrap();
        session.process_frame(&hand_frame(1.0, 0.3)).unwrap();
        let err = session.process_frame(&hand_frame(1.0, 0.3)).unwrap_err();
        assert!(matches!(err, PilotError::OutOfOrder { .. }));
        assert_eq!(session.frames_processed(), 1);
    }

    #[test]
    fn empty_frames_never_fail() {
        let mut session = Session::new(&config(), ModeKind::Painter).unwrap();
        for i in 0..5 {
            let actions = session.process_frame(&LandmarkFrame::new(i as f64)).unwrap();
            assert!(actions.is_empty());
        }
        assert_eq!(*session.last_geometry(), GeometryResult::default());
    }

    #[test]
    fn restart_clears_timestamps() {
        let mut session = Session::new(&config(), ModeKind::Mouse).unwrap();
        session.process_frame(&hand_frame(5.0, 0.3)).unwrap();
        assert!(session.restart().is_empty());
        session.process_frame(&hand_frame(0.0, 0.3)).unwrap();
        assert_eq!(session.frames_processed(), 1);
    }

    fn trainer_state(session: &Session) -> RepState {
        let Mode::Trainer(trainer) = session.mode() else {
            panic!("trainer session expected");
        };
        *trainer.state()
    }

    #[test]
    fn restarted_trainer_accepts_frames_from_zero() {
        let mut session = Session::new(&config(), ModeKind::Trainer).unwrap();
        let mut sink = MemorySink::default();
        for (i, angle) in [170.0, 20.0, 170.0].iter().enumerate() {
            session.process_frame(&elbow_frame(i as f64, *angle, 1.0)).unwrap();
        }
        session.flush(&mut sink).unwrap();
        session.process_frame(&elbow_frame(3.0, 20.0, 1.0)).unwrap();

        let unflushed = session.restart();
        assert_eq!(unflushed.len(), 1);
        assert_eq!(unflushed[0].timestamp, 3.0);
        assert!(session.recorder().is_empty());
        assert_eq!(trainer_state(&session), RepState::default());

        session.process_frame(&elbow_frame(0.0, 170.0, 1.0)).unwrap();
        session.process_frame(&elbow_frame(0.5, 20.0, 1.0)).unwrap();
        assert_eq!(session.frames_processed(), 2);
        assert_eq!(session.recorder().len(), 2);
        assert_eq!(trainer_state(&session).stage, Stage::Up);
    }

    #[test]
    fn rejected_trainer_frame_leaves_state_unchanged() {
        let mut session = Session::new(&config(), ModeKind::Trainer).unwrap();
        session.process_frame(&elbow_frame(1.0, 170.0, 1.0)).unwrap();
        session.process_frame(&elbow_frame(2.0, 100.0, 1.0)).unwrap();
        let before = trainer_state(&session);

        let err = session.process_frame(&elbow_frame(1.5, 20.0, 1.0)).unwrap_err();
        assert!(matches!(err, PilotError::OutOfOrder { .. }));
        assert_eq!(trainer_state(&session), before);
        assert_eq!(session.recorder().len(), 2);
        assert_eq!(session.frames_processed(), 2);
    }

    #[test]
    fn painter_draws_with_occluded_thumb() {
        let mut config = config();
        config.gesture.enter_frames = 1;
        let mut session = Session::new(&config, ModeKind::Painter).unwrap();

        let mut segments = 0;
        for i in 0..5 {
            let x = 0.3 + i as f32 * 0.05;
            let mut frame = LandmarkFrame::new(i as f64)
                .with_landmark(Landmark::new(hand::THUMB_TIP, 0.45, 0.6).with_visibility(0.1))
                .with_landmark(Landmark::new(hand::THUMB_IP, 0.5, 0.6).with_visibility(0.1));
            for (tip, tip_y) in [
                (hand::INDEX_TIP, 0.3),
                (hand::MIDDLE_TIP, 0.6),
                (hand::RING_TIP, 0.6),
                (hand::PINKY_TIP, 0.6),
            ] {
                let offset = if tip == hand::INDEX_TIP { x } else { 0.1 * tip as f32 / 20.0 };
                frame = frame
                    .with_point(tip - 2, offset, 0.5)
                    .with_point(tip, offset, tip_y);
            }

            let actions = session.process_frame(&frame).unwrap();
            assert!(session.last_gesture().is(GestureKind::Point), "frame {i}");
            segments += actions
                .iter()
                .filter(|action| matches!(action, Action::StrokeSegment { .. }))
                .count();
        }
        assert_eq!(segments, 4);
    }
}
