//! Temporal smoothing of landmark coordinates.
//!
//! Every landmark id owns a short window of its most recent visible samples.
//! The emitted position is a weighted mean over that window, so it always lies
//! within the range of the samples it was computed from.

use std::collections::{HashMap, VecDeque};

use crate::{
    config::{SmoothingConfig, SmoothingMode},
    landmark::{Landmark, LandmarkFrame, LandmarkId, SmoothedFrame, SmoothedLandmark},
};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Sample {
    x: f32,
    y: f32,
    z: Option<f32>,
}

impl From<&Landmark> for Sample {
    fn from(landmark: &Landmark) -> Self {
        Self {
            x: landmark.x,
            y: landmark.y,
            z: landmark.z,
        }
    }
}

/// Fixed-capacity sample history for a single landmark. Newest sample last.
#[derive(Debug, Clone)]
struct History {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl History {
    fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, sample: Sample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    fn mean(&self, mode: SmoothingMode) -> Option<Sample> {
        if self.samples.is_empty() {
            return None;
        }

        let x = weighted_mean(self.samples.iter().map(|s| Some(s.x)), mode)?;
        let y = weighted_mean(self.samples.iter().map(|s| Some(s.y)), mode)?;
        let z = weighted_mean(self.samples.iter().map(|s| s.z), mode);
        Some(Sample { x, y, z })
    }
}

/// Weighted mean over `values` ordered oldest to newest. `None` entries are
/// skipped without shifting the age of the others.
fn weighted_mean(
    values: impl DoubleEndedIterator<Item = Option<f32>>,
    mode: SmoothingMode,
) -> Option<f32> {
    let mut weight_sum = 0.0;
    let mut acc = 0.0;
    let mut lo = f32::INFINITY;
    let mut hi = f32::NEG_INFINITY;

    for (age, value) in values.rev().enumerate() {
        let Some(value) = value else { continue };
        let weight = match mode {
            SmoothingMode::Moving => 1.0,
            SmoothingMode::Exponential { alpha } => (1.0 - alpha).powi(age as i32),
        };
        weight_sum += weight;
        acc += weight * value;
        lo = lo.min(value);
        hi = hi.max(value);
    }

    if lo > hi {
        return None;
    }
    Some((acc / weight_sum).clamp(lo, hi))
}

/// Per-session landmark smoother. Owns one [`History`] per landmark id.
#[derive(Debug, Clone)]
pub struct Smoother {
    window: usize,
    mode: SmoothingMode,
    min_visibility: f32,
    histories: HashMap<LandmarkId, History>,
}

impl Smoother {
    pub fn new(config: &SmoothingConfig, min_visibility: f32) -> Self {
        Self {
            window: config.window.max(1),
            mode: config.mode,
            min_visibility,
            histories: HashMap::new(),
        }
    }

    /// Filters one frame. Low-visibility samples are left out of the history;
    /// such landmarks report the mean of what the history already holds, or
    /// their raw value when nothing has been seen yet.
    pub fn smooth(&mut self, frame: &LandmarkFrame) -> SmoothedFrame {
        let landmarks = frame
            .landmarks
            .iter()
            .map(|landmark| self.smooth_landmark(landmark))
            .collect();

        SmoothedFrame {
            timestamp: frame.timestamp,
            handedness: frame.handedness,
            landmarks,
        }
    }

    fn smooth_landmark(&mut self, landmark: &Landmark) -> SmoothedLandmark {
        let visible = landmark.visibility >= self.min_visibility;
        let window = self.window;
        let history = self
            .histories
            .entry(landmark.id)
            .or_insert_with(|| History::new(window));

        if visible {
            history.push(Sample::from(landmark));
        }

        let sample = history.mean(self.mode).unwrap_or_else(|| Sample::from(landmark));
        SmoothedLandmark {
            id: landmark.id,
            x: sample.x,
            y: sample.y,
            z: sample.z,
            visibility: landmark.visibility,
            visible,
        }
    }

    /// Number of samples currently retained for `id`.
    pub fn history_len(&self, id: LandmarkId) -> usize {
        self.histories
            .get(&id)
            .map(|history| history.samples.len())
            .unwrap_or(0)
    }

    /// Drops all retained history.
    pub fn reset(&mut self) {
        self.histories.clear();
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::landmark::Landmark;

    fn smoother(window: usize, mode: SmoothingMode) -> Smoother {
        Smoother::new(&SmoothingConfig { window, mode }, 0.5)
    }

    fn frame(t: f64, x: f32, y: f32) -> LandmarkFrame {
        LandmarkFrame::new(t).with_point(8, x, y)
    }

    #[test]
    fn cold_start_passes_raw_value_through() {
        let mut smoother = smoother(5, SmoothingMode::Moving);
        let out = smoother.smooth(&frame(0.0, 0.3, 0.7));

        let landmark = out.get(8).unwrap();
        assert_eq!((landmark.x, landmark.y), (0.3, 0.7));
        assert!(landmark.visible);
    }

    #[test]
    fn moving_average_over_window() {
        let mut smoother = smoother(2, SmoothingMode::Moving);
        smoother.smooth(&frame(0.0, 1.0, 0.0));
        smoother.smooth(&frame(0.1, 1.0, 0.0));
        let out = smoother.smooth(&frame(0.2, 0.0, 0.0));
        assert_relative_eq!(out.get(8).unwrap().x, 0.5);
        let out = smoother.smooth(&frame(0.3, 0.0, 0.0));
        assert_relative_eq!(out.get(8).unwrap().x, 0.0);
    }

    #[test]
    fn history_never_exceeds_window() {
        let mut smoother = smoother(3, SmoothingMode::Moving);
        for i in 0..10 {
            smoother.smooth(&frame(i as f64, i as f32, 0.0));
            assert!(smoother.history_len(8) <= 3);
        }
        assert_eq!(smoother.history_len(8), 3);
    }

    #[test]
    fn exponential_weights_favour_recent_samples() {
        let mut smoother = smoother(3, SmoothingMode::Exponential { alpha: 0.5 });
        smoother.smooth(&frame(0.0, 0.0, 0.0));
        let out = smoother.smooth(&frame(0.1, 1.0, 0.0));
        // weights 1 (newest) and 0.5
        assert_relative_eq!(out.get(8).unwrap().x, 2.0 / 3.0, epsilon = 1e-6);
    }

    #[test]
    fn invisible_sample_keeps_last_known_position() {
        let mut smoother = smoother(4, SmoothingMode::Moving);
        smoother.smooth(&frame(0.0, 0.2, 0.2));
        smoother.smooth(&frame(0.1, 0.4, 0.4));

        let degraded =
            LandmarkFrame::new(0.2).with_landmark(Landmark::new(8, 0.99, 0.99).with_visibility(0.1));
        let out = smoother.smooth(&degraded);

        let landmark = out.get(8).unwrap();
        assert!(!landmark.visible);
        assert_relative_eq!(landmark.x, 0.3, epsilon = 1e-6);
        assert_eq!(smoother.history_len(8), 2);
    }

    #[test]
    fn invisible_cold_start_passes_through_unflagged() {
        let mut smoother = smoother(4, SmoothingMode::Moving);
        let degraded =
            LandmarkFrame::new(0.0).with_landmark(Landmark::new(8, 0.6, 0.1).with_visibility(0.0));
        let out = smoother.smooth(&degraded);

        let landmark = out.get(8).unwrap();
        assert!(!landmark.visible);
        assert_eq!((landmark.x, landmark.y), (0.6, 0.1));
        assert_eq!(smoother.history_len(8), 0);
    }

    #[test]
    fn output_stays_within_recent_observations() {
        let mut rng = fastrand::Rng::with_seed(7);
        for mode in [SmoothingMode::Moving, SmoothingMode::Exponential { alpha: 0.35 }] {
            let window = 5;
            let mut smoother = smoother(window, mode);
            let mut raw: Vec<f32> = Vec::new();

            for i in 0..500 {
                let x = rng.f32() * 100.0 - 50.0;
                let visible = rng.f32() > 0.2;
                let landmark = Landmark::new(8, x, 0.0).with_visibility(if visible { 1.0 } else { 0.0 });
                let out = smoother.smooth(&LandmarkFrame::new(i as f64).with_landmark(landmark));

                if visible {
                    raw.push(x);
                }
                if raw.is_empty() {
                    continue;
                }
                let recent = &raw[raw.len().saturating_sub(window)..];
                let lo = recent.iter().copied().fold(f32::INFINITY, f32::min);
                let hi = recent.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                let smoothed = out.get(8).unwrap().x;
                assert!(smoothed >= lo && smoothed <= hi, "{smoothed} outside [{lo}, {hi}]");
            }
        }
    }

    #[test]
    fn reset_clears_history() {
        let mut smoother = smoother(3, SmoothingMode::Moving);
        smoother.smooth(&frame(0.0, 1.0, 1.0));
        smoother.reset();
        assert_eq!(smoother.history_len(8), 0);
    }
}
