// src/animation/orientation.rs
//! Look-ahead heading smoothing for the rotating view

use crate::gps::geodesy::{average_bearing, bearing_degrees};
use crate::gps::TrackPoint;

pub const DEFAULT_LOOKAHEAD: usize = 30;
pub const DEFAULT_ROTATION_THRESHOLD_DEG: f64 = 2.0;

/// View rotation that turns the direction of travel to face up.
///
/// Averages the bearings from `points[index]` to each of the next `lookahead`
/// points and negates the mean. Returns 0 when there is nothing ahead.
pub fn smoothed_rotation(points: &[TrackPoint], index: usize, lookahead: usize) -> f64 {
    let Some(from) = points.get(index) else {
        return 0.0;
    };

    let bearings: Vec<f64> = points
        .iter()
        .skip(index + 1)
        .take(lookahead)
        .map(|to| bearing_degrees(from.position(), to.position()))
        .collect();

    if bearings.is_empty() {
        return 0.0;
    }

    -average_bearing(&bearings)
}

/// Decides when a newly computed rotation is worth applying.
///
/// The stored rotation follows every computed value, applied or not, so the
/// threshold is measured against the previous computation.
#[derive(Debug, Clone, PartialEq)]
pub struct RotationTracker {
    current: f64,
    threshold: f64,
}

impl RotationTracker {
    pub fn new(threshold: f64) -> Self {
        Self {
            current: 0.0,
            threshold,
        }
    }

    /// Record `rotation`; returns it if the view should be turned
    pub fn update(&mut self, rotation: f64) -> Option<f64> {
        let apply = (rotation - self.current).abs() > self.threshold;
        self.current = rotation;
        apply.then_some(rotation)
    }

    pub fn current(&self) -> f64 {
        self.current
    }
}

impl Default for RotationTracker {
    fn default() -> Self {
        Self::new(DEFAULT_ROTATION_THRESHOLD_DEG)
    }
}
