// src/animation/resample.rs
//! Fixed-cadence resampling of irregularly timestamped track points

use crate::gps::TrackPoint;
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// Longest stretch of recording time used to plan sample density
pub const MAX_PLANNED_MS: f64 = 60_000.0;
/// Number of samples the planned stretch is divided into
pub const PLANNED_SAMPLES: f64 = 200.0;
/// Finest allowed spacing between samples
pub const MIN_INTERVAL_MS: f64 = 100.0;

/// The ordered positions the animation walks through.
///
/// Built once per loaded file and shared read-only between playback and
/// export.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterpolatedSequence {
    points: Vec<TrackPoint>,
}

impl InterpolatedSequence {
    pub fn new(points: Vec<TrackPoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TrackPoint> {
        self.points.get(index)
    }

    pub fn first(&self) -> Option<&TrackPoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&TrackPoint> {
        self.points.last()
    }

    pub fn as_slice(&self) -> &[TrackPoint] {
        &self.points
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TrackPoint> {
        self.points.iter()
    }
}

/// Sampling step for a recording of `total_ms` milliseconds
pub fn sample_interval_ms(total_ms: f64) -> f64 {
    let target_ms = total_ms.min(MAX_PLANNED_MS);
    (target_ms / PLANNED_SAMPLES).max(MIN_INTERVAL_MS)
}

fn offset_ms(t: DateTime<Utc>, start: DateTime<Utc>) -> f64 {
    let delta = t.signed_duration_since(start);
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1000.0,
        None => delta.num_milliseconds() as f64,
    }
}

/// Instant of a grid step, truncated to whole microseconds and never past `end`
fn grid_time(start: DateTime<Utc>, end: DateTime<Utc>, t_ms: f64) -> DateTime<Utc> {
    let at = start + Duration::microseconds((t_ms * 1000.0).floor() as i64);
    at.min(end)
}

fn lerp(a: f64, b: f64, factor: f64) -> f64 {
    a + (b - a) * factor
}

/// Turn a flat point sequence into an evenly spaced animation sequence.
///
/// With fewer than two timestamped points the input is returned unchanged
/// (including untimed points, in input order). Otherwise the timestamped
/// points are sorted by time and sampled every [`sample_interval_ms`] from
/// the first to the last timestamp; the sequence always ends on the last
/// recorded sample.
pub fn resample(points: &[TrackPoint]) -> InterpolatedSequence {
    let mut timed: Vec<(DateTime<Utc>, &TrackPoint)> = points
        .iter()
        .filter_map(|p| p.timestamp.map(|t| (t, p)))
        .collect();

    if timed.len() < 2 {
        return InterpolatedSequence::new(points.to_vec());
    }

    // stable: points sharing a timestamp keep their recorded order
    timed.sort_by_key(|(t, _)| *t);

    let start = timed[0].0;
    let (end, last_point) = timed[timed.len() - 1];
    let offsets: Vec<f64> = timed.iter().map(|(t, _)| offset_ms(*t, start)).collect();
    let total_ms = offsets[offsets.len() - 1];
    let interval_ms = sample_interval_ms(total_ms);

    let mut out = Vec::new();
    let mut cursor = 0usize;
    let mut step = 0u64;

    loop {
        let t = step as f64 * interval_ms;
        if t > total_ms {
            break;
        }
        step += 1;

        // first adjacent pair (a, b) with a <= t <= b; steps only move forward
        while cursor + 1 < offsets.len() && t > offsets[cursor + 1] {
            cursor += 1;
        }
        if cursor + 1 >= offsets.len() || t < offsets[cursor] {
            continue;
        }

        let (ta, tb) = (offsets[cursor], offsets[cursor + 1]);
        let (a, b) = (timed[cursor].1, timed[cursor + 1].1);
        let span = tb - ta;
        let factor = if span > 0.0 { (t - ta) / span } else { 0.0 };

        let elevation = match (a.elevation, b.elevation) {
            (Some(ea), Some(eb)) => Some(lerp(ea, eb, factor)),
            _ => None,
        };

        out.push(TrackPoint {
            lat: lerp(a.lat, b.lat, factor),
            lon: lerp(a.lon, b.lon, factor),
            elevation,
            timestamp: Some(grid_time(start, end, t)),
        });
    }

    let ends_on_last = out
        .last()
        .and_then(|p| p.timestamp)
        .map_or(false, |t| t == end);
    if !ends_on_last {
        out.push(last_point.clone());
    }

    debug!(
        "resampled {} timed points over {:.0} ms into {} samples ({:.1} ms step)",
        timed.len(),
        total_ms,
        out.len(),
        interval_ms
    );

    InterpolatedSequence::new(out)
}
