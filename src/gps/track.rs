// src/gps/track.rs
//! Flattening and aggregate statistics over a parsed track set

use super::data::{TrackPoint, TrackSegment, TrackSet};
use super::geodesy::distance_km;
use chrono::Duration;

/// Concatenate every point of every segment of every track, in document order.
pub fn flatten(set: &TrackSet) -> Vec<TrackPoint> {
    set.segments()
        .flat_map(|segment| segment.points.iter().cloned())
        .collect()
}

pub fn point_count(set: &TrackSet) -> usize {
    set.segments().map(TrackSegment::len).sum()
}

/// Path length of a single segment in kilometers
pub fn segment_distance_km(segment: &TrackSegment) -> f64 {
    segment
        .points
        .windows(2)
        .map(|pair| distance_km(pair[0].position(), pair[1].position()))
        .sum()
}

/// Sum of per-segment distances. Gaps between segments are not counted.
pub fn total_distance_km(set: &TrackSet) -> f64 {
    set.segments().map(segment_distance_km).sum()
}

/// Recording span of the timestamped points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingInfo {
    pub duration: Duration,
    pub timed_points: usize,
}

impl TimingInfo {
    /// `None` unless at least two points carry a timestamp
    pub fn from_points(points: &[TrackPoint]) -> Option<Self> {
        let mut times = points.iter().filter_map(|p| p.timestamp);
        let first = times.next()?;
        let (min, max, count) = times.fold((first, first, 1usize), |(min, max, n), t| {
            (min.min(t), max.max(t), n + 1)
        });
        if count < 2 {
            return None;
        }
        Some(Self {
            duration: max.signed_duration_since(min),
            timed_points: count,
        })
    }
}

/// Figures shown in the file summary.
#[derive(Debug, Clone)]
pub struct TrackSummary {
    pub file_name: String,
    pub file_size: u64,
    pub points: usize,
    pub distance_km: f64,
    pub timing: Option<TimingInfo>,
    pub interpolated_points: usize,
}

impl TrackSummary {
    pub fn new(file_name: String, file_size: u64, set: &TrackSet, interpolated_points: usize) -> Self {
        Self {
            file_name,
            file_size,
            points: point_count(set),
            distance_km: total_distance_km(set),
            timing: TimingInfo::from_points(&flatten(set)),
            interpolated_points,
        }
    }
}

pub fn format_distance(km: f64) -> String {
    if km < 1.0 {
        format!("{:.0} m", km * 1000.0)
    } else {
        format!("{:.2} km", km)
    }
}

pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.num_seconds();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    let exponent = ((bytes as f64).ln() / 1024_f64.ln()).floor() as usize;
    let exponent = exponent.min(UNITS.len() - 1);
    let value = bytes as f64 / 1024_f64.powi(exponent as i32);
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[exponent])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gps::data::Track;
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};

    fn two_segment_set() -> TrackSet {
        let mut track = Track::new("Loop");
        track.push_segment(TrackSegment::new(vec![
            TrackPoint::new(0.0, 0.0),
            TrackPoint::new(0.0, 1.0),
        ]));
        track.push_segment(TrackSegment::new(vec![
            TrackPoint::new(10.0, 10.0),
            TrackPoint::new(10.0, 10.0),
        ]));
        let mut set = TrackSet::new();
        set.push_track(track);
        set
    }

    #[test]
    fn test_flatten_preserves_order() {
        let set = two_segment_set();
        let flat = flatten(&set);
        assert_eq!(flat.len(), 4);
        assert_eq!(flat[1], TrackPoint::new(0.0, 1.0));
        assert_eq!(flat[2], TrackPoint::new(10.0, 10.0));
        assert_eq!(point_count(&set), 4);
    }

    #[test]
    fn test_distance_ignores_segment_gap() {
        let set = two_segment_set();
        // only the first segment moves; the 10-degree jump between segments is not counted
        assert_relative_eq!(total_distance_km(&set), 111.195, epsilon = 0.01);
    }

    #[test]
    fn test_timing_info() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let points = vec![
            TrackPoint::new(0.0, 0.0).with_timestamp(t0 + Duration::seconds(90)),
            TrackPoint::new(0.0, 0.0),
            TrackPoint::new(0.0, 0.0).with_timestamp(t0),
        ];
        let timing = TimingInfo::from_points(&points).unwrap();
        assert_eq!(timing.duration, Duration::seconds(90));
        assert_eq!(timing.timed_points, 2);

        assert!(TimingInfo::from_points(&points[..2]).is_none());
    }

    #[test]
    fn test_format_distance() {
        assert_eq!(format_distance(0.85), "850 m");
        assert_eq!(format_distance(12.3456), "12.35 km");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::seconds(45)), "45s");
        assert_eq!(format_duration(Duration::seconds(192)), "3m 12s");
        assert_eq!(format_duration(Duration::seconds(3725)), "1h 2m 5s");
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5 MB");
    }
}
