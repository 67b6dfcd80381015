// src/gps/gpx.rs
//! GPX track reader

use super::data::{Track, TrackPoint, TrackSegment, TrackSet, UNNAMED_TRACK};
use crate::error::{PlayerError, Result};
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::Path;
use tracing::debug;

/// Which text node we are currently collecting
#[derive(Debug, Clone, Copy, PartialEq)]
enum TextField {
    TrackName,
    Elevation,
    Time,
}

#[derive(Default)]
struct PendingPoint {
    lat: Option<f64>,
    lon: Option<f64>,
    elevation: Option<f64>,
    timestamp: Option<DateTime<Utc>>,
}

impl PendingPoint {
    fn from_start(e: &BytesStart) -> Result<Self> {
        let mut pending = Self::default();
        for attr in e.attributes() {
            let attr = attr?;
            let value = std::str::from_utf8(&attr.value)
                .ok()
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite());
            match attr.key.local_name().as_ref() {
                b"lat" => pending.lat = value,
                b"lon" => pending.lon = value,
                _ => {}
            }
        }
        Ok(pending)
    }

    /// Points without a numeric lat/lon are dropped
    fn finish(self) -> Option<TrackPoint> {
        let (lat, lon) = (self.lat?, self.lon?);
        Some(TrackPoint {
            lat,
            lon,
            elevation: self.elevation,
            timestamp: self.timestamp,
        })
    }
}

/// Parse GPX text into tracks, segments and points.
///
/// Empty segments and tracks are discarded. A document that is not well-formed
/// XML, or has no `<gpx>` root, is an error; a valid document with no tracks
/// is not.
pub fn parse_gpx_str(s: &str) -> Result<TrackSet> {
    let mut reader = Reader::from_str(s);
    reader.config_mut().trim_text(true);

    let mut set = TrackSet::new();
    let mut saw_root = false;
    let mut track: Option<Track> = None;
    let mut segment: Option<Vec<TrackPoint>> = None;
    let mut point: Option<PendingPoint> = None;
    let mut field: Option<TextField> = None;
    let mut text = String::new();
    let mut depth = 0usize;

    loop {
        match reader.read_event()? {
            Event::Eof => {
                if depth > 0 {
                    return Err(PlayerError::Parse(format!("document ends with {} unclosed elements", depth)));
                }
                break;
            }
            Event::Start(e) => {
                depth += 1;
                match e.local_name().as_ref() {
                    b"gpx" => saw_root = true,
                    b"trk" => track = Some(Track::new(String::new())),
                    b"trkseg" if track.is_some() => segment = Some(Vec::new()),
                    b"trkpt" if segment.is_some() => point = Some(PendingPoint::from_start(&e)?),
                    b"name" if track.is_some() && segment.is_none() => {
                        field = Some(TextField::TrackName)
                    }
                    b"ele" if point.is_some() => field = Some(TextField::Elevation),
                    b"time" if point.is_some() => field = Some(TextField::Time),
                    _ => {}
                }
                text.clear();
            }
            Event::Empty(e) => match e.local_name().as_ref() {
                b"gpx" => saw_root = true,
                b"trkpt" if segment.is_some() => {
                    let pending = PendingPoint::from_start(&e)?;
                    if let (Some(points), Some(p)) = (segment.as_mut(), pending.finish()) {
                        points.push(p);
                    }
                }
                _ => {}
            },
            Event::Text(t) => {
                if field.is_some() {
                    let unescaped = t
                        .unescape()
                        .map_err(|e| PlayerError::Parse(format!("bad text node: {}", e)))?;
                    text.push_str(&unescaped);
                }
            }
            Event::CData(t) => {
                if field.is_some() {
                    text.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                match e.local_name().as_ref() {
                    b"name" if field == Some(TextField::TrackName) => {
                        if let Some(ref mut trk) = track {
                            if trk.name.is_empty() {
                                trk.name = text.trim().to_string();
                            }
                        }
                        field = None;
                    }
                    b"ele" if field == Some(TextField::Elevation) => {
                        if let Some(ref mut p) = point {
                            p.elevation = text.trim().parse::<f64>().ok().filter(|v| v.is_finite());
                        }
                        field = None;
                    }
                    b"time" if field == Some(TextField::Time) => {
                        if let Some(ref mut p) = point {
                            p.timestamp = parse_timestamp(text.trim());
                        }
                        field = None;
                    }
                    b"trkpt" => {
                        if let (Some(points), Some(p)) =
                            (segment.as_mut(), point.take().and_then(PendingPoint::finish))
                        {
                            points.push(p);
                        }
                    }
                    b"trkseg" => {
                        if let (Some(trk), Some(points)) = (track.as_mut(), segment.take()) {
                            trk.push_segment(TrackSegment::new(points));
                        }
                    }
                    b"trk" => {
                        if let Some(mut trk) = track.take() {
                            if trk.name.is_empty() {
                                trk.name = UNNAMED_TRACK.to_string();
                            }
                            set.push_track(trk);
                        }
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    if !saw_root {
        return Err(PlayerError::Parse("no <gpx> root element".to_string()));
    }

    Ok(set)
}

/// Read and parse a GPX file from disk
pub fn parse_gpx_file<P: AsRef<Path>>(path: P) -> Result<TrackSet> {
    let s = std::fs::read_to_string(path)?;
    parse_gpx_str(&s)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(s) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(e) => {
            debug!("ignoring unparseable <time> {:?}: {}", s, e);
            None
        }
    }
}
