// src/map/raster.rs
//! Software map renderer used for headless playback and video export

use super::projection::{fit_zoom, lat_lon_to_world};
use super::view::{Bounds, MapView};
use crate::gps::{LatLon, TrackSet};
use image::{Rgba, RgbaImage};

const TRACK_COLORS: [[u8; 3]; 6] = [
    [0x66, 0x7e, 0xea],
    [0x76, 0x4b, 0xa2],
    [0xf0, 0x93, 0xfb],
    [0xf5, 0x57, 0x6c],
    [0x4f, 0xac, 0xfe],
    [0x00, 0xf2, 0xfe],
];
const BACKGROUND: [u8; 3] = [0xf0, 0xf0, 0xf0];
const END_COLOR: [u8; 3] = [0xff, 0x47, 0x57];
const MARKER_COLOR: [u8; 3] = [0xff, 0x47, 0x57];
const WHITE: [u8; 3] = [0xff, 0xff, 0xff];
const TRAIL_COLOR: [u8; 3] = [0x00, 0x00, 0x00];

const TRACK_WIDTH: f64 = 4.0;
const TRAIL_WIDTH: f64 = 6.0;
const TRAIL_OPACITY: f64 = 0.8;
const TRACK_OPACITY: f64 = 0.8;

struct Polyline {
    color: [u8; 3],
    points: Vec<LatLon>,
}

/// A map that draws into an in-memory RGBA image.
pub struct RasterMap {
    width: u32,
    height: u32,
    center: LatLon,
    zoom: f64,
    rotation: f64,
    polylines: Vec<Polyline>,
    marker: Option<LatLon>,
    trail: Vec<LatLon>,
    trail_visible: bool,
}

impl RasterMap {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            center: LatLon::new(0.0, 0.0),
            zoom: 13.0,
            rotation: 0.0,
            polylines: Vec::new(),
            marker: None,
            trail: Vec::new(),
            trail_visible: true,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn center(&self) -> LatLon {
        self.center
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    pub fn marker(&self) -> Option<LatLon> {
        self.marker
    }

    pub fn trail_len(&self) -> usize {
        self.trail.len()
    }

    /// Screen position of a coordinate under the current view transform
    pub fn to_screen(&self, pos: LatLon) -> (f64, f64) {
        let (wx, wy) = lat_lon_to_world(pos, self.zoom);
        let (cx, cy) = lat_lon_to_world(self.center, self.zoom);
        let (dx, dy) = (wx - cx, wy - cy);

        let theta = self.rotation.to_radians();
        let (sin, cos) = theta.sin_cos();
        let rx = dx * cos - dy * sin;
        let ry = dx * sin + dy * cos;

        (self.width as f64 / 2.0 + rx, self.height as f64 / 2.0 + ry)
    }

    /// Draw the current view
    pub fn render(&self) -> RgbaImage {
        let mut img = RgbaImage::from_pixel(
            self.width,
            self.height,
            Rgba([BACKGROUND[0], BACKGROUND[1], BACKGROUND[2], 255]),
        );

        for line in &self.polylines {
            let screen: Vec<_> = line.points.iter().map(|p| self.to_screen(*p)).collect();
            stroke_polyline(&mut img, &screen, TRACK_WIDTH, line.color, TRACK_OPACITY);
        }

        for line in &self.polylines {
            if let (Some(first), Some(last)) = (line.points.first(), line.points.last()) {
                self.dot(&mut img, *first, 6.0, line.color);
                self.dot(&mut img, *last, 6.0, END_COLOR);
            }
        }

        if self.trail_visible && !self.trail.is_empty() {
            let screen: Vec<_> = self.trail.iter().map(|p| self.to_screen(*p)).collect();
            stroke_polyline(&mut img, &screen, TRAIL_WIDTH, TRAIL_COLOR, TRAIL_OPACITY);
        }

        if let Some(marker) = self.marker {
            self.dot(&mut img, marker, 8.0, MARKER_COLOR);
        }

        img
    }

    /// Filled circle with a white 2px ring
    fn dot(&self, img: &mut RgbaImage, pos: LatLon, radius: f64, color: [u8; 3]) {
        let (x, y) = self.to_screen(pos);
        fill_disc(img, x, y, radius + 2.0, WHITE, 1.0);
        fill_disc(img, x, y, radius, color, 1.0);
    }
}

impl MapView for RasterMap {
    fn draw_tracks(&mut self, tracks: &TrackSet) {
        self.polylines.clear();
        for (index, track) in tracks.tracks.iter().enumerate() {
            let color = TRACK_COLORS[index % TRACK_COLORS.len()];
            for segment in track.segments.iter().filter(|s| s.len() >= 2) {
                self.polylines.push(Polyline {
                    color,
                    points: segment.points.iter().map(|p| p.position()).collect(),
                });
            }
        }
    }

    fn set_marker(&mut self, position: LatLon) {
        self.marker = Some(position);
    }

    fn set_trail(&mut self, trail: &[LatLon]) {
        self.trail.clear();
        self.trail.extend_from_slice(trail);
    }

    fn set_trail_visible(&mut self, visible: bool) {
        self.trail_visible = visible;
    }

    fn set_view(&mut self, center: LatLon, zoom: f64) {
        self.center = center;
        self.zoom = zoom;
    }

    fn set_rotation(&mut self, degrees: f64) {
        self.rotation = degrees;
    }

    fn fit_bounds(&mut self, bounds: &Bounds, padding: u32) {
        self.center = bounds.center();
        self.zoom = fit_zoom(bounds, self.width, self.height, padding);
    }
}

fn blend(img: &mut RgbaImage, x: i64, y: i64, color: [u8; 3], alpha: f64) {
    if x < 0 || y < 0 || x >= img.width() as i64 || y >= img.height() as i64 {
        return;
    }
    let px = img.get_pixel_mut(x as u32, y as u32);
    for c in 0..3 {
        let base = px.0[c] as f64;
        px.0[c] = (base + (color[c] as f64 - base) * alpha).round() as u8;
    }
    px.0[3] = 255;
}

fn fill_disc(img: &mut RgbaImage, cx: f64, cy: f64, radius: f64, color: [u8; 3], alpha: f64) {
    let r2 = radius * radius;
    let (x0, x1) = ((cx - radius).floor() as i64, (cx + radius).ceil() as i64);
    let (y0, y1) = ((cy - radius).floor() as i64, (cy + radius).ceil() as i64);
    for y in y0..=y1 {
        for x in x0..=x1 {
            let (dx, dy) = (x as f64 + 0.5 - cx, y as f64 + 0.5 - cy);
            if dx * dx + dy * dy <= r2 {
                blend(img, x, y, color, alpha);
            }
        }
    }
}

/// Thick polyline; each pixel is painted at most once so translucent strokes
/// do not darken where stamps overlap.
fn stroke_polyline(img: &mut RgbaImage, points: &[(f64, f64)], width: f64, color: [u8; 3], alpha: f64) {
    if points.is_empty() {
        return;
    }
    let w = img.width() as usize;
    let h = img.height() as usize;
    let mut mask = vec![false; w * h];
    let radius = width / 2.0;
    let r2 = radius * radius;

    let stamp = |cx: f64, cy: f64, mask: &mut Vec<bool>| {
        let (x0, x1) = ((cx - radius).floor() as i64, (cx + radius).ceil() as i64);
        let (y0, y1) = ((cy - radius).floor() as i64, (cy + radius).ceil() as i64);
        for y in y0.max(0)..=y1.min(h as i64 - 1) {
            for x in x0.max(0)..=x1.min(w as i64 - 1) {
                let (dx, dy) = (x as f64 + 0.5 - cx, y as f64 + 0.5 - cy);
                if dx * dx + dy * dy <= r2 {
                    mask[y as usize * w + x as usize] = true;
                }
            }
        }
    };

    // stamps centred outside this box cannot reach the image
    let min = (-radius, -radius);
    let max = (w as f64 + radius, h as f64 + radius);

    stamp(points[0].0, points[0].1, &mut mask);
    for pair in points.windows(2) {
        let Some((a, b)) = clip_segment(pair[0], pair[1], min, max) else {
            continue;
        };
        let length = ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt();
        if !length.is_finite() {
            continue;
        }
        let steps = length.ceil().max(1.0) as usize;
        for i in 0..=steps {
            let t = i as f64 / steps as f64;
            stamp(a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t, &mut mask);
        }
    }

    for (i, painted) in mask.iter().enumerate() {
        if *painted {
            blend(img, (i % w) as i64, (i / w) as i64, color, alpha);
        }
    }
}

/// Part of the segment `a`-`b` inside the box `min`..`max` (Liang-Barsky)
fn clip_segment(
    a: (f64, f64),
    b: (f64, f64),
    min: (f64, f64),
    max: (f64, f64),
) -> Option<((f64, f64), (f64, f64))> {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    for (p, q) in [(-dx, a.0 - min.0), (dx, max.0 - a.0), (-dy, a.1 - min.1), (dy, max.1 - a.1)] {
        if p == 0.0 {
            // parallel to this edge and outside it
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }
    Some(((a.0 + t0 * dx, a.1 + t0 * dy), (a.0 + t1 * dx, a.1 + t1 * dy)))
}
