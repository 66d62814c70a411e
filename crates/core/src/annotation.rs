//! Stroke data model
//!
//! A stroke is one straight, round-capped line segment drawn on the overlay.
//! Endpoints are stored in display coordinates of the current raster: pixels,
//! origin at the top-left of the overlay, Y growing downward. They are only
//! converted to PDF page space when the page is exported.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Point in overlay display coordinates (pixels, origin top-left, Y down).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance_to(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Opaque RGB color, written as `#RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const RED: Color = Color { r: 255, g: 0, b: 0 };
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255 };

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RRGGBB` or the `#RGB` shorthand. The leading `#` is optional.
    pub fn from_hex(value: &str) -> Result<Self, StrokeError> {
        let invalid = || StrokeError::InvalidColor(value.to_owned());
        let hex = value.trim().trim_start_matches('#');
        if !hex.is_ascii() {
            return Err(invalid());
        }

        let channel = |digits: &str| u8::from_str_radix(digits, 16).map_err(|_| invalid());
        match hex.len() {
            6 => Ok(Self::rgb(channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?)),
            3 => {
                let short = |index: usize| channel(&hex[index..index + 1]).map(|v| v * 17);
                Ok(Self::rgb(short(0)?, short(1)?, short(2)?))
            }
            _ => Err(invalid()),
        }
    }

    /// Uppercase `#RRGGBB`.
    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Channels in the unit interval (`channel / 255`).
    pub fn to_unit(&self) -> [f32; 3] {
        [self.r as f32 / 255.0, self.g as f32 / 255.0, self.b as f32 / 255.0]
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Color {
    type Err = StrokeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for Color {
    type Error = StrokeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

/// Rejected stroke construction input.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StrokeError {
    #[error("stroke endpoint is not a finite point")]
    NonFinitePoint,
    #[error("stroke width must be positive and finite, got {0}")]
    InvalidWidth(f32),
    #[error("invalid color {0:?}, expected #RRGGBB")]
    InvalidColor(String),
}

/// What a stroke does to the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrokeKind {
    /// Visible ink, painted on the overlay and exported.
    Ink,
    /// Reserved for non-destructive erasing. The editor erases by removing
    /// ink, so these are never painted or exported.
    Erase,
}

/// One straight annotation segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    kind: StrokeKind,
    color: Color,
    width: f32,
    from: Point,
    to: Point,
}

impl Stroke {
    pub fn ink(color: Color, width: f32, from: Point, to: Point) -> Result<Self, StrokeError> {
        Self::new(StrokeKind::Ink, color, width, from, to)
    }

    pub fn new(
        kind: StrokeKind,
        color: Color,
        width: f32,
        from: Point,
        to: Point,
    ) -> Result<Self, StrokeError> {
        if !width.is_finite() || width <= 0.0 {
            return Err(StrokeError::InvalidWidth(width));
        }
        if !from.is_finite() || !to.is_finite() {
            return Err(StrokeError::NonFinitePoint);
        }
        Ok(Self { kind, color, width, from, to })
    }

    pub fn kind(&self) -> StrokeKind {
        self.kind
    }

    pub fn is_ink(&self) -> bool {
        self.kind == StrokeKind::Ink
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn from(&self) -> Point {
        self.from
    }

    pub fn to(&self) -> Point {
        self.to
    }

    /// Distance from `point` to the nearest point of this segment.
    pub fn distance_to(&self, point: &Point) -> f32 {
        distance_to_segment(&self.from, &self.to, point)
    }

    /// Axis-aligned bounds `(min_x, min_y, max_x, max_y)` including the
    /// round caps.
    pub fn bounding_box(&self) -> (f32, f32, f32, f32) {
        let half = self.width / 2.0;
        (
            self.from.x.min(self.to.x) - half,
            self.from.y.min(self.to.y) - half,
            self.from.x.max(self.to.x) + half,
            self.from.y.max(self.to.y) + half,
        )
    }
}

/// Distance from `point` to the segment `start`–`end`.
///
/// The point is projected onto the line through the segment and the
/// projection parameter clamped to `[0, 1]`. A zero-length segment has no
/// usable projection, so the distance to `start` is returned.
pub fn distance_to_segment(start: &Point, end: &Point, point: &Point) -> f32 {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let length_sq = dx * dx + dy * dy;

    if length_sq < 1e-6 {
        return point.distance_to(start);
    }

    let t = ((point.x - start.x) * dx + (point.y - start.y) * dy) / length_sq;
    let t = t.clamp(0.0, 1.0);

    let closest = Point::new(start.x + t * dx, start.y + t * dy);
    point.distance_to(&closest)
}

/// Minimum distance between segments `a0`–`a1` and `b0`–`b1`; zero when
/// they touch or cross.
pub fn segment_distance(a0: &Point, a1: &Point, b0: &Point, b1: &Point) -> f32 {
    if segments_intersect(a0, a1, b0, b1) {
        return 0.0;
    }

    distance_to_segment(b0, b1, a0)
        .min(distance_to_segment(b0, b1, a1))
        .min(distance_to_segment(a0, a1, b0))
        .min(distance_to_segment(a0, a1, b1))
}

fn cross(origin: &Point, a: &Point, b: &Point) -> f32 {
    (a.x - origin.x) * (b.y - origin.y) - (a.y - origin.y) * (b.x - origin.x)
}

fn on_segment(start: &Point, end: &Point, point: &Point) -> bool {
    point.x >= start.x.min(end.x)
        && point.x <= start.x.max(end.x)
        && point.y >= start.y.min(end.y)
        && point.y <= start.y.max(end.y)
}

fn segments_intersect(a0: &Point, a1: &Point, b0: &Point, b1: &Point) -> bool {
    let d1 = cross(b0, b1, a0);
    let d2 = cross(b0, b1, a1);
    let d3 = cross(a0, a1, b0);
    let d4 = cross(a0, a1, b1);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    (d1 == 0.0 && on_segment(b0, b1, a0))
        || (d2 == 0.0 && on_segment(b0, b1, a1))
        || (d3 == 0.0 && on_segment(a0, a1, b0))
        || (d4 == 0.0 && on_segment(a0, a1, b1))
}
