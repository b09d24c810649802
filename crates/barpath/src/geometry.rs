//! Pixel-space primitives shared by detection, tracking and evaluation.

use std::fmt;
use std::str::FromStr;

/// Integer pixel position in frame-absolute coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Truncate a sub-pixel position toward zero.
    pub fn truncated(xy: [f32; 2]) -> Self {
        Self::new(xy[0] as i32, xy[1] as i32)
    }

    /// Euclidean distance in pixels.
    pub fn distance(self, other: Point) -> f64 {
        let dx = self.x as f64 - other.x as f64;
        let dy = self.y as f64 - other.y as f64;
        (dx * dx + dy * dy).sqrt()
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.x, self.y)
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

/// Axis-aligned search rectangle, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether `p` lies inside the rectangle (right/bottom edges exclusive).
    pub fn contains(&self, p: Point) -> bool {
        let (x0, y0) = (self.x as i64, self.y as i64);
        let (px, py) = (p.x as i64, p.y as i64);
        px >= x0 && py >= y0 && px < x0 + self.width as i64 && py < y0 + self.height as i64
    }

    /// Intersect with a `width` x `height` frame. `None` if nothing is left.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Region> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let clamped = Region {
            x: self.x,
            y: self.y,
            width: self.width.min(width - self.x),
            height: self.height.min(height - self.y),
        };
        (!clamped.is_empty()).then_some(clamped)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.width, self.height)
    }
}

/// Error returned when a region string is not `x,y,w,h`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid region '{input}': expected four non-negative integers 'x,y,w,h'")]
pub struct RegionParseError {
    pub input: String,
}

impl FromStr for Region {
    type Err = RegionParseError;

    /// Accepts `x,y,w,h` with commas and/or whitespace as separators.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || RegionParseError {
            input: s.to_string(),
        };
        let parts: Vec<u32> = s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .map(|t| t.parse::<u32>().map_err(|_| err()))
            .collect::<Result<_, _>>()?;
        match parts.as_slice() {
            [x, y, w, h] => Ok(Region::new(*x, *y, *w, *h)),
            _ => Err(err()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_distance_is_euclidean() {
        assert_eq!(Point::new(0, 0).distance(Point::new(3, 4)), 5.0);
    }

    #[test]
    fn distance_spans_full_coordinate_range() {
        let d = Point::new(i32::MAX, 0).distance(Point::new(i32::MIN, 0));
        assert_eq!(d, u32::MAX as f64);
        let d = Point::new(0, i32::MIN).distance(Point::new(0, i32::MAX));
        assert_eq!(d, u32::MAX as f64);
    }

    #[test]
    fn subpixel_truncates_toward_zero() {
        assert_eq!(Point::truncated([3.9, -2.7]), Point::new(3, -2));
        assert_eq!(Point::truncated([120.99, 0.5]), Point::new(120, 0));
    }

    #[test]
    fn region_parses_comma_and_space_forms() {
        assert_eq!("10,20,30,40".parse::<Region>(), Ok(Region::new(10, 20, 30, 40)));
        assert_eq!("10 20 30 40".parse::<Region>(), Ok(Region::new(10, 20, 30, 40)));
        assert_eq!("1, 2, 3, 4".parse::<Region>(), Ok(Region::new(1, 2, 3, 4)));
        assert!("1,2,3".parse::<Region>().is_err());
        assert!("1,2,-3,4".parse::<Region>().is_err());
    }

    #[test]
    fn region_clamps_to_frame() {
        let r = Region::new(90, 50, 40, 10);
        assert_eq!(r.clamp_to(100, 100), Some(Region::new(90, 50, 10, 10)));
        assert_eq!(r.clamp_to(80, 100), None);
        assert_eq!(Region::new(0, 0, 0, 5).clamp_to(100, 100), None);
    }

    #[test]
    fn region_contains_is_half_open() {
        let r = Region::new(10, 10, 5, 5);
        assert!(r.contains(Point::new(10, 10)));
        assert!(r.contains(Point::new(14, 14)));
        assert!(!r.contains(Point::new(15, 14)));
        assert!(!r.contains(Point::new(-1, 12)));
    }
}
