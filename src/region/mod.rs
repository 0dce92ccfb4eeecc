//! Region filter: restricts detections to configured polygons.

mod parse;
mod polygon;

pub use parse::parse_polygons;
pub use polygon::{Point, Polygon};

use crate::error::Result;
use std::str::FromStr;

/// A set of polygons a detection's center must fall into.
///
/// An empty set places no restriction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Region {
    polygons: Vec<Polygon>,
}

impl Region {
    /// Build a region from parsed polygons.
    pub fn new(polygons: Vec<Polygon>) -> Self {
        Self { polygons }
    }

    /// Region that lets every point through.
    pub fn unrestricted() -> Self {
        Self::default()
    }

    /// Parse a region string, see [`parse_polygons`].
    pub fn parse(input: &str) -> Result<Self> {
        parse_polygons(input).map(Self::new)
    }

    /// True when no polygons are configured.
    pub fn is_unrestricted(&self) -> bool {
        self.polygons.is_empty()
    }

    /// The configured polygons.
    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    /// Whether `point` passes the filter.
    pub fn contains(&self, point: Point) -> bool {
        self.is_unrestricted() || self.polygons.iter().any(|p| p.contains(point))
    }
}

impl FromStr for Region {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
