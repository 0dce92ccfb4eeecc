//! Points and polygons with an even-odd containment test.

use serde::{Deserialize, Serialize};

/// A point in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Point {
    /// Create a point.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A simple polygon with at least three vertices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    vertices: Vec<Point>,
}

impl Polygon {
    /// Minimum number of vertices.
    pub const MIN_VERTICES: usize = 3;

    /// Build a polygon, returning `None` with fewer than three vertices.
    pub fn new(vertices: Vec<Point>) -> Option<Self> {
        (vertices.len() >= Self::MIN_VERTICES).then_some(Self { vertices })
    }

    /// The polygon's vertices in order.
    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    /// Ray-casting (even-odd) containment test.
    ///
    /// A horizontal ray is cast from `point` towards +x and the edges it
    /// crosses are counted. Points exactly on an edge may land either way.
    pub fn contains(&self, point: Point) -> bool {
        let mut inside = false;
        let n = self.vertices.len();
        let mut j = n - 1;

        for i in 0..n {
            let a = self.vertices[i];
            let b = self.vertices[j];

            if (a.y > point.y) != (b.y > point.y) {
                let x_cross = (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x;
                if point.x < x_cross {
                    inside = !inside;
                }
            }
            j = i;
        }

        inside
    }
}
