//! Region string parser.
//!
//! Format: `(x,y),(x,y),(x,y)` for one polygon, with `;` between polygons.
//! Blank input means no region restriction.

use super::polygon::{Point, Polygon};
use crate::error::{Error, Result};

/// Parse a region string into polygons.
///
/// Fails on non-numeric coordinates, odd coordinate counts, and polygons
/// with fewer than three vertices.
pub fn parse_polygons(input: &str) -> Result<Vec<Polygon>> {
    let mut polygons = Vec::new();

    for part in input.split(';') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        polygons.push(parse_polygon(input, part)?);
    }

    Ok(polygons)
}

fn parse_polygon(input: &str, part: &str) -> Result<Polygon> {
    let invalid = |reason: String| Error::InvalidRegion {
        input: input.to_string(),
        reason,
    };

    let tokens: Vec<&str> = part
        .split(|c: char| c == '(' || c == ')' || c == ',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.len() % 2 != 0 {
        return Err(invalid(format!(
            "odd number of coordinates ({}) in '{part}'",
            tokens.len()
        )));
    }

    let mut vertices = Vec::with_capacity(tokens.len() / 2);
    for pair in tokens.chunks_exact(2) {
        let x = parse_coordinate(pair[0]).ok_or_else(|| {
            invalid(format!("non-numeric coordinate '{}'", pair[0]))
        })?;
        let y = parse_coordinate(pair[1]).ok_or_else(|| {
            invalid(format!("non-numeric coordinate '{}'", pair[1]))
        })?;
        vertices.push(Point::new(x, y));
    }

    let count = vertices.len();
    Polygon::new(vertices).ok_or_else(|| {
        invalid(format!(
            "polygon '{part}' has {count} vertices, at least {} required",
            Polygon::MIN_VERTICES
        ))
    })
}

fn parse_coordinate(token: &str) -> Option<f64> {
    token.parse::<f64>().ok().filter(|v| v.is_finite())
}
