//! CLI argument validators.

use crate::region::Point;

/// Parse a point given as `X,Y`.
pub fn parse_point(s: &str) -> Result<Point, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("'{s}' is not a point, expected X,Y"))?;

    let coord = |v: &str| -> Result<f64, String> {
        let value: f64 = v
            .trim()
            .parse()
            .map_err(|_| format!("'{}' is not a valid number", v.trim()))?;
        if !value.is_finite() {
            return Err(format!("coordinate must be finite, got {value}"));
        }
        Ok(value)
    };

    Ok(Point::new(coord(x)?, coord(y)?))
}
