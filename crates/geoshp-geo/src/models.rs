//! Conversions between the shapefile coordinate model and `geo` types.
//!
//! Only X/Y survive the conversion; callers keep their own coordinates and use
//! the `geo` values for planar predicates.

use geo::{Coord as GeoCoord, LineString, Point, Polygon};

pub use geoshp_core::models::{Coord, Geometry};

/// Convert a coordinate sequence to a `geo::LineString`
pub fn to_line_string(coords: &[Coord]) -> LineString<f64> {
    LineString::new(coords.iter().map(|c| GeoCoord { x: c.x, y: c.y }).collect())
}

/// Build a shell-only `geo::Polygon` from a ring
pub fn to_polygon(ring: &[Coord]) -> Polygon<f64> {
    Polygon::new(to_line_string(ring), vec![])
}

/// Convert a coordinate to a `geo::Point`
pub fn to_point(coord: &Coord) -> Point<f64> {
    Point::new(coord.x, coord.y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_line_string_drops_measures() {
        let coords = vec![Coord::xyzm(1.0, 2.0, 3.0, 4.0), Coord::xy(5.0, 6.0)];
        let line = to_line_string(&coords);
        assert_eq!(line.0.len(), 2);
        assert_eq!(line.0[0], GeoCoord { x: 1.0, y: 2.0 });
    }
}
