//! Ring orientation for the shapefile polygon convention.
//!
//! On disk, exterior rings wind clockwise and holes counter-clockwise. The
//! in-memory model does not track winding, so the writer normalises every
//! polygon and the reader uses winding to tell shells from holes.

use geo::winding_order::WindingOrder;
use geo::{Intersects, Winding};

use crate::models::{to_line_string, to_point, to_polygon, Coord, Geometry};

/// Winding order of a ring, `None` for rings without area
pub fn winding_order(ring: &[Coord]) -> Option<WindingOrder> {
    to_line_string(ring).winding_order()
}

pub fn is_clockwise(ring: &[Coord]) -> bool {
    winding_order(ring) == Some(WindingOrder::Clockwise)
}

/// Close a ring by repeating its first vertex when needed
pub fn close_ring(ring: &mut Vec<Coord>) {
    if let (Some(first), Some(last)) = (ring.first().copied(), ring.last()) {
        if first.x != last.x || first.y != last.y {
            ring.push(first);
        }
    }
}

/// Orient a polygon's rings: the exterior clockwise, every hole counter-clockwise
pub fn orient_polygon(rings: &mut [Vec<Coord>]) {
    for (i, ring) in rings.iter_mut().enumerate() {
        let want = if i == 0 { WindingOrder::Clockwise } else { WindingOrder::CounterClockwise };
        if let Some(order) = winding_order(ring) {
            if order != want {
                ring.reverse();
            }
        }
    }
}

/// Close and orient every polygon ring of a geometry. Other geometries are returned unchanged.
pub fn normalize(geometry: &Geometry) -> Geometry {
    match geometry {
        Geometry::Polygon { coordinates } => {
            let mut rings = coordinates.clone();
            rings.iter_mut().for_each(close_ring);
            orient_polygon(&mut rings);
            Geometry::Polygon { coordinates: rings }
        }
        Geometry::MultiPolygon { coordinates } => {
            let mut polygons = coordinates.clone();
            for rings in polygons.iter_mut() {
                rings.iter_mut().for_each(close_ring);
                orient_polygon(rings);
            }
            Geometry::MultiPolygon { coordinates: polygons }
        }
        other => other.clone(),
    }
}

/// Group a flat ring list, as stored in a polygon record, into polygons.
///
/// Clockwise rings start a new polygon. A counter-clockwise ring becomes a hole
/// of the latest shell that touches its first vertex, falling back to the most
/// recent shell. Holes seen before any shell are promoted to shells.
pub fn assemble_polygons(rings: Vec<Vec<Coord>>) -> Vec<Vec<Vec<Coord>>> {
    let mut polygons: Vec<Vec<Vec<Coord>>> = Vec::new();
    let mut orphans = Vec::new();

    for ring in rings {
        if winding_order(&ring) != Some(WindingOrder::CounterClockwise) {
            polygons.push(vec![ring]);
            continue;
        }

        let Some(probe) = ring.first().map(to_point) else {
            continue;
        };
        let owner = polygons
            .iter()
            .rposition(|polygon| to_polygon(&polygon[0]).intersects(&probe))
            .or_else(|| polygons.len().checked_sub(1));

        match owner {
            Some(i) => polygons[i].push(ring),
            None => orphans.push(ring),
        }
    }

    if !orphans.is_empty() {
        tracing::debug!("Promoting {} hole ring(s) without a shell to polygons", orphans.len());
        polygons.extend(orphans.into_iter().map(|ring| vec![ring]));
    }

    polygons
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(points: &[[f64; 2]]) -> Vec<Coord> {
        points.iter().map(|p| Coord::xy(p[0], p[1])).collect()
    }

    fn square_cw(x0: f64, y0: f64, size: f64) -> Vec<Coord> {
        ring(&[[x0, y0], [x0, y0 + size], [x0 + size, y0 + size], [x0 + size, y0], [x0, y0]])
    }

    #[test]
    fn test_winding() {
        let cw = square_cw(0.0, 0.0, 1.0);
        assert!(is_clockwise(&cw));

        let mut ccw = cw.clone();
        ccw.reverse();
        assert!(!is_clockwise(&ccw));

        assert_eq!(winding_order(&ring(&[[0.0, 0.0], [1.0, 1.0], [0.0, 0.0]])), None);
    }

    #[test]
    fn test_normalize_orients_and_closes() {
        let mut shell = square_cw(0.0, 0.0, 10.0);
        shell.reverse();
        shell.pop();
        let hole = square_cw(2.0, 2.0, 2.0);

        let normalized = normalize(&Geometry::Polygon { coordinates: vec![shell, hole] });
        let Geometry::Polygon { coordinates } = normalized else {
            panic!("Expected Polygon geometry");
        };
        assert_eq!(coordinates[0].len(), 5);
        assert!(is_clockwise(&coordinates[0]));
        assert_eq!(winding_order(&coordinates[1]), Some(WindingOrder::CounterClockwise));
    }

    #[test]
    fn test_assemble_assigns_holes_to_containing_shell() {
        let mut hole_in_first = square_cw(1.0, 1.0, 1.0);
        hole_in_first.reverse();

        let polygons = assemble_polygons(vec![
            square_cw(0.0, 0.0, 5.0),
            square_cw(10.0, 10.0, 5.0),
            hole_in_first,
        ]);

        assert_eq!(polygons.len(), 2);
        assert_eq!(polygons[0].len(), 2);
        assert_eq!(polygons[1].len(), 1);
    }

    #[test]
    fn test_assemble_promotes_orphan_holes() {
        let mut hole = square_cw(1.0, 1.0, 1.0);
        hole.reverse();
        let polygons = assemble_polygons(vec![hole]);
        assert_eq!(polygons.len(), 1);
    }
}
