//! Property tests for shape record encoding.
//!
//! Geometries are generated in the canonical form the decoder produces: single
//! lines as `LineString`, clockwise shells with counter-clockwise holes, one
//! polygon as `Polygon`, and measures well above the no-data threshold.

use geoshp_core::models::{Coord, Geometry, Patch, PatchKind, ShapeType};
use geoshp_store::shp::codec::{decode, encode, length_in_words, record_envelope};
use proptest::collection::vec;
use proptest::prelude::*;

fn ordinate() -> impl Strategy<Value = f64> {
    -1.0e6..1.0e6f64
}

fn coord(z: bool, m: bool) -> impl Strategy<Value = Coord> {
    (ordinate(), ordinate(), ordinate(), ordinate()).prop_map(move |(x, y, zv, mv)| Coord {
        x,
        y,
        z: z.then_some(zv),
        m: m.then_some(mv),
    })
}

/// Closed axis-aligned square; shells run clockwise, holes counter-clockwise
fn square(x0: f64, y0: f64, size: f64, clockwise: bool, z: Option<f64>, m: Option<f64>) -> Vec<Coord> {
    let corners = [(x0, y0), (x0, y0 + size), (x0 + size, y0 + size), (x0 + size, y0), (x0, y0)];
    let mut ring: Vec<Coord> = corners.iter().map(|&(x, y)| Coord { x, y, z, m }).collect();
    if !clockwise {
        ring.reverse();
    }
    ring
}

fn line(z: bool, m: bool) -> impl Strategy<Value = Geometry> {
    prop_oneof![
        vec(coord(z, m), 2..12).prop_map(|coordinates| Geometry::LineString { coordinates }),
        vec(vec(coord(z, m), 2..6), 2..5).prop_map(|coordinates| Geometry::MultiLineString { coordinates }),
    ]
}

fn polygon(z: bool, m: bool) -> impl Strategy<Value = Geometry> {
    vec((10.0..50.0f64, any::<bool>(), ordinate(), ordinate()), 1..4).prop_map(move |shells| {
        let mut polygons: Vec<Vec<Vec<Coord>>> = shells
            .iter()
            .enumerate()
            .map(|(i, &(size, with_hole, zv, mv))| {
                let x0 = i as f64 * 100.0;
                let (zo, mo) = (z.then_some(zv), m.then_some(mv));
                let mut rings = vec![square(x0, 0.0, size, true, zo, mo)];
                if with_hole {
                    rings.push(square(x0 + 2.0, 2.0, size / 4.0, false, zo, mo));
                }
                rings
            })
            .collect();
        if polygons.len() == 1 {
            Geometry::Polygon { coordinates: polygons.remove(0) }
        } else {
            Geometry::MultiPolygon { coordinates: polygons }
        }
    })
}

fn geometry() -> impl Strategy<Value = Geometry> {
    (any::<bool>(), any::<bool>()).prop_flat_map(|(z, m)| {
        prop_oneof![
            coord(z, m).prop_map(|coordinates| Geometry::Point { coordinates }),
            vec(coord(z, m), 1..10).prop_map(|coordinates| Geometry::MultiPoint { coordinates }),
            line(z, m),
            polygon(z, m),
        ]
    })
}

fn patch_kind() -> impl Strategy<Value = PatchKind> {
    prop_oneof![
        Just(PatchKind::TriangleStrip),
        Just(PatchKind::TriangleFan),
        Just(PatchKind::OuterRing),
        Just(PatchKind::InnerRing),
        Just(PatchKind::FirstRing),
        Just(PatchKind::Ring),
    ]
}

fn multipatch() -> impl Strategy<Value = Geometry> {
    any::<bool>().prop_flat_map(|m| {
        vec((patch_kind(), vec(coord(true, m), 3..8)), 1..4).prop_map(|parts| Geometry::MultiPatch {
            patches: parts.into_iter().map(|(kind, coordinates)| Patch { kind, coordinates }).collect(),
        })
    })
}

proptest! {
    #[test]
    fn encoded_record_decodes_to_same_geometry(geometry in geometry()) {
        let shape_type = geometry.shape_type();
        let content = encode(&geometry, shape_type).unwrap();

        prop_assert_eq!(content.len(), 2 * length_in_words(&geometry, shape_type).unwrap() as usize);

        let (decoded_type, decoded) = decode(&content, shape_type).unwrap();
        prop_assert_eq!(decoded_type, shape_type);
        prop_assert_eq!(decoded, geometry);
    }

    #[test]
    fn stored_envelope_matches_geometry(geometry in geometry()) {
        let shape_type = geometry.shape_type();
        let content = encode(&geometry, shape_type).unwrap();

        prop_assert_eq!(record_envelope(&content).unwrap(), geometry.envelope());
    }

    #[test]
    fn multipatch_keeps_part_kinds(geometry in multipatch()) {
        let content = encode(&geometry, ShapeType::MultiPatch).unwrap();
        let (decoded_type, decoded) = decode(&content, ShapeType::MultiPatch).unwrap();

        prop_assert_eq!(decoded_type, ShapeType::MultiPatch);
        prop_assert_eq!(decoded, geometry);
    }

    #[test]
    fn wider_file_type_accepts_narrower_geometry(points in vec((ordinate(), ordinate()), 1..6)) {
        let geometry = Geometry::MultiPoint {
            coordinates: points.iter().map(|&(x, y)| Coord::xy(x, y)).collect(),
        };
        let content = encode(&geometry, ShapeType::MultiPointZ).unwrap();
        let (_, decoded) = decode(&content, ShapeType::MultiPointZ).unwrap();

        // Missing Z is stored as zero and missing M as no-data
        let Geometry::MultiPoint { coordinates } = decoded else {
            panic!("expected a multipoint");
        };
        prop_assert_eq!(coordinates.len(), points.len());
        for (c, &(x, y)) in coordinates.iter().zip(points.iter()) {
            prop_assert_eq!((c.x, c.y, c.z, c.m), (x, y, Some(0.0), None));
        }
    }
}
