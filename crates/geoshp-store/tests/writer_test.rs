//! Consistency of the `.shp`, `.shx` and `.dbf` produced by the set writer

use std::io::Cursor;

use encoding_rs::WINDOWS_1252;
use geoshp_core::config::OverflowPolicy;
use geoshp_core::models::{
    AttributeDescriptor, AttributeKind, AttributeValue, Coord, Envelope, Geometry, Schema, ShapeType,
};
use geoshp_store::dbf::{DbaseHeader, DbaseReader, DbaseWriter};
use geoshp_store::shp::{codec, IndexReader, ShapefileHeader, ShapefileReader, ShapefileWriter};
use geoshp_store::ShapefileSetWriter;
use proptest::collection::vec;
use proptest::prelude::*;

type Sink = Cursor<Vec<u8>>;

fn schema() -> Schema {
    Schema::new("points")
        .attribute(AttributeDescriptor::new("the_geom", AttributeKind::Geometry))
        .attribute(AttributeDescriptor::new("id", AttributeKind::Integer))
}

fn set_writer() -> ShapefileSetWriter<Sink> {
    let shapes = ShapefileWriter::new(Cursor::new(Vec::new()), Cursor::new(Vec::new())).unwrap();
    let header = DbaseHeader::from_schema(&schema()).unwrap();
    let rows = DbaseWriter::new(Cursor::new(Vec::new()), header, WINDOWS_1252, OverflowPolicy::Fail).unwrap();
    ShapefileSetWriter::new(shapes, rows)
}

fn write_set(geometries: &[Geometry]) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
    let mut writer = set_writer();
    for (i, geometry) in geometries.iter().enumerate() {
        writer.write_feature(geometry, &[AttributeValue::Integer(i as i64)]).unwrap();
    }
    writer.close().unwrap();
    let (shp, shx, dbf) = writer.into_inner();
    (shp.into_inner(), shx.into_inner(), dbf.into_inner())
}

fn point_or_null() -> impl Strategy<Value = Geometry> {
    prop_oneof![
        4 => (-1.0e4..1.0e4f64, -1.0e4..1.0e4f64).prop_map(|(x, y)| Geometry::point(x, y)),
        1 => Just(Geometry::Null),
    ]
}

proptest! {
    #[test]
    fn headers_agree_with_records(geometries in vec(point_or_null(), 0..30)) {
        let (shp, shx, dbf) = write_set(&geometries);

        let header = ShapefileHeader::read(&mut &shp[..], "shp").unwrap();
        let expected_length: usize = 100 + geometries
            .iter()
            .map(|g| 8 + codec::encode(g, ShapeType::Point).unwrap().len())
            .sum::<usize>();
        prop_assert_eq!(header.file_length_bytes() as usize, shp.len());
        prop_assert_eq!(shp.len(), expected_length);

        let mut index = IndexReader::new(Cursor::new(shx.clone())).unwrap();
        prop_assert_eq!(index.count(), geometries.len());
        prop_assert_eq!(shx.len(), 100 + 8 * geometries.len());
        prop_assert_eq!(index.header().shape_type, header.shape_type);

        let mut offset = 100;
        for (i, geometry) in geometries.iter().enumerate() {
            let entry = index.entry(i).unwrap();
            prop_assert_eq!(entry.offset_bytes(), offset as u64);
            offset += 8 + codec::encode(geometry, ShapeType::Point).unwrap().len();
        }

        let rows = DbaseReader::new(Cursor::new(dbf), WINDOWS_1252).unwrap();
        prop_assert_eq!(rows.row_count(), geometries.len());

        let mut bounds = Envelope::null();
        geometries.iter().for_each(|g| bounds.merge(&g.envelope()));
        prop_assert_eq!(header.bounds.xy_or_zero(), bounds.xy_or_zero());

        let expected_type = if geometries.iter().all(|g| g.is_empty()) { ShapeType::Null } else { ShapeType::Point };
        prop_assert_eq!(header.shape_type, expected_type);
    }
}

fn ring(points: &[[f64; 3]]) -> Vec<Coord> {
    points.iter().map(|p| Coord::xyz(p[0], p[1], p[2])).collect()
}

fn polygon_z_source() -> Vec<u8> {
    let shell = ring(&[[0.0, 0.0, 1.0], [0.0, 10.0, 2.0], [10.0, 10.0, 3.0], [10.0, 0.0, 4.0], [0.0, 0.0, 1.0]]);
    let hole = ring(&[[2.0, 2.0, 0.5], [4.0, 2.0, 0.5], [4.0, 4.0, 0.5], [2.0, 4.0, 0.5], [2.0, 2.0, 0.5]]);
    let far = ring(&[[20.0, 0.0, 7.0], [20.0, 5.0, 7.0], [25.0, 5.0, 7.0], [25.0, 0.0, 7.0], [20.0, 0.0, 7.0]]);

    let geometries = vec![
        Geometry::Polygon { coordinates: vec![shell.clone(), hole] },
        Geometry::Null,
        Geometry::MultiPolygon { coordinates: vec![vec![shell], vec![far]] },
    ];
    write_set(&geometries).0
}

fn finish(mut writer: ShapefileWriter<Sink>) -> (Vec<u8>, Vec<u8>) {
    writer.close().unwrap();
    let (shp, shx) = writer.into_inner();
    (shp.into_inner(), shx.into_inner())
}

#[test]
fn test_transfer_matches_decode_and_encode() {
    let source = polygon_z_source();

    let mut reader = ShapefileReader::new(Cursor::new(source.clone())).unwrap();
    let mut transferred = ShapefileWriter::new(Cursor::new(Vec::new()), Cursor::new(Vec::new())).unwrap();
    while reader.transfer_to(&mut transferred).unwrap().is_some() {}

    let reader = ShapefileReader::new(Cursor::new(source.clone())).unwrap();
    let mut reencoded = ShapefileWriter::new(Cursor::new(Vec::new()), Cursor::new(Vec::new())).unwrap();
    for record in reader {
        reencoded.write_geometry(&record.unwrap().geometry).unwrap();
    }

    let (transferred_shp, transferred_shx) = finish(transferred);
    let (reencoded_shp, reencoded_shx) = finish(reencoded);

    assert_eq!(transferred_shp, reencoded_shp, "Transfer should produce the bytes a re-encode does");
    assert_eq!(transferred_shx, reencoded_shx);
    assert_eq!(transferred_shp, source, "A full transfer reproduces the source file");
}

#[test]
fn test_polygon_z_header_ranges() {
    let source = polygon_z_source();
    let header = ShapefileHeader::read(&mut &source[..], "shp").unwrap();

    assert_eq!(header.shape_type, ShapeType::PolygonZ);
    assert_eq!(header.bounds.xy_or_zero(), [0.0, 0.0, 25.0, 10.0]);
    assert_eq!(header.bounds.z_or_zero(), [0.5, 7.0]);
}

#[test]
fn test_rejected_feature_keeps_files_in_step() {
    let mut writer = set_writer();
    writer.write_feature(&Geometry::point(1.0, 1.0), &[AttributeValue::Integer(1)]).unwrap();

    // Wrong family for a point file
    let line = Geometry::line_string(vec![[0.0, 0.0], [1.0, 1.0]]);
    assert!(writer.write_feature(&line, &[AttributeValue::Integer(2)]).is_err());

    // Too wide for the integer column under the strict policy
    let err = writer
        .write_feature(&Geometry::point(2.0, 2.0), &[AttributeValue::Integer(12_345_678_901)])
        .unwrap_err();
    assert!(matches!(err, geoshp_core::ShpError::FieldOverflow { .. }), "Unexpected error: {}", err);

    writer.write_feature(&Geometry::point(3.0, 3.0), &[AttributeValue::Integer(3)]).unwrap();
    writer.close().unwrap();

    assert_eq!(writer.shapes().record_count(), 2);
    assert_eq!(writer.rows().record_count(), 2);
}
