//! Binary encoding of shape record contents.
//!
//! A record's content is the little-endian part that follows the 8-byte record
//! header: the shape type code and the family-specific payload. Point records
//! hold bare ordinates; multipoint, polyline, polygon and multipatch records
//! start with a bounding box, followed by part indices (where the family has
//! parts), the X/Y array, then the optional Z and M ranges and arrays.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io;

use geoshp_core::error::{Result, ShpError};
use geoshp_core::models::{Coord, Envelope, Geometry, Patch, PatchKind, ShapeFamily, ShapeType};
use geoshp_geo::orientation::{assemble_polygons, normalize};
use geoshp_geo::validation::validate_geometry;

use super::{NO_DATA, NO_DATA_THRESHOLD};

/// Coordinates flattened into the part/point arrays of a record
struct Flattened {
    parts: Vec<usize>,
    part_kinds: Vec<PatchKind>,
    coords: Vec<Coord>,
}

impl Flattened {
    fn single(coords: Vec<Coord>) -> Self {
        Self { parts: vec![0], part_kinds: Vec::new(), coords }
    }

    fn from_parts<'a>(parts: impl IntoIterator<Item = &'a Vec<Coord>>) -> Self {
        let mut flat = Self { parts: Vec::new(), part_kinds: Vec::new(), coords: Vec::new() };
        for part in parts {
            flat.parts.push(flat.coords.len());
            flat.coords.extend_from_slice(part);
        }
        flat
    }
}

/// Content length in bytes for a record of `shape_type` with the given counts
fn payload_length(shape_type: ShapeType, num_parts: usize, num_points: usize) -> usize {
    let ranges = |n: usize| 16 + 8 * n;
    let measures = if shape_type.has_z() { 2 * ranges(num_points) } else if shape_type.has_m() { ranges(num_points) } else { 0 };

    4 + match shape_type.family() {
        ShapeFamily::Null => 0,
        ShapeFamily::Point => 16 + if shape_type.has_z() { 16 } else if shape_type.has_m() { 8 } else { 0 },
        ShapeFamily::MultiPoint => 32 + 4 + 16 * num_points + measures,
        ShapeFamily::Line | ShapeFamily::Polygon => 32 + 8 + 4 * num_parts + 16 * num_points + measures,
        ShapeFamily::MultiPatch => 32 + 8 + 8 * num_parts + 16 * num_points + measures,
    }
}

/// Check the geometry against the committed file type and flatten it
fn flatten(geometry: &Geometry, shape_type: ShapeType) -> Result<Option<Flattened>> {
    if geometry.is_empty() {
        return Ok(None);
    }

    let found = geometry.shape_type();
    if !shape_type.accepts(found) {
        return Err(ShpError::ShapeTypeMismatch { expected: shape_type, found });
    }

    let geometry = normalize(geometry);
    let validation = validate_geometry(&geometry);
    if !validation.is_valid {
        return Err(ShpError::InvalidGeometry { record: 0, reason: validation.summary() });
    }

    let flat = match geometry {
        Geometry::Null => return Ok(None),
        Geometry::Point { coordinates } => Flattened::single(vec![coordinates]),
        Geometry::MultiPoint { coordinates } | Geometry::LineString { coordinates } => {
            Flattened::single(coordinates)
        }
        Geometry::MultiLineString { coordinates } | Geometry::Polygon { coordinates } => {
            Flattened::from_parts(coordinates.iter())
        }
        Geometry::MultiPolygon { coordinates } => Flattened::from_parts(coordinates.iter().flatten()),
        Geometry::MultiPatch { patches } => {
            let mut flat = Flattened::from_parts(patches.iter().map(|p| &p.coordinates));
            flat.part_kinds = patches.iter().map(|p| p.kind).collect();
            flat
        }
    };
    Ok(Some(flat))
}

/// Content length, in 16-bit words, of the record `encode` would produce
pub fn length_in_words(geometry: &Geometry, shape_type: ShapeType) -> Result<u32> {
    let bytes = match flatten(geometry, shape_type)? {
        None => payload_length(ShapeType::Null, 0, 0),
        Some(flat) => payload_length(shape_type, flat.parts.len(), flat.coords.len()),
    };
    Ok((bytes / 2) as u32)
}

/// Encode a geometry as the content of a record in a file of `shape_type`.
///
/// Empty geometries become NULL records. Nothing is returned for geometries that
/// fail validation, so a bad geometry never produces partial bytes.
pub fn encode(geometry: &Geometry, shape_type: ShapeType) -> Result<Vec<u8>> {
    let Some(flat) = flatten(geometry, shape_type)? else {
        let mut buf = Vec::with_capacity(4);
        buf.write_i32::<LittleEndian>(ShapeType::Null.id())?;
        return Ok(buf);
    };

    let expected = payload_length(shape_type, flat.parts.len(), flat.coords.len());
    let mut buf = Vec::with_capacity(expected);
    buf.write_i32::<LittleEndian>(shape_type.id())?;

    if shape_type.family() == ShapeFamily::Point {
        let c = flat.coords[0];
        buf.write_f64::<LittleEndian>(c.x)?;
        buf.write_f64::<LittleEndian>(c.y)?;
        if shape_type.has_z() {
            buf.write_f64::<LittleEndian>(c.z.unwrap_or(0.0))?;
        }
        if shape_type.has_m() {
            buf.write_f64::<LittleEndian>(c.m.unwrap_or(NO_DATA))?;
        }
    } else {
        let bounds = flat.coords.iter().fold(Envelope::null(), |mut env, c| {
            env.expand_to_include(c);
            env
        });
        for ordinate in [bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y] {
            buf.write_f64::<LittleEndian>(ordinate)?;
        }

        if shape_type.family() != ShapeFamily::MultiPoint {
            buf.write_i32::<LittleEndian>(flat.parts.len() as i32)?;
        }
        buf.write_i32::<LittleEndian>(flat.coords.len() as i32)?;
        if shape_type.family() != ShapeFamily::MultiPoint {
            for start in &flat.parts {
                buf.write_i32::<LittleEndian>(*start as i32)?;
            }
        }
        if shape_type.family() == ShapeFamily::MultiPatch {
            for i in 0..flat.parts.len() {
                let kind = flat.part_kinds.get(i).copied().unwrap_or(PatchKind::Ring);
                buf.write_i32::<LittleEndian>(kind.id())?;
            }
        }

        for c in &flat.coords {
            buf.write_f64::<LittleEndian>(c.x)?;
            buf.write_f64::<LittleEndian>(c.y)?;
        }

        if shape_type.has_z() {
            let z: Vec<f64> = flat.coords.iter().map(|c| c.z.unwrap_or(0.0)).collect();
            write_measure_block(&mut buf, &z)?;
        }
        if shape_type.has_m() {
            let m: Vec<f64> = flat.coords.iter().map(|c| c.m.unwrap_or(NO_DATA)).collect();
            write_measure_block(&mut buf, &m)?;
        }
    }

    if buf.len() != expected {
        return Err(ShpError::format(
            "shp",
            format!("Encoded {} bytes for a {} record, expected {}", buf.len(), shape_type, expected),
        ));
    }
    Ok(buf)
}

/// Range followed by the values; no-data values are ignored in the range
fn write_measure_block(buf: &mut Vec<u8>, values: &[f64]) -> io::Result<()> {
    let (min, max) = values
        .iter()
        .filter(|v| **v > NO_DATA_THRESHOLD)
        .fold(None, |range: Option<(f64, f64)>, v| match range {
            None => Some((*v, *v)),
            Some((lo, hi)) => Some((lo.min(*v), hi.max(*v))),
        })
        .unwrap_or((NO_DATA, NO_DATA));
    buf.write_f64::<LittleEndian>(min)?;
    buf.write_f64::<LittleEndian>(max)?;
    for v in values {
        buf.write_f64::<LittleEndian>(*v)?;
    }
    Ok(())
}

fn truncated(e: io::Error) -> ShpError {
    match e.kind() {
        io::ErrorKind::UnexpectedEof => ShpError::format("shp", "Record content ends before its payload"),
        _ => ShpError::Io(e),
    }
}

fn read_f64(cursor: &mut &[u8]) -> Result<f64> {
    cursor.read_f64::<LittleEndian>().map_err(truncated)
}

fn measure(value: f64) -> Option<f64> {
    (value > NO_DATA_THRESHOLD).then_some(value)
}

/// Read the shape type code at the start of a record's content
pub fn record_shape_type(content: &[u8]) -> Result<ShapeType> {
    let mut cursor = content;
    ShapeType::from_id(cursor.read_i32::<LittleEndian>().map_err(truncated)?)
}

/// Decode record content from a file whose header declares `expected`.
///
/// Returns the record's own shape type with the geometry. Every byte of
/// `content` must be consumed by a non-null record.
pub fn decode(content: &[u8], expected: ShapeType) -> Result<(ShapeType, Geometry)> {
    let (shape_type, geometry, consumed) = decode_counted(content, expected)?;
    if consumed != content.len() {
        return Err(ShpError::format(
            "shp",
            format!("{} trailing bytes after {} record payload", content.len() - consumed, shape_type),
        ));
    }
    Ok((shape_type, geometry))
}

/// Decode record content and report how many bytes the payload used.
///
/// NULL records report the whole content as used, whatever its length.
pub fn decode_counted(content: &[u8], expected: ShapeType) -> Result<(ShapeType, Geometry, usize)> {
    let mut cursor = content;
    let shape_type = ShapeType::from_id(cursor.read_i32::<LittleEndian>().map_err(truncated)?)?;

    if shape_type.is_null() {
        return Ok((shape_type, Geometry::Null, content.len()));
    }
    if shape_type.family() != expected.family() {
        return Err(ShpError::ShapeTypeMismatch { expected, found: shape_type });
    }

    let geometry = match shape_type.family() {
        ShapeFamily::Point => decode_point(&mut cursor, shape_type)?,
        ShapeFamily::MultiPoint => decode_multi_point(&mut cursor, shape_type)?,
        ShapeFamily::Line | ShapeFamily::Polygon | ShapeFamily::MultiPatch => {
            decode_parts(&mut cursor, shape_type)?
        }
        ShapeFamily::Null => Geometry::Null,
    };
    Ok((shape_type, geometry, content.len() - cursor.len()))
}

fn decode_point(cursor: &mut &[u8], shape_type: ShapeType) -> Result<Geometry> {
    let x = cursor.read_f64::<LittleEndian>().map_err(truncated)?;
    let y = cursor.read_f64::<LittleEndian>().map_err(truncated)?;
    let mut coord = Coord::xy(x, y);
    if shape_type.has_z() {
        coord.z = Some(cursor.read_f64::<LittleEndian>().map_err(truncated)?);
        // M is optional in PointZ records
        if cursor.len() >= 8 {
            coord.m = measure(cursor.read_f64::<LittleEndian>().map_err(truncated)?);
        }
    } else if shape_type.has_m() {
        coord.m = measure(cursor.read_f64::<LittleEndian>().map_err(truncated)?);
    }
    Ok(Geometry::Point { coordinates: coord })
}

fn read_count(cursor: &mut &[u8], what: &str) -> Result<usize> {
    let n = cursor.read_i32::<LittleEndian>().map_err(truncated)?;
    usize::try_from(n).map_err(|_| ShpError::format("shp", format!("Negative {} count {}", what, n)))
}

fn read_xy(cursor: &mut &[u8], num_points: usize) -> Result<Vec<Coord>> {
    if cursor.len() < 16 * num_points {
        return Err(ShpError::format(
            "shp",
            format!("Record declares {} points but holds only {} bytes", num_points, cursor.len()),
        ));
    }
    let mut coords = Vec::with_capacity(num_points);
    for _ in 0..num_points {
        let x = cursor.read_f64::<LittleEndian>().map_err(truncated)?;
        let y = cursor.read_f64::<LittleEndian>().map_err(truncated)?;
        coords.push(Coord::xy(x, y));
    }
    Ok(coords)
}

/// Z block is mandatory for Z types; M block is optional for Z types and mandatory for M types
fn read_measures(cursor: &mut &[u8], shape_type: ShapeType, coords: &mut [Coord]) -> Result<()> {
    let block = 16 + 8 * coords.len();
    if shape_type.has_z() {
        skip(cursor, 16)?;
        for c in coords.iter_mut() {
            c.z = Some(cursor.read_f64::<LittleEndian>().map_err(truncated)?);
        }
    }
    let m_present = if shape_type.has_z() { cursor.len() >= block } else { shape_type.has_m() };
    if m_present {
        skip(cursor, 16)?;
        for c in coords.iter_mut() {
            c.m = measure(cursor.read_f64::<LittleEndian>().map_err(truncated)?);
        }
    }
    Ok(())
}

fn skip(cursor: &mut &[u8], n: usize) -> Result<()> {
    if cursor.len() < n {
        return Err(ShpError::format("shp", "Record content ends before its payload"));
    }
    *cursor = &cursor[n..];
    Ok(())
}

fn decode_multi_point(cursor: &mut &[u8], shape_type: ShapeType) -> Result<Geometry> {
    skip(cursor, 32)?;
    let num_points = read_count(cursor, "point")?;
    let mut coords = read_xy(cursor, num_points)?;
    read_measures(cursor, shape_type, &mut coords)?;
    Ok(Geometry::MultiPoint { coordinates: coords })
}

fn decode_parts(cursor: &mut &[u8], shape_type: ShapeType) -> Result<Geometry> {
    skip(cursor, 32)?;
    let num_parts = read_count(cursor, "part")?;
    let num_points = read_count(cursor, "point")?;
    if cursor.len() < 4 * num_parts {
        return Err(ShpError::format("shp", format!("Record declares {} parts beyond its content", num_parts)));
    }

    let mut starts = Vec::with_capacity(num_parts);
    for _ in 0..num_parts {
        starts.push(read_count(cursor, "part index")?);
    }
    if starts.first().is_some_and(|s| *s != 0)
        || starts.windows(2).any(|w| w[0] > w[1])
        || starts.last().is_some_and(|s| *s > num_points)
    {
        return Err(ShpError::format("shp", format!("Inconsistent part indices {:?} for {} points", starts, num_points)));
    }

    let mut kinds = Vec::new();
    if shape_type.family() == ShapeFamily::MultiPatch {
        for _ in 0..num_parts {
            let id = cursor.read_i32::<LittleEndian>().map_err(truncated)?;
            kinds.push(
                PatchKind::from_id(id)
                    .ok_or_else(|| ShpError::format("shp", format!("Unknown multipatch part type {}", id)))?,
            );
        }
    }

    let mut coords = read_xy(cursor, num_points)?;
    read_measures(cursor, shape_type, &mut coords)?;

    let mut ends: Vec<usize> = starts.iter().skip(1).copied().collect();
    ends.push(num_points);
    let parts: Vec<Vec<Coord>> = starts.iter().zip(ends).map(|(s, e)| coords[*s..e].to_vec()).collect();

    if parts.is_empty() {
        return Ok(Geometry::Null);
    }

    let geometry = match shape_type.family() {
        ShapeFamily::Line if parts.len() == 1 => {
            Geometry::LineString { coordinates: parts.into_iter().next().unwrap_or_default() }
        }
        ShapeFamily::Line => Geometry::MultiLineString { coordinates: parts },
        ShapeFamily::Polygon => {
            let mut polygons = assemble_polygons(parts);
            if polygons.len() == 1 {
                Geometry::Polygon { coordinates: polygons.remove(0) }
            } else {
                Geometry::MultiPolygon { coordinates: polygons }
            }
        }
        _ => Geometry::MultiPatch {
            patches: kinds
                .into_iter()
                .zip(parts)
                .map(|(kind, coordinates)| Patch { kind, coordinates })
                .collect(),
        },
    };
    Ok(geometry)
}

/// Bounds of a record read from its stored ranges, without decoding the vertices
pub fn record_envelope(content: &[u8]) -> Result<Envelope> {
    let mut cursor = content;
    let shape_type = ShapeType::from_id(cursor.read_i32::<LittleEndian>().map_err(truncated)?)?;
    let mut envelope = Envelope::null();

    match shape_type.family() {
        ShapeFamily::Null => {}
        ShapeFamily::Point => {
            if let Geometry::Point { coordinates } = decode_point(&mut cursor, shape_type)? {
                envelope.expand_to_include(&coordinates);
            }
        }
        family => {
            envelope.min_x = read_f64(&mut cursor)?;
            envelope.min_y = read_f64(&mut cursor)?;
            envelope.max_x = read_f64(&mut cursor)?;
            envelope.max_y = read_f64(&mut cursor)?;

            let (num_parts, num_points) = if family == ShapeFamily::MultiPoint {
                (0, read_count(&mut cursor, "point")?)
            } else {
                let parts = read_count(&mut cursor, "part")?;
                (parts, read_count(&mut cursor, "point")?)
            };
            let part_words = if family == ShapeFamily::MultiPatch { 2 * num_parts } else { num_parts };
            skip(&mut cursor, 4 * part_words + 16 * num_points)?;

            if shape_type.has_z() {
                envelope.min_z = read_f64(&mut cursor)?;
                envelope.max_z = read_f64(&mut cursor)?;
                skip(&mut cursor, 8 * num_points)?;
            }
            let m_present = if shape_type.has_z() { cursor.len() >= 16 } else { shape_type.has_m() };
            if m_present {
                let (min_m, max_m) = (read_f64(&mut cursor)?, read_f64(&mut cursor)?);
                if min_m > NO_DATA_THRESHOLD {
                    envelope.min_m = min_m;
                    envelope.max_m = max_m;
                }
            }
        }
    }
    Ok(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, size: f64) -> Vec<Coord> {
        [[x0, y0], [x0, y0 + size], [x0 + size, y0 + size], [x0 + size, y0], [x0, y0]]
            .iter()
            .map(|p| Coord::xy(p[0], p[1]))
            .collect()
    }

    #[test]
    fn test_point_layout() {
        let content = encode(&Geometry::point(1.5, -2.0), ShapeType::Point).unwrap();
        assert_eq!(content.len(), 20);
        assert_eq!(&content[0..4], &[1, 0, 0, 0]);
        assert_eq!(length_in_words(&Geometry::point(1.5, -2.0), ShapeType::Point).unwrap(), 10);

        let (shape_type, geometry) = decode(&content, ShapeType::Point).unwrap();
        assert_eq!(shape_type, ShapeType::Point);
        assert_eq!(geometry, Geometry::point(1.5, -2.0));
    }

    #[test]
    fn test_null_record() {
        let content = encode(&Geometry::Null, ShapeType::Polygon).unwrap();
        assert_eq!(content, vec![0, 0, 0, 0]);
        assert_eq!(length_in_words(&Geometry::Null, ShapeType::Polygon).unwrap(), 2);
        assert_eq!(decode(&content, ShapeType::Polygon).unwrap().1, Geometry::Null);
        assert!(record_envelope(&content).unwrap().is_null());
    }

    #[test]
    fn test_polygon_with_hole_roundtrip() {
        let mut hole = square(2.0, 2.0, 2.0);
        hole.reverse();
        let polygon = Geometry::Polygon { coordinates: vec![square(0.0, 0.0, 10.0), hole] };

        let content = encode(&polygon, ShapeType::Polygon).unwrap();
        assert_eq!(content.len(), 4 + 32 + 8 + 8 + 16 * 10);
        let (_, decoded) = decode(&content, ShapeType::Polygon).unwrap();
        assert_eq!(decoded, polygon);
    }

    #[test]
    fn test_counter_clockwise_shell_is_reoriented() {
        let mut shell = square(0.0, 0.0, 1.0);
        shell.reverse();
        let content = encode(&Geometry::Polygon { coordinates: vec![shell] }, ShapeType::Polygon).unwrap();
        let (_, decoded) = decode(&content, ShapeType::Polygon).unwrap();
        assert_eq!(decoded, Geometry::Polygon { coordinates: vec![square(0.0, 0.0, 1.0)] });
    }

    #[test]
    fn test_degenerate_polygon_rejected() {
        let polygon = Geometry::polygon(vec![vec![[0.0, 0.0], [1.0, 1.0]]]);
        let err = encode(&polygon, ShapeType::Polygon).unwrap_err();
        assert!(matches!(err, ShpError::InvalidGeometry { .. }));
        assert!(length_in_words(&polygon, ShapeType::Polygon).is_err());
    }

    #[test]
    fn test_family_mismatch_rejected() {
        let err = encode(&Geometry::point(0.0, 0.0), ShapeType::Polygon).unwrap_err();
        assert!(matches!(err, ShpError::ShapeTypeMismatch { .. }));
    }

    #[test]
    fn test_point_z_without_m() {
        let mut content = Vec::new();
        content.write_i32::<LittleEndian>(ShapeType::PointZ.id()).unwrap();
        for v in [1.0, 2.0, 3.0] {
            content.write_f64::<LittleEndian>(v).unwrap();
        }
        let (_, geometry) = decode(&content, ShapeType::PointZ).unwrap();
        assert_eq!(geometry, Geometry::Point { coordinates: Coord::xyz(1.0, 2.0, 3.0) });
    }

    #[test]
    fn test_polyline_m_envelope() {
        let line = Geometry::LineString {
            coordinates: vec![Coord::xym(0.0, 0.0, 5.0), Coord::xym(3.0, 4.0, 9.0)],
        };
        let content = encode(&line, ShapeType::PolylineM).unwrap();
        let envelope = record_envelope(&content).unwrap();
        assert_eq!(envelope.xy_or_zero(), [0.0, 0.0, 3.0, 4.0]);
        assert_eq!(envelope.m_or_zero(), [5.0, 9.0]);
        assert_eq!(envelope, line.envelope());
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut content = encode(&Geometry::point(1.0, 1.0), ShapeType::Point).unwrap();
        content.extend_from_slice(&[0, 0, 0, 0]);
        assert!(decode(&content, ShapeType::Point).unwrap_err().is_format_error());
    }

    #[test]
    fn test_truncated_polyline_rejected() {
        let line = Geometry::line_string(vec![[0.0, 0.0], [1.0, 1.0], [2.0, 0.0]]);
        let content = encode(&line, ShapeType::Polyline).unwrap();
        let err = decode(&content[..content.len() - 8], ShapeType::Polyline).unwrap_err();
        assert!(err.is_format_error());
    }
}
