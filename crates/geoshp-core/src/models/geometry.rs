//! Geometry model for shapefile records.
//!
//! Coordinates carry optional Z and M ordinates so that every ESRI shape family,
//! including the measured and 3D variants, maps onto one enum.

use serde::{Deserialize, Serialize};

use super::envelope::Envelope;
use super::shape_type::{ShapeFamily, ShapeType};

/// A single vertex
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub m: Option<f64>,
}

impl Coord {
    pub fn xy(x: f64, y: f64) -> Self {
        Self { x, y, z: None, m: None }
    }

    pub fn xyz(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z: Some(z), m: None }
    }

    pub fn xym(x: f64, y: f64, m: f64) -> Self {
        Self { x, y, z: None, m: Some(m) }
    }

    pub fn xyzm(x: f64, y: f64, z: f64, m: f64) -> Self {
        Self { x, y, z: Some(z), m: Some(m) }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.z.map_or(true, f64::is_finite)
            && self.m.map_or(true, f64::is_finite)
    }
}

/// Multipatch part kinds, numbered as in the file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatchKind {
    TriangleStrip,
    TriangleFan,
    OuterRing,
    InnerRing,
    FirstRing,
    Ring,
}

impl PatchKind {
    pub fn id(&self) -> i32 {
        match self {
            PatchKind::TriangleStrip => 0,
            PatchKind::TriangleFan => 1,
            PatchKind::OuterRing => 2,
            PatchKind::InnerRing => 3,
            PatchKind::FirstRing => 4,
            PatchKind::Ring => 5,
        }
    }

    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            0 => Some(PatchKind::TriangleStrip),
            1 => Some(PatchKind::TriangleFan),
            2 => Some(PatchKind::OuterRing),
            3 => Some(PatchKind::InnerRing),
            4 => Some(PatchKind::FirstRing),
            5 => Some(PatchKind::Ring),
            _ => None,
        }
    }
}

/// One multipatch part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    pub kind: PatchKind,
    pub coordinates: Vec<Coord>,
}

/// GeoJSON-like geometry with an explicit null variant for NULL shape records.
///
/// Polygon rings follow the shapefile convention on disk (exterior clockwise,
/// holes counter-clockwise); the first ring of each polygon is its exterior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type")]
pub enum Geometry {
    #[default]
    Null,
    Point {
        coordinates: Coord,
    },
    MultiPoint {
        coordinates: Vec<Coord>,
    },
    LineString {
        coordinates: Vec<Coord>,
    },
    MultiLineString {
        coordinates: Vec<Vec<Coord>>,
    },
    Polygon {
        coordinates: Vec<Vec<Coord>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<Coord>>>,
    },
    MultiPatch {
        patches: Vec<Patch>,
    },
}

impl Geometry {
    /// Create a 2D Point geometry
    pub fn point(x: f64, y: f64) -> Self {
        Geometry::Point { coordinates: Coord::xy(x, y) }
    }

    /// Create a LineString geometry from 2D pairs
    pub fn line_string(coords: Vec<[f64; 2]>) -> Self {
        Geometry::LineString { coordinates: coords.into_iter().map(|c| Coord::xy(c[0], c[1])).collect() }
    }

    /// Create a Polygon geometry from 2D rings
    pub fn polygon(rings: Vec<Vec<[f64; 2]>>) -> Self {
        Geometry::Polygon {
            coordinates: rings
                .into_iter()
                .map(|ring| ring.into_iter().map(|c| Coord::xy(c[0], c[1])).collect())
                .collect(),
        }
    }

    /// Create a MultiPoint geometry from 2D pairs
    pub fn multi_point(points: Vec<[f64; 2]>) -> Self {
        Geometry::MultiPoint { coordinates: points.into_iter().map(|c| Coord::xy(c[0], c[1])).collect() }
    }

    /// True for `Null` and for collections without any vertex
    pub fn is_empty(&self) -> bool {
        let mut any = false;
        self.for_each_coord(&mut |_| any = true);
        !any
    }

    /// Visit every vertex in storage order
    pub fn for_each_coord(&self, f: &mut dyn FnMut(&Coord)) {
        match self {
            Geometry::Null => {}
            Geometry::Point { coordinates } => f(coordinates),
            Geometry::MultiPoint { coordinates } | Geometry::LineString { coordinates } => {
                coordinates.iter().for_each(|c| f(c))
            }
            Geometry::MultiLineString { coordinates } | Geometry::Polygon { coordinates } => {
                coordinates.iter().flatten().for_each(|c| f(c))
            }
            Geometry::MultiPolygon { coordinates } => {
                coordinates.iter().flatten().flatten().for_each(|c| f(c))
            }
            Geometry::MultiPatch { patches } => {
                patches.iter().flat_map(|p| p.coordinates.iter()).for_each(|c| f(c))
            }
        }
    }

    pub fn has_z(&self) -> bool {
        let mut z = false;
        self.for_each_coord(&mut |c| z |= c.z.is_some());
        z
    }

    pub fn has_m(&self) -> bool {
        let mut m = false;
        self.for_each_coord(&mut |c| m |= c.m.is_some());
        m
    }

    /// Shape family this geometry is stored as
    pub fn family(&self) -> ShapeFamily {
        if self.is_empty() {
            return ShapeFamily::Null;
        }
        match self {
            Geometry::Null => ShapeFamily::Null,
            Geometry::Point { .. } => ShapeFamily::Point,
            Geometry::MultiPoint { .. } => ShapeFamily::MultiPoint,
            Geometry::LineString { .. } | Geometry::MultiLineString { .. } => ShapeFamily::Line,
            Geometry::Polygon { .. } | Geometry::MultiPolygon { .. } => ShapeFamily::Polygon,
            Geometry::MultiPatch { .. } => ShapeFamily::MultiPatch,
        }
    }

    /// Narrowest shape type able to hold this geometry
    pub fn shape_type(&self) -> ShapeType {
        ShapeType::for_family(self.family(), self.has_z(), self.has_m())
    }

    /// Bounding envelope over all vertices, null for empty geometries
    pub fn envelope(&self) -> Envelope {
        let mut envelope = Envelope::null();
        self.for_each_coord(&mut |c| envelope.expand_to_include(c));
        envelope
    }

    /// Number of vertices
    pub fn num_points(&self) -> usize {
        let mut n = 0;
        self.for_each_coord(&mut |_| n += 1);
        n
    }
}
