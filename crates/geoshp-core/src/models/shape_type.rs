//! Shape type tags stored in shapefile headers and records.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, ShpError};

/// Geometry family shared by a 2D shape type and its M/Z variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeFamily {
    Null,
    Point,
    Line,
    Polygon,
    MultiPoint,
    MultiPatch,
}

/// ESRI shape type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ShapeType {
    #[default]
    Null,
    Point,
    Polyline,
    Polygon,
    MultiPoint,
    PointZ,
    PolylineZ,
    PolygonZ,
    MultiPointZ,
    PointM,
    PolylineM,
    PolygonM,
    MultiPointM,
    MultiPatch,
}

impl ShapeType {
    /// Numeric code written to the file
    pub fn id(&self) -> i32 {
        match self {
            ShapeType::Null => 0,
            ShapeType::Point => 1,
            ShapeType::Polyline => 3,
            ShapeType::Polygon => 5,
            ShapeType::MultiPoint => 8,
            ShapeType::PointZ => 11,
            ShapeType::PolylineZ => 13,
            ShapeType::PolygonZ => 15,
            ShapeType::MultiPointZ => 18,
            ShapeType::PointM => 21,
            ShapeType::PolylineM => 23,
            ShapeType::PolygonM => 25,
            ShapeType::MultiPointM => 28,
            ShapeType::MultiPatch => 31,
        }
    }

    /// Decode a numeric shape type code
    pub fn from_id(id: i32) -> Result<Self> {
        let shape_type = match id {
            0 => ShapeType::Null,
            1 => ShapeType::Point,
            3 => ShapeType::Polyline,
            5 => ShapeType::Polygon,
            8 => ShapeType::MultiPoint,
            11 => ShapeType::PointZ,
            13 => ShapeType::PolylineZ,
            15 => ShapeType::PolygonZ,
            18 => ShapeType::MultiPointZ,
            21 => ShapeType::PointM,
            23 => ShapeType::PolylineM,
            25 => ShapeType::PolygonM,
            28 => ShapeType::MultiPointM,
            31 => ShapeType::MultiPatch,
            other => {
                return Err(ShpError::format("shp", format!("Unknown shape type code {}", other)))
            }
        };
        Ok(shape_type)
    }

    pub fn family(&self) -> ShapeFamily {
        match self {
            ShapeType::Null => ShapeFamily::Null,
            ShapeType::Point | ShapeType::PointZ | ShapeType::PointM => ShapeFamily::Point,
            ShapeType::Polyline | ShapeType::PolylineZ | ShapeType::PolylineM => ShapeFamily::Line,
            ShapeType::Polygon | ShapeType::PolygonZ | ShapeType::PolygonM => ShapeFamily::Polygon,
            ShapeType::MultiPoint | ShapeType::MultiPointZ | ShapeType::MultiPointM => {
                ShapeFamily::MultiPoint
            }
            ShapeType::MultiPatch => ShapeFamily::MultiPatch,
        }
    }

    /// Whether records carry a Z array
    pub fn has_z(&self) -> bool {
        matches!(
            self,
            ShapeType::PointZ
                | ShapeType::PolylineZ
                | ShapeType::PolygonZ
                | ShapeType::MultiPointZ
                | ShapeType::MultiPatch
        )
    }

    /// Whether records carry an M array (always written for Z types)
    pub fn has_m(&self) -> bool {
        self.has_z()
            || matches!(
                self,
                ShapeType::PointM | ShapeType::PolylineM | ShapeType::PolygonM | ShapeType::MultiPointM
            )
    }

    pub fn is_null(&self) -> bool {
        *self == ShapeType::Null
    }

    /// Build the shape type for a family with the given measure dimensions
    pub fn for_family(family: ShapeFamily, z: bool, m: bool) -> Self {
        match (family, z, m) {
            (ShapeFamily::Null, _, _) => ShapeType::Null,
            (ShapeFamily::MultiPatch, _, _) => ShapeType::MultiPatch,
            (ShapeFamily::Point, true, _) => ShapeType::PointZ,
            (ShapeFamily::Point, false, true) => ShapeType::PointM,
            (ShapeFamily::Point, false, false) => ShapeType::Point,
            (ShapeFamily::Line, true, _) => ShapeType::PolylineZ,
            (ShapeFamily::Line, false, true) => ShapeType::PolylineM,
            (ShapeFamily::Line, false, false) => ShapeType::Polyline,
            (ShapeFamily::Polygon, true, _) => ShapeType::PolygonZ,
            (ShapeFamily::Polygon, false, true) => ShapeType::PolygonM,
            (ShapeFamily::Polygon, false, false) => ShapeType::Polygon,
            (ShapeFamily::MultiPoint, true, _) => ShapeType::MultiPointZ,
            (ShapeFamily::MultiPoint, false, true) => ShapeType::MultiPointM,
            (ShapeFamily::MultiPoint, false, false) => ShapeType::MultiPoint,
        }
    }

    /// Whether a geometry of type `other` can be stored in a file of this type.
    ///
    /// The family must match and `other` may not carry a dimension this type lacks.
    pub fn accepts(&self, other: ShapeType) -> bool {
        if other.is_null() {
            return true;
        }
        if self.family() != other.family() {
            return false;
        }
        (self.has_z() || !other.has_z()) && (self.has_m() || !other.has_m())
    }

    /// Human readable name
    pub fn name(&self) -> &'static str {
        match self {
            ShapeType::Null => "Null",
            ShapeType::Point => "Point",
            ShapeType::Polyline => "Polyline",
            ShapeType::Polygon => "Polygon",
            ShapeType::MultiPoint => "MultiPoint",
            ShapeType::PointZ => "PointZ",
            ShapeType::PolylineZ => "PolylineZ",
            ShapeType::PolygonZ => "PolygonZ",
            ShapeType::MultiPointZ => "MultiPointZ",
            ShapeType::PointM => "PointM",
            ShapeType::PolylineM => "PolylineM",
            ShapeType::PolygonM => "PolygonM",
            ShapeType::MultiPointM => "MultiPointM",
            ShapeType::MultiPatch => "MultiPatch",
        }
    }
}

impl fmt::Display for ShapeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
