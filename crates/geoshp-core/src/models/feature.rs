use serde::{Deserialize, Serialize};
use std::fmt;

use super::geometry::Geometry;
use super::schema::Schema;
use super::value::AttributeValue;

/// External string identifier of a feature
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureId(pub String);

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One shapefile feature: a geometry paired with its attribute row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub fid: FeatureId,

    /// `Geometry::Null` for NULL shape records
    pub geometry: Geometry,

    /// Values in the order of the schema's value attributes
    pub attributes: Vec<AttributeValue>,
}

impl Feature {
    /// Create a feature with a provisional identifier
    pub fn new(geometry: Geometry, attributes: Vec<AttributeValue>) -> Self {
        Self { fid: FeatureId(String::new()), geometry, attributes }
    }

    /// Look up an attribute by column name
    pub fn attribute(&self, schema: &Schema, name: &str) -> Option<&AttributeValue> {
        schema.value_index(name).and_then(|i| self.attributes.get(i))
    }

    /// Replace an attribute by column name, returning false if the column is unknown
    pub fn set_attribute(&mut self, schema: &Schema, name: &str, value: AttributeValue) -> bool {
        match schema.value_index(name) {
            Some(i) if i < self.attributes.len() => {
                self.attributes[i] = value;
                true
            }
            _ => false,
        }
    }
}

/// Mapping between external feature identifiers and the positional key of a backend
pub trait FidMapper: Send + Sync {
    /// Identifier for the zero-based row
    fn fid_for(&self, row: usize) -> FeatureId;

    /// Zero-based row for an identifier, if it belongs to this mapper
    fn row_for(&self, fid: &FeatureId) -> Option<usize>;
}

/// Shapefiles have no native key, so identifiers are `<type name>.<record number>`
#[derive(Debug, Clone)]
pub struct ShapefileFidMapper {
    type_name: String,
}

impl ShapefileFidMapper {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self { type_name: type_name.into() }
    }
}

impl FidMapper for ShapefileFidMapper {
    fn fid_for(&self, row: usize) -> FeatureId {
        FeatureId(format!("{}.{}", self.type_name, row + 1))
    }

    fn row_for(&self, fid: &FeatureId) -> Option<usize> {
        let (prefix, number) = fid.0.rsplit_once('.')?;
        if prefix != self.type_name {
            return None;
        }
        number.parse::<usize>().ok().filter(|n| *n > 0).map(|n| n - 1)
    }
}
