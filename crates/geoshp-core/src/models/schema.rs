//! Attribute schema supplied when creating or describing a shapefile.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical attribute type of a schema column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeKind {
    Integer,
    Long,
    Double,
    Text,
    Boolean,
    Date,
    /// The geometry column; never stored in the DBF
    Geometry,
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// One schema column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    pub name: String,
    pub kind: AttributeKind,
    /// Declared field width in characters, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
    /// Declared decimal count for floating columns, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<usize>,
}

impl AttributeDescriptor {
    pub fn new(name: impl Into<String>, kind: AttributeKind) -> Self {
        Self { name: name.into(), kind, length: None, decimals: None }
    }

    /// Set the declared field width
    pub fn with_length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }

    /// Set the declared decimal count
    pub fn with_decimals(mut self, decimals: usize) -> Self {
        self.decimals = Some(decimals);
        self
    }

    pub fn is_geometry(&self) -> bool {
        self.kind == AttributeKind::Geometry
    }
}

/// Ordered description of a feature type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub type_name: String,
    pub attributes: Vec<AttributeDescriptor>,
}

impl Schema {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self { type_name: type_name.into(), attributes: Vec::new() }
    }

    /// Append a column
    pub fn attribute(mut self, descriptor: AttributeDescriptor) -> Self {
        self.attributes.push(descriptor);
        self
    }

    /// The geometry column, if declared
    pub fn geometry_attribute(&self) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.is_geometry())
    }

    /// Non-geometry columns in declaration order; feature values follow this order
    pub fn value_attributes(&self) -> impl Iterator<Item = &AttributeDescriptor> {
        self.attributes.iter().filter(|a| !a.is_geometry())
    }

    /// Position of a named value column within `value_attributes`
    pub fn value_index(&self, name: &str) -> Option<usize> {
        self.value_attributes().position(|a| a.name.eq_ignore_ascii_case(name))
    }

    pub fn value_count(&self) -> usize {
        self.value_attributes().count()
    }
}
