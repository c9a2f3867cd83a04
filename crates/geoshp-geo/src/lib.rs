//! GeoShp Geo - Ring orientation, containment and geometry validation
//!
//! This crate bridges the shapefile geometry model to the `geo` crate for the
//! planar predicates the codec needs: winding order of polygon rings, shell/hole
//! assignment on read, and rejection of degenerate geometries before encoding.

pub mod models;
pub mod orientation;
pub mod validation;
