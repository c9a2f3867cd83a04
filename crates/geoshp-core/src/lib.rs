//! GeoShp Core - Domain models, errors, and configuration
//!
//! This crate contains the shapefile domain model shared by the codec, store and
//! CLI crates: shape types, geometries, envelopes, attribute schemas, feature
//! identifiers, the CRS registry and the layered store configuration.

pub mod config;
pub mod crs;
pub mod error;
pub mod models;

pub use error::{Result, ShpError};
