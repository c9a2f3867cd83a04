pub mod envelope;
pub mod feature;
pub mod geometry;
pub mod query;
pub mod schema;
pub mod shape_type;
pub mod value;

pub use envelope::Envelope;
pub use feature::{Feature, FeatureId, FidMapper, ShapefileFidMapper};
pub use geometry::{Coord, Geometry, Patch, PatchKind};
pub use query::Query;
pub use schema::{AttributeDescriptor, AttributeKind, Schema};
pub use shape_type::{ShapeFamily, ShapeType};
pub use value::AttributeValue;
