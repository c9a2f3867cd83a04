use serde::{Deserialize, Serialize};

use super::envelope::Envelope;

/// Property subset and spatial restriction applied by feature readers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Query {
    /// Value columns to load; `None` loads all, an empty list loads geometry only
    pub properties: Option<Vec<String>>,

    /// Only features whose envelope intersects this box
    pub bbox: Option<Envelope>,

    /// Number of matching features to skip
    pub start_index: usize,

    /// Maximum number of features returned
    pub max_features: Option<usize>,
}

impl Query {
    pub fn all() -> Self {
        Self::default()
    }

    /// Query that never needs the attribute table
    pub fn geometry_only() -> Self {
        Self { properties: Some(Vec::new()), ..Self::default() }
    }

    pub fn properties<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn bbox(mut self, bbox: Envelope) -> Self {
        self.bbox = Some(bbox);
        self
    }

    pub fn start_index(mut self, start: usize) -> Self {
        self.start_index = start;
        self
    }

    pub fn max_features(mut self, max: usize) -> Self {
        self.max_features = Some(max);
        self
    }

    /// Whether the attribute table has to be opened at all
    pub fn needs_attributes(&self) -> bool {
        self.properties.as_ref().map_or(true, |p| !p.is_empty())
    }
}
