use geoshp_core::models::{Envelope, Geometry, ShapeType};
use serde::Serialize;

/// Output for info command
#[derive(Debug, Serialize)]
pub struct InfoOutput {
    pub path: String,
    pub type_name: String,
    pub shape_type: ShapeType,
    pub record_count: usize,
    pub bounds: [f64; 4],
    pub z_range: Option<[f64; 2]>,
    pub m_range: Option<[f64; 2]>,
    pub crs: Option<CrsInfo>,
    pub charset: String,
    pub fields: Vec<FieldInfo>,
    pub members: Vec<String>,
    pub metadata: Option<MetadataInfo>,
}

#[derive(Debug, Serialize)]
pub struct CrsInfo {
    pub name: Option<String>,
    pub epsg: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct FieldInfo {
    pub name: String,
    pub kind: String,
    pub length: Option<usize>,
    pub decimals: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct MetadataInfo {
    pub abstract_text: Option<String>,
    pub bounds: Option<[f64; 4]>,
}

/// One feature in dump output
#[derive(Debug, Serialize)]
pub struct FeatureRecord {
    pub id: String,
    pub geometry: Geometry,
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// Output for dump command
#[derive(Debug, Serialize)]
pub struct DumpOutput {
    pub type_name: String,
    pub features: Vec<FeatureRecord>,
}

/// Output for check command
#[derive(Debug, Serialize)]
pub struct CheckOutput {
    pub consistent: bool,
    pub shape_records: usize,
    pub index_entries: Option<usize>,
    pub dbf_rows: Option<usize>,
    pub problems: Vec<String>,
}

/// Output for copy command
#[derive(Debug, Serialize)]
pub struct CopyOutput {
    pub source: String,
    pub target: String,
    pub record_count: usize,
}

/// Output for config command
#[derive(Debug, Serialize)]
pub struct ConfigOutput {
    pub entries: Vec<ConfigEntry>,
}

#[derive(Debug, Serialize)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
    pub source: String,
}

pub fn envelope_ranges(envelope: &Envelope) -> (Option<[f64; 2]>, Option<[f64; 2]>) {
    let z = envelope.has_z().then(|| envelope.z_or_zero());
    let m = envelope.has_m().then(|| envelope.m_or_zero());
    (z, m)
}
