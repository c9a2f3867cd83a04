//! Dump command implementation

use crate::cli::DumpArgs;
use crate::output::OutputWriter;
use crate::output_types::{DumpOutput, FeatureRecord};
use anyhow::{anyhow, Context, Result};
use geoshp_core::config::StoreOptions;
use geoshp_core::models::{Envelope, Feature, FeatureId, Geometry, Query, Schema};
use tabled::Tabled;

pub fn execute(args: DumpArgs, options: StoreOptions, output: &OutputWriter) -> Result<()> {
    let store = super::open_existing(&args.path, options)?;

    let records = match &args.fid {
        Some(fid) => {
            let schema = store.schema().context("Failed to read .dbf header")?;
            let feature = store
                .feature_by_id(&FeatureId(fid.clone()))
                .with_context(|| format!("Failed to read feature {}", fid))?;
            vec![record(&schema, feature)]
        }
        None => {
            let query = build_query(&args)?;
            let reader = store.feature_reader(&query).context("Failed to open feature reader")?;
            let schema = reader.schema().clone();
            reader
                .map(|feature| feature.map(|f| record(&schema, f)))
                .collect::<std::result::Result<Vec<_>, _>>()
                .context("Failed to read features")?
        }
    };

    if output.is_json() {
        return output.result(DumpOutput { type_name: store.type_name(), features: records });
    }

    if records.is_empty() {
        output.info("No features matched");
        return Ok(());
    }

    #[derive(Tabled)]
    struct FeatureRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Geometry")]
        geometry: String,
        #[tabled(rename = "Properties")]
        properties: String,
    }

    let rows: Vec<FeatureRow> = records
        .iter()
        .map(|r| FeatureRow {
            id: r.id.clone(),
            geometry: geometry_summary(&r.geometry),
            properties: r
                .properties
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(", "),
        })
        .collect();
    output.table(rows);
    output.kv("Features", records.len());

    Ok(())
}

fn build_query(args: &DumpArgs) -> Result<Query> {
    let mut query = Query::all().start_index(args.start);

    if let Some(names) = &args.properties {
        query = query.properties(names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()));
    }
    if let Some(bbox) = &args.bbox {
        let [min_x, min_y, max_x, max_y] = <[f64; 4]>::try_from(bbox.as_slice())
            .map_err(|_| anyhow!("--bbox takes four numbers, got {}", bbox.len()))?;
        query = query.bbox(Envelope::new(min_x, min_y, max_x, max_y));
    }
    if let Some(limit) = args.limit {
        query = query.max_features(limit);
    }

    Ok(query)
}

fn record(schema: &Schema, feature: Feature) -> FeatureRecord {
    let properties = schema
        .value_attributes()
        .zip(feature.attributes.iter())
        .map(|(attribute, value)| (attribute.name.clone(), value.to_json()))
        .collect();

    FeatureRecord { id: feature.fid.0, geometry: feature.geometry, properties }
}

fn geometry_summary(geometry: &Geometry) -> String {
    match geometry {
        Geometry::Null => "null".to_string(),
        Geometry::Point { coordinates } => format!("Point ({} {})", coordinates.x, coordinates.y),
        other => format!("{} ({} points)", other.shape_type(), other.num_points()),
    }
}
