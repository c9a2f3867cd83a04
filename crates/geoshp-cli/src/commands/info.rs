//! Info command implementation

use crate::cli::InfoArgs;
use crate::output::OutputWriter;
use crate::output_types::{envelope_ranges, CrsInfo, FieldInfo, InfoOutput, MetadataInfo};
use anyhow::{Context, Result};
use geoshp_core::config::StoreOptions;
use geoshp_store::sidecar::read_cpg;
use geoshp_store::{LockOwner, ShpFileType};
use tabled::Tabled;

pub fn execute(args: InfoArgs, options: StoreOptions, output: &OutputWriter) -> Result<()> {
    let store = super::open_existing(&args.path, options)?;
    let files = store.files();

    let shape_type = store.shape_type().context("Failed to read .shp header")?;
    let bounds = store.bounds().context("Failed to read .shp header")?;
    let record_count = store.count().context("Failed to count records")?;
    let schema = store.schema().context("Failed to read .dbf header")?;
    let crs = store.crs().context("Failed to read .prj")?;
    let metadata = store.metadata().context("Failed to read .shp.xml")?;

    let charset = match read_cpg(files, LockOwner::new())? {
        Some(encoding) if options.charset_is_default => format!("{} (from .cpg)", encoding.name()),
        _ => options.encoding.name().to_string(),
    };

    let fields: Vec<FieldInfo> = schema
        .value_attributes()
        .map(|a| FieldInfo {
            name: a.name.clone(),
            kind: a.kind.to_string(),
            length: a.length,
            decimals: a.decimals,
        })
        .collect();
    let members: Vec<String> = ShpFileType::ALL
        .iter()
        .filter(|t| files.exists(**t))
        .map(|t| t.extension().to_string())
        .collect();
    let (z_range, m_range) = envelope_ranges(&bounds);

    if output.is_json() {
        output.result(InfoOutput {
            path: files.path(ShpFileType::Shp).display().to_string(),
            type_name: store.type_name(),
            shape_type,
            record_count,
            bounds: bounds.xy_or_zero(),
            z_range,
            m_range,
            crs: crs.as_ref().map(|c| CrsInfo { name: c.name.clone(), epsg: c.epsg }),
            charset,
            fields,
            members,
            metadata: metadata.map(|m| MetadataInfo {
                abstract_text: m.abstract_text,
                bounds: m.bounds.map(|b| b.xy_or_zero()),
            }),
        })?;
        return Ok(());
    }

    output.section(format!("Shapefile {}", store.type_name()));
    output.kv("Location", files.path(ShpFileType::Shp).display());
    output.kv("Shape Type", shape_type);
    output.kv("Records", record_count);
    let [min_x, min_y, max_x, max_y] = bounds.xy_or_zero();
    output.kv("Bounds", format!("({}, {}) - ({}, {})", min_x, min_y, max_x, max_y));
    if let Some([lo, hi]) = z_range {
        output.kv("Z Range", format!("{} - {}", lo, hi));
    }
    if let Some([lo, hi]) = m_range {
        output.kv("M Range", format!("{} - {}", lo, hi));
    }
    match &crs {
        Some(crs) => output.kv(
            "CRS",
            match (&crs.name, crs.epsg) {
                (Some(name), Some(epsg)) => format!("{} (EPSG:{})", name, epsg),
                (Some(name), None) => name.clone(),
                (None, Some(epsg)) => format!("EPSG:{}", epsg),
                (None, None) => "unnamed".to_string(),
            },
        ),
        None => output.kv("CRS", "none (no .prj)"),
    }
    output.kv("Charset", charset);
    output.kv("Members", members.join(", "));
    if let Some(abstract_text) = metadata.and_then(|m| m.abstract_text) {
        output.kv("Abstract", abstract_text);
    }

    output.section("Fields");

    #[derive(Tabled)]
    struct FieldRow {
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Type")]
        kind: String,
        #[tabled(rename = "Width")]
        length: String,
        #[tabled(rename = "Decimals")]
        decimals: String,
    }

    let rows: Vec<FieldRow> = fields
        .into_iter()
        .map(|f| FieldRow {
            name: f.name,
            kind: f.kind,
            length: f.length.map(|l| l.to_string()).unwrap_or_default(),
            decimals: f.decimals.map(|d| d.to_string()).unwrap_or_default(),
        })
        .collect();
    output.table(rows);

    Ok(())
}
