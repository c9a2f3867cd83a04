use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// GeoShp - ESRI Shapefile storage engine
#[derive(Parser, Debug)]
#[command(name = "geoshp")]
#[command(about = "Inspect, dump, check and copy ESRI shapefiles", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Output results in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file (TOML); defaults to ./geoshp.toml when present
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// DBF charset label, overriding the .cpg sidecar and configuration (e.g. UTF-8)
    #[arg(long, global = true)]
    pub charset: Option<String>,

    /// Fail instead of truncating values that do not fit their DBF field
    #[arg(long, global = true)]
    pub strict: bool,

    /// Ignore the .shx index and scan the .shp sequentially
    #[arg(long, global = true)]
    pub no_index: bool,

    /// Lock polling interval in milliseconds
    #[arg(long, global = true, value_name = "MS")]
    pub lock_retry_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show shape type, bounds, record count, CRS and fields
    Info(InfoArgs),

    /// Print features as GeoJSON-like records
    Dump(DumpArgs),

    /// Verify that .shp, .shx and .dbf agree
    Check(CheckArgs),

    /// Copy a shapefile set without re-encoding geometries
    Copy(CopyArgs),

    /// Show the resolved configuration and where each value came from
    Config,
}

#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to any member of the set (.shp, .dbf, ...) or its base name
    pub path: PathBuf,
}

#[derive(Parser, Debug)]
pub struct DumpArgs {
    /// Path to any member of the set
    pub path: PathBuf,

    /// Attribute columns to include (comma separated); an empty value dumps geometry only
    #[arg(long, value_delimiter = ',')]
    pub properties: Option<Vec<String>>,

    /// Only features intersecting min_x,min_y,max_x,max_y
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, value_name = "BOX")]
    pub bbox: Option<Vec<f64>>,

    /// Number of matching features to skip
    #[arg(long, default_value = "0")]
    pub start: usize,

    /// Maximum number of features to print
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,

    /// Print a single feature by identifier (e.g. roads.12)
    #[arg(long, conflicts_with_all = ["properties", "bbox", "start", "limit"])]
    pub fid: Option<String>,
}

#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Path to any member of the set
    pub path: PathBuf,
}

#[derive(Parser, Debug)]
pub struct CopyArgs {
    /// Source shapefile
    pub source: PathBuf,

    /// Target shapefile
    pub target: PathBuf,

    /// Overwrite an existing target
    #[arg(long)]
    pub force: bool,
}
