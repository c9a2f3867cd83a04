//! Coordinate reference system lookup for `.prj` sidecars.
//!
//! The store never interprets projection math. It only needs an opaque handle
//! for the WKT it reads, so lookups go through an explicit registry owned by
//! the application and shared by reference.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Opaque CRS handle produced from a WKT definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrsHandle {
    pub wkt: String,
    pub name: Option<String>,
    pub epsg: Option<u32>,
}

/// Resolves a WKT definition into a handle
pub trait CrsResolver: Send + Sync {
    fn resolve(&self, wkt: &str) -> Option<CrsHandle>;
}

/// Thread-safe, read-mostly cache of resolved CRS definitions keyed by WKT
#[derive(Debug, Default)]
pub struct CrsRegistry {
    entries: RwLock<HashMap<String, Arc<CrsHandle>>>,
}

impl CrsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a WKT string, parsing it on first use
    pub fn lookup(&self, wkt: &str) -> Option<Arc<CrsHandle>> {
        let key = wkt.trim();
        if key.is_empty() {
            return None;
        }

        if let Ok(entries) = self.entries.read() {
            if let Some(handle) = entries.get(key) {
                return Some(Arc::clone(handle));
            }
        }

        let handle = Arc::new(parse_wkt(key));
        match self.entries.write() {
            Ok(mut entries) => {
                let entry = entries.entry(key.to_string()).or_insert_with(|| Arc::clone(&handle));
                Some(Arc::clone(entry))
            }
            Err(_) => Some(handle),
        }
    }

    /// Register a handle under an explicit WKT key
    pub fn register(&self, handle: CrsHandle) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(handle.wkt.trim().to_string(), Arc::new(handle));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CrsResolver for CrsRegistry {
    fn resolve(&self, wkt: &str) -> Option<CrsHandle> {
        self.lookup(wkt).map(|h| (*h).clone())
    }
}

/// Extract the name and EPSG authority code from a WKT definition
pub fn parse_wkt(wkt: &str) -> CrsHandle {
    CrsHandle { wkt: wkt.to_string(), name: parse_name(wkt), epsg: parse_epsg(wkt) }
}

/// First quoted string, e.g. `GEOGCS["WGS 84", ...]` -> `WGS 84`
fn parse_name(wkt: &str) -> Option<String> {
    let start = wkt.find('"')? + 1;
    let end = wkt[start..].find('"')?;
    let name = &wkt[start..start + end];
    (!name.is_empty()).then(|| name.to_string())
}

/// The outermost AUTHORITY["EPSG","code"] is the last one in the string
fn parse_epsg(wkt: &str) -> Option<u32> {
    const PATTERN: &str = "AUTHORITY[\"EPSG\",\"";
    if let Some(start) = wkt.rfind(PATTERN) {
        let code_start = start + PATTERN.len();
        if let Some(end) = wkt[code_start..].find('"') {
            if let Ok(code) = wkt[code_start..code_start + end].parse::<u32>() {
                return Some(code);
            }
        }
    }

    // Look for EPSG: prefix
    if let Some(start) = wkt.find("EPSG:") {
        let code_str: String =
            wkt[start + 5..].chars().take_while(|c| c.is_ascii_digit()).collect();
        if let Ok(code) = code_str.parse::<u32>() {
            return Some(code);
        }
    }

    None
}
