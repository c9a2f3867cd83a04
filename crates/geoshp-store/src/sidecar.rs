//! Optional text members of a shapefile set: `.prj`, `.cpg` and `.shp.xml`.

use encoding_rs::Encoding;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::Write;
use tracing::{debug, warn};

use geoshp_core::error::{Result, ShpError};
use geoshp_core::models::Envelope;

use crate::files::{ShpFileType, ShpFiles};
use crate::lock::LockOwner;

/// WKT of the `.prj` member, if present
pub fn read_prj(files: &ShpFiles, owner: LockOwner) -> Result<Option<String>> {
    Ok(files
        .read_text(ShpFileType::Prj, owner)?
        .map(|wkt| wkt.trim().to_string())
        .filter(|wkt| !wkt.is_empty()))
}

pub fn write_prj(files: &ShpFiles, owner: LockOwner, wkt: &str) -> Result<()> {
    write_text(files, ShpFileType::Prj, owner, wkt.trim())
}

/// Encoding named by the `.cpg` member; unknown labels are ignored with a warning
pub fn read_cpg(files: &ShpFiles, owner: LockOwner) -> Result<Option<&'static Encoding>> {
    let Some(label) = files.read_text(ShpFileType::Cpg, owner)? else {
        return Ok(None);
    };
    let label = label.trim();
    let encoding = Encoding::for_label(label.as_bytes()).or_else(|| {
        // code page numbers such as "1252" or "65001"
        label.parse::<u16>().ok().and_then(|page| match page {
            65001 => Some(encoding_rs::UTF_8),
            _ => Encoding::for_label(format!("windows-{}", page).as_bytes()),
        })
    });
    if encoding.is_none() {
        warn!("Ignoring unknown charset '{}' in {}", label, files.path(ShpFileType::Cpg).display());
    }
    Ok(encoding)
}

pub fn write_cpg(files: &ShpFiles, owner: LockOwner, encoding: &'static Encoding) -> Result<()> {
    write_text(files, ShpFileType::Cpg, owner, encoding.name())
}

pub(crate) fn write_text(files: &ShpFiles, file_type: ShpFileType, owner: LockOwner, text: &str) -> Result<()> {
    let mut file = files.open_write(file_type, owner)?;
    file.write_all(text.as_bytes())?;
    file.flush()?;
    debug!("Wrote {}", file.handle().path().display());
    Ok(())
}

/// FGDC metadata carried in a `.shp.xml` member
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShpXmlMetadata {
    pub abstract_text: Option<String>,
    pub bounds: Option<Envelope>,
}

impl ShpXmlMetadata {
    /// Pick the abstract and bounding coordinates out of an FGDC document
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut metadata = Self::default();
        let mut element: Option<String> = None;
        let (mut west, mut east, mut north, mut south) = (None, None, None, None);

        loop {
            match reader.read_event().map_err(|e| ShpError::Serialization(format!("Invalid .shp.xml: {}", e)))? {
                Event::Start(e) => {
                    element = Some(String::from_utf8_lossy(e.local_name().as_ref()).to_ascii_lowercase());
                }
                Event::Text(e) => {
                    let text = e
                        .unescape()
                        .map_err(|e| ShpError::Serialization(format!("Invalid .shp.xml text: {}", e)))?;
                    let text = text.trim();
                    match element.as_deref() {
                        Some("abstract") if metadata.abstract_text.is_none() => {
                            metadata.abstract_text = Some(text.to_string());
                        }
                        Some("westbc") => west = text.parse::<f64>().ok(),
                        Some("eastbc") => east = text.parse::<f64>().ok(),
                        Some("northbc") => north = text.parse::<f64>().ok(),
                        Some("southbc") => south = text.parse::<f64>().ok(),
                        _ => {}
                    }
                }
                Event::End(_) => element = None,
                Event::Eof => break,
                _ => {}
            }
        }

        if let (Some(w), Some(e), Some(n), Some(s)) = (west, east, north, south) {
            metadata.bounds = Some(Envelope::new(w, s, e, n));
        }
        Ok(metadata)
    }
}

/// Parsed `.shp.xml`, if present. Unparseable metadata is logged and skipped.
pub fn read_shp_xml(files: &ShpFiles, owner: LockOwner) -> Result<Option<ShpXmlMetadata>> {
    let Some(xml) = files.read_text(ShpFileType::ShpXml, owner)? else {
        return Ok(None);
    };
    match ShpXmlMetadata::parse(&xml) {
        Ok(metadata) => Ok(Some(metadata)),
        Err(e) => {
            warn!("Skipping {}: {}", files.path(ShpFileType::ShpXml).display(), e);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const FGDC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata>
  <idinfo>
    <descript>
      <abstract>Road centrelines &amp; bridges</abstract>
    </descript>
    <spdom>
      <bounding>
        <westbc>-10.5</westbc>
        <eastbc>12.25</eastbc>
        <northbc>50</northbc>
        <southbc>40</southbc>
      </bounding>
    </spdom>
  </idinfo>
</metadata>"#;

    #[test]
    fn test_parse_fgdc() {
        let metadata = ShpXmlMetadata::parse(FGDC).unwrap();
        assert_eq!(metadata.abstract_text.as_deref(), Some("Road centrelines & bridges"));
        assert_eq!(metadata.bounds, Some(Envelope::new(-10.5, 40.0, 12.25, 50.0)));
    }

    #[test]
    fn test_partial_bounds_are_dropped() {
        let metadata = ShpXmlMetadata::parse("<metadata><westbc>1</westbc></metadata>").unwrap();
        assert!(metadata.bounds.is_none());
        assert!(metadata.abstract_text.is_none());
    }

    #[test]
    fn test_sidecar_files() {
        let dir = TempDir::new().unwrap();
        let files = ShpFiles::from_path(dir.path().join("roads.shp")).unwrap();
        let owner = LockOwner::new();

        assert_eq!(read_prj(&files, owner).unwrap(), None);
        write_prj(&files, owner, "GEOGCS[\"WGS 84\"]\n").unwrap();
        assert_eq!(read_prj(&files, owner).unwrap().as_deref(), Some("GEOGCS[\"WGS 84\"]"));

        write_cpg(&files, owner, encoding_rs::UTF_8).unwrap();
        assert_eq!(read_cpg(&files, owner).unwrap(), Some(encoding_rs::UTF_8));

        std::fs::write(dir.path().join("roads.cpg"), "1252").unwrap();
        assert_eq!(read_cpg(&files, owner).unwrap(), Some(encoding_rs::WINDOWS_1252));

        std::fs::write(dir.path().join("roads.cpg"), "not-a-charset").unwrap();
        assert_eq!(read_cpg(&files, owner).unwrap(), None);

        std::fs::write(dir.path().join("roads.shp.xml"), "<metadata><abstract>x</wrong></metadata>").unwrap();
        assert_eq!(read_shp_xml(&files, owner).unwrap(), None);
    }
}
