use crate::models::{Coord, Geometry};

/// Validation result with details
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

/// Validation error with location details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub location: String,
    pub reason: String,
}

impl ValidationResult {
    /// Create a valid result
    pub fn valid() -> Self {
        Self { is_valid: true, errors: Vec::new() }
    }

    /// Add an error to the result
    pub fn add_error(&mut self, location: String, reason: String) {
        self.is_valid = false;
        self.errors.push(ValidationError { location, reason });
    }

    /// All errors joined into one line
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.location, e.reason))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Check that a geometry can be written as a shape record.
///
/// Polygon rings are expected to be closed already (see `orientation::normalize`).
pub fn validate_geometry(geometry: &Geometry) -> ValidationResult {
    let mut result = ValidationResult::valid();

    match geometry {
        Geometry::Null => {}
        Geometry::Point { coordinates } => check_finite("Point", std::slice::from_ref(coordinates), &mut result),
        Geometry::MultiPoint { coordinates } => check_finite("MultiPoint", coordinates, &mut result),
        Geometry::LineString { coordinates } => validate_line("LineString", coordinates, &mut result),
        Geometry::MultiLineString { coordinates } => {
            for (i, line) in coordinates.iter().enumerate() {
                validate_line(&format!("MultiLineString[{}]", i), line, &mut result);
            }
        }
        Geometry::Polygon { coordinates } => validate_rings("Polygon", coordinates, &mut result),
        Geometry::MultiPolygon { coordinates } => {
            for (i, rings) in coordinates.iter().enumerate() {
                if rings.is_empty() {
                    result.add_error(format!("MultiPolygon[{}]", i), "Polygon has no rings".to_string());
                }
                validate_rings(&format!("MultiPolygon[{}]", i), rings, &mut result);
            }
        }
        Geometry::MultiPatch { patches } => {
            for (i, patch) in patches.iter().enumerate() {
                let location = format!("MultiPatch[{}]", i);
                if patch.coordinates.len() < 3 {
                    result.add_error(
                        location.clone(),
                        format!("Patch must have at least 3 points, found {}", patch.coordinates.len()),
                    );
                }
                check_finite(&location, &patch.coordinates, &mut result);
            }
        }
    }

    result
}

fn validate_line(location: &str, line: &[Coord], result: &mut ValidationResult) {
    // A line part must have at least 2 points
    if line.len() < 2 {
        result.add_error(
            location.to_string(),
            format!("Line must have at least 2 points, found {}", line.len()),
        );
    }
    check_finite(location, line, result);
}

fn validate_rings(location: &str, rings: &[Vec<Coord>], result: &mut ValidationResult) {
    for (i, ring) in rings.iter().enumerate() {
        let ring_location = format!("{} ring[{}]", location, i);
        if ring.len() < 4 {
            result.add_error(
                ring_location.clone(),
                format!("Ring must have at least 4 points, found {}", ring.len()),
            );
        }

        if let (Some(first), Some(last)) = (ring.first(), ring.last()) {
            if first.x != last.x || first.y != last.y {
                result.add_error(
                    ring_location.clone(),
                    "Ring must be closed (first point == last point)".to_string(),
                );
            }
        }

        check_finite(&ring_location, ring, result);
    }
}

fn check_finite(location: &str, coords: &[Coord], result: &mut ValidationResult) {
    for (i, coord) in coords.iter().enumerate() {
        if !coord.is_finite() {
            result.add_error(format!("{}[{}]", location, i), "Coordinates must be finite".to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_polygon() {
        let polygon = Geometry::polygon(vec![vec![[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [0.0, 0.0]]]);
        assert!(validate_geometry(&polygon).is_valid);
    }

    #[test]
    fn test_two_point_polygon_rejected() {
        let polygon = Geometry::polygon(vec![vec![[0.0, 0.0], [1.0, 1.0]]]);
        let result = validate_geometry(&polygon);
        assert!(!result.is_valid);
        assert!(result.summary().contains("at least 4 points"));
    }

    #[test]
    fn test_single_point_line_rejected() {
        let line = Geometry::line_string(vec![[0.0, 0.0]]);
        assert!(!validate_geometry(&line).is_valid);
    }

    #[test]
    fn test_non_finite_point_rejected() {
        let point = Geometry::point(f64::NAN, 1.0);
        let result = validate_geometry(&point);
        assert!(!result.is_valid);
        assert_eq!(result.errors[0].location, "Point[0]");
    }
}
