//! Bounding boxes over X/Y with optional Z and M ranges.

use serde::{Deserialize, Serialize};

use super::geometry::Coord;

/// Axis-aligned bounds. A null envelope has `min > max` on every axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub min_z: f64,
    pub max_z: f64,
    pub min_m: f64,
    pub max_m: f64,
}

impl Default for Envelope {
    fn default() -> Self {
        Self::null()
    }
}

impl Envelope {
    /// An envelope that contains nothing
    pub fn null() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
            min_z: f64::INFINITY,
            max_z: f64::NEG_INFINITY,
            min_m: f64::INFINITY,
            max_m: f64::NEG_INFINITY,
        }
    }

    /// 2D envelope from corner ordinates
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y, ..Self::null() }
    }

    pub fn is_null(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    pub fn has_z(&self) -> bool {
        self.min_z <= self.max_z
    }

    pub fn has_m(&self) -> bool {
        self.min_m <= self.max_m
    }

    pub fn expand_to_include(&mut self, coord: &Coord) {
        self.min_x = self.min_x.min(coord.x);
        self.min_y = self.min_y.min(coord.y);
        self.max_x = self.max_x.max(coord.x);
        self.max_y = self.max_y.max(coord.y);
        if let Some(z) = coord.z {
            self.min_z = self.min_z.min(z);
            self.max_z = self.max_z.max(z);
        }
        if let Some(m) = coord.m {
            self.min_m = self.min_m.min(m);
            self.max_m = self.max_m.max(m);
        }
    }

    /// Grow this envelope to cover `other`
    pub fn merge(&mut self, other: &Envelope) {
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
        self.min_z = self.min_z.min(other.min_z);
        self.max_z = self.max_z.max(other.max_z);
        self.min_m = self.min_m.min(other.min_m);
        self.max_m = self.max_m.max(other.max_m);
    }

    /// X/Y intersection test; null envelopes intersect nothing
    pub fn intersects(&self, other: &Envelope) -> bool {
        if self.is_null() || other.is_null() {
            return false;
        }
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    /// X/Y ordinates as written into headers: zeros for a null envelope
    pub fn xy_or_zero(&self) -> [f64; 4] {
        if self.is_null() {
            [0.0; 4]
        } else {
            [self.min_x, self.min_y, self.max_x, self.max_y]
        }
    }

    /// Z range as written into headers
    pub fn z_or_zero(&self) -> [f64; 2] {
        if self.has_z() {
            [self.min_z, self.max_z]
        } else {
            [0.0; 2]
        }
    }

    /// M range as written into headers
    pub fn m_or_zero(&self) -> [f64; 2] {
        if self.has_m() {
            [self.min_m, self.max_m]
        } else {
            [0.0; 2]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_envelope() {
        let envelope = Envelope::null();
        assert!(envelope.is_null());
        assert_eq!(envelope.xy_or_zero(), [0.0; 4]);
        assert!(!envelope.intersects(&Envelope::new(0.0, 0.0, 1.0, 1.0)));
    }

    #[test]
    fn test_merge_and_intersects() {
        let mut envelope = Envelope::new(0.0, 0.0, 1.0, 1.0);
        envelope.merge(&Envelope::new(5.0, -2.0, 6.0, 0.5));
        assert_eq!(envelope.xy_or_zero(), [0.0, -2.0, 6.0, 1.0]);
        assert!(envelope.intersects(&Envelope::new(5.5, 0.0, 10.0, 10.0)));
        assert!(!envelope.intersects(&Envelope::new(7.0, 0.0, 10.0, 10.0)));
    }

    #[test]
    fn test_expand_with_measures() {
        let mut envelope = Envelope::null();
        envelope.expand_to_include(&Coord::xyzm(1.0, 2.0, 3.0, 4.0));
        envelope.expand_to_include(&Coord::xy(-1.0, 5.0));
        assert_eq!(envelope.z_or_zero(), [3.0, 3.0]);
        assert_eq!(envelope.m_or_zero(), [4.0, 4.0]);
        assert_eq!(envelope.xy_or_zero(), [-1.0, 2.0, 1.0, 5.0]);
    }
}
