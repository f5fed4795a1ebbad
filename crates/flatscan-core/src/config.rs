// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;

/// Adaptive threshold parameters for the binarized output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Side of the square neighbourhood used for the local mean (odd).
    pub block_size: u32,
    /// Subtracted from the local mean before comparison.
    pub constant: i32,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            block_size: 31,
            constant: 7,
        }
    }
}

/// Acceptance policy for a detected quadrilateral.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationPolicy {
    /// Minimum quad area as a fraction of the reference image area.
    pub min_area_fraction: f64,
    /// How far outside the image a corner may sit, as a fraction of the
    /// image width (x) or height (y).
    pub bounds_tolerance: f32,
    /// Minimum |sin| of the turn at each corner.
    pub min_turn: f64,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            min_area_fraction: 0.01,
            bounds_tolerance: 0.05,
            min_turn: 1e-3,
        }
    }
}

/// Parameters for the contour-based boundary detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Longer side of the working copy used for detection.
    pub max_working_side: u32,
    pub blur_sigma: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Contours enclosing less than this many pixels are ignored.
    pub min_contour_area: f64,
    /// Douglas-Peucker epsilon, as fractions of the contour perimeter.
    pub arc_length_factors: Vec<f64>,
    /// Accepted candidate area range, as fractions of the image area.
    pub area_lower: f64,
    pub area_upper: f64,
    /// Largest accepted |cos| of any corner angle.
    pub max_cosine: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            max_working_side: 2000,
            blur_sigma: 1.1,
            canny_low: 40.0,
            canny_high: 80.0,
            min_contour_area: 500.0,
            arc_length_factors: vec![0.05, 0.1],
            area_lower: 0.4,
            area_upper: 0.98,
            max_cosine: 0.1,
        }
    }
}

/// Settings for a scan session and its default backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub threshold: ThresholdConfig,
    pub validation: ValidationPolicy,
    pub detection: DetectionConfig,
    /// How long a pass waits for the host viewport before giving up.
    pub host_ready_timeout_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            threshold: ThresholdConfig::default(),
            validation: ValidationPolicy::default(),
            detection: DetectionConfig::default(),
            host_ready_timeout_ms: 10_000,
        }
    }
}

impl ScanConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&text)?;
        info!(path = %path.as_ref().display(), "scan config loaded");
        Ok(config)
    }

    pub fn host_ready_timeout(&self) -> Duration {
        Duration::from_millis(self.host_ready_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_binarization_constants() {
        let config = ScanConfig::default();
        assert_eq!(config.threshold.block_size, 31);
        assert_eq!(config.threshold.constant, 7);
        assert_eq!(config.host_ready_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config =
            ScanConfig::from_json(r#"{ "threshold": { "constant": 12 }, "host_ready_timeout_ms": 250 }"#)
                .expect("parse");
        assert_eq!(config.threshold.block_size, 31);
        assert_eq!(config.threshold.constant, 12);
        assert_eq!(config.host_ready_timeout_ms, 250);
        assert_eq!(config.detection, DetectionConfig::default());
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(file, r#"{{ "validation": {{ "bounds_tolerance": 0.2 }} }}"#).expect("write");
        let config = ScanConfig::load(file.path()).expect("load");
        assert!((config.validation.bounds_tolerance - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn malformed_json_is_a_serialization_error() {
        let err = ScanConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, crate::ScanError::Serialization(_)));
    }
}
