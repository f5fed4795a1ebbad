// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Display-space to source-space coordinate mapping.

use flatscan_core::error::{Result, ScanError};
use flatscan_core::types::{CornerSet, ImageSize};
use tracing::debug;

/// Per-axis factors from display pixels to source pixels.
///
/// The axes are independent: a display image whose aspect ratio differs from
/// the source (rounding during fit-scaling, or a host that stretches) gets a
/// different factor on each axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleRatios {
    pub x: f32,
    pub y: f32,
}

impl ScaleRatios {
    /// Ratios `source / display` on each axis.
    pub fn between(display: ImageSize, source: ImageSize) -> Result<Self> {
        if display.is_empty() {
            return Err(ScanError::InvalidDimensions {
                width: display.width,
                height: display.height,
            });
        }
        Ok(Self {
            x: source.width as f32 / display.width as f32,
            y: source.height as f32 / display.height as f32,
        })
    }
}

/// Map display-space corners into source space.
///
/// Missing corners stay missing and results outside the source image are
/// passed through unchanged; the crop stage decides what to do with them.
pub fn map_to_source(
    corners: &CornerSet,
    display_size: ImageSize,
    source_size: ImageSize,
) -> Result<CornerSet> {
    let ratios = ScaleRatios::between(display_size, source_size)?;
    debug!(
        x_ratio = ratios.x,
        y_ratio = ratios.y,
        %display_size,
        %source_size,
        "mapping corners to source"
    );
    Ok(corners.map_points(|p| p.scale(ratios.x, ratios.y)))
}
