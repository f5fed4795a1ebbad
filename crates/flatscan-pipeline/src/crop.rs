// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Perspective correction followed by binarization.

use flatscan_core::config::{ThresholdConfig, ValidationPolicy};
use flatscan_core::error::{Result, ScanError};
use flatscan_core::types::{CornerSet, ImageSize};
use flatscan_vision::VisionBackend;
use image::{DynamicImage, GenericImageView};
use tracing::{debug, info, instrument};

use crate::corners::validate_quad;

/// Result of a crop: the flattened colour page and its black/white version.
#[derive(Debug, Clone)]
pub struct ScanOutput {
    pub corrected: DynamicImage,
    pub binarized: DynamicImage,
}

/// Warp `source` along `corners` (source space) and binarize the result.
///
/// The corners must form a valid quad over `source` under `policy`. An
/// incomplete set fails with `IncompleteCornerSet` and a misshapen one with
/// `InvalidPolygon`, both before any backend work is done.
#[instrument(skip_all, fields(corners = corners.len()))]
pub fn correct_and_binarize(
    backend: &dyn VisionBackend,
    source: &DynamicImage,
    corners: &CornerSet,
    threshold: &ThresholdConfig,
    policy: &ValidationPolicy,
) -> Result<ScanOutput> {
    let quad = corners.complete()?;
    let (width, height) = source.dimensions();
    validate_quad(&quad, ImageSize::new(width, height), policy)
        .map_err(|reason| ScanError::InvalidPolygon { reason })?;
    debug!(?quad, "correcting perspective");

    let corrected = backend.warp_quadrilateral_to_rectangle(source, &quad)?;
    let gray = backend.to_grayscale(&corrected);
    let binarized = backend.adaptive_threshold(&gray, threshold.block_size, threshold.constant);

    let (w, h) = corrected.dimensions();
    info!(width = w, height = h, "page corrected and binarized");
    Ok(ScanOutput {
        corrected,
        binarized,
    })
}
