// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait for the vision operations the pipeline needs.

use flatscan_core::error::Result;
use flatscan_core::types::Point2D;
use image::DynamicImage;

/// The six pixel-level capabilities the document pipeline calls into.
///
/// Every method is synchronous and may be slow; the session runs them on
/// blocking worker threads. Each call returns a new image and never mutates
/// its input.
pub trait VisionBackend: Send + Sync {
    /// Find the document boundary. Returns four unordered points in the
    /// coordinate space of `image`, or `None` if nothing plausible was found.
    fn detect_boundary(&self, image: &DynamicImage) -> Option<[Point2D; 4]>;

    /// Rotate clockwise by `degrees`.
    fn rotate(&self, image: &DynamicImage, degrees: f32) -> DynamicImage;

    /// Scale preserving aspect ratio so the result fits inside
    /// `target_width` x `target_height`.
    fn scale_to_fit(&self, image: &DynamicImage, target_width: u32, target_height: u32)
    -> DynamicImage;

    /// Warp the quadrilateral with corners in index order (top-left,
    /// top-right, bottom-left, bottom-right) onto an axis-aligned rectangle.
    fn warp_quadrilateral_to_rectangle(
        &self,
        image: &DynamicImage,
        corners: &[Point2D; 4],
    ) -> Result<DynamicImage>;

    fn to_grayscale(&self, image: &DynamicImage) -> DynamicImage;

    /// Local-mean binarization over a `block_size` square neighbourhood.
    fn adaptive_threshold(&self, image: &DynamicImage, block_size: u32, constant: i32)
    -> DynamicImage;
}
