// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Contour-based document boundary detection.
//
// Edges are extracted from a downscaled grayscale copy, thickened so the page
// border forms a closed band, and traced into contours. Each sufficiently
// large contour is simplified with Douglas-Peucker at a couple of tolerances;
// the largest simplification that is a plausible page (four vertices, convex,
// near-right angles, covering a large share of the frame) wins.

use flatscan_core::config::DetectionConfig;
use flatscan_core::geometry::{angle_cosine, is_convex, polygon_area};
use flatscan_core::types::Point2D;
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma};
use imageproc::contours::find_contours;
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::morphology::dilate;
use imageproc::point::Point;
use tracing::{debug, instrument};

/// Finds the largest page-like quadrilateral in an image.
#[derive(Debug, Clone, Default)]
pub struct BoundaryDetector {
    config: DetectionConfig,
}

impl BoundaryDetector {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    /// Detect the page boundary, returning its four vertices in the
    /// coordinate space of `image` (unordered).
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn detect(&self, image: &DynamicImage) -> Option<[Point2D; 4]> {
        if image.width() == 0 || image.height() == 0 {
            return None;
        }

        let (working, ratio) = self.working_copy(image);
        let edges = self.edge_map(&working);
        let candidates = self.candidates(&edges);
        debug!(candidates = candidates.len(), ratio, "boundary candidates collected");

        let best = candidates.into_iter().max_by(|a, b| {
            polygon_area(a).total_cmp(&polygon_area(b))
        })?;

        let inverse = 1.0 / ratio;
        Some(best.map(|p| p.scale(inverse, inverse)))
    }

    /// Brightness copy whose longer side is at most `max_working_side`.
    ///
    /// Returns the copy and the scale factor applied to reach it.
    fn working_copy(&self, image: &DynamicImage) -> (GrayImage, f32) {
        let gray = value_channel(image);
        let longest = gray.width().max(gray.height());
        let max_side = self.config.max_working_side.max(1);
        if longest <= max_side {
            return (gray, 1.0);
        }

        let ratio = max_side as f32 / longest as f32;
        let w = ((gray.width() as f32 * ratio).round() as u32).max(1);
        let h = ((gray.height() as f32 * ratio).round() as u32).max(1);
        debug!(w, h, ratio, "downscaled for detection");
        (image::imageops::resize(&gray, w, h, FilterType::Triangle), ratio)
    }

    /// Blur, Canny, then a 3x3 dilation to close small gaps in the border.
    fn edge_map(&self, gray: &GrayImage) -> GrayImage {
        let blurred = gaussian_blur_f32(gray, self.config.blur_sigma);
        let edges = canny(&blurred, self.config.canny_low, self.config.canny_high);
        dilate(&edges, Norm::LInf, 1)
    }

    fn candidates(&self, edges: &GrayImage) -> Vec<[Point2D; 4]> {
        let frame_area = edges.width() as f64 * edges.height() as f64;
        let contours = find_contours::<i32>(edges);

        let mut found = Vec::new();
        for &factor in &self.config.arc_length_factors {
            for contour in &contours {
                if contour.points.len() < 4 {
                    continue;
                }
                let outline = to_points(&contour.points);
                if polygon_area(&outline) <= self.config.min_contour_area {
                    continue;
                }

                let epsilon = arc_length(&contour.points, true) * factor;
                let approx = to_points(&approximate_polygon_dp(&contour.points, epsilon, true));
                if let Some(quad) = self.as_page(&approx, frame_area) {
                    found.push(quad);
                }
            }
        }
        found
    }

    /// Accept a simplified contour as a page if it passes every shape check.
    fn as_page(&self, polygon: &[Point2D], frame_area: f64) -> Option<[Point2D; 4]> {
        let polygon = match polygon {
            // Some simplifications repeat the first vertex at the end.
            [first, rest @ ..] if rest.len() == 4 && rest.last() == Some(first) => &polygon[..4],
            _ => polygon,
        };
        let quad: [Point2D; 4] = polygon.try_into().ok()?;

        let area = polygon_area(&quad);
        if area < frame_area * self.config.area_lower || area > frame_area * self.config.area_upper
        {
            return None;
        }

        if !is_convex(&quad, 1e-6) {
            return None;
        }

        let max_cosine = (2..5)
            .map(|i| angle_cosine(quad[i % 4], quad[i - 2], quad[i - 1]).abs())
            .fold(0.0f64, f64::max);
        (max_cosine < self.config.max_cosine).then_some(quad)
    }
}

/// HSV value (the largest of R, G and B), darkened by 5% of its mean.
///
/// Unlike luma this keeps a saturated page as bright as a white one, so a
/// coloured sheet still stands out from a dark desk.
fn value_channel(image: &DynamicImage) -> GrayImage {
    let rgb = image.to_rgb8();
    let mut value = GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        Luma([r.max(g).max(b)])
    });

    let count = (u64::from(value.width()) * u64::from(value.height())).max(1);
    let total: u64 = value.pixels().map(|p| u64::from(p.0[0])).sum();
    let shift = (0.05 * total as f64 / count as f64).round() as u8;
    for p in value.pixels_mut() {
        p.0[0] = p.0[0].saturating_sub(shift);
    }
    value
}

fn to_points(points: &[Point<i32>]) -> Vec<Point2D> {
    points
        .iter()
        .map(|p| Point2D::new(p.x as f32, p.y as f32))
        .collect()
}
