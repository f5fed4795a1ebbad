// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Default vision backend: rotation, fit-scaling, projective warp, grayscale
// and adaptive threshold on in-memory images using the `image` and
// `imageproc` crates.

use flatscan_core::config::DetectionConfig;
use flatscan_core::error::{Result, ScanError};
use flatscan_core::types::Point2D;
use image::{DynamicImage, GrayImage, Luma, Rgba, RgbaImage};
use imageproc::definitions::Image;
use imageproc::geometric_transformations::{self, Interpolation, Projection, warp_into};
use imageproc::integral_image::integral_image;
use tracing::{debug, info, instrument};

use crate::backend::VisionBackend;
use crate::detect::BoundaryDetector;

/// `VisionBackend` over `image` + `imageproc`.
///
/// Stateless apart from its detection settings, so one instance can be
/// shared between sessions behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct ImageprocBackend {
    detector: BoundaryDetector,
}

impl ImageprocBackend {
    pub fn new(detection: DetectionConfig) -> Self {
        Self {
            detector: BoundaryDetector::new(detection),
        }
    }
}

impl VisionBackend for ImageprocBackend {
    fn detect_boundary(&self, image: &DynamicImage) -> Option<[Point2D; 4]> {
        self.detector.detect(image)
    }

    /// Whole quarter turns are exact pixel shuffles; any other angle is
    /// resampled on an RGBA copy with transparent corners.
    #[instrument(skip(self, image))]
    fn rotate(&self, image: &DynamicImage, degrees: f32) -> DynamicImage {
        let turns = degrees / 90.0;
        if (turns - turns.round()).abs() < 1e-4 {
            return match (turns.round() as i64).rem_euclid(4) {
                0 => image.clone(),
                1 => image.rotate90(),
                2 => image.rotate180(),
                _ => image.rotate270(),
            };
        }

        debug!(degrees, "free rotation");
        DynamicImage::ImageRgba8(geometric_transformations::rotate_about_center(
            &image.to_rgba8(),
            degrees.to_radians(),
            Interpolation::Bilinear,
            Rgba([255u8, 255, 255, 0]),
        ))
    }

    /// Uses Lanczos3 filtering; upscales as well as downscales.
    #[instrument(skip(self, image), fields(target_width, target_height))]
    fn scale_to_fit(
        &self,
        image: &DynamicImage,
        target_width: u32,
        target_height: u32,
    ) -> DynamicImage {
        if target_width == 0 || target_height == 0 {
            return image.clone();
        }
        let scaled = image.resize(
            target_width,
            target_height,
            image::imageops::FilterType::Lanczos3,
        );
        debug!(
            from_w = image.width(),
            from_h = image.height(),
            new_w = scaled.width(),
            new_h = scaled.height(),
            "Scaled to fit"
        );
        scaled
    }

    /// The output is as wide as the longer of the top and bottom edges and as
    /// tall as the longer of the left and right edges. Colour images come
    /// back as RGBA, grayscale ones stay grayscale.
    #[instrument(skip(self, image, corners))]
    fn warp_quadrilateral_to_rectangle(
        &self,
        image: &DynamicImage,
        corners: &[Point2D; 4],
    ) -> Result<DynamicImage> {
        let [tl, tr, bl, br] = *corners;
        let out_w = tl.distance(tr).max(bl.distance(br)).round().max(1.0) as u32;
        let out_h = tl.distance(bl).max(tr.distance(br)).round().max(1.0) as u32;

        let src: [(f32, f32); 4] = [tl.into(), tr.into(), br.into(), bl.into()];
        let dest: [(f32, f32); 4] = [
            (0.0, 0.0),
            (out_w as f32, 0.0),
            (out_w as f32, out_h as f32),
            (0.0, out_h as f32),
        ];

        let projection = Projection::from_control_points(src, dest).ok_or_else(|| {
            ScanError::Backend(format!("no projective transform for corners {corners:?}"))
        })?;

        let warped = if image.color().has_color() {
            let input = image.to_rgba8();
            let mut output = RgbaImage::new(out_w, out_h);
            warp_into(
                &input,
                &projection,
                Interpolation::Bilinear,
                Rgba([255u8, 255, 255, 255]),
                &mut output,
            );
            DynamicImage::ImageRgba8(output)
        } else {
            let input = image.to_luma8();
            let mut output = GrayImage::new(out_w, out_h);
            warp_into(
                &input,
                &projection,
                Interpolation::Bilinear,
                Luma([255u8]),
                &mut output,
            );
            DynamicImage::ImageLuma8(output)
        };

        info!(out_w, out_h, "Perspective warp applied");
        Ok(warped)
    }

    fn to_grayscale(&self, image: &DynamicImage) -> DynamicImage {
        DynamicImage::ImageLuma8(image.to_luma8())
    }

    /// A pixel turns white when it is brighter than the rounded mean of the
    /// `block_size` window around it (clipped at the borders) minus
    /// `constant`, and black otherwise.
    #[instrument(skip(self, image))]
    fn adaptive_threshold(
        &self,
        image: &DynamicImage,
        block_size: u32,
        constant: i32,
    ) -> DynamicImage {
        let gray = image.to_luma8();
        let means = BoxMeans::new(&gray);
        let radius = block_size / 2;

        let binary = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
            let cutoff = means.around(x, y, radius).round() as i32 - constant;
            let ink = i32::from(gray.get_pixel(x, y).0[0]) <= cutoff;
            Luma([if ink { 0 } else { 255 }])
        });

        debug!(width = binary.width(), height = binary.height(), "binarized");
        DynamicImage::ImageLuma8(binary)
    }
}

/// Window means over a grayscale image, backed by an integral image.
struct BoxMeans {
    sums: Image<Luma<u64>>,
    width: u32,
    height: u32,
}

impl BoxMeans {
    fn new(gray: &GrayImage) -> Self {
        Self {
            sums: integral_image::<_, u64>(gray),
            width: gray.width(),
            height: gray.height(),
        }
    }

    /// Mean of the `2 * radius + 1` square centred on (x, y), clipped to the
    /// image. `(x, y)` must lie inside the image.
    fn around(&self, x: u32, y: u32, radius: u32) -> f64 {
        let left = x.saturating_sub(radius);
        let top = y.saturating_sub(radius);
        let right = x.saturating_add(radius).saturating_add(1).min(self.width);
        let bottom = y.saturating_add(radius).saturating_add(1).min(self.height);

        // The integral image is one larger than the input on each axis, with
        // entry (x, y) holding the sum of everything above and left of it.
        let at = |x: u32, y: u32| self.sums.get_pixel(x, y).0[0];
        let total = at(right, bottom) + at(left, top) - at(right, top) - at(left, bottom);
        let count = u64::from(right - left) * u64::from(bottom - top);
        total as f64 / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn backend() -> ImageprocBackend {
        ImageprocBackend::default()
    }

    #[test]
    fn quarter_turn_swaps_dimensions() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(40, 10));
        let rotated = backend().rotate(&img, 90.0);
        assert_eq!((rotated.width(), rotated.height()), (10, 40));
        let back = backend().rotate(&rotated, 270.0);
        assert_eq!((back.width(), back.height()), (40, 10));
    }

    #[test]
    fn quarter_turn_is_clockwise() {
        let mut img = GrayImage::from_pixel(3, 2, Luma([0u8]));
        img.put_pixel(0, 0, Luma([255u8]));
        let rotated = backend().rotate(&DynamicImage::ImageLuma8(img), 90.0).to_luma8();
        // Top-left moves to top-right under a clockwise quarter turn.
        assert_eq!(rotated.get_pixel(1, 0).0[0], 255);
    }

    #[test]
    fn scale_to_fit_preserves_aspect() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(400, 200));
        let scaled = backend().scale_to_fit(&img, 100, 100);
        assert_eq!((scaled.width(), scaled.height()), (100, 50));
    }

    #[test]
    fn outline_warp_is_identity_sized() {
        let mut img = RgbImage::from_pixel(64, 48, Rgb([200u8, 10, 10]));
        img.put_pixel(5, 5, Rgb([0u8, 0, 255]));
        let img = DynamicImage::ImageRgb8(img);
        let corners = [
            Point2D::new(0.0, 0.0),
            Point2D::new(64.0, 0.0),
            Point2D::new(0.0, 48.0),
            Point2D::new(64.0, 48.0),
        ];
        let warped = backend()
            .warp_quadrilateral_to_rectangle(&img, &corners)
            .expect("warp");
        assert_eq!((warped.width(), warped.height()), (64, 48));
        let rgba = warped.to_rgba8();
        assert_eq!(rgba.get_pixel(20, 20).0[0], 200);
        assert_eq!(rgba.get_pixel(5, 5).0[2], 255);
    }

    #[test]
    fn warp_of_tilted_quad_uses_longest_edges() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(200, 200, Luma([90u8])));
        let corners = [
            Point2D::new(20.0, 10.0),
            Point2D::new(120.0, 10.0),
            Point2D::new(10.0, 90.0),
            Point2D::new(130.0, 90.0),
        ];
        let warped = backend()
            .warp_quadrilateral_to_rectangle(&img, &corners)
            .expect("warp");
        // Bottom edge is 120 long; left/right edges are hypot(10, 80).
        assert_eq!(warped.width(), 120);
        assert_eq!(warped.height(), (10.0f32).hypot(80.0).round() as u32);
        assert!(!warped.color().has_color());
    }

    #[test]
    fn threshold_separates_ink_from_paper() {
        let mut img = GrayImage::from_pixel(100, 100, Luma([220u8]));
        for y in 40..60 {
            for x in 40..60 {
                img.put_pixel(x, y, Luma([40u8]));
            }
        }
        let bin = backend()
            .adaptive_threshold(&DynamicImage::ImageLuma8(img), 31, 7)
            .to_luma8();
        assert_eq!(bin.get_pixel(50, 50).0[0], 0, "ink should be black");
        assert_eq!(bin.get_pixel(5, 5).0[0], 255, "paper should be white");
        assert!(bin.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[test]
    fn uniform_page_binarizes_white() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(50, 30, Luma([128u8])));
        let bin = backend().adaptive_threshold(&img, 31, 7).to_luma8();
        assert!(bin.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn box_means_clip_at_the_border() {
        // Left half 0, right half 200.
        let gray = GrayImage::from_fn(10, 10, |x, _| Luma([if x < 5 { 0 } else { 200 }]));
        let means = BoxMeans::new(&gray);
        assert!((means.around(0, 0, 3) - 0.0).abs() < 1e-9);
        assert!((means.around(9, 9, 3) - 200.0).abs() < 1e-9);
        // Columns 3..=7: two dark, three light.
        assert!((means.around(5, 5, 2) - 120.0).abs() < 1e-9, "{}", means.around(5, 5, 2));
    }

    #[test]
    fn free_rotation_keeps_frame_size() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(40, 20));
        let rotated = backend().rotate(&img, 10.0);
        assert_eq!((rotated.width(), rotated.height()), (40, 20));
        assert_eq!(backend().rotate(&img, -270.0).width(), 20);
        assert_eq!(backend().rotate(&img, 360.0).width(), 40);
    }

    #[test]
    fn grayscale_is_single_channel() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([255u8, 0, 0])));
        let gray = backend().to_grayscale(&img);
        assert!(!gray.color().has_color());
        assert_eq!((gray.width(), gray.height()), (4, 4));
    }
}
