// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scripted vision backend for pipeline tests.
//
// Rotation is real (lossless quarter turns) so the stub can tell which
// orientation it is looking at from a marker pixel. Detection succeeds only
// at the configured orientation and records every orientation it was asked
// about.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use flatscan_core::error::Result;
use flatscan_core::types::Point2D;
use flatscan_vision::{ImageprocBackend, VisionBackend};
use image::{DynamicImage, GrayImage, Luma};

/// Backend call, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Detect { orientation: Option<u32> },
    Rotate { degrees: f32 },
    ScaleToFit { width: u32, height: u32 },
    Warp,
    Grayscale,
    Threshold { block_size: u32, constant: i32 },
}

pub struct StubBackend {
    /// Orientation at which detection succeeds.
    accept: Option<u32>,
    /// Points returned on success.
    quad: [Point2D; 4],
    /// Delay applied to every detection call.
    detect_delay: Duration,
    /// Panic inside `detect_boundary`, standing in for a crashed backend.
    panic_on_detect: bool,
    calls: Mutex<Vec<Call>>,
    pixels: ImageprocBackend,
}

impl StubBackend {
    pub fn accepting(accept: Option<u32>) -> Arc<Self> {
        Arc::new(Self::build(accept, Duration::ZERO))
    }

    pub fn slow(accept: Option<u32>, detect_delay: Duration) -> Arc<Self> {
        Arc::new(Self::build(accept, detect_delay))
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            panic_on_detect: true,
            ..Self::build(None, Duration::ZERO)
        })
    }

    fn build(accept: Option<u32>, detect_delay: Duration) -> Self {
        Self {
            accept,
            quad: [
                Point2D::new(2.0, 1.0),
                Point2D::new(18.0, 2.0),
                Point2D::new(1.0, 18.0),
                Point2D::new(19.0, 19.0),
            ],
            detect_delay,
            panic_on_detect: false,
            calls: Mutex::new(Vec::new()),
            pixels: ImageprocBackend::default(),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Orientations seen by `detect_boundary`, in call order.
    pub fn detected_orientations(&self) -> Vec<Option<u32>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Detect { orientation } => Some(orientation),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| matches(c)).count()
    }

    fn record(&self, call: Call) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

/// 30x20 dark image with a white marker at the top-left pixel.
pub fn marked_image() -> DynamicImage {
    let mut img = GrayImage::from_pixel(30, 20, Luma([0u8]));
    img.put_pixel(0, 0, Luma([255u8]));
    DynamicImage::ImageLuma8(img)
}

/// Clockwise rotation of `marked_image` inferred from its marker, or `None`
/// for any other image.
pub fn orientation_of(image: &DynamicImage) -> Option<u32> {
    let gray = image.to_luma8();
    let (w, h) = gray.dimensions();
    let lit = |x: u32, y: u32| gray.get_pixel(x, y).0[0] > 128;
    match (w, h) {
        (30, 20) if lit(0, 0) => Some(0),
        (20, 30) if lit(19, 0) => Some(90),
        (30, 20) if lit(29, 19) => Some(180),
        (20, 30) if lit(0, 29) => Some(270),
        _ => None,
    }
}

impl VisionBackend for StubBackend {
    fn detect_boundary(&self, image: &DynamicImage) -> Option<[Point2D; 4]> {
        if !self.detect_delay.is_zero() {
            std::thread::sleep(self.detect_delay);
        }
        let orientation = orientation_of(image);
        self.record(Call::Detect { orientation });
        if self.panic_on_detect {
            panic!("backend crashed during detection");
        }
        match (orientation, self.accept) {
            (Some(seen), Some(wanted)) if seen == wanted => Some(self.quad),
            _ => None,
        }
    }

    fn rotate(&self, image: &DynamicImage, degrees: f32) -> DynamicImage {
        self.record(Call::Rotate { degrees });
        self.pixels.rotate(image, degrees)
    }

    fn scale_to_fit(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
        self.record(Call::ScaleToFit { width, height });
        // Identity so the marker survives for the follow-up detection.
        image.clone()
    }

    fn warp_quadrilateral_to_rectangle(
        &self,
        image: &DynamicImage,
        corners: &[Point2D; 4],
    ) -> Result<DynamicImage> {
        self.record(Call::Warp);
        self.pixels.warp_quadrilateral_to_rectangle(image, corners)
    }

    fn to_grayscale(&self, image: &DynamicImage) -> DynamicImage {
        self.record(Call::Grayscale);
        self.pixels.to_grayscale(image)
    }

    fn adaptive_threshold(&self, image: &DynamicImage, block_size: u32, constant: i32) -> DynamicImage {
        self.record(Call::Threshold {
            block_size,
            constant,
        });
        self.pixels.adaptive_threshold(image, block_size, constant)
    }
}
