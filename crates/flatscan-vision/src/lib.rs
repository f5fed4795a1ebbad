// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// flatscan-vision - The vision capabilities the document pipeline consumes.
//
// `VisionBackend` is the narrow seam between the pipeline and pixel work:
// boundary detection, rotation, fit-scaling, projective warp, grayscale and
// adaptive threshold. `ImageprocBackend` implements it on top of the `image`
// and `imageproc` crates.

pub mod backend;
pub mod detect;
pub mod processor;

pub use backend::VisionBackend;
pub use detect::BoundaryDetector;
pub use processor::ImageprocBackend;
