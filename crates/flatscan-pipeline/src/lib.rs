// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// flatscan-pipeline - Detection, normalization and correction of a photographed
// document.
//
// The session orchestrator sequences the stages: an orientation search over
// the four cardinal rotations, fit-scaling into the host viewport, boundary
// detection with corner ordering/validation (falling back to the image
// outline), and on demand the mapping of user-edited corners back to source
// resolution followed by perspective correction and binarization.

pub mod corners;
pub mod crop;
pub mod mapping;
pub mod rotation;
pub mod session;
mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use corners::{CornerAssessment, order_corners, ordered_valid_corners, validate_quad};
pub use crop::{ScanOutput, correct_and_binarize};
pub use mapping::{ScaleRatios, map_to_source};
pub use rotation::{Orientation, normalize_orientation};
pub use session::{DetectionSummary, DetectionTask, HostViewport, LoadingListener, ScanSession};
