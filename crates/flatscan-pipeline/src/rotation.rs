// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Orientation search over the four cardinal rotations.
//
// The working copy is rotated cumulatively by +90, +180 and +270 degrees
// between attempts, which visits 0, 90, 270 and 180 in that order with
// exactly four detections.

use std::sync::Arc;

use flatscan_core::error::Result;
use flatscan_vision::VisionBackend;
use image::DynamicImage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::worker::run_blocking;

/// Increments applied to the working copy after each failed attempt.
const ROTATION_STEPS: [u32; 3] = [90, 180, 270];

/// Outcome of the orientation search.
#[derive(Debug, Clone)]
pub struct Orientation {
    /// The accepted rotated copy, or the original when nothing matched.
    pub image: Arc<DynamicImage>,
    /// Clockwise rotation of `image` relative to the source, if one matched.
    pub rotation: Option<u32>,
    /// Number of detection calls made.
    pub attempts: u32,
}

/// Find an orientation at which the backend detects a boundary.
#[instrument(skip_all, fields(width = source.width(), height = source.height()))]
pub async fn normalize_orientation(
    backend: Arc<dyn VisionBackend>,
    source: Arc<DynamicImage>,
    cancel: &CancellationToken,
) -> Result<Orientation> {
    let mut working = Arc::clone(&source);
    let mut angle = 0u32;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let found = {
            let backend = Arc::clone(&backend);
            let image = Arc::clone(&working);
            run_blocking(cancel, move || backend.detect_boundary(&image).is_some()).await?
        };
        debug!(angle, attempts, found, "orientation attempt");
        if found {
            info!(angle, attempts, "orientation found");
            return Ok(Orientation {
                image: working,
                rotation: Some(angle),
                attempts,
            });
        }

        let Some(&step) = ROTATION_STEPS.get(attempts as usize - 1) else {
            break;
        };
        working = {
            let backend = Arc::clone(&backend);
            let image = Arc::clone(&working);
            Arc::new(run_blocking(cancel, move || backend.rotate(&image, step as f32)).await?)
        };
        angle = (angle + step) % 360;
    }

    info!(attempts, "no orientation matched, keeping source as is");
    Ok(Orientation {
        image: source,
        rotation: None,
        attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, StubBackend, marked_image, orientation_of};
    use flatscan_core::error::ScanError;

    async fn search(accept: Option<u32>) -> (Orientation, Arc<StubBackend>) {
        let stub = StubBackend::accepting(accept);
        let backend: Arc<dyn VisionBackend> = stub.clone();
        let out = normalize_orientation(backend, Arc::new(marked_image()), &CancellationToken::new())
            .await
            .expect("search");
        (out, stub)
    }

    #[tokio::test]
    async fn visits_cardinal_angles_in_fixed_order() {
        let expected = [Some(0), Some(90), Some(270), Some(180)];
        for (n, target) in [0u32, 90, 270, 180].into_iter().enumerate() {
            let (out, stub) = search(Some(target)).await;
            assert_eq!(stub.detected_orientations(), expected[..=n].to_vec(), "target {target}");
            assert_eq!(out.rotation, Some(target));
            assert_eq!(out.attempts as usize, n + 1);
            assert_eq!(orientation_of(&out.image), Some(target));
        }
    }

    #[tokio::test]
    async fn rotations_compound_on_the_working_copy() {
        let (_, stub) = search(Some(180)).await;
        let steps: Vec<f32> = stub
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Rotate { degrees } => Some(degrees),
                _ => None,
            })
            .collect();
        assert_eq!(steps, vec![90.0, 180.0, 270.0]);
    }

    #[tokio::test]
    async fn exhaustion_returns_original_after_four_calls() {
        let (out, stub) = search(None).await;
        assert_eq!(stub.count(|c| matches!(c, Call::Detect { .. })), 4);
        assert_eq!(out.rotation, None);
        assert_eq!(out.attempts, 4);
        assert_eq!(orientation_of(&out.image), Some(0));
    }

    #[tokio::test]
    async fn cancelled_search_stops_early() {
        let token = CancellationToken::new();
        token.cancel();
        let stub = StubBackend::accepting(Some(0));
        let err = normalize_orientation(stub.clone(), Arc::new(marked_image()), &token)
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::Cancelled));
        assert!(stub.calls().is_empty());
    }
}
