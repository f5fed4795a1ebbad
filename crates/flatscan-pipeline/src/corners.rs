// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Corner ordering and quadrilateral validation.
//
// Four unordered points are assigned to corner roles by extremes of x+y and
// y-x: top-left minimises x+y, bottom-right maximises it, top-right minimises
// y-x, bottom-left maximises it. Ties are broken on the coordinates
// themselves, so the result depends only on the set of points and never on
// the order they arrive in.
//
// A quad is accepted when, with the policy in `ValidationPolicy`:
//   * every corner lies within the reference image grown by
//     `bounds_tolerance` of its width/height on each side;
//   * opposite edges do not cross;
//   * its area is at least `min_area_fraction` of the image area;
//   * it turns the same way at every corner, by at least `min_turn`.
// Anything else falls back to the image outline.

use std::cmp::Ordering;

use flatscan_core::config::ValidationPolicy;
use flatscan_core::geometry::{is_convex, polygon_area, quad_self_intersects, ring};
use flatscan_core::types::{CornerSet, CornerSource, FallbackReason, ImageSize, Point2D};
use tracing::{debug, warn};

/// Corners chosen for a session, with where they came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CornerAssessment {
    pub corners: CornerSet,
    pub source: CornerSource,
}

/// Assign four unordered points to corner roles.
///
/// Returns `None` when two roles resolve to the same point, which happens
/// for duplicated, collinear and some strongly concave inputs.
pub fn order_corners(points: &[Point2D; 4]) -> Option<CornerSet> {
    let sum = |p: Point2D| p.x + p.y;
    let diff = |p: Point2D| p.y - p.x;

    let top_left = extreme(points, sum, Ordering::Less)?;
    let bottom_right = extreme(points, sum, Ordering::Greater)?;
    let top_right = extreme(points, diff, Ordering::Less)?;
    let bottom_left = extreme(points, diff, Ordering::Greater)?;

    let ordered = [top_left, top_right, bottom_left, bottom_right];
    for i in 0..4 {
        for j in (i + 1)..4 {
            if ordered[i] == ordered[j] {
                return None;
            }
        }
    }
    Some(CornerSet::from_ordered(ordered))
}

/// The point whose `key` is smallest (`Less`) or largest (`Greater`), with
/// ties broken on x then y in the same direction.
fn extreme(points: &[Point2D], key: impl Fn(Point2D) -> f32, want: Ordering) -> Option<Point2D> {
    let rank = |a: Point2D, b: Point2D| {
        key(a)
            .total_cmp(&key(b))
            .then(a.x.total_cmp(&b.x))
            .then(a.y.total_cmp(&b.y))
    };
    points
        .iter()
        .copied()
        .reduce(|best, p| if rank(p, best) == want { p } else { best })
}

/// Check an ordered quad (top-left, top-right, bottom-left, bottom-right)
/// against the reference image and policy.
pub fn validate_quad(
    corners: &[Point2D; 4],
    reference: ImageSize,
    policy: &ValidationPolicy,
) -> Result<(), FallbackReason> {
    let (w, h) = (reference.width as f32, reference.height as f32);
    let (tol_x, tol_y) = (w * policy.bounds_tolerance, h * policy.bounds_tolerance);
    let inside = |p: &Point2D| {
        p.x >= -tol_x && p.x <= w + tol_x && p.y >= -tol_y && p.y <= h + tol_y
    };
    if !corners.iter().all(inside) {
        return Err(FallbackReason::OutOfBounds);
    }

    // A crossed quad has near-zero shoelace area, so test crossing first.
    let quad = ring(corners);
    if quad_self_intersects(&quad) {
        return Err(FallbackReason::SelfIntersecting);
    }

    let area = polygon_area(&quad);
    if area <= 0.0 || area < reference.area() as f64 * policy.min_area_fraction {
        return Err(FallbackReason::Degenerate);
    }

    if !is_convex(&quad, policy.min_turn) {
        return Err(FallbackReason::NotConvex);
    }

    Ok(())
}

/// Order and validate a raw detection, or fall back to the outline of the
/// reference image. Never fails.
pub fn ordered_valid_corners(
    points: &[Point2D],
    reference: ImageSize,
    policy: &ValidationPolicy,
) -> CornerAssessment {
    match assess(points, reference, policy) {
        Ok(corners) => {
            debug!(?corners, "detected corners accepted");
            CornerAssessment {
                corners,
                source: CornerSource::Detected,
            }
        }
        Err(reason) => {
            warn!(%reason, %reference, "using image outline as corners");
            CornerAssessment {
                corners: CornerSet::outline(reference),
                source: CornerSource::Outline(reason),
            }
        }
    }
}

fn assess(
    points: &[Point2D],
    reference: ImageSize,
    policy: &ValidationPolicy,
) -> Result<CornerSet, FallbackReason> {
    let raw: &[Point2D; 4] = match points.len() {
        0 => return Err(FallbackReason::NoBoundary),
        4 => points
            .try_into()
            .map_err(|_| FallbackReason::WrongPointCount { count: 4 })?,
        count => return Err(FallbackReason::WrongPointCount { count }),
    };

    let corners = order_corners(raw).ok_or(FallbackReason::AmbiguousOrdering)?;
    let ordered = corners
        .complete()
        .map_err(|_| FallbackReason::AmbiguousOrdering)?;
    validate_quad(&ordered, reference, policy)?;
    Ok(corners)
}
