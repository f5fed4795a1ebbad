// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Planar geometry helpers for quadrilateral validation.
//
// Arithmetic is done in f64 so that sign tests on nearly collinear points
// are stable for pixel coordinates in the tens of thousands.

use crate::types::Point2D;

/// Reorder index-ordered corners (TL, TR, BL, BR) into ring order
/// (TL, TR, BR, BL) so consecutive points share an edge.
pub fn ring(corners: &[Point2D; 4]) -> [Point2D; 4] {
    [corners[0], corners[1], corners[3], corners[2]]
}

/// Signed area of a simple polygon via the shoelace formula.
///
/// Positive for counter-clockwise vertices in a y-up frame, which is
/// clockwise on screen (y-down).
pub fn signed_area(polygon: &[Point2D]) -> f64 {
    let n = polygon.len();
    if n < 3 {
        return 0.0;
    }
    let mut area = 0.0f64;
    for i in 0..n {
        let j = (i + 1) % n;
        area += polygon[i].x as f64 * polygon[j].y as f64;
        area -= polygon[j].x as f64 * polygon[i].y as f64;
    }
    area / 2.0
}

/// Unsigned polygon area.
pub fn polygon_area(polygon: &[Point2D]) -> f64 {
    signed_area(polygon).abs()
}

/// Z component of `(a - o) x (b - o)`.
pub fn cross(o: Point2D, a: Point2D, b: Point2D) -> f64 {
    let (ox, oy) = (o.x as f64, o.y as f64);
    (a.x as f64 - ox) * (b.y as f64 - oy) - (a.y as f64 - oy) * (b.x as f64 - ox)
}

/// Whether a closed polygon turns the same way at every vertex.
///
/// `min_turn` is the smallest accepted |sin| of the turn angle; vertices
/// flatter than that count as collinear and make the polygon non-convex.
pub fn is_convex(polygon: &[Point2D], min_turn: f64) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut sign = 0.0f64;
    for i in 0..n {
        let prev = polygon[i];
        let here = polygon[(i + 1) % n];
        let next = polygon[(i + 2) % n];
        let lengths = prev.distance(here) as f64 * here.distance(next) as f64;
        if lengths == 0.0 {
            return false;
        }
        let turn = cross(prev, here, next) / lengths;
        if turn.abs() < min_turn {
            return false;
        }
        if sign == 0.0 {
            sign = turn.signum();
        } else if turn.signum() != sign {
            return false;
        }
    }
    true
}

/// Whether segments `a1-a2` and `b1-b2` cross or touch.
pub fn segments_intersect(a1: Point2D, a2: Point2D, b1: Point2D, b2: Point2D) -> bool {
    let d1 = cross(b1, b2, a1);
    let d2 = cross(b1, b2, a2);
    let d3 = cross(a1, a2, b1);
    let d4 = cross(a1, a2, b2);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    (d1 == 0.0 && on_segment(b1, b2, a1))
        || (d2 == 0.0 && on_segment(b1, b2, a2))
        || (d3 == 0.0 && on_segment(a1, a2, b1))
        || (d4 == 0.0 && on_segment(a1, a2, b2))
}

/// `p` is known to be collinear with `a-b`; check it lies within the box.
fn on_segment(a: Point2D, b: Point2D, p: Point2D) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

/// Whether a quadrilateral in ring order has crossing opposite edges.
pub fn quad_self_intersects(quad: &[Point2D; 4]) -> bool {
    segments_intersect(quad[0], quad[1], quad[2], quad[3])
        || segments_intersect(quad[1], quad[2], quad[3], quad[0])
}

/// Cosine of the angle at `vertex` between rays to `a` and `b`.
pub fn angle_cosine(a: Point2D, b: Point2D, vertex: Point2D) -> f64 {
    let (dx1, dy1) = (a.x as f64 - vertex.x as f64, a.y as f64 - vertex.y as f64);
    let (dx2, dy2) = (b.x as f64 - vertex.x as f64, b.y as f64 - vertex.y as f64);
    let denom = ((dx1 * dx1 + dy1 * dy1) * (dx2 * dx2 + dy2 * dy2) + 1e-10).sqrt();
    (dx1 * dx2 + dy1 * dy2) / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f32, y: f32) -> Point2D {
        Point2D::new(x, y)
    }

    #[test]
    fn shoelace_area_rectangle() {
        let rect = [p(0.0, 0.0), p(10.0, 0.0), p(10.0, 5.0), p(0.0, 5.0)];
        assert!((polygon_area(&rect) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn ring_swaps_bottom_corners() {
        let indexed = [p(0.0, 0.0), p(1.0, 0.0), p(0.0, 1.0), p(1.0, 1.0)];
        assert_eq!(ring(&indexed), [p(0.0, 0.0), p(1.0, 0.0), p(1.0, 1.0), p(0.0, 1.0)]);
    }

    #[test]
    fn square_is_convex_in_either_winding() {
        let cw = [p(0.0, 0.0), p(10.0, 0.0), p(10.0, 10.0), p(0.0, 10.0)];
        let mut ccw = cw;
        ccw.reverse();
        assert!(is_convex(&cw, 1e-3));
        assert!(is_convex(&ccw, 1e-3));
    }

    #[test]
    fn dart_is_not_convex() {
        let dart = [p(0.0, 0.0), p(10.0, 0.0), p(3.0, 3.0), p(0.0, 10.0)];
        assert!(!is_convex(&dart, 1e-3));
    }

    #[test]
    fn collinear_vertex_is_not_convex() {
        let flat = [p(0.0, 0.0), p(5.0, 0.0), p(10.0, 0.0), p(5.0, 5.0)];
        assert!(!is_convex(&flat, 1e-3));
    }

    #[test]
    fn bowtie_self_intersects() {
        let bowtie = [p(0.0, 0.0), p(10.0, 10.0), p(10.0, 0.0), p(0.0, 10.0)];
        assert!(quad_self_intersects(&bowtie));
        let square = [p(0.0, 0.0), p(10.0, 0.0), p(10.0, 10.0), p(0.0, 10.0)];
        assert!(!quad_self_intersects(&square));
    }

    #[test]
    fn right_angle_has_zero_cosine() {
        let cos = angle_cosine(p(10.0, 0.0), p(0.0, 10.0), p(0.0, 0.0));
        assert!(cos.abs() < 1e-9);
    }
}
