// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Flatscan document pipeline.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, ScanError};

/// Unique identifier for a scan session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A floating-point pixel coordinate.
///
/// Points carry no tag for the space they live in (display or source); the
/// owner of a [`CornerSet`] is responsible for knowing which one it holds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f32,
    pub y: f32,
}

impl Point2D {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Scale each axis independently.
    pub fn scale(self, sx: f32, sy: f32) -> Self {
        Self {
            x: self.x * sx,
            y: self.y * sy,
        }
    }

    /// Euclidean distance to another point.
    pub fn distance(self, other: Point2D) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl From<(f32, f32)> for Point2D {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

impl From<Point2D> for (f32, f32) {
    fn from(p: Point2D) -> Self {
        (p.x, p.y)
    }
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> f32 {
        self.width as f32 * self.height as f32
    }
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// The four canonical roles a document corner can take.
///
/// The discriminants are the corner indices exposed to the polygon editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Corner {
    TopLeft = 0,
    TopRight = 1,
    BottomLeft = 2,
    BottomRight = 3,
}

impl Corner {
    /// All corners in index order.
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomLeft,
        Corner::BottomRight,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl std::fmt::Display for Corner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Corner::TopLeft => write!(f, "top-left"),
            Corner::TopRight => write!(f, "top-right"),
            Corner::BottomLeft => write!(f, "bottom-left"),
            Corner::BottomRight => write!(f, "bottom-right"),
        }
    }
}

/// Mapping from [`Corner`] to a point.
///
/// A set is only usable for correction when all four entries are present;
/// partially filled sets exist because the host editor may hand one back
/// mid-edit.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CornerSet {
    points: [Option<Point2D>; 4],
}

impl CornerSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a complete set from points in index order
    /// (top-left, top-right, bottom-left, bottom-right).
    pub fn from_ordered(points: [Point2D; 4]) -> Self {
        Self {
            points: points.map(Some),
        }
    }

    /// The outline of an image: its own four corners.
    pub fn outline(size: ImageSize) -> Self {
        let (w, h) = (size.width as f32, size.height as f32);
        Self::from_ordered([
            Point2D::new(0.0, 0.0),
            Point2D::new(w, 0.0),
            Point2D::new(0.0, h),
            Point2D::new(w, h),
        ])
    }

    /// Set a corner, returning the previous point if any.
    pub fn insert(&mut self, corner: Corner, point: Point2D) -> Option<Point2D> {
        self.points[corner.index()].replace(point)
    }

    pub fn remove(&mut self, corner: Corner) -> Option<Point2D> {
        self.points[corner.index()].take()
    }

    pub fn get(&self, corner: Corner) -> Option<Point2D> {
        self.points[corner.index()]
    }

    /// Number of corners present.
    pub fn len(&self) -> usize {
        self.points.iter().filter(|p| p.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_complete(&self) -> bool {
        self.len() == 4
    }

    /// Apply `f` to every present point, keeping absent corners absent.
    pub fn map_points(&self, mut f: impl FnMut(Point2D) -> Point2D) -> Self {
        Self {
            points: self.points.map(|p| p.map(&mut f)),
        }
    }

    /// All four points in index order, or `IncompleteCornerSet`.
    pub fn complete(&self) -> Result<[Point2D; 4]> {
        match self.points {
            [Some(tl), Some(tr), Some(bl), Some(br)] => Ok([tl, tr, bl, br]),
            _ => Err(ScanError::IncompleteCornerSet {
                present: self.len(),
            }),
        }
    }
}

/// Lifecycle of a scan session as observed by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// No source image assigned.
    Idle,
    /// Image assigned; waiting for the host viewport to be sized/attached.
    AwaitingHost,
    /// Orientation search and boundary detection in progress.
    Loading,
    /// Corners are available and may be edited by the host.
    Ready,
    /// Perspective correction and binarization in progress.
    Cropping,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::AwaitingHost => write!(f, "awaiting host"),
            SessionState::Loading => write!(f, "loading"),
            SessionState::Ready => write!(f, "ready"),
            SessionState::Cropping => write!(f, "cropping"),
        }
    }
}

/// Why the image outline was used instead of a detected boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FallbackReason {
    /// The backend found no boundary.
    NoBoundary,
    /// The backend returned a point count other than 0 or 4.
    WrongPointCount { count: usize },
    /// Two roles resolved to the same point.
    AmbiguousOrdering,
    /// Zero or near-zero area.
    Degenerate,
    NotConvex,
    SelfIntersecting,
    /// A corner lies too far outside the reference image.
    OutOfBounds,
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackReason::NoBoundary => write!(f, "no boundary detected"),
            FallbackReason::WrongPointCount { count } => {
                write!(f, "expected 0 or 4 points, got {count}")
            }
            FallbackReason::AmbiguousOrdering => write!(f, "corner roles are ambiguous"),
            FallbackReason::Degenerate => write!(f, "quadrilateral is degenerate"),
            FallbackReason::NotConvex => write!(f, "quadrilateral is not convex"),
            FallbackReason::SelfIntersecting => write!(f, "quadrilateral self-intersects"),
            FallbackReason::OutOfBounds => write!(f, "corner outside the image"),
        }
    }
}

/// Where a session's initial corners came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CornerSource {
    /// A validated backend detection.
    Detected,
    /// The image outline, for the given reason.
    Outline(FallbackReason),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outline_assigns_corners_by_index() {
        let set = CornerSet::outline(ImageSize::new(640, 480));
        assert_eq!(set.get(Corner::TopLeft), Some(Point2D::new(0.0, 0.0)));
        assert_eq!(set.get(Corner::TopRight), Some(Point2D::new(640.0, 0.0)));
        assert_eq!(set.get(Corner::BottomLeft), Some(Point2D::new(0.0, 480.0)));
        assert_eq!(set.get(Corner::BottomRight), Some(Point2D::new(640.0, 480.0)));
    }

    #[test]
    fn partial_set_is_incomplete() {
        let mut set = CornerSet::outline(ImageSize::new(10, 10));
        set.remove(Corner::BottomLeft);
        assert_eq!(set.len(), 3);
        match set.complete() {
            Err(ScanError::IncompleteCornerSet { present }) => assert_eq!(present, 3),
            other => panic!("expected IncompleteCornerSet, got {other:?}"),
        }
    }

    #[test]
    fn map_points_keeps_missing_corners_missing() {
        let mut set = CornerSet::new();
        set.insert(Corner::TopRight, Point2D::new(2.0, 3.0));
        let mapped = set.map_points(|p| p.scale(2.0, 10.0));
        assert_eq!(mapped.get(Corner::TopRight), Some(Point2D::new(4.0, 30.0)));
        assert_eq!(mapped.get(Corner::TopLeft), None);
        assert_eq!(mapped.len(), 1);
    }

    #[test]
    fn corner_index_round_trips() {
        for corner in Corner::ALL {
            assert_eq!(Corner::from_index(corner.index()), Some(corner));
        }
        assert_eq!(Corner::from_index(4), None);
    }

    #[test]
    fn corner_set_serializes_with_nulls() {
        let mut set = CornerSet::new();
        set.insert(Corner::TopLeft, Point2D::new(1.0, 2.0));
        let json = serde_json::to_string(&set).expect("serialize");
        assert!(json.contains("null"));
        let back: CornerSet = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, set);
    }
}
