// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Flatscan.
//
// Only the crop path and the session plumbing can fail. A missing or
// malformed boundary during detection is absorbed by the outline fallback and
// never becomes a `ScanError`.

use thiserror::Error;

use crate::types::{FallbackReason, SessionState};

/// Top-level error type for all Flatscan operations.
#[derive(Debug, Error)]
pub enum ScanError {
    // -- Crop errors --
    #[error("incomplete polygon: {present} of 4 corners present")]
    IncompleteCornerSet { present: usize },

    #[error("image dimensions must be non-zero, got {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("vision backend failed: {0}")]
    Backend(String),

    /// The edited polygon cannot be flattened; the session stays editable.
    #[error("invalid polygon: {reason}")]
    InvalidPolygon { reason: FallbackReason },

    // -- Session errors --
    #[error("host viewport not ready after {waited_ms} ms")]
    HostNotReady { waited_ms: u64 },

    #[error("host viewport was detached before it became ready")]
    HostDetached,

    #[error("operation not allowed while session is {state}")]
    NotReady { state: SessionState },

    #[error("no source image has been assigned to the session")]
    NoSourceImage,

    #[error("detection pass was cancelled")]
    Cancelled,

    #[error("background worker failed: {0}")]
    Worker(String),

    // -- Storage / configuration --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScanError>;
