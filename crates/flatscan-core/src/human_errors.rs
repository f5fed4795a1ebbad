// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for the host UI.
//
// Every technical error is mapped to plain English with a clear suggestion.
// Severity drives how the host presents it.

use crate::error::ScanError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Something was busy or interrupted; trying again usually works.
    Transient,
    /// The user must fix something first (e.g. place all four corners).
    ActionRequired,
    /// Retrying will not help.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether the same request can simply be repeated.
    pub retriable: bool,
    pub severity: Severity,
}

/// Convert a `ScanError` into a `HumanError` for display.
pub fn humanize_error(err: &ScanError) -> HumanError {
    match err {
        ScanError::IncompleteCornerSet { present } => HumanError {
            message: "The page outline isn't finished.".into(),
            suggestion: format!(
                "Place all four corners on the page edges, then crop again. ({present} of 4 placed)"
            ),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        ScanError::Backend(detail) => HumanError {
            message: "We couldn't straighten this page.".into(),
            suggestion: format!(
                "Drag the corners so they sit on the corners of the page and try again. ({detail})"
            ),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        ScanError::InvalidPolygon { reason } => HumanError {
            message: "The page outline doesn't fit the page.".into(),
            suggestion: format!(
                "Move the corners back onto the page so the outline forms a simple four-sided shape. ({reason})"
            ),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        ScanError::InvalidDimensions { .. } => HumanError {
            message: "This picture can't be used.".into(),
            suggestion: "Try taking the photo again, or choose a different picture.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        ScanError::HostNotReady { .. } | ScanError::HostDetached => HumanError {
            message: "The scanner screen wasn't ready.".into(),
            suggestion: "Close and reopen the scanner, then pick the photo again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        ScanError::NotReady { .. } => HumanError {
            message: "Still looking for the page.".into(),
            suggestion: "Wait for the corners to appear, then try again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        ScanError::NoSourceImage => HumanError {
            message: "No photo has been chosen yet.".into(),
            suggestion: "Take or pick a photo of the page first.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        ScanError::Cancelled => HumanError {
            message: "That scan was replaced by a newer one.".into(),
            suggestion: "Nothing to do; the newest photo is being processed.".into(),
            retriable: false,
            severity: Severity::Transient,
        },

        ScanError::Worker(_) => HumanError {
            message: "Something went wrong while processing the photo.".into(),
            suggestion: "Please try again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        ScanError::Io(_) | ScanError::Serialization(_) => HumanError {
            message: "The scanner settings couldn't be read.".into(),
            suggestion: "Check the settings file, or remove it to use the defaults.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },
    }
}
