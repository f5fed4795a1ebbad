// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Blocking backend calls off the async runtime.

use flatscan_core::error::{Result, ScanError};
use tokio_util::sync::CancellationToken;

/// Run `f` on the blocking pool, abandoning the wait if `cancel` fires.
///
/// A cancelled call keeps running to completion on its worker thread; only
/// its result is discarded.
pub(crate) async fn run_blocking<T, F>(cancel: &CancellationToken, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    if cancel.is_cancelled() {
        return Err(ScanError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ScanError::Cancelled),
        res = tokio::task::spawn_blocking(f) => res.map_err(|e| ScanError::Worker(e.to_string())),
    }
}
