// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan session orchestration.
//
// A session owns one source image at a time and moves through
// Idle -> AwaitingHost -> Loading -> Ready <-> Cropping. Each `begin` starts
// a detection pass on the Tokio runtime; starting another pass cancels the
// one in flight and bumps the session generation, and a pass only writes
// session fields while its generation is still current. Host edits are
// accepted in Ready only, so no pass step can overwrite them.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use flatscan_core::config::ScanConfig;
use flatscan_core::error::{Result, ScanError};
use flatscan_core::types::{
    Corner, CornerSet, CornerSource, ImageSize, Point2D, SessionId, SessionState,
};
use flatscan_vision::VisionBackend;
use image::{DynamicImage, GenericImageView};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::corners::ordered_valid_corners;
use crate::crop::{ScanOutput, correct_and_binarize};
use crate::mapping::map_to_source;
use crate::rotation::normalize_orientation;
use crate::worker::run_blocking;

// ---------------------------------------------------------------------------
// Loading notifications
// ---------------------------------------------------------------------------

/// Receives `true` right before a detection pass starts work and `false`
/// right after it ends, whatever the outcome.
pub trait LoadingListener: Send + 'static {
    fn on_loading(&mut self, loading: bool);
}

impl<F> LoadingListener for F
where
    F: FnMut(bool) + Send + 'static,
{
    fn on_loading(&mut self, loading: bool) {
        self(loading)
    }
}

/// Emits `true` when opened and `false` when dropped.
struct LoadingBracket {
    listener: Box<dyn LoadingListener>,
}

impl LoadingBracket {
    fn open(mut listener: Box<dyn LoadingListener>) -> Self {
        listener.on_loading(true);
        Self { listener }
    }
}

impl Drop for LoadingBracket {
    fn drop(&mut self) {
        self.listener.on_loading(false);
    }
}

// ---------------------------------------------------------------------------
// Host viewport
// ---------------------------------------------------------------------------

/// Host side of the viewport handshake.
///
/// The host publishes its viewport size once it is laid out; passes waiting
/// in `AwaitingHost` wake up as soon as a non-empty size is published.
/// Dropping the handle (or calling [`HostViewport::detach`]) tells waiting
/// passes the host is gone.
#[derive(Debug)]
pub struct HostViewport {
    tx: watch::Sender<Option<ImageSize>>,
}

impl HostViewport {
    /// A viewport that is not laid out yet.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// A viewport that is already laid out at `size`.
    pub fn ready(size: ImageSize) -> Self {
        let (tx, _rx) = watch::channel(Some(size));
        Self { tx }
    }

    pub fn set_ready(&self, size: ImageSize) {
        debug!(%size, "host viewport ready");
        self.tx.send_replace(Some(size));
    }

    /// Mark the viewport as not laid out (e.g. hidden) without detaching.
    pub fn set_unready(&self) {
        self.tx.send_replace(None);
    }

    pub fn detach(self) {
        debug!("host viewport detached");
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<ImageSize>> {
        self.tx.subscribe()
    }
}

impl Default for HostViewport {
    fn default() -> Self {
        Self::new()
    }
}

async fn wait_for_host(
    mut viewport: watch::Receiver<Option<ImageSize>>,
    limit: Duration,
) -> Result<ImageSize> {
    let ready = viewport.wait_for(|v| matches!(v, Some(size) if !size.is_empty()));
    match tokio::time::timeout(limit, ready).await {
        Ok(Ok(size)) => (*size).ok_or(ScanError::HostDetached),
        Ok(Err(_)) => Err(ScanError::HostDetached),
        Err(_) => Err(ScanError::HostNotReady {
            waited_ms: limit.as_millis() as u64,
        }),
    }
}

// ---------------------------------------------------------------------------
// Detection task
// ---------------------------------------------------------------------------

/// What a completed detection pass produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionSummary {
    pub session: SessionId,
    pub generation: u64,
    /// Clockwise rotation applied to the source, if the orientation search
    /// matched.
    pub rotation_degrees: Option<u32>,
    /// Boundary detections performed, including the one on the display image.
    pub detection_attempts: u32,
    pub corner_source: CornerSource,
    /// Initial corners, in display space.
    pub corners: CornerSet,
    pub display_size: ImageSize,
    pub source_size: ImageSize,
}

/// Handle to a detection pass started by [`ScanSession::begin`].
#[derive(Debug)]
pub struct DetectionTask {
    generation: u64,
    handle: JoinHandle<Result<DetectionSummary>>,
}

impl DetectionTask {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Wait for the pass to finish.
    ///
    /// A pass superseded by a later `begin` (or stopped by `shutdown`)
    /// resolves to `Cancelled`.
    pub async fn wait(self) -> Result<DetectionSummary> {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => Err(ScanError::Cancelled),
            Err(e) => Err(ScanError::Worker(e.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Default)]
struct SessionData {
    generation: u64,
    cancel: CancellationToken,
    source: Option<Arc<DynamicImage>>,
    display: Option<Arc<DynamicImage>>,
    /// Display-space corners.
    corners: CornerSet,
}

struct SessionInner {
    id: SessionId,
    backend: Arc<dyn VisionBackend>,
    config: ScanConfig,
    viewport: watch::Receiver<Option<ImageSize>>,
    state: watch::Sender<SessionState>,
    data: Mutex<SessionData>,
}

/// One document being scanned.
///
/// Must be used from within a Tokio runtime. Dropping the session cancels
/// any pass still in flight.
pub struct ScanSession {
    inner: Arc<SessionInner>,
}

impl ScanSession {
    pub fn new(backend: Arc<dyn VisionBackend>, config: ScanConfig, viewport: &HostViewport) -> Self {
        let (state, _rx) = watch::channel(SessionState::Idle);
        let id = SessionId::new();
        info!(session = %id, "scan session created");
        Self {
            inner: Arc::new(SessionInner {
                id,
                backend,
                config,
                viewport: viewport.subscribe(),
                state,
                data: Mutex::new(SessionData::default()),
            }),
        }
    }

    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    pub fn config(&self) -> &ScanConfig {
        &self.inner.config
    }

    pub fn state(&self) -> SessionState {
        self.inner.current_state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.state() == SessionState::Loading
    }

    /// Current display-space corners. Empty until the first pass completes.
    pub fn corners(&self) -> CornerSet {
        self.inner.lock_data().corners
    }

    pub fn display_image(&self) -> Option<Arc<DynamicImage>> {
        self.inner.lock_data().display.clone()
    }

    pub fn source_image(&self) -> Option<Arc<DynamicImage>> {
        self.inner.lock_data().source.clone()
    }

    pub fn display_size(&self) -> Option<ImageSize> {
        self.inner.lock_data().display.as_deref().map(image_size)
    }

    pub fn source_size(&self) -> Option<ImageSize> {
        self.inner.lock_data().source.as_deref().map(image_size)
    }

    /// Assign a new source image and start a detection pass for it.
    ///
    /// Any pass already in flight is cancelled; its listener still receives
    /// its closing `false` if it had started loading.
    pub fn begin(&self, image: DynamicImage, listener: impl LoadingListener) -> DetectionTask {
        let source = Arc::new(image);
        let (generation, cancel) = {
            let mut data = self.inner.lock_data();
            data.cancel.cancel();
            data.generation += 1;
            data.cancel = CancellationToken::new();
            data.source = Some(Arc::clone(&source));
            data.display = None;
            data.corners = CornerSet::new();
            self.inner.set_state(SessionState::AwaitingHost);
            (data.generation, data.cancel.clone())
        };
        info!(
            session = %self.inner.id,
            generation,
            size = %image_size(&source),
            "detection pass scheduled"
        );

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            inner
                .run_pass(generation, source, cancel, Box::new(listener))
                .await
        });
        DetectionTask { generation, handle }
    }

    /// Replace the display-space corners with a host edit.
    ///
    /// Partial or misshapen sets are stored as given; `crop` rejects them.
    pub fn update_corners(&self, corners: CornerSet) -> Result<()> {
        let mut data = self.inner.lock_data();
        self.inner.require(SessionState::Ready)?;
        debug!(session = %self.inner.id, present = corners.len(), "corners updated by host");
        data.corners = corners;
        Ok(())
    }

    pub fn move_corner(&self, corner: Corner, point: Point2D) -> Result<()> {
        let mut data = self.inner.lock_data();
        self.inner.require(SessionState::Ready)?;
        data.corners.insert(corner, point);
        Ok(())
    }

    /// Map the current corners to source space, correct the perspective and
    /// binarize. The session returns to `Ready` afterwards whether or not the
    /// crop succeeded.
    pub async fn crop(&self) -> Result<ScanOutput> {
        let (generation, cancel, source, display_size, corners) = {
            let data = self.inner.lock_data();
            self.inner.require(SessionState::Ready)?;
            let source = data.source.clone().ok_or(ScanError::NoSourceImage)?;
            let display_size = data
                .display
                .as_deref()
                .map(image_size)
                .ok_or(ScanError::NoSourceImage)?;
            self.inner.set_state(SessionState::Cropping);
            (
                data.generation,
                data.cancel.clone(),
                source,
                display_size,
                data.corners,
            )
        };
        let _restore = RestoreReady {
            inner: &self.inner,
            generation,
        };

        let source_corners = map_to_source(&corners, display_size, image_size(&source))?;
        let backend = Arc::clone(&self.inner.backend);
        let threshold = self.inner.config.threshold;
        let policy = self.inner.config.validation;
        let outcome = run_blocking(&cancel, move || {
            correct_and_binarize(
                backend.as_ref(),
                &source,
                &source_corners,
                &threshold,
                &policy,
            )
        })
        .await?;

        if let Err(e) = &outcome {
            warn!(session = %self.inner.id, error = %e, "crop failed");
        }
        outcome
    }

    /// Cancel any pass in flight and return to `Idle`.
    pub fn shutdown(&self) {
        let mut data = self.inner.lock_data();
        data.cancel.cancel();
        data.generation += 1;
        data.source = None;
        data.display = None;
        data.corners = CornerSet::new();
        self.inner.set_state(SessionState::Idle);
        info!(session = %self.inner.id, "scan session shut down");
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        self.inner.lock_data().cancel.cancel();
    }
}

/// Puts a cropping session back into `Ready`, unless a newer pass took over.
struct RestoreReady<'a> {
    inner: &'a SessionInner,
    generation: u64,
}

impl Drop for RestoreReady<'_> {
    fn drop(&mut self) {
        let data = self.inner.lock_data();
        if data.generation == self.generation
            && self.inner.current_state() == SessionState::Cropping
        {
            self.inner.set_state(SessionState::Ready);
        }
    }
}

impl SessionInner {
    fn lock_data(&self) -> MutexGuard<'_, SessionData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_state(&self) -> SessionState {
        *self.state.borrow()
    }

    fn set_state(&self, state: SessionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(session = %self.id, from = %previous, to = %state, "session state changed");
        }
    }

    fn require(&self, wanted: SessionState) -> Result<()> {
        match self.current_state() {
            state if state == wanted => Ok(()),
            state => Err(ScanError::NotReady { state }),
        }
    }

    /// Run `f` on the session data if `generation` is still current.
    fn if_current<R>(&self, generation: u64, f: impl FnOnce(&mut SessionData) -> R) -> Option<R> {
        let mut data = self.lock_data();
        (data.generation == generation).then(|| f(&mut data))
    }

    async fn run_pass(
        self: Arc<Self>,
        generation: u64,
        source: Arc<DynamicImage>,
        cancel: CancellationToken,
        listener: Box<dyn LoadingListener>,
    ) -> Result<DetectionSummary> {
        let outcome = self.detect(generation, source, &cancel, listener).await;
        match &outcome {
            Ok(summary) => info!(
                session = %self.id,
                generation,
                rotation = ?summary.rotation_degrees,
                source = ?summary.corner_source,
                "detection pass complete"
            ),
            Err(ScanError::Cancelled) => {
                debug!(session = %self.id, generation, "detection pass superseded")
            }
            Err(e) => {
                warn!(session = %self.id, generation, error = %e, "detection pass failed");
                self.if_current(generation, |data| {
                    data.source = None;
                    data.display = None;
                    data.corners = CornerSet::new();
                    self.set_state(SessionState::Idle);
                });
            }
        }
        outcome
    }

    async fn detect(
        &self,
        generation: u64,
        source: Arc<DynamicImage>,
        cancel: &CancellationToken,
        listener: Box<dyn LoadingListener>,
    ) -> Result<DetectionSummary> {
        let viewport = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ScanError::Cancelled),
            size = wait_for_host(self.viewport.clone(), self.config.host_ready_timeout()) => size?,
        };

        self.if_current(generation, |_| self.set_state(SessionState::Loading))
            .ok_or(ScanError::Cancelled)?;
        let _loading = LoadingBracket::open(listener);
        debug!(session = %self.id, generation, %viewport, "detection started");

        let orientation =
            normalize_orientation(Arc::clone(&self.backend), source, cancel).await?;

        let display = {
            let backend = Arc::clone(&self.backend);
            let image = Arc::clone(&orientation.image);
            Arc::new(
                run_blocking(cancel, move || {
                    backend.scale_to_fit(&image, viewport.width, viewport.height)
                })
                .await?,
            )
        };
        let raw = {
            let backend = Arc::clone(&self.backend);
            let image = Arc::clone(&display);
            run_blocking(cancel, move || backend.detect_boundary(&image)).await?
        };
        let points: Vec<Point2D> = raw.map(Vec::from).unwrap_or_default();

        let display_size = image_size(&display);
        let assessment = ordered_valid_corners(&points, display_size, &self.config.validation);
        let summary = DetectionSummary {
            session: self.id,
            generation,
            rotation_degrees: orientation.rotation,
            detection_attempts: orientation.attempts + 1,
            corner_source: assessment.source,
            corners: assessment.corners,
            display_size,
            source_size: image_size(&orientation.image),
        };

        self.if_current(generation, |data| {
            data.source = Some(orientation.image);
            data.display = Some(display);
            data.corners = assessment.corners;
            self.set_state(SessionState::Ready);
        })
        .ok_or(ScanError::Cancelled)?;
        Ok(summary)
    }
}

fn image_size(image: &DynamicImage) -> ImageSize {
    let (width, height) = image.dimensions();
    ImageSize::new(width, height)
}
