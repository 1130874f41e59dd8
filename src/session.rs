//! Cross-frame counting for a capture window.
//!
//! Frames arrive on a channel from a producer task. Each one is classified on the
//! blocking pool and its counts are merged into a [`SharedCounts`] handle. The
//! handle is frozen when the window closes, so late writers cannot change the totals.

use std::future::pending;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use image::RgbImage;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{info, warn};

use crate::detection::ShapeDetector;
use crate::models::{DetectionResult, ShapeCounts};

#[derive(Debug, Default)]
struct SessionState {
    counts: ShapeCounts,
    frames: u64,
    frozen: bool,
}

/// Cloneable handle to one session's running totals
#[derive(Debug, Clone, Default)]
pub struct SharedCounts {
    inner: Arc<Mutex<SessionState>>,
}

impl SharedCounts {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        // counts stay consistent even if a holder panicked mid-frame
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Merge one frame's counts. Returns false, changing nothing, once frozen.
    pub fn record(&self, counts: &ShapeCounts) -> bool {
        let mut state = self.state();
        if state.frozen {
            return false;
        }
        state.counts += counts;
        state.frames += 1;
        true
    }

    /// Stop accepting frames
    pub fn freeze(&self) {
        self.state().frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.state().frozen
    }

    /// Zero the totals and accept frames again
    pub fn reset(&self) {
        *self.state() = SessionState::default();
    }

    pub fn snapshot(&self) -> ShapeCounts {
        self.state().counts
    }

    /// Frames recorded so far
    pub fn frames(&self) -> u64 {
        self.state().frames
    }
}

/// Freezes the totals however the capture loop exits
struct FreezeOnDrop(SharedCounts);

impl Drop for FreezeOnDrop {
    fn drop(&mut self) {
        self.0.freeze();
    }
}

/// When a capture stops on its own
#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureOptions {
    /// Wall-clock length of the window; `None` runs until the source closes
    pub window: Option<Duration>,
    pub max_frames: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    WindowElapsed,
    MaxFrames,
    SourceClosed,
    /// The shared totals were frozen by another holder
    Frozen,
}

#[derive(Debug, Clone)]
pub struct CaptureSummary {
    pub frames_processed: u64,
    pub frames_skipped: u64,
    /// Session totals at the time the window closed
    pub counts: ShapeCounts,
    pub stop_reason: StopReason,
}

/// Consume frames until the window elapses, `max_frames` is reached or the source closes.
///
/// `on_frame` receives the zero-based arrival index and the result of every frame
/// that was classified. Frames that fail detection are logged and skipped.
/// A frozen `shared` handle is an error; reset it first.
pub async fn run_capture<F>(
    detector: Arc<ShapeDetector>,
    mut frames: mpsc::Receiver<RgbImage>,
    shared: SharedCounts,
    options: CaptureOptions,
    mut on_frame: F,
) -> Result<CaptureSummary>
where
    F: FnMut(u64, &DetectionResult) -> Result<()>,
{
    if shared.is_frozen() {
        anyhow::bail!("Session counts are frozen; reset them before starting another capture");
    }

    let deadline = options.window.map(|window| Instant::now() + window);
    let window_closed = async move {
        match deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => pending::<()>().await,
        }
    };
    tokio::pin!(window_closed);

    let freeze_on_exit = FreezeOnDrop(shared.clone());
    let mut processed = 0u64;
    let mut skipped = 0u64;

    let stop_reason = loop {
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            break StopReason::WindowElapsed;
        }
        if options.max_frames.is_some_and(|max| processed >= max) {
            break StopReason::MaxFrames;
        }

        let frame = tokio::select! {
            biased;
            _ = &mut window_closed => break StopReason::WindowElapsed,
            frame = frames.recv() => match frame {
                Some(frame) => frame,
                None => break StopReason::SourceClosed,
            },
        };

        let index = processed + skipped;
        let worker = Arc::clone(&detector);
        let outcome = tokio::task::spawn_blocking(move || worker.detect(&frame))
            .await
            .context("Detection task panicked")?;

        match outcome {
            Ok(result) => {
                if !shared.record(&result.counts) {
                    warn!(frame = index, "Session frozen, dropping frame");
                    break StopReason::Frozen;
                }
                processed += 1;
                on_frame(index, &result)?;
            }
            Err(e) => {
                warn!(frame = index, error = %e, "Skipping frame");
                skipped += 1;
            }
        }
    };
    drop(freeze_on_exit);

    let counts = shared.snapshot();
    info!(
        processed,
        skipped,
        reason = ?stop_reason,
        total = counts.total(),
        "Capture window closed"
    );

    Ok(CaptureSummary {
        frames_processed: processed,
        frames_skipped: skipped,
        counts,
        stop_reason,
    })
}
