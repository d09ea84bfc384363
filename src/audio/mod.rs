//! Audio capture module
//!
//! Produces a lazy, finite sequence of raw PCM frames from the system's
//! default input device. The concrete source spawns a PipeWire capture
//! process; tests substitute scripted sources through the same trait.

pub mod recorder;

pub use recorder::PwRecorder;

use crate::error::AudioError;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A fixed-size block of raw PCM samples with its capture timestamp.
/// Ownership transfers to the receiver on send.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub data: Vec<u8>,
    pub timestamp: Instant,
}

impl AudioFrame {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            timestamp: Instant::now(),
        }
    }
}

/// Trait for audio sources feeding the pipeline
#[async_trait::async_trait]
pub trait AudioSource: Send + Sync {
    /// Spawn a capture worker bounded by `cancel` and `deadline`.
    ///
    /// Spawn failures are reported on the handle's error stream; both
    /// streams close when the worker terminates.
    async fn start(&self, cancel: CancellationToken, deadline: Duration) -> CaptureHandle;
}

/// Streams and lifecycle of one running capture worker.
///
/// The frame channel is bounded; a slow consumer blocks the producer, which
/// is the desired backpressure. The producer closes both channels when the
/// worker exits.
pub struct CaptureHandle {
    pub frames: mpsc::Receiver<AudioFrame>,
    pub errors: mpsc::Receiver<AudioError>,
    stop: CancellationToken,
    worker: Option<JoinHandle<()>>,
}

impl CaptureHandle {
    pub fn new(
        frames: mpsc::Receiver<AudioFrame>,
        errors: mpsc::Receiver<AudioError>,
        stop: CancellationToken,
        worker: JoinHandle<()>,
    ) -> Self {
        Self {
            frames,
            errors,
            stop,
            worker: Some(worker),
        }
    }

    /// Signal the worker to end and wait until the capture process has been
    /// reaped. Frames written before the stop remain readable on `frames`.
    /// Idempotent.
    pub async fn stop(&mut self) {
        self.stop.cancel();
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                tracing::warn!("capture worker task failed: {}", e);
            }
        }
    }

    /// Discard any frames still buffered in the channel
    pub fn drain(&mut self) {
        while self.frames.try_recv().is_ok() {}
    }
}
