//! Detection/extraction boundary contracts and the timeout worker that
//! keeps their unbounded latency out of the pipeline.

use std::sync::mpsc;
use std::time::Duration;

use thiserror::Error;

use crate::frame::Frame;
use crate::types::{BoundingBox, Embedding};

/// Upper bound on one detect or extract call through the worker.
pub const DEFAULT_BOUNDARY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum BoundaryError {
    /// The backend reported a failure of its own.
    #[error("face backend failed: {0}")]
    Backend(String),
    #[error("face backend timed out after {waited:?}")]
    Timeout { waited: Duration },
    #[error("face backend worker exited")]
    WorkerGone,
    #[error("failed to spawn face backend worker: {0}")]
    Spawn(std::io::Error),
}

/// Locates face regions in a frame. Implementations may be stateful
/// (loaded models, warm caches), hence `&mut self`.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, BoundaryError>;
}

/// Turns a cropped face region into a fixed-dimension embedding.
pub trait EmbeddingExtractor: Send {
    fn extract(&mut self, face: &Frame) -> Result<Embedding, BoundaryError>;
}

enum BoundaryRequest {
    Detect {
        frame: Frame,
        reply: mpsc::Sender<Result<Vec<BoundingBox>, BoundaryError>>,
    },
    Extract {
        frame: Frame,
        reply: mpsc::Sender<Result<Embedding, BoundaryError>>,
    },
}

/// Clone-safe handle to the boundary worker thread.
///
/// Every call waits at most the configured timeout; a reply arriving after
/// the caller gave up is dropped by the worker.
#[derive(Clone)]
pub struct BoundaryHandle {
    tx: mpsc::Sender<BoundaryRequest>,
    timeout: Duration,
}

impl BoundaryHandle {
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn detect(&self, frame: Frame) -> Result<Vec<BoundingBox>, BoundaryError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx
            .send(BoundaryRequest::Detect { frame, reply: reply_tx })
            .map_err(|_| BoundaryError::WorkerGone)?;
        self.await_reply(reply_rx)
    }

    pub fn extract(&self, face: Frame) -> Result<Embedding, BoundaryError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx
            .send(BoundaryRequest::Extract { frame: face, reply: reply_tx })
            .map_err(|_| BoundaryError::WorkerGone)?;
        self.await_reply(reply_rx)
    }

    fn await_reply<T>(
        &self,
        reply_rx: mpsc::Receiver<Result<T, BoundaryError>>,
    ) -> Result<T, BoundaryError> {
        match reply_rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::warn!(waited = ?self.timeout, "boundary call timed out");
                Err(BoundaryError::Timeout { waited: self.timeout })
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(BoundaryError::WorkerGone),
        }
    }
}

/// Spawn the worker thread that owns both backends.
///
/// Requests are served one at a time in arrival order; the worker lives
/// until the last handle is dropped.
pub fn spawn_boundary(
    mut detector: Box<dyn FaceDetector>,
    mut extractor: Box<dyn EmbeddingExtractor>,
    timeout: Duration,
) -> Result<BoundaryHandle, BoundaryError> {
    let (tx, rx) = mpsc::channel::<BoundaryRequest>();

    std::thread::Builder::new()
        .name("faregate-boundary".into())
        .spawn(move || {
            tracing::debug!("boundary worker started");
            while let Ok(request) = rx.recv() {
                match request {
                    BoundaryRequest::Detect { frame, reply } => {
                        let result = detector.detect(&frame);
                        // Send failure means the caller timed out; drop it.
                        let _ = reply.send(result);
                    }
                    BoundaryRequest::Extract { frame, reply } => {
                        let result = extractor.extract(&frame);
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::debug!("boundary worker exiting");
        })
        .map_err(BoundaryError::Spawn)?;

    Ok(BoundaryHandle { tx, timeout })
}
