//! faregate-core — Identity matching and access decisions for camera gates.
//!
//! Detection and embedding extraction live behind boundary traits served by
//! a worker thread; everything inward of that boundary (matching, the
//! embedding store, session memoization, fare decisions) is deterministic
//! and synchronous.

pub mod boundary;
pub mod decision;
pub mod error;
pub mod external;
pub mod frame;
pub mod matcher;
pub mod pipeline;
pub mod session;
pub mod store;
pub mod types;

pub use boundary::{
    spawn_boundary, BoundaryError, BoundaryHandle, EmbeddingExtractor, FaceDetector,
    DEFAULT_BOUNDARY_TIMEOUT,
};
pub use decision::{decide, FeeStatusSource, DEFAULT_MIN_CONFIDENCE};
pub use error::CoreError;
pub use external::{ExternalDetector, ExternalExtractor, ToolCommand};
pub use frame::{Frame, FrameError};
pub use matcher::{CosineMatcher, MatchCandidate, Matcher, DEFAULT_DISTANCE_THRESHOLD};
pub use pipeline::{
    Pipeline, PipelineConfig, RebuildSummary, Registration, Removal, ScanSession, SkippedImage,
};
pub use session::{compute_fingerprint, Fingerprint, SessionMemo, DEFAULT_MEMO_TTL};
pub use store::{EmbeddingStore, RemovedEntry, StoreError};
pub use types::{
    AccessDecision, BoundingBox, Embedding, EmbeddingRecord, FeeStatus, RecognitionResult,
};
