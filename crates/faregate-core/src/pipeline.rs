//! Recognition pipeline: boundary calls, gallery matching, enrollment and
//! rebuild flows, plus the memoized per-session scan wrapper.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::boundary::BoundaryHandle;
use crate::error::CoreError;
use crate::frame::Frame;
use crate::matcher::{CosineMatcher, Matcher, DEFAULT_DISTANCE_THRESHOLD};
use crate::session::{compute_fingerprint, SessionMemo};
use crate::store::EmbeddingStore;
use crate::types::{BoundingBox, Embedding, EmbeddingRecord, RecognitionResult};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum cosine distance for a gallery candidate to match.
    pub distance_threshold: f32,
    /// Where enrollment face artifacts are written.
    pub faces_dir: PathBuf,
}

impl PipelineConfig {
    pub fn new(faces_dir: PathBuf) -> Self {
        Self { distance_threshold: DEFAULT_DISTANCE_THRESHOLD, faces_dir }
    }
}

/// Outcome of an enrollment.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub identity: String,
    pub display_name: String,
    pub image_path: PathBuf,
    /// Whether the store rewrite reached disk.
    pub durable: bool,
}

/// Outcome of a removal.
#[derive(Debug, Clone, Serialize)]
pub struct Removal {
    pub identity: String,
    pub durable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedImage {
    pub file: String,
    pub reason: String,
}

/// Outcome of rebuilding the store from an image directory.
#[derive(Debug, Clone, Serialize)]
pub struct RebuildSummary {
    pub registered: usize,
    pub skipped: Vec<SkippedImage>,
    pub durable: bool,
}

/// Synchronous recognition facade over one store and one boundary worker.
///
/// Recognition methods return `RecognitionResult` and never fail outright;
/// management methods (`register`, `remove`, `rebuild`) return `CoreError`
/// on operational failures.
pub struct Pipeline {
    store: Arc<EmbeddingStore>,
    boundary: BoundaryHandle,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(store: Arc<EmbeddingStore>, boundary: BoundaryHandle, config: PipelineConfig) -> Self {
        Self { store, boundary, config }
    }

    pub fn store(&self) -> &EmbeddingStore {
        &self.store
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Face regions in `frame`, in the detector's own order.
    pub fn detect(&self, frame: &Frame) -> Result<Vec<BoundingBox>, crate::boundary::BoundaryError> {
        self.boundary.detect(frame.clone())
    }

    /// Recognize the first detected face; `NoFace` when nothing is found.
    pub fn recognize_one(&self, frame: &Frame) -> RecognitionResult {
        match self.boundary.detect(frame.clone()) {
            Err(err) => RecognitionResult::Error { reason: err.to_string() },
            Ok(regions) => match regions.first() {
                None => RecognitionResult::NoFace,
                Some(region) => self.recognize_region(frame, region),
            },
        }
    }

    /// Recognize every detected face independently, in detection order.
    ///
    /// A detection-stage failure yields a single `Error` element; zero
    /// detections yield an empty vector.
    pub fn recognize_all(&self, frame: &Frame) -> Vec<RecognitionResult> {
        match self.boundary.detect(frame.clone()) {
            Err(err) => vec![RecognitionResult::Error { reason: err.to_string() }],
            Ok(regions) => regions
                .iter()
                .map(|region| self.recognize_region(frame, region))
                .collect(),
        }
    }

    fn recognize_region(&self, frame: &Frame, region: &BoundingBox) -> RecognitionResult {
        let face = frame.crop(region);
        match self.boundary.extract(face) {
            Err(err) => RecognitionResult::Error { reason: err.to_string() },
            Ok(embedding) => self.match_embedding(&embedding),
        }
    }

    /// Rank `probe` against the current gallery snapshot.
    pub fn match_embedding(&self, probe: &Embedding) -> RecognitionResult {
        if probe.dim() != self.store.dimension() {
            return RecognitionResult::Error {
                reason: format!(
                    "probe embedding is {}-d, store holds {}-d vectors",
                    probe.dim(),
                    self.store.dimension()
                ),
            };
        }

        let gallery = self.store.snapshot();
        let candidates = CosineMatcher.rank(probe, &gallery, self.config.distance_threshold);
        match candidates.into_iter().next() {
            Some(best) => RecognitionResult::Recognized {
                identity: best.identity,
                confidence: best.confidence,
            },
            None => RecognitionResult::Unknown,
        }
    }

    /// Enroll an identity from an image: detect, crop, save the face
    /// artifact, extract, upsert into the store.
    ///
    /// Uses the first detected region and warns when the image holds more
    /// than one face.
    pub fn register(
        &self,
        identity: &str,
        display_name: &str,
        image: &Frame,
        metadata: serde_json::Value,
    ) -> Result<Registration, CoreError> {
        validate_identity(identity)?;
        validate_display_name(display_name)?;

        let regions = self.boundary.detect(image.clone())?;
        let region = regions.first().copied().ok_or(CoreError::NoFaceDetected)?;
        if regions.len() > 1 {
            tracing::warn!(
                identity,
                faces = regions.len(),
                "multiple faces in enrollment image; using the first"
            );
        }

        let face = image.crop(&region);

        fs::create_dir_all(&self.config.faces_dir).map_err(|source| CoreError::Io {
            path: self.config.faces_dir.clone(),
            source,
        })?;
        let file_name = format!("{identity}_{}.png", display_name.replace(' ', "_"));
        let image_path = self.config.faces_dir.join(file_name);
        face.save_png(&image_path)?;

        let embedding = self.boundary.extract(face)?;
        let record = EmbeddingRecord {
            identity: identity.to_string(),
            display_name: display_name.to_string(),
            embedding,
            metadata,
            image_path: Some(image_path.clone()),
            registered_at: chrono::Utc::now().to_rfc3339(),
        };
        let durable = self.store.register(record)?;

        tracing::info!(identity, durable, "identity registered");
        Ok(Registration {
            identity: identity.to_string(),
            display_name: display_name.to_string(),
            image_path,
            durable,
        })
    }

    /// Drop an identity and its face artifact from the store.
    pub fn remove(&self, identity: &str) -> Result<Removal, CoreError> {
        let removed = self.store.remove(identity)?;
        tracing::info!(identity, durable = removed.durable, "identity removed");
        Ok(Removal { identity: identity.to_string(), durable: removed.durable })
    }

    /// Replace the whole gallery from a directory of face images named
    /// `identity_displayName.ext` (`.png`/`.jpg`/`.jpeg`).
    ///
    /// Underscores in the display-name part read as spaces. Images that
    /// fail naming, decoding or extraction are skipped with a warning;
    /// duplicate identities resolve to the lexicographically later file.
    pub fn rebuild(&self, directory: &Path) -> Result<RebuildSummary, CoreError> {
        let entries = fs::read_dir(directory).map_err(|source| CoreError::Io {
            path: directory.to_path_buf(),
            source,
        })?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| has_face_image_ext(path))
            .collect();
        paths.sort();

        let registered_at = chrono::Utc::now().to_rfc3339();
        let mut records = Vec::new();
        let mut skipped = Vec::new();

        for path in paths {
            let file = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let Some((identity, display_name)) = parse_face_file_name(&path) else {
                tracing::warn!(file = %file, "skipping image without identity_name file stem");
                skipped.push(SkippedImage {
                    file,
                    reason: "file stem is not identity_displayName".into(),
                });
                continue;
            };

            let frame = match Frame::open(&path) {
                Ok(frame) => frame,
                Err(err) => {
                    tracing::warn!(file = %file, error = %err, "skipping unreadable image");
                    skipped.push(SkippedImage { file, reason: err.to_string() });
                    continue;
                }
            };

            // Rebuild inputs are already cropped face shots; extract whole.
            let embedding = match self.boundary.extract(frame) {
                Ok(embedding) => embedding,
                Err(err) => {
                    tracing::warn!(file = %file, error = %err, "skipping image that failed extraction");
                    skipped.push(SkippedImage { file, reason: err.to_string() });
                    continue;
                }
            };

            records.push(EmbeddingRecord {
                identity,
                display_name,
                embedding,
                metadata: serde_json::Value::Null,
                image_path: Some(path),
                registered_at: registered_at.clone(),
            });
        }

        let durable = self.store.replace_all(records)?;
        let summary = RebuildSummary {
            registered: self.store.len(),
            skipped,
            durable,
        };
        tracing::info!(
            registered = summary.registered,
            skipped = summary.skipped.len(),
            "store rebuilt from image directory"
        );
        Ok(summary)
    }
}

/// One scanning session: a pipeline plus an exclusively owned memoizer.
///
/// The memoizer lives inside this value and dies with it; nothing is
/// shared across sessions.
pub struct ScanSession<'a> {
    pipeline: &'a Pipeline,
    memo: SessionMemo,
}

impl<'a> ScanSession<'a> {
    pub fn new(pipeline: &'a Pipeline, ttl: Duration) -> Self {
        Self { pipeline, memo: SessionMemo::new(ttl) }
    }

    /// Like [`Pipeline::recognize_all`], but repeated faces inside the TTL
    /// window are answered from the memo without another extraction.
    ///
    /// `Error` results are not memoized; a transient backend fault should
    /// not stick for a whole TTL window.
    pub fn recognize_all(&mut self, frame: &Frame) -> Vec<RecognitionResult> {
        match self.pipeline.boundary.detect(frame.clone()) {
            Err(err) => vec![RecognitionResult::Error { reason: err.to_string() }],
            Ok(regions) => regions
                .iter()
                .map(|region| self.recognize_region(frame, region))
                .collect(),
        }
    }

    fn recognize_region(&mut self, frame: &Frame, region: &BoundingBox) -> RecognitionResult {
        let face = frame.crop(region);
        let fingerprint = compute_fingerprint(&face);

        if let Some(hit) = self.memo.get(fingerprint) {
            tracing::debug!(fingerprint = fingerprint.as_u64(), "session memo hit");
            return hit;
        }

        let result = match self.pipeline.boundary.extract(face) {
            Err(err) => RecognitionResult::Error { reason: err.to_string() },
            Ok(embedding) => self.pipeline.match_embedding(&embedding),
        };

        if !matches!(result, RecognitionResult::Error { .. }) {
            self.memo.put(fingerprint, result.clone());
        }
        result
    }

    /// Forget every memoized result (operator reset between groups).
    pub fn clear(&mut self) {
        self.memo.clear();
    }

    pub fn memo_len(&self) -> usize {
        self.memo.len()
    }
}

fn validate_identity(identity: &str) -> Result<(), CoreError> {
    let ok = !identity.is_empty()
        && identity.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if ok {
        Ok(())
    } else {
        Err(CoreError::InvalidIdentity { identity: identity.to_string() })
    }
}

fn validate_display_name(name: &str) -> Result<(), CoreError> {
    let ok = !name.trim().is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(CoreError::InvalidDisplayName { name: name.to_string() })
    }
}

fn has_face_image_ext(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref(),
        Some("png" | "jpg" | "jpeg")
    )
}

/// Split a face-image file stem into `(identity, display_name)`.
///
/// The identity runs to the first underscore; the rest is the display name
/// with underscores restored to spaces.
fn parse_face_file_name(path: &Path) -> Option<(String, String)> {
    let stem = path.file_stem()?.to_str()?;
    let (identity, name) = stem.split_once('_')?;
    if identity.is_empty() || name.is_empty() {
        return None;
    }
    Some((identity.to_string(), name.replace('_', " ")))
}
