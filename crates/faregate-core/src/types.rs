use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Pixel-space bounding box for a detected face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Area in pixels; zero for degenerate boxes.
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Face embedding vector of a fixed, store-wide dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Compute cosine similarity between two embeddings.
    ///
    /// Returns a value in [-1, 1]. Higher = more similar. A zero-magnitude
    /// vector on either side yields 0.0 rather than NaN.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 { dot / denom } else { 0.0 }
    }
}

/// A durably registered identity with its embedding and enrollment metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub identity: String,
    pub display_name: String,
    pub embedding: Embedding,
    /// Free-form enrollment metadata; callers decide the shape.
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Face-image artifact saved at enrollment, removed together with the record.
    #[serde(default)]
    pub image_path: Option<PathBuf>,
    /// RFC 3339 enrollment timestamp.
    pub registered_at: String,
}

/// Outcome of recognizing one face region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecognitionResult {
    /// Best gallery candidate under the distance threshold.
    Recognized { identity: String, confidence: f32 },
    /// A face was processed but nothing in the gallery passed the threshold.
    Unknown,
    /// No face region in the frame.
    NoFace,
    /// Detection or extraction failed; never folded into `Unknown`.
    Error { reason: String },
}

/// Payment state supplied by an external roster; consulted only after a
/// recognition clears the confidence minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeStatus {
    Paid,
    Unpaid,
    /// Identity absent from the fee source; treated as not paid.
    Unknown,
}

/// Final gate outcome for one recognized (or unrecognized) face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum AccessDecision {
    Allowed { identity: String, confidence: f32 },
    DeniedUnpaid { identity: String, confidence: f32 },
    DeniedLowConfidence { identity: String, confidence: f32 },
    Unrecognized,
    SystemError { reason: String },
}

impl AccessDecision {
    /// Stable snake_case label used by audit logs and capture records.
    pub fn status_label(&self) -> &'static str {
        match self {
            AccessDecision::Allowed { .. } => "allowed",
            AccessDecision::DeniedUnpaid { .. } => "denied_unpaid",
            AccessDecision::DeniedLowConfidence { .. } => "denied_low_confidence",
            AccessDecision::Unrecognized => "unrecognized",
            AccessDecision::SystemError { .. } => "system_error",
        }
    }

    /// Identity attached to the decision, when one exists.
    pub fn identity(&self) -> Option<&str> {
        match self {
            AccessDecision::Allowed { identity, .. }
            | AccessDecision::DeniedUnpaid { identity, .. }
            | AccessDecision::DeniedLowConfidence { identity, .. } => Some(identity),
            AccessDecision::Unrecognized | AccessDecision::SystemError { .. } => None,
        }
    }

    pub fn confidence(&self) -> Option<f32> {
        match self {
            AccessDecision::Allowed { confidence, .. }
            | AccessDecision::DeniedUnpaid { confidence, .. }
            | AccessDecision::DeniedLowConfidence { confidence, .. } => Some(*confidence),
            AccessDecision::Unrecognized | AccessDecision::SystemError { .. } => None,
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allowed { .. })
    }
}
