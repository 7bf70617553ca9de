//! Boundary backends that shell out to an external face tool.
//!
//! The frame is staged as a temporary PNG, the configured program gets its
//! path as the last argument, and stdout carries a small JSON payload:
//! `{"regions": [{"x":..,"y":..,"width":..,"height":..}, ..]}` for
//! detection, `{"embedding": [..]}` for extraction. A bad exit status or
//! unusable output is reported as a backend failure.

use std::path::Path;
use std::process::Command;

use serde::Deserialize;

use crate::boundary::{BoundaryError, EmbeddingExtractor, FaceDetector};
use crate::frame::Frame;
use crate::types::{BoundingBox, Embedding};

/// How much stderr to quote back in a failure message.
const STDERR_EXCERPT_LEN: usize = 240;

/// An external program plus its fixed leading arguments.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(), args: Vec::new() }
    }

    /// Run the tool against `image`, returning its stdout.
    fn run_on(&self, image: &Path) -> Result<Vec<u8>, BoundaryError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(image)
            .output()
            .map_err(|err| {
                BoundaryError::Backend(format!("failed to run {}: {err}", self.program))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let excerpt: String = stderr.trim().chars().take(STDERR_EXCERPT_LEN).collect();
            return Err(BoundaryError::Backend(format!(
                "{} exited with {}: {excerpt}",
                self.program, output.status
            )));
        }
        Ok(output.stdout)
    }
}

fn stage_frame(frame: &Frame) -> Result<tempfile::NamedTempFile, BoundaryError> {
    let tmp = tempfile::Builder::new()
        .prefix("faregate-frame-")
        .suffix(".png")
        .tempfile()
        .map_err(|err| BoundaryError::Backend(format!("failed to stage frame: {err}")))?;
    frame
        .save_png(tmp.path())
        .map_err(|err| BoundaryError::Backend(format!("failed to stage frame: {err}")))?;
    Ok(tmp)
}

#[derive(Deserialize)]
struct DetectPayload {
    regions: Vec<BoundingBox>,
}

#[derive(Deserialize)]
struct ExtractPayload {
    embedding: Vec<f32>,
}

fn parse_detect_payload(stdout: &[u8]) -> Result<Vec<BoundingBox>, BoundaryError> {
    let payload: DetectPayload = serde_json::from_slice(stdout)
        .map_err(|err| BoundaryError::Backend(format!("bad detector output: {err}")))?;
    Ok(payload.regions)
}

fn parse_extract_payload(stdout: &[u8], dimension: usize) -> Result<Embedding, BoundaryError> {
    let payload: ExtractPayload = serde_json::from_slice(stdout)
        .map_err(|err| BoundaryError::Backend(format!("bad extractor output: {err}")))?;
    if payload.embedding.len() != dimension {
        return Err(BoundaryError::Backend(format!(
            "extractor returned a {}-d vector, expected {dimension}-d",
            payload.embedding.len()
        )));
    }
    Ok(Embedding::new(payload.embedding))
}

/// Detector backed by an external command.
pub struct ExternalDetector {
    command: ToolCommand,
}

impl ExternalDetector {
    pub fn new(command: ToolCommand) -> Self {
        Self { command }
    }
}

impl FaceDetector for ExternalDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, BoundaryError> {
        let staged = stage_frame(frame)?;
        let stdout = self.command.run_on(staged.path())?;
        let regions = parse_detect_payload(&stdout)?;
        tracing::debug!(
            program = %self.command.program,
            regions = regions.len(),
            "external detector ran"
        );
        Ok(regions)
    }
}

/// Extractor backed by an external command, validated against the store's
/// embedding dimension.
pub struct ExternalExtractor {
    command: ToolCommand,
    dimension: usize,
}

impl ExternalExtractor {
    pub fn new(command: ToolCommand, dimension: usize) -> Self {
        Self { command, dimension }
    }
}

impl EmbeddingExtractor for ExternalExtractor {
    fn extract(&mut self, face: &Frame) -> Result<Embedding, BoundaryError> {
        let staged = stage_frame(face)?;
        let stdout = self.command.run_on(staged.path())?;
        let embedding = parse_extract_payload(&stdout, self.dimension)?;
        tracing::debug!(program = %self.command.program, "external extractor ran");
        Ok(embedding)
    }
}
