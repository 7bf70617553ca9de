//! Gate configuration: named defaults, an optional TOML file, `FAREGATE_*`
//! environment overrides. Core crates never read config themselves; they
//! take the resolved values from here.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use faregate_core::{
    ToolCommand, DEFAULT_BOUNDARY_TIMEOUT, DEFAULT_DISTANCE_THRESHOLD, DEFAULT_MEMO_TTL,
    DEFAULT_MIN_CONFIDENCE,
};

/// Embedding dimension expected from the extraction tool.
pub const DEFAULT_EMBEDDING_DIM: usize = 512;

/// Files consulted, in order, when `FAREGATE_CONFIG` is unset.
const CONFIG_CANDIDATES: [&str; 2] = ["faregate.toml", "/etc/faregate/config.toml"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// On-disk shape: everything optional, resolved against named defaults.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    data_dir: Option<PathBuf>,
    store_path: Option<PathBuf>,
    roster_path: Option<PathBuf>,
    faces_dir: Option<PathBuf>,
    captures_dir: Option<PathBuf>,
    embedding_dim: Option<usize>,
    distance_threshold: Option<f32>,
    min_confidence: Option<f32>,
    memo_ttl_secs: Option<u64>,
    boundary_timeout_secs: Option<u64>,
    detector: Option<ToolCommand>,
    extractor: Option<ToolCommand>,
}

#[derive(Debug, Clone)]
pub struct GateConfig {
    pub store_path: PathBuf,
    pub roster_path: PathBuf,
    pub faces_dir: PathBuf,
    pub captures_dir: PathBuf,
    pub embedding_dim: usize,
    pub distance_threshold: f32,
    pub min_confidence: f32,
    pub memo_ttl_secs: u64,
    pub boundary_timeout_secs: u64,
    pub detector: ToolCommand,
    pub extractor: ToolCommand,
}

impl GateConfig {
    /// Load from the config file (if any) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let lookup = |key: &str| std::env::var(key).ok();
        let candidates: Vec<PathBuf> = CONFIG_CANDIDATES.iter().map(PathBuf::from).collect();
        let file = load_file(&lookup, &candidates)?;
        Ok(Self::resolve(file, &lookup))
    }

    /// Environment values override file values; both override defaults.
    fn resolve(file: FileConfig, lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        let data_dir = env_path(lookup, "FAREGATE_DATA_DIR")
            .or(file.data_dir)
            .unwrap_or_else(|| default_data_dir(lookup));

        Self {
            store_path: env_path(lookup, "FAREGATE_STORE_PATH")
                .or(file.store_path)
                .unwrap_or_else(|| data_dir.join("embeddings.json")),
            roster_path: env_path(lookup, "FAREGATE_ROSTER_PATH")
                .or(file.roster_path)
                .unwrap_or_else(|| data_dir.join("roster.json")),
            faces_dir: env_path(lookup, "FAREGATE_FACES_DIR")
                .or(file.faces_dir)
                .unwrap_or_else(|| data_dir.join("faces")),
            captures_dir: env_path(lookup, "FAREGATE_CAPTURES_DIR")
                .or(file.captures_dir)
                .unwrap_or_else(|| data_dir.join("captures")),
            embedding_dim: env_usize(lookup, "FAREGATE_EMBEDDING_DIM")
                .or(file.embedding_dim)
                .unwrap_or(DEFAULT_EMBEDDING_DIM),
            distance_threshold: env_f32(lookup, "FAREGATE_DISTANCE_THRESHOLD")
                .or(file.distance_threshold)
                .unwrap_or(DEFAULT_DISTANCE_THRESHOLD),
            min_confidence: env_f32(lookup, "FAREGATE_MIN_CONFIDENCE")
                .or(file.min_confidence)
                .unwrap_or(DEFAULT_MIN_CONFIDENCE),
            memo_ttl_secs: env_u64(lookup, "FAREGATE_MEMO_TTL_SECS")
                .or(file.memo_ttl_secs)
                .unwrap_or(DEFAULT_MEMO_TTL.as_secs()),
            boundary_timeout_secs: env_u64(lookup, "FAREGATE_BOUNDARY_TIMEOUT_SECS")
                .or(file.boundary_timeout_secs)
                .unwrap_or(DEFAULT_BOUNDARY_TIMEOUT.as_secs()),
            detector: env_tool(lookup, "FAREGATE_DETECT_CMD")
                .or(file.detector)
                .unwrap_or_else(|| ToolCommand::new("faregate-detect")),
            extractor: env_tool(lookup, "FAREGATE_EMBED_CMD")
                .or(file.extractor)
                .unwrap_or_else(|| ToolCommand::new("faregate-embed")),
        }
    }

    pub fn memo_ttl(&self) -> Duration {
        Duration::from_secs(self.memo_ttl_secs)
    }

    pub fn boundary_timeout(&self) -> Duration {
        Duration::from_secs(self.boundary_timeout_secs)
    }
}

/// An explicitly named file must exist; default candidates may be absent.
fn load_file(
    lookup: &dyn Fn(&str) -> Option<String>,
    candidates: &[PathBuf],
) -> Result<FileConfig, ConfigError> {
    if let Some(explicit) = lookup("FAREGATE_CONFIG") {
        let path = PathBuf::from(explicit);
        let contents = fs::read_to_string(&path)
            .map_err(|source| ConfigError::Read { path: path.clone(), source })?;
        return parse_file(&path, &contents);
    }

    for path in candidates {
        match fs::read_to_string(path) {
            Ok(contents) => return parse_file(path, &contents),
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => {
                return Err(ConfigError::Read { path: path.clone(), source: err });
            }
        }
    }
    Ok(FileConfig::default())
}

fn parse_file(path: &Path, contents: &str) -> Result<FileConfig, ConfigError> {
    toml::from_str(contents).map_err(|err| ConfigError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

fn default_data_dir(lookup: &dyn Fn(&str) -> Option<String>) -> PathBuf {
    lookup("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("faregate")
}

fn env_path(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<PathBuf> {
    lookup(key).map(PathBuf::from)
}

fn env_f32(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<f32> {
    lookup(key).and_then(|v| v.parse().ok())
}

fn env_u64(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    lookup(key).and_then(|v| v.parse().ok())
}

fn env_usize(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<usize> {
    lookup(key).and_then(|v| v.parse().ok())
}

/// Whitespace-split command string: program first, then fixed arguments.
fn env_tool(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<ToolCommand> {
    let raw = lookup(key)?;
    let mut parts = raw.split_whitespace().map(str::to_string);
    let program = parts.next()?;
    Some(ToolCommand { program, args: parts.collect() })
}
