//! Subcommand implementations and the shared wiring they build on.

pub mod enroll;
pub mod roster;
pub mod scan;

use std::sync::Arc;

use anyhow::{Context, Result};

use faregate_core::{
    spawn_boundary, EmbeddingStore, ExternalDetector, ExternalExtractor, Pipeline, PipelineConfig,
};
use faregate_roster::RosterStore;

use crate::config::GateConfig;

pub(crate) fn open_store(config: &GateConfig) -> Result<Arc<EmbeddingStore>> {
    let store = EmbeddingStore::open(&config.store_path, config.embedding_dim)
        .with_context(|| format!("opening embedding store {}", config.store_path.display()))?;
    Ok(Arc::new(store))
}

pub(crate) fn open_roster(config: &GateConfig) -> RosterStore {
    RosterStore::open(&config.roster_path)
}

/// Store plus the configured external face tools behind the worker thread.
pub(crate) fn build_pipeline(config: &GateConfig) -> Result<Pipeline> {
    let store = open_store(config)?;
    let detector = ExternalDetector::new(config.detector.clone());
    let extractor = ExternalExtractor::new(config.extractor.clone(), config.embedding_dim);
    let handle = spawn_boundary(
        Box::new(detector),
        Box::new(extractor),
        config.boundary_timeout(),
    )
    .context("starting face backend worker")?;

    Ok(Pipeline::new(
        store,
        handle,
        PipelineConfig {
            distance_threshold: config.distance_threshold,
            faces_dir: config.faces_dir.clone(),
        },
    ))
}
