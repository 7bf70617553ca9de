//! Enrollment and store management: register, remove, list, rebuild.

use std::path::Path;

use anyhow::{Context, Result};

use faregate_core::{FeeStatus, Frame};
use faregate_roster::{RiderRecord, RosterError};

use crate::commands::{build_pipeline, open_roster, open_store};
use crate::config::GateConfig;

pub fn register(
    config: &GateConfig,
    id: &str,
    name: &str,
    department: Option<&str>,
    paid: bool,
    image: &Path,
) -> Result<()> {
    let pipeline = build_pipeline(config)?;
    let frame =
        Frame::open(image).with_context(|| format!("reading image {}", image.display()))?;

    let metadata = match department {
        Some(dept) => serde_json::json!({ "department": dept }),
        None => serde_json::Value::Null,
    };
    let registration = pipeline.register(id, name, &frame, metadata)?;

    let roster = open_roster(config);
    roster.upsert_rider(RiderRecord {
        id: id.to_string(),
        name: name.to_string(),
        department: department.map(str::to_string),
        fee_status: if paid { FeeStatus::Paid } else { FeeStatus::Unpaid },
    })?;

    println!(
        "registered {id} ({name}); face saved to {}",
        registration.image_path.display()
    );
    if !registration.durable {
        println!("warning: store write failed, the entry is in memory only");
    }
    Ok(())
}

pub fn remove(config: &GateConfig, id: &str) -> Result<()> {
    let store = open_store(config)?;
    let removed = store.remove(id)?;

    // The roster row may legitimately not exist; only real I/O matters.
    let roster = open_roster(config);
    match roster.remove_rider(id) {
        Ok(_) => {}
        Err(RosterError::RiderNotFound { .. }) => {
            tracing::debug!(rider = id, "no roster row to remove");
        }
        Err(err) => return Err(err.into()),
    }

    println!("removed {id} ({})", removed.record.display_name);
    if !removed.durable {
        println!("warning: store write failed, the removal is in memory only");
    }
    Ok(())
}

pub fn list(config: &GateConfig, json: bool) -> Result<()> {
    let store = open_store(config)?;
    let records = store.list();

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("no riders enrolled");
        return Ok(());
    }
    for record in &records {
        println!(
            "{:<16} {:<24} {}",
            record.identity, record.display_name, record.registered_at
        );
    }
    println!("{} rider(s)", records.len());
    Ok(())
}

pub fn rebuild(config: &GateConfig, directory: &Path) -> Result<()> {
    let pipeline = build_pipeline(config)?;
    let summary = pipeline.rebuild(directory)?;

    println!(
        "rebuilt store from {}: {} registered, {} skipped",
        directory.display(),
        summary.registered,
        summary.skipped.len()
    );
    for skip in &summary.skipped {
        println!("  skipped {}: {}", skip.file, skip.reason);
    }
    if !summary.durable {
        println!("warning: store write failed, the rebuild is in memory only");
    }
    Ok(())
}
