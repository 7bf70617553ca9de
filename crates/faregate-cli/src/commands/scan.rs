//! Live-scan commands: single-frame decisions and batched group sessions.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use uuid::Uuid;

use faregate_core::{decide, AccessDecision, Frame, RecognitionResult, ScanSession};
use faregate_roster::{AccessLogEntry, CaptureRecord, RosterStore};

use crate::commands::{build_pipeline, open_roster};
use crate::config::GateConfig;

pub fn scan(
    config: &GateConfig,
    image: &Path,
    min_confidence: Option<f32>,
    save_captures: bool,
    json: bool,
) -> Result<()> {
    let pipeline = build_pipeline(config)?;
    let roster = open_roster(config);
    let min_confidence = min_confidence.unwrap_or(config.min_confidence);

    let frame =
        Frame::open(image).with_context(|| format!("reading image {}", image.display()))?;
    let result = pipeline.recognize_one(&frame);
    let decision = decide(&result, &roster, min_confidence);
    let name = rider_name(&roster, &decision);

    roster.append_access(AccessLogEntry::from_decision(&decision, name.as_deref()))?;
    if save_captures && wants_capture(&decision) {
        save_capture(config, &roster, &decision, &frame)?;
    }

    if json {
        let payload = serde_json::json!({ "result": result, "decision": decision });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("{}", describe(&decision, name.as_deref()));
    }
    Ok(())
}

pub fn group_scan(
    config: &GateConfig,
    images: &[PathBuf],
    min_confidence: Option<f32>,
    report_path: Option<&Path>,
) -> Result<()> {
    let pipeline = build_pipeline(config)?;
    let roster = open_roster(config);
    let min_confidence = min_confidence.unwrap_or(config.min_confidence);

    let mut session = ScanSession::new(&pipeline, config.memo_ttl());
    let mut tally = SessionTally::default();

    for image in images {
        let results = match Frame::open(image) {
            Ok(frame) => session.recognize_all(&frame),
            Err(err) => {
                tracing::warn!(image = %image.display(), error = %err, "unreadable frame");
                vec![RecognitionResult::Error { reason: err.to_string() }]
            }
        };

        tally.frames += 1;
        for result in &results {
            let decision = decide(result, &roster, min_confidence);
            let name = rider_name(&roster, &decision);
            roster.append_access(AccessLogEntry::from_decision(&decision, name.as_deref()))?;
            tally.add(&decision, name.as_deref());
        }
    }

    let report = tally.render();
    print!("{report}");
    if let Some(path) = report_path {
        fs::write(path, &report)
            .with_context(|| format!("writing report {}", path.display()))?;
        println!("report written to {}", path.display());
    }
    Ok(())
}

fn rider_name(roster: &RosterStore, decision: &AccessDecision) -> Option<String> {
    decision
        .identity()
        .and_then(|id| roster.get_rider(id))
        .map(|rider| rider.name)
}

fn describe(decision: &AccessDecision, name: Option<&str>) -> String {
    let name = name.unwrap_or("unlisted");
    match decision {
        AccessDecision::Allowed { identity, confidence } => {
            format!("allowed {identity} ({name}) confidence {confidence:.2}")
        }
        AccessDecision::DeniedUnpaid { identity, confidence } => {
            format!("denied {identity} ({name}): fare not settled, confidence {confidence:.2}")
        }
        AccessDecision::DeniedLowConfidence { identity, confidence } => {
            format!("denied {identity}: confidence {confidence:.2} below minimum")
        }
        AccessDecision::Unrecognized => "unrecognized face".to_string(),
        AccessDecision::SystemError { reason } => format!("system error: {reason}"),
    }
}

/// Denied and unrecognized faces are worth keeping a still of.
fn wants_capture(decision: &AccessDecision) -> bool {
    matches!(
        decision,
        AccessDecision::DeniedUnpaid { .. }
            | AccessDecision::DeniedLowConfidence { .. }
            | AccessDecision::Unrecognized
    )
}

fn save_capture(
    config: &GateConfig,
    roster: &RosterStore,
    decision: &AccessDecision,
    frame: &Frame,
) -> Result<()> {
    fs::create_dir_all(&config.captures_dir).with_context(|| {
        format!("creating captures directory {}", config.captures_dir.display())
    })?;
    let file = format!("{}_{}.png", decision.status_label(), Uuid::new_v4());
    let path = config.captures_dir.join(file);
    frame.save_png(&path)?;
    roster.append_capture(CaptureRecord::new(
        decision.identity(),
        decision.status_label(),
        path.clone(),
    ))?;
    tracing::info!(path = %path.display(), "capture saved");
    Ok(())
}

#[derive(Default)]
struct SessionTally {
    frames: usize,
    faces: usize,
    counts: BTreeMap<&'static str, usize>,
    riders: BTreeMap<String, RiderLine>,
}

struct RiderLine {
    name: Option<String>,
    seen: usize,
    last_status: &'static str,
}

impl SessionTally {
    fn add(&mut self, decision: &AccessDecision, name: Option<&str>) {
        self.faces += 1;
        *self.counts.entry(decision.status_label()).or_default() += 1;

        if let Some(identity) = decision.identity() {
            let line = self.riders.entry(identity.to_string()).or_insert(RiderLine {
                name: None,
                seen: 0,
                last_status: decision.status_label(),
            });
            line.seen += 1;
            line.last_status = decision.status_label();
            if line.name.is_none() {
                line.name = name.map(str::to_string);
            }
        }
    }

    fn render(&self) -> String {
        let mut out = format!("session: {} frame(s), {} face(s)\n", self.frames, self.faces);
        for (status, count) in &self.counts {
            out.push_str(&format!("  {status}: {count}\n"));
        }
        if !self.riders.is_empty() {
            out.push_str("riders seen:\n");
            for (id, line) in &self.riders {
                out.push_str(&format!(
                    "  {id} ({}) x{} last {}\n",
                    line.name.as_deref().unwrap_or("unlisted"),
                    line.seen,
                    line.last_status
                ));
            }
        }
        out
    }
}
