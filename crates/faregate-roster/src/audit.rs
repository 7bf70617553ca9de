//! Records appended by the gate: one per decision, one per saved capture.

use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use faregate_core::AccessDecision;

/// One gate decision as it lands in the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessLogEntry {
    /// RFC 3339 wall-clock time of the decision.
    pub timestamp: String,
    #[serde(default)]
    pub identity: Option<String>,
    /// Display name the roster knew at decision time, if any.
    #[serde(default)]
    pub name: Option<String>,
    /// Stable decision label (`allowed`, `denied_unpaid`, ...).
    pub status: String,
    #[serde(default)]
    pub confidence: Option<f32>,
}

impl AccessLogEntry {
    /// Build an entry for `decision`, timestamped now.
    pub fn from_decision(decision: &AccessDecision, name: Option<&str>) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            identity: decision.identity().map(str::to_string),
            name: name.map(str::to_string),
            status: decision.status_label().to_string(),
            confidence: decision.confidence(),
        }
    }
}

/// A gate-camera still saved alongside a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureRecord {
    pub timestamp: String,
    #[serde(default)]
    pub identity: Option<String>,
    pub status: String,
    pub path: PathBuf,
}

impl CaptureRecord {
    pub fn new(identity: Option<&str>, status: &str, path: PathBuf) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            identity: identity.map(str::to_string),
            status: status.to_string(),
            path,
        }
    }
}
