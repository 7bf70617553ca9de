use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use faregate_core::{
    decide, spawn_boundary, AccessDecision, BoundaryError, BoundingBox, Embedding,
    EmbeddingExtractor, EmbeddingStore, FaceDetector, FeeStatus, FeeStatusSource, Frame, Pipeline,
    PipelineConfig, RecognitionResult, ScanSession, DEFAULT_MIN_CONFIDENCE,
};
use tempfile::TempDir;

#[test]
fn integration_enroll_scan_and_decide() {
    let tmp = TempDir::new().unwrap();
    let gate = build_gate(tmp.path());
    let fees = ledger(&[("paid-rider", FeeStatus::Paid), ("unpaid-rider", FeeStatus::Unpaid)]);

    gate.register("paid-rider", "Ada Quill", &top_bright(), serde_json::Value::Null)
        .unwrap();
    gate.register("unpaid-rider", "Beck Moss", &left_bright(), serde_json::Value::Null)
        .unwrap();

    let allowed = decide(&gate.recognize_one(&top_bright()), &fees, DEFAULT_MIN_CONFIDENCE);
    assert_eq!(
        allowed,
        AccessDecision::Allowed { identity: "paid-rider".into(), confidence: 100.0 }
    );
    assert_eq!(allowed.status_label(), "allowed");

    let denied = decide(&gate.recognize_one(&left_bright()), &fees, DEFAULT_MIN_CONFIDENCE);
    assert_eq!(
        denied,
        AccessDecision::DeniedUnpaid { identity: "unpaid-rider".into(), confidence: 100.0 }
    );

    let stranger = decide(&gate.recognize_one(&corner_bright()), &fees, DEFAULT_MIN_CONFIDENCE);
    assert_eq!(stranger, AccessDecision::Unrecognized);
}

#[test]
fn integration_strict_gate_denies_marginal_match() {
    let tmp = TempDir::new().unwrap();
    let gate = build_gate(tmp.path());
    let fees = ledger(&[("paid-rider", FeeStatus::Paid)]);

    gate.register("paid-rider", "Ada Quill", &top_bright(), serde_json::Value::Null)
        .unwrap();

    // Same pose under worse lighting: still the best match, just weaker.
    let result = gate.recognize_one(&dim_top_bright());
    let confidence = match &result {
        RecognitionResult::Recognized { identity, confidence } => {
            assert_eq!(identity, "paid-rider");
            *confidence
        }
        other => panic!("expected a recognition, got {other:?}"),
    };
    assert!(confidence > 99.0 && confidence < 100.0);

    assert!(decide(&result, &fees, DEFAULT_MIN_CONFIDENCE).is_allowed());
    assert_eq!(
        decide(&result, &fees, 99.9),
        AccessDecision::DeniedLowConfidence { identity: "paid-rider".into(), confidence }
    );
}

#[test]
fn integration_group_scan_maps_to_decisions() {
    let tmp = TempDir::new().unwrap();
    let gate = build_gate(tmp.path());
    let fees = ledger(&[("paid-rider", FeeStatus::Paid), ("unpaid-rider", FeeStatus::Unpaid)]);

    gate.register("paid-rider", "Ada Quill", &top_bright(), serde_json::Value::Null)
        .unwrap();
    gate.register("unpaid-rider", "Beck Moss", &left_bright(), serde_json::Value::Null)
        .unwrap();

    let mut session = ScanSession::new(&gate, Duration::from_secs(10));
    let decisions: Vec<AccessDecision> = session
        .recognize_all(&side_by_side())
        .iter()
        .map(|result| decide(result, &fees, DEFAULT_MIN_CONFIDENCE))
        .collect();

    assert_eq!(decisions.len(), 2);
    assert!(decisions[0].is_allowed());
    assert_eq!(decisions[0].identity(), Some("paid-rider"));
    assert_eq!(decisions[1].identity(), Some("unpaid-rider"));
    assert_eq!(decisions[1].status_label(), "denied_unpaid");
}

#[test]
fn integration_no_face_is_unrecognized() {
    let tmp = TempDir::new().unwrap();
    let gate = build_gate(tmp.path());
    let fees = ledger(&[]);

    let result = gate.recognize_one(&Frame::new(vec![0u8; 4], 2, 2).unwrap());
    assert_eq!(result, RecognitionResult::NoFace);
    assert_eq!(decide(&result, &fees, DEFAULT_MIN_CONFIDENCE), AccessDecision::Unrecognized);
}

#[test]
fn integration_backend_fault_is_system_error() {
    struct DarkLens;
    impl EmbeddingExtractor for DarkLens {
        fn extract(&mut self, _face: &Frame) -> Result<Embedding, BoundaryError> {
            Err(BoundaryError::Backend("sensor offline".into()))
        }
    }

    let tmp = TempDir::new().unwrap();
    let store = Arc::new(EmbeddingStore::open(&tmp.path().join("embeddings.json"), 4).unwrap());
    let handle = spawn_boundary(
        Box::new(TileDetector),
        Box::new(DarkLens),
        Duration::from_secs(2),
    )
    .unwrap();
    let gate = Pipeline::new(store, handle, gate_config(tmp.path()));
    let fees = ledger(&[("paid-rider", FeeStatus::Paid)]);

    let decision = decide(&gate.recognize_one(&top_bright()), &fees, DEFAULT_MIN_CONFIDENCE);
    match decision {
        AccessDecision::SystemError { reason } => assert!(reason.contains("sensor offline")),
        other => panic!("expected a system error, got {other:?}"),
    }
}

#[test]
fn integration_store_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    {
        let gate = build_gate(tmp.path());
        gate.register("paid-rider", "Ada Quill", &top_bright(), serde_json::Value::Null)
            .unwrap();
    }

    let reopened = build_gate(tmp.path());
    assert_eq!(reopened.store().len(), 1);
    assert_eq!(
        reopened.recognize_one(&top_bright()),
        RecognitionResult::Recognized { identity: "paid-rider".into(), confidence: 100.0 }
    );
}

/// One detection per horizontal 4x4 tile; frames narrower than a tile hold
/// no face at all.
struct TileDetector;

impl FaceDetector for TileDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, BoundaryError> {
        let tiles = frame.width / 4;
        Ok((0..tiles).map(|i| BoundingBox::new(i * 4, 0, 4, 4)).collect())
    }
}

/// Mean brightness of the four quadrants, as a 4-d embedding.
struct QuadrantExtractor;

impl EmbeddingExtractor for QuadrantExtractor {
    fn extract(&mut self, face: &Frame) -> Result<Embedding, BoundaryError> {
        if face.width < 2 || face.height < 2 {
            return Err(BoundaryError::Backend("face region too small".into()));
        }
        let (hw, hh) = (face.width / 2, face.height / 2);
        let mean = |x: u32, y: u32| -> f32 {
            let q = face.crop(&BoundingBox::new(x, y, hw, hh));
            q.data.iter().map(|&p| p as f32).sum::<f32>() / q.data.len() as f32
        };
        Ok(Embedding::new(vec![mean(0, 0), mean(hw, 0), mean(0, hh), mean(hw, hh)]))
    }
}

struct LedgerFees(HashMap<String, FeeStatus>);

impl FeeStatusSource for LedgerFees {
    fn fee_status(&self, identity: &str) -> FeeStatus {
        self.0.get(identity).copied().unwrap_or(FeeStatus::Unknown)
    }
}

fn ledger(entries: &[(&str, FeeStatus)]) -> LedgerFees {
    LedgerFees(
        entries
            .iter()
            .map(|(identity, status)| (identity.to_string(), *status))
            .collect(),
    )
}

fn gate_config(dir: &Path) -> PipelineConfig {
    PipelineConfig {
        distance_threshold: 0.4,
        faces_dir: dir.join("faces"),
    }
}

fn build_gate(dir: &Path) -> Pipeline {
    let store = Arc::new(EmbeddingStore::open(&dir.join("embeddings.json"), 4).unwrap());
    let handle = spawn_boundary(
        Box::new(TileDetector),
        Box::new(QuadrantExtractor),
        Duration::from_secs(2),
    )
    .unwrap();
    Pipeline::new(store, handle, gate_config(dir))
}

fn rows(top: u8, bottom: u8) -> Frame {
    let mut data = vec![top; 8];
    data.extend(vec![bottom; 8]);
    Frame::new(data, 4, 4).unwrap()
}

/// 4x4, bright top half.
fn top_bright() -> Frame {
    rows(200, 10)
}

/// Same pattern at lower contrast.
fn dim_top_bright() -> Frame {
    rows(180, 20)
}

/// 4x4, bright left half.
fn left_bright() -> Frame {
    let mut data = Vec::new();
    for _ in 0..4 {
        data.extend([200u8, 200, 10, 10]);
    }
    Frame::new(data, 4, 4).unwrap()
}

/// 4x4, bright bottom-right quadrant only; far from every enrolled vector.
fn corner_bright() -> Frame {
    let mut data = vec![10u8; 8];
    for _ in 0..2 {
        data.extend([10u8, 10, 200, 200]);
    }
    Frame::new(data, 4, 4).unwrap()
}

/// 8x4: `top_bright` tile then `left_bright` tile.
fn side_by_side() -> Frame {
    let (a, b) = (top_bright(), left_bright());
    let mut data = Vec::new();
    for y in 0..4usize {
        data.extend_from_slice(&a.data[y * 4..y * 4 + 4]);
        data.extend_from_slice(&b.data[y * 4..y * 4 + 4]);
    }
    Frame::new(data, 8, 4).unwrap()
}
