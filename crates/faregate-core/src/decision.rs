//! Access decision engine: pure mapping from recognition to gate outcome.

use crate::types::{AccessDecision, FeeStatus, RecognitionResult};

/// Default minimum confidence for a recognition to count at the gate.
pub const DEFAULT_MIN_CONFIDENCE: f32 = 70.0;

/// Read-side view of the external fee roster.
pub trait FeeStatusSource {
    fn fee_status(&self, identity: &str) -> FeeStatus;
}

impl<F> FeeStatusSource for F
where
    F: Fn(&str) -> FeeStatus,
{
    fn fee_status(&self, identity: &str) -> FeeStatus {
        self(identity)
    }
}

/// Turn a recognition into a gate decision.
///
/// Pure: no logging, no capture persistence, no clock reads. The fee source
/// is consulted only once a recognition clears `min_confidence`; boundary
/// errors surface as `SystemError` and are never softened to
/// `Unrecognized`.
pub fn decide<S>(
    result: &RecognitionResult,
    fees: &S,
    min_confidence: f32,
) -> AccessDecision
where
    S: FeeStatusSource + ?Sized,
{
    match result {
        RecognitionResult::NoFace | RecognitionResult::Unknown => AccessDecision::Unrecognized,
        RecognitionResult::Error { reason } => {
            AccessDecision::SystemError { reason: reason.clone() }
        }
        RecognitionResult::Recognized { identity, confidence } => {
            if *confidence < min_confidence {
                return AccessDecision::DeniedLowConfidence {
                    identity: identity.clone(),
                    confidence: *confidence,
                };
            }
            match fees.fee_status(identity) {
                FeeStatus::Paid => AccessDecision::Allowed {
                    identity: identity.clone(),
                    confidence: *confidence,
                },
                FeeStatus::Unpaid | FeeStatus::Unknown => AccessDecision::DeniedUnpaid {
                    identity: identity.clone(),
                    confidence: *confidence,
                },
            }
        }
    }
}
