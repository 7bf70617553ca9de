//! Session memoizer: coarse face fingerprints, TTL-gated result reuse.
//!
//! The fingerprint is deliberately cheap and pose/lighting sensitive: the
//! same person can hash differently between frames, which costs a re-match
//! and nothing else. It is a cache key, never an identity proof.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

use crate::frame::Frame;
use crate::types::RecognitionResult;

/// Side length of the square downsample the fingerprint is taken from.
pub const FINGERPRINT_GRID: u32 = 50;
/// Sample every n-th pixel of the downsampled grid, row-major.
pub const FINGERPRINT_STRIDE: usize = 10;
/// How long a memoized recognition stays valid.
pub const DEFAULT_MEMO_TTL: Duration = Duration::from_secs(10);

/// Coarse visual signature of a face region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Downsample to a fixed grid, sample a fixed pixel stride, hash the bytes.
pub fn compute_fingerprint(region: &Frame) -> Fingerprint {
    let grid = region.resize(FINGERPRINT_GRID, FINGERPRINT_GRID);
    let sampled: Vec<u8> = grid.data.iter().step_by(FINGERPRINT_STRIDE).copied().collect();

    let digest = Sha256::digest(&sampled);
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    Fingerprint(u64::from_be_bytes(prefix))
}

struct MemoEntry {
    result: RecognitionResult,
    created_at: Instant,
}

/// Per-session recognition cache with lazy TTL expiry.
///
/// Owned by exactly one scanning session; fingerprints are too coarse to
/// share across sessions. Expired entries are only detected at read time
/// and stay in memory until overwritten or the session ends.
pub struct SessionMemo {
    ttl: Duration,
    entries: HashMap<Fingerprint, MemoEntry>,
}

impl SessionMemo {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: HashMap::new() }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached result for `fingerprint` if it is still within the TTL.
    pub fn get(&self, fingerprint: Fingerprint) -> Option<RecognitionResult> {
        self.lookup(fingerprint, Instant::now())
    }

    fn lookup(&self, fingerprint: Fingerprint, now: Instant) -> Option<RecognitionResult> {
        let entry = self.entries.get(&fingerprint)?;
        if now.duration_since(entry.created_at) < self.ttl {
            Some(entry.result.clone())
        } else {
            None
        }
    }

    /// Unconditional overwrite.
    pub fn put(&mut self, fingerprint: Fingerprint, result: RecognitionResult) {
        self.put_at(fingerprint, result, Instant::now());
    }

    fn put_at(&mut self, fingerprint: Fingerprint, result: RecognitionResult, created_at: Instant) {
        self.entries.insert(fingerprint, MemoEntry { result, created_at });
    }

    /// Drop every entry, fresh or stale.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SessionMemo {
    fn default() -> Self {
        Self::new(DEFAULT_MEMO_TTL)
    }
}
