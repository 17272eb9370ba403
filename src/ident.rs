//! Unique tokens for naming downloaded assets

use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Length of every token produced by [`IdGenerator::next_token`].
pub const TOKEN_LEN: usize = 16 + 32;

/// Process-wide token source.
///
/// A token is a zero-padded hex sequence number followed by a random UUID in
/// simple form. The fixed width keeps `<token><index>` unambiguous, and the
/// counter guarantees uniqueness between overlapping requests even if the
/// random part ever repeated.
#[derive(Debug, Default)]
pub struct IdGenerator {
    seq: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_token(&self) -> String {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        format!("{:016x}{}", seq, Uuid::new_v4().simple())
    }

    /// Number of tokens handed out so far
    pub fn issued(&self) -> u64 {
        self.seq.load(Ordering::Relaxed)
    }
}
