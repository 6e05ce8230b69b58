//! Client-side identifier generation.
//!
//! Identifiers combine the creation time, a process-wide sequence number and
//! a random suffix, e.g. `intent-lq2x9k1c-1f-a8Zk02Qe`.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use rand::Rng;
use rand::distributions::Alphanumeric;

const RANDOM_LEN: usize = 8;

/// Generator for globally unique record identifiers.
#[derive(Debug)]
pub struct IdGenerator {
    counter: AtomicU64,
}

static GLOBAL: IdGenerator = IdGenerator::new();

impl IdGenerator {
    /// Creates a generator with its sequence at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    /// Generates the next identifier with the given prefix.
    #[must_use]
    pub fn next(&self, prefix: &str) -> String {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        let millis = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(RANDOM_LEN)
            .map(char::from)
            .collect();
        format!("{prefix}-{}-{}-{suffix}", base36(millis), base36(seq))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Generates an identifier from the process-wide generator.
#[must_use]
pub fn generate_id(prefix: &str) -> String {
    GLOBAL.next(prefix)
}

fn base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        // n % 36 < 36, always a valid index
        out.push(DIGITS[usize::try_from(n % 36).unwrap_or_default()]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
