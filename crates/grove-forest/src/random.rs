//! Explicitly seeded random source shared by the bagging and feature stages.

use std::fmt;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Seed for a [`SeededRandomSource`], given either as an integer or as text.
///
/// Text seeds are folded into 64 bits with FNV-1a, so `"0.41872"` style
/// seeds taken from a UI state string reproduce exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Seed {
    /// An integer seed.
    Number(u64),
    /// A text seed.
    Text(String),
}

impl Seed {
    /// Return the 64-bit value the generator is seeded with.
    #[must_use]
    pub fn to_u64(&self) -> u64 {
        match self {
            Seed::Number(n) => *n,
            Seed::Text(text) => text.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
                (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
            }),
        }
    }
}

impl Default for Seed {
    fn default() -> Self {
        Seed::Number(42)
    }
}

impl From<u64> for Seed {
    fn from(value: u64) -> Self {
        Seed::Number(value)
    }
}

impl From<&str> for Seed {
    fn from(value: &str) -> Self {
        Seed::Text(value.to_string())
    }
}

impl From<String> for Seed {
    fn from(value: String) -> Self {
        Seed::Text(value)
    }
}

impl fmt::Display for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seed::Number(n) => write!(f, "{n}"),
            Seed::Text(text) => write!(f, "\"{text}\""),
        }
    }
}

/// Deterministic pseudo-random generator owned by exactly one consumer.
///
/// Two sources built from the same [`Seed`] yield identical sequences.
/// Nothing here touches process-wide state, so concurrent training runs
/// never interfere with each other.
#[derive(Debug, Clone)]
pub struct SeededRandomSource {
    rng: ChaCha8Rng,
}

impl SeededRandomSource {
    /// Create a source from a seed.
    #[must_use]
    pub fn new(seed: &Seed) -> Self {
        Self::from_u64(seed.to_u64())
    }

    /// Create a source from a raw 64-bit seed.
    #[must_use]
    pub fn from_u64(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Draw a uniform value in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        self.rng.r#gen::<f64>()
    }

    /// Draw a uniform integer in `[0, n)`.
    ///
    /// `n` must be positive; every caller in this crate draws from a
    /// validated, non-empty range.
    pub fn next_index(&mut self, n: usize) -> usize {
        debug_assert!(n > 0, "next_index called with an empty range");
        self.rng.gen_range(0..n)
    }

    /// Draw a fresh 64-bit value, e.g. to seed a derived source.
    pub fn next_seed(&mut self) -> u64 {
        self.rng.r#gen()
    }
}
