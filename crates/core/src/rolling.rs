//! Polynomial rolling hash over a sliding byte window.
//!
//! The constants are part of the wire-level chunking contract: two peers
//! chunking the same bytes must agree on every boundary, which requires
//! identical hash arithmetic.

/// Polynomial base.
pub const ROLLING_PRIME: u64 = 31;

/// Modulus (1e9 + 9).
pub const ROLLING_MODULUS: u64 = 1_000_000_009;

/// Rolling hash of the form `h <- (h * P + b) mod M`, with the ejection
/// term for the oldest byte subtracted using a precomputed
/// `P^(window_size - 1) mod M`.
///
/// Not cryptographic; only needs a smooth distribution under bit masks.
#[derive(Debug, Clone)]
pub struct RollingHash {
    window_size: usize,
    hash: u64,
    power: u64,
}

impl RollingHash {
    /// Create a rolling hash for the given window size.
    pub fn new(window_size: usize) -> Self {
        let mut power = 1u64;
        for _ in 0..window_size.saturating_sub(1) {
            power = (power * ROLLING_PRIME) % ROLLING_MODULUS;
        }
        Self {
            window_size,
            hash: 0,
            power,
        }
    }

    /// The configured window size in bytes.
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Current 64-bit hash value.
    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// Clear accumulated state.
    pub fn reset(&mut self) {
        self.hash = 0;
    }

    /// Extend the hashed prefix by one byte.
    pub fn append(&mut self, byte: u8) {
        self.hash = (self.hash * ROLLING_PRIME + u64::from(byte)) % ROLLING_MODULUS;
    }

    /// Advance the window by one position: eject the oldest byte, admit
    /// one new byte. Amortized O(1).
    pub fn update(&mut self, byte_in: u8, byte_out: u8) {
        self.hash = (self.hash + ROLLING_MODULUS
            - (u64::from(byte_out) * self.power) % ROLLING_MODULUS)
            % ROLLING_MODULUS;
        self.hash = (self.hash * ROLLING_PRIME + u64::from(byte_in)) % ROLLING_MODULUS;
    }
}
