//! Random identifiers naming per-upload directories.
//!
//! Identifiers are drawn from a base58 alphabet that leaves out look-alike
//! characters (`0`, `O`, `I`, `l`). Nothing records which identifiers were
//! issued: the size of the identifier space is the only protection against
//! guessing and collisions.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::OsRng;
use rand::{RngCore, SeedableRng, TryRngCore};
use rand_chacha::ChaCha8Rng;

/// Symbols an identifier may contain.
pub const ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Identifier length used for upload directories.
pub const DEFAULT_IDENTIFIER_LENGTH: usize = 6;

/// Bytes at or above this value are discarded so every symbol is equally likely.
///
/// 232 is the largest multiple of 58 that fits in a byte.
const REJECTION_THRESHOLD: u8 = ((256 / ALPHABET.len()) * ALPHABET.len()) as u8;

/// Upper bound on refill rounds before a source is declared broken.
const MAX_DRAW_ROUNDS: usize = 64;

/// Errors raised while minting identifiers.
#[derive(Debug, thiserror::Error)]
pub enum IdentifierError {
    /// The randomness source could not produce usable bytes
    #[error("Random source unavailable: {reason}")]
    EntropyUnavailable {
        /// Description reported by the source
        reason: String,
    },

    /// Requested identifier length cannot name a directory
    #[error("Invalid identifier length: {length}")]
    InvalidLength {
        /// Length that was requested
        length: usize,
    },
}

/// Short random string naming one upload directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    /// Returns the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of symbols in the identifier.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when the identifier has no symbols.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consumes the identifier and returns the owned text.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Source of random bytes for identifier allocation.
///
/// Passed into the allocator as a capability so tests can substitute a
/// deterministic or failing source.
pub trait RandomSource: Send + Sync {
    /// Fills `buf` entirely with random bytes.
    ///
    /// # Errors
    ///
    /// - `IdentifierError::EntropyUnavailable` - If the source cannot produce bytes
    fn fill(&self, buf: &mut [u8]) -> Result<(), IdentifierError>;
}

/// Operating system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&self, buf: &mut [u8]) -> Result<(), IdentifierError> {
        let mut rng = OsRng;
        rng.try_fill_bytes(buf)
            .map_err(|e| IdentifierError::EntropyUnavailable {
                reason: e.to_string(),
            })
    }
}

/// Deterministic ChaCha stream for reproducible runs and tests.
pub struct SeededRandom {
    rng: Mutex<ChaCha8Rng>,
}

impl SeededRandom {
    /// Creates a stream from a 64-bit seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn fill(&self, buf: &mut [u8]) -> Result<(), IdentifierError> {
        self.rng.lock().fill_bytes(buf);
        Ok(())
    }
}

/// Mints fixed-length identifiers from a randomness source.
///
/// Stateless between calls: two allocations are independent and may collide.
#[derive(Clone)]
pub struct IdentifierAllocator {
    source: Arc<dyn RandomSource>,
    length: usize,
}

impl IdentifierAllocator {
    /// Creates an allocator over `source` producing identifiers of `length` symbols.
    ///
    /// # Errors
    ///
    /// - `IdentifierError::InvalidLength` - If `length` is zero
    pub fn new(source: Arc<dyn RandomSource>, length: usize) -> Result<Self, IdentifierError> {
        if length == 0 {
            return Err(IdentifierError::InvalidLength { length });
        }
        Ok(Self { source, length })
    }

    /// Creates an allocator backed by the operating system CSPRNG.
    ///
    /// # Errors
    ///
    /// - `IdentifierError::InvalidLength` - If `length` is zero
    pub fn os(length: usize) -> Result<Self, IdentifierError> {
        Self::new(Arc::new(OsRandom), length)
    }

    /// Number of symbols in every generated identifier.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Generates a fresh identifier.
    ///
    /// Each byte from the source is mapped onto [`ALPHABET`] by rejection
    /// sampling: bytes of 232 and above are dropped and replaced by further
    /// draws, so the modulo reduction carries no bias.
    ///
    /// # Errors
    ///
    /// - `IdentifierError::EntropyUnavailable` - If the source fails, or keeps
    ///   producing only rejected bytes
    pub fn generate(&self) -> Result<Identifier, IdentifierError> {
        let mut symbols = String::with_capacity(self.length);
        let mut buf = vec![0u8; self.length];

        for _ in 0..MAX_DRAW_ROUNDS {
            let missing = self.length - symbols.len();
            let draw = &mut buf[..missing];
            self.source.fill(draw)?;

            symbols.extend(
                draw.iter()
                    .filter(|&&byte| byte < REJECTION_THRESHOLD)
                    .map(|&byte| symbol_for(byte)),
            );

            if symbols.len() == self.length {
                return Ok(Identifier(symbols));
            }
        }

        Err(IdentifierError::EntropyUnavailable {
            reason: format!("source produced only rejected bytes for {MAX_DRAW_ROUNDS} rounds"),
        })
    }
}

impl fmt::Debug for IdentifierAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentifierAllocator")
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

fn symbol_for(byte: u8) -> char {
    char::from(ALPHABET[usize::from(byte) % ALPHABET.len()])
}
