//! djb2 string hashing used for bucket selection.

use core::hash::{BuildHasherDefault, Hasher};

const SEED: u64 = 5381;

/// Rolling `hash * 33 + byte` over `bytes`, seeded at 5381.
///
/// Arithmetic wraps; bytes are taken as unsigned.
#[inline]
pub fn djb2(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(SEED, |h, &b| h.wrapping_mul(33).wrapping_add(u64::from(b)))
}

/// `Hasher` form of [`djb2`]; successive `write` calls continue the same
/// recurrence.
#[derive(Clone, Copy, Debug)]
pub struct Djb2Hasher {
    state: u64,
}

impl Default for Djb2Hasher {
    fn default() -> Self {
        Self { state: SEED }
    }
}

impl Hasher for Djb2Hasher {
    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.state = self.state.wrapping_mul(33).wrapping_add(u64::from(b));
        }
    }

    #[inline]
    fn finish(&self) -> u64 {
        self.state
    }
}

/// Default hasher builder for [`crate::Prototype`].
pub type Djb2 = BuildHasherDefault<Djb2Hasher>;
