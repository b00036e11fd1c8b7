//! Spend-key derivation.
//!
//! `spend_key = hex(sha256(seed || federation_id || note_id))`. The seed is
//! 32 random bytes private to one quorum client, so only that client can
//! reproduce the keys of the notes it issued.

use std::fmt;

use bitcoin::hashes::{Hash, HashEngine, sha256};
use hearth_core::FederationId;
use rand::RngCore;

/// Derives note spend keys from a per-client seed.
#[derive(Clone)]
pub struct NoteKeyDeriver {
    seed: [u8; 32],
}

impl NoteKeyDeriver {
    /// Fresh deriver with a random seed.
    pub fn random() -> Self {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        Self { seed }
    }

    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self { seed }
    }

    pub fn derive(&self, federation_id: &FederationId, note_id: &str) -> String {
        let mut engine = sha256::Hash::engine();
        engine.input(&self.seed);
        engine.input(federation_id.as_str().as_bytes());
        engine.input(note_id.as_bytes());
        hex::encode(sha256::Hash::from_engine(engine).to_byte_array())
    }
}

impl fmt::Debug for NoteKeyDeriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoteKeyDeriver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fed() -> FederationId {
        FederationId::parse("fed_1760400000000_abcdefghi").unwrap()
    }

    #[test]
    fn derivation_is_deterministic_per_seed() {
        let a = NoteKeyDeriver::from_seed([7; 32]);
        let b = NoteKeyDeriver::from_seed([7; 32]);
        let c = NoteKeyDeriver::from_seed([8; 32]);
        let key = a.derive(&fed(), "n1");
        assert_eq!(key.len(), 64);
        assert_eq!(key, b.derive(&fed(), "n1"));
        assert_ne!(key, c.derive(&fed(), "n1"));
        assert_ne!(key, a.derive(&fed(), "n2"));
    }

    #[test]
    fn matches_plain_sha256_of_concatenation() {
        let deriver = NoteKeyDeriver::from_seed([0; 32]);
        let mut preimage = vec![0u8; 32];
        preimage.extend_from_slice(fed().as_str().as_bytes());
        preimage.extend_from_slice(b"n1");
        let expected = hex::encode(sha256::Hash::hash(&preimage).to_byte_array());
        assert_eq!(deriver.derive(&fed(), "n1"), expected);
    }

    #[test]
    fn debug_hides_seed() {
        let deriver = NoteKeyDeriver::from_seed([9; 32]);
        assert!(!format!("{deriver:?}").contains('9'));
    }
}
