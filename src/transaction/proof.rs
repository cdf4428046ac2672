//! The instant asset lock proof: the signed transaction, its InstantSend
//! lock, and the burn output index, bound together. The proof is the
//! witness for layer-2 identity funding, and the identity id is a pure
//! function of it.

use crate::hashes;

/// Index of the burn output in the asset-lock transaction.
pub const BURN_OUTPUT_INDEX: u32 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLockProof {
    pub transaction_bytes: Vec<u8>,
    pub instant_lock_bytes: Vec<u8>,
    pub output_index: u32,
}

impl AssetLockProof {
    pub fn new(transaction_bytes: Vec<u8>, instant_lock_bytes: Vec<u8>, output_index: u32) -> Self {
        AssetLockProof {
            transaction_bytes,
            instant_lock_bytes,
            output_index,
        }
    }

    /// The identity id implied by this proof: double SHA-256 over the
    /// commitment `hash256(tx bytes) ⧺ hash256(islock bytes) ⧺ u32 LE
    /// output index`, rendered in base58. Every byte of the proof triple
    /// feeds the id, and the transaction bytes are exactly the builder's,
    /// so the binding survives re-serialization.
    pub fn create_identity_id(&self) -> String {
        let mut commitment = Vec::with_capacity(68);
        commitment.extend_from_slice(&hashes::hash256(&self.transaction_bytes));
        commitment.extend_from_slice(&hashes::hash256(&self.instant_lock_bytes));
        commitment.extend_from_slice(&self.output_index.to_le_bytes());
        bs58::encode(hashes::hash256(&commitment)).into_string()
    }
}
