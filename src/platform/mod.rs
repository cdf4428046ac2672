//! The layer-2 surface of the bridge. The SDK itself is an external
//! collaborator; everything the bridge needs from it is expressed through
//! the [`PlatformDriver`] trait so the pipeline can run against an
//! in-memory fake in tests.

pub mod address;
pub mod dpns;
pub mod mock;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::model::qualified_identity::IdentityKey;
use crate::model::qualified_identity::qualified_identity_public_key::QualifiedIdentityPublicKey;
use crate::model::wallet::key_pair::KeyPair;
use crate::platform::address::PlatformAddress;
use crate::transaction::proof::AssetLockProof;

/// A credit is worth 1000 duffs; burned duffs convert at this ratio.
pub const DUFFS_PER_CREDIT: u64 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("SDK error: {0}")]
    Sdk(String),
    #[error("identity {0} not found")]
    IdentityNotFound(String),
    #[error("name '{0}' is already taken")]
    NameTaken(String),
}

impl PlatformError {
    /// SDK transports are best-effort, so raw SDK failures are retried;
    /// definitive application answers are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PlatformError::Sdk(_))
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("invalid identity id: {0}")]
    InvalidIdentityId(String),
    #[error("invalid platform address: {0}")]
    InvalidPlatformAddress(String),
    #[error("invalid DPNS label: {0}")]
    InvalidDpnsLabel(String),
}

/// An identity as Platform reports it: id, key list, balance, revision.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityShell {
    pub id: String,
    pub public_keys: Vec<QualifiedIdentityPublicKey>,
    pub balance: u64,
    pub revision: u64,
}

/// Private key material handed to the SDK for signing state transitions,
/// keyed by identity key id. Empty when sending to a third-party address:
/// the recipient does not sign to receive.
#[derive(Debug, Clone, Default)]
pub struct BridgeSigner {
    keys: BTreeMap<u32, KeyPair>,
}

impl BridgeSigner {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_identity_keys(keys: &[IdentityKey]) -> Self {
        let keys = keys
            .iter()
            .map(|key| (key.id, key.key_pair.clone()))
            .collect();
        BridgeSigner { keys }
    }

    pub fn insert(&mut self, key_id: u32, key_pair: KeyPair) {
        self.keys.insert(key_id, key_pair);
    }

    pub fn can_sign_with(&self, key_id: u32) -> bool {
        self.keys.contains_key(&key_id)
    }

    pub fn key_pair(&self, key_id: u32) -> Option<&KeyPair> {
        self.keys.get(&key_id)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// One credit transfer leg of a fund-from-asset-lock call.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformTransferOutput {
    pub address: PlatformAddress,
    pub amount_credits: u64,
}

#[derive(Debug, Clone)]
pub struct RegisterNameRequest {
    pub label: String,
    pub identity_id: String,
    pub identity_key_id: u32,
}

/// Contract with the layer-2 SDK. Every call may fail with
/// [`PlatformError::Sdk`]; the mutating calls are best-effort transports
/// and are wrapped in the retry engine by the bridge driver.
#[async_trait]
pub trait PlatformDriver: Send + Sync {
    /// Submits an identity-create state transition witnessed by `proof`.
    /// The resulting identity id equals `proof.create_identity_id()`; the
    /// signer must hold the private half of every declared identity key.
    async fn create_identity(
        &self,
        identity_keys: &[IdentityKey],
        proof: &AssetLockProof,
        asset_lock_key: &KeyPair,
        signer: &BridgeSigner,
    ) -> Result<IdentityShell, PlatformError>;

    /// Credits an existing identity from `proof`. Requires a prior fetch
    /// for revision/key metadata; returns the new balance.
    async fn top_up_identity(
        &self,
        identity: &IdentityShell,
        proof: &AssetLockProof,
        asset_lock_key: &KeyPair,
    ) -> Result<u64, PlatformError>;

    /// Mutates the identity's key set. The signer must contain a
    /// MASTER-level key of this identity and the private half of every
    /// added key.
    async fn update_identity(
        &self,
        identity: &IdentityShell,
        signer: &BridgeSigner,
        add_public_keys: &[IdentityKey],
        disable_public_keys: &[u32],
    ) -> Result<IdentityShell, PlatformError>;

    /// Moves the proof's credits to one or more platform addresses.
    async fn fund_from_asset_lock(
        &self,
        proof: &AssetLockProof,
        asset_lock_key: &KeyPair,
        outputs: &[PlatformTransferOutput],
        signer: &BridgeSigner,
    ) -> Result<(), PlatformError>;

    async fn fetch_identity(&self, id: &str) -> Result<Option<IdentityShell>, PlatformError>;

    async fn is_name_available(&self, label: &str) -> Result<bool, PlatformError>;

    async fn register_name(&self, request: &RegisterNameRequest) -> Result<(), PlatformError>;
}

/// Identity ids are 32 bytes in base58, which renders as 43 or 44
/// characters.
pub fn validate_identity_id(id: &str) -> Result<(), ValidationError> {
    if id.len() < 43 || id.len() > 44 {
        return Err(ValidationError::InvalidIdentityId(format!(
            "expected 43-44 characters, got {}",
            id.len()
        )));
    }
    let decoded = bs58::decode(id)
        .into_vec()
        .map_err(|e| ValidationError::InvalidIdentityId(e.to_string()))?;
    if decoded.len() != 32 {
        return Err(ValidationError::InvalidIdentityId(format!(
            "decodes to {} bytes, expected 32",
            decoded.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_id_validation() {
        let valid = bs58::encode([0xab; 32]).into_string();
        assert!(validate_identity_id(&valid).is_ok());

        assert!(validate_identity_id("short").is_err());
        // Right length, invalid alphabet (0, O, I, l are excluded).
        let bad = "0".repeat(44);
        assert!(validate_identity_id(&bad).is_err());
    }

    #[test]
    fn signer_lookup() {
        let pair = KeyPair::from_secret_bytes(&[0x42; 32]).unwrap();
        let mut signer = BridgeSigner::empty();
        assert!(signer.is_empty());
        signer.insert(3, pair.clone());
        assert!(signer.can_sign_with(3));
        assert!(!signer.can_sign_with(0));
        assert_eq!(signer.key_pair(3).unwrap().secret_bytes(), pair.secret_bytes());
    }
}
