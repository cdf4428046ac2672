//! An in-memory Platform driver. The real SDK plugs in through the
//! [`PlatformDriver`] trait; this implementation enforces the same signer
//! contract against a local identity map, which is enough to rehearse
//! every bridge flow end to end and to drive the tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::model::qualified_identity::IdentityKey;
use crate::model::qualified_identity::qualified_identity_public_key::QualifiedIdentityPublicKey;
use crate::model::wallet::key_pair::KeyPair;
use crate::platform::{
    BridgeSigner, DUFFS_PER_CREDIT, IdentityShell, PlatformDriver, PlatformError,
    PlatformTransferOutput, RegisterNameRequest,
};
use crate::transaction::proof::AssetLockProof;

#[derive(Default)]
pub struct MockPlatformDriver {
    identities: Mutex<BTreeMap<String, IdentityShell>>,
    registered_names: Mutex<BTreeSet<String>>,
    transfers: Mutex<Vec<PlatformTransferOutput>>,
    /// Errors popped before each mutating call, for retry tests.
    failure_script: Mutex<Vec<PlatformError>>,
}

impl MockPlatformDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_identity(&self, identity: IdentityShell) {
        self.identities
            .lock()
            .unwrap()
            .insert(identity.id.clone(), identity);
    }

    pub fn seed_name(&self, label: &str) {
        self.registered_names.lock().unwrap().insert(label.into());
    }

    pub fn push_failure(&self, error: PlatformError) {
        self.failure_script.lock().unwrap().push(error);
    }

    pub fn transfers(&self) -> Vec<PlatformTransferOutput> {
        self.transfers.lock().unwrap().clone()
    }

    pub fn identity(&self, id: &str) -> Option<IdentityShell> {
        self.identities.lock().unwrap().get(id).cloned()
    }

    fn take_scripted_failure(&self) -> Result<(), PlatformError> {
        let mut script = self.failure_script.lock().unwrap();
        if script.is_empty() {
            Ok(())
        } else {
            Err(script.remove(0))
        }
    }

    fn locked_credits(proof: &AssetLockProof) -> u64 {
        // The mock cannot decode consensus bytes; it stands in 1000 locked
        // duffs per transaction byte to keep balances deterministic in
        // tests, converted at the real duffs-per-credit ratio.
        let stand_in_duffs = proof.transaction_bytes.len() as u64 * 1000;
        stand_in_duffs / DUFFS_PER_CREDIT
    }
}

#[async_trait]
impl PlatformDriver for MockPlatformDriver {
    async fn create_identity(
        &self,
        identity_keys: &[IdentityKey],
        proof: &AssetLockProof,
        _asset_lock_key: &KeyPair,
        signer: &BridgeSigner,
    ) -> Result<IdentityShell, PlatformError> {
        self.take_scripted_failure()?;
        for key in identity_keys {
            if !signer.can_sign_with(key.id) {
                return Err(PlatformError::Sdk(format!(
                    "missing private key for identity key {} ownership proof",
                    key.id
                )));
            }
        }
        let id = proof.create_identity_id();
        let mut identities = self.identities.lock().unwrap();
        if identities.contains_key(&id) {
            return Err(PlatformError::Sdk(format!("identity {id} already exists")));
        }
        let shell = IdentityShell {
            id: id.clone(),
            public_keys: identity_keys
                .iter()
                .map(|key| QualifiedIdentityPublicKey {
                    id: key.id,
                    key_type: key.key_type,
                    purpose: key.purpose,
                    security_level: key.security_level,
                    data: key.payload_data(),
                    disabled_at: None,
                })
                .collect(),
            balance: Self::locked_credits(proof),
            revision: 0,
        };
        identities.insert(id, shell.clone());
        Ok(shell)
    }

    async fn top_up_identity(
        &self,
        identity: &IdentityShell,
        proof: &AssetLockProof,
        _asset_lock_key: &KeyPair,
    ) -> Result<u64, PlatformError> {
        self.take_scripted_failure()?;
        let mut identities = self.identities.lock().unwrap();
        let stored = identities
            .get_mut(&identity.id)
            .ok_or_else(|| PlatformError::IdentityNotFound(identity.id.clone()))?;
        stored.balance += Self::locked_credits(proof);
        Ok(stored.balance)
    }

    async fn update_identity(
        &self,
        identity: &IdentityShell,
        signer: &BridgeSigner,
        add_public_keys: &[IdentityKey],
        disable_public_keys: &[u32],
    ) -> Result<IdentityShell, PlatformError> {
        self.take_scripted_failure()?;
        for key in add_public_keys {
            if !signer.can_sign_with(key.id) {
                return Err(PlatformError::Sdk(format!(
                    "missing private key for added key {} ownership proof",
                    key.id
                )));
            }
        }
        let mut identities = self.identities.lock().unwrap();
        let stored = identities
            .get_mut(&identity.id)
            .ok_or_else(|| PlatformError::IdentityNotFound(identity.id.clone()))?;
        for key_id in disable_public_keys {
            match stored.public_keys.iter_mut().find(|k| k.id == *key_id) {
                Some(key) => key.disabled_at = Some(1),
                None => {
                    return Err(PlatformError::Sdk(format!(
                        "no key {key_id} on identity {}",
                        identity.id
                    )));
                }
            }
        }
        for key in add_public_keys {
            stored.public_keys.push(QualifiedIdentityPublicKey {
                id: key.id,
                key_type: key.key_type,
                purpose: key.purpose,
                security_level: key.security_level,
                data: key.payload_data(),
                disabled_at: None,
            });
        }
        stored.revision += 1;
        Ok(stored.clone())
    }

    async fn fund_from_asset_lock(
        &self,
        _proof: &AssetLockProof,
        _asset_lock_key: &KeyPair,
        outputs: &[PlatformTransferOutput],
        _signer: &BridgeSigner,
    ) -> Result<(), PlatformError> {
        self.take_scripted_failure()?;
        self.transfers.lock().unwrap().extend_from_slice(outputs);
        Ok(())
    }

    async fn fetch_identity(&self, id: &str) -> Result<Option<IdentityShell>, PlatformError> {
        Ok(self.identities.lock().unwrap().get(id).cloned())
    }

    async fn is_name_available(&self, label: &str) -> Result<bool, PlatformError> {
        Ok(!self.registered_names.lock().unwrap().contains(label))
    }

    async fn register_name(&self, request: &RegisterNameRequest) -> Result<(), PlatformError> {
        self.take_scripted_failure()?;
        let mut names = self.registered_names.lock().unwrap();
        if !names.insert(request.label.clone()) {
            return Err(PlatformError::NameTaken(request.label.clone()));
        }
        Ok(())
    }
}
