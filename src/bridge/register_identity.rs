//! Create mode's final stage: turn the asset lock proof into a new
//! identity whose id is implied by the proof.

use crate::bridge::state::BridgeState;
use crate::bridge::{BridgeError, BridgeEvent, BridgeStep};
use crate::context::BridgeContext;
use crate::model::qualified_identity::{IdentityKey, KeyType, Purpose, SecurityLevel};
use crate::model::wallet::{Wallet, WalletError};
use crate::platform::{BridgeSigner, PlatformError};

/// The key set a fresh identity is registered with, all HD-derived from
/// the session mnemonic at consecutive DIP-0013 key indexes.
pub(crate) fn default_identity_key_set(
    wallet: &Wallet,
    coin_type: u32,
) -> Result<Vec<IdentityKey>, WalletError> {
    let specs: [(u32, &str, Purpose, SecurityLevel); 4] = [
        (
            0,
            "Master Authentication Key",
            Purpose::AUTHENTICATION,
            SecurityLevel::MASTER,
        ),
        (
            1,
            "Critical Authentication Key",
            Purpose::AUTHENTICATION,
            SecurityLevel::CRITICAL,
        ),
        (
            2,
            "High Authentication Key",
            Purpose::AUTHENTICATION,
            SecurityLevel::HIGH,
        ),
        (3, "Transfer Key", Purpose::TRANSFER, SecurityLevel::CRITICAL),
    ];

    specs
        .into_iter()
        .map(|(id, name, purpose, security_level)| {
            let key_pair = wallet.identity_key_pair(coin_type, 0, id)?;
            Ok(IdentityKey::new(
                id,
                name,
                KeyType::ECDSA_SECP256K1,
                purpose,
                security_level,
                key_pair,
                Some(Wallet::identity_key_derivation_path(coin_type, 0, id)),
            ))
        })
        .collect()
}

impl BridgeContext {
    pub(super) async fn register_identity(
        &self,
        state: BridgeState,
    ) -> Result<BridgeState, BridgeError> {
        let state = state.with_step(BridgeStep::RegisteringIdentity);
        self.emit(BridgeEvent::StepChanged(BridgeStep::RegisteringIdentity))?;

        let proof = state
            .asset_lock_proof
            .clone()
            .expect("islock_received sets the proof");
        let asset_lock_key = state
            .asset_lock_key
            .clone()
            .expect("keys_generated sets the asset lock key");

        let identity_id = proof.create_identity_id();
        if let Some(_existing) = self.platform.fetch_identity(&identity_id).await? {
            return Err(PlatformError::Sdk(format!(
                "identity {identity_id} already exists"
            ))
            .into());
        }

        let signer = BridgeSigner::from_identity_keys(&state.identity_keys);
        let identity_keys = state.identity_keys.clone();
        let registered = self
            .with_platform_retry(|| {
                let platform = self.platform.clone();
                let identity_keys = identity_keys.clone();
                let proof = proof.clone();
                let asset_lock_key = asset_lock_key.clone();
                let signer = signer.clone();
                async move {
                    platform
                        .create_identity(&identity_keys, &proof, &asset_lock_key, &signer)
                        .await
                }
            })
            .await?;

        tracing::info!(identity_id = %registered.id, "identity registered");
        Ok(state.completed(Some(registered.id)))
    }
}
