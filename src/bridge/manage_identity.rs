//! Manage mode: add or disable keys on an existing identity. The update
//! must be signed with a MASTER-level key, and every added key's private
//! half must be in the signer for its ownership proof.

use crate::bridge::state::BridgeState;
use crate::bridge::{BridgeError, BridgeEvent, BridgeMode, BridgeStep};
use crate::context::BridgeContext;
use crate::model::qualified_identity::qualified_identity_public_key::find_matching_key;
use crate::model::qualified_identity::{
    IdentityKey, KeyType, KeyValidationError, Purpose, SecurityLevel,
    validate_key_for_identity_update,
};
use crate::model::wallet::key_pair::{KeyPair, wif_to_private_key};
use crate::platform::{BridgeSigner, PlatformError};

impl BridgeContext {
    pub(super) async fn update_identity_keys(
        &self,
        state: BridgeState,
    ) -> Result<BridgeState, BridgeError> {
        let state = state.with_step(BridgeStep::UpdatingIdentity);
        self.emit(BridgeEvent::StepChanged(BridgeStep::UpdatingIdentity))?;

        let BridgeMode::Manage {
            identity_id,
            master_key_wif,
            add_keys,
            disable_key_ids,
        } = &state.mode
        else {
            unreachable!("update_identity_keys is only dispatched in manage mode");
        };

        let identity = self
            .platform
            .fetch_identity(identity_id)
            .await?
            .ok_or_else(|| PlatformError::IdentityNotFound(identity_id.clone()))?;

        let matched = find_matching_key(master_key_wif, &identity.public_keys, &self.params)?;
        validate_key_for_identity_update(matched.security_level)?;

        for key_id in disable_key_ids {
            if !identity.public_keys.iter().any(|key| key.id == *key_id) {
                return Err(PlatformError::Sdk(format!(
                    "identity has no key with id {key_id} to disable"
                ))
                .into());
            }
        }

        // New keys get fresh random pairs and the next free ids. The call
        // path rejects a TRANSFER key below CRITICAL outright; only the
        // state-update path normalizes.
        let mut next_id = identity
            .public_keys
            .iter()
            .map(|key| key.id)
            .max()
            .map_or(0, |max| max + 1);
        let mut added = Vec::with_capacity(add_keys.len());
        for request in add_keys {
            if request.purpose == Purpose::TRANSFER
                && request.security_level != SecurityLevel::CRITICAL
            {
                return Err(KeyValidationError::KeySecurityLevelNotAllowed(
                    request.security_level.to_string(),
                )
                .into());
            }
            added.push(IdentityKey::new(
                next_id,
                format!("Added Key {next_id}"),
                KeyType::ECDSA_SECP256K1,
                request.purpose,
                request.security_level,
                KeyPair::generate(),
                None,
            ));
            next_id += 1;
        }

        let mut signer = BridgeSigner::from_identity_keys(&added);
        let master_pair = KeyPair::from_secret_key(wif_to_private_key(master_key_wif)?.secret_key);
        signer.insert(matched.key_id, master_pair);

        let updated = self
            .with_platform_retry(|| {
                let platform = self.platform.clone();
                let identity = identity.clone();
                let signer = signer.clone();
                let added = added.clone();
                let disable = disable_key_ids.clone();
                async move {
                    platform
                        .update_identity(&identity, &signer, &added, &disable)
                        .await
                }
            })
            .await?;

        tracing::info!(
            identity_id = %updated.id,
            added = added.len(),
            disabled = disable_key_ids.len(),
            "identity keys updated"
        );
        Ok(state.completed(Some(updated.id)))
    }
}
