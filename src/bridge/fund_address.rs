//! Fund-address mode's final stage: move the proof's credits to a platform
//! address the operator controls. When the operator supplied the address
//! key as a WIF, the signer carries it to prove ownership.

use crate::bridge::state::BridgeState;
use crate::bridge::{BridgeError, BridgeEvent, BridgeMode, BridgeStep};
use crate::context::BridgeContext;
use crate::model::qualified_identity::KeyValidationError;
use crate::model::wallet::key_pair::{KeyPair, wif_to_private_key};
use crate::platform::address::PlatformAddress;
use crate::platform::{BridgeSigner, DUFFS_PER_CREDIT, PlatformTransferOutput};

impl BridgeContext {
    pub(super) async fn fund_address(&self, state: BridgeState) -> Result<BridgeState, BridgeError> {
        let state = state.with_step(BridgeStep::FundingAddress);
        self.emit(BridgeEvent::StepChanged(BridgeStep::FundingAddress))?;

        let BridgeMode::FundAddress {
            address,
            address_wif,
        } = &state.mode
        else {
            unreachable!("fund_address is only dispatched in fundAddress mode");
        };

        let address = PlatformAddress::parse(address, &self.params)?;
        let signer = match address_wif {
            Some(wif) => {
                let decoded = wif_to_private_key(wif)?;
                if decoded.prefix != self.params.wif_prefix {
                    return Err(KeyValidationError::WifNetworkMismatch.into());
                }
                let mut signer = BridgeSigner::empty();
                signer.insert(0, KeyPair::from_secret_key(decoded.secret_key));
                signer
            }
            None => BridgeSigner::empty(),
        };

        self.transfer_locked_credits(&state, address, signer).await?;
        Ok(state.completed(None))
    }

    /// Shared leg of the two address-funding modes: one transfer output
    /// carrying the full locked amount, denominated in credits.
    pub(super) async fn transfer_locked_credits(
        &self,
        state: &BridgeState,
        address: PlatformAddress,
        signer: BridgeSigner,
    ) -> Result<(), BridgeError> {
        let proof = state
            .asset_lock_proof
            .clone()
            .expect("islock_received sets the proof");
        let asset_lock_key = state
            .asset_lock_key
            .clone()
            .expect("keys_generated sets the asset lock key");
        let utxo = state
            .detected_utxo
            .as_ref()
            .expect("deposit_detected sets the utxo");

        let locked_duffs = utxo.satoshis - self.params.min_fee;
        // Floor division: a sub-credit remainder stays with the burn.
        let amount_credits = locked_duffs / DUFFS_PER_CREDIT;
        let outputs = vec![PlatformTransferOutput {
            address,
            amount_credits,
        }];

        self.with_platform_retry(|| {
            let platform = self.platform.clone();
            let proof = proof.clone();
            let asset_lock_key = asset_lock_key.clone();
            let outputs = outputs.clone();
            let signer = signer.clone();
            async move {
                platform
                    .fund_from_asset_lock(&proof, &asset_lock_key, &outputs, &signer)
                    .await
            }
        })
        .await?;

        tracing::info!(
            credits = amount_credits,
            "locked value transferred to platform address"
        );
        Ok(())
    }
}
