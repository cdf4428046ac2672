//! Top-up mode's final stage: credit an existing identity from the proof.
//! The identity is fetched first; topping up an id that does not exist is
//! an error, not an implicit create.

use crate::bridge::state::BridgeState;
use crate::bridge::{BridgeError, BridgeEvent, BridgeMode, BridgeStep};
use crate::context::BridgeContext;
use crate::platform::PlatformError;

impl BridgeContext {
    pub(super) async fn top_up_identity(
        &self,
        state: BridgeState,
    ) -> Result<BridgeState, BridgeError> {
        let state = state.with_step(BridgeStep::ToppingUp);
        self.emit(BridgeEvent::StepChanged(BridgeStep::ToppingUp))?;

        let BridgeMode::TopUp { target_identity_id } = &state.mode else {
            unreachable!("top_up_identity is only dispatched in topup mode");
        };

        let identity = self
            .platform
            .fetch_identity(target_identity_id)
            .await?
            .ok_or_else(|| PlatformError::IdentityNotFound(target_identity_id.clone()))?;

        let proof = state
            .asset_lock_proof
            .clone()
            .expect("islock_received sets the proof");
        let asset_lock_key = state
            .asset_lock_key
            .clone()
            .expect("keys_generated sets the asset lock key");

        let new_balance = self
            .with_platform_retry(|| {
                let platform = self.platform.clone();
                let identity = identity.clone();
                let proof = proof.clone();
                let asset_lock_key = asset_lock_key.clone();
                async move {
                    platform
                        .top_up_identity(&identity, &proof, &asset_lock_key)
                        .await
                }
            })
            .await?;

        tracing::info!(
            identity_id = %identity.id,
            balance = new_balance,
            "identity topped up"
        );
        Ok(state.completed(Some(identity.id)))
    }
}
