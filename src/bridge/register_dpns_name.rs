//! DPNS mode: register a name for an existing identity. A thin
//! orchestration of Platform calls, gated by the signing-key rules.

use crate::bridge::state::BridgeState;
use crate::bridge::{BridgeError, BridgeEvent, BridgeMode, BridgeStep};
use crate::context::BridgeContext;
use crate::model::qualified_identity::qualified_identity_public_key::find_matching_key;
use crate::model::qualified_identity::validate_key_for_dpns_registration;
use crate::platform::dpns::is_contested_name;
use crate::platform::{PlatformError, RegisterNameRequest};

impl BridgeContext {
    pub(super) async fn register_dpns_name(
        &self,
        state: BridgeState,
    ) -> Result<BridgeState, BridgeError> {
        let state = state.with_step(BridgeStep::RegisteringName);
        self.emit(BridgeEvent::StepChanged(BridgeStep::RegisteringName))?;

        let BridgeMode::Dpns {
            label,
            identity_id,
            private_key_wif,
        } = &state.mode
        else {
            unreachable!("register_dpns_name is only dispatched in dpns mode");
        };

        let identity = self
            .platform
            .fetch_identity(identity_id)
            .await?
            .ok_or_else(|| PlatformError::IdentityNotFound(identity_id.clone()))?;

        let matched = find_matching_key(private_key_wif, &identity.public_keys, &self.params)?;
        validate_key_for_dpns_registration(matched.purpose, matched.security_level)?;

        if is_contested_name(label) {
            self.emit(BridgeEvent::NameContested {
                label: label.clone(),
            })?;
        }

        if !self.platform.is_name_available(label).await? {
            return Err(PlatformError::NameTaken(label.clone()).into());
        }

        let request = RegisterNameRequest {
            label: label.clone(),
            identity_id: identity.id.clone(),
            identity_key_id: matched.key_id,
        };
        self.with_platform_retry(|| {
            let platform = self.platform.clone();
            let request = request.clone();
            async move { platform.register_name(&request).await }
        })
        .await?;

        tracing::info!(%label, identity_id = %identity.id, "DPNS name registered");
        Ok(state.completed(Some(identity.id)))
    }
}
