//! Send mode's final stage: credits go to a third-party platform address.
//! The signer is empty on purpose: the recipient does not sign to receive.

use crate::bridge::state::BridgeState;
use crate::bridge::{BridgeError, BridgeEvent, BridgeMode, BridgeStep};
use crate::context::BridgeContext;
use crate::platform::BridgeSigner;
use crate::platform::address::PlatformAddress;

impl BridgeContext {
    pub(super) async fn send_to_address(
        &self,
        state: BridgeState,
    ) -> Result<BridgeState, BridgeError> {
        let state = state.with_step(BridgeStep::SendingToAddress);
        self.emit(BridgeEvent::StepChanged(BridgeStep::SendingToAddress))?;

        let BridgeMode::SendToAddress { recipient_address } = &state.mode else {
            unreachable!("send_to_address is only dispatched in sendToAddress mode");
        };

        let recipient = PlatformAddress::parse(recipient_address, &self.params)?;
        self.transfer_locked_credits(&state, recipient, BridgeSigner::empty())
            .await?;
        Ok(state.completed(None))
    }
}
