//! The session's single state value. Every transition consumes the old
//! state and returns a new one; nothing here touches the network.

use crate::bridge::{BridgeMode, BridgeStep};
use crate::config::Network;
use crate::model::qualified_identity::IdentityKey;
use crate::model::utxo::Utxo;
use crate::model::wallet::key_pair::KeyPair;
use crate::transaction::proof::AssetLockProof;

#[derive(Debug, Clone)]
pub struct BridgeState {
    pub network: Network,
    pub mode: BridgeMode,
    pub step: BridgeStep,
    pub mnemonic: Option<String>,
    pub asset_lock_key: Option<KeyPair>,
    pub asset_lock_derivation_path: Option<String>,
    pub identity_keys: Vec<IdentityKey>,
    pub deposit_address: Option<String>,
    pub detected_utxo: Option<Utxo>,
    pub detected_deposit_amount: u64,
    pub deposit_timed_out: bool,
    pub signed_tx_hex: Option<String>,
    pub broadcast_txid: Option<String>,
    pub islock_bytes: Option<Vec<u8>>,
    pub asset_lock_proof: Option<AssetLockProof>,
    pub identity_id: Option<String>,
    pub last_error: Option<String>,
}

impl BridgeState {
    pub fn new(network: Network, mode: BridgeMode) -> Self {
        BridgeState {
            network,
            mode,
            step: BridgeStep::Init,
            mnemonic: None,
            asset_lock_key: None,
            asset_lock_derivation_path: None,
            identity_keys: Vec::new(),
            deposit_address: None,
            detected_utxo: None,
            detected_deposit_amount: 0,
            deposit_timed_out: false,
            signed_tx_hex: None,
            broadcast_txid: None,
            islock_bytes: None,
            asset_lock_proof: None,
            identity_id: None,
            last_error: None,
        }
    }

    /// Switching networks in `init` starts over: all key material and
    /// progress is dropped, only the new network survives.
    pub fn reset_for_network(self, network: Network) -> Self {
        BridgeState::new(network, self.mode)
    }

    pub fn with_step(mut self, step: BridgeStep) -> Self {
        self.step = step;
        self
    }

    pub fn keys_generated(
        mut self,
        mnemonic: Option<String>,
        asset_lock_key: KeyPair,
        derivation_path: Option<String>,
        identity_keys: Vec<IdentityKey>,
        deposit_address: String,
    ) -> Self {
        self.mnemonic = mnemonic;
        self.asset_lock_key = Some(asset_lock_key);
        self.asset_lock_derivation_path = derivation_path;
        self.identity_keys = identity_keys;
        self.deposit_address = Some(deposit_address);
        self.step = BridgeStep::DetectingDeposit;
        self
    }

    pub fn deposit_detected(mut self, utxo: Utxo, total_amount: u64) -> Self {
        self.detected_utxo = Some(utxo);
        self.detected_deposit_amount = total_amount;
        self.deposit_timed_out = false;
        self.step = BridgeStep::BuildingTransaction;
        self
    }

    /// A deposit timeout is not an error: the keypair, address and the
    /// partial amount survive so a recheck can resume the pipeline.
    pub fn deposit_wait_timed_out(mut self, total_amount: u64) -> Self {
        self.detected_deposit_amount = total_amount;
        self.deposit_timed_out = true;
        self.step = BridgeStep::DetectingDeposit;
        self
    }

    /// Re-enters the deposit wait with the same keys and address.
    pub fn recheck(mut self) -> Self {
        self.deposit_timed_out = false;
        self.step = BridgeStep::DetectingDeposit;
        self
    }

    pub fn transaction_signed(mut self, signed_tx_hex: String) -> Self {
        self.signed_tx_hex = Some(signed_tx_hex);
        self.step = BridgeStep::Broadcasting;
        self
    }

    pub fn broadcast_accepted(mut self, txid: String) -> Self {
        self.broadcast_txid = Some(txid);
        self.step = BridgeStep::WaitingIslock;
        self
    }

    pub fn islock_received(mut self, islock_bytes: Vec<u8>, proof: AssetLockProof) -> Self {
        self.islock_bytes = Some(islock_bytes);
        self.asset_lock_proof = Some(proof);
        self
    }

    pub fn completed(mut self, identity_id: Option<String>) -> Self {
        if identity_id.is_some() {
            self.identity_id = identity_id;
        }
        self.step = BridgeStep::Complete;
        self
    }

    /// Terminal failure; the error text is preserved for display.
    pub fn failed(mut self, message: impl Into<String>) -> Self {
        self.last_error = Some(message.into());
        self.step = BridgeStep::Error;
        self
    }

    /// "Try Again" from the error screen: back to a fresh `init` on the
    /// same network. Session secrets are gone; recovery is the backup file.
    pub fn try_again(self) -> Self {
        BridgeState::new(self.network, self.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Network;

    fn keyed_state() -> BridgeState {
        let pair = KeyPair::from_secret_bytes(&[9; 32]).unwrap();
        BridgeState::new(Network::Testnet, BridgeMode::Create)
            .with_step(BridgeStep::GeneratingKeys)
            .keys_generated(
                Some("m".into()),
                pair,
                Some("m/44'/1'/0'/0/0".into()),
                vec![],
                "yDepositAddress".into(),
            )
    }

    #[test]
    fn deposit_timeout_keeps_key_material() {
        let state = keyed_state();
        let key_before = state.asset_lock_key.clone().unwrap();
        let address_before = state.deposit_address.clone().unwrap();

        let state = state.deposit_wait_timed_out(120_000);
        assert!(state.deposit_timed_out);
        assert_eq!(state.step, BridgeStep::DetectingDeposit);
        assert_eq!(state.detected_deposit_amount, 120_000);

        let state = state.recheck();
        assert!(!state.deposit_timed_out);
        assert_eq!(state.asset_lock_key.unwrap(), key_before);
        assert_eq!(state.deposit_address.unwrap(), address_before);
    }

    #[test]
    fn network_reset_drops_secrets() {
        let state = keyed_state().reset_for_network(Network::Mainnet);
        assert_eq!(state.network, Network::Mainnet);
        assert_eq!(state.step, BridgeStep::Init);
        assert!(state.mnemonic.is_none());
        assert!(state.asset_lock_key.is_none());
        assert!(state.deposit_address.is_none());
    }

    #[test]
    fn error_is_terminal_and_preserved() {
        let state = keyed_state().failed("islock timed out");
        assert_eq!(state.step, BridgeStep::Error);
        assert_eq!(state.last_error.as_deref(), Some("islock timed out"));

        let state = state.try_again();
        assert_eq!(state.step, BridgeStep::Init);
        assert!(state.last_error.is_none());
        assert!(state.mnemonic.is_none());
    }

    #[test]
    fn happy_path_steps() {
        let utxo = Utxo {
            txid: "aa".repeat(32),
            vout: 0,
            satoshis: 500_000,
            script_pub_key: String::new(),
            confirmations: 1,
        };
        let state = keyed_state()
            .deposit_detected(utxo, 500_000)
            .with_step(BridgeStep::SigningTransaction)
            .transaction_signed("0300...".into())
            .broadcast_accepted("ff".repeat(32))
            .islock_received(vec![1], AssetLockProof::new(vec![2], vec![1], 0))
            .completed(Some("id".into()));
        assert_eq!(state.step, BridgeStep::Complete);
        assert_eq!(state.identity_id.as_deref(), Some("id"));
        assert!(state.asset_lock_proof.is_some());
    }
}
