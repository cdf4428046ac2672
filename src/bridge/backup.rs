//! The key-backup artifact: a single JSON file holding everything needed
//! to recover funds if the session dies between key generation and
//! completion. It is written right after keys are generated and refreshed
//! once the txid and identity id are known; with no on-device storage, it
//! is the only recovery path.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::bridge::BridgeMode;
use crate::bridge::state::BridgeState;
use crate::config::NetworkParams;
use crate::model::qualified_identity::IdentityKey;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyBackup {
    pub network: String,
    pub created: String,
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deposit_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mnemonic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub identity_keys: Vec<IdentityKeyBackup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_lock_key: Option<AssetLockKeyBackup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_identity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_platform_address: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityKeyBackup {
    pub id: u32,
    pub name: String,
    pub key_type: String,
    pub purpose: String,
    pub security_level: String,
    pub private_key_wif: String,
    pub private_key_hex: String,
    pub public_key_hex: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derivation_path: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetLockKeyBackup {
    pub wif: String,
    pub public_key_hex: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derivation_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl KeyBackup {
    pub fn from_state(state: &BridgeState, params: &NetworkParams) -> Self {
        let asset_lock_key = state.asset_lock_key.as_ref().map(|pair| {
            let (derivation_path, note) = match state.mode {
                BridgeMode::Create => (state.asset_lock_derivation_path.clone(), None),
                _ => (
                    None,
                    Some("One-time key, not derived from any mnemonic.".to_string()),
                ),
            };
            AssetLockKeyBackup {
                wif: pair.to_wif(params),
                public_key_hex: pair.public_key_hex(),
                derivation_path,
                note,
            }
        });

        let (target_identity_id, recipient_platform_address) = match &state.mode {
            BridgeMode::TopUp { target_identity_id } => {
                (Some(target_identity_id.clone()), None)
            }
            BridgeMode::FundAddress { address, .. } => (None, Some(address.clone())),
            BridgeMode::SendToAddress { recipient_address } => {
                (None, Some(recipient_address.clone()))
            }
            _ => (None, None),
        };

        KeyBackup {
            network: params.network.to_string(),
            created: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            mode: state.mode.as_str().to_string(),
            deposit_address: state.deposit_address.clone(),
            txid: state.broadcast_txid.clone(),
            mnemonic: state.mnemonic.clone(),
            identity_id: state.identity_id.clone(),
            identity_keys: state
                .identity_keys
                .iter()
                .map(|key| IdentityKeyBackup::from_key(key, params))
                .collect(),
            asset_lock_key,
            target_identity_id,
            recipient_platform_address,
        }
    }

    /// Filename per mode: the identity file once the id is known, recovery
    /// files for the targeted modes, a pending file otherwise.
    pub fn file_name(&self) -> String {
        match self.mode.as_str() {
            "create" => match &self.identity_id {
                Some(id) => format!("dash-identity-{id}.json"),
                None => self.pending_file_name(),
            },
            "topup" => {
                let target = self.target_identity_id.as_deref().unwrap_or("unknown");
                let first8: String = target.chars().take(8).collect();
                format!("dash-topup-{first8}-recovery.json")
            }
            "sendToAddress" => {
                let recipient = self
                    .recipient_platform_address
                    .as_deref()
                    .unwrap_or("unknown");
                let last8: String = recipient
                    .chars()
                    .rev()
                    .take(8)
                    .collect::<Vec<_>>()
                    .into_iter()
                    .rev()
                    .collect();
                format!("dash-send-to-address-{last8}-recovery.json")
            }
            _ => self.pending_file_name(),
        }
    }

    fn pending_file_name(&self) -> String {
        let address = self.deposit_address.as_deref().unwrap_or("unknown");
        let prefix: String = address.chars().take(6).collect();
        let suffix: String = address
            .chars()
            .rev()
            .take(6)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("dash-keys-{prefix}-{suffix}-pending.json")
    }
}

impl IdentityKeyBackup {
    fn from_key(key: &IdentityKey, params: &NetworkParams) -> Self {
        IdentityKeyBackup {
            id: key.id,
            name: key.name.clone(),
            key_type: key.key_type.to_string(),
            purpose: key.purpose.to_string(),
            security_level: key.security_level.to_string(),
            private_key_wif: key.key_pair.to_wif(params),
            private_key_hex: hex::encode(key.key_pair.secret_bytes()),
            public_key_hex: key.key_pair.public_key_hex(),
            derivation_path: key.derivation_path.clone(),
        }
    }
}

/// Serializes the backup for `state` into `dir`, returning the full path.
pub fn write_backup(
    state: &BridgeState,
    params: &NetworkParams,
    dir: &Path,
) -> io::Result<PathBuf> {
    let backup = KeyBackup::from_state(state, params);
    let path = dir.join(backup.file_name());
    let json = serde_json::to_string_pretty(&backup).map_err(io::Error::other)?;
    fs::write(&path, json)?;
    tracing::info!(path = %path.display(), "key backup written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::BridgeStep;
    use crate::config::Network;
    use crate::model::wallet::{Wallet, WordCount};

    fn create_state() -> (BridgeState, NetworkParams) {
        let params = NetworkParams::testnet();
        let wallet = Wallet::generate(WordCount::Twelve).unwrap();
        let asset_lock_key = wallet.asset_lock_key_pair(params.coin_type).unwrap();
        let identity_keys =
            crate::bridge::register_identity::default_identity_key_set(&wallet, params.coin_type)
                .unwrap();
        let address = asset_lock_key.address(&params);
        let state = BridgeState::new(Network::Testnet, BridgeMode::Create)
            .with_step(BridgeStep::GeneratingKeys)
            .keys_generated(
                Some(wallet.mnemonic_phrase()),
                asset_lock_key,
                Some(Wallet::asset_lock_derivation_path(params.coin_type)),
                identity_keys,
                address,
            );
        (state, params)
    }

    #[test]
    fn create_backup_carries_mnemonic_and_keys() {
        let (state, params) = create_state();
        let backup = KeyBackup::from_state(&state, &params);
        assert_eq!(backup.network, "testnet");
        assert_eq!(backup.mode, "create");
        assert!(backup.mnemonic.is_some());
        assert_eq!(backup.identity_keys.len(), 4);
        assert_eq!(backup.identity_keys[0].purpose, "AUTHENTICATION");
        assert_eq!(backup.identity_keys[0].security_level, "MASTER");
        assert_eq!(backup.identity_keys[3].purpose, "TRANSFER");
        let asset_key = backup.asset_lock_key.as_ref().unwrap();
        assert_eq!(asset_key.derivation_path.as_deref(), Some("m/44'/1'/0'/0/0"));
        assert!(asset_key.note.is_none());
    }

    #[test]
    fn pending_and_identity_file_names() {
        let (state, params) = create_state();
        let backup = KeyBackup::from_state(&state, &params);
        let name = backup.file_name();
        assert!(name.starts_with("dash-keys-"), "got {name}");
        assert!(name.ends_with("-pending.json"));

        let state = state.completed(Some("5rvkQFTCkCSvMok5BmeprguuCZfp7ZSmKNKWEXnYZ6d8".into()));
        let backup = KeyBackup::from_state(&state, &params);
        assert_eq!(
            backup.file_name(),
            "dash-identity-5rvkQFTCkCSvMok5BmeprguuCZfp7ZSmKNKWEXnYZ6d8.json"
        );
    }

    #[test]
    fn topup_backup_uses_one_time_key_note() {
        let params = NetworkParams::testnet();
        let key = crate::model::wallet::key_pair::KeyPair::generate();
        let address = key.address(&params);
        let state = BridgeState::new(
            Network::Testnet,
            BridgeMode::TopUp {
                target_identity_id: "target11111111111111111111111111111111111111".into(),
            },
        )
        .keys_generated(None, key, None, vec![], address);

        let backup = KeyBackup::from_state(&state, &params);
        assert!(backup.mnemonic.is_none());
        assert!(backup.identity_keys.is_empty());
        assert_eq!(
            backup.target_identity_id.as_deref(),
            Some("target11111111111111111111111111111111111111")
        );
        let asset_key = backup.asset_lock_key.as_ref().unwrap();
        assert!(asset_key.note.is_some());
        assert!(asset_key.derivation_path.is_none());
        assert_eq!(backup.file_name(), "dash-topup-target11-recovery.json");
    }

    #[test]
    fn send_backup_file_name_uses_recipient_suffix() {
        let params = NetworkParams::testnet();
        let key = crate::model::wallet::key_pair::KeyPair::generate();
        let address = key.address(&params);
        let state = BridgeState::new(
            Network::Testnet,
            BridgeMode::SendToAddress {
                recipient_address: "tdash1qqqqqqqqqqqqqqqqqrecipient0".into(),
            },
        )
        .keys_generated(None, key, None, vec![], address);

        let backup = KeyBackup::from_state(&state, &params);
        assert_eq!(
            backup.file_name(),
            "dash-send-to-address-cipient0-recovery.json"
        );
    }

    #[test]
    fn write_and_reparse_round_trip() {
        let (state, params) = create_state();
        let dir = tempfile::tempdir().unwrap();
        let path = write_backup(&state, &params, dir.path()).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(value["network"], "testnet");
        assert_eq!(value["mode"], "create");
        assert!(value["identityKeys"].as_array().unwrap().len() == 4);
        assert!(value["assetLockKey"]["wif"].is_string());
        assert!(value["created"].as_str().unwrap().ends_with('Z'));
    }
}
