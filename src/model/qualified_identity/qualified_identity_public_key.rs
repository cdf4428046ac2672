//! On-chain identity public keys as fetched from Platform, and the matching
//! of a user-supplied WIF against them.

use secp256k1::{PublicKey, Secp256k1};

use crate::config::NetworkParams;
use crate::hashes;
use crate::model::qualified_identity::{KeyType, KeyValidationError, Purpose, SecurityLevel};
use crate::model::wallet::WalletError;
use crate::model::wallet::key_pair::wif_to_private_key;

/// One public key of a fetched identity.
#[derive(Debug, Clone, PartialEq)]
pub struct QualifiedIdentityPublicKey {
    pub id: u32,
    pub key_type: KeyType,
    pub purpose: Purpose,
    pub security_level: SecurityLevel,
    /// 33 bytes for SECP256K1 keys, 20 bytes for HASH160 keys.
    pub data: Vec<u8>,
    pub disabled_at: Option<u64>,
}

/// The on-chain key a private key was matched against.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedKey {
    pub key_id: u32,
    pub purpose: Purpose,
    pub security_level: SecurityLevel,
    pub public_key: [u8; 33],
}

#[derive(Debug, thiserror::Error)]
pub enum KeyMatchError {
    #[error(transparent)]
    InvalidWif(#[from] WalletError),
    #[error(transparent)]
    Validation(#[from] KeyValidationError),
}

/// Finds the first identity key whose public half corresponds to `wif`.
/// The WIF must carry the session network's prefix byte; keys of other
/// types are skipped; a HASH160 key matches on hash160 of the pubkey.
pub fn find_matching_key(
    wif: &str,
    identity_keys: &[QualifiedIdentityPublicKey],
    params: &NetworkParams,
) -> Result<MatchedKey, KeyMatchError> {
    let decoded = wif_to_private_key(wif)?;
    if decoded.prefix != params.wif_prefix {
        return Err(KeyValidationError::WifNetworkMismatch.into());
    }

    let secp = Secp256k1::new();
    let public_key: [u8; 33] = PublicKey::from_secret_key(&secp, &decoded.secret_key).serialize();
    let public_key_hash = hashes::hash160(&public_key);

    for key in identity_keys {
        let matches = match key.key_type {
            KeyType::ECDSA_SECP256K1 => key.data == public_key,
            KeyType::ECDSA_HASH160 => key.data == public_key_hash,
        };
        if matches {
            return Ok(MatchedKey {
                key_id: key.id,
                purpose: key.purpose,
                security_level: key.security_level,
                public_key,
            });
        }
    }
    Err(KeyValidationError::NoMatchingKey.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::wallet::key_pair::{KeyPair, private_key_to_wif};

    fn identity_key(
        id: u32,
        key_type: KeyType,
        purpose: Purpose,
        security_level: SecurityLevel,
        pair: &KeyPair,
    ) -> QualifiedIdentityPublicKey {
        let data = match key_type {
            KeyType::ECDSA_SECP256K1 => pair.public_key_bytes().to_vec(),
            KeyType::ECDSA_HASH160 => pair.pubkey_hash().to_vec(),
        };
        QualifiedIdentityPublicKey {
            id,
            key_type,
            purpose,
            security_level,
            data,
            disabled_at: None,
        }
    }

    #[test]
    fn matches_secp256k1_and_hash160_keys() {
        let params = NetworkParams::testnet();
        let master = KeyPair::from_secret_bytes(&[0x51; 32]).unwrap();
        let transfer = KeyPair::from_secret_bytes(&[0x52; 32]).unwrap();
        let keys = vec![
            identity_key(
                0,
                KeyType::ECDSA_SECP256K1,
                Purpose::AUTHENTICATION,
                SecurityLevel::MASTER,
                &master,
            ),
            identity_key(
                1,
                KeyType::ECDSA_HASH160,
                Purpose::TRANSFER,
                SecurityLevel::CRITICAL,
                &transfer,
            ),
        ];

        let matched = find_matching_key(&master.to_wif(&params), &keys, &params).unwrap();
        assert_eq!(matched.key_id, 0);
        assert_eq!(matched.security_level, SecurityLevel::MASTER);

        let matched = find_matching_key(&transfer.to_wif(&params), &keys, &params).unwrap();
        assert_eq!(matched.key_id, 1);
        assert_eq!(matched.purpose, Purpose::TRANSFER);
    }

    #[test]
    fn unrelated_key_yields_no_match() {
        let params = NetworkParams::testnet();
        let known = KeyPair::from_secret_bytes(&[0x53; 32]).unwrap();
        let stranger = KeyPair::from_secret_bytes(&[0x54; 32]).unwrap();
        let keys = vec![identity_key(
            0,
            KeyType::ECDSA_SECP256K1,
            Purpose::AUTHENTICATION,
            SecurityLevel::MASTER,
            &known,
        )];

        let err = find_matching_key(&stranger.to_wif(&params), &keys, &params).unwrap_err();
        assert!(matches!(
            err,
            KeyMatchError::Validation(KeyValidationError::NoMatchingKey)
        ));
    }

    #[test]
    fn wrong_network_wif_is_rejected_before_matching() {
        let testnet = NetworkParams::testnet();
        let pair = KeyPair::from_secret_bytes(&[0x55; 32]).unwrap();
        let keys = vec![identity_key(
            0,
            KeyType::ECDSA_SECP256K1,
            Purpose::AUTHENTICATION,
            SecurityLevel::MASTER,
            &pair,
        )];

        // Mainnet-prefixed WIF while the session runs on testnet.
        let mainnet_wif = private_key_to_wif(pair.secret_key(), 204, true);
        let err = find_matching_key(&mainnet_wif, &keys, &testnet).unwrap_err();
        assert!(matches!(
            err,
            KeyMatchError::Validation(KeyValidationError::WifNetworkMismatch)
        ));
    }
}
