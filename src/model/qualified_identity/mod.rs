//! Identity key material: the typed key model shared by identity creation,
//! update and DPNS flows, and the purpose/security-level rules each
//! operation enforces.

pub mod qualified_identity_public_key;

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use crate::model::wallet::key_pair::KeyPair;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum KeyType {
    ECDSA_SECP256K1,
    ECDSA_HASH160,
}

impl Display for KeyType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyType::ECDSA_SECP256K1 => write!(f, "ECDSA_SECP256K1"),
            KeyType::ECDSA_HASH160 => write!(f, "ECDSA_HASH160"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum Purpose {
    AUTHENTICATION,
    ENCRYPTION,
    DECRYPTION,
    TRANSFER,
    VOTING,
    OWNER,
}

impl Display for Purpose {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Purpose::AUTHENTICATION => "AUTHENTICATION",
            Purpose::ENCRYPTION => "ENCRYPTION",
            Purpose::DECRYPTION => "DECRYPTION",
            Purpose::TRANSFER => "TRANSFER",
            Purpose::VOTING => "VOTING",
            Purpose::OWNER => "OWNER",
        };
        f.write_str(s)
    }
}

/// Lower value means higher privilege; MASTER is 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[allow(non_camel_case_types)]
pub enum SecurityLevel {
    MASTER,
    CRITICAL,
    HIGH,
    MEDIUM,
}

impl Display for SecurityLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SecurityLevel::MASTER => "MASTER",
            SecurityLevel::CRITICAL => "CRITICAL",
            SecurityLevel::HIGH => "HIGH",
            SecurityLevel::MEDIUM => "MEDIUM",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum KeyValidationError {
    #[error("key purpose {0} is not allowed for this operation")]
    KeyPurposeNotAllowed(String),
    #[error("key security level {0} is not allowed for this operation")]
    KeySecurityLevelNotAllowed(String),
    #[error("the WIF belongs to a different network")]
    WifNetworkMismatch,
    #[error("no identity key matches the supplied private key")]
    NoMatchingKey,
    #[error("identity key ids must be unique, id {0} repeats")]
    DuplicateKeyId(u32),
}

/// A key the session holds both halves of, destined for an identity.
#[derive(Debug, Clone)]
pub struct IdentityKey {
    pub id: u32,
    pub name: String,
    pub key_type: KeyType,
    pub purpose: Purpose,
    pub security_level: SecurityLevel,
    pub key_pair: KeyPair,
    pub derivation_path: Option<String>,
}

impl IdentityKey {
    /// Builds a key, normalizing TRANSFER-purpose keys to CRITICAL. The
    /// platform call path rejects the combination instead; here it is
    /// silently coerced so state updates cannot produce an invalid key.
    pub fn new(
        id: u32,
        name: impl Into<String>,
        key_type: KeyType,
        purpose: Purpose,
        security_level: SecurityLevel,
        key_pair: KeyPair,
        derivation_path: Option<String>,
    ) -> Self {
        let security_level = if purpose == Purpose::TRANSFER && security_level != SecurityLevel::CRITICAL
        {
            tracing::debug!(
                id,
                requested = %security_level,
                "normalizing TRANSFER key to CRITICAL security level"
            );
            SecurityLevel::CRITICAL
        } else {
            security_level
        };
        IdentityKey {
            id,
            name: name.into(),
            key_type,
            purpose,
            security_level,
            key_pair,
            derivation_path,
        }
    }

    /// The encoded payload data of the public key: the compressed pubkey
    /// itself for SECP256K1 keys, its hash160 for HASH160 keys.
    pub fn payload_data(&self) -> Vec<u8> {
        match self.key_type {
            KeyType::ECDSA_SECP256K1 => self.key_pair.public_key_bytes().to_vec(),
            KeyType::ECDSA_HASH160 => self.key_pair.pubkey_hash().to_vec(),
        }
    }
}

/// Ids within one identity must be unique.
pub fn validate_key_ids(keys: &[IdentityKey]) -> Result<(), KeyValidationError> {
    let mut seen = BTreeSet::new();
    for key in keys {
        if !seen.insert(key.id) {
            return Err(KeyValidationError::DuplicateKeyId(key.id));
        }
    }
    Ok(())
}

/// Identity updates (adding or disabling keys) must be signed with a
/// MASTER-level key.
pub fn validate_key_for_identity_update(
    security_level: SecurityLevel,
) -> Result<(), KeyValidationError> {
    if security_level != SecurityLevel::MASTER {
        return Err(KeyValidationError::KeySecurityLevelNotAllowed(
            security_level.to_string(),
        ));
    }
    Ok(())
}

/// DPNS registrations must be signed with an AUTHENTICATION key at
/// CRITICAL or HIGH security level.
pub fn validate_key_for_dpns_registration(
    purpose: Purpose,
    security_level: SecurityLevel,
) -> Result<(), KeyValidationError> {
    if purpose != Purpose::AUTHENTICATION {
        return Err(KeyValidationError::KeyPurposeNotAllowed(
            purpose.to_string(),
        ));
    }
    if !matches!(
        security_level,
        SecurityLevel::CRITICAL | SecurityLevel::HIGH
    ) {
        return Err(KeyValidationError::KeySecurityLevelNotAllowed(
            security_level.to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: u32, purpose: Purpose, level: SecurityLevel) -> IdentityKey {
        IdentityKey::new(
            id,
            format!("key-{id}"),
            KeyType::ECDSA_SECP256K1,
            purpose,
            level,
            KeyPair::from_secret_bytes(&[id as u8 + 1; 32]).unwrap(),
            None,
        )
    }

    #[test]
    fn transfer_purpose_is_coerced_to_critical() {
        let k = key(0, Purpose::TRANSFER, SecurityLevel::MEDIUM);
        assert_eq!(k.security_level, SecurityLevel::CRITICAL);
        let k = key(1, Purpose::AUTHENTICATION, SecurityLevel::MEDIUM);
        assert_eq!(k.security_level, SecurityLevel::MEDIUM);
    }

    #[test]
    fn payload_data_width_follows_key_type() {
        let mut k = key(0, Purpose::AUTHENTICATION, SecurityLevel::MASTER);
        assert_eq!(k.payload_data().len(), 33);
        k.key_type = KeyType::ECDSA_HASH160;
        assert_eq!(k.payload_data().len(), 20);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let keys = vec![
            key(0, Purpose::AUTHENTICATION, SecurityLevel::MASTER),
            key(1, Purpose::AUTHENTICATION, SecurityLevel::HIGH),
            key(1, Purpose::TRANSFER, SecurityLevel::CRITICAL),
        ];
        assert_eq!(
            validate_key_ids(&keys),
            Err(KeyValidationError::DuplicateKeyId(1))
        );
        assert!(validate_key_ids(&keys[..2]).is_ok());
    }

    #[test]
    fn update_requires_master() {
        assert!(validate_key_for_identity_update(SecurityLevel::MASTER).is_ok());
        assert_eq!(
            validate_key_for_identity_update(SecurityLevel::CRITICAL),
            Err(KeyValidationError::KeySecurityLevelNotAllowed(
                "CRITICAL".to_string()
            ))
        );
    }

    #[test]
    fn dpns_requires_authentication_critical_or_high() {
        assert!(
            validate_key_for_dpns_registration(Purpose::AUTHENTICATION, SecurityLevel::HIGH)
                .is_ok()
        );
        assert!(
            validate_key_for_dpns_registration(Purpose::AUTHENTICATION, SecurityLevel::CRITICAL)
                .is_ok()
        );
        assert_eq!(
            validate_key_for_dpns_registration(Purpose::TRANSFER, SecurityLevel::CRITICAL),
            Err(KeyValidationError::KeyPurposeNotAllowed("TRANSFER".into()))
        );
        assert_eq!(
            validate_key_for_dpns_registration(Purpose::AUTHENTICATION, SecurityLevel::MASTER),
            Err(KeyValidationError::KeySecurityLevelNotAllowed("MASTER".into()))
        );
    }
}
