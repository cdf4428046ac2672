//! secp256k1 key pairs and their layer-1 encodings: P2PKH addresses and
//! WIF import/export.

use secp256k1::{PublicKey, Secp256k1, SecretKey};

use crate::codec;
use crate::config::NetworkParams;
use crate::hashes;
use crate::model::wallet::WalletError;

/// WIF prefixes of the networks this bridge knows about.
const KNOWN_WIF_PREFIXES: [u8; 2] = [204, 239];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl KeyPair {
    /// A cryptographically random one-time key. Used for top-up and
    /// fund-address flows, where the key must not be derivable from the
    /// user's mnemonic.
    pub fn generate() -> Self {
        let secret_key = SecretKey::new(&mut rand::thread_rng());
        Self::from_secret_key(secret_key)
    }

    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = secret_key.public_key(&secp);
        KeyPair {
            secret_key,
            public_key,
        }
    }

    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, WalletError> {
        let secret_key = SecretKey::from_slice(bytes)
            .map_err(|e| WalletError::InvalidPrivateKey(e.to_string()))?;
        Ok(Self::from_secret_key(secret_key))
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }

    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret_key.secret_bytes()
    }

    /// Compressed SEC1 encoding, 33 bytes with a 0x02/0x03 prefix.
    pub fn public_key_bytes(&self) -> [u8; 33] {
        self.public_key.serialize()
    }

    pub fn public_key_hex(&self) -> String {
        codec::encode_hex(&self.public_key_bytes())
    }

    pub fn pubkey_hash(&self) -> [u8; 20] {
        hashes::hash160(&self.public_key_bytes())
    }

    /// P2PKH deposit address for this key on `params`' network.
    pub fn address(&self, params: &NetworkParams) -> String {
        public_key_to_address(&self.public_key_bytes(), params.address_version)
    }

    pub fn to_wif(&self, params: &NetworkParams) -> String {
        private_key_to_wif(&self.secret_key, params.wif_prefix, true)
    }
}

pub fn public_key_to_address(public_key: &[u8], address_version: u8) -> String {
    let mut payload = vec![address_version];
    payload.extend_from_slice(&hashes::hash160(public_key));
    codec::base58check_encode(&payload)
}

pub fn private_key_to_wif(secret_key: &SecretKey, wif_prefix: u8, compressed: bool) -> String {
    let mut payload = vec![wif_prefix];
    payload.extend_from_slice(&secret_key.secret_bytes());
    if compressed {
        payload.push(0x01);
    }
    codec::base58check_encode(&payload)
}

/// A WIF taken apart. The caller is responsible for checking `prefix`
/// against the session network.
#[derive(Debug)]
pub struct DecodedWif {
    pub secret_key: SecretKey,
    pub compressed: bool,
    pub prefix: u8,
}

pub fn wif_to_private_key(wif: &str) -> Result<DecodedWif, WalletError> {
    let payload = codec::base58check_decode(wif)
        .map_err(|e| WalletError::InvalidWif(e.to_string()))?;
    let compressed = match payload.len() {
        33 => false,
        34 => {
            if payload[33] != 0x01 {
                return Err(WalletError::InvalidWif(
                    "compression flag must be 0x01".into(),
                ));
            }
            true
        }
        n => {
            return Err(WalletError::InvalidWif(format!(
                "payload must be 33 or 34 bytes, got {n}"
            )));
        }
    };
    let prefix = payload[0];
    if !KNOWN_WIF_PREFIXES.contains(&prefix) {
        return Err(WalletError::InvalidWif(format!(
            "unknown network prefix byte {prefix}"
        )));
    }
    let secret_key = SecretKey::from_slice(&payload[1..33])
        .map_err(|e| WalletError::InvalidWif(e.to_string()))?;
    Ok(DecodedWif {
        secret_key,
        compressed,
        prefix,
    })
}
