//! BIP-32 child key derivation over secp256k1. Only the private-key side is
//! implemented; the bridge never needs extended public keys.

use hmac::{Hmac, Mac};
use secp256k1::{Scalar, Secp256k1, SecretKey};
use sha2::Sha512;

use crate::model::wallet::WalletError;

type HmacSha512 = Hmac<Sha512>;

const HARDENED_OFFSET: u32 = 0x8000_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildNumber {
    Normal(u32),
    Hardened(u32),
}

impl ChildNumber {
    fn index(&self) -> u32 {
        match self {
            ChildNumber::Normal(i) => *i,
            ChildNumber::Hardened(i) => i | HARDENED_OFFSET,
        }
    }

    pub fn is_hardened(&self) -> bool {
        matches!(self, ChildNumber::Hardened(_))
    }
}

pub struct ExtendedPrivKey {
    pub depth: u8,
    pub chain_code: [u8; 32],
    pub secret_key: SecretKey,
}

impl ExtendedPrivKey {
    /// Master key per BIP-32: HMAC-SHA512 keyed with "Bitcoin seed".
    pub fn new_master(seed: &[u8]) -> Result<Self, WalletError> {
        let mut mac = HmacSha512::new_from_slice(b"Bitcoin seed")
            .expect("HMAC accepts any key length");
        mac.update(seed);
        let digest = mac.finalize().into_bytes();
        let (il, ir) = digest.split_at(32);

        let secret_key =
            SecretKey::from_slice(il).map_err(|_| WalletError::DerivationOverflow)?;
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(ir);

        Ok(ExtendedPrivKey {
            depth: 0,
            chain_code,
            secret_key,
        })
    }

    /// CKDpriv. Fails with `DerivationOverflow` when IL >= n or the child
    /// key is zero; the caller retries the next index per BIP-32.
    pub fn derive_child(&self, child: ChildNumber) -> Result<Self, WalletError> {
        let mut mac = HmacSha512::new_from_slice(&self.chain_code)
            .expect("HMAC accepts any key length");
        match child {
            ChildNumber::Hardened(_) => {
                mac.update(&[0u8]);
                mac.update(&self.secret_key.secret_bytes());
            }
            ChildNumber::Normal(_) => {
                let secp = Secp256k1::new();
                let public_key = self.secret_key.public_key(&secp);
                mac.update(&public_key.serialize());
            }
        }
        mac.update(&child.index().to_be_bytes());
        let digest = mac.finalize().into_bytes();
        let (il, ir) = digest.split_at(32);

        let tweak = SecretKey::from_slice(il).map_err(|_| WalletError::DerivationOverflow)?;
        let secret_key = tweak
            .add_tweak(&Scalar::from(self.secret_key))
            .map_err(|_| WalletError::DerivationOverflow)?;

        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(ir);

        Ok(ExtendedPrivKey {
            depth: self.depth + 1,
            chain_code,
            secret_key,
        })
    }

    pub fn derive_path(&self, path: &[ChildNumber]) -> Result<Self, WalletError> {
        let mut key = ExtendedPrivKey {
            depth: self.depth,
            chain_code: self.chain_code,
            secret_key: self.secret_key,
        };
        for child in path {
            key = key.derive_child(*child)?;
        }
        Ok(key)
    }
}
