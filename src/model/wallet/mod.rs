//! Session key material. A [`Wallet`] holds a BIP-39 mnemonic and its seed
//! and derives the two key families the bridge needs: the BIP-44 asset-lock
//! key and the DIP-0013 identity keys. Re-entering the same mnemonic on the
//! same network regenerates bit-identical keys, so the deposit address and
//! identity keys are stable across sessions.

pub mod derivation;
pub mod derivation_path;
pub mod key_pair;

use bip39::{Language, Mnemonic};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::model::wallet::derivation::ExtendedPrivKey;
use crate::model::wallet::derivation_path::{asset_lock_path, identity_key_path, path_to_string};
use crate::model::wallet::key_pair::KeyPair;

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),
    #[error("derived child key is out of range, retry with the next index")]
    DerivationOverflow,
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),
    #[error("invalid WIF: {0}")]
    InvalidWif(String),
}

/// Mnemonic strength accepted by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordCount {
    Twelve,
    TwentyFour,
}

impl WordCount {
    fn words(&self) -> usize {
        match self {
            WordCount::Twelve => 12,
            WordCount::TwentyFour => 24,
        }
    }
}

/// The 64-byte BIP-39 seed, wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct WalletSeed([u8; 64]);

pub struct Wallet {
    mnemonic: Mnemonic,
    seed: WalletSeed,
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet").finish_non_exhaustive()
    }
}

impl Wallet {
    /// Generates a fresh English mnemonic of the requested strength.
    pub fn generate(word_count: WordCount) -> Result<Self, WalletError> {
        let mnemonic = Mnemonic::generate_in(Language::English, word_count.words())
            .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;
        Ok(Self::from_mnemonic(mnemonic, ""))
    }

    /// Restores a wallet from a space-separated phrase. Fails with
    /// `InvalidMnemonic` when the checksum bits don't match.
    pub fn from_phrase(phrase: &str, passphrase: &str) -> Result<Self, WalletError> {
        let mnemonic = Mnemonic::parse_in_normalized(Language::English, phrase)
            .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;
        Ok(Self::from_mnemonic(mnemonic, passphrase))
    }

    fn from_mnemonic(mnemonic: Mnemonic, passphrase: &str) -> Self {
        let seed = WalletSeed(mnemonic.to_seed_normalized(passphrase));
        Wallet { mnemonic, seed }
    }

    pub fn mnemonic_phrase(&self) -> String {
        self.mnemonic.to_string()
    }

    fn master_key(&self) -> Result<ExtendedPrivKey, WalletError> {
        ExtendedPrivKey::new_master(&self.seed.0)
    }

    /// Derives the asset-lock funding key at `m/44'/{coin_type}'/0'/0/0`.
    pub fn asset_lock_key_pair(&self, coin_type: u32) -> Result<KeyPair, WalletError> {
        let key = self.master_key()?.derive_path(&asset_lock_path(coin_type))?;
        Ok(KeyPair::from_secret_key(key.secret_key))
    }

    pub fn asset_lock_derivation_path(coin_type: u32) -> String {
        path_to_string(&asset_lock_path(coin_type))
    }

    /// Derives a DIP-0013 identity key at
    /// `m/9'/{coin_type}'/5'/0'/0'/{identity_index}'/{key_index}'`.
    pub fn identity_key_pair(
        &self,
        coin_type: u32,
        identity_index: u32,
        key_index: u32,
    ) -> Result<KeyPair, WalletError> {
        let key = self
            .master_key()?
            .derive_path(&identity_key_path(coin_type, identity_index, key_index))?;
        Ok(KeyPair::from_secret_key(key.secret_key))
    }

    pub fn identity_key_derivation_path(
        coin_type: u32,
        identity_index: u32,
        key_index: u32,
    ) -> String {
        path_to_string(&identity_key_path(coin_type, identity_index, key_index))
    }
}
