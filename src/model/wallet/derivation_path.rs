//! The two derivation paths the bridge uses. The DIP-0013 shape is
//! load-bearing: layer-2 wallets recovering from the same mnemonic expect
//! the hardened feature level `5'` and the `{identity}'/{key}'` suffix.

use crate::model::wallet::derivation::ChildNumber;

/// BIP-44 purpose level.
pub const BIP44_PURPOSE: u32 = 44;
/// DIP-0009 feature purpose level for layer-2 paths.
pub const DIP9_PURPOSE: u32 = 9;
/// DIP-0013 identity authentication feature index.
pub const IDENTITY_AUTHENTICATION_FEATURE: u32 = 5;

/// `m/44'/{coin_type}'/0'/0/0`
pub fn asset_lock_path(coin_type: u32) -> Vec<ChildNumber> {
    vec![
        ChildNumber::Hardened(BIP44_PURPOSE),
        ChildNumber::Hardened(coin_type),
        ChildNumber::Hardened(0),
        ChildNumber::Normal(0),
        ChildNumber::Normal(0),
    ]
}

/// `m/9'/{coin_type}'/5'/0'/0'/{identity_index}'/{key_index}'`
pub fn identity_key_path(coin_type: u32, identity_index: u32, key_index: u32) -> Vec<ChildNumber> {
    vec![
        ChildNumber::Hardened(DIP9_PURPOSE),
        ChildNumber::Hardened(coin_type),
        ChildNumber::Hardened(IDENTITY_AUTHENTICATION_FEATURE),
        ChildNumber::Hardened(0),
        ChildNumber::Hardened(0),
        ChildNumber::Hardened(identity_index),
        ChildNumber::Hardened(key_index),
    ]
}

pub fn path_to_string(path: &[ChildNumber]) -> String {
    let mut out = String::from("m");
    for child in path {
        match child {
            ChildNumber::Normal(i) => out.push_str(&format!("/{}", i)),
            ChildNumber::Hardened(i) => out.push_str(&format!("/{}'", i)),
        }
    }
    out
}
