//! Legacy sighash computation and ECDSA signing of the asset-lock
//! transaction. Signatures are deterministic (RFC 6979), low-S, DER-encoded
//! with the SIGHASH_ALL byte appended.

use secp256k1::{Message, Secp256k1};

use crate::codec;
use crate::model::utxo::Utxo;
use crate::model::wallet::key_pair::KeyPair;
use crate::transaction::{AssetLockTransaction, TxError};

pub const SIGHASH_ALL: u32 = 1;

/// Legacy signature hash for `input_index`: every scriptSig cleared, the
/// spent output's scriptPubKey substituted as the script code, SIGHASH_ALL
/// appended, double SHA-256 over the whole preimage.
pub fn signature_hash(
    tx: &AssetLockTransaction,
    input_index: usize,
    script_code: &[u8],
) -> [u8; 32] {
    let mut cloned = tx.clone();
    for input in &mut cloned.input {
        input.script_sig.clear();
    }
    cloned.input[input_index].script_sig = script_code.to_vec();

    let mut preimage = cloned.serialize();
    codec::write_u32_le(&mut preimage, SIGHASH_ALL);
    crate::hashes::hash256(&preimage)
}

/// Signs every input of `tx` against the matching entry of `spent_utxos`
/// and fills in the scriptSigs. The bridge spends a single input, so the
/// loop runs once.
pub fn sign_transaction(
    tx: &mut AssetLockTransaction,
    spent_utxos: &[Utxo],
    key_pair: &KeyPair,
) -> Result<(), TxError> {
    let secp = Secp256k1::new();
    let public_key = key_pair.public_key_bytes();

    let sighashes = tx
        .input
        .iter()
        .enumerate()
        .map(|(i, _)| {
            let utxo = spent_utxos.get(i).ok_or(TxError::MissingSpentOutput(i))?;
            let script_code = utxo.script_pub_key_bytes()?;
            Ok(signature_hash(tx, i, &script_code))
        })
        .collect::<Result<Vec<_>, TxError>>()?;

    for (input, sighash) in tx.input.iter_mut().zip(sighashes) {
        let message = Message::from_digest(sighash);
        let mut signature = secp.sign_ecdsa(&message, key_pair.secret_key());
        // BIP-62: high-S signatures are non-standard.
        signature.normalize_s();

        let mut der = signature.serialize_der().to_vec();
        der.push(SIGHASH_ALL as u8);

        let mut script_sig = Vec::with_capacity(der.len() + public_key.len() + 2);
        script_sig.push(der.len() as u8);
        script_sig.extend_from_slice(&der);
        script_sig.push(public_key.len() as u8);
        script_sig.extend_from_slice(&public_key);

        input.script_sig = script_sig;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::builder::build_asset_lock_transaction;
    use crate::transaction::p2pkh_script;

    /// Order of secp256k1 divided by two, big-endian.
    const HALF_ORDER: [u8; 32] = [
        0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0x5d, 0x57, 0x6e, 0x73, 0x57, 0xa4, 0x50, 0x1d, 0xdf, 0xe9, 0x2f, 0x46, 0x68, 0x1b,
        0x20, 0xa0,
    ];

    fn signed_fixture(secret: u8) -> (AssetLockTransaction, Vec<Utxo>, KeyPair) {
        let pair = KeyPair::from_secret_bytes(&[secret; 32]).unwrap();
        let utxo = Utxo {
            txid: "bb".repeat(32),
            vout: 1,
            satoshis: 500_000,
            script_pub_key: hex::encode(p2pkh_script(&pair.pubkey_hash())),
            confirmations: 2,
        };
        let mut tx = build_asset_lock_transaction(&utxo, &pair.public_key_bytes(), 1000).unwrap();
        let utxos = vec![utxo];
        sign_transaction(&mut tx, &utxos, &pair).unwrap();
        (tx, utxos, pair)
    }

    /// Extracts (r, s) from the scriptSig's DER signature.
    fn parse_script_sig(script_sig: &[u8]) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
        let sig_len = script_sig[0] as usize;
        let sig = &script_sig[1..1 + sig_len];
        assert_eq!(*sig.last().unwrap(), 0x01, "SIGHASH_ALL byte");
        let der = &sig[..sig.len() - 1];
        assert_eq!(der[0], 0x30);
        let r_len = der[3] as usize;
        let r = der[4..4 + r_len].to_vec();
        assert_eq!(der[4 + r_len], 0x02);
        let s_len = der[5 + r_len] as usize;
        let s = der[6 + r_len..6 + r_len + s_len].to_vec();
        let pubkey_offset = 1 + sig_len;
        let pubkey_len = script_sig[pubkey_offset] as usize;
        let pubkey = script_sig[pubkey_offset + 1..pubkey_offset + 1 + pubkey_len].to_vec();
        (r, s, pubkey)
    }

    #[test]
    fn script_sig_holds_der_sig_and_pubkey() {
        let (tx, _, pair) = signed_fixture(0x71);
        let (_, _, pubkey) = parse_script_sig(&tx.input[0].script_sig);
        assert_eq!(pubkey, pair.public_key_bytes());
    }

    #[test]
    fn signature_is_low_s() {
        for secret in [0x71u8, 0x72, 0x73, 0x74, 0x75] {
            let (tx, _, _) = signed_fixture(secret);
            let (_, s, _) = parse_script_sig(&tx.input[0].script_sig);
            // Strip any DER left-pad before comparing magnitudes.
            let s_trim: Vec<u8> = s.iter().copied().skip_while(|b| *b == 0).collect();
            assert!(s_trim.len() <= 32);
            let mut s_padded = [0u8; 32];
            s_padded[32 - s_trim.len()..].copy_from_slice(&s_trim);
            assert!(s_padded <= HALF_ORDER, "s must be at most n/2");
        }
    }

    #[test]
    fn signing_is_deterministic() {
        let (a, _, _) = signed_fixture(0x76);
        let (b, _, _) = signed_fixture(0x76);
        assert_eq!(a.serialize(), b.serialize());
    }

    #[test]
    fn sighash_commits_to_script_code() {
        let (tx, utxos, _) = signed_fixture(0x77);
        let script_code = utxos[0].script_pub_key_bytes().unwrap();
        let a = signature_hash(&tx, 0, &script_code);
        let b = signature_hash(&tx, 0, &[0x51]);
        assert_ne!(a, b);
    }

    #[test]
    fn sighash_ignores_existing_script_sigs() {
        let (signed, utxos, _) = signed_fixture(0x78);
        let script_code = utxos[0].script_pub_key_bytes().unwrap();
        let mut unsigned = signed.clone();
        unsigned.input[0].script_sig.clear();
        assert_eq!(
            signature_hash(&signed, 0, &script_code),
            signature_hash(&unsigned, 0, &script_code)
        );
    }
}
