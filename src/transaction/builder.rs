//! Builds the unsigned asset-lock transaction from exactly one UTXO and one
//! asset-lock public key. The whole locked amount flows to the burn/credit
//! pair; there is no change output and the fee is the caller's.

use crate::codec;
use crate::hashes;
use crate::model::utxo::Utxo;
use crate::transaction::{
    ASSET_LOCK_PAYLOAD_VERSION, ASSET_LOCK_TX_TYPE, AssetLockPayload, AssetLockTransaction,
    OutPoint, TX_VERSION, TxError, TxIn, TxOut, burn_script, p2pkh_script,
};

pub fn build_asset_lock_transaction(
    utxo: &Utxo,
    asset_lock_public_key: &[u8; 33],
    fee: u64,
) -> Result<AssetLockTransaction, TxError> {
    if utxo.satoshis <= fee {
        return Err(TxError::InsufficientFunds {
            value: utxo.satoshis,
            fee,
        });
    }
    let lock_amount = (utxo.satoshis - fee) as i64;

    let input = TxIn {
        previous_output: OutPoint {
            txid: codec::txid_to_internal(&utxo.txid)?,
            vout: utxo.vout,
        },
        script_sig: vec![],
        sequence: 0xffff_ffff,
    };

    // The wire output burns; the payload credit output directs the credits
    // to whoever holds the asset-lock private key.
    let burn_output = TxOut {
        value: lock_amount,
        script_pubkey: burn_script(),
    };
    let credit_output = TxOut {
        value: lock_amount,
        script_pubkey: p2pkh_script(&hashes::hash160(asset_lock_public_key)),
    };

    Ok(AssetLockTransaction {
        version: TX_VERSION,
        tx_type: ASSET_LOCK_TX_TYPE,
        input: vec![input],
        output: vec![burn_output],
        lock_time: 0,
        payload: AssetLockPayload {
            version: ASSET_LOCK_PAYLOAD_VERSION,
            credit_outputs: vec![credit_output],
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::wallet::key_pair::KeyPair;

    fn fixture_utxo(pair: &KeyPair) -> Utxo {
        Utxo {
            txid: "aa".repeat(32),
            vout: 0,
            satoshis: 400_000,
            script_pub_key: hex::encode(p2pkh_script(&pair.pubkey_hash())),
            confirmations: 1,
        }
    }

    #[test]
    fn builds_expected_wire_layout() {
        let pair = KeyPair::from_secret_bytes(&[0x61; 32]).unwrap();
        let utxo = fixture_utxo(&pair);
        let tx =
            build_asset_lock_transaction(&utxo, &pair.public_key_bytes(), 1000).unwrap();

        assert_eq!(tx.input.len(), 1);
        assert_eq!(tx.input[0].previous_output.txid, [0xaa; 32]);
        assert_eq!(tx.input[0].previous_output.vout, 0);
        assert_eq!(tx.input[0].sequence, 0xffff_ffff);
        assert!(tx.input[0].script_sig.is_empty());

        assert_eq!(tx.output.len(), 1);
        assert_eq!(tx.output[0].value, 399_000);
        assert_eq!(tx.output[0].script_pubkey, vec![0x6a, 0x00]);

        assert_eq!(tx.payload.version, 1);
        assert_eq!(tx.payload.credit_outputs.len(), 1);
        assert_eq!(tx.payload.credit_outputs[0].value, 399_000);
        assert_eq!(
            tx.payload.credit_outputs[0].script_pubkey,
            p2pkh_script(&pair.pubkey_hash())
        );

        let bytes = tx.serialize();
        assert_eq!(bytes[..4], [0x03, 0x00, 0x08, 0x00]);
        assert_eq!(bytes[4], 0x01, "vin count");

        // Payload: version 1, one credit output of 399_000, P2PKH script.
        let mut expected_payload = vec![0x01, 0x01];
        expected_payload.extend_from_slice(&399_000i64.to_le_bytes());
        expected_payload.push(25);
        expected_payload.extend_from_slice(&p2pkh_script(&pair.pubkey_hash()));
        assert!(bytes.ends_with(&expected_payload));
    }

    #[test]
    fn fee_exhausting_value_is_insufficient() {
        let pair = KeyPair::from_secret_bytes(&[0x62; 32]).unwrap();
        let mut utxo = fixture_utxo(&pair);
        utxo.satoshis = 1000;
        let err = build_asset_lock_transaction(&utxo, &pair.public_key_bytes(), 1000).unwrap_err();
        assert!(matches!(
            err,
            TxError::InsufficientFunds { value: 1000, fee: 1000 }
        ));
    }

    #[test]
    fn outpoint_txid_is_reversed() {
        let pair = KeyPair::from_secret_bytes(&[0x63; 32]).unwrap();
        let mut utxo = fixture_utxo(&pair);
        utxo.txid = format!("{}{}", "01".repeat(16), "02".repeat(16));
        let tx = build_asset_lock_transaction(&utxo, &pair.public_key_bytes(), 1000).unwrap();
        assert_eq!(tx.input[0].previous_output.txid[0], 0x02);
        assert_eq!(tx.input[0].previous_output.txid[31], 0x01);
    }
}
