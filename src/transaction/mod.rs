//! The Type 8 (asset lock) special transaction: data types, script
//! construction, and bit-exact wire serialization. Any deviation here
//! breaks quorum validation and the deterministic identity id, so the
//! layout follows the consensus encoding byte for byte.

pub mod builder;
pub mod proof;
pub mod signer;

use crate::codec;
use crate::hashes;

/// Standard transaction version for special transactions.
pub const TX_VERSION: u16 = 3;
/// Special transaction type for asset locks.
pub const ASSET_LOCK_TX_TYPE: u16 = 8;
/// Asset lock payload version.
pub const ASSET_LOCK_PAYLOAD_VERSION: u8 = 1;

pub const OP_RETURN: u8 = 0x6a;
pub const OP_DUP: u8 = 0x76;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_CHECKSIG: u8 = 0xac;

#[derive(Debug, thiserror::Error)]
pub enum TxError {
    #[error("utxo value {value} duffs does not cover the fee of {fee} duffs")]
    InsufficientFunds { value: u64, fee: u64 },
    #[error("malformed utxo field: {0}")]
    Codec(#[from] codec::CodecError),
    #[error("no spent output known for input {0}")]
    MissingSpentOutput(usize),
    #[error("signing failed: {0}")]
    Signing(#[from] secp256k1::Error),
}

/// Reference to a previous output, txid in internal (wire) byte order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutPoint {
    pub txid: [u8; 32],
    pub vout: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxIn {
    pub previous_output: OutPoint,
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOut {
    pub value: i64,
    pub script_pubkey: Vec<u8>,
}

impl TxOut {
    fn serialize_into(&self, buf: &mut Vec<u8>) {
        codec::write_i64_le(buf, self.value);
        codec::write_var_bytes(buf, &self.script_pubkey);
    }
}

/// The extra payload of a Type 8 transaction. Its credit outputs describe
/// how the burned value materializes as Platform credits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLockPayload {
    pub version: u8,
    pub credit_outputs: Vec<TxOut>,
}

impl AssetLockPayload {
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.push(self.version);
        codec::write_compact_size(&mut buf, self.credit_outputs.len() as u64);
        for output in &self.credit_outputs {
            output.serialize_into(&mut buf);
        }
        buf
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLockTransaction {
    pub version: u16,
    pub tx_type: u16,
    pub input: Vec<TxIn>,
    pub output: Vec<TxOut>,
    pub lock_time: u32,
    pub payload: AssetLockPayload,
}

impl AssetLockTransaction {
    /// Consensus serialization. The first 32-bit word packs the version in
    /// the low half and the transaction type in the high half.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        let version_word = (self.version as u32) | ((self.tx_type as u32) << 16);
        codec::write_i32_le(&mut buf, version_word as i32);

        codec::write_compact_size(&mut buf, self.input.len() as u64);
        for input in &self.input {
            buf.extend_from_slice(&input.previous_output.txid);
            codec::write_u32_le(&mut buf, input.previous_output.vout);
            codec::write_var_bytes(&mut buf, &input.script_sig);
            codec::write_u32_le(&mut buf, input.sequence);
        }

        codec::write_compact_size(&mut buf, self.output.len() as u64);
        for output in &self.output {
            output.serialize_into(&mut buf);
        }

        codec::write_u32_le(&mut buf, self.lock_time);

        if self.tx_type != 0 {
            codec::write_var_bytes(&mut buf, &self.payload.serialize());
        }
        buf
    }

    /// Transaction id in internal byte order.
    pub fn txid(&self) -> [u8; 32] {
        hashes::hash256(&self.serialize())
    }

    /// Transaction id in display byte order, as Insight reports it.
    pub fn txid_hex(&self) -> String {
        codec::txid_to_display(&self.txid())
    }
}

/// `OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG`
pub fn p2pkh_script(pubkey_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(25);
    script.push(OP_DUP);
    script.push(OP_HASH160);
    script.push(20);
    script.extend_from_slice(pubkey_hash);
    script.push(OP_EQUALVERIFY);
    script.push(OP_CHECKSIG);
    script
}

/// `OP_RETURN` with an empty push; the output that burns on layer 1.
pub fn burn_script() -> Vec<u8> {
    vec![OP_RETURN, 0x00]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn p2pkh_script_layout() {
        let script = p2pkh_script(&[0xab; 20]);
        assert_eq!(script.len(), 25);
        assert_eq!(script[..3], [0x76, 0xa9, 0x14]);
        assert_eq!(script[23..], [0x88, 0xac]);
    }

    #[test]
    fn version_word_packs_type_high() {
        let tx = AssetLockTransaction {
            version: TX_VERSION,
            tx_type: ASSET_LOCK_TX_TYPE,
            input: vec![],
            output: vec![],
            lock_time: 0,
            payload: AssetLockPayload {
                version: ASSET_LOCK_PAYLOAD_VERSION,
                credit_outputs: vec![],
            },
        };
        let bytes = tx.serialize();
        assert_eq!(bytes[..4], [0x03, 0x00, 0x08, 0x00]);
        // vin count, vout count, lock time, payload length prefix, payload.
        assert_eq!(bytes[4..], [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x01, 0x00]);
    }

    #[test]
    fn payload_serializes_version_count_outputs() {
        let payload = AssetLockPayload {
            version: 1,
            credit_outputs: vec![TxOut {
                value: 399_000,
                script_pubkey: p2pkh_script(&[0x11; 20]),
            }],
        };
        let bytes = payload.serialize();
        assert_eq!(bytes[0], 0x01);
        assert_eq!(bytes[1], 0x01);
        assert_eq!(bytes[2..10], 399_000i64.to_le_bytes());
        assert_eq!(bytes[10], 25);
        assert_eq!(bytes.len(), 11 + 25);
    }

    #[test]
    fn txid_is_reversed_double_sha() {
        let tx = AssetLockTransaction {
            version: TX_VERSION,
            tx_type: ASSET_LOCK_TX_TYPE,
            input: vec![TxIn {
                previous_output: OutPoint {
                    txid: [0xaa; 32],
                    vout: 0,
                },
                script_sig: vec![],
                sequence: 0xffff_ffff,
            }],
            output: vec![TxOut {
                value: 1000,
                script_pubkey: burn_script(),
            }],
            lock_time: 0,
            payload: AssetLockPayload {
                version: 1,
                credit_outputs: vec![],
            },
        };
        let internal = tx.txid();
        let display = tx.txid_hex();
        let mut reversed = internal;
        reversed.reverse();
        assert_eq!(display, hex::encode(reversed));
    }
}
