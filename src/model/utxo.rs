use crate::codec::{self, CodecError};
use serde::Deserialize;

/// An unspent output as reported by the Insight API. `txid` is in display
/// byte order; `satoshis` is the value in duffs.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Utxo {
    pub txid: String,
    pub vout: u32,
    pub satoshis: u64,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: String,
    #[serde(default)]
    pub confirmations: u32,
}

impl Utxo {
    pub fn script_pub_key_bytes(&self) -> Result<Vec<u8>, CodecError> {
        codec::decode_hex(&self.script_pub_key)
    }
}
