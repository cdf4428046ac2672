//! Low-level wire encodings shared by the transaction builder and the key
//! codecs: Bitcoin-style compact sizes, fixed-width little-endian integers,
//! hex, and base58check.

use crate::hashes;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CodecError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),
    #[error("base58 decode failed: {0}")]
    InvalidBase58(String),
    #[error("base58 checksum mismatch")]
    BadChecksum,
    #[error("unexpected end of input while reading {0}")]
    UnexpectedEof(&'static str),
}

/// Appends a Bitcoin compact-size (varint) encoding of `n`.
pub fn write_compact_size(buf: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => buf.push(n as u8),
        0xfd..=0xffff => {
            buf.push(0xfd);
            buf.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            buf.push(0xfe);
            buf.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xff);
            buf.extend_from_slice(&n.to_le_bytes());
        }
    }
}

/// Reads a compact-size integer from the front of `input`, advancing it.
pub fn read_compact_size(input: &mut &[u8]) -> Result<u64, CodecError> {
    let (first, rest) = input
        .split_first()
        .ok_or(CodecError::UnexpectedEof("compact size"))?;
    *input = rest;
    let width = match first {
        0..=0xfc => return Ok(*first as u64),
        0xfd => 2,
        0xfe => 4,
        0xff => 8,
    };
    if input.len() < width {
        return Err(CodecError::UnexpectedEof("compact size payload"));
    }
    let mut le = [0u8; 8];
    le[..width].copy_from_slice(&input[..width]);
    *input = &input[width..];
    Ok(u64::from_le_bytes(le))
}

pub fn write_u32_le(buf: &mut Vec<u8>, n: u32) {
    buf.extend_from_slice(&n.to_le_bytes());
}

pub fn write_i32_le(buf: &mut Vec<u8>, n: i32) {
    buf.extend_from_slice(&n.to_le_bytes());
}

pub fn write_i64_le(buf: &mut Vec<u8>, n: i64) {
    buf.extend_from_slice(&n.to_le_bytes());
}

/// Compact-size length prefix followed by the raw bytes.
pub fn write_var_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    write_compact_size(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Lowercase hex. Parsing is case-insensitive and rejects odd lengths.
pub fn encode_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

pub fn decode_hex(s: &str) -> Result<Vec<u8>, CodecError> {
    hex::decode(s).map_err(|e| CodecError::InvalidHex(e.to_string()))
}

/// Base58check: payload followed by the first 4 bytes of hash256(payload).
pub fn base58check_encode(payload: &[u8]) -> String {
    let checksum = hashes::hash256(payload);
    let mut data = payload.to_vec();
    data.extend_from_slice(&checksum[..4]);
    bs58::encode(data).into_string()
}

pub fn base58check_decode(s: &str) -> Result<Vec<u8>, CodecError> {
    let data = bs58::decode(s)
        .into_vec()
        .map_err(|e| CodecError::InvalidBase58(e.to_string()))?;
    if data.len() < 4 {
        return Err(CodecError::BadChecksum);
    }
    let (payload, checksum) = data.split_at(data.len() - 4);
    if hashes::hash256(payload)[..4] != *checksum {
        return Err(CodecError::BadChecksum);
    }
    Ok(payload.to_vec())
}

/// Converts a display-order txid (hex, as reported by Insight) to the
/// internal wire byte order used in outpoints.
pub fn txid_to_internal(txid_hex: &str) -> Result<[u8; 32], CodecError> {
    let mut bytes: [u8; 32] = decode_hex(txid_hex)?
        .try_into()
        .map_err(|_| CodecError::InvalidHex("txid must be 32 bytes".into()))?;
    bytes.reverse();
    Ok(bytes)
}

/// Renders an internal-order txid in display byte order.
pub fn txid_to_display(internal: &[u8; 32]) -> String {
    let mut bytes = *internal;
    bytes.reverse();
    encode_hex(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_size_boundaries() {
        let cases: [(u64, &[u8]); 6] = [
            (0, &[0x00]),
            (252, &[0xfc]),
            (253, &[0xfd, 0xfd, 0x00]),
            (0xffff, &[0xfd, 0xff, 0xff]),
            (0x1_0000, &[0xfe, 0x00, 0x00, 0x01, 0x00]),
            (
                0x1_0000_0000,
                &[0xff, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00],
            ),
        ];
        for (n, expected) in cases {
            let mut buf = Vec::new();
            write_compact_size(&mut buf, n);
            assert_eq!(buf, expected, "encoding of {n}");
            let mut slice = buf.as_slice();
            assert_eq!(read_compact_size(&mut slice).unwrap(), n);
            assert!(slice.is_empty());
        }
    }

    #[test]
    fn compact_size_truncated_input() {
        let mut slice: &[u8] = &[0xfd, 0x01];
        assert_eq!(
            read_compact_size(&mut slice),
            Err(CodecError::UnexpectedEof("compact size payload"))
        );
    }

    #[test]
    fn hex_rejects_odd_length() {
        assert!(decode_hex("abc").is_err());
        assert_eq!(decode_hex("AbCd").unwrap(), vec![0xab, 0xcd]);
        assert_eq!(encode_hex(&[0xab, 0xcd]), "abcd");
    }

    #[test]
    fn base58check_round_trip() {
        let payload = [0x8c, 0x12, 0x34, 0x56];
        let encoded = base58check_encode(&payload);
        assert_eq!(base58check_decode(&encoded).unwrap(), payload);
    }

    #[test]
    fn base58check_detects_corruption() {
        let encoded = base58check_encode(&[0x4c, 0x00, 0x01]);
        let mut corrupted = encoded.into_bytes();
        let last = corrupted.last_mut().unwrap();
        *last = if *last == b'2' { b'3' } else { b'2' };
        let corrupted = String::from_utf8(corrupted).unwrap();
        assert!(matches!(
            base58check_decode(&corrupted),
            Err(CodecError::BadChecksum) | Err(CodecError::InvalidBase58(_))
        ));
    }

    #[test]
    fn txid_order_round_trip() {
        let display = "aa".repeat(32);
        let internal = txid_to_internal(&display).unwrap();
        assert_eq!(txid_to_display(&internal), display);

        let mixed = format!("{}{}", "01".repeat(16), "02".repeat(16));
        let internal = txid_to_internal(&mixed).unwrap();
        assert_eq!(internal[0], 0x02);
        assert_eq!(internal[31], 0x01);
    }
}
