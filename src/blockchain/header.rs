// dgb_node_rust/src/blockchain/header.rs

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::{Error as IoError, Read, Write};

use crate::error::{ChainError, ChainResult};

/// Serialized header length on the wire.
pub const HEADER_SIZE: usize = 80;

pub trait Encodable {
    fn consensus_encode<W: Write + WriteBytesExt>(&self, writer: &mut W) -> Result<usize, IoError>;
}

pub trait Decodable: Sized {
    fn consensus_decode<R: Read + ReadBytesExt>(reader: &mut R) -> Result<Self, IoError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeaderData {
    pub version: i32,
    pub prev_block_hash: [u8; 32],
    pub merkle_root: [u8; 32],
    pub timestamp: u32,
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeaderData {
    /// Double SHA-256 of the 80-byte header, internal byte order.
    /// Independent of the mining algorithm; the PoW hash is not needed here.
    pub fn get_hash(&self) -> [u8; 32] {
        let mut bytes = Vec::with_capacity(HEADER_SIZE);
        // Writing into a Vec cannot fail.
        let _ = self.consensus_encode(&mut bytes);
        let h1 = Sha256::digest(&bytes);
        let h2 = Sha256::digest(h1);
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&h2);
        hash
    }

    pub fn has_parent(&self) -> bool {
        self.prev_block_hash != [0u8; 32]
    }

    /// Decodes a hex-encoded 80-byte serialized header.
    pub fn from_hex(s: &str) -> ChainResult<Self> {
        let bytes = hex::decode(s.trim()).map_err(|e| ChainError::MalformedHeader(e.to_string()))?;
        if bytes.len() != HEADER_SIZE {
            return Err(ChainError::MalformedHeader(format!("expected {} bytes, got {}", HEADER_SIZE, bytes.len())));
        }
        Self::consensus_decode(&mut bytes.as_slice()).map_err(|e| ChainError::MalformedHeader(e.to_string()))
    }

    pub fn to_hex(&self) -> String {
        let mut bytes = Vec::with_capacity(HEADER_SIZE);
        let _ = self.consensus_encode(&mut bytes);
        hex::encode(bytes)
    }
}

impl Encodable for BlockHeaderData {
    fn consensus_encode<W: Write + WriteBytesExt>(&self, writer: &mut W) -> Result<usize, IoError> {
        writer.write_i32::<LittleEndian>(self.version)?;
        writer.write_all(&self.prev_block_hash)?;
        writer.write_all(&self.merkle_root)?;
        writer.write_u32::<LittleEndian>(self.timestamp)?;
        writer.write_u32::<LittleEndian>(self.bits)?;
        writer.write_u32::<LittleEndian>(self.nonce)?;
        Ok(HEADER_SIZE)
    }
}

impl Decodable for BlockHeaderData {
    fn consensus_decode<R: Read + ReadBytesExt>(reader: &mut R) -> Result<Self, IoError> {
        let version = reader.read_i32::<LittleEndian>()?;
        let mut prev_block_hash = [0u8; 32];
        reader.read_exact(&mut prev_block_hash)?;
        let mut merkle_root = [0u8; 32];
        reader.read_exact(&mut merkle_root)?;
        let timestamp = reader.read_u32::<LittleEndian>()?;
        let bits = reader.read_u32::<LittleEndian>()?;
        let nonce = reader.read_u32::<LittleEndian>()?;
        Ok(BlockHeaderData { version, prev_block_hash, merkle_root, timestamp, bits, nonce })
    }
}

/// Hex in the conventional display order (byte-reversed).
pub fn hash_to_hex(hash: &[u8; 32]) -> String {
    let mut reversed = *hash;
    reversed.reverse();
    hex::encode(reversed)
}

/// Parses a display-order hex hash into internal byte order.
pub fn hash_from_hex(s: &str) -> Result<[u8; 32], hex::FromHexError> {
    let mut hash = [0u8; 32];
    hex::decode_to_slice(s, &mut hash)?;
    hash.reverse();
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> BlockHeaderData {
        BlockHeaderData {
            version: 0x2000_0202,
            prev_block_hash: [7u8; 32],
            merkle_root: [9u8; 32],
            timestamp: 1_700_000_000,
            bits: 0x1b01_2345,
            nonce: 42,
        }
    }

    #[test]
    fn test_header_encodes_to_80_bytes() {
        let mut bytes = Vec::new();
        let written = sample().consensus_encode(&mut bytes).unwrap();
        assert_eq!(written, HEADER_SIZE);
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(&bytes[0..4], &0x2000_0202i32.to_le_bytes());
        assert_eq!(&bytes[76..80], &42u32.to_le_bytes());
    }

    #[test]
    fn test_decode_rejects_truncated_header() {
        let mut bytes = Vec::new();
        sample().consensus_encode(&mut bytes).unwrap();
        bytes.truncate(79);
        assert!(BlockHeaderData::consensus_decode(&mut Cursor::new(bytes)).is_err());
    }

    #[test]
    fn test_hash_hex_is_byte_reversed() {
        let hex_str = "7497ea1b465eb39f1c8f507bc877078fe016d6fcb6dfad3a64c98dcc6e1e8496";
        let hash = hash_from_hex(hex_str).unwrap();
        assert_eq!(hash[31], 0x74);
        assert_eq!(hash[0], 0x96);
        assert_eq!(hash_to_hex(&hash), hex_str);
    }

    #[test]
    fn test_from_hex_checks_length_and_hex() {
        let hex_header = sample().to_hex();
        assert_eq!(BlockHeaderData::from_hex(&format!("{}\n", hex_header)).unwrap(), sample());
        assert!(matches!(BlockHeaderData::from_hex(&hex_header[..158]), Err(ChainError::MalformedHeader(_))));
        assert!(matches!(BlockHeaderData::from_hex("zz"), Err(ChainError::MalformedHeader(_))));
    }

    #[test]
    fn test_hash_changes_with_nonce() {
        let a = sample();
        let mut b = sample();
        b.nonce += 1;
        assert_ne!(a.get_hash(), b.get_hash());
        assert!(a.has_parent());
    }
}
