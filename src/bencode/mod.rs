use anyhow::{anyhow, Context, Result};
use sha1::{Digest, Sha1};
use std::fs;
use std::path::Path;

mod bvalue;
mod decoder;
mod encoder;

pub use bvalue::BValue;

/// Untyped bencode access, for structures that are not trusted to match
/// the descriptor model.
#[derive(Debug, Clone, Copy)]
pub struct Bencode;

impl Bencode {
    /// Decode a complete bencoded buffer
    pub fn decode_bytes(bytes: &[u8]) -> Result<BValue> {
        decoder::Decoder::new(bytes).parse()
    }

    /// Decode bencode from file
    pub fn decode_file(path: impl AsRef<Path>) -> Result<BValue> {
        let path = path.as_ref();
        let contents =
            fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        Self::decode_bytes(&contents)
    }

    /// Encode a value to bencoded bytes
    pub fn encode_bytes(value: &BValue) -> Result<Vec<u8>> {
        encoder::Encoder::new().encode(value)
    }

    /// SHA-1 over the `info` dictionary exactly as stored, including keys
    /// the typed descriptor model drops.
    pub fn info_hash(torrent: &BValue) -> Result<[u8; 20]> {
        let info = torrent
            .get("info")
            .ok_or_else(|| anyhow!("missing info dictionary"))?;
        let encoded = Self::encode_bytes(info)?;
        Ok(Sha1::digest(&encoded).into())
    }
}
