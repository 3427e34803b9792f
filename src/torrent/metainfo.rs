//! BitTorrent descriptor (metainfo) model.
//!
//! A descriptor is a bencoded dictionary:
//!
//! - `announce`: tracker URL
//! - `comment`, `creation date`, `created by`, `encoding`: optional provenance
//! - `info`: the hashed part
//!   - `name`: suggested file or directory name
//!   - `piece length`: bytes per piece
//!   - `pieces`: concatenated SHA-1 hashes of all pieces
//!   - `private`, `source`: private-tracker flags
//!   - `length` (single file) or `files` (multi file), never both
//!   - `entropy`: optional marker that only exists to change the info hash

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fmt;
use std::path::Path;

use crate::error::{Result, TorrentError};

pub const PIECE_HASH_LEN: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Descriptor {
    #[serde(default)]
    pub announce: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(
        rename = "creation date",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub creation_date: Option<i64>,
    #[serde(rename = "created by", default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    pub info: Info,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileEntry {
    pub length: u64,
    pub path: Vec<String>,
}

impl FileEntry {
    pub fn relative_path(&self) -> std::path::PathBuf {
        self.path.iter().collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Info {
    pub name: String,
    #[serde(rename = "piece length")]
    pub piece_length: u64,
    #[serde(with = "serde_bytes")]
    pub pieces: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    files: Option<Vec<FileEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entropy: Option<u32>,
}

/// How the content is laid out, fixed when the info dictionary is created.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Layout<'a> {
    Single { length: u64 },
    Multi { files: &'a [FileEntry] },
}

impl Info {
    pub fn single(name: String, piece_length: u64, pieces: Vec<u8>, length: u64) -> Self {
        Self {
            name,
            piece_length,
            pieces,
            private: None,
            source: None,
            files: None,
            length: Some(length),
            entropy: None,
        }
    }

    pub fn multi(name: String, piece_length: u64, pieces: Vec<u8>, files: Vec<FileEntry>) -> Self {
        Self {
            name,
            piece_length,
            pieces,
            private: None,
            source: None,
            files: Some(files),
            length: None,
            entropy: None,
        }
    }

    /// The content layout. Decoded descriptors carrying both keys are
    /// treated as multi-file, matching how clients read them.
    pub fn layout(&self) -> Option<Layout<'_>> {
        match (&self.files, self.length) {
            (Some(files), _) => Some(Layout::Multi { files }),
            (None, Some(length)) => Some(Layout::Single { length }),
            (None, None) => None,
        }
    }

    /// Drops whichever layout key loses to [`Info::layout`].
    pub(crate) fn normalize_layout(&mut self) -> Result<()> {
        match self.layout() {
            Some(Layout::Multi { .. }) => {
                self.length = None;
                Ok(())
            }
            Some(Layout::Single { .. }) => Ok(()),
            None => Err(TorrentError::MalformedDescriptor(
                "info has neither `files` nor `length`".into(),
            )),
        }
    }

    pub fn is_private(&self) -> bool {
        self.private == Some(1)
    }

    pub fn total_length(&self) -> u64 {
        match self.layout() {
            Some(Layout::Single { length }) => length,
            Some(Layout::Multi { files }) => files.iter().map(|f| f.length).sum(),
            None => 0,
        }
    }

    pub fn file_count(&self) -> usize {
        match self.layout() {
            Some(Layout::Multi { files }) => files.len(),
            Some(Layout::Single { .. }) => 1,
            None => 0,
        }
    }

    pub fn piece_hashes(&self) -> Vec<[u8; PIECE_HASH_LEN]> {
        self.pieces
            .chunks_exact(PIECE_HASH_LEN)
            .filter_map(|chunk| chunk.try_into().ok())
            .collect()
    }

    pub fn total_pieces(&self) -> usize {
        self.pieces.len() / PIECE_HASH_LEN
    }
}

impl Descriptor {
    /// Parse a descriptor from its raw bytes. Unknown keys are dropped and
    /// the info dictionary must carry `files` or `length`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut descriptor: Descriptor = serde_bencode::from_bytes(bytes)?;
        descriptor.info.normalize_layout()?;
        Ok(descriptor)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_bencode::to_bytes(self)?)
    }

    /// Writes the descriptor, replacing any file already at `path`, and
    /// returns the number of bytes written.
    pub fn write(&self, path: &Path) -> Result<u64> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, &bytes)?;
        Ok(bytes.len() as u64)
    }

    /// SHA-1 of the bencoded info dictionary.
    ///
    /// This hash uniquely identifies the torrent; any change to `info`,
    /// including the entropy marker, produces a different value.
    pub fn info_hash(&self) -> Result<[u8; 20]> {
        let encoded = serde_bencode::to_bytes(&self.info)?;
        let mut hasher = Sha1::new();
        hasher.update(&encoded);
        Ok(hasher.finalize().into())
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Tracker URL: {}", self.announce)?;
        writeln!(f, "Name: {}", self.info.name)?;
        writeln!(f, "Length: {}", self.info.total_length())?;
        writeln!(f, "Files: {}", self.info.file_count())?;
        if let Ok(hash) = self.info_hash() {
            writeln!(f, "Info Hash: {}", hex::encode(hash))?;
        }
        writeln!(f, "Piece Length: {}", self.info.piece_length)?;
        writeln!(f, "Pieces: {}", self.info.total_pieces())?;
        if let Some(source) = &self.info.source {
            writeln!(f, "Source: {}", source)?;
        }
        write!(f, "Private: {}", self.info.is_private())
    }
}
