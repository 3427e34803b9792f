use std::fs::File;
use std::io::Read;

use sha1::{Digest, Sha1};

use super::content::ContentSet;
use crate::error::{Result, TorrentError};

/// Progress callback: `(pieces_done, pieces_total)`. Runs on the hashing
/// thread, so it must return quickly.
pub type PieceProgress<'a> = dyn FnMut(u64, u64) + 'a;

/// Produces the concatenated piece hashes for a content set.
pub trait PieceHasher {
    fn hash_pieces(
        &self,
        content: &ContentSet,
        piece_length: u64,
        progress: &mut PieceProgress<'_>,
    ) -> Result<Vec<u8>>;
}

/// Streams every file in order through SHA-1, treating the content as one
/// continuous byte string split into `piece_length` chunks.
#[derive(Debug, Clone)]
pub struct Sha1PieceHasher {
    /// Pieces between progress callbacks.
    pub interval: u64,
}

impl Default for Sha1PieceHasher {
    fn default() -> Self {
        Self { interval: 16 }
    }
}

impl PieceHasher for Sha1PieceHasher {
    fn hash_pieces(
        &self,
        content: &ContentSet,
        piece_length: u64,
        progress: &mut PieceProgress<'_>,
    ) -> Result<Vec<u8>> {
        let total = content.total_size().div_ceil(piece_length);
        let interval = self.interval.max(1);
        let mut pieces = Vec::with_capacity(total as usize * 20);
        let mut buffer = vec![0u8; piece_length as usize];
        let mut filled = 0usize;
        let mut done = 0u64;

        progress(0, total);

        for file in content.files() {
            let mut reader = File::open(&file.source)?;
            let mut remaining = file.length;
            while remaining > 0 {
                let want = (buffer.len() - filled).min(remaining as usize);
                let read = reader.read(&mut buffer[filled..filled + want])?;
                if read == 0 {
                    return Err(TorrentError::SizeMismatch {
                        expected: file.length,
                        actual: file.length - remaining,
                    });
                }
                filled += read;
                remaining -= read as u64;

                if filled == buffer.len() {
                    pieces.extend_from_slice(&Sha1::digest(&buffer));
                    filled = 0;
                    done += 1;
                    if done % interval == 0 {
                        progress(done, total);
                    }
                }
            }
        }

        if filled > 0 {
            pieces.extend_from_slice(&Sha1::digest(&buffer[..filled]));
            done += 1;
        }
        // The loop already reported the last full piece on an interval boundary.
        if filled > 0 || done % interval != 0 {
            progress(done, total);
        }

        Ok(pieces)
    }
}
