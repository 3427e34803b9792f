//! In-process descriptor construction.
//!
//! [`DescriptorBuilder`] turns a [`ContentSet`] into a private [`Descriptor`]:
//! it resolves the piece length through the adaptive solver, drives a
//! [`PieceHasher`], stamps the fixed provenance fields, and can check a
//! written descriptor against the files on disk.

use std::cell::OnceCell;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use super::content::ContentSet;
use super::hasher::PieceHasher;
use super::metainfo::{Descriptor, FileEntry, Info, Layout};
use super::piece_size;
use super::{COMMENT, CREATED_BY, PLACEHOLDER_TRACKER, SOURCE_TAG};
use crate::error::{Result, TorrentError};
use crate::progress::{self, HashTimer, Progress};

pub struct DescriptorBuilder<'a> {
    content: &'a ContentSet,
    max_piece_size: u64,
    piece_length: OnceCell<u64>,
}

impl<'a> DescriptorBuilder<'a> {
    pub fn new(content: &'a ContentSet, max_piece_size: u64) -> Self {
        Self {
            content,
            max_piece_size,
            piece_length: OnceCell::new(),
        }
    }

    /// Piece length for this content, solved on first use and cached.
    pub fn piece_length(&self) -> u64 {
        *self.piece_length.get_or_init(|| {
            piece_size::solve(
                self.content.total_size(),
                self.content.pathname_byte_cost(),
                self.content.file_count(),
                self.max_piece_size,
            )
        })
    }

    /// Hashes the content and assembles the descriptor.
    pub fn build(
        &self,
        hasher: &dyn PieceHasher,
        on_progress: &mut dyn FnMut(&Progress),
    ) -> Result<Descriptor> {
        let piece_length = self.piece_length();
        let mut timer = HashTimer::start();
        let pieces = hasher.hash_pieces(self.content, piece_length, &mut |done, total| {
            let elapsed = timer.observe(done);
            on_progress(&progress::report(elapsed, done, total, piece_length));
        })?;

        let name = self.content.name().to_string();
        let mut info = if self.content.is_single_file() {
            Info::single(name, piece_length, pieces, self.content.total_size())
        } else {
            let files = self
                .content
                .files()
                .iter()
                .map(|f| FileEntry {
                    length: f.length,
                    path: f.path.clone(),
                })
                .collect();
            Info::multi(name, piece_length, pieces, files)
        };
        info.private = Some(1);
        info.source = Some(SOURCE_TAG.to_string());

        debug!(
            "Built descriptor for {} ({} pieces of {} bytes)",
            info.name,
            info.total_pieces(),
            piece_length
        );

        Ok(Descriptor {
            announce: PLACEHOLDER_TRACKER.to_string(),
            comment: Some(COMMENT.to_string()),
            creation_date: Some(unix_now()),
            created_by: Some(CREATED_BY.to_string()),
            encoding: None,
            info,
        })
    }

    /// Checks that the files the written descriptor lists still add up to the
    /// size it records.
    pub fn verify(&self, written: &Path) -> Result<()> {
        let descriptor = Descriptor::read(written)?;
        let expected = descriptor.info.total_length();
        let root = self.content.root();

        let actual = match descriptor.info.layout() {
            Some(Layout::Single { .. }) => std::fs::metadata(root)?.len(),
            Some(Layout::Multi { files }) => files
                .iter()
                .map(|f| std::fs::metadata(root.join(f.relative_path())).map(|m| m.len()))
                .sum::<std::io::Result<u64>>()?,
            None => 0,
        };

        if actual != expected {
            return Err(TorrentError::SizeMismatch { expected, actual });
        }
        Ok(())
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
