//! Checksum variants of a base descriptor.
//!
//! Each copy gets its own random `entropy` value in the info dictionary, so
//! it hashes to a different info hash while piece data stays untouched.
//! Two copies drawing the same marker would share an info hash; with a
//! million possible values that is accepted rather than prevented.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::metainfo::Descriptor;
use crate::error::Result;
use crate::utils::{random_marker, sanitize_name};

/// File name of the `index`-th variant for the content at `source`; only
/// the last path component is used.
pub fn variant_file_name(index: u32, source: &str) -> String {
    let name = Path::new(source)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(source);
    format!("[RAND-{}]{}.torrent", index, sanitize_name(name))
}

/// Writes `count` variants of the descriptor at `base_path` into its
/// directory and returns their paths in order.
pub fn derive(base_path: &Path, count: u32, source_name: &str) -> Result<Vec<PathBuf>> {
    let base = Descriptor::read(base_path)?;
    let dir = base_path.parent().unwrap_or_else(|| Path::new("."));

    let mut written = Vec::with_capacity(count as usize);
    for index in 1..=count {
        let mut variant = base.clone();
        variant.info.entropy = Some(random_marker());

        let path = dir.join(variant_file_name(index, source_name));
        variant.write(&path)?;
        debug!(
            "Variant {} marker {:?} -> {}",
            index,
            variant.info.entropy,
            path.display()
        );
        written.push(path);
    }

    info!("Derived {} variant(s) from {}", count, base_path.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bencode::Bencode;
    use crate::torrent::metainfo::Info;
    use crate::utils::MARKER_RANGE;
    use std::collections::HashSet;

    fn write_base(dir: &Path) -> PathBuf {
        let mut info = Info::single("Movie.mkv".into(), 16_384, (0..100u8).collect(), 80_000);
        info.private = Some(1);
        let base = Descriptor {
            announce: "https://fake.tracker".into(),
            comment: None,
            creation_date: Some(1),
            created_by: None,
            encoding: None,
            info,
        };
        let path = dir.join("BASE.torrent");
        base.write(&path).unwrap();
        path
    }

    #[test]
    fn test_variant_file_name() {
        assert_eq!(
            variant_file_name(3, "My Movie (2021).mkv"),
            "[RAND-3]My.Movie.2021.mkv.torrent"
        );
    }

    #[test]
    fn test_five_variants_share_pieces() {
        let dir = tempfile::tempdir().unwrap();
        let base_path = write_base(dir.path());
        let base = Descriptor::read(&base_path).unwrap();
        let base_hash = base.info_hash().unwrap();

        let paths = derive(&base_path, 5, "/data/My Movie.mkv").unwrap();
        assert_eq!(paths.len(), 5);

        let mut hashes = HashSet::new();
        for (i, path) in paths.iter().enumerate() {
            let name = path.file_name().unwrap().to_str().unwrap();
            assert_eq!(name, format!("[RAND-{}]My.Movie.mkv.torrent", i + 1));

            let variant = Descriptor::read(path).unwrap();
            assert_eq!(variant.info.pieces, base.info.pieces);
            assert_eq!(variant.info.piece_length, base.info.piece_length);
            assert!(MARKER_RANGE.contains(&variant.info.entropy.unwrap()));

            let raw = Bencode::decode_file(path).unwrap();
            assert!(raw.get("info").unwrap().get("entropy").is_some());

            hashes.insert(variant.info_hash().unwrap());
        }
        assert!(!hashes.contains(&base_hash));
        // Markers may collide; with 5 draws from 999999 that is vanishingly rare.
        assert!(hashes.len() >= 4);
    }

    #[test]
    fn test_zero_count_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let base_path = write_base(dir.path());
        assert!(derive(&base_path, 0, "x").unwrap().is_empty());
    }
}
