//! Canonicalizes an inherited descriptor into the base used for variants.
//!
//! Only `name`, `piece length`, `pieces`, `private`, `source` and one of
//! `files`/`length` survive in `info`; the top level keeps `announce`,
//! `comment`, `creation date`, `created by`, `encoding` and `info`. Tracker,
//! comment, creator, privacy and source are overwritten with our values.

use std::path::{Path, PathBuf};

use tracing::info;

use super::metainfo::Descriptor;
use super::{COMMENT, CREATED_BY, PLACEHOLDER_TRACKER, SOURCE_TAG};
use crate::error::Result;

/// Rewrites `descriptor` in place to the canonical field set.
pub fn sanitize(descriptor: &mut Descriptor) {
    descriptor.announce = PLACEHOLDER_TRACKER.to_string();
    descriptor.comment = Some(COMMENT.to_string());
    descriptor.created_by = Some(CREATED_BY.to_string());
    descriptor.info.private = Some(1);
    descriptor.info.source = Some(SOURCE_TAG.to_string());
    descriptor.info.entropy = None;
}

/// Reads an inherited descriptor and writes its canonical form to
/// `base_path`, replacing any previous base.
///
/// Fails with [`crate::error::TorrentError::MalformedDescriptor`] when the
/// input has neither `files` nor `length`.
pub fn write_base(inherited: &Path, base_path: &Path) -> Result<PathBuf> {
    let bytes = std::fs::read(inherited)?;
    let mut descriptor = Descriptor::from_bytes(&bytes)?;
    sanitize(&mut descriptor);

    if let Some(parent) = base_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    descriptor.write(base_path)?;
    info!(
        "Wrote base descriptor {} from {}",
        base_path.display(),
        inherited.display()
    );
    Ok(base_path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bencode::{BValue, Bencode};
    use crate::error::TorrentError;
    use std::collections::BTreeMap;

    fn string(s: &str) -> BValue {
        BValue::String(s.as_bytes().to_vec())
    }

    fn inherited(layout: Option<(&str, BValue)>) -> BValue {
        let mut info = BTreeMap::from([
            ("name".to_string(), string("Some.Release")),
            ("piece length".to_string(), BValue::Integer(262_144)),
            ("pieces".to_string(), BValue::String(vec![0x11; 40])),
            ("source".to_string(), string("OTHER")),
            ("x_cross_seed".to_string(), string("abc")),
            ("meta version".to_string(), BValue::Integer(1)),
        ]);
        if let Some((key, value)) = layout {
            info.insert(key.to_string(), value);
        }
        BValue::Dict(BTreeMap::from([
            ("announce".to_string(), string("https://old.tracker/announce")),
            (
                "announce-list".to_string(),
                BValue::List(vec![BValue::List(vec![string("https://old.tracker")])]),
            ),
            ("comment".to_string(), string("old comment")),
            ("created by".to_string(), string("someone")),
            ("creation date".to_string(), BValue::Integer(1_600_000_000)),
            ("encoding".to_string(), string("UTF-8")),
            ("url-list".to_string(), BValue::List(vec![string("http://seed")])),
            ("info".to_string(), BValue::Dict(info)),
        ]))
    }

    fn keys(value: &BValue) -> Vec<String> {
        value.get_dict().unwrap().keys().cloned().collect()
    }

    fn run(input: &BValue) -> Result<BValue> {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("inherited.torrent");
        std::fs::write(&source, Bencode::encode_bytes(input).unwrap()).unwrap();
        let base = dir.path().join("tmp/run/BASE.torrent");
        write_base(&source, &base)?;
        Ok(Bencode::decode_file(&base).unwrap())
    }

    #[test]
    fn test_multi_file_input_is_whitelisted() {
        let files = BValue::List(vec![BValue::Dict(BTreeMap::from([
            ("length".to_string(), BValue::Integer(12)),
            ("path".to_string(), BValue::List(vec![string("a.mkv")])),
        ]))]);
        let output = run(&inherited(Some(("files", files)))).unwrap();

        assert_eq!(
            keys(&output),
            ["announce", "comment", "created by", "creation date", "encoding", "info"]
        );
        let info = output.get("info").unwrap();
        assert_eq!(
            keys(info),
            ["files", "name", "piece length", "pieces", "private", "source"]
        );
        assert_eq!(info.get("private").unwrap().get_integer().unwrap(), 1);
        assert_eq!(info.get("source").unwrap().get_bytes().unwrap(), SOURCE_TAG.as_bytes());
        assert_eq!(info.get("pieces").unwrap().get_bytes().unwrap(), &[0x11; 40][..]);
        assert_eq!(
            output.get("announce").unwrap().get_bytes().unwrap(),
            PLACEHOLDER_TRACKER.as_bytes()
        );
        assert_eq!(
            output.get("creation date").unwrap().get_integer().unwrap(),
            1_600_000_000
        );
    }

    #[test]
    fn test_single_file_input_keeps_length() {
        let output = run(&inherited(Some(("length", BValue::Integer(999))))).unwrap();
        let info = output.get("info").unwrap();
        assert_eq!(
            keys(info),
            ["length", "name", "piece length", "pieces", "private", "source"]
        );
        assert_eq!(info.get("length").unwrap().get_integer().unwrap(), 999);
    }

    #[test]
    fn test_missing_layout_is_malformed() {
        let result = run(&inherited(None));
        assert!(matches!(result, Err(TorrentError::MalformedDescriptor(_))));
    }

    #[test]
    fn test_previous_entropy_is_dropped() {
        let mut descriptor = Descriptor::from_bytes(
            &Bencode::encode_bytes(&inherited(Some(("length", BValue::Integer(1))))).unwrap(),
        )
        .unwrap();
        descriptor.info.entropy = Some(5);
        sanitize(&mut descriptor);
        assert_eq!(descriptor.info.entropy, None);
        assert_eq!(descriptor.created_by.as_deref(), Some(CREATED_BY));
    }
}
