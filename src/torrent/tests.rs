//! End-to-end generation flows.
//!
//! # Coverage
//!
//! - In-process hashing of a single media file and of a whole folder
//! - Falling back when the external utility is missing or fails
//! - Accepting a descriptor produced by a (scripted) external utility
//! - Rebasing the result and deriving checksum variants from it
//!
//! External runs use a small shell script placed in the binary lookup tree,
//! so those tests only run on unix.

use super::metainfo::Layout;
use super::*;
use crate::config::GenerationConfig;
use crate::generate::{Backend, Generator};
use crate::progress::Progress;
use sha1::{Digest, Sha1};
use std::fs;
use std::path::{Path, PathBuf};

fn config(base_dir: &Path) -> GenerationConfig {
    GenerationConfig {
        base_dir: base_dir.to_path_buf(),
        run_id: "run".into(),
        is_directory: true,
        ..Default::default()
    }
}

/// A release folder holding one feature, a sample and an info file.
fn release(dir: &Path) -> (PathBuf, Vec<u8>) {
    let root = dir.join("Movie.2020.1080p");
    fs::create_dir_all(&root).unwrap();
    let data: Vec<u8> = (0..40_000u32).map(|i| (i % 251) as u8).collect();
    fs::write(root.join("Movie.2020.1080p.mkv"), &data).unwrap();
    fs::write(root.join("Movie.2020.1080p-sample.mkv"), vec![1u8; 500]).unwrap();
    fs::write(root.join("Movie.2020.1080p.nfo"), b"release notes").unwrap();
    (root, data)
}

#[test]
fn test_internal_single_media_file() {
    let dir = tempfile::tempdir().unwrap();
    let (root, data) = release(dir.path());
    let config = config(dir.path());

    let mut updates: Vec<Progress> = Vec::new();
    let result = Generator::new(&config)
        .with_progress(|p| updates.push(p.clone()))
        .create(&root, "BASE")
        .unwrap();

    assert_eq!(result.backend, Backend::Internal);
    assert_eq!(result.path, dir.path().join("tmp/run/BASE.torrent"));
    assert_eq!(result.file_count, 1);
    assert_eq!(result.piece_count, 3);
    assert_eq!(updates.first().map(|p| p.percent), Some(0));
    assert_eq!(updates.last().map(|p| p.percent), Some(100));

    let bytes = fs::read(&result.path).unwrap();
    assert_eq!(result.descriptor_size, bytes.len() as u64);

    let descriptor = Descriptor::from_bytes(&bytes).unwrap();
    assert_eq!(descriptor.info.name, "Movie.2020.1080p.mkv");
    assert_eq!(descriptor.info.piece_length, 16_384);
    assert_eq!(descriptor.info.layout(), Some(Layout::Single { length: 40_000 }));
    assert!(descriptor.info.is_private());

    let hashes = descriptor.info.piece_hashes();
    assert_eq!(hashes[0].as_slice(), Sha1::digest(&data[..16_384]).as_slice());
    assert_eq!(hashes[2].as_slice(), Sha1::digest(&data[32_768..]).as_slice());
}

#[test]
fn test_internal_whole_folder() {
    let dir = tempfile::tempdir().unwrap();
    let (root, _) = release(dir.path());
    fs::create_dir_all(root.join("Extras")).unwrap();
    fs::write(root.join("Extras/Interview.mp4"), vec![9u8; 20_000]).unwrap();

    let config = GenerationConfig {
        keep_whole_folder: true,
        ..config(dir.path())
    };
    let result = Generator::new(&config)
        .with_hasher(Sha1PieceHasher { interval: 1 })
        .create(&root, "BASE")
        .unwrap();
    assert_eq!(result.file_count, 2);
    assert_eq!(result.descriptor_size, fs::metadata(&result.path).unwrap().len());
    assert!(piece_size::within_size_limit(result.descriptor_size));

    let descriptor = Descriptor::read(&result.path).unwrap();
    assert_eq!(descriptor.info.name, "Movie.2020.1080p");
    assert_eq!(descriptor.info.total_length(), 60_000);
    match descriptor.info.layout() {
        Some(Layout::Multi { files }) => {
            let paths: Vec<String> = files.iter().map(|f| f.path.join("/")).collect();
            assert_eq!(paths, ["Extras/Interview.mp4", "Movie.2020.1080p.mkv"]);
        }
        other => panic!("expected multi-file layout, got {:?}", other),
    }
}

#[test]
fn test_disc_image_keeps_every_file() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("DISC");
    fs::create_dir_all(root.join("BDMV/STREAM")).unwrap();
    fs::write(root.join("BDMV/index.bdmv"), vec![2u8; 100]).unwrap();
    fs::write(root.join("BDMV/STREAM/00000.m2ts"), vec![3u8; 5_000]).unwrap();

    let config = GenerationConfig {
        is_disc_image: true,
        ..config(dir.path())
    };
    let result = Generator::new(&config).create(&root, "BASE").unwrap();
    assert_eq!(result.file_count, 2);
}

#[test]
fn test_missing_external_binary_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let (root, _) = release(dir.path());
    let config = GenerationConfig {
        use_external_backend: true,
        ..config(dir.path())
    };

    let result = Generator::new(&config).create(&root, "BASE").unwrap();
    assert_eq!(result.backend, Backend::Internal);
    assert!(Descriptor::read(&result.path).is_ok());
}

#[cfg(unix)]
fn install_script(base_dir: &Path, body: &str) -> Option<PathBuf> {
    let path = crate::generate::external::Platform::current()
        .binary_path(base_dir)
        .ok()?;
    fs::create_dir_all(path.parent()?).unwrap();
    fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
    Some(path)
}

#[cfg(unix)]
#[test]
fn test_failing_external_binary_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let (root, _) = release(dir.path());
    let body = "echo 'Hashing pieces... [10.0 MiB/s] 50%'\necho 'boom' >&2\nexit 1\n";
    if install_script(dir.path(), body).is_none() {
        return;
    }

    let config = GenerationConfig {
        use_external_backend: true,
        ..config(dir.path())
    };
    let result = Generator::new(&config).create(&root, "BASE").unwrap();

    assert_eq!(result.backend, Backend::Internal);
    let descriptor = Descriptor::read(&result.path).unwrap();
    assert_eq!(descriptor.info.total_pieces(), 3);
}

#[cfg(unix)]
#[test]
fn test_external_binary_output_is_used() {
    let dir = tempfile::tempdir().unwrap();
    let (root, _) = release(dir.path());

    let mut info =
        metainfo::Info::single("Movie.2020.1080p.mkv".into(), 65_536, vec![4u8; 20], 40_000);
    info.private = Some(1);
    let prebuilt = Descriptor {
        announce: "https://t.example/announce".into(),
        comment: None,
        creation_date: None,
        created_by: Some("mkbrr".into()),
        encoding: None,
        info,
    };
    let prebuilt_path = dir.path().join("prebuilt.torrent");
    prebuilt.write(&prebuilt_path).unwrap();

    let body = format!(
        r#"out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then out="$2"; fi
  shift
done
printf 'Hashing pieces... [1.5 GiB/s] 50%% [1s:1s]\r'
printf 'Hashing pieces... [1.6 GiB/s] 100%% [2s:0s]\n'
cp "{}" "$out"
echo "Wrote $out (took 2s)"
"#,
        prebuilt_path.display()
    );
    if install_script(dir.path(), &body).is_none() {
        return;
    }

    let config = GenerationConfig {
        use_external_backend: true,
        ..config(dir.path())
    };
    let mut updates: Vec<Progress> = Vec::new();
    let result = Generator::new(&config)
        .with_progress(|p| updates.push(p.clone()))
        .create(&root, "BASE")
        .unwrap();

    assert_eq!(result.backend, Backend::External);
    assert_eq!(result.piece_count, 1);
    assert_eq!(result.file_count, 1);
    assert_eq!(Descriptor::read(&result.path).unwrap(), prebuilt);

    let seen: Vec<(u8, &str)> = updates.iter().map(|p| (p.percent, p.eta.as_str())).collect();
    assert_eq!(seen, [(50, "00:01"), (100, "00:00")]);
    assert_eq!(updates[0].speed, "1.5 GiB/s");
}

#[test]
fn test_rebase_then_randomize() {
    let dir = tempfile::tempdir().unwrap();
    let (root, _) = release(dir.path());
    let config = config(dir.path());

    let result = Generator::new(&config).create(&root, "Movie").unwrap();
    let base_path = sanitize::write_base(&result.path, &config.base_descriptor_path()).unwrap();
    assert_eq!(base_path, dir.path().join("tmp/run/BASE.torrent"));

    let base = Descriptor::read(&base_path).unwrap();
    assert_eq!(base.info.entropy, None);
    assert_eq!(base.info.source.as_deref(), Some(SOURCE_TAG));

    let variants = variants::derive(&base_path, 3, &root.to_string_lossy()).unwrap();
    assert_eq!(variants.len(), 3);
    assert_eq!(
        variants[0],
        dir.path().join("tmp/run/[RAND-1]Movie.2020.1080p.torrent")
    );
    for path in &variants {
        let variant = Descriptor::read(path).unwrap();
        assert_eq!(variant.info.pieces, base.info.pieces);
        assert!(variant.info.entropy.is_some());
        assert_ne!(variant.info_hash().unwrap(), base.info_hash().unwrap());
    }
}
