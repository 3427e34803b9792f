use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Result, TorrentError};

/// Extensions hashed when a release directory is filtered.
pub const MEDIA_EXTENSIONS: [&str; 3] = ["mkv", "mp4", "ts"];

/// Decides which files under a content directory are hashed.
pub trait FileFilter {
    fn accepts(&self, relative: &Path) -> bool;
}

/// Keeps every file; used for disc layouts where structure matters.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl FileFilter for AcceptAll {
    fn accepts(&self, _relative: &Path) -> bool {
        true
    }
}

/// Keeps media files and drops samples.
#[derive(Debug, Clone, Copy, Default)]
pub struct MediaFilter;

impl MediaFilter {
    pub fn is_media(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| MEDIA_EXTENSIONS.iter().any(|m| ext.eq_ignore_ascii_case(m)))
            .unwrap_or(false)
    }

    pub fn is_sample(path: &Path) -> bool {
        path.file_stem()
            .and_then(|stem| stem.to_str())
            .map(|stem| stem.to_ascii_lowercase().ends_with("sample"))
            .unwrap_or(false)
    }
}

impl FileFilter for MediaFilter {
    fn accepts(&self, relative: &Path) -> bool {
        Self::is_media(relative) && !Self::is_sample(relative)
    }
}

/// A file to hash, in descriptor order.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentFile {
    /// Path components relative to the content root.
    pub path: Vec<String>,
    pub length: u64,
    /// Where the bytes live on disk.
    pub source: PathBuf,
}

/// The ordered files a descriptor covers.
#[derive(Debug, Clone)]
pub struct ContentSet {
    name: String,
    root: PathBuf,
    single_file: bool,
    files: Vec<ContentFile>,
}

impl ContentSet {
    /// Collects the content at `path`. A regular file becomes a single-file
    /// set; a directory is walked recursively in sorted order and filtered.
    pub fn scan(path: &Path, filter: &dyn FileFilter) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                TorrentError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("no usable file name in {}", path.display()),
                ))
            })?
            .to_string();

        let metadata = fs::metadata(path)?;
        if metadata.is_file() {
            return Ok(Self {
                files: vec![ContentFile {
                    path: vec![name.clone()],
                    length: metadata.len(),
                    source: path.to_path_buf(),
                }],
                name,
                root: path.to_path_buf(),
                single_file: true,
            });
        }

        let files = walk(path, filter)?;
        if files.is_empty() {
            return Err(TorrentError::EmptyContent(path.to_path_buf()));
        }
        debug!("Collected {} file(s) under {}", files.len(), path.display());

        Ok(Self {
            name,
            root: path.to_path_buf(),
            single_file: false,
            files,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_single_file(&self) -> bool {
        self.single_file
    }

    pub fn files(&self) -> &[ContentFile] {
        &self.files
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.length).sum()
    }

    /// Sum of the UTF-8 lengths of every relative path (`/`-joined).
    pub fn pathname_byte_cost(&self) -> u64 {
        self.files
            .iter()
            .map(|f| {
                let separators = f.path.len().saturating_sub(1);
                (f.path.iter().map(String::len).sum::<usize>() + separators) as u64
            })
            .sum()
    }
}

/// Every accepted regular file under `root`, depth first with siblings in
/// name order. Symlinks are followed.
fn walk(root: &Path, filter: &dyn FileFilter) -> Result<Vec<ContentFile>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(true)
        .min_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        if !filter.accepts(relative) {
            continue;
        }

        let length = entry.metadata().map_err(std::io::Error::from)?.len();
        files.push(ContentFile {
            path: relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect(),
            length,
            source: entry.path().to_path_buf(),
        });
    }
    Ok(files)
}
