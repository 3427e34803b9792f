//! Descriptor generation with backend selection and fallback.
//!
//! A run moves through [`Stage`]s: the external `mkbrr` utility is tried
//! when configured, and any failure there (unsupported platform, missing
//! binary, non-zero exit, missing or invalid output) degrades to the
//! in-process hasher with a warning. Failures on the in-process path,
//! including post-write size verification, end the run.

pub mod external;
pub mod scanner;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::GenerationConfig;
use crate::error::{Result, TorrentError};
use crate::progress::Progress;
use crate::torrent::{
    piece_size, AcceptAll, ContentSet, DescriptorBuilder, FileFilter, MediaFilter, PieceHasher,
    Sha1PieceHasher,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    External,
    Internal,
}

/// What a written descriptor holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub piece_count: usize,
    pub file_count: usize,
    /// Encoded size in bytes.
    pub descriptor_size: u64,
}

/// A finished run. Failed runs surface as errors instead.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    pub path: PathBuf,
    pub backend: Backend,
    pub elapsed: Duration,
    pub piece_count: usize,
    pub file_count: usize,
    pub descriptor_size: u64,
}

impl GenerationResult {
    fn new(path: PathBuf, backend: Backend, started: Instant, summary: Summary) -> Self {
        Self {
            path,
            backend,
            elapsed: started.elapsed(),
            piece_count: summary.piece_count,
            file_count: summary.file_count,
            descriptor_size: summary.descriptor_size,
        }
    }
}

enum Stage {
    SelectBackend,
    RunExternal,
    ValidateExternal(external::ExternalOutcome),
    FallbackInternal(TorrentError),
    RunInternal,
    Done(GenerationResult),
}

pub struct Generator<'a> {
    config: &'a GenerationConfig,
    hasher: Box<dyn PieceHasher + 'a>,
    on_progress: Box<dyn FnMut(&Progress) + 'a>,
}

impl<'a> Generator<'a> {
    pub fn new(config: &'a GenerationConfig) -> Self {
        Self {
            config,
            hasher: Box::new(Sha1PieceHasher::default()),
            on_progress: Box::new(|p: &Progress| info!("Hashing... {}", p)),
        }
    }

    pub fn with_hasher(mut self, hasher: impl PieceHasher + 'a) -> Self {
        self.hasher = Box::new(hasher);
        self
    }

    pub fn with_progress(mut self, on_progress: impl FnMut(&Progress) + 'a) -> Self {
        self.on_progress = Box::new(on_progress);
        self
    }

    /// Where the descriptor named `output_name` lands for this run.
    pub fn output_path(&self, output_name: &str) -> PathBuf {
        self.config.run_dir().join(format!("{}.torrent", output_name))
    }

    /// Produces `<base_dir>/tmp/<run_id>/<output_name>.torrent` for the
    /// content at `path`.
    pub fn create(&mut self, path: &Path, output_name: &str) -> Result<GenerationResult> {
        let started = Instant::now();
        let content_path = resolve_content_path(self.config, path)?;
        let output_path = self.output_path(output_name);
        std::fs::create_dir_all(self.config.run_dir())?;

        let mut stage = Stage::SelectBackend;

        loop {
            stage = match stage {
                Stage::SelectBackend if self.config.use_external_backend => Stage::RunExternal,
                Stage::SelectBackend => Stage::RunInternal,
                Stage::RunExternal => match self.run_external(&content_path, &output_path) {
                    Ok(outcome) => Stage::ValidateExternal(outcome),
                    Err(e) => Stage::FallbackInternal(e),
                },
                Stage::ValidateExternal(outcome) => {
                    match external::validate(&outcome, &output_path) {
                        Ok(summary) => {
                            debug!(
                                "Successfully created torrent with {} file(s), {} pieces",
                                summary.file_count, summary.piece_count
                            );
                            Stage::Done(GenerationResult::new(
                                output_path.clone(),
                                Backend::External,
                                started,
                                summary,
                            ))
                        }
                        Err(e) => Stage::FallbackInternal(e),
                    }
                }
                Stage::FallbackInternal(e) => {
                    warn!("Error using mkbrr: {}", e);
                    warn!("Falling back to the built-in hasher");
                    Stage::RunInternal
                }
                Stage::RunInternal => {
                    let summary = self.run_internal(&content_path, &output_path)?;
                    Stage::Done(GenerationResult::new(
                        output_path.clone(),
                        Backend::Internal,
                        started,
                        summary,
                    ))
                }
                Stage::Done(result) => {
                    piece_size::within_size_limit(result.descriptor_size);
                    debug!("torrent created in {:.4} seconds", result.elapsed.as_secs_f64());
                    info!(".torrent created: {}", result.path.display());
                    return Ok(result);
                }
            };
        }
    }

    fn run_external(
        &mut self,
        content_path: &Path,
        output_path: &Path,
    ) -> Result<external::ExternalOutcome> {
        let binary = external::locate(&self.config.base_dir)?;
        let request = external::ExternalRequest {
            content_path,
            output_path,
            tracker_url: self.config.tracker_url.as_deref(),
            randomize: self.config.variant_count >= 1,
            max_piece_bytes: self.config.requested_max_piece_bytes(),
        };
        let outcome = external::run(&binary, &request, &mut *self.on_progress)?;
        if outcome.exit_code != Some(0) {
            warn!("mkbrr exited with non-zero status code: {:?}", outcome.exit_code);
        }
        Ok(outcome)
    }

    fn run_internal(&mut self, content_path: &Path, output_path: &Path) -> Result<Summary> {
        let filter: &dyn FileFilter = if self.config.is_disc_image {
            &AcceptAll
        } else {
            &MediaFilter
        };
        let content = ContentSet::scan(content_path, filter)?;
        let builder = DescriptorBuilder::new(&content, self.config.max_piece_bytes());

        let descriptor = builder.build(self.hasher.as_ref(), &mut *self.on_progress)?;
        let descriptor_size = descriptor.write(output_path)?;
        builder.verify(output_path)?;

        Ok(Summary {
            piece_count: descriptor.info.total_pieces(),
            file_count: descriptor.info.file_count(),
            descriptor_size,
        })
    }
}

/// Narrows a release directory to its single media file when that is all
/// it holds, unless the whole folder was requested.
pub fn resolve_content_path(config: &GenerationConfig, path: &Path) -> Result<PathBuf> {
    if !config.is_directory || config.keep_whole_folder || !path.is_dir() {
        if config.keep_whole_folder {
            info!("--keep-folder was specified. Using complete folder for torrent creation.");
        }
        return Ok(path.to_path_buf());
    }

    let mut media = Vec::new();
    for entry in std::fs::read_dir(path)? {
        let entry_path = entry?.path();
        if entry_path.is_file()
            && MediaFilter::is_media(&entry_path)
            && !MediaFilter::is_sample(&entry_path)
        {
            media.push(entry_path);
        }
    }

    if media.len() == 1 {
        let single = config
            .filelist
            .first()
            .cloned()
            .unwrap_or_else(|| media.remove(0));
        debug!("Single media file in {}, using {}", path.display(), single.display());
        return Ok(single);
    }
    Ok(path.to_path_buf())
}
