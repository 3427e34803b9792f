use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::GenerationConfig;
use crate::utils::sanitize_name;

/// Command line arguments for torrent-create
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Args {
    /// JSON meta file supplying defaults for the run
    #[arg(long, global = true)]
    pub meta: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a descriptor for a file or directory
    Create {
        /// The content to hash
        path: PathBuf,
        /// Output file name, without the .torrent extension
        #[arg(long, default_value = "BASE")]
        name: String,
        /// Announce URL handed to the external hasher
        #[arg(long)]
        tracker: Option<String>,
        /// Upper bound on piece size in MiB
        #[arg(long)]
        max_piece_size: Option<String>,
        /// Try the external mkbrr hasher first
        #[arg(long)]
        external: bool,
        /// Hash the whole folder even if it holds a single media file
        #[arg(long)]
        keep_folder: bool,
        /// Treat the content as a disc image and hash every file
        #[arg(long)]
        disc: bool,
        /// Number of checksum variants to derive afterwards
        #[arg(long)]
        randomized: Option<u32>,
        #[command(flatten)]
        run: RunDir,
    },
    /// Rewrite an existing descriptor into this run's BASE.torrent
    Rebase {
        /// The descriptor to inherit
        torrent: PathBuf,
        #[command(flatten)]
        run: RunDir,
    },
    /// Derive checksum variants from this run's BASE.torrent
    Randomize {
        /// The content the descriptor describes, used for variant names
        path: PathBuf,
        /// How many variants to write
        #[arg(long, default_value_t = 1)]
        count: u32,
        #[command(flatten)]
        run: RunDir,
    },
    /// Info about a torrent file
    Info {
        /// The path to the torrent file
        path: PathBuf,
    },
}

/// Location of a run's working directory, `<base-dir>/tmp/<run-id>`.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct RunDir {
    #[arg(long)]
    pub base_dir: Option<PathBuf>,
    #[arg(long)]
    pub run_id: Option<String>,
}

impl RunDir {
    /// Fills `config`'s run location from the flags, defaulting the base
    /// directory to `.` and the run id to the sanitized content name.
    pub fn apply(&self, config: &mut GenerationConfig, content: &Path) {
        if let Some(base_dir) = &self.base_dir {
            config.base_dir = base_dir.clone();
        }
        if config.base_dir.as_os_str().is_empty() {
            config.base_dir = PathBuf::from(".");
        }
        if let Some(run_id) = &self.run_id {
            config.run_id = run_id.clone();
        }
        if config.run_id.is_empty() {
            let name = content
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "run".to_string());
            config.run_id = sanitize_name(&name);
        }
    }
}

impl Args {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Configuration from `--meta` (or defaults), with `--debug` applied.
    pub fn base_config(&self) -> Result<GenerationConfig> {
        let mut config = match &self.meta {
            Some(path) => GenerationConfig::from_json_file(path)?,
            None => GenerationConfig::default(),
        };
        config.debug |= self.debug;
        Ok(config)
    }
}
