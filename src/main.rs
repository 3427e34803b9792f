use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod bencode;
mod cli;
mod config;
mod error;
mod generate;
mod progress;
mod torrent;
mod utils;

use bencode::Bencode;
use cli::Command;
use config::GenerationConfig;
use generate::Generator;
use torrent::{sanitize, variants, Descriptor};

fn main() -> Result<()> {
    let args = cli::Args::parse();
    let mut config = args.base_config()?;

    let default_level = if config.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    debug!("Command: {:?}", args.command);

    match args.command {
        Command::Create {
            path,
            name,
            tracker,
            max_piece_size,
            external,
            keep_folder,
            disc,
            randomized,
            run,
        } => {
            run.apply(&mut config, &path);
            config.is_directory = path.is_dir();
            config.use_external_backend |= external;
            config.keep_whole_folder |= keep_folder;
            config.is_disc_image |= disc;
            if tracker.is_some() {
                config.tracker_url = tracker;
            }
            if max_piece_size.is_some() {
                config.max_piece_size_mib = max_piece_size;
            }
            if let Some(count) = randomized {
                config.variant_count = count;
            }
            create(&config, &path, &name)
        }
        Command::Rebase { torrent, run } => {
            run.apply(&mut config, &torrent);
            let base = sanitize::write_base(&torrent, &config.base_descriptor_path())
                .with_context(|| format!("rebasing {}", torrent.display()))?;
            println!("{}", base.display());
            Ok(())
        }
        Command::Randomize { path, count, run } => {
            run.apply(&mut config, &path);
            randomize(&config, &path, count)
        }
        Command::Info { path } => {
            let descriptor = Descriptor::read(&path)
                .with_context(|| format!("reading descriptor {}", path.display()))?;
            println!("{}", descriptor);
            println!("Piece Hashes:");
            for hash in descriptor.info.piece_hashes() {
                println!("{}", hex::encode(hash));
            }

            let raw = Bencode::decode_file(&path)?;
            println!("Stored Info Hash: {}", hex::encode(Bencode::info_hash(&raw)?));
            println!("{}", serde_json::to_string_pretty(&raw.to_json())?);
            Ok(())
        }
    }
}

fn create(config: &GenerationConfig, path: &Path, name: &str) -> Result<()> {
    let result = Generator::new(config)
        .create(path, name)
        .with_context(|| format!("creating descriptor for {}", path.display()))?;
    info!(
        "{:?} backend wrote {} ({} pieces, {} file(s)) in {:.2}s",
        result.backend,
        result.path.display(),
        result.piece_count,
        result.file_count,
        result.elapsed.as_secs_f64()
    );

    if config.variant_count >= 1 {
        sanitize::write_base(&result.path, &config.base_descriptor_path())?;
        randomize(config, path, config.variant_count)?;
    }

    println!("{}", result.path.display());
    Ok(())
}

fn randomize(config: &GenerationConfig, path: &Path, count: u32) -> Result<()> {
    let source = path.to_string_lossy();
    for variant in variants::derive(&config.base_descriptor_path(), count, &source)? {
        println!("{}", variant.display());
    }
    Ok(())
}
