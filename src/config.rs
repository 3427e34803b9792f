//! Run configuration.
//!
//! A [`GenerationConfig`] can be loaded from a JSON "meta" file using the keys
//! upload tooling already produces (`isdir`, `is_disc`, `mkbrr`, `uuid`, ...)
//! and is then overridden field by field from the command line.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use tracing::warn;

use crate::torrent::piece_size::{floor_power_of_two, PIECE_SIZE_MAX, PIECE_SIZE_MIN};

/// Maximum piece size used when none is configured or the configured value
/// cannot be parsed (128 MiB).
pub const DEFAULT_MAX_PIECE_SIZE: u64 = 134_217_728;

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Upper bound on piece size in MiB, as supplied (may be non-numeric).
    #[serde(rename = "max_piece_size", deserialize_with = "loose_string")]
    pub max_piece_size_mib: Option<String>,
    #[serde(deserialize_with = "truthy")]
    pub debug: bool,
    #[serde(rename = "isdir", deserialize_with = "truthy")]
    pub is_directory: bool,
    #[serde(rename = "keep_folder", deserialize_with = "truthy")]
    pub keep_whole_folder: bool,
    /// Disc layouts (BDMV, VIDEO_TS, ...) are hashed without filtering.
    #[serde(rename = "is_disc", deserialize_with = "truthy")]
    pub is_disc_image: bool,
    #[serde(rename = "mkbrr", deserialize_with = "truthy")]
    pub use_external_backend: bool,
    #[serde(rename = "randomized", deserialize_with = "loose_count")]
    pub variant_count: u32,
    #[serde(rename = "uuid")]
    pub run_id: String,
    pub base_dir: PathBuf,
    pub tracker_url: Option<String>,
    pub filelist: Vec<PathBuf>,
}

impl GenerationConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading meta file {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing meta file {}", path.display()))
    }

    /// The configured maximum in bytes, or `None` when unset or unparseable.
    pub fn requested_max_piece_bytes(&self) -> Option<u64> {
        let raw = self.max_piece_size_mib.as_deref()?.trim();
        match raw.parse::<u64>() {
            Ok(mib) => Some(mib.saturating_mul(MIB)),
            Err(_) => {
                warn!("Invalid max_piece_size {:?}, using default piece length", raw);
                None
            }
        }
    }

    /// Effective piece-size ceiling: a power of two in
    /// `[PIECE_SIZE_MIN, PIECE_SIZE_MAX]`.
    pub fn max_piece_bytes(&self) -> u64 {
        let requested = self
            .requested_max_piece_bytes()
            .unwrap_or(DEFAULT_MAX_PIECE_SIZE);
        floor_power_of_two(requested.clamp(PIECE_SIZE_MIN, PIECE_SIZE_MAX))
    }

    /// Directory every file of this run is written to.
    pub fn run_dir(&self) -> PathBuf {
        self.base_dir.join("tmp").join(&self.run_id)
    }

    pub fn base_descriptor_path(&self) -> PathBuf {
        self.run_dir().join("BASE.torrent")
    }
}

fn truthy<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    use serde_json::Value;
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().map_or(false, |n| n != 0.0),
        Value::String(s) => !s.is_empty() && s != "0" && !s.eq_ignore_ascii_case("false"),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    })
}

fn loose_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    use serde_json::Value;
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

fn loose_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    use serde_json::Value;
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().map_or(0, |n| n.min(u32::MAX as u64) as u32),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}
