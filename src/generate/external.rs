//! Delegating hashing to the external `mkbrr` utility.
//!
//! Binaries ship in a tree under `<base_dir>/bin/mkbrr/<os>/<arch>/`. The
//! child's stdout and stderr are drained on reader threads into one channel
//! so neither pipe can fill up and stall it; the exit status is collected
//! only after both streams close.

use std::ffi::OsString;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::scanner::{LineScanner, LineSplitter, ScanEvent};
use super::Summary;
use crate::bencode::{BValue, Bencode};
use crate::error::{Result, TorrentError};
use crate::progress::{extrapolate_eta, Progress};
use crate::utils::format_mm_ss;

const BINARY_NAME: &str = "mkbrr";

/// Operating system and CPU, as reported by the standard library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn current() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }

    /// Location of the binary for this platform, whether or not it exists.
    pub fn binary_path(&self, base_dir: &Path) -> Result<PathBuf> {
        let root = base_dir.join("bin").join(BINARY_NAME);
        let arch = self.arch.to_ascii_lowercase();
        let unsupported = || TorrentError::UnsupportedPlatform {
            os: self.os.clone(),
            arch: self.arch.clone(),
        };

        let (os_dir, arch_dir, file) = match self.os.to_ascii_lowercase().as_str() {
            "windows" => ("windows", "x86_64", "mkbrr.exe"),
            "macos" | "darwin" if arch.contains("arm") || arch == "aarch64" => {
                ("macos", "arm64", BINARY_NAME)
            }
            "macos" | "darwin" => ("macos", "x86_64", BINARY_NAME),
            "linux" => {
                let arch_dir = if arch.contains("x86_64") {
                    "amd64"
                } else if arch.contains("armv6") {
                    "armv6"
                } else if arch.contains("aarch64") || arch.contains("arm64") {
                    "arm64"
                } else if arch.contains("arm") {
                    "arm"
                } else {
                    return Err(unsupported());
                };
                ("linux", arch_dir, BINARY_NAME)
            }
            _ => return Err(unsupported()),
        };

        Ok(root.join(os_dir).join(arch_dir).join(file))
    }
}

/// Resolves the binary for the running platform and checks it exists.
pub fn locate(base_dir: &Path) -> Result<PathBuf> {
    let path = Platform::current().binary_path(base_dir)?;
    if !path.is_file() {
        return Err(TorrentError::BinaryNotFound(path));
    }
    Ok(path)
}

/// `-l` exponent for a piece-size ceiling: `clamp(floor(log2(bytes)), 16, 27)`.
pub fn piece_length_power(max_bytes: u64) -> u32 {
    let log2 = if max_bytes == 0 { 0 } else { 63 - max_bytes.leading_zeros() };
    log2.clamp(16, 27)
}

/// One `mkbrr create` invocation.
#[derive(Debug, Clone)]
pub struct ExternalRequest<'a> {
    pub content_path: &'a Path,
    pub output_path: &'a Path,
    pub tracker_url: Option<&'a str>,
    pub randomize: bool,
    /// Requested piece-size ceiling; ignored when a tracker is given, since
    /// the utility then applies that tracker's own rules.
    pub max_piece_bytes: Option<u64>,
}

impl ExternalRequest<'_> {
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["create".into(), self.content_path.into()];
        if let Some(tracker) = self.tracker_url {
            args.push("-t".into());
            args.push(tracker.into());
        }
        if self.randomize {
            args.push("-e".into());
        }
        if let (Some(max), None) = (self.max_piece_bytes, self.tracker_url) {
            let power = piece_length_power(max);
            info!(
                "Setting mkbrr piece length to 2^{} ({:.2} MiB)",
                power,
                (1u64 << power) as f64 / (1024.0 * 1024.0)
            );
            args.push("-l".into());
            args.push(power.to_string().into());
        }
        args.push("-o".into());
        args.push(self.output_path.into());
        args
    }
}

/// What the utility reported before exiting.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalOutcome {
    pub exit_code: Option<i32>,
    pub wrote: bool,
}

/// Runs the utility to completion, feeding progress to `on_progress`.
pub fn run(
    binary: &Path,
    request: &ExternalRequest<'_>,
    on_progress: &mut dyn FnMut(&Progress),
) -> Result<ExternalOutcome> {
    make_executable(binary)?;

    let args = request.args();
    debug!("mkbrr cmd: {:?} {:?}", binary, args);

    let mut child = Command::new(binary)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let (tx, rx) = mpsc::channel::<String>();
    let mut readers = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        readers.push(forward_lines(stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(forward_lines(stderr, tx.clone()));
    }
    drop(tx);

    let scanner = LineScanner::new();
    let started = Instant::now();
    let mut wrote = false;

    for line in rx {
        match scanner.scan(&line) {
            Some(ScanEvent::Progress {
                speed,
                percent,
                remaining_secs,
            }) => {
                let eta = match remaining_secs {
                    Some(secs) => format_mm_ss(secs),
                    None => extrapolate_eta(started.elapsed(), percent),
                };
                on_progress(&Progress {
                    percent,
                    speed,
                    eta,
                });
            }
            Some(ScanEvent::Wrote { line }) => {
                info!("{}", line);
                wrote = true;
            }
            None => debug!("mkbrr: {}", line),
        }
    }

    for reader in readers {
        if reader.join().is_err() {
            warn!("mkbrr output reader panicked; some output may be lost");
        }
    }
    let status = child.wait()?;

    Ok(ExternalOutcome {
        exit_code: status.code(),
        wrote,
    })
}

/// Checks a finished run and reads back the descriptor it wrote.
pub fn validate(outcome: &ExternalOutcome, output_path: &Path) -> Result<Summary> {
    match outcome.exit_code {
        Some(0) => {}
        Some(code) => {
            return Err(TorrentError::ExternalBackend(format!(
                "mkbrr exited with status code {}",
                code
            )))
        }
        None => {
            return Err(TorrentError::ExternalBackend(
                "mkbrr was terminated by a signal".into(),
            ))
        }
    }

    if !outcome.wrote || !output_path.is_file() {
        return Err(TorrentError::ExternalBackend(format!(
            "expected torrent file {} was not created",
            output_path.display()
        )));
    }

    let invalid = |reason: String| TorrentError::InvalidOutput {
        path: output_path.to_path_buf(),
        reason,
    };
    let bytes = std::fs::read(output_path)?;
    let value = Bencode::decode_bytes(&bytes).map_err(|e| invalid(e.to_string()))?;
    let info = value
        .get("info")
        .ok_or_else(|| invalid("missing info dictionary".into()))?;
    let pieces = info
        .get("pieces")
        .and_then(|p| p.get_bytes().ok())
        .filter(|p| !p.is_empty())
        .ok_or_else(|| invalid("missing pieces hash".into()))?;

    let (files, total_bytes) = match info.get("files") {
        Some(BValue::List(files)) => (
            files.len(),
            files
                .iter()
                .filter_map(|f| f.get("length")?.get_integer().ok())
                .sum::<i64>(),
        ),
        _ => (
            1,
            info.get("length")
                .and_then(|l| l.get_integer().ok())
                .unwrap_or(0),
        ),
    };
    debug!(
        "mkbrr descriptor holds {} file(s), {:.2} MiB",
        files,
        total_bytes as f64 / (1024.0 * 1024.0)
    );
    if let Ok(hash) = Bencode::info_hash(&value) {
        debug!("mkbrr info hash: {}", hex::encode(hash));
    }
    Ok(Summary {
        piece_count: pieces.len() / 20,
        file_count: files,
        descriptor_size: bytes.len() as u64,
    })
}

fn forward_lines<R: Read + Send + 'static>(
    mut stream: R,
    tx: mpsc::Sender<String>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut splitter = LineSplitter::default();
        let mut buf = [0u8; 4096];
        loop {
            let read = match stream.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            };
            for line in splitter.push(&buf[..read]) {
                if tx.send(line).is_err() {
                    return;
                }
            }
        }
        if let Some(line) = splitter.finish() {
            let _ = tx.send(line);
        }
    })
}

#[cfg(unix)]
fn make_executable(binary: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(binary, std::fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_binary: &Path) -> Result<()> {
    Ok(())
}
