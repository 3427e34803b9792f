//! Parser for the external hasher's console output.
//!
//! Two line shapes matter:
//!
//! ```text
//! Hashing pieces... [1.7 GiB/s] 14% [3s:18s]
//! Wrote /data/tmp/run/Movie.torrent (took 21s)
//! ```
//!
//! The bracketed `elapsed:remaining` pair is optional. Everything else is
//! ignored.

use regex::Regex;

#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    Progress {
        /// Throughput exactly as printed, e.g. `1.7 GiB/s`.
        speed: String,
        percent: u8,
        /// Seconds remaining when the line carries them.
        remaining_secs: Option<u64>,
    },
    Wrote {
        line: String,
    },
}

pub struct LineScanner {
    progress: Regex,
    eta: Regex,
    wrote: Regex,
}

impl Default for LineScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl LineScanner {
    pub fn new() -> Self {
        Self {
            progress: Regex::new(
                r"Hashing pieces.*?\[(\d+(?:\.\d+)? (?:G|M)(?:B|iB)/s)\]\s+(\d+)%",
            )
            .expect("static pattern is valid"),
            eta: Regex::new(r"\[(\d+)s:(\d+)s\]").expect("static pattern is valid"),
            wrote: Regex::new(r"(?i)\bwrote\b.*\.torrent").expect("static pattern is valid"),
        }
    }

    /// Classifies one line of output.
    pub fn scan(&self, line: &str) -> Option<ScanEvent> {
        let line = line.trim();

        if let Some(caps) = self.progress.captures(line) {
            let percent = caps[2].parse::<u64>().unwrap_or(0).min(100) as u8;
            let remaining_secs = self
                .eta
                .captures(line)
                .and_then(|eta| eta[2].parse::<u64>().ok());
            return Some(ScanEvent::Progress {
                speed: caps[1].to_string(),
                percent,
                remaining_secs,
            });
        }

        if self.wrote.is_match(line) {
            return Some(ScanEvent::Wrote {
                line: line.to_string(),
            });
        }

        None
    }
}

/// Cuts a byte stream into lines as it arrives. Progress bars redraw in
/// place with carriage returns, so `\r` ends a line just like `\n`.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    /// Feeds one chunk and returns the lines it completed. An unterminated
    /// tail is held until the next chunk.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                let pending = std::mem::take(&mut self.pending);
                lines.extend(to_line(&pending));
            } else {
                self.pending.push(byte);
            }
        }
        lines
    }

    /// Whatever was left when the stream closed.
    pub fn finish(self) -> Option<String> {
        to_line(&self.pending)
    }
}

fn to_line(bytes: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(bytes);
    let line = line.trim();
    (!line.is_empty()).then(|| line.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRANSCRIPT: &str = "Creating torrent for \"Movie.mkv\"...\n\
        Files being hashed:\n  └─ Movie.mkv (4.2 GiB)\n\
        Hashing pieces... [820.4 MiB/s] 3%\r\
        Hashing pieces... [1.7 GiB/s] 14% [3s:18s]\r\
        Hashing pieces... [1.8 GiB/s] 100% [21s:0s]\n\
        Wrote /data/tmp/run/Movie.torrent (took 21s)\n";

    #[test]
    fn test_transcript() {
        let scanner = LineScanner::new();
        let mut splitter = LineSplitter::default();
        let events: Vec<ScanEvent> = TRANSCRIPT
            .as_bytes()
            .chunks(7)
            .flat_map(|chunk| splitter.push(chunk))
            .filter_map(|line| scanner.scan(&line))
            .collect();

        assert_eq!(
            events,
            vec![
                ScanEvent::Progress {
                    speed: "820.4 MiB/s".into(),
                    percent: 3,
                    remaining_secs: None,
                },
                ScanEvent::Progress {
                    speed: "1.7 GiB/s".into(),
                    percent: 14,
                    remaining_secs: Some(18),
                },
                ScanEvent::Progress {
                    speed: "1.8 GiB/s".into(),
                    percent: 100,
                    remaining_secs: Some(0),
                },
                ScanEvent::Wrote {
                    line: "Wrote /data/tmp/run/Movie.torrent (took 21s)".into(),
                },
            ]
        );
    }

    #[test]
    fn test_unrelated_lines() {
        let scanner = LineScanner::new();
        assert_eq!(scanner.scan(""), None);
        assert_eq!(scanner.scan("Hashing pieces... starting"), None);
        assert_eq!(scanner.scan("wrote nothing"), None);
        assert_eq!(scanner.scan("Error: permission denied"), None);
    }

    #[test]
    fn test_whole_mb_speed() {
        let scanner = LineScanner::new();
        assert_eq!(
            scanner.scan("Hashing pieces [95 MB/s]  42%"),
            Some(ScanEvent::Progress {
                speed: "95 MB/s".into(),
                percent: 42,
                remaining_secs: None,
            })
        );
    }

    #[test]
    fn test_splitter_holds_partial_lines() {
        let mut splitter = LineSplitter::default();
        assert!(splitter.push(b"Hashing 1").is_empty());
        assert_eq!(splitter.push(b"0%\rHash"), ["Hashing 10%"]);
        assert_eq!(splitter.push(b"ing 50%\r\n\nb"), ["Hashing 50%"]);
        assert_eq!(splitter.finish().as_deref(), Some("b"));
    }

    #[test]
    fn test_splitter_empty_tail() {
        let mut splitter = LineSplitter::default();
        assert_eq!(splitter.push(b"a\r\nb\rc\n\n"), ["a", "b", "c"]);
        assert_eq!(splitter.finish(), None);
    }
}
