use rand::Rng;
use regex::Regex;

/// Inclusive range of entropy markers stamped into derived descriptors.
pub const MARKER_RANGE: std::ops::RangeInclusive<u32> = 1..=999_999;

pub fn random_marker() -> u32 {
    rand::thread_rng().gen_range(MARKER_RANGE)
}

/// Collapses every run of characters outside `[0-9a-zA-Z[]'-]` into a
/// single `.`, giving a filesystem-safe token.
pub fn sanitize_name(name: &str) -> String {
    let pattern = Regex::new(r"[^0-9a-zA-Z\[\]'\-]+").expect("static pattern is valid");
    pattern.replace_all(name, ".").into_owned()
}

/// Formats a duration in seconds as `MM:SS`. Minutes are not wrapped at 60.
pub fn format_mm_ss(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
