//! Adaptive piece-size selection.
//!
//! Trackers reject descriptors that are too large (> 250 KB) and dislike
//! ones with too few or too many pieces. [`solve`] walks power-of-two piece
//! sizes from 4 MiB until an estimate of the descriptor size and the piece
//! count both land in an acceptable band, or a bound is hit.

use tracing::{debug, warn};

/// Smallest piece size ever produced (16 KiB).
pub const PIECE_SIZE_MIN: u64 = 16_384;
/// Largest piece size the protocol tooling accepts (256 MiB).
pub const PIECE_SIZE_MAX: u64 = 268_435_456;
/// Where the search starts (4 MiB).
pub const PIECE_SIZE_START: u64 = 4_194_304;

const SHA1_LEN: u64 = 20;
/// Largest descriptor, in bytes, trackers accept.
pub const DESCRIPTOR_SIZE_LIMIT: u64 = 250_000;
const DESCRIPTOR_SIZE_FLOOR: u64 = 40_960;
const PIECES_MIN: u64 = 750;
const PIECES_MAX: u64 = 2_200;
const MAX_SEARCH_STEPS: usize = 64;

/// Largest power of two `<= n`; `n` must be non-zero.
pub fn floor_power_of_two(n: u64) -> u64 {
    1 << (63 - n.leading_zeros())
}

/// Rough size of the descriptor for a given piece size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Estimate {
    pub num_pieces: u64,
    pub descriptor_size: u64,
}

impl Estimate {
    /// `20 + 20 * pieces + scaled path cost`. Long file lists amortize
    /// their per-entry overhead, so the path cost is discounted by tier.
    pub fn new(total_size: u64, piece_size: u64, pathname_bytes: u64, file_count: usize) -> Self {
        let num_pieces = total_size.div_ceil(piece_size);
        let scaled_pathname = if file_count > 1000 {
            pathname_bytes * 71 / 100
        } else if file_count > 500 {
            pathname_bytes * 4 / 5
        } else {
            pathname_bytes
        };
        Self {
            num_pieces,
            descriptor_size: SHA1_LEN + num_pieces * SHA1_LEN + scaled_pathname,
        }
    }

    fn on_target(&self) -> bool {
        let size_ok = self.descriptor_size <= DESCRIPTOR_SIZE_LIMIT;
        let pieces_ok = (PIECES_MIN..=PIECES_MAX).contains(&self.num_pieces);
        let small_but_dense = self.num_pieces < PIECES_MIN
            && (DESCRIPTOR_SIZE_FLOOR..=DESCRIPTOR_SIZE_LIMIT).contains(&self.descriptor_size);
        size_ok && (pieces_ok || small_but_dense)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Step {
    /// Keep the current size.
    Stop,
    /// Take this size and stop without re-evaluating.
    StopAt(u64),
    /// Take this size and evaluate again.
    Continue(u64),
}

/// Chooses a power-of-two piece size in `[PIECE_SIZE_MIN, configured_max]`.
///
/// `configured_max` is itself clamped to `[PIECE_SIZE_MIN, PIECE_SIZE_MAX]`
/// and rounded down to a power of two. The result depends only on the
/// arguments.
pub fn solve(total_size: u64, pathname_bytes: u64, file_count: usize, configured_max: u64) -> u64 {
    let max = floor_power_of_two(configured_max.clamp(PIECE_SIZE_MIN, PIECE_SIZE_MAX));
    debug!("Max size: {}", max);

    let mut piece_size = PIECE_SIZE_START.min(max);
    let mut estimate = Estimate::new(total_size, piece_size, pathname_bytes, file_count);

    for _ in 0..MAX_SEARCH_STEPS {
        if estimate.on_target() {
            break;
        }
        match next_step(piece_size, &estimate, max) {
            Step::Stop => break,
            Step::StopAt(next) => {
                piece_size = next;
                break;
            }
            Step::Continue(next) => {
                piece_size = next;
                estimate = Estimate::new(total_size, piece_size, pathname_bytes, file_count);
            }
        }
    }

    debug!(
        "Piece size {} for {} bytes in {} file(s)",
        piece_size, total_size, file_count
    );
    piece_size
}

/// One search move; the first matching rule wins. Reaching either clamp
/// always stops the search.
fn next_step(piece_size: u64, estimate: &Estimate, max: u64) -> Step {
    let Estimate {
        num_pieces,
        descriptor_size,
    } = *estimate;

    if num_pieces > 1000 && num_pieces < 2000 && descriptor_size < DESCRIPTOR_SIZE_LIMIT {
        Step::Stop
    } else if num_pieces < 1500 && descriptor_size >= DESCRIPTOR_SIZE_LIMIT {
        double(piece_size, max)
    } else if num_pieces < PIECES_MIN {
        let next = piece_size / 2;
        if next < PIECE_SIZE_MIN {
            Step::StopAt(PIECE_SIZE_MIN)
        } else if descriptor_size > DESCRIPTOR_SIZE_FLOOR && descriptor_size < DESCRIPTOR_SIZE_LIMIT {
            Step::StopAt(next)
        } else {
            Step::Continue(next)
        }
    } else if num_pieces > PIECES_MAX {
        match double(piece_size, max) {
            Step::Continue(next) if descriptor_size < 2048 => Step::StopAt(next),
            step => step,
        }
    } else if descriptor_size > DESCRIPTOR_SIZE_LIMIT {
        let step = double(piece_size, max);
        if step == Step::StopAt(max) {
            warn!("WARNING: .torrent size will exceed 250 KiB!");
        }
        step
    } else {
        Step::Stop
    }
}

/// Checks an encoded descriptor against [`DESCRIPTOR_SIZE_LIMIT`], warning
/// when it is over. The estimate [`solve`] works from ignores per-file
/// dictionary overhead, so long file lists can pass the search and still
/// exceed the limit.
pub fn within_size_limit(descriptor_size: u64) -> bool {
    if descriptor_size > DESCRIPTOR_SIZE_LIMIT {
        warn!(
            "WARNING: .torrent is {} bytes, over the {} byte limit!",
            descriptor_size, DESCRIPTOR_SIZE_LIMIT
        );
        return false;
    }
    true
}

fn double(piece_size: u64, max: u64) -> Step {
    let next = piece_size * 2;
    if next > max {
        Step::StopAt(max)
    } else {
        Step::Continue(next)
    }
}
