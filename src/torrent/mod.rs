pub mod builder;
pub mod content;
pub mod hasher;
pub mod metainfo;
pub mod piece_size;
pub mod sanitize;
pub mod variants;

#[cfg(test)]
mod tests;

/// Tracker written into generated descriptors; the real announce URL is
/// injected per site at upload time.
pub const PLACEHOLDER_TRACKER: &str = "https://fake.tracker";
pub const SOURCE_TAG: &str = "TC";
pub const COMMENT: &str = "Created by torrent-create";
pub const CREATED_BY: &str = "torrent-create";

pub use builder::DescriptorBuilder;
pub use content::{AcceptAll, ContentSet, FileFilter, MediaFilter};
pub use hasher::{PieceHasher, Sha1PieceHasher};
pub use metainfo::Descriptor;
