//! LZX decompression as used by the `MSCompressed` section
//!
//! The section's data is a sequence of independently addressable frames
//! (blocks) of `block_size` bytes. Decoder state carries over from frame
//! to frame and is reset every `reset_interval` frames.

mod cache;
mod inflater;
mod tree;

pub use cache::BlockCache;
pub use inflater::{BlockType, Inflater};
pub use tree::HuffmanTree;

/// Smallest supported window (32 KiB).
pub const MIN_WINDOW_SIZE: usize = 0x8000;
/// Largest supported window (2 MiB).
pub const MAX_WINDOW_SIZE: usize = 0x20_0000;
