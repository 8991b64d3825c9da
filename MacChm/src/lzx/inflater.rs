//! LZX frame decoder

use crate::error::{Error, Result};
use crate::reader::BitReader;

use super::tree::HuffmanTree;
use super::{MAX_WINDOW_SIZE, MIN_WINDOW_SIZE};

const MIN_MATCH: usize = 2;
const NUM_CHARS: usize = 256;
const NUM_PRIMARY_LENGTHS: usize = 7;
const MAX_POSITION_SLOTS: usize = 50;

const MAIN_TREE_BITS: u32 = 12;
const MAIN_TREE_MAX_SYMBOLS: usize = NUM_CHARS + MAX_POSITION_SLOTS * 8;
const LENGTH_TREE_BITS: u32 = 12;
const LENGTH_TREE_SYMBOLS: usize = 250;
const ALIGNED_TREE_BITS: u32 = 7;
const ALIGNED_TREE_SYMBOLS: usize = 8;

/// Frames after which the E8 translation stops.
const E8_MAX_FRAMES: u32 = 32768;

const POSITION_BASE: [u32; 51] = [
    0, 1, 2, 3, 4, 6, 8, 12, 16, 24, 32, 48, 64, 96, 128, 192, 256, 384, 512, 768, 1024, 1536,
    2048, 3072, 4096, 6144, 8192, 12288, 16384, 24576, 32768, 49152, 65536, 98304, 131072,
    196608, 262144, 393216, 524288, 655360, 786432, 917504, 1048576, 1179648, 1310720, 1441792,
    1572864, 1703936, 1835008, 1966080, 2097152,
];

const EXTRA_BITS: [u32; 51] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13,
    13, 14, 14, 15, 15, 16, 16, 17, 17, 17, 17, 17, 17, 17, 17, 17, 17, 17, 17, 17, 17, 17,
];

/// LZX block types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    Verbatim,
    Aligned,
    Uncompressed,
}

impl BlockType {
    fn from_bits(value: u32) -> Result<Self> {
        match value {
            1 => Ok(BlockType::Verbatim),
            2 => Ok(BlockType::Aligned),
            3 => Ok(BlockType::Uncompressed),
            other => Err(Error::UnknownBlockType(other)),
        }
    }
}

/// Number of position slots for a window of `window_size` bytes.
fn position_slots(window_size: usize) -> usize {
    match window_size.trailing_zeros() * 2 {
        40 => 42,
        42 => 50,
        slots => slots as usize,
    }
}

/// Stateful LZX decoder producing one frame per call.
///
/// Repeated-offset registers, Huffman trees and the sliding window persist
/// between frames until [`reset`](Self::reset) is called at the start of a
/// reset interval.
#[derive(Debug)]
pub struct Inflater {
    window: Vec<u8>,
    window_position: usize,
    frame_position: usize,
    r0: u32,
    r1: u32,
    r2: u32,
    main_elements: usize,
    header_read: bool,
    block_type: Option<BlockType>,
    block_length: u32,
    block_remaining: u32,
    frames_read: u32,
    intel_filesize: i64,
    intel_position: i64,
    intel_started: bool,
    main_tree: HuffmanTree,
    length_tree: HuffmanTree,
    aligned_tree: HuffmanTree,
}

impl Inflater {
    /// Create a decoder for a power-of-two window of 32 KiB to 2 MiB.
    pub fn new(window_size: usize) -> Result<Self> {
        if !(MIN_WINDOW_SIZE..=MAX_WINDOW_SIZE).contains(&window_size)
            || !window_size.is_power_of_two()
        {
            return Err(Error::InvalidFormat(format!(
                "unsupported LZX window size {window_size}"
            )));
        }
        let mut inflater = Self {
            window: vec![0; window_size],
            window_position: 0,
            frame_position: 0,
            r0: 1,
            r1: 1,
            r2: 1,
            main_elements: NUM_CHARS + position_slots(window_size) * 8,
            header_read: false,
            block_type: None,
            block_length: 0,
            block_remaining: 0,
            frames_read: 0,
            intel_filesize: 0,
            intel_position: 0,
            intel_started: false,
            main_tree: HuffmanTree::new(MAIN_TREE_BITS, MAIN_TREE_MAX_SYMBOLS),
            length_tree: HuffmanTree::new(LENGTH_TREE_BITS, LENGTH_TREE_SYMBOLS),
            aligned_tree: HuffmanTree::new(ALIGNED_TREE_BITS, ALIGNED_TREE_SYMBOLS),
        };
        inflater.reset();
        Ok(inflater)
    }

    pub fn window_size(&self) -> usize {
        self.window.len()
    }

    /// Return to the state at the start of a reset interval.
    pub fn reset(&mut self) {
        self.r0 = 1;
        self.r1 = 1;
        self.r2 = 1;
        self.header_read = false;
        self.frames_read = 0;
        self.block_type = None;
        self.block_length = 0;
        self.block_remaining = 0;
        self.intel_filesize = 0;
        self.intel_position = 0;
        self.intel_started = false;
        self.window_position = 0;
        self.frame_position = 0;
        self.main_tree.clear();
        self.length_tree.clear();
    }

    /// Decode the next `count` bytes of output.
    pub fn inflate(&mut self, reader: &mut BitReader<'_>, count: usize) -> Result<Vec<u8>> {
        let window_size = self.window.len();
        if count > window_size {
            return Err(Error::CorruptData(format!(
                "frame of {count} bytes exceeds window of {window_size}"
            )));
        }

        if !self.header_read {
            self.intel_filesize = 0;
            if reader.read_bits(1)? == 1 {
                let high = reader.read_bits(16)?;
                let low = reader.read_bits(16)?;
                self.intel_filesize = i64::from((high << 16) | low);
            }
            self.header_read = true;
        }

        let frame_start = self.frame_position;
        if frame_start + count > window_size {
            return Err(Error::WindowOverrun {
                position: frame_start,
                length: count,
                window: window_size,
            });
        }

        // an earlier match may already have produced part of this frame
        let mut todo = (frame_start + count) as i64 - self.window_position as i64;
        while todo > 0 {
            if self.block_remaining == 0 {
                self.read_block_header(reader)?;
            }

            let mut run = i64::from(self.block_remaining).min(todo);
            todo -= run;
            self.block_remaining -= run as u32;

            if self.window_position + run as usize > window_size {
                return Err(Error::WindowOverrun {
                    position: self.window_position,
                    length: run as usize,
                    window: window_size,
                });
            }

            match self.block_type {
                Some(BlockType::Uncompressed) => {
                    let start = self.window_position;
                    let end = start + run as usize;
                    reader.read_raw(&mut self.window[start..end])?;
                    self.window_position = end;
                    if self.block_remaining == 0 && self.block_length & 1 == 1 {
                        reader.skip_raw_byte();
                    }
                }
                Some(block_type) => {
                    while run > 0 {
                        run -= self.decode_element(reader, block_type)? as i64;
                    }
                    if run < 0 {
                        // the last match ran into the next frame
                        let over = run.unsigned_abs() as u32;
                        if over > self.block_remaining {
                            return Err(Error::CorruptData(format!(
                                "match overruns block by {over} bytes"
                            )));
                        }
                        self.block_remaining -= over;
                    }
                }
                None => {
                    return Err(Error::CorruptData("no LZX block in progress".to_string()));
                }
            }
        }

        let mut frame = self.window[frame_start..frame_start + count].to_vec();
        self.translate_e8(&mut frame);

        self.frame_position += count;
        if self.frame_position == window_size {
            self.frame_position = 0;
        }
        if self.window_position == window_size {
            self.window_position = 0;
        }
        Ok(frame)
    }

    fn read_block_header(&mut self, reader: &mut BitReader<'_>) -> Result<()> {
        let block_type = BlockType::from_bits(reader.read_bits(3)?)?;
        let high = reader.read_bits(16)?;
        let low = reader.read_bits(8)?;
        self.block_length = (high << 8) | low;
        self.block_remaining = self.block_length;
        tracing::trace!(
            "LZX {:?} block of {} bytes at window position {}",
            block_type,
            self.block_length,
            self.window_position
        );

        match block_type {
            BlockType::Aligned | BlockType::Verbatim => {
                if block_type == BlockType::Aligned {
                    self.aligned_tree.read_aligned_lengths(reader)?;
                    self.aligned_tree.build()?;
                }
                self.main_tree.read_lengths(reader, 0, NUM_CHARS)?;
                self.main_tree
                    .read_lengths(reader, NUM_CHARS, self.main_elements)?;
                self.main_tree.build()?;
                if self.main_tree.length(0xe8) != 0 {
                    self.intel_started = true;
                }
                self.length_tree
                    .read_lengths(reader, 0, LENGTH_TREE_SYMBOLS - 1)?;
                self.length_tree.build()?;
            }
            BlockType::Uncompressed => {
                self.intel_started = true;
                reader.align_to_word()?;
                self.r0 = reader.read_raw_u32()?;
                self.r1 = reader.read_raw_u32()?;
                self.r2 = reader.read_raw_u32()?;
            }
        }
        self.block_type = Some(block_type);
        Ok(())
    }

    /// Decode one literal or match into the window. Returns bytes written.
    fn decode_element(&mut self, reader: &mut BitReader<'_>, block_type: BlockType) -> Result<usize> {
        let main = usize::from(self.main_tree.read_symbol(reader)?);
        if main < NUM_CHARS {
            self.window[self.window_position] = main as u8;
            self.window_position += 1;
            return Ok(1);
        }

        let main = main - NUM_CHARS;
        let mut match_length = main & NUM_PRIMARY_LENGTHS;
        if match_length == NUM_PRIMARY_LENGTHS {
            match_length += usize::from(self.length_tree.read_symbol(reader)?);
        }
        match_length += MIN_MATCH;

        let slot = main >> 3;
        let match_offset = match slot {
            0 => self.r0,
            1 => {
                std::mem::swap(&mut self.r0, &mut self.r1);
                self.r0
            }
            2 => {
                std::mem::swap(&mut self.r0, &mut self.r2);
                self.r0
            }
            _ => {
                let offset = self.decode_offset(reader, block_type, slot)?;
                self.r2 = self.r1;
                self.r1 = self.r0;
                self.r0 = offset;
                offset
            }
        };

        self.copy_match(match_offset as usize, match_length)?;
        Ok(match_length)
    }

    fn decode_offset(&self, reader: &mut BitReader<'_>, block_type: BlockType, slot: usize) -> Result<u32> {
        let base = POSITION_BASE
            .get(slot)
            .copied()
            .ok_or_else(|| Error::CorruptData(format!("position slot {slot} out of range")))?
            - 2;
        let extra = EXTRA_BITS[slot];

        let offset = if block_type == BlockType::Aligned {
            match extra {
                0 => 1,
                1 | 2 => base + reader.read_bits(extra)?,
                3 => base + u32::from(self.aligned_tree.read_symbol(reader)?),
                _ => {
                    let verbatim = reader.read_bits(extra - 3)? << 3;
                    base + verbatim + u32::from(self.aligned_tree.read_symbol(reader)?)
                }
            }
        } else if slot == 3 {
            1
        } else {
            base + reader.read_bits(extra)?
        };
        Ok(offset)
    }

    fn copy_match(&mut self, offset: usize, length: usize) -> Result<()> {
        let window_size = self.window.len();
        let dest = self.window_position;
        if dest + length > window_size {
            return Err(Error::WindowOverrun {
                position: dest,
                length,
                window: window_size,
            });
        }
        if offset == 0 || offset > window_size {
            return Err(Error::CorruptData(format!(
                "match offset {offset} outside window of {window_size}"
            )));
        }

        if dest >= offset {
            copy_forward(&mut self.window, dest - offset, dest, length);
        } else {
            // source starts in the tail of the window from the previous pass
            let src = dest + window_size - offset;
            let tail = (offset - dest).min(length);
            copy_forward(&mut self.window, src, dest, tail);
            if tail < length {
                copy_forward(&mut self.window, 0, dest + tail, length - tail);
            }
        }
        self.window_position = dest + length;
        Ok(())
    }

    /// Undo the call-instruction (0xE8) address translation on a frame.
    fn translate_e8(&mut self, frame: &mut [u8]) {
        let frame_index = self.frames_read;
        self.frames_read = self.frames_read.saturating_add(1);
        if self.intel_filesize == 0 || frame_index >= E8_MAX_FRAMES {
            return;
        }

        let len = frame.len();
        if len <= 10 || !self.intel_started {
            self.intel_position += len as i64;
            return;
        }

        let filesize = self.intel_filesize;
        let mut current = self.intel_position;
        let mut i = 0;
        while i < len - 10 {
            if frame[i] != 0xe8 {
                i += 1;
                current += 1;
                continue;
            }
            let bytes = [frame[i + 1], frame[i + 2], frame[i + 3], frame[i + 4]];
            let absolute = i64::from(i32::from_le_bytes(bytes));
            if absolute >= -current && absolute < filesize {
                let relative = if absolute >= 0 {
                    absolute - current
                } else {
                    absolute + filesize
                };
                frame[i + 1..i + 5].copy_from_slice(&(relative as i32).to_le_bytes());
            }
            i += 5;
            current += 5;
        }
        self.intel_position += len as i64;
    }
}

/// Byte-by-byte forward copy, so overlapping runs repeat their pattern.
fn copy_forward(window: &mut [u8], src: usize, dest: usize, length: usize) {
    if src + length <= dest || dest + length <= src {
        window.copy_within(src..src + length, dest);
    } else {
        for i in 0..length {
            window[dest + i] = window[src + i];
        }
    }
}
