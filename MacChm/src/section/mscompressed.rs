//! LZX-compressed data section

use std::collections::BTreeMap;
use std::io::{Read, Seek};
use std::sync::{Arc, Mutex, PoisonError};

use super::{UncompressedSection, required_section0_entry};
use crate::directory::Entry;
use crate::error::{Error, Result};
use crate::headers::{LzxcHeader, ResetTable};
use crate::lzx::{BlockCache, Inflater};
use crate::reader::{BitReader, ByteReader};

pub const CONTROL_DATA_PATH: &str = "::DataSpace/Storage/MSCompressed/ControlData";
pub const RESET_TABLE_PATH: &str = "::DataSpace/Storage/MSCompressed/Transform/{7FC28940-9D31-11D0-9B27-00A0C91E9C7C}/InstanceData/ResetTable";
pub const CONTENT_PATH: &str = "::DataSpace/Storage/MSCompressed/Content";

/// Decoded blocks of one reset-interval group.
type BlockGroup = Arc<Vec<Vec<u8>>>;

/// Decoder state shared by all reads of the section.
///
/// A group is decoded start to finish under this lock, since the inflater
/// carries window and offset history from block to block.
#[derive(Debug)]
struct DecodeState {
    inflater: Inflater,
    cache: BlockCache<u64, BlockGroup>,
}

/// The `MSCompressed` section.
#[derive(Debug)]
pub struct MsCompressedSection {
    control: LzxcHeader,
    reset_table: ResetTable,
    /// Absolute file offset of the compressed stream.
    stream_offset: u64,
    state: Mutex<DecodeState>,
}

impl MsCompressedSection {
    /// Load the section parameters from its reserved entries.
    pub(crate) fn load<R: Read + Seek>(
        section0: UncompressedSection,
        entries: &BTreeMap<String, Entry>,
        source: &Mutex<ByteReader<R>>,
        cache_capacity: Option<usize>,
    ) -> Result<Self> {
        let control_entry = required_section0_entry(entries, CONTROL_DATA_PATH)?;
        let control_bytes = section0.read(source, control_entry.offset(), control_entry.length())?;
        let control = LzxcHeader::read(&mut ByteReader::from_bytes(control_bytes))?;

        let table_entry = required_section0_entry(entries, RESET_TABLE_PATH)?;
        let table_bytes = section0.read(source, table_entry.offset(), table_entry.length())?;
        let reset_table = ResetTable::read(&mut ByteReader::from_bytes(table_bytes))?;

        let content = entries
            .get(CONTENT_PATH)
            .ok_or_else(|| Error::MissingEntry(CONTENT_PATH.to_string()))?;
        if reset_table.compressed_length > content.length() {
            return Err(Error::SizeMismatch {
                what: "compressed section size",
                expected: reset_table.compressed_length,
                actual: content.length(),
            });
        }

        let window_size = usize::try_from(control.window_size).map_err(|_| {
            Error::InvalidFormat(format!("LZX window size {} too large", control.window_size))
        })?;
        let inflater = Inflater::new(window_size)?;
        if reset_table.block_size > control.window_size {
            return Err(Error::InvalidFormat(format!(
                "LZX block size {} exceeds window size {}",
                reset_table.block_size, control.window_size
            )));
        }
        let capacity = cache_capacity.unwrap_or_else(|| control.default_cache_capacity());
        let cache = BlockCache::new(capacity)?;

        tracing::debug!(
            "MSCompressed: window {} bytes, reset every {} blocks of {}, {} blocks, {} -> {} bytes, cache {}",
            control.window_size,
            control.reset_interval,
            reset_table.block_size,
            reset_table.addresses.len(),
            reset_table.compressed_length,
            reset_table.uncompressed_length,
            capacity
        );

        let stream_offset = section0
            .base_offset()
            .checked_add(content.offset())
            .ok_or_else(|| Error::InvalidFormat(format!("content stream offset {} overflows", content.offset())))?;

        Ok(Self {
            stream_offset,
            control,
            reset_table,
            state: Mutex::new(DecodeState { inflater, cache }),
        })
    }

    pub fn control(&self) -> &LzxcHeader {
        &self.control
    }

    pub fn reset_table(&self) -> &ResetTable {
        &self.reset_table
    }

    /// Size of the decompressed section.
    pub fn uncompressed_length(&self) -> u64 {
        self.reset_table.uncompressed_length
    }

    /// Number of block groups currently cached.
    pub fn cached_groups(&self) -> usize {
        self.lock_state().cache.len()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, DecodeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read `length` decompressed bytes starting at `offset`.
    pub(crate) fn read<R: Read + Seek>(
        &self,
        source: &Mutex<ByteReader<R>>,
        offset: u64,
        length: u64,
    ) -> Result<Vec<u8>> {
        if length == 0 {
            return Ok(Vec::new());
        }
        let end = offset
            .checked_add(length)
            .ok_or_else(|| Error::InvalidFormat(format!("read of {length} bytes at {offset} overflows")))?;
        if end > self.reset_table.uncompressed_length {
            return Err(Error::CorruptData(format!(
                "read of {length} bytes at {offset} runs past the section end ({})",
                self.reset_table.uncompressed_length
            )));
        }
        let block_size = self.reset_table.block_size;
        let start_block = offset / block_size;
        let start_offset = offset % block_size;
        let mut end_block = end / block_size;
        let mut end_offset = end % block_size;
        if end_offset == 0 && end_block > start_block {
            end_offset = block_size;
            end_block -= 1;
        }

        let interval = u64::from(self.control.reset_interval);
        // Preallocate no more than the blocks the reset table lists can yield
        let decodable = (self.reset_table.addresses.len() as u64).saturating_mul(block_size);
        let mut out = Vec::with_capacity(usize::try_from(length.min(decodable)).unwrap_or(0));
        let mut state = self.lock_state();
        for block in start_block..=end_block {
            let group = self.group(&mut state, source, block / interval)?;
            let data = group.get((block % interval) as usize).ok_or_else(|| {
                Error::CorruptData(format!("read after last data block ({block})"))
            })?;
            let from = (if block == start_block { start_offset } else { 0 }) as usize;
            let to = (if block == end_block { end_offset } else { block_size }) as usize;
            if to > data.len() {
                return Err(Error::CorruptData(format!(
                    "block {block} holds {} bytes, {to} needed",
                    data.len()
                )));
            }
            out.extend_from_slice(&data[from..to]);
        }
        Ok(out)
    }

    fn group<R: Read + Seek>(
        &self,
        state: &mut DecodeState,
        source: &Mutex<ByteReader<R>>,
        group: u64,
    ) -> Result<BlockGroup> {
        if let Some(cached) = state.cache.get(&group) {
            return Ok(Arc::clone(cached));
        }
        tracing::debug!("Block group {} not cached, decoding", group);
        let decoded = Arc::new(self.decode_group(&mut state.inflater, source, group)?);
        state.cache.put(group, Arc::clone(&decoded));
        Ok(decoded)
    }

    /// Decode every block of a reset-interval group in order.
    fn decode_group<R: Read + Seek>(
        &self,
        inflater: &mut Inflater,
        source: &Mutex<ByteReader<R>>,
        group: u64,
    ) -> Result<Vec<Vec<u8>>> {
        let interval = u64::from(self.control.reset_interval);
        let first = group * interval;
        let total = self.reset_table.addresses.len() as u64;
        let mut blocks = Vec::new();

        for block in first..(first + interval).min(total) {
            let index = block as usize;
            let (start, end) = self.reset_table.block_range(index)?;
            let compressed = {
                let mut source = source.lock().unwrap_or_else(PoisonError::into_inner);
                let position = self.stream_offset.checked_add(start).ok_or_else(|| {
                    Error::InvalidFormat(format!("block {block} at {start} overflows the stream offset"))
                })?;
                source.set_position(position)?;
                source.read_bytes(end - start)?
            };
            if block == first {
                inflater.reset();
            }
            let want = self.reset_table.block_length(index) as usize;
            let mut bits = BitReader::new(&compressed);
            let data = inflater.inflate(&mut bits, want)?;
            tracing::trace!(
                "Block {}: {} compressed bytes -> {} bytes",
                block,
                compressed.len(),
                data.len()
            );
            blocks.push(data);
        }
        Ok(blocks)
    }
}
