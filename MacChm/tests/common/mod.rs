//! In-memory CHM builder for integration tests
//!
//! Writes ITSF/ITSP headers, PMGL (and optionally PMGI) chunks, the section
//! name list, LZXC control data, the reset table and an LZX stream built
//! from uncompressed, verbatim and aligned blocks. Blocks may span frames,
//! matches reach back across the whole reset group, and the stream can use
//! a 64 KiB window or carry an E8 file size.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};

pub const CONTROL_DATA_PATH: &str = "::DataSpace/Storage/MSCompressed/ControlData";
pub const RESET_TABLE_PATH: &str = "::DataSpace/Storage/MSCompressed/Transform/{7FC28940-9D31-11D0-9B27-00A0C91E9C7C}/InstanceData/ResetTable";
pub const CONTENT_PATH: &str = "::DataSpace/Storage/MSCompressed/Content";
pub const NAME_LIST_PATH: &str = "::DataSpace/NameList";

pub const FRAME_SIZE: usize = 0x8000;

const ITSF_LENGTH: u64 = 0x60;
const SECTION_TABLE_LENGTH: u64 = 0x18;
const ITSP_LENGTH: u32 = 0x54;

// =============================================================================
// LZX writer
// =============================================================================

/// How blocks of the compressed section are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockMode {
    Uncompressed,
    Verbatim,
    Aligned,
    /// Verbatim, uncompressed and aligned blocks in turn.
    Mixed,
}

/// Stream layout choices for [`lzx_compress`].
#[derive(Debug, Clone, Copy)]
pub struct LzxOptions {
    pub mode: BlockMode,
    /// 32 KiB or 64 KiB.
    pub window_size: usize,
    /// Bytes per block; `None` starts a block at every frame.
    pub block_length: Option<usize>,
    /// File size sent in the E8 header of every reset group.
    pub e8_file_size: Option<u32>,
}

impl Default for LzxOptions {
    fn default() -> Self {
        Self {
            mode: BlockMode::Mixed,
            window_size: 0x8000,
            block_length: None,
            e8_file_size: None,
        }
    }
}

impl LzxOptions {
    fn main_elements(&self) -> usize {
        let slots = match self.window_size {
            0x8000 => 30,
            0x1_0000 => 32,
            other => panic!("no position slot table for a {other} byte window"),
        };
        256 + slots * 8
    }

    /// Largest distance whose formatted offset still has a position slot.
    fn max_distance(&self) -> usize {
        self.window_size - 3
    }
}

/// What the encoder emitted, so tests can check which decoder paths ran.
#[derive(Debug, Default, Clone)]
pub struct LzxStats {
    /// Matches coded with repeated-offset slots 0, 1 and 2.
    pub repeated: [usize; 3],
    pub max_distance: usize,
    /// Matches whose output runs past the end of their frame.
    pub frame_crossings: usize,
    /// Matches copying from the previous pass over the window.
    pub wrapped_sources: usize,
    /// Blocks that start inside a frame.
    pub mid_frame_blocks: usize,
    /// Call operands rewritten by the E8 preprocessing.
    pub e8_translated: usize,
}

/// Output of [`lzx_compress`].
pub struct LzxStream {
    pub bytes: Vec<u8>,
    /// Byte offset of every frame.
    pub addresses: Vec<u64>,
    pub stats: LzxStats,
}

const POSITION_BASE: [u32; 32] = [
    0, 1, 2, 3, 4, 6, 8, 12, 16, 24, 32, 48, 64, 96, 128, 192, 256, 384, 512, 768, 1024, 1536,
    2048, 3072, 4096, 6144, 8192, 12288, 16384, 24576, 32768, 49152,
];
const EXTRA_BITS: [u32; 32] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13,
    13, 14, 14,
];

const LENGTH_SYMBOLS: usize = 249;
const MAX_MATCH: usize = 257;

/// 16-bit little-endian words filled most significant bit first.
#[derive(Default)]
pub struct BitWriter {
    out: Vec<u8>,
    word: u32,
    used: u32,
}

impl BitWriter {
    pub fn write(&mut self, value: u32, count: u32) {
        for bit in (0..count).rev() {
            self.word = (self.word << 1) | ((value >> bit) & 1);
            self.used += 1;
            if self.used == 16 {
                self.out.extend_from_slice(&(self.word as u16).to_le_bytes());
                self.word = 0;
                self.used = 0;
            }
        }
    }

    pub fn is_aligned(&self) -> bool {
        self.used == 0
    }

    /// Pad with zero bits to the next word boundary.
    pub fn align(&mut self) {
        if self.used > 0 {
            self.write(0, 16 - self.used);
        }
    }

    pub fn write_raw(&mut self, bytes: &[u8]) {
        assert!(self.is_aligned());
        self.out.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.out.len()
    }

    pub fn into_bytes(mut self) -> Vec<u8> {
        self.align();
        self.out
    }
}

/// Canonical Huffman codes for a list of code lengths.
pub fn canonical_codes(lengths: &[u8]) -> Vec<u32> {
    let max = lengths.iter().copied().max().unwrap_or(0) as usize;
    let mut count = vec![0u32; max + 1];
    for &length in lengths {
        count[length as usize] += 1;
    }
    count[0] = 0;
    let mut next = vec![0u32; max + 2];
    for bits in 1..=max {
        next[bits] = (next[bits - 1] + count[bits - 1]) << 1;
    }
    lengths
        .iter()
        .map(|&length| {
            if length == 0 {
                0
            } else {
                let code = next[length as usize];
                next[length as usize] += 1;
                code
            }
        })
        .collect()
}

struct Code {
    lengths: Vec<u8>,
    codes: Vec<u32>,
}

impl Code {
    fn new(lengths: Vec<u8>) -> Self {
        let codes = canonical_codes(&lengths);
        Self { lengths, codes }
    }

    fn write(&self, writer: &mut BitWriter, symbol: usize) {
        assert!(self.lengths[symbol] > 0, "symbol {symbol} has no code");
        writer.write(self.codes[symbol], u32::from(self.lengths[symbol]));
    }
}

fn pretree() -> Code {
    let mut lengths = vec![4u8; 12];
    lengths.extend_from_slice(&[5; 8]);
    Code::new(lengths)
}

/// Complete code over `elements` symbols using lengths 8 and 9.
fn main_tree(elements: usize) -> Code {
    let short = 512 - elements;
    let mut lengths = vec![8u8; short];
    lengths.extend(std::iter::repeat_n(9u8, elements - short));
    Code::new(lengths)
}

fn length_tree() -> Code {
    let mut lengths = vec![7u8; 7];
    lengths.extend(std::iter::repeat_n(8u8, LENGTH_SYMBOLS - 7));
    Code::new(lengths)
}

/// Send `lengths[first..last]` as deltas against `previous` via the pretree.
fn write_lengths(writer: &mut BitWriter, previous: &mut [u8], lengths: &[u8], first: usize, last: usize) {
    let pretree = pretree();
    for &length in &pretree.lengths {
        writer.write(u32::from(length), 4);
    }
    for x in first..last {
        let delta = (usize::from(previous[x]) + 17 - usize::from(lengths[x])) % 17;
        pretree.write(writer, delta);
        previous[x] = lengths[x];
    }
}

/// Greedy matcher over one reset group; history starts at the group start.
struct Matcher<'a> {
    data: &'a [u8],
    chains: HashMap<[u8; 3], Vec<usize>>,
    indexed: usize,
    max_distance: usize,
}

impl<'a> Matcher<'a> {
    fn new(data: &'a [u8], max_distance: usize) -> Self {
        Self {
            data,
            chains: HashMap::new(),
            indexed: 0,
            max_distance,
        }
    }

    fn key(&self, position: usize) -> Option<[u8; 3]> {
        let bytes = self.data.get(position..position + 3)?;
        Some([bytes[0], bytes[1], bytes[2]])
    }

    /// Make every position before `end` available as a match source.
    fn index_to(&mut self, end: usize) {
        while self.indexed < end {
            if let Some(key) = self.key(self.indexed) {
                self.chains.entry(key).or_default().push(self.indexed);
            }
            self.indexed += 1;
        }
    }

    fn length_at(&self, position: usize, distance: usize, limit: usize) -> usize {
        let mut length = 0;
        while length < limit && self.data[position - distance + length] == self.data[position + length] {
            length += 1;
        }
        length
    }

    /// Longest `(length, distance)` of at least 3 bytes at `position`.
    ///
    /// Repeated offsets are tried first and kept on ties.
    fn find(&self, position: usize, limit: usize, repeated: &[u32; 3]) -> Option<(usize, usize)> {
        let mut best: Option<(usize, usize)> = None;
        let mut consider = |length: usize, distance: usize| {
            if length >= 3 && best.is_none_or(|(longest, _)| length > longest) {
                best = Some((length, distance));
            }
        };
        for &offset in repeated {
            let distance = offset as usize;
            if distance <= position && distance <= self.max_distance {
                consider(self.length_at(position, distance, limit), distance);
            }
        }
        if let Some(candidates) = self.key(position).and_then(|key| self.chains.get(&key)) {
            for &start in candidates.iter().rev().take(16) {
                let distance = position - start;
                if distance > self.max_distance {
                    break;
                }
                consider(self.length_at(position, distance, limit), distance);
            }
        }
        best
    }
}

/// Encoder state mirrored from the decoder: repeated offsets and the code
/// lengths last sent.
struct LzxState {
    r: [u32; 3],
    main_lengths: Vec<u8>,
    length_lengths: Vec<u8>,
}

impl LzxState {
    fn reset(main_elements: usize) -> Self {
        Self {
            r: [1, 1, 1],
            main_lengths: vec![0; main_elements],
            length_lengths: vec![0; LENGTH_SYMBOLS],
        }
    }
}

fn write_block_header(writer: &mut BitWriter, block_type: u32, length: usize) {
    writer.write(block_type, 3);
    writer.write((length >> 8) as u32, 16);
    writer.write((length & 0xff) as u32, 8);
}

/// Writes one reset group. Positions are relative to the group start.
struct GroupWriter<'a> {
    writer: &'a mut BitWriter,
    addresses: &'a mut Vec<u64>,
    stats: &'a mut LzxStats,
    options: LzxOptions,
    data: &'a [u8],
    matcher: Matcher<'a>,
    state: LzxState,
    /// End of the frame currently being written.
    frame_end: usize,
}

impl GroupWriter<'_> {
    /// Start the next frame once output has reached the end of this one.
    ///
    /// Every frame is decoded from its own word-aligned address.
    fn advance(&mut self, position: usize) {
        if position >= self.frame_end && self.frame_end < self.data.len() {
            self.writer.align();
            self.addresses.push(self.writer.len() as u64);
            self.frame_end += FRAME_SIZE;
        }
    }

    fn write(mut self, blocks: &mut usize) {
        match self.options.e8_file_size {
            Some(size) => {
                self.writer.write(1, 1);
                self.writer.write(size >> 16, 16);
                self.writer.write(size & 0xffff, 16);
            }
            None => self.writer.write(0, 1),
        }

        let block_length = self.options.block_length.unwrap_or(FRAME_SIZE);
        let mut start = 0;
        while start < self.data.len() {
            let end = (start + block_length).min(self.data.len());
            if start % FRAME_SIZE != 0 {
                self.stats.mid_frame_blocks += 1;
            }
            let mode = match self.options.mode {
                BlockMode::Mixed => [BlockMode::Verbatim, BlockMode::Uncompressed, BlockMode::Aligned][*blocks % 3],
                other => other,
            };
            match mode {
                BlockMode::Uncompressed => self.write_uncompressed(start, end),
                BlockMode::Verbatim => self.write_compressed(start, end, false),
                BlockMode::Aligned => self.write_compressed(start, end, true),
                BlockMode::Mixed => unreachable!(),
            }
            *blocks += 1;
            start = end;
        }
    }

    fn write_uncompressed(&mut self, start: usize, end: usize) {
        write_block_header(self.writer, 3, end - start);
        // 1-16 bits of padding
        if self.writer.is_aligned() {
            self.writer.write(0, 16);
        } else {
            self.writer.align();
        }
        for r in self.state.r {
            self.writer.write_raw(&r.to_le_bytes());
        }
        let mut position = start;
        while position < end {
            let piece_end = end.min(self.frame_end);
            self.writer.write_raw(&self.data[position..piece_end]);
            if piece_end == end && (end - start) % 2 == 1 {
                self.writer.write_raw(&[0]);
            }
            position = piece_end;
            self.advance(position);
        }
    }

    fn write_compressed(&mut self, start: usize, end: usize, aligned: bool) {
        let main_elements = self.options.main_elements();
        let main = main_tree(main_elements);
        let lengths = length_tree();
        let aligned_tree = Code::new(vec![3; 8]);

        write_block_header(self.writer, if aligned { 2 } else { 1 }, end - start);
        if aligned {
            for &length in &aligned_tree.lengths {
                self.writer.write(u32::from(length), 3);
            }
        }
        write_lengths(self.writer, &mut self.state.main_lengths, &main.lengths, 0, 256);
        write_lengths(self.writer, &mut self.state.main_lengths, &main.lengths, 256, main_elements);
        write_lengths(self.writer, &mut self.state.length_lengths, &lengths.lengths, 0, LENGTH_SYMBOLS);

        let window = self.options.window_size;
        let mut position = start;
        while position < end {
            self.matcher.index_to(position);
            // matches stay inside the block and never cross the window end
            let window_end = (position / window + 1) * window;
            let limit = MAX_MATCH.min(end - position).min(window_end - position);
            let step = match self.matcher.find(position, limit, &self.state.r) {
                Some((length, distance)) => {
                    self.write_match(&main, &lengths, aligned.then_some(&aligned_tree), position, length, distance);
                    length
                }
                None => {
                    main.write(self.writer, usize::from(self.data[position]));
                    1
                }
            };
            position += step;
            self.advance(position);
        }
    }

    fn write_match(
        &mut self,
        main: &Code,
        lengths: &Code,
        aligned_tree: Option<&Code>,
        position: usize,
        length: usize,
        distance: usize,
    ) {
        let stats = &mut *self.stats;
        stats.max_distance = stats.max_distance.max(distance);
        if position < self.frame_end && position + length > self.frame_end {
            stats.frame_crossings += 1;
        }
        if position % self.options.window_size < distance {
            stats.wrapped_sources += 1;
        }

        let offset = distance as u32;
        let header = (length - 2).min(7);
        let slot = match self.state.r.iter().position(|&r| r == offset) {
            Some(repeated) => repeated,
            None => {
                let formatted = offset + 2;
                (3..POSITION_BASE.len())
                    .rev()
                    .find(|&slot| POSITION_BASE[slot] <= formatted)
                    .unwrap()
            }
        };
        main.write(self.writer, 256 + slot * 8 + header);
        if header == 7 {
            lengths.write(self.writer, length - 2 - 7);
        }

        match slot {
            0 => stats.repeated[0] += 1,
            1 => {
                stats.repeated[1] += 1;
                self.state.r.swap(0, 1);
            }
            2 => {
                stats.repeated[2] += 1;
                self.state.r.swap(0, 2);
            }
            _ => {
                let extra = EXTRA_BITS[slot];
                let value = offset + 2 - POSITION_BASE[slot];
                match aligned_tree {
                    Some(tree) => match extra {
                        0 => {}
                        1 | 2 => self.writer.write(value, extra),
                        3 => tree.write(self.writer, value as usize),
                        _ => {
                            self.writer.write(value >> 3, extra - 3);
                            tree.write(self.writer, (value & 7) as usize);
                        }
                    },
                    None if extra > 0 => self.writer.write(value, extra),
                    None => {}
                }
                self.state.r = [offset, self.state.r[0], self.state.r[1]];
            }
        }
    }
}

/// Rewrite relative call operands to absolute ones, the inverse of the
/// translation a decoder undoes on every frame of a reset group.
fn e8_encode(group: &[u8], file_size: Option<u32>, stats: &mut LzxStats) -> Vec<u8> {
    let mut out = group.to_vec();
    let Some(file_size) = file_size else {
        return out;
    };
    let file_size = i64::from(file_size);
    let mut frame_start = 0;
    for frame in out.chunks_mut(FRAME_SIZE) {
        let len = frame.len();
        let mut i = 0;
        while len > 10 && i < len - 10 {
            if frame[i] != 0xe8 {
                i += 1;
                continue;
            }
            let current = (frame_start + i) as i64;
            let relative = i64::from(i32::from_le_bytes(frame[i + 1..i + 5].try_into().unwrap()));
            let absolute = if (-current..file_size - current).contains(&relative) {
                Some(relative + current)
            } else if (file_size - current..file_size).contains(&relative) {
                Some(relative - file_size)
            } else {
                None
            };
            if let Some(absolute) = absolute {
                frame[i + 1..i + 5].copy_from_slice(&(absolute as i32).to_le_bytes());
                stats.e8_translated += 1;
            }
            i += 5;
        }
        frame_start += len;
    }
    out
}

/// Compress `data` into frames of [`FRAME_SIZE`] bytes, resetting every
/// `reset_interval` frames.
pub fn lzx_compress(data: &[u8], reset_interval: usize, options: LzxOptions) -> LzxStream {
    let mut writer = BitWriter::default();
    let mut addresses = Vec::new();
    let mut stats = LzxStats::default();
    let mut blocks = 0;

    for group in data.chunks(FRAME_SIZE * reset_interval) {
        let translated = e8_encode(group, options.e8_file_size, &mut stats);
        writer.align();
        addresses.push(writer.len() as u64);
        GroupWriter {
            writer: &mut writer,
            addresses: &mut addresses,
            stats: &mut stats,
            options,
            data: &translated,
            matcher: Matcher::new(&translated, options.max_distance()),
            state: LzxState::reset(options.main_elements()),
            frame_end: FRAME_SIZE,
        }
        .write(&mut blocks);
    }
    LzxStream {
        bytes: writer.into_bytes(),
        addresses,
        stats,
    }
}

// =============================================================================
// Container builder
// =============================================================================

/// Deterministic text with enough repetition to produce matches.
pub fn sample_text(length: usize, seed: u32) -> Vec<u8> {
    const WORDS: &[&str] = &[
        "help", "topic", "index", "window", "compiled", "section", "<p>", "</p>", "the", "LZX",
        "frame", "reset", "table", "\r\n", "content", "merge",
    ];
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
    let mut out = Vec::with_capacity(length + 16);
    while out.len() < length {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        out.extend_from_slice(WORDS[(state % WORDS.len() as u32) as usize].as_bytes());
        out.push(b' ');
    }
    out.truncate(length);
    out
}

/// xorshift32 bytes.
struct Noise(u32);

impl Noise {
    fn new(seed: u32) -> Self {
        Self(seed.wrapping_mul(2_654_435_761) | 1)
    }

    fn byte(&mut self) -> u8 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 17;
        self.0 ^= self.0 << 5;
        (self.0 >> 24) as u8
    }
}

/// Noise repeating itself from `distance` back, except every 300th byte.
pub fn far_repeats(length: usize, distance: usize, seed: u32) -> Vec<u8> {
    let mut noise = Noise::new(seed);
    let mut out = Vec::with_capacity(length);
    while out.len() < length {
        let i = out.len();
        let byte = if i < distance || i % 300 == 0 {
            noise.byte()
        } else {
            out[i - distance]
        };
        out.push(byte);
    }
    out
}

/// Noise, then 24-byte copies from each of `distances` in turn with one
/// fresh byte after every copy.
pub fn cycled_copies(length: usize, distances: &[usize], seed: u32) -> Vec<u8> {
    let mut noise = Noise::new(seed);
    let base = distances.iter().copied().max().unwrap_or(length);
    let mut out: Vec<u8> = (0..base).map(|_| noise.byte()).collect();
    for &distance in distances.iter().cycle() {
        if out.len() >= length {
            break;
        }
        for _ in 0..24 {
            out.push(out[out.len() - distance]);
        }
        out.push(noise.byte());
    }
    out.truncate(length);
    out
}

/// Text with a call instruction (0xE8 and a 32-bit operand) every 61 bytes.
///
/// Operands land on both sides of the translation range for `file_size`.
pub fn call_text(length: usize, file_size: u32, seed: u32) -> Vec<u8> {
    let file_size = file_size as i32;
    let operands = [0x40, -0x20, file_size - 10, 0x7fff_0000, -0x7fff_0000, 0x1_0000];
    let mut out = sample_text(length, seed);
    for (n, at) in (0..length.saturating_sub(5)).step_by(61).enumerate() {
        out[at] = 0xe8;
        out[at + 1..at + 5].copy_from_slice(&operands[n % operands.len()].to_le_bytes());
    }
    out
}

fn encint(mut value: u64) -> Vec<u8> {
    let mut groups = vec![(value & 0x7f) as u8];
    value >>= 7;
    while value > 0 {
        groups.push((value & 0x7f) as u8 | 0x80);
        value >>= 7;
    }
    groups.reverse();
    groups
}

fn directory_record(path: &str, section: u32, offset: u64, length: u64) -> Vec<u8> {
    let mut record = encint(path.len() as u64);
    record.extend_from_slice(path.as_bytes());
    record.extend(encint(u64::from(section)));
    record.extend(encint(offset));
    record.extend(encint(length));
    record
}

fn name_list(names: &[&str]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&(names.len() as u16).to_le_bytes());
    for name in names {
        let units: Vec<u16> = name.encode_utf16().collect();
        body.extend_from_slice(&(units.len() as u16).to_le_bytes());
        for unit in units {
            body.extend_from_slice(&unit.to_le_bytes());
        }
        body.extend_from_slice(&[0, 0]);
    }
    let mut out = (((body.len() + 2) / 2) as u16).to_le_bytes().to_vec();
    out.extend(body);
    out
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn push_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Builds a complete CHM file in memory.
pub struct ChmBuilder {
    compressed: Vec<(String, Vec<u8>)>,
    stored: Vec<(String, Vec<u8>)>,
    chunk_size: u32,
    index_chunk: bool,
    reset_interval: u32,
    cache_size: u32,
    lzx: LzxOptions,
    /// Directory lengths that differ from the stored data.
    declared_lengths: HashMap<String, u64>,
}

impl Default for ChmBuilder {
    fn default() -> Self {
        Self {
            compressed: Vec::new(),
            stored: Vec::new(),
            chunk_size: 0x1000,
            index_chunk: false,
            reset_interval: 2,
            cache_size: 0,
            lzx: LzxOptions::default(),
            declared_lengths: HashMap::new(),
        }
    }
}

impl ChmBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file to the compressed section.
    pub fn file(mut self, path: &str, data: impl Into<Vec<u8>>) -> Self {
        self.compressed.push((path.to_string(), data.into()));
        self
    }

    /// Add a file stored in the uncompressed section.
    pub fn stored_file(mut self, path: &str, data: impl Into<Vec<u8>>) -> Self {
        self.stored.push((path.to_string(), data.into()));
        self
    }

    pub fn chunk_size(mut self, size: u32) -> Self {
        self.chunk_size = size;
        self
    }

    /// Insert a PMGI chunk between the listing chunks.
    pub fn index_chunk(mut self) -> Self {
        self.index_chunk = true;
        self
    }

    pub fn reset_interval(mut self, frames: u32) -> Self {
        self.reset_interval = frames;
        self
    }

    pub fn cache_size(mut self, size: u32) -> Self {
        self.cache_size = size;
        self
    }

    pub fn blocks(mut self, mode: BlockMode) -> Self {
        self.lzx.mode = mode;
        self
    }

    /// LZX window in bytes, a multiple of the 32 KiB frame.
    pub fn window_size(mut self, size: usize) -> Self {
        self.lzx.window_size = size;
        self
    }

    /// Blocks of `length` bytes instead of one per frame.
    pub fn block_length(mut self, length: usize) -> Self {
        self.lzx.block_length = Some(length);
        self
    }

    pub fn e8_file_size(mut self, size: u32) -> Self {
        self.lzx.e8_file_size = Some(size);
        self
    }

    /// Record `length` in the directory entry for `path`.
    pub fn declared_length(mut self, path: &str, length: u64) -> Self {
        self.declared_lengths.insert(path.to_string(), length);
        self
    }

    /// The decompressed MSCompressed section this builder writes.
    pub fn compressed_section(&self) -> Vec<u8> {
        self.compressed.iter().flat_map(|(_, data)| data.clone()).collect()
    }

    pub fn build(&self) -> Vec<u8> {
        self.build_with_stats().0
    }

    /// The container and what its LZX stream exercises.
    pub fn build_with_stats(&self) -> (Vec<u8>, LzxStats) {
        // (section, offset, length) per path
        let mut records: BTreeMap<String, (u32, u64, u64)> = BTreeMap::new();
        let mut section0 = Vec::new();
        let mut add_stored = |records: &mut BTreeMap<_, _>, path: &str, data: &[u8]| {
            records.insert(path.to_string(), (0, section0.len() as u64, data.len() as u64));
            section0.extend_from_slice(data);
        };

        add_stored(&mut records, NAME_LIST_PATH, &name_list(&["Uncompressed", "MSCompressed"]));

        let mut control = Vec::new();
        push_u32(&mut control, 6);
        control.extend_from_slice(b"LZXC");
        let window_units = (self.lzx.window_size / FRAME_SIZE) as u32;
        for value in [2, self.reset_interval, window_units, self.cache_size, 0] {
            push_u32(&mut control, value);
        }
        add_stored(&mut records, CONTROL_DATA_PATH, &control);

        let data = self.compressed_section();
        let LzxStream {
            bytes: stream,
            addresses,
            stats,
        } = lzx_compress(&data, self.reset_interval as usize, self.lzx);
        let mut table = Vec::new();
        for value in [2, addresses.len() as u32, 8, 0x28] {
            push_u32(&mut table, value);
        }
        push_u64(&mut table, data.len() as u64);
        push_u64(&mut table, stream.len() as u64);
        push_u64(&mut table, FRAME_SIZE as u64);
        for address in &addresses {
            push_u64(&mut table, *address);
        }
        add_stored(&mut records, RESET_TABLE_PATH, &table);
        add_stored(&mut records, CONTENT_PATH, &stream);

        for (path, bytes) in &self.stored {
            add_stored(&mut records, path, bytes);
        }

        let mut offset = 0u64;
        for (path, bytes) in &self.compressed {
            records.insert(path.clone(), (1, offset, bytes.len() as u64));
            offset += bytes.len() as u64;
        }
        for (path, &length) in &self.declared_lengths {
            records.get_mut(path).expect("declared length for a known path").2 = length;
        }

        // Directories for every file path
        let paths: Vec<String> = records.keys().cloned().collect();
        for path in paths.iter().filter(|p| p.starts_with('/')) {
            let mut end = 0;
            while let Some(next) = path[end + 1..].find('/') {
                end += next + 1;
                records.entry(path[..=end].to_string()).or_insert((0, 0, 0));
            }
            records.entry("/".to_string()).or_insert((0, 0, 0));
        }

        let chunks = self.listing_chunks(&records);
        (self.assemble(&chunks, &section0), stats)
    }

    fn listing_chunks(&self, records: &BTreeMap<String, (u32, u64, u64)>) -> Vec<Vec<u8>> {
        let capacity = self.chunk_size as usize - 20;
        let mut bodies: Vec<Vec<u8>> = vec![Vec::new()];
        for (path, &(section, offset, length)) in records {
            let record = directory_record(path, section, offset, length);
            assert!(record.len() <= capacity, "record too long for chunk: {path}");
            if bodies.last().unwrap().len() + record.len() > capacity {
                bodies.push(Vec::new());
            }
            bodies.last_mut().unwrap().extend(record);
        }

        let count = bodies.len();
        let mut chunks: Vec<Vec<u8>> = bodies
            .into_iter()
            .enumerate()
            .map(|(i, body)| {
                let mut chunk = b"PMGL".to_vec();
                push_u32(&mut chunk, (capacity - body.len()) as u32);
                push_u32(&mut chunk, 0);
                let previous = if i == 0 { -1 } else { i as i32 - 1 };
                let next = if i + 1 == count { -1 } else { i as i32 + 1 };
                chunk.extend_from_slice(&previous.to_le_bytes());
                chunk.extend_from_slice(&next.to_le_bytes());
                chunk.extend(body);
                chunk.resize(self.chunk_size as usize, 0);
                chunk
            })
            .collect();

        if self.index_chunk {
            let mut body = encint(1);
            body.push(b'/');
            body.extend(encint(0));
            let mut chunk = b"PMGI".to_vec();
            push_u32(&mut chunk, (self.chunk_size as usize - 8 - body.len()) as u32);
            chunk.extend(body);
            chunk.resize(self.chunk_size as usize, 0);
            chunks.insert(1usize.min(chunks.len()), chunk);
        }
        chunks
    }

    fn assemble(&self, chunks: &[Vec<u8>], section0: &[u8]) -> Vec<u8> {
        let directory_offset = ITSF_LENGTH + SECTION_TABLE_LENGTH;
        let directory_length = u64::from(ITSP_LENGTH) + chunks.len() as u64 * u64::from(self.chunk_size);
        let content_offset = directory_offset + directory_length;
        let total = content_offset + section0.len() as u64;

        let mut out = b"ITSF".to_vec();
        for value in [3, ITSF_LENGTH as u32, 1, 0x1234_5678, 0x409] {
            push_u32(&mut out, value);
        }
        out.extend_from_slice(&[0x10; 16]);
        out.extend_from_slice(&[0x11; 16]);
        for value in [ITSF_LENGTH, SECTION_TABLE_LENGTH, directory_offset, directory_length, content_offset] {
            push_u64(&mut out, value);
        }
        assert_eq!(out.len() as u64, ITSF_LENGTH);

        push_u32(&mut out, 0x1fe);
        push_u32(&mut out, 0);
        push_u64(&mut out, total);
        push_u64(&mut out, 0);

        let index_position = chunks.iter().position(|c| c.starts_with(b"PMGI"));
        out.extend_from_slice(b"ITSP");
        for value in [1, ITSP_LENGTH, 10, self.chunk_size, 2] {
            push_u32(&mut out, value);
        }
        push_u32(&mut out, if index_position.is_some() { 2 } else { 1 });
        out.extend_from_slice(&index_position.map_or(-1, |i| i as i32).to_le_bytes());
        push_u32(&mut out, 0);
        push_u32(&mut out, chunks.len() as u32 - 1);
        out.extend_from_slice(&(-1i32).to_le_bytes());
        push_u32(&mut out, chunks.len() as u32);
        push_u32(&mut out, 0x409);
        out.extend_from_slice(&[0x22; 16]);
        push_u32(&mut out, ITSP_LENGTH);
        for _ in 0..3 {
            out.extend_from_slice(&(-1i32).to_le_bytes());
        }
        assert_eq!(out.len() as u64, directory_offset + u64::from(ITSP_LENGTH));

        for chunk in chunks {
            out.extend_from_slice(chunk);
        }
        out.extend_from_slice(section0);
        assert_eq!(out.len() as u64, total);
        out
    }
}

#[test]
fn canonical_codes_are_prefix_free() {
    let codes = canonical_codes(&[2, 1, 3, 3]);
    assert_eq!(codes, vec![0b10, 0b0, 0b110, 0b111]);
}
