//! Canonical Huffman decoding tables for LZX

use crate::error::{Error, Result};
use crate::reader::BitReader;

/// Extra room after the code lengths so run-length fills can overshoot.
const LENTABLE_SAFETY: usize = 64;
/// Longest code length LZX allows.
const MAX_CODE_LENGTH: u32 = 16;

const PRETREE_BITS: u32 = 6;
const PRETREE_SYMBOLS: usize = 20;

/// A Huffman tree built from code lengths.
///
/// Decoding uses a direct lookup table of `1 << bits` entries for codes up
/// to `bits` long. Longer codes continue into a binary tree whose nodes are
/// stored after the direct table, two slots per node. Node ids start at
/// half the direct table size, which must be at least the symbol count.
#[derive(Debug, Clone)]
pub struct HuffmanTree {
    bits: u32,
    max_symbol: usize,
    symbols: Vec<u16>,
    lengths: Vec<u8>,
}

impl HuffmanTree {
    pub fn new(bits: u32, max_symbol: usize) -> Self {
        Self {
            bits,
            max_symbol,
            symbols: vec![0; (1 << bits) + (max_symbol << 1)],
            lengths: vec![0; max_symbol + LENTABLE_SAFETY],
        }
    }

    /// Reset all code lengths to zero.
    pub fn clear(&mut self) {
        self.lengths.fill(0);
    }

    /// Code length of `symbol`.
    pub fn length(&self, symbol: usize) -> u8 {
        self.lengths.get(symbol).copied().unwrap_or(0)
    }

    /// Replace the code lengths of the first `lengths.len()` symbols.
    pub fn set_lengths(&mut self, lengths: &[u8]) -> Result<()> {
        if lengths.len() > self.max_symbol {
            return Err(Error::HuffmanTable(format!(
                "{} code lengths for a tree of {} symbols",
                lengths.len(),
                self.max_symbol
            )));
        }
        self.lengths[..lengths.len()].copy_from_slice(lengths);
        Ok(())
    }

    /// Build the decoding table from the current code lengths.
    ///
    /// An all-zero length table is accepted and yields an empty tree.
    pub fn build(&mut self) -> Result<()> {
        let bits = self.bits;
        let mut table_mask: u32 = 1 << bits;
        let mut bit_mask: u32 = table_mask >> 1;
        let mut next_node = (table_mask >> 1) as usize;
        let mut pos: u32 = 0;
        let mut bit_num: u32 = 1;

        // codes that fit the direct table
        while bit_num <= bits {
            for (symbol, &length) in self.lengths[..self.max_symbol].iter().enumerate() {
                if u32::from(length) != bit_num {
                    continue;
                }
                let leaf = pos as usize;
                pos += bit_mask;
                if pos > table_mask {
                    return Err(Error::HuffmanTable("symbol table overrun".to_string()));
                }
                self.symbols[leaf..pos as usize].fill(symbol as u16);
            }
            bit_mask >>= 1;
            bit_num += 1;
        }

        if pos != table_mask {
            self.symbols[pos as usize..table_mask as usize].fill(0);

            // remaining codes hang off the direct table as tree nodes
            pos <<= 16;
            table_mask <<= 16;
            bit_mask = 1 << 15;

            while bit_num <= MAX_CODE_LENGTH {
                for (symbol, &length) in self.lengths[..self.max_symbol].iter().enumerate() {
                    if u32::from(length) != bit_num {
                        continue;
                    }
                    let mut leaf = (pos >> 16) as usize;
                    for fill in 0..(bit_num - bits) {
                        if self.symbols[leaf] == 0 {
                            let child = next_node << 1;
                            if child + 1 >= self.symbols.len() {
                                return Err(Error::HuffmanTable(
                                    "symbol table node overflow".to_string(),
                                ));
                            }
                            self.symbols[child] = 0;
                            self.symbols[child + 1] = 0;
                            self.symbols[leaf] = next_node as u16;
                            next_node += 1;
                        }
                        leaf = (self.symbols[leaf] as usize) << 1;
                        if (pos >> (15 - fill)) & 1 != 0 {
                            leaf += 1;
                        }
                    }
                    self.symbols[leaf] = symbol as u16;
                    pos += bit_mask;
                    if pos > table_mask {
                        return Err(Error::HuffmanTable("symbol table overflow".to_string()));
                    }
                }
                bit_mask >>= 1;
                bit_num += 1;
            }
        }

        if pos != table_mask && self.lengths[..self.max_symbol].iter().any(|&l| l != 0) {
            return Err(Error::HuffmanTable("erroneous symbol table".to_string()));
        }
        Ok(())
    }

    /// Decode one symbol.
    pub fn read_symbol(&self, reader: &mut BitReader<'_>) -> Result<u16> {
        let next = reader.peek_lenient(MAX_CODE_LENGTH);
        let mut symbol = self.symbols[(next >> (MAX_CODE_LENGTH - self.bits)) as usize] as usize;

        if symbol >= self.max_symbol {
            let mut mask: u32 = 1 << (MAX_CODE_LENGTH - self.bits);
            loop {
                mask >>= 1;
                if mask == 0 {
                    return Err(Error::HuffmanTable("code longer than 16 bits".to_string()));
                }
                let node = (symbol << 1) | usize::from(next & mask != 0);
                symbol = *self.symbols.get(node).ok_or_else(|| {
                    Error::HuffmanTable(format!("tree node {node} out of range"))
                })? as usize;
                if symbol < self.max_symbol {
                    break;
                }
            }
        }

        let length = self.lengths[symbol];
        if length == 0 {
            return Err(Error::HuffmanTable(format!(
                "decoded symbol {symbol} has no code"
            )));
        }
        reader.read_bits(u32::from(length))?;
        Ok(symbol as u16)
    }

    /// Read the code lengths of `first..last` through a pretree.
    ///
    /// Lengths are coded as deltas modulo 17 against the previous lengths,
    /// with run codes for zeros and repeats.
    pub fn read_lengths(
        &mut self,
        reader: &mut BitReader<'_>,
        first: usize,
        last: usize,
    ) -> Result<()> {
        let mut pretree = HuffmanTree::new(PRETREE_BITS, PRETREE_SYMBOLS);
        for length in &mut pretree.lengths[..PRETREE_SYMBOLS] {
            *length = reader.read_bits(4)? as u8;
        }
        pretree.build()?;

        let mut pos = first;
        while pos < last {
            match pretree.read_symbol(reader)? {
                17 => {
                    let run = reader.read_bits(4)? as usize + 4;
                    self.fill_lengths(pos, run, 0)?;
                    pos += run;
                }
                18 => {
                    let run = reader.read_bits(5)? as usize + 20;
                    self.fill_lengths(pos, run, 0)?;
                    pos += run;
                }
                19 => {
                    let run = reader.read_bits(1)? as usize + 4;
                    let delta = pretree.read_symbol(reader)?;
                    let value = delta_length(self.lengths[pos], delta)?;
                    self.fill_lengths(pos, run, value)?;
                    pos += run;
                }
                delta => {
                    self.lengths[pos] = delta_length(self.lengths[pos], delta)?;
                    pos += 1;
                }
            }
        }
        Ok(())
    }

    /// Read one 3-bit length per symbol (aligned offset tree).
    pub fn read_aligned_lengths(&mut self, reader: &mut BitReader<'_>) -> Result<()> {
        for length in &mut self.lengths[..self.max_symbol] {
            *length = reader.read_bits(3)? as u8;
        }
        Ok(())
    }

    fn fill_lengths(&mut self, pos: usize, run: usize, value: u8) -> Result<()> {
        let end = pos + run;
        if end > self.lengths.len() {
            return Err(Error::HuffmanTable(format!(
                "length run to {end} overruns table of {}",
                self.lengths.len()
            )));
        }
        self.lengths[pos..end].fill(value);
        Ok(())
    }
}

fn delta_length(previous: u8, delta: u16) -> Result<u8> {
    let mut value = i32::from(previous) - i32::from(delta);
    if value < 0 {
        value += 17;
    }
    if value < 0 {
        return Err(Error::HuffmanTable(format!(
            "invalid length delta {delta} from {previous}"
        )));
    }
    Ok(value as u8)
}
