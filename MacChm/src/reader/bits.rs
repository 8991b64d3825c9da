//! LZX bit stream reader
//!
//! The compressed stream is a sequence of 16-bit little-endian words whose
//! bits are consumed most-significant first. Up to 32 bits are buffered.

use crate::error::{Error, Result};

const BUFFER_BITS: u32 = 32;
const WORD_BITS: u32 = 16;

/// Largest bit count that can be requested at once.
///
/// Position slots carry up to 17 footer bits, so a refill must be able to
/// top up a buffer holding 16 bits or fewer.
pub const MAX_READ_BITS: u32 = 17;

/// Reads bits MSB-first from 16-bit little-endian words.
#[derive(Debug)]
pub struct BitReader<'a> {
    data: &'a [u8],
    position: usize,
    buffer: u32,
    bits_left: u32,
}

impl<'a> BitReader<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            position: 0,
            buffer: 0,
            bits_left: 0,
        }
    }

    /// Byte position of the next word to load.
    pub fn byte_position(&self) -> usize {
        self.position
    }

    /// Number of bits currently buffered.
    pub fn bits_buffered(&self) -> u32 {
        self.bits_left
    }

    /// Load words until at least `count` bits are buffered or input runs out.
    ///
    /// Returns the number of bits buffered afterwards. A trailing odd byte
    /// cannot form a word and is dropped.
    pub fn ensure(&mut self, count: u32) -> u32 {
        while self.bits_left < count {
            if self.data.len() - self.position < 2 {
                self.position = self.data.len();
                break;
            }
            let word = u32::from(self.data[self.position])
                | (u32::from(self.data[self.position + 1]) << 8);
            self.buffer |= word << (BUFFER_BITS - WORD_BITS - self.bits_left);
            self.bits_left += WORD_BITS;
            self.position += 2;
        }
        self.bits_left
    }

    fn top(&self, count: u32) -> u32 {
        if count == 0 {
            0
        } else {
            self.buffer >> (BUFFER_BITS - count)
        }
    }

    fn check_count(count: u32) -> Result<()> {
        if count > MAX_READ_BITS {
            return Err(Error::CorruptData(format!(
                "bit read of {count} bits exceeds {MAX_READ_BITS}"
            )));
        }
        Ok(())
    }

    /// Look at the next `count` bits without consuming them.
    pub fn peek(&mut self, count: u32) -> Result<u32> {
        Self::check_count(count)?;
        if self.ensure(count) < count {
            return Err(Error::UnexpectedEof {
                position: self.position as u64,
                requested: u64::from(count),
                length: self.data.len() as u64,
            });
        }
        Ok(self.top(count))
    }

    /// Like [`peek`](Self::peek), but missing bits read as zero.
    ///
    /// Huffman lookups peek a full 16 bits even near the end of a stream
    /// where the actual code is shorter.
    pub fn peek_lenient(&mut self, count: u32) -> u32 {
        let count = count.min(WORD_BITS);
        self.ensure(count);
        self.top(count)
    }

    /// Read and consume `count` bits.
    pub fn read_bits(&mut self, count: u32) -> Result<u32> {
        let value = self.peek(count)?;
        self.consume(count);
        Ok(value)
    }

    fn consume(&mut self, count: u32) {
        self.buffer = if count >= BUFFER_BITS {
            0
        } else {
            self.buffer << count
        };
        self.bits_left -= count;
    }

    /// Re-align to a 16-bit word boundary ahead of uncompressed data.
    ///
    /// Consumes between 1 and 16 padding bits. Whole words still sitting
    /// in the buffer are handed back to the byte stream.
    pub fn align_to_word(&mut self) -> Result<()> {
        if self.bits_left == 0 {
            self.ensure(WORD_BITS);
            if self.bits_left == 0 {
                return Err(Error::UnexpectedEof {
                    position: self.position as u64,
                    requested: 2,
                    length: self.data.len() as u64,
                });
            }
        }
        let partial = self.bits_left % WORD_BITS;
        let whole_words = self.bits_left / WORD_BITS;
        let rewind = if partial > 0 {
            whole_words
        } else {
            whole_words - 1
        };
        self.position -= (rewind * 2) as usize;
        self.buffer = 0;
        self.bits_left = 0;
        Ok(())
    }

    /// Copy raw bytes from the stream. The bit buffer must be empty.
    pub fn read_raw(&mut self, out: &mut [u8]) -> Result<()> {
        if self.bits_left != 0 {
            return Err(Error::CorruptData(
                "raw read with buffered bits".to_string(),
            ));
        }
        let end = self.position + out.len();
        if end > self.data.len() {
            return Err(Error::UnexpectedEof {
                position: self.position as u64,
                requested: out.len() as u64,
                length: self.data.len() as u64,
            });
        }
        out.copy_from_slice(&self.data[self.position..end]);
        self.position = end;
        Ok(())
    }

    /// Read a raw little-endian `u32` from the byte stream.
    pub fn read_raw_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_raw(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Skip one raw byte if there is one. Returns whether a byte was skipped.
    pub fn skip_raw_byte(&mut self) -> bool {
        if self.bits_left == 0 && self.position < self.data.len() {
            self.position += 1;
            true
        } else {
            false
        }
    }
}
