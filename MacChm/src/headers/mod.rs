//! Fixed-layout headers of the ITSF container
//!
//! Every header starts with a 4-byte ASCII signature. A wrong signature
//! is reported as [`Error::UnexpectedHeader`], which the directory walk
//! uses to tell index chunks from listing chunks.

mod chunk;
mod itsf;
mod itsp;
mod lzxc;

pub use chunk::{DirectoryChunk, PmgiHeader, PmglHeader};
pub use itsf::ItsfHeader;
pub use itsp::ItspHeader;
pub use lzxc::{LzxcHeader, ResetTable};

use std::io::{Read, Seek};

use crate::error::{Error, Result};
use crate::reader::ByteReader;

pub(crate) const ITSF_SIGNATURE: [u8; 4] = *b"ITSF";
pub(crate) const ITSP_SIGNATURE: [u8; 4] = *b"ITSP";
pub(crate) const PMGL_SIGNATURE: [u8; 4] = *b"PMGL";
pub(crate) const PMGI_SIGNATURE: [u8; 4] = *b"PMGI";
pub(crate) const LZXC_SIGNATURE: [u8; 4] = *b"LZXC";

/// Render a signature for error messages.
fn signature_text(signature: &[u8]) -> String {
    String::from_utf8_lossy(signature).into_owned()
}

pub(crate) fn read_signature<R: Read + Seek>(reader: &mut ByteReader<R>) -> Result<[u8; 4]> {
    reader.read_array::<4>()
}

pub(crate) fn expect_signature<R: Read + Seek>(
    reader: &mut ByteReader<R>,
    expected: [u8; 4],
) -> Result<()> {
    let found = read_signature(reader)?;
    check_signature(found, expected)
}

pub(crate) fn check_signature(found: [u8; 4], expected: [u8; 4]) -> Result<()> {
    if found != expected {
        return Err(Error::UnexpectedHeader {
            expected: signature_text(&expected),
            found: signature_text(&found),
        });
    }
    Ok(())
}
