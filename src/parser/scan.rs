//! Block-wise boundary scanners.
//!
//! Both scanners read fixed-size blocks and search them for a byte pattern
//! that may straddle two consecutive reads:
//!
//! - [`scan_header_block`] looks for the blank line (doubled terminator) that
//!   closes a header block.
//! - [`find_next_message_start`] looks for `terminator + "From "`, and is only
//!   used when a message has no usable `Content-Length`.

use memchr::memmem;
use tracing::trace;

use crate::error::Result;
use crate::model::terminator::LineTerminator;
use crate::parser::format::MAGIC;
use crate::store::block::{BlockReader, ReadAt};

/// Return the raw header block starting at `start`.
///
/// The block runs up to, but not including, the first blank line. The tail
/// of the bytes gathered so far (one byte short of the delimiter) is kept as
/// a carry and searched together with each new block, so a delimiter split
/// across two reads is still found at its exact position.
///
/// At end of data the final partial block is searched as well; without a
/// delimiter everything up to the end is returned. A start offset at or past
/// the end yields an empty block.
pub fn scan_header_block<R: ReadAt>(
    reader: &BlockReader<R>,
    terminator: LineTerminator,
    start: u64,
) -> Result<Vec<u8>> {
    let finder = memmem::Finder::new(terminator.blank_line());
    let carry_max = finder.needle().len() - 1;

    let mut out: Vec<u8> = Vec::new();
    let mut offset = start;

    loop {
        let block = reader.read_block(offset)?;
        let at_eof = block.len() < reader.block_size();

        let carry_len = out.len().min(carry_max);
        let window_start = out.len() - carry_len;
        out.extend_from_slice(&block);

        if let Some(pos) = finder.find(&out[window_start..]) {
            out.truncate(window_start + pos);
            trace!(start, length = out.len(), "Header block delimited");
            return Ok(out);
        }

        if at_eof {
            trace!(start, length = out.len(), "Header block ran to end of data");
            return Ok(out);
        }
        offset += block.len() as u64;
    }
}

/// Find the offset of the next envelope line at or after `start`.
///
/// Returns the offset of the `F` in the first `terminator + "From "` found.
/// When a block misses, the next read starts a needle length before the end
/// of this one so a match split across the two reads is still seen. If the
/// data ends without a match, the end offset is returned: everything left
/// belongs to the current message.
pub fn find_next_message_start<R: ReadAt>(
    reader: &BlockReader<R>,
    terminator: LineTerminator,
    start: u64,
) -> Result<u64> {
    let needle = [terminator.as_bytes(), MAGIC.as_slice()].concat();
    let finder = memmem::Finder::new(&needle);
    let mut offset = start;

    loop {
        let block = reader.read_block(offset)?;
        if let Some(p) = finder.find(&block) {
            let next = offset + p as u64 + terminator.len() as u64;
            trace!(start, next, "Recovered message boundary");
            return Ok(next);
        }
        if block.len() < reader.block_size() {
            let end = offset + block.len() as u64;
            trace!(start, end, "No further boundary before end of data");
            return Ok(end);
        }
        offset += (block.len() - needle.len()) as u64;
    }
}
