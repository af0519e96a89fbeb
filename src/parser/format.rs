//! MBOX magic check and line-terminator detection.

use memchr::memchr;
use tracing::debug;

use crate::error::{MboxError, Result};
use crate::model::terminator::LineTerminator;
use crate::store::block::{BlockReader, ReadAt};

/// Every MBOX file starts with an envelope line beginning with these bytes.
pub const MAGIC: &[u8; 5] = b"From ";

/// Check the MBOX magic and detect the line terminator.
///
/// Fails with [`MboxError::InvalidFormat`] unless the data begins with
/// `From `. The terminator is decided by the end of the envelope line: `CRLF`
/// when the first `\n` is preceded by `\r`, `LF` otherwise. Reads continue
/// past the first block until that `\n` turns up, so a long envelope line
/// and a small block size still detect correctly. A file that switches
/// styles later is scanned with whatever this returns.
pub fn detect_format<R: ReadAt>(reader: &BlockReader<R>) -> Result<LineTerminator> {
    debug!("Checking MBOX magic");
    let mut block = reader.read_block(0)?;
    if !block.starts_with(MAGIC) {
        let shown = String::from_utf8_lossy(&block[..block.len().min(MAGIC.len())]).into_owned();
        return Err(MboxError::InvalidFormat(format!(
            "expected leading 'From ', found {shown:?}"
        )));
    }

    let mut offset = 0u64;
    let mut previous: Option<u8> = None;
    let terminator = loop {
        if let Some(pos) = memchr(b'\n', &block) {
            let before = if pos > 0 { Some(block[pos - 1]) } else { previous };
            break match before {
                Some(b'\r') => LineTerminator::CrLf,
                _ => LineTerminator::Lf,
            };
        }
        if block.len() < reader.block_size() {
            // A single line without any terminator.
            break LineTerminator::Lf;
        }
        previous = block.last().copied();
        offset += block.len() as u64;
        block = reader.read_block(offset)?;
    };
    debug!(terminator = %terminator, "MBOX magic found");
    Ok(terminator)
}
