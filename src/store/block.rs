//! Positional block reads over a byte source.
//!
//! The scanners never seek: every read names its absolute offset, so a single
//! file handle can serve the indexer and any number of message reads at once.

use std::fs::File;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::trace;

use crate::error::{MboxError, Result};

/// Default block size used by the scanners (4 KB).
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Smallest accepted block size. The recovery scan steps back by its needle
/// length on every miss, so a block must be comfortably larger than that.
pub const MIN_BLOCK_SIZE: usize = 16;

/// Largest offset a file can be read at. Anything past it reads as end of
/// data, which is where a saturated `Content-Length` leaves the cursor.
const MAX_OFFSET: u64 = i64::MAX as u64;

/// Random-access read capability.
///
/// Implementations read into `buf` starting at `offset` and return how many
/// bytes were read; `0` means end of data. A short count does not have to
/// mean end of data, [`BlockReader`] keeps reading until it does.
pub trait ReadAt {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> std::io::Result<usize>;
}

impl ReadAt for File {
    #[cfg(unix)]
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> std::io::Result<usize> {
        std::os::unix::fs::FileExt::read_at(self, buf, offset)
    }

    #[cfg(windows)]
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> std::io::Result<usize> {
        std::os::windows::fs::FileExt::seek_read(self, buf, offset)
    }
}

impl ReadAt for [u8] {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> std::io::Result<usize> {
        let start = match usize::try_from(offset) {
            Ok(start) if start < self.len() => start,
            _ => return Ok(0),
        };
        let n = buf.len().min(self.len() - start);
        buf[..n].copy_from_slice(&self[start..start + n]);
        Ok(n)
    }
}

impl ReadAt for Vec<u8> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> std::io::Result<usize> {
        self.as_slice().read_at(offset, buf)
    }
}

impl<R: ReadAt + ?Sized> ReadAt for &R {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> std::io::Result<usize> {
        (**self).read_at(offset, buf)
    }
}

impl<R: ReadAt + ?Sized> ReadAt for Arc<R> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> std::io::Result<usize> {
        (**self).read_at(offset, buf)
    }
}

/// Shared flag used to abort a long scan between block reads.
///
/// Clones share the same flag; cancel from any thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Issues fixed-size reads at arbitrary offsets.
pub struct BlockReader<R> {
    source: R,
    block_size: usize,
    cancel: CancelToken,
    path: Option<PathBuf>,
}

impl<R: ReadAt> BlockReader<R> {
    /// Wrap `source` with the given block size.
    pub fn new(source: R, block_size: usize) -> Result<Self> {
        if block_size < MIN_BLOCK_SIZE {
            return Err(MboxError::InvalidConfig(format!(
                "block size {block_size} is below the minimum of {MIN_BLOCK_SIZE}"
            )));
        }
        Ok(Self {
            source,
            block_size,
            cancel: CancelToken::new(),
            path: None,
        })
    }

    /// Use `token` for cancellation checks.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Attach a path so I/O errors name the file.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn source(&self) -> &R {
        &self.source
    }

    /// Read one block at `offset`.
    ///
    /// The returned buffer is shorter than the block size only at end of
    /// data; a read starting at or past the end returns an empty buffer.
    pub fn read_block(&self, offset: u64) -> Result<Vec<u8>> {
        self.read_exact_at(offset, self.block_size)
    }

    /// Read `length` bytes at `offset`, returning what the source actually
    /// had. Callers decide whether a short result is an error.
    ///
    /// The buffer grows one block at a time, so a huge `length` costs only
    /// as much memory as the source can fill.
    pub fn read_exact_at(&self, offset: u64, length: usize) -> Result<Vec<u8>> {
        if self.cancel.is_cancelled() {
            return Err(MboxError::Cancelled);
        }
        let mut buf = Vec::with_capacity(length.min(self.block_size));
        if offset > MAX_OFFSET {
            return Ok(buf);
        }
        let mut filled = 0;
        while filled < length {
            let chunk = (length - filled).min(self.block_size);
            buf.resize(filled + chunk, 0);
            let at = offset.saturating_add(filled as u64);
            match self.source.read_at(at, &mut buf[filled..filled + chunk]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.io_error(e)),
            }
        }
        buf.truncate(filled);
        trace!(offset, requested = length, read = filled, "Block read");
        Ok(buf)
    }

    fn io_error(&self, source: std::io::Error) -> MboxError {
        match &self.path {
            Some(path) => MboxError::io(path, source),
            None => MboxError::from(source),
        }
    }
}
