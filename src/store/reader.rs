//! Random-access message reads by descriptor, with an LRU-cached store on top.

use std::fs::File;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use lru::LruCache;
use tracing::debug;

use crate::error::{MboxError, Result};
use crate::model::message::MessageDescriptor;
use crate::store::block::{BlockReader, ReadAt, DEFAULT_BLOCK_SIZE};

/// Default number of raw messages to keep in the LRU cache.
const DEFAULT_CACHE_SIZE: usize = 50;

/// Fetches one message with one exact-length read.
///
/// Reads take `&self` and never move a file cursor, so a reader can be
/// shared across threads while an index scan is still running.
pub struct MessageReader<R> {
    reader: BlockReader<R>,
}

impl<R: ReadAt> MessageReader<R> {
    pub fn new(source: R) -> Result<Self> {
        Ok(Self {
            reader: BlockReader::new(source, DEFAULT_BLOCK_SIZE)?,
        })
    }

    /// Reuse a reader, e.g. the one handed back by
    /// [`MessageIndexer::into_reader`](crate::index::indexer::MessageIndexer::into_reader).
    pub fn from_block_reader(reader: BlockReader<R>) -> Self {
        Self { reader }
    }

    /// Raw bytes of a message: `header_length + content_length` bytes
    /// starting at `position`, header block included.
    pub fn read_message(&self, descriptor: &MessageDescriptor) -> Result<Vec<u8>> {
        let length = descriptor.read_length().ok_or(MboxError::ShortRead {
            offset: descriptor.position,
            expected: u64::MAX,
            actual: 0,
        })?;
        self.read_checked(descriptor.position, length)
    }

    /// Only the raw header block of a message.
    pub fn read_headers(&self, descriptor: &MessageDescriptor) -> Result<Vec<u8>> {
        self.read_checked(descriptor.position, descriptor.header_length)
    }

    fn read_checked(&self, offset: u64, length: u64) -> Result<Vec<u8>> {
        debug!(offset, length, "Reading message from MBOX");
        let wanted = usize::try_from(length).map_err(|_| MboxError::ShortRead {
            offset,
            expected: length,
            actual: 0,
        })?;
        let buf = self.reader.read_exact_at(offset, wanted)?;
        if buf.len() != wanted {
            return Err(MboxError::ShortRead {
                offset,
                expected: length,
                actual: buf.len() as u64,
            });
        }
        Ok(buf)
    }
}

/// Reads messages from an MBOX file using index offsets.
///
/// Keeps an LRU cache of raw messages so that paging back and forth through
/// a listing does not hit the disk again.
pub struct MboxStore {
    path: PathBuf,
    reader: MessageReader<File>,
    cache: LruCache<u64, Vec<u8>>,
}

impl MboxStore {
    /// Open an MBOX file for random-access reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_cache_size(path, DEFAULT_CACHE_SIZE)
    }

    /// Open with a specific cache capacity (clamped to at least one entry).
    pub fn with_cache_size(path: impl AsRef<Path>, cache_size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MboxError::FileNotFound(path.clone())
            } else {
                MboxError::io(&path, e)
            }
        })?;
        let reader = BlockReader::new(file, DEFAULT_BLOCK_SIZE)?.with_path(&path);
        Ok(Self {
            path,
            reader: MessageReader::from_block_reader(reader),
            cache: LruCache::new(NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw message bytes. Cached results are returned immediately.
    pub fn get_message(&mut self, descriptor: &MessageDescriptor) -> Result<&[u8]> {
        if !self.cache.contains(&descriptor.position) {
            let raw = self.reader.read_message(descriptor)?;
            self.cache.put(descriptor.position, raw);
        }
        // Safe: we just inserted if missing
        Ok(self
            .cache
            .get(&descriptor.position)
            .map(Vec::as_slice)
            .expect("just inserted"))
    }

    /// Raw header block of a message (not cached).
    pub fn get_headers(&self, descriptor: &MessageDescriptor) -> Result<Vec<u8>> {
        self.reader.read_headers(descriptor)
    }

    /// The underlying reader, for uncached reads.
    pub fn reader(&self) -> &MessageReader<File> {
        &self.reader
    }
}
