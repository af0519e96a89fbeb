//! Index construction, validation, and persistence.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{MboxError, Result};
use crate::index::format::{flags_for, IndexHeader, HASH_PREFIX_LEN, HEADER_SIZE, MAGIC, VERSION};
use crate::index::indexer::{MessageIndexer, ScanEvent, ScanOptions};
use crate::model::message::MessageDescriptor;
use crate::store::block::BlockReader;

/// Report progress every 4 MB of scanned data.
const PROGRESS_INTERVAL: u64 = 4 * 1024 * 1024;

/// Scan an MBOX file from start to end and return its index.
///
/// `progress` receives `(bytes_scanned, file_size)` every few megabytes and
/// once more at the end.
pub fn scan_file(
    mbox_path: &Path,
    options: &ScanOptions,
    progress: Option<&dyn Fn(u64, u64)>,
) -> Result<Vec<MessageDescriptor>> {
    let file = File::open(mbox_path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            MboxError::FileNotFound(mbox_path.to_path_buf())
        } else {
            MboxError::io(mbox_path, e)
        }
    })?;
    let file_size = file
        .metadata()
        .map_err(|e| MboxError::io(mbox_path, e))?
        .len();

    let reader = BlockReader::new(file, options.block_size)?
        .with_cancel(options.cancel.clone())
        .with_path(mbox_path);
    let mut indexer = MessageIndexer::with_reader(reader, options.skip_internal_data)?;
    debug!(
        path = %mbox_path.display(),
        terminator = %indexer.terminator(),
        "Scanning MBOX"
    );

    let mut entries = Vec::new();
    let mut last_progress: u64 = 0;

    while let Some(event) = indexer.next() {
        match event? {
            ScanEvent::Message(descriptor) => entries.push(descriptor),
            ScanEvent::SkippedInternalData { position } => {
                debug!(offset = position, "Dropped folder internal data message");
            }
            ScanEvent::End { .. } => break,
        }

        if let Some(cb) = progress {
            let scanned = indexer.cursor().min(file_size);
            if scanned - last_progress >= PROGRESS_INTERVAL {
                cb(scanned, file_size);
                last_progress = scanned;
            }
        }
    }

    if let Some(cb) = progress {
        cb(file_size, file_size);
    }

    Ok(entries)
}

/// Build (or load) the index for an MBOX file.
///
/// 1. If a valid index already exists and `force_rebuild` is false, load it.
/// 2. Otherwise, scan the file and write a new index file.
///
/// Returns the list of [`MessageDescriptor`] for every message in the MBOX.
pub fn build_index(
    mbox_path: &Path,
    force_rebuild: bool,
    options: &ScanOptions,
    progress: Option<&dyn Fn(u64, u64)>,
) -> anyhow::Result<Vec<MessageDescriptor>> {
    if !force_rebuild {
        if let Some(entries) = load_index(mbox_path, options.skip_internal_data)? {
            debug!(
                path = %mbox_path.display(),
                count = entries.len(),
                "Loaded existing index"
            );
            return Ok(entries);
        }
    }

    info!(path = %mbox_path.display(), "Building index");
    let entries = scan_file(mbox_path, options, progress)?;

    if let Err(e) = write_index(mbox_path, &entries, options.skip_internal_data) {
        warn!(error = %e, "Could not write index file; continuing without persistence");
    }

    Ok(entries)
}

/// Attempt to load an existing index. Returns `None` if the index is missing,
/// stale, or was built with different scan settings.
pub fn load_index(
    mbox_path: &Path,
    skip_internal_data: bool,
) -> anyhow::Result<Option<Vec<MessageDescriptor>>> {
    let idx_path = index_path_for(mbox_path);
    if !idx_path.exists() {
        let cache_path = cache_index_path_for(mbox_path);
        if cache_path.exists() {
            return load_index_from_file(&cache_path, mbox_path, skip_internal_data);
        }
        return Ok(None);
    }
    load_index_from_file(&idx_path, mbox_path, skip_internal_data)
}

/// Load and validate an index from a specific file.
fn load_index_from_file(
    idx_path: &Path,
    mbox_path: &Path,
    skip_internal_data: bool,
) -> anyhow::Result<Option<Vec<MessageDescriptor>>> {
    let data = std::fs::read(idx_path).map_err(|e| MboxError::io(idx_path, e))?;

    if data.len() < HEADER_SIZE {
        debug!("Index file too small");
        return Ok(None);
    }

    let header: IndexHeader =
        bincode::deserialize(&data[..HEADER_SIZE]).map_err(|e| MboxError::InvalidIndex {
            path: idx_path.to_path_buf(),
            reason: format!("Header deserialization failed: {e}"),
        })?;

    if let Err(reason) = header.validate() {
        debug!(reason = %reason, "Index header invalid");
        return Ok(None);
    }

    if header.flags != flags_for(skip_internal_data) {
        debug!("Index built with different scan settings");
        return Ok(None);
    }

    let mbox_meta = std::fs::metadata(mbox_path).map_err(|e| MboxError::io(mbox_path, e))?;

    if header.mbox_file_size != mbox_meta.len() {
        debug!("MBOX file size changed");
        return Ok(None);
    }

    if header.mbox_modified_time != modified_secs(&mbox_meta) {
        debug!("MBOX modification time changed");
        return Ok(None);
    }

    let current_hash = sha256_first_n(mbox_path, HASH_PREFIX_LEN)?;
    if header.sha256_first_4kb != current_hash {
        debug!("MBOX content hash changed");
        return Ok(None);
    }

    let entries: Vec<MessageDescriptor> =
        bincode::deserialize(&data[HEADER_SIZE..]).map_err(|e| MboxError::InvalidIndex {
            path: idx_path.to_path_buf(),
            reason: format!("Entry deserialization failed: {e}"),
        })?;

    if entries.len() as u64 != header.message_count {
        debug!("Message count mismatch");
        return Ok(None);
    }

    Ok(Some(entries))
}

/// Write the index to disk.
fn write_index(
    mbox_path: &Path,
    entries: &[MessageDescriptor],
    skip_internal_data: bool,
) -> anyhow::Result<()> {
    let mbox_meta = std::fs::metadata(mbox_path).map_err(|e| MboxError::io(mbox_path, e))?;
    let hash = sha256_first_n(mbox_path, HASH_PREFIX_LEN)?;

    let header = IndexHeader {
        magic: *MAGIC,
        version: VERSION,
        flags: flags_for(skip_internal_data),
        message_count: entries.len() as u64,
        mbox_file_size: mbox_meta.len(),
        mbox_modified_time: modified_secs(&mbox_meta),
        sha256_first_4kb: hash,
    };

    let header_bytes = bincode::serialize(&header)?;
    let entries_bytes = bincode::serialize(entries)?;

    // Pad header to HEADER_SIZE
    let mut padded_header = vec![0u8; HEADER_SIZE];
    let copy_len = header_bytes.len().min(HEADER_SIZE);
    padded_header[..copy_len].copy_from_slice(&header_bytes[..copy_len]);

    // Try writing next to the MBOX file first
    let idx_path = index_path_for(mbox_path);
    match write_index_to_file(&idx_path, &padded_header, &entries_bytes) {
        Ok(()) => {
            info!(path = %idx_path.display(), "Index written");
            return Ok(());
        }
        Err(e) => {
            debug!(error = %e, "Cannot write index next to MBOX, trying cache dir");
        }
    }

    let cache_path = cache_index_path_for(mbox_path);
    if let Some(parent) = cache_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    write_index_to_file(&cache_path, &padded_header, &entries_bytes)?;
    info!(path = %cache_path.display(), "Index written to cache");
    Ok(())
}

/// Write header + entries to a file.
fn write_index_to_file(path: &Path, header: &[u8], entries: &[u8]) -> anyhow::Result<()> {
    let mut file = File::create(path).map_err(|e| MboxError::io(path, e))?;
    file.write_all(header).map_err(|e| MboxError::io(path, e))?;
    file.write_all(entries)
        .map_err(|e| MboxError::io(path, e))?;
    file.flush().map_err(|e| MboxError::io(path, e))?;
    Ok(())
}

/// Modification time in whole seconds since the Unix epoch (0 if unavailable).
fn modified_secs(meta: &std::fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Compute SHA-256 of the first `n` bytes of a file.
fn sha256_first_n(path: &Path, n: usize) -> anyhow::Result<[u8; 32]> {
    let file = File::open(path).map_err(|e| MboxError::io(path, e))?;
    let mut buf = Vec::with_capacity(n);
    file.take(n as u64)
        .read_to_end(&mut buf)
        .map_err(|e| MboxError::io(path, e))?;
    let mut hasher = Sha256::new();
    hasher.update(&buf);
    Ok(hasher.finalize().into())
}

/// Primary index path: hidden file next to the MBOX.
///
/// Example: `/data/mail.mbox` → `/data/.mail.mbox.mboxseek.idx`
pub fn index_path_for(mbox_path: &Path) -> PathBuf {
    let filename = mbox_path.file_name().unwrap_or_default().to_string_lossy();
    let idx_name = format!(".{filename}.mboxseek.idx");
    mbox_path.with_file_name(idx_name)
}

/// Fallback index path inside the user cache directory.
///
/// Example: `~/.cache/mboxseek/<sha256_of_path>.idx`
pub fn cache_index_path_for(mbox_path: &Path) -> PathBuf {
    let cache_dir = dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("mboxseek");

    let mut hasher = Sha256::new();
    hasher.update(mbox_path.to_string_lossy().as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    cache_dir.join(format!("{hash}.idx"))
}

/// Return the size in bytes of the index file for the given MBOX (0 if missing).
pub fn index_file_size(mbox_path: &Path) -> u64 {
    let idx_path = index_path_for(mbox_path);
    std::fs::metadata(&idx_path)
        .or_else(|_| std::fs::metadata(cache_index_path_for(mbox_path)))
        .map(|m| m.len())
        .unwrap_or(0)
}
