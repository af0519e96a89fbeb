//! The indexing loop: header block → headers → body length → next message.
//!
//! [`MessageIndexer`] owns all scan state (cursor, terminator, counters) and
//! advances one message per [`Iterator::next`] call, so the caller decides
//! when the next block read happens and can stop at any point.

use tracing::{debug, info, trace};

use crate::config::Config;
use crate::error::Result;
use crate::model::headers::Headers;
use crate::model::message::MessageDescriptor;
use crate::model::terminator::LineTerminator;
use crate::parser::format::detect_format;
use crate::parser::header::{parse_headers, ENVELOPE_FROM};
use crate::parser::scan::{find_next_message_start, scan_header_block};
use crate::store::block::{BlockReader, CancelToken, ReadAt, DEFAULT_BLOCK_SIZE};

/// `From` value prefix of the pseudo-message some mail clients keep at the
/// top of a folder to store their own bookkeeping.
pub const INTERNAL_DATA_MARKER: &str = " Mail System Internal Data";

/// Tuning knobs for a scan.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Size of every block read, in bytes.
    pub block_size: usize,
    /// Drop a leading "Mail System Internal Data" pseudo-message.
    pub skip_internal_data: bool,
    /// Checked before every block read.
    pub cancel: CancelToken,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            skip_internal_data: true,
            cancel: CancelToken::new(),
        }
    }
}

impl From<&Config> for ScanOptions {
    fn from(config: &Config) -> Self {
        Self {
            block_size: config.scan.block_size,
            skip_internal_data: config.scan.skip_internal_data,
            cancel: CancelToken::new(),
        }
    }
}

/// One step of a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// A message was indexed. Emitted in file order.
    Message(MessageDescriptor),
    /// The leading internal-data pseudo-message was dropped.
    SkippedInternalData { position: u64 },
    /// The end of the mailbox was reached. Emitted exactly once.
    End { messages: u64 },
}

/// Streaming indexer over an MBOX source.
///
/// Yields `Result<ScanEvent>`; after `End` or the first error the iterator
/// is exhausted.
pub struct MessageIndexer<R> {
    reader: BlockReader<R>,
    terminator: LineTerminator,
    cursor: u64,
    sequence: u64,
    skip_internal_data: bool,
    done: bool,
}

impl<R: ReadAt> MessageIndexer<R> {
    /// Validate the MBOX magic of `source` and prepare a scan from offset 0.
    pub fn new(source: R, options: &ScanOptions) -> Result<Self> {
        let reader =
            BlockReader::new(source, options.block_size)?.with_cancel(options.cancel.clone());
        Self::with_reader(reader, options.skip_internal_data)
    }

    /// Same as [`new`](Self::new) for an already configured [`BlockReader`].
    pub fn with_reader(reader: BlockReader<R>, skip_internal_data: bool) -> Result<Self> {
        let terminator = detect_format(&reader)?;
        Ok(Self {
            reader,
            terminator,
            cursor: 0,
            sequence: 0,
            skip_internal_data,
            done: false,
        })
    }

    /// Line terminator detected for this file.
    pub fn terminator(&self) -> LineTerminator {
        self.terminator
    }

    /// Offset where the next header block scan will start.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Give back the underlying reader, e.g. to fetch messages afterwards.
    pub fn into_reader(self) -> BlockReader<R> {
        self.reader
    }

    /// Run the scan to completion and return every indexed message.
    pub fn index_all(self) -> Result<Vec<MessageDescriptor>> {
        let mut entries = Vec::new();
        for event in self {
            if let ScanEvent::Message(descriptor) = event? {
                entries.push(descriptor);
            }
        }
        Ok(entries)
    }

    fn step(&mut self) -> Result<ScanEvent> {
        let mut block = scan_header_block(&self.reader, self.terminator, self.cursor)?;
        if block.is_empty() || block.starts_with(self.terminator.as_bytes()) {
            let skipped = self.skip_blank_lines()?;
            if skipped > 0 {
                debug!(offset = self.cursor, skipped, "Skipped blank lines between messages");
                block = scan_header_block(&self.reader, self.terminator, self.cursor)?;
            }
        }

        if block.is_empty() {
            info!(messages = self.sequence, offset = self.cursor, "Scan complete");
            return Ok(ScanEvent::End {
                messages: self.sequence,
            });
        }

        let position = self.cursor;
        let header_length = block.len() as u64;
        let headers = parse_headers(&block, self.terminator);

        let (content_length, total_length, declared) = match headers.content_length() {
            Some(content_length) => {
                let total = header_length
                    .saturating_add(content_length)
                    .saturating_add(self.terminator.separator_len());
                self.cursor = position.saturating_add(total);
                (content_length, total, true)
            }
            None => {
                let body_start = position + header_length;
                let next = find_next_message_start(&self.reader, self.terminator, body_start)?;
                trace!(position, next, "No usable Content-Length, scanned for next message");
                self.cursor = next;
                let content_length = next - body_start;
                (content_length, header_length + content_length, false)
            }
        };

        if position == 0 && self.skip_internal_data && is_internal_data(&headers) {
            info!("Skipping folder internal data");
            return Ok(ScanEvent::SkippedInternalData { position });
        }

        let descriptor = MessageDescriptor {
            position,
            headers,
            header_length,
            content_length,
            total_length,
            content_length_declared: declared,
            sequence: self.sequence,
        };
        self.sequence += 1;
        trace!(
            position,
            header_length,
            content_length,
            declared,
            "Indexed message"
        );
        Ok(ScanEvent::Message(descriptor))
    }

    /// Advance the cursor past bare line terminators. Returns the bytes skipped.
    fn skip_blank_lines(&mut self) -> Result<u64> {
        let term = self.terminator.as_bytes();
        let start = self.cursor;
        loop {
            let block = self.reader.read_block(self.cursor)?;
            let skip = leading_terminators_len(&block, term);
            self.cursor += skip as u64;

            let rest = &block[skip..];
            let full = block.len() == self.reader.block_size();
            // Keep going only when the block ended inside the blank run.
            let blank_run_continues = full && term.starts_with(rest) && rest.len() < term.len();
            if skip == 0 || !blank_run_continues {
                return Ok(self.cursor - start);
            }
        }
    }
}

impl<R: ReadAt> Iterator for MessageIndexer<R> {
    type Item = Result<ScanEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let event = self.step();
        if matches!(event, Ok(ScanEvent::End { .. }) | Err(_)) {
            self.done = true;
        }
        Some(event)
    }
}

/// Length of the run of whole `term` sequences at the start of `block`.
fn leading_terminators_len(block: &[u8], term: &[u8]) -> usize {
    let mut len = 0;
    while block[len..].starts_with(term) {
        len += term.len();
    }
    len
}

/// Whether these headers belong to a client's internal-data pseudo-message.
fn is_internal_data(headers: &Headers) -> bool {
    ["From", ENVELOPE_FROM].iter().any(|name| {
        headers
            .first(name)
            .is_some_and(|v| v.starts_with(INTERNAL_DATA_MARKER))
    })
}
