//! Per-message index entry.

use super::headers::Headers;

/// Metadata for one message, enough to fetch it with a single read.
///
/// All indexed messages are kept in memory as `Vec<MessageDescriptor>`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MessageDescriptor {
    /// Byte offset of the first header byte (the `From ` envelope line).
    pub position: u64,

    /// Parsed header block.
    pub headers: Headers,

    /// Length of the raw header block, not counting the blank-line delimiter.
    pub header_length: u64,

    /// Body length, either declared by `Content-Length` or discovered by
    /// scanning for the next envelope line.
    pub content_length: u64,

    /// Distance from `position` to where the next message starts.
    pub total_length: u64,

    /// `true` when `content_length` came from a `Content-Length` header.
    pub content_length_declared: bool,

    /// Sequential index within the MBOX (0, 1, 2, …).
    pub sequence: u64,
}

impl MessageDescriptor {
    /// Number of bytes a [`MessageReader`](crate::store::reader::MessageReader)
    /// fetches for this message.
    ///
    /// `None` when a bogus `Content-Length` makes the sum overflow.
    pub fn read_length(&self) -> Option<u64> {
        self.header_length.checked_add(self.content_length)
    }

    /// Offset one past the last byte this message accounts for.
    pub fn end(&self) -> u64 {
        self.position.saturating_add(self.total_length)
    }

    /// The envelope line without its `From ` prefix, if present.
    pub fn envelope_from(&self) -> Option<&str> {
        self.headers.first("Envelope-From")
    }

    /// First `Subject` value with surrounding whitespace removed.
    pub fn subject(&self) -> Option<&str> {
        self.headers.first("Subject").map(str::trim)
    }
}
