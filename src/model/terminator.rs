//! Line terminator detected for an MBOX file.

/// The line-ending style used throughout one MBOX file.
///
/// Detected once from the first block (see
/// [`detect_format`](crate::parser::format::detect_format)) and then used by
/// every scanner and by the header parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum LineTerminator {
    /// Unix `\n`.
    #[default]
    Lf,
    /// DOS/network `\r\n`.
    CrLf,
}

impl LineTerminator {
    /// Raw bytes of one terminator.
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            Self::Lf => b"\n",
            Self::CrLf => b"\r\n",
        }
    }

    /// Same as [`as_bytes`](Self::as_bytes), as a string slice.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
        }
    }

    /// Length of one terminator in bytes (1 or 2).
    #[allow(clippy::len_without_is_empty)]
    pub fn len(self) -> usize {
        self.as_bytes().len()
    }

    /// The doubled terminator that ends a header block.
    pub fn blank_line(self) -> &'static [u8] {
        match self {
            Self::Lf => b"\n\n",
            Self::CrLf => b"\r\n\r\n",
        }
    }

    /// Bytes sitting between the end of the header block and the start of
    /// the next message, not counting the declared body itself: the blank
    /// line delimiter plus the terminator that closes the body.
    ///
    /// 3 for `Lf`, 6 for `CrLf`.
    pub fn separator_len(self) -> u64 {
        (self.blank_line().len() + self.len()) as u64
    }

    /// Short human-readable name, used in logs and CLI output.
    pub fn name(self) -> &'static str {
        match self {
            Self::Lf => "LF",
            Self::CrLf => "CRLF",
        }
    }
}

impl std::fmt::Display for LineTerminator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
