//! RFC 822 header block parsing: folding, duplicate names and the envelope line.

use crate::model::headers::Headers;
use crate::model::terminator::LineTerminator;

/// Name given to the `From ` envelope line.
pub const ENVELOPE_FROM: &str = "Envelope-From";

/// Parse a raw header block into an ordered [`Headers`] map.
///
/// - Lines are split on `terminator`.
/// - A line starting with a space or tab is appended verbatim, whitespace
///   included, to the previous logical line.
/// - Each logical line is split at its first colon; the value keeps
///   everything after it untouched.
/// - The `From ` envelope line becomes [`ENVELOPE_FROM`] with the rest of the
///   line as its value.
/// - A line without a colon is stored under the empty name with the whole
///   line as its value.
/// - Repeated names collect into a list in order of appearance.
pub fn parse_headers(raw: &[u8], terminator: LineTerminator) -> Headers {
    let text = decode_header_bytes(raw);
    let mut headers = Headers::new();

    for line in unfold_lines(&text, terminator) {
        if line.is_empty() {
            continue;
        }
        let (name, value) = split_header_line(&line);
        headers.insert(name, value);
    }

    headers
}

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
fn decode_header_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Join continuation lines (starting with space or tab) onto the previous line.
fn unfold_lines(text: &str, terminator: LineTerminator) -> Vec<String> {
    let mut logical: Vec<String> = Vec::new();

    for line in text.split(terminator.as_str()) {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = logical.last_mut() {
                last.push_str(line);
                continue;
            }
            // A continuation with nothing to continue stands alone.
        }
        logical.push(line.to_string());
    }

    logical
}

/// Split one logical line into `(name, value)`.
fn split_header_line(line: &str) -> (&str, &str) {
    if let Some(envelope) = line.strip_prefix("From ") {
        return (ENVELOPE_FROM, envelope);
    }
    line.split_once(':').unwrap_or(("", line))
}
