//! Integration tests for boundary scanning, header parsing and message reads.

mod common;

use common::{build_mbox, simple_messages, Msg};
use mboxseek::error::MboxError;
use mboxseek::index::indexer::{MessageIndexer, ScanEvent, ScanOptions};
use mboxseek::model::headers::HeaderValue;
use mboxseek::model::message::MessageDescriptor;
use mboxseek::model::terminator::LineTerminator;
use mboxseek::parser::header::parse_headers;
use mboxseek::store::block::ReadAt;
use mboxseek::store::reader::MessageReader;

const TERMINATORS: [LineTerminator; 2] = [LineTerminator::Lf, LineTerminator::CrLf];

fn options(block_size: usize) -> ScanOptions {
    ScanOptions {
        block_size,
        ..ScanOptions::default()
    }
}

fn index(data: &[u8], block_size: usize) -> Vec<MessageDescriptor> {
    MessageIndexer::new(data.to_vec(), &options(block_size))
        .unwrap()
        .index_all()
        .unwrap()
}

// ─── Declared Content-Length: N messages, exact positions ───────────

#[test]
fn test_declared_lengths_index_every_message() {
    for term in TERMINATORS {
        let (data, layout) = build_mbox(&simple_messages(7), term);
        for block_size in [16, 37, 64, 4096] {
            let entries = index(&data, block_size);
            assert_eq!(entries.len(), 7, "{term} block {block_size}");
            for (entry, expected) in entries.iter().zip(&layout) {
                assert_eq!(entry.position, expected.position, "{term} block {block_size}");
                assert_eq!(entry.header_length, expected.header_length);
                assert_eq!(entry.content_length, expected.body_length);
                assert!(entry.content_length_declared);
            }
            assert!(entries.windows(2).all(|w| w[1].position > w[0].position));
            assert!(entries
                .windows(2)
                .all(|w| w[1].position >= w[0].position + w[0].total_length));
        }
    }
}

#[test]
fn test_declared_total_length_uses_terminator_width() {
    for term in TERMINATORS {
        let (data, layout) = build_mbox(&simple_messages(2), term);
        let entries = index(&data, 64);
        let expected = layout[0].header_length + layout[0].body_length + 3 * term.len() as u64;
        assert_eq!(entries[0].total_length, expected, "{term}");
        assert_eq!(entries[1].end(), data.len() as u64, "{term}");
    }
}

#[test]
fn test_event_stream_reports_messages_then_end() {
    let (data, _) = build_mbox(&simple_messages(3), LineTerminator::Lf);
    let events: Vec<ScanEvent> = MessageIndexer::new(data, &options(32))
        .unwrap()
        .map(|e| e.unwrap())
        .collect();
    assert_eq!(events.len(), 4);
    assert!(events[..3]
        .iter()
        .all(|e| matches!(e, ScanEvent::Message(_))));
    assert_eq!(events[3], ScanEvent::End { messages: 3 });
}

// ─── Blank-line delimiter on a block boundary ───────────────────────

#[test]
fn test_delimiter_split_across_reads_lf() {
    // Header "From a\nX: 12345" is 15 bytes; "\n\n" occupies 15 and 16.
    let data = b"From a\nX: 12345\n\nbody\nFrom b\nX: 1\n\nmore\n";
    let entries = index(data, 16);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].header_length, 15);
    assert_eq!(entries[0].headers.first("X"), Some(" 12345"));
}

#[test]
fn test_delimiter_split_across_reads_crlf() {
    // "\r\n\r\n" occupies 14..18, so the two terminators land in different reads.
    let data = b"From a\r\nX: 123\r\n\r\nbody\r\nFrom b\r\nX: 1\r\n\r\nmore\r\n";
    let entries = index(data, 16);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].header_length, 14);
    assert!(data[entries[1].position as usize..].starts_with(b"From b"));
}

#[test]
fn test_delimiter_at_every_offset_around_boundary() {
    // Shift the header length across a block boundary one byte at a time.
    for pad in 0..20 {
        let value = "v".repeat(pad);
        let msgs = vec![
            Msg::new("a@x Mon Jan 01 00:00:00 2024", "one", "first body").header("X-Pad", &value),
            Msg::new("b@x Mon Jan 01 00:00:00 2024", "two", "second body"),
        ];
        let (data, layout) = build_mbox(&msgs, LineTerminator::Lf);
        let entries = index(&data, 16);
        assert_eq!(entries.len(), 2, "pad {pad}");
        assert_eq!(entries[0].header_length, layout[0].header_length, "pad {pad}");
        assert_eq!(entries[1].position, layout[1].position, "pad {pad}");
    }
}

// ─── Header parsing through the indexer ─────────────────────────────

#[test]
fn test_two_continuation_lines_fold_verbatim() {
    let msgs = vec![Msg::new("a@x Mon Jan 01 00:00:00 2024", "ignored", "body")
        .header("X-Folded", " first\n second\n\tthird")];
    for term in TERMINATORS {
        let (mut data, _) = build_mbox(&msgs, term);
        // build_mbox writes header values as given; fix up the inner
        // line breaks to the terminator under test.
        if term == LineTerminator::CrLf {
            data = String::from_utf8(data)
                .unwrap()
                .replace("first\n second\n\tthird", "first\r\n second\r\n\tthird")
                .into_bytes();
        }
        let entries = index(&data, 16);
        assert_eq!(
            entries[0].headers.first("X-Folded"),
            Some(" first second\tthird"),
            "{term}"
        );
    }
}

#[test]
fn test_repeated_header_collected_in_order() {
    let msgs = vec![Msg::new("a@x Mon Jan 01 00:00:00 2024", "s", "body")
        .header("Received", " from one")
        .header("X-Other", " o")
        .header("Received", " from two")
        .header("Received", " from three")];
    let (data, _) = build_mbox(&msgs, LineTerminator::Lf);
    let entries = index(&data, 32);
    assert_eq!(
        entries[0].headers.get("Received"),
        Some(&HeaderValue::Multiple(vec![
            " from one".to_string(),
            " from two".to_string(),
            " from three".to_string(),
        ]))
    );
    assert_eq!(
        entries[0].envelope_from(),
        Some("a@x Mon Jan 01 00:00:00 2024")
    );
    assert_eq!(entries[0].subject(), Some("s"));
}

// ─── Recovery when Content-Length is missing or malformed ───────────

#[test]
fn test_recovery_for_gaps_smaller_and_larger_than_a_block() {
    for term in TERMINATORS {
        for body_len in [10usize, 63, 64, 65, 500, 5000] {
            let body = "b".repeat(body_len);
            let msgs = vec![
                Msg::new("a@x Mon Jan 01 00:00:00 2024", "first", &body).undeclared(),
                Msg::new("b@x Mon Jan 01 00:00:00 2024", "second", "tail").undeclared(),
            ];
            let (data, layout) = build_mbox(&msgs, term);
            let entries = index(&data, 64);
            assert_eq!(entries.len(), 2, "{term} body {body_len}");

            let first = &entries[0];
            assert!(!first.content_length_declared);
            assert_eq!(first.position, 0);
            assert_eq!(first.header_length, layout[0].header_length);
            assert_eq!(entries[1].position, layout[1].position, "{term} body {body_len}");
            assert_eq!(
                first.content_length,
                layout[1].position - first.header_length,
                "{term} body {body_len}"
            );
            assert_eq!(first.end(), entries[1].position);

            // The last message runs to the end of the data.
            assert_eq!(entries[1].end(), data.len() as u64);
        }
    }
}

#[test]
fn test_malformed_content_length_falls_back_to_scan() {
    let data = b"From a\nContent-Length: lots\n\nbody\nFrom b\nContent-Length: 2\n\nhi\n";
    let entries = index(data, 16);
    assert_eq!(entries.len(), 2);
    assert!(!entries[0].content_length_declared);
    assert!(entries[1].content_length_declared);
    assert!(data[entries[1].position as usize..].starts_with(b"From b"));
}

#[test]
fn test_mixed_declared_and_recovered() {
    let msgs = vec![
        Msg::new("a@x Mon Jan 01 00:00:00 2024", "one", "declared body"),
        Msg::new("b@x Mon Jan 01 00:00:00 2024", "two", "scanned body\nwith lines").undeclared(),
        Msg::new("c@x Mon Jan 01 00:00:00 2024", "three", "declared again"),
    ];
    for term in TERMINATORS {
        let (data, layout) = build_mbox(&msgs, term);
        let entries = index(&data, 16);
        let positions: Vec<u64> = entries.iter().map(|e| e.position).collect();
        let expected: Vec<u64> = layout.iter().map(|l| l.position).collect();
        assert_eq!(positions, expected, "{term}");
    }
}

// ─── Folder internal data ───────────────────────────────────────────

fn internal_data_message() -> Msg {
    Msg {
        envelope: "MAILER-DAEMON Fri Jul  8 12:08:34 2011".to_string(),
        headers: vec![
            (
                "From".to_string(),
                " Mail System Internal Data <MAILER-DAEMON@mail.example.com>".to_string(),
            ),
            (
                "Subject".to_string(),
                " DON'T DELETE THIS MESSAGE -- FOLDER INTERNAL DATA".to_string(),
            ),
            ("X-IMAP".to_string(), " 1309000000 0000000002".to_string()),
        ],
        body: "This text is part of the internal format of your mail folder.".to_string(),
        declare_length: true,
    }
}

#[test]
fn test_internal_data_message_is_skipped() {
    let mut msgs = vec![internal_data_message()];
    msgs.extend(simple_messages(3));
    let (data, layout) = build_mbox(&msgs, LineTerminator::Lf);

    let events: Vec<ScanEvent> = MessageIndexer::new(data.clone(), &options(32))
        .unwrap()
        .map(|e| e.unwrap())
        .collect();
    assert_eq!(events[0], ScanEvent::SkippedInternalData { position: 0 });

    let entries = index(&data, 32);
    assert_eq!(entries.len(), 3);
    let positions: Vec<u64> = entries.iter().map(|e| e.position).collect();
    let expected: Vec<u64> = layout[1..].iter().map(|l| l.position).collect();
    assert_eq!(positions, expected);
    assert_eq!(entries[0].sequence, 0);
}

#[test]
fn test_internal_data_only_recognised_at_offset_zero() {
    let mut msgs = simple_messages(1);
    msgs.push(internal_data_message());
    let (data, _) = build_mbox(&msgs, LineTerminator::Lf);
    assert_eq!(index(&data, 32).len(), 2);
}

// ─── MessageReader ──────────────────────────────────────────────────

#[test]
fn test_reader_returns_exact_length() {
    for term in TERMINATORS {
        let (data, _) = build_mbox(&simple_messages(4), term);
        let entries = index(&data, 32);
        let reader = MessageReader::new(data.clone()).unwrap();
        for entry in &entries {
            let raw = reader.read_message(entry).unwrap();
            assert_eq!(raw.len() as u64, entry.header_length + entry.content_length);
            assert!(raw.starts_with(b"From "));
            let start = entry.position as usize;
            assert_eq!(raw, &data[start..start + raw.len()]);
        }
    }
}

#[test]
fn test_reader_on_truncated_source_is_short_read() {
    let (data, _) = build_mbox(&simple_messages(2), LineTerminator::Lf);
    let entries = index(&data, 32);
    let truncated = data[..data.len() - 20].to_vec();
    let reader = MessageReader::new(truncated).unwrap();

    assert!(reader.read_message(&entries[0]).is_ok());
    match reader.read_message(&entries[1]) {
        Err(MboxError::ShortRead {
            expected, actual, ..
        }) => assert!(actual < expected),
        other => panic!("expected ShortRead, got {other:?}"),
    }
}

#[test]
fn test_reread_headers_match_index() {
    for term in TERMINATORS {
        let mut msgs = simple_messages(3);
        msgs.push(
            Msg::new("z@x Mon Jan 01 00:00:00 2024", "last", "no length")
                .header("Received", " one")
                .header("Received", " two")
                .undeclared(),
        );
        let (data, _) = build_mbox(&msgs, term);
        let entries = index(&data, 16);
        let reader = MessageReader::new(data).unwrap();
        for entry in &entries {
            let raw = reader.read_message(entry).unwrap();
            let header_block = &raw[..entry.header_length as usize];
            assert_eq!(parse_headers(header_block, term), entry.headers, "{term}");
            assert_eq!(reader.read_headers(entry).unwrap(), header_block);
        }
    }
}

#[test]
fn test_concurrent_reads_share_one_source() {
    let (data, _) = build_mbox(&simple_messages(8), LineTerminator::Lf);
    let entries = index(&data, 64);
    let reader = MessageReader::new(data.clone()).unwrap();

    std::thread::scope(|s| {
        for entry in &entries {
            let reader = &reader;
            let data = &data;
            s.spawn(move || {
                let raw = reader.read_message(entry).unwrap();
                let start = entry.position as usize;
                assert_eq!(raw, &data[start..start + raw.len()]);
            });
        }
    });
}

// ─── Errors ─────────────────────────────────────────────────────────

#[test]
fn test_non_mbox_is_invalid_format() {
    let result = MessageIndexer::new(b"Received: by host\n\nbody\n".to_vec(), &options(16));
    assert!(matches!(result, Err(MboxError::InvalidFormat(_))));
}

#[test]
fn test_cancelled_scan_stops_with_error() {
    let (data, _) = build_mbox(&simple_messages(5), LineTerminator::Lf);
    let opts = options(16);
    let mut indexer = MessageIndexer::new(data, &opts).unwrap();
    assert!(matches!(indexer.next(), Some(Ok(ScanEvent::Message(_)))));
    opts.cancel.cancel();
    assert!(matches!(indexer.next(), Some(Err(MboxError::Cancelled))));
    assert!(indexer.next().is_none());
}

#[test]
fn test_reader_reused_after_scan() {
    let (data, _) = build_mbox(&simple_messages(3), LineTerminator::CrLf);
    let mut indexer = MessageIndexer::new(data.clone(), &options(64)).unwrap();
    assert_eq!(indexer.terminator(), LineTerminator::CrLf);

    let mut entries = Vec::new();
    for event in indexer.by_ref() {
        if let ScanEvent::Message(descriptor) = event.unwrap() {
            entries.push(descriptor);
        }
    }
    assert_eq!(indexer.cursor(), data.len() as u64);

    let reader = MessageReader::from_block_reader(indexer.into_reader());
    let entry = &entries[2];
    let raw = reader.read_message(entry).unwrap();
    let h = entry.header_length as usize;
    let blank = LineTerminator::CrLf.blank_line();

    // The read holds the header, the blank line and the body minus its
    // last blank-line's worth of bytes.
    assert_eq!(&raw[h..h + blank.len()], blank);
    let body_start = entry.position as usize + h + blank.len();
    let body_end = body_start + entry.content_length as usize;
    assert_eq!(&raw[h + blank.len()..], &data[body_start..body_end - blank.len()]);
    assert!(raw.ends_with(b">From escaped "));
}

// ─── Bogus Content-Length and failing sources ───────────────────────

#[test]
fn test_overflowing_content_length_is_short_read() {
    let data = b"From a\nContent-Length: 18446744073709551615\n\nbody\n".to_vec();
    let entries = index(&data, 4096);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].content_length, u64::MAX);
    assert_eq!(entries[0].total_length, u64::MAX);
    assert_eq!(entries[0].read_length(), None);

    let reader = MessageReader::new(data).unwrap();
    assert!(matches!(
        reader.read_message(&entries[0]),
        Err(MboxError::ShortRead { .. })
    ));
    assert_eq!(
        mboxseek::index::reader::total_bytes(&entries),
        u64::MAX
    );
}

#[test]
fn test_huge_content_length_does_not_allocate_it() {
    let data = b"From a\nContent-Length: 200000000000000\n\nbody\n".to_vec();
    let len = data.len() as u64;
    let entries = index(&data, 4096);
    assert_eq!(entries.len(), 1);

    let reader = MessageReader::new(data).unwrap();
    match reader.read_message(&entries[0]) {
        Err(MboxError::ShortRead {
            expected, actual, ..
        }) => {
            assert_eq!(expected, entries[0].header_length + 200_000_000_000_000);
            assert_eq!(actual, len);
        }
        other => panic!("expected ShortRead, got {other:?}"),
    }
}

/// Serves bytes below `fail_at` and errors for reads starting at or past it.
struct FailingSource {
    data: Vec<u8>,
    fail_at: u64,
}

impl ReadAt for FailingSource {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> std::io::Result<usize> {
        if offset >= self.fail_at {
            return Err(std::io::Error::other("device went away"));
        }
        self.data.read_at(offset, buf)
    }
}

#[test]
fn test_source_error_mid_scan_reaches_the_caller() {
    let (data, layout) = build_mbox(&simple_messages(3), LineTerminator::Lf);
    let source = FailingSource {
        fail_at: layout[1].position,
        data,
    };
    let mut indexer = MessageIndexer::new(source, &options(64)).unwrap();

    match indexer.next() {
        Some(Ok(ScanEvent::Message(first))) => assert_eq!(first.position, 0),
        other => panic!("expected first message, got {other:?}"),
    }
    assert!(matches!(indexer.next(), Some(Err(MboxError::Io { .. }))));
    assert!(indexer.next().is_none());
}
