//! Synthetic MBOX builder shared by the integration tests.

#![allow(dead_code)]

use mboxseek::model::terminator::LineTerminator;

/// One message to lay out in a synthetic MBOX.
pub struct Msg {
    pub envelope: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub declare_length: bool,
}

impl Msg {
    pub fn new(envelope: &str, subject: &str, body: &str) -> Self {
        Self {
            envelope: envelope.to_string(),
            headers: vec![
                ("From".to_string(), format!(" {envelope}")),
                ("Subject".to_string(), format!(" {subject}")),
            ],
            body: body.to_string(),
            declare_length: true,
        }
    }

    pub fn undeclared(mut self) -> Self {
        self.declare_length = false;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// Where each message landed in the built file.
pub struct Layout {
    pub position: u64,
    pub header_length: u64,
    pub body_length: u64,
}

/// Lay out messages as `header block, blank line, body, terminator`.
///
/// Body lines use `\n` in the input and are converted to `term`.
pub fn build_mbox(msgs: &[Msg], term: LineTerminator) -> (Vec<u8>, Vec<Layout>) {
    let t = term.as_str();
    let mut data = Vec::new();
    let mut layout = Vec::new();

    for msg in msgs {
        let body = msg.body.replace('\n', t);
        let mut header = format!("From {}", msg.envelope);
        for (name, value) in &msg.headers {
            header.push_str(t);
            header.push_str(&format!("{name}:{value}"));
        }
        if msg.declare_length {
            header.push_str(t);
            header.push_str(&format!("Content-Length: {}", body.len()));
        }

        layout.push(Layout {
            position: data.len() as u64,
            header_length: header.len() as u64,
            body_length: body.len() as u64,
        });

        data.extend_from_slice(header.as_bytes());
        data.extend_from_slice(t.as_bytes());
        data.extend_from_slice(t.as_bytes());
        data.extend_from_slice(body.as_bytes());
        data.extend_from_slice(t.as_bytes());
    }

    (data, layout)
}

/// `count` ordinary messages with accurate `Content-Length` headers.
pub fn simple_messages(count: usize) -> Vec<Msg> {
    (0..count)
        .map(|i| {
            Msg::new(
                &format!("user{i}@example.com Thu Jan 04 10:00:0{} 2024", i % 10),
                &format!("Message number {i}"),
                &format!("Hello {i}.\nSecond line of body {i}.\n>From escaped line"),
            )
        })
        .collect()
}
