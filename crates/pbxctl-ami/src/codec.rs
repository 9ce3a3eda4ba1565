//! Wire framing for the manager protocol.
//!
//! On connect the switch sends one greeting line
//! (`Asterisk Call Manager/5.0.1`). After that every message is a block of
//! `Key: Value` lines terminated by an empty line. Lines inside a block that
//! are not headers (classic `Response: Follows` command output) are folded
//! into repeated `Output` fields, and the `--END COMMAND--` trailer is
//! dropped. Both CRLF and bare LF line endings are accepted.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::Error;
use crate::message::ManagerMessage;

/// Upper bound on a single buffered frame.
const MAX_FRAME_SIZE: usize = 1024 * 1024;

const END_COMMAND: &str = "--END COMMAND--";

/// A decoded unit from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Greeting(String),
    Message(ManagerMessage),
}

/// Codec for either side of a manager connection.
#[derive(Debug, Clone)]
pub struct AmiCodec {
    expect_greeting: bool,
}

impl AmiCodec {
    /// Client side: the first line on the wire is the greeting.
    pub fn client() -> Self {
        Self {
            expect_greeting: true,
        }
    }

    /// Switch side: no greeting is read, only action blocks.
    pub fn server() -> Self {
        Self {
            expect_greeting: false,
        }
    }
}

impl Default for AmiCodec {
    fn default() -> Self {
        Self::client()
    }
}

impl Decoder for AmiCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, Error> {
        if self.expect_greeting {
            let Some(newline) = src.iter().position(|b| *b == b'\n') else {
                return check_size(src).map(|()| None);
            };
            let line = src.split_to(newline + 1);
            self.expect_greeting = false;
            let greeting = String::from_utf8_lossy(&line).trim().to_owned();
            return Ok(Some(Frame::Greeting(greeting)));
        }

        skip_blank_lines(src);

        let Some((body_len, consumed)) = find_block_end(src) else {
            return check_size(src).map(|()| None);
        };

        let block = src.split_to(consumed);
        let message = parse_block(block.get(..body_len).unwrap_or_default());
        Ok(Some(Frame::Message(message)))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, Error> {
        match self.decode(buf)? {
            Some(frame) => Ok(Some(frame)),
            None => {
                if !buf.is_empty() {
                    tracing::debug!(
                        bytes = buf.len(),
                        "discarding partial frame at end of stream"
                    );
                }
                buf.clear();
                Ok(None)
            }
        }
    }
}

impl Encoder<ManagerMessage> for AmiCodec {
    type Error = Error;

    fn encode(&mut self, item: ManagerMessage, dst: &mut BytesMut) -> Result<(), Error> {
        let rendered = item.to_string();
        dst.reserve(rendered.len() + 2);
        dst.put_slice(rendered.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

// ── Parsing helpers ──────────────────────────────────────────────────

fn check_size(src: &BytesMut) -> Result<(), Error> {
    if src.len() > MAX_FRAME_SIZE {
        return Err(Error::Protocol(format!(
            "frame exceeds {MAX_FRAME_SIZE} bytes without a terminator"
        )));
    }
    Ok(())
}

fn skip_blank_lines(src: &mut BytesMut) {
    loop {
        if src.starts_with(b"\r\n") {
            src.advance(2);
        } else if src.starts_with(b"\n") {
            src.advance(1);
        } else {
            break;
        }
    }
}

/// Locate the empty line ending a block. Returns `(body_len, consumed)`.
///
/// Inside a `Response: Follows` block, empty lines belong to the command
/// output until the `--END COMMAND--` trailer.
fn find_block_end(src: &[u8]) -> Option<(usize, usize)> {
    let mut line_start = 0;
    let mut in_command_output = false;
    while let Some(offset) = src.get(line_start..)?.iter().position(|b| *b == b'\n') {
        let newline = line_start + offset;
        let line = src.get(line_start..newline)?;
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() && !in_command_output {
            return Some((line_start, newline + 1));
        }
        if line == END_COMMAND.as_bytes() {
            in_command_output = false;
        } else if line_start == 0 && is_follows_header(line) {
            in_command_output = true;
        }
        line_start = newline + 1;
    }
    None
}

fn is_follows_header(line: &[u8]) -> bool {
    let line = String::from_utf8_lossy(line);
    split_header(&line).is_some_and(|(key, value)| {
        key.eq_ignore_ascii_case("Response") && value.trim().eq_ignore_ascii_case("Follows")
    })
}

fn parse_block(body: &[u8]) -> ManagerMessage {
    let text = String::from_utf8_lossy(body);
    let mut message = ManagerMessage::new();
    for line in text.lines() {
        if line == END_COMMAND {
            continue;
        }
        match split_header(line) {
            Some((key, value)) => message.push(key, value),
            None => message.push("Output", line),
        }
    }
    message
}

fn split_header(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    Some((key, value.trim_start()))
}
