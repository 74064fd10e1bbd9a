//! TMI line codec for tokio.
//!
//! Decodes newline-terminated lines into [`IrcMessage`]s and encodes
//! outgoing command strings, appending CR/LF.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{self, ProtocolError};
use crate::message::IrcMessage;

/// Default maximum line length. Tagged TMI lines are far longer than the
/// classic 512 byte IRC limit.
pub const DEFAULT_MAX_LINE_LEN: usize = 16 * 1024;

/// Tokio codec for TMI connections.
pub struct TmiCodec {
    next_index: usize,
    max_len: usize,
}

impl Default for TmiCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl TmiCodec {
    /// Codec with [`DEFAULT_MAX_LINE_LEN`].
    pub fn new() -> Self {
        Self::with_max_len(DEFAULT_MAX_LINE_LEN)
    }

    /// Codec with a custom maximum line length.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
        }
    }

    /// Cut outgoing data at its first line ending.
    pub fn sanitize(mut data: String) -> String {
        if let Some(pos) = data.find(['\r', '\n']) {
            data.truncate(pos);
        }
        data
    }
}

impl Decoder for TmiCodec {
    type Item = IrcMessage;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> error::Result<Option<IrcMessage>> {
        loop {
            let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
                if src.len() > self.max_len {
                    let actual = src.len();
                    src.clear();
                    self.next_index = 0;
                    return Err(ProtocolError::LineTooLong {
                        actual,
                        limit: self.max_len,
                    });
                }
                self.next_index = src.len();
                return Ok(None);
            };

            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            let text = String::from_utf8_lossy(&line);
            let text = text.trim_end_matches(['\r', '\n']);
            if text.is_empty() {
                continue;
            }
            return IrcMessage::parse(text).map(Some);
        }
    }
}

impl Encoder<String> for TmiCodec {
    type Error = ProtocolError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> error::Result<()> {
        let line = Self::sanitize(line);
        dst.reserve(line.len() + 2);
        dst.put_slice(line.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}
