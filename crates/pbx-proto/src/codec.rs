//! Line-based codec for tokio.
//!
//! Decodes newline-terminated command lines (bare `\n` or `\r\n`) into
//! owned strings with the terminator stripped, and encodes [`Reply`] values
//! as `\n`-terminated lines.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{self, ProtocolError};
use crate::{Reply, MAX_LINE_LEN};

/// Newline-terminated line codec for the exchange protocol.
pub struct PbxCodec {
    /// Index of next byte to check for a newline.
    next_index: usize,
    /// Maximum line length in bytes, terminator included.
    max_len: usize,
}

impl PbxCodec {
    /// Create a codec with the protocol's default line limit.
    pub fn new() -> Self {
        Self::with_max_len(MAX_LINE_LEN)
    }

    /// Create a codec with a custom line limit.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
        }
    }
}

impl Default for PbxCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for PbxCodec {
    type Item = String;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> error::Result<Option<String>> {
        // Look for a newline starting from where the previous call stopped.
        if let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') {
            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            if line.len() > self.max_len {
                return Err(ProtocolError::LineTooLong(self.max_len));
            }

            let mut line = &line[..line.len() - 1];
            if line.ends_with(b"\r") {
                line = &line[..line.len() - 1];
            }
            Ok(Some(String::from_utf8_lossy(line).into_owned()))
        } else {
            // No complete line yet - remember where we stopped.
            self.next_index = src.len();

            if src.len() > self.max_len {
                return Err(ProtocolError::LineTooLong(self.max_len));
            }

            Ok(None)
        }
    }
}

impl Encoder<Reply> for PbxCodec {
    type Error = ProtocolError;

    fn encode(&mut self, reply: Reply, dst: &mut BytesMut) -> error::Result<()> {
        let line = reply.to_string();
        dst.reserve(line.len() + 1);
        dst.extend_from_slice(line.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}
