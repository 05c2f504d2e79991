//! Tokio codec for newline-delimited protocol frames
//!
//! The command channel is framed by newline termination: bytes accumulate in
//! the read buffer until a `\n` appears, at which point exactly one line is
//! split off and handed up, with any remainder left buffered. This makes the
//! protocol robust to TCP fragmentation (one message split across reads) and
//! coalescing (several messages arriving in one read). Empty lines are
//! swallowed by the decoder.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;
use crate::message::{CommandMessage, ResponseMessage};

/// Upper bound on a single unterminated line before the connection is
/// considered hostile or broken.
pub const MAX_LINE_BYTES: usize = 256 * 1024;

/// Codec splitting the byte stream into text lines and encoding outgoing
/// messages as JSON lines.
///
/// The decoder yields raw lines rather than decoded messages so that a line
/// which fails JSON decoding can be answered with an error frame instead of
/// poisoning the stream.
#[derive(Debug, Default)]
pub struct LineCodec;

impl LineCodec {
    /// Create a new codec
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(pos) = src.iter().position(|&b| b == b'\n') else {
                if src.len() > MAX_LINE_BYTES {
                    return Err(ProtocolError::LineTooLong {
                        len: src.len(),
                        max: MAX_LINE_BYTES,
                    });
                }
                // Need more data
                return Ok(None);
            };

            let raw = src.split_to(pos + 1);
            let mut line = &raw[..pos];
            if line.ends_with(b"\r") {
                line = &line[..line.len() - 1];
            }

            if line.is_empty() {
                continue;
            }

            return Ok(Some(String::from_utf8_lossy(line).into_owned()));
        }
    }
}

impl Encoder<ResponseMessage> for LineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: ResponseMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json = serde_json::to_vec(&frame)?;
        dst.reserve(json.len() + 1);
        dst.extend_from_slice(&json);
        dst.put_u8(b'\n');
        Ok(())
    }
}

impl Encoder<CommandMessage> for LineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: CommandMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json = serde_json::to_vec(&frame)?;
        dst.reserve(json.len() + 1);
        dst.extend_from_slice(&json);
        dst.put_u8(b'\n');
        Ok(())
    }
}
