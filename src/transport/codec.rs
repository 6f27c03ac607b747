//! Line framing for IRC streams.

use std::io;

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::error::ClientError;

/// Longest inbound line accepted: a full tag section plus a 512-byte body.
pub const MAX_INBOUND_LINE_LEN: usize = 8191 + 512;

/// Splits inbound bytes on `\n` and terminates outbound lines with CRLF.
///
/// Oversized lines are dropped whole with a warning rather than failing the
/// stream.
#[derive(Clone, Debug)]
pub struct LineCodec {
    charset: Charset,
    next_index: usize,
    discarding: bool,
}

impl LineCodec {
    /// A codec for the named character encoding.
    pub fn new(label: &str) -> Result<Self, ClientError> {
        let charset = Charset::for_label(label)
            .ok_or_else(|| ClientError::UnsupportedEncoding(label.to_string()))?;
        Ok(Self {
            charset,
            next_index: 0,
            discarding: false,
        })
    }
}

#[cfg(feature = "encoding")]
#[derive(Clone, Copy, Debug)]
struct Charset(&'static encoding::Encoding);

#[cfg(feature = "encoding")]
impl Charset {
    fn for_label(label: &str) -> Option<Self> {
        encoding::Encoding::for_label(label.as_bytes()).map(Charset)
    }

    fn decode(self, bytes: &[u8]) -> String {
        self.0.decode_without_bom_handling(bytes).0.into_owned()
    }

    fn encode(self, line: &str, dst: &mut BytesMut) {
        let (bytes, _, _) = self.0.encode(line);
        dst.put_slice(&bytes);
    }
}

/// UTF-8 only; invalid input is decoded lossily.
#[cfg(not(feature = "encoding"))]
#[derive(Clone, Copy, Debug)]
struct Charset;

#[cfg(not(feature = "encoding"))]
impl Charset {
    fn for_label(label: &str) -> Option<Self> {
        matches!(label.to_ascii_lowercase().as_str(), "utf-8" | "utf8").then_some(Charset)
    }

    fn decode(self, bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }

    fn encode(self, line: &str, dst: &mut BytesMut) {
        dst.put_slice(line.as_bytes());
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, io::Error> {
        loop {
            let newline = src[self.next_index..].iter().position(|b| *b == b'\n');

            match newline {
                Some(offset) => {
                    let end = self.next_index + offset;
                    self.next_index = 0;
                    let mut line = src.split_to(end + 1);

                    if self.discarding {
                        self.discarding = false;
                        continue;
                    }

                    line.truncate(end);
                    if line.last() == Some(&b'\r') {
                        line.truncate(end - 1);
                    }
                    return Ok(Some(self.charset.decode(&line)));
                }
                None if src.len() > MAX_INBOUND_LINE_LEN => {
                    if !self.discarding {
                        warn!(len = src.len(), "dropping oversized inbound line");
                    }
                    self.discarding = true;
                    self.next_index = 0;
                    src.advance(src.len());
                    return Ok(None);
                }
                None => {
                    self.next_index = src.len();
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, io::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        self.next_index = 0;
        if src.is_empty() || self.discarding {
            src.clear();
            return Ok(None);
        }
        let rest = src.split();
        let rest = rest.strip_suffix(b"\r").unwrap_or(&rest[..]);
        Ok(Some(self.charset.decode(rest)))
    }
}

impl Encoder<String> for LineCodec {
    type Error = io::Error;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), io::Error> {
        dst.reserve(line.len() + 2);
        self.charset.encode(&line, dst);
        dst.put_slice(b"\r\n");
        Ok(())
    }
}
