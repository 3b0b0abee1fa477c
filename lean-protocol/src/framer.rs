//! Newline framing over raw byte chunks
//!
//! The server's stdout arrives in arbitrary chunks that may end in the middle
//! of a line or even in the middle of a multi-byte UTF-8 character. Framing
//! works on bytes only; text decoding happens once a whole line is available.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::Decoder;

use crate::codec::CodecError;

/// Maximum length of a single line (64 MB)
pub const MAX_LINE_LENGTH: usize = 64 * 1024 * 1024;

/// Splits a byte stream into newline-terminated lines
///
/// Used directly through [`Framer::push`], or as a [`Decoder`] underneath
/// `FramedRead` where the read buffer plays the role of the carry-over.
#[derive(Debug)]
pub struct Framer {
    carry: BytesMut,
    /// Bytes of the buffer already known not to contain a newline
    scanned: usize,
    max_line_length: usize,
}

impl Framer {
    pub fn new() -> Self {
        Self::with_max_line_length(MAX_LINE_LENGTH)
    }

    pub fn with_max_line_length(max_line_length: usize) -> Self {
        Self {
            carry: BytesMut::new(),
            scanned: 0,
            max_line_length,
        }
    }

    /// Feed one chunk and return every line it completes, in arrival order
    ///
    /// Returned lines do not include the terminating `\n`. Whatever follows
    /// the last newline is kept until the next call.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Bytes>, CodecError> {
        let mut carry = std::mem::take(&mut self.carry);
        carry.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let result = loop {
            match self.decode(&mut carry) {
                Ok(Some(line)) => lines.push(line),
                Ok(None) => break Ok(lines),
                Err(e) => break Err(e),
            }
        };
        self.carry = carry;
        result
    }

    /// Bytes received after the last complete line
    pub fn pending(&self) -> &[u8] {
        &self.carry
    }
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for Framer {
    type Item = Bytes;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let start = self.scanned.min(src.len());
        match src[start..].iter().position(|b| *b == b'\n') {
            Some(offset) => {
                let end = start + offset;
                let mut line = src.split_to(end + 1);
                line.truncate(end);
                self.scanned = 0;
                Ok(Some(line.freeze()))
            }
            None => {
                if src.len() > self.max_line_length {
                    return Err(CodecError::LineTooLong {
                        size: src.len(),
                        max: self.max_line_length,
                    });
                }
                self.scanned = src.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(line) => Ok(Some(line)),
            None => {
                if !src.is_empty() {
                    tracing::warn!(
                        bytes = src.len(),
                        "Discarding unterminated fragment at end of stream"
                    );
                    src.clear();
                }
                self.scanned = 0;
                Ok(None)
            }
        }
    }
}
