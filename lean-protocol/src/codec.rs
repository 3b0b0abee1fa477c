//! Line-delimited JSON codec for the server's stdin/stdout

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::framer::Framer;
use crate::messages::{parse_response, Request, Response};

/// A line that does not match any known message shape
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("Missing 'response' field")]
    MissingResponse,

    #[error("Unrecognized response kind: {0}")]
    UnknownResponse(String),

    #[error("Missing field '{field}' in '{response}' response")]
    MissingField {
        response: &'static str,
        field: &'static str,
    },

    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Malformed '{shape}' payload: {source}")]
    Shape {
        shape: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Protocol codec error
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Serialization error: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Line too long: {size} bytes (max {max})")]
    LineTooLong { size: usize, max: usize },
}

/// Codec for [`Request`] (encoding) and [`Response`] (decoding)
/// Used by the client side
#[derive(Debug, Default)]
pub struct ClientCodec {
    framer: Framer,
}

impl ClientCodec {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_next(
        &mut self,
        src: &mut BytesMut,
        eof: bool,
    ) -> Result<Option<Response>, CodecError> {
        loop {
            let line = if eof {
                self.framer.decode_eof(src)?
            } else {
                self.framer.decode(src)?
            };
            let Some(line) = line else {
                return Ok(None);
            };
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            tracing::trace!(line = %String::from_utf8_lossy(&line), "Received line");
            return Ok(Some(parse_response(&line)?));
        }
    }
}

impl Decoder for ClientCodec {
    type Item = Response;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.parse_next(src, false)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.parse_next(src, true)
    }
}

impl Encoder<Request> for ClientCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Request, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let line = item.to_json().map_err(CodecError::Encode)?;
        tracing::trace!(line = %line, "Sending line");
        dst.reserve(line.len() + 1);
        dst.put_slice(line.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}

/// Codec for raw JSON replies (encoding) and [`Request`] (decoding)
/// Used by stand-in servers
#[derive(Debug, Default)]
pub struct ServerCodec {
    framer: Framer,
}

impl ServerCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for ServerCodec {
    type Item = Request;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.framer.decode(src)? {
            Some(line) => Ok(Some(Request::from_json(&line)?)),
            None => Ok(None),
        }
    }
}

impl Encoder<serde_json::Value> for ServerCodec {
    type Error = CodecError;

    fn encode(&mut self, item: serde_json::Value, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let line = serde_json::to_string(&item).map_err(CodecError::Encode)?;
        dst.reserve(line.len() + 1);
        dst.put_slice(line.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}
