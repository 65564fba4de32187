//! Content-Encoding normalization.

use std::io::Read;

use flate2::read::GzDecoder;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE, HeaderMap, HeaderName};

use crate::error::DecodeError;

/// Buffer size handed to the brotli decompressor.
const BROTLI_BUFFER: usize = 4096;

/// A response body together with the headers that describe it.
#[derive(Debug, Clone, Default)]
pub struct ContentEnvelope {
    pub body: Vec<u8>,
    pub encoding: Option<String>,
    pub content_type: Option<String>,
}

impl ContentEnvelope {
    /// Builds an envelope, reading `Content-Encoding` and `Content-Type`
    /// from `headers`.
    pub fn from_headers(body: Vec<u8>, headers: &HeaderMap) -> Self {
        let header = |name: HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        Self {
            body,
            encoding: header(CONTENT_ENCODING),
            content_type: header(CONTENT_TYPE),
        }
    }

    /// Decodes the body according to the declared encoding.
    pub fn decode(self) -> Result<Vec<u8>, DecodeError> {
        decode(self.body, self.encoding.as_deref())
    }
}

/// Returns `body` with the given content-encoding removed.
///
/// `identity` and an absent header pass the bytes through. `gzip` and `br`
/// are decompressed. Any other value yields [`DecodeError::Unsupported`].
pub fn decode(body: Vec<u8>, encoding: Option<&str>) -> Result<Vec<u8>, DecodeError> {
    let encoding = encoding.map(|e| e.trim().to_ascii_lowercase());

    match encoding.as_deref() {
        None | Some("") | Some("identity") => Ok(body),
        Some("gzip") | Some("x-gzip") => read_all(GzDecoder::new(body.as_slice()))
            .map_err(|source| DecodeError::Malformed {
                encoding: "gzip",
                source,
            }),
        Some("br") => read_all(brotli::Decompressor::new(body.as_slice(), BROTLI_BUFFER))
            .map_err(|source| DecodeError::Malformed {
                encoding: "br",
                source,
            }),
        Some(other) => Err(DecodeError::Unsupported(other.to_string())),
    }
}

fn read_all(mut reader: impl Read) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    reader.read_to_end(&mut out)?;
    Ok(out)
}
