//! Document encoding: raw PDF bytes → base64 text for the conversion request.
//!
//! The conversion service expects bare standard-alphabet base64. Browser-style
//! read primitives hand back `data:application/pdf;base64,…` instead, so any
//! such header is stripped before the payload leaves this module.

use crate::error::PipelineError;
use crate::pipeline::input::{DocumentSource, InputDocument};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use tracing::debug;

/// Base64 text of one document, with no transport prefix.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedPayload(String);

impl EncodedPayload {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for EncodedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncodedPayload({} chars)", self.0.len())
    }
}

static RE_DATA_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^data:([^;,]*)(?:;[^;,]*)*;base64,(.*)$").unwrap());

/// Split a base64 data URL into `(media_type, payload)`.
///
/// Returns `None` when the string is not a base64 data URL.
pub fn split_data_url(input: &str) -> Option<(&str, &str)> {
    let caps = RE_DATA_URL.captures(input)?;
    let media_type = caps.get(1)?.as_str();
    let payload = caps.get(2)?.as_str();
    Some((media_type, payload))
}

/// Remove a leading `data:<mime>;base64,` header, if any.
pub fn strip_transport_prefix(input: &str) -> &str {
    split_data_url(input).map_or(input, |(_, payload)| payload)
}

/// Read the document and encode its bytes as base64.
///
/// Local files are read asynchronously; a read error is the only way this
/// fails for byte and path sources. Data URL sources are stripped and their
/// payload checked to decode cleanly.
pub async fn encode_document(doc: &InputDocument) -> Result<EncodedPayload, PipelineError> {
    let encoded = match doc.source() {
        DocumentSource::Bytes(bytes) => STANDARD.encode(bytes),
        DocumentSource::Path(path) => {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| PipelineError::EncodingFailed {
                    detail: format!("{}: {e}", path.display()),
                })?;
            STANDARD.encode(&bytes)
        }
        DocumentSource::DataUrl(url) => {
            let payload: String = strip_transport_prefix(url)
                .chars()
                .filter(|c| !c.is_ascii_whitespace())
                .collect();
            STANDARD
                .decode(&payload)
                .map_err(|e| PipelineError::EncodingFailed {
                    detail: format!("data URL payload is not valid base64: {e}"),
                })?;
            payload
        }
    };

    debug!("Encoded {} → {} chars base64", doc.name(), encoded.len());
    Ok(EncodedPayload(encoded))
}
