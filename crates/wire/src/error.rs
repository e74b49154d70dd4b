//! Codec errors and the server-reported fault type.

use serde::Deserialize;
use thiserror::Error;

/// Error raised by a remote service and carried inside an otherwise
/// well-formed response.
///
/// JSON-RPC deserialization accepts the numeric code under either `code` or
/// `number` — the daemon's JSON API reports the latter. XML-RPC faults map
/// `faultCode`/`faultString` onto the same shape.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Error)]
#[error("server fault {code}: {message}")]
pub struct Fault {
    #[serde(default, alias = "number")]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

impl Fault {
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Errors produced while encoding or decoding wire documents.
///
/// Malformed input always maps to a variant here; the codecs never panic on
/// bad bytes.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("response is not an object")]
    NotAnObject,

    #[error("response carries neither result nor error")]
    MissingOutcome,

    #[error("malformed XML-RPC document: {0}")]
    MalformedXml(String),

    #[error("illegal element <{0}> in XML-RPC document")]
    IllegalElement(String),

    #[error("invalid {kind} value: {text:?}")]
    InvalidScalar { kind: &'static str, text: String },
}

impl WireError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedXml(message.into())
    }

    pub(crate) fn scalar(kind: &'static str, text: impl Into<String>) -> Self {
        Self::InvalidScalar {
            kind,
            text: text.into(),
        }
    }
}
