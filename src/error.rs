//! Client error type.
//!
//! Every failure a call can produce funnels into [`RpcError`]: local option
//! and method-name validation, transport faults, malformed wire documents,
//! and errors the server itself reports.

use thiserror::Error;
use torrentd_wire::{Fault, WireError};

/// Errors produced by the RPC client.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("invalid proxy options: {0}")]
    InvalidOptions(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned HTTP {status}")]
    Http { status: u16 },

    #[error(transparent)]
    Wire(#[from] WireError),

    /// The server processed the request and reported a fault.
    #[error(transparent)]
    Server(#[from] Fault),

    #[error("unknown method: {0}")]
    UnknownMethod(String),

    #[error("illegal method name: {0:?}")]
    IllegalMethodName(String),

    /// A response carried an id with no pending request behind it.
    #[error("no pending request with id {0}")]
    UnknownRequestId(u64),

    #[error("introspection returned something other than a list of method names")]
    Introspection,

    #[error("unexpected reply shape: expected {expected}")]
    UnexpectedReply { expected: &'static str },

    /// A user callback panicked while handling a response.
    #[error("callback panicked: {0}")]
    Callback(String),

    /// Errors no exception handler claimed, aggregated per response.
    #[error("{} uncaught error(s): {}", .messages.len(), .messages.join("; "))]
    Uncaught {
        messages: Vec<String>,
        code: Option<i64>,
    },

    #[error("failed to start blocking runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

impl RpcError {
    /// The server-reported fault code, when this error carries one.
    #[must_use]
    pub fn fault_code(&self) -> Option<i64> {
        match self {
            Self::Server(fault) => Some(fault.code),
            Self::Uncaught { code, .. } => *code,
            _ => None,
        }
    }
}
