//! Wire-level types and codecs for the torrent daemon RPC client.
//!
//! This crate holds everything that touches bytes on the wire and nothing
//! that touches sockets: the [`Value`] model shared by both protocols, the
//! JSON-RPC 1.1 codec, and the XML-RPC codec. Transport, correlation, and
//! retry-free request/response plumbing live in the client crate.

pub mod error;
pub mod json;
pub mod value;
pub mod xml;

pub use error::{Fault, WireError};
pub use value::{DateEncoding, Value};
