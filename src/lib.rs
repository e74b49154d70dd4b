//! Client library for a torrent daemon's JSON/XML-RPC interface.
//!
//! The daemon does all the torrent work; this crate is the transport in
//! front of it: a [`ServiceProxy`] built by introspecting the remote method
//! list, awaitable calls, callback-driven calls correlated through an
//! id-keyed pending table, and a thin typed facade ([`DaemonClient`]) over
//! the daemon's `core`/`daemon` namespaces.
//!
//! # Example
//!
//! ```ignore
//! let proxy = ServiceProxy::connect(ProxyOptions::new("http://127.0.0.1:8112/json")).await?;
//! let state = proxy.call("core.get_session_state", &[]).await?;
//! ```

pub mod blocking;
pub mod client;
pub mod config;
pub mod daemon;
pub mod error;
pub mod telemetry;

pub use client::{CallHandlers, Namespace, Protocol, ProxyOptions, ServiceProxy};
pub use daemon::DaemonClient;
pub use error::RpcError;
pub use torrentd_wire::{DateEncoding, Fault, Value};
