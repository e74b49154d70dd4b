//! RPC client: proxy construction, request correlation, and transport.

pub mod options;
pub mod pending;
pub mod proxy;
mod transport;

pub use options::{Protocol, ProxyOptions};
pub use pending::{CallHandlers, PendingTable};
pub use proxy::{Namespace, ServiceProxy};
