//! Blocking facade over the async proxy.
//!
//! Mirrors the async API one-to-one by driving it on a private
//! current-thread runtime, for callers that are not async themselves.

use torrentd_wire::Value;

use crate::client::ProxyOptions;
use crate::error::RpcError;

/// A blocking service proxy.
///
/// Must not be created or used from within an async runtime — the inner
/// runtime will panic if nested.
#[derive(Debug)]
pub struct ServiceProxy {
    runtime: tokio::runtime::Runtime,
    inner: crate::client::ServiceProxy,
}

impl ServiceProxy {
    /// Connect to a service, blocking until introspection completes.
    ///
    /// # Errors
    /// Same as [`crate::ServiceProxy::connect`], plus runtime startup
    /// failures.
    pub fn connect(options: ProxyOptions) -> Result<Self, RpcError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let inner = runtime.block_on(crate::client::ServiceProxy::connect(options))?;
        Ok(Self { runtime, inner })
    }

    /// Call a method and block until the result arrives.
    ///
    /// # Errors
    /// Same as [`crate::ServiceProxy::call`].
    pub fn call(&self, method: &str, params: &[Value]) -> Result<Value, RpcError> {
        self.runtime.block_on(self.inner.call(method, params))
    }

    /// The sorted method registry.
    #[must_use]
    pub fn methods(&self) -> Vec<String> {
        self.inner.methods()
    }

    #[must_use]
    pub fn has_method(&self, method: &str) -> bool {
        self.inner.has_method(method)
    }
}
