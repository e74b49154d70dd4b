//! The service proxy: a local object whose calls forward to a remote
//! service, with responses routed back by request id.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, error, info};
use torrentd_wire::Value;

use crate::client::options::ProxyOptions;
use crate::client::pending::{CallHandlers, PendingTable};
use crate::client::transport::Transport;
use crate::error::RpcError;

/// System methods every proxy exposes alongside the introspected list.
const SYSTEM_METHODS: [&str; 2] = ["system.listMethods", "system.describe"];

/// A connected proxy for a remote RPC service.
///
/// Cloning is cheap; clones share the transport, method registry, and
/// pending-request table.
#[derive(Debug, Clone)]
pub struct ServiceProxy {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    transport: Transport,
    methods: BTreeSet<String>,
    pending: PendingTable,
    next_id: AtomicU64,
}

impl ServiceProxy {
    /// Connect to a service.
    ///
    /// When no method list was supplied, the remote service is introspected
    /// with `system.listMethods` and the registry populated from the reply.
    ///
    /// # Errors
    /// Option validation, transport, and introspection failures.
    pub async fn connect(options: ProxyOptions) -> Result<Self, RpcError> {
        options.validate()?;
        let transport = Transport::new(&options)?;

        let mut next_id = 1;
        let mut methods: BTreeSet<String> = match options.methods {
            Some(supplied) => supplied.into_iter().collect(),
            None => {
                let reply = transport.execute("system.listMethods", next_id, &[]).await;
                next_id += 1;
                method_list(reply.outcome?)?
            }
        };
        for method in SYSTEM_METHODS {
            methods.insert(method.to_string());
        }

        info!(
            url = %options.url,
            protocol = %options.protocol,
            methods = methods.len(),
            "Service proxy connected"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                transport,
                methods,
                pending: PendingTable::new(),
                next_id: AtomicU64::new(next_id),
            }),
        })
    }

    /// Call a method and wait for its result.
    ///
    /// # Errors
    /// Method validation, transport, wire, and server faults.
    pub async fn call(&self, method: &str, params: &[Value]) -> Result<Value, RpcError> {
        self.validate_method(method)?;
        let id = self.next_id();
        let reply = self.inner.transport.execute(method, id, params).await;
        debug!(method, id, ok = reply.outcome.is_ok(), "Call completed");
        reply.outcome
    }

    /// Call a method, returning immediately and routing the response to
    /// `handlers` on a background task.
    ///
    /// Returns the request id. Errors no handler claims are logged, since
    /// nothing awaits them.
    ///
    /// # Errors
    /// Validation failures are routed through `handlers` first; they are
    /// returned only when no exception handler claimed them.
    pub fn call_with(
        &self,
        method: &str,
        params: Vec<Value>,
        handlers: CallHandlers,
    ) -> Result<u64, RpcError> {
        let id = self.next_id();
        self.inner.pending.register(id, handlers);

        if let Err(invalid) = self.validate_method(method) {
            // Pre-request failure: route through the handlers immediately.
            return self.inner.pending.dispatch(id, Err(invalid)).map(|()| id);
        }

        let proxy = self.clone();
        let method = method.to_string();
        tokio::spawn(async move {
            let reply = proxy.inner.transport.execute(&method, id, &params).await;
            if let Err(uncaught) = proxy.inner.pending.dispatch(reply.id, reply.outcome) {
                error!(method = %method, id, error = %uncaught, "Uncaught call error");
            }
        });
        Ok(id)
    }

    /// A view of this proxy that prefixes every method with `name.`.
    #[must_use]
    pub fn namespace(&self, name: &str) -> Namespace<'_> {
        Namespace {
            proxy: self,
            prefix: name.to_string(),
        }
    }

    /// The sorted method registry.
    #[must_use]
    pub fn methods(&self) -> Vec<String> {
        self.inner.methods.iter().cloned().collect()
    }

    #[must_use]
    pub fn has_method(&self, method: &str) -> bool {
        self.inner.methods.contains(method)
    }

    /// Number of asynchronous calls currently in flight.
    #[must_use]
    pub fn pending_calls(&self) -> usize {
        self.inner.pending.len()
    }

    fn next_id(&self) -> u64 {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn validate_method(&self, method: &str) -> Result<(), RpcError> {
        if method.is_empty()
            || method.chars().any(char::is_whitespace)
            || method.split('.').any(|segment| segment.starts_with('_'))
        {
            return Err(RpcError::IllegalMethodName(method.to_string()));
        }
        if !self.inner.methods.contains(method) {
            return Err(RpcError::UnknownMethod(method.to_string()));
        }
        Ok(())
    }
}

/// A borrowed proxy view with a dotted method prefix, mirroring remote
/// namespaces like `core` and `daemon`.
#[derive(Debug, Clone)]
pub struct Namespace<'a> {
    proxy: &'a ServiceProxy,
    prefix: String,
}

impl Namespace<'_> {
    /// Call `prefix.method` and wait for its result.
    ///
    /// # Errors
    /// Same as [`ServiceProxy::call`].
    pub async fn call(&self, method: &str, params: &[Value]) -> Result<Value, RpcError> {
        self.proxy.call(&self.qualified(method), params).await
    }

    /// Asynchronous-mode call under this namespace.
    ///
    /// # Errors
    /// Same as [`ServiceProxy::call_with`].
    pub fn call_with(
        &self,
        method: &str,
        params: Vec<Value>,
        handlers: CallHandlers,
    ) -> Result<u64, RpcError> {
        self.proxy
            .call_with(&self.qualified(method), params, handlers)
    }

    /// A deeper namespace view (`core` → `core.filters`).
    #[must_use]
    pub fn namespace(&self, name: &str) -> Namespace<'_> {
        Namespace {
            proxy: self.proxy,
            prefix: self.qualified(name),
        }
    }

    #[must_use]
    pub fn has_method(&self, method: &str) -> bool {
        self.proxy.has_method(&self.qualified(method))
    }

    fn qualified(&self, method: &str) -> String {
        format!("{}.{}", self.prefix, method)
    }
}

fn method_list(value: Value) -> Result<BTreeSet<String>, RpcError> {
    let Value::Array(items) = value else {
        return Err(RpcError::Introspection);
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Str(name) => Ok(name),
            _ => Err(RpcError::Introspection),
        })
        .collect()
}
