//! Typed facade over the daemon's `core`/`daemon` namespaces.
//!
//! Each helper is parameter marshalling plus one generic call; torrent
//! semantics live entirely in the daemon.

use std::collections::BTreeMap;

use torrentd_wire::Value;

use crate::client::{ProxyOptions, ServiceProxy};
use crate::error::RpcError;

/// Client for the torrent daemon's RPC surface.
#[derive(Debug, Clone)]
pub struct DaemonClient {
    proxy: ServiceProxy,
}

impl DaemonClient {
    #[must_use]
    pub const fn new(proxy: ServiceProxy) -> Self {
        Self { proxy }
    }

    /// Connect to the daemon.
    ///
    /// # Errors
    /// Same as [`ServiceProxy::connect`].
    pub async fn connect(options: ProxyOptions) -> Result<Self, RpcError> {
        Ok(Self::new(ServiceProxy::connect(options).await?))
    }

    /// The underlying generic proxy, for methods without a typed wrapper.
    #[must_use]
    pub const fn proxy(&self) -> &ServiceProxy {
        &self.proxy
    }

    /// Daemon version string.
    ///
    /// # Errors
    /// RPC failures, or a reply that is not a string.
    pub async fn daemon_version(&self) -> Result<String, RpcError> {
        expect_string(self.proxy.call("daemon.info", &[]).await?)
    }

    /// Ids of every torrent in the session.
    ///
    /// # Errors
    /// RPC failures, or a reply that is not a list of ids.
    pub async fn session_state(&self) -> Result<Vec<String>, RpcError> {
        expect_string_array(self.proxy.call("core.get_session_state", &[]).await?)
    }

    /// Status of one torrent, restricted to `keys` (all keys when empty).
    ///
    /// # Errors
    /// RPC failures.
    pub async fn torrent_status(&self, id: &str, keys: &[&str]) -> Result<Value, RpcError> {
        self.proxy
            .call(
                "core.get_torrent_status",
                &[Value::from(id), string_array(keys)],
            )
            .await
    }

    /// Status of every torrent matching `filter`, restricted to `keys`.
    ///
    /// # Errors
    /// RPC failures.
    pub async fn torrents_status(
        &self,
        filter: BTreeMap<String, Value>,
        keys: &[&str],
    ) -> Result<Value, RpcError> {
        self.proxy
            .call(
                "core.get_torrents_status",
                &[Value::Struct(filter), string_array(keys)],
            )
            .await
    }

    /// Add a torrent from a URL.
    ///
    /// # Errors
    /// RPC failures.
    pub async fn add_torrent_url(
        &self,
        url: &str,
        options: BTreeMap<String, Value>,
    ) -> Result<Value, RpcError> {
        self.proxy
            .call(
                "core.add_torrent_url",
                &[Value::from(url), Value::Struct(options)],
            )
            .await
    }

    /// Add a torrent from a magnet URI.
    ///
    /// # Errors
    /// RPC failures.
    pub async fn add_torrent_magnet(
        &self,
        uri: &str,
        options: BTreeMap<String, Value>,
    ) -> Result<Value, RpcError> {
        self.proxy
            .call(
                "core.add_torrent_magnet",
                &[Value::from(uri), Value::Struct(options)],
            )
            .await
    }

    /// Pause the given torrents.
    ///
    /// # Errors
    /// RPC failures.
    pub async fn pause_torrent(&self, ids: &[&str]) -> Result<(), RpcError> {
        self.proxy
            .call("core.pause_torrent", &[string_array(ids)])
            .await
            .map(drop)
    }

    /// Resume the given torrents.
    ///
    /// # Errors
    /// RPC failures.
    pub async fn resume_torrent(&self, ids: &[&str]) -> Result<(), RpcError> {
        self.proxy
            .call("core.resume_torrent", &[string_array(ids)])
            .await
            .map(drop)
    }

    /// Remove a torrent, optionally deleting its data.
    ///
    /// # Errors
    /// RPC failures, or a reply that is not a boolean.
    pub async fn remove_torrent(&self, id: &str, remove_data: bool) -> Result<bool, RpcError> {
        expect_bool(
            self.proxy
                .call(
                    "core.remove_torrent",
                    &[Value::from(id), Value::Bool(remove_data)],
                )
                .await?,
        )
    }

    /// The daemon's configuration map.
    ///
    /// # Errors
    /// RPC failures.
    pub async fn get_config(&self) -> Result<Value, RpcError> {
        self.proxy.call("core.get_config", &[]).await
    }

    /// Update daemon configuration keys.
    ///
    /// # Errors
    /// RPC failures.
    pub async fn set_config(&self, values: BTreeMap<String, Value>) -> Result<(), RpcError> {
        self.proxy
            .call("core.set_config", &[Value::Struct(values)])
            .await
            .map(drop)
    }
}

fn string_array(items: &[&str]) -> Value {
    Value::Array(items.iter().copied().map(Value::from).collect())
}

fn expect_string(value: Value) -> Result<String, RpcError> {
    match value {
        Value::Str(s) => Ok(s),
        _ => Err(RpcError::UnexpectedReply { expected: "string" }),
    }
}

fn expect_string_array(value: Value) -> Result<Vec<String>, RpcError> {
    let Value::Array(items) = value else {
        return Err(RpcError::UnexpectedReply {
            expected: "list of strings",
        });
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Str(s) => Ok(s),
            _ => Err(RpcError::UnexpectedReply {
                expected: "list of strings",
            }),
        })
        .collect()
}

fn expect_bool(value: Value) -> Result<bool, RpcError> {
    match value {
        Value::Bool(b) => Ok(b),
        _ => Err(RpcError::UnexpectedReply { expected: "boolean" }),
    }
}
