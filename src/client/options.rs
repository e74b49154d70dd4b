//! Proxy construction options.

use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use torrentd_wire::DateEncoding;

use crate::error::RpcError;

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Wire protocol selection. JSON-RPC is the default; XML-RPC is kept for
/// daemons that still speak it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    #[default]
    JsonRpc,
    XmlRpc,
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json-rpc" | "json" => Ok(Self::JsonRpc),
            "xml-rpc" | "xml" => Ok(Self::XmlRpc),
            other => Err(format!("unknown protocol {other:?}")),
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::JsonRpc => "JSON-RPC",
            Self::XmlRpc => "XML-RPC",
        })
    }
}

/// Options for [`ServiceProxy::connect`](crate::ServiceProxy::connect).
#[derive(Debug, Clone)]
pub struct ProxyOptions {
    pub url: String,
    pub protocol: Protocol,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    /// Pre-supplied method list; skips `system.listMethods` introspection.
    pub methods: Option<Vec<String>>,
    pub timeout: Duration,
    pub date_encoding: DateEncoding,
    /// Recognize plain ISO8601 strings in responses as datetimes.
    pub decode_iso8601: bool,
}

impl ProxyOptions {
    /// Options for a service at `url` with everything else defaulted.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            protocol: Protocol::default(),
            username: None,
            password: None,
            methods: None,
            timeout: DEFAULT_TIMEOUT,
            date_encoding: DateEncoding::default(),
            decode_iso8601: true,
        }
    }

    #[must_use]
    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// HTTP Basic credentials sent with every request.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: SecretString) -> Self {
        self.username = Some(username.into());
        self.password = Some(password);
        self
    }

    /// Supply the method list up front instead of introspecting.
    #[must_use]
    pub fn methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods = Some(methods.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn date_encoding(mut self, encoding: DateEncoding) -> Self {
        self.date_encoding = encoding;
        self
    }

    #[must_use]
    pub fn decode_iso8601(mut self, decode: bool) -> Self {
        self.decode_iso8601 = decode;
        self
    }

    /// Validate the options.
    ///
    /// # Errors
    /// Returns [`RpcError::InvalidOptions`] for an empty or non-HTTP URL, a
    /// zero timeout, or an explicitly empty method list.
    pub fn validate(&self) -> Result<(), RpcError> {
        if self.url.trim().is_empty() {
            return Err(RpcError::InvalidOptions("service URL is empty".into()));
        }
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(RpcError::InvalidOptions(format!(
                "service URL must be http(s): {}",
                self.url
            )));
        }
        if self.timeout.is_zero() {
            return Err(RpcError::InvalidOptions("timeout must be > 0".into()));
        }
        if self.methods.as_ref().is_some_and(Vec::is_empty) {
            return Err(RpcError::InvalidOptions(
                "supplied method list is empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(ProxyOptions::new("http://127.0.0.1:8112/json").validate().is_ok());
    }

    #[test]
    fn rejects_empty_url() {
        assert!(matches!(
            ProxyOptions::new("  ").validate(),
            Err(RpcError::InvalidOptions(_))
        ));
    }

    #[test]
    fn rejects_non_http_url() {
        assert!(ProxyOptions::new("ftp://host/json").validate().is_err());
    }

    #[test]
    fn rejects_zero_timeout() {
        let options = ProxyOptions::new("http://host/json").timeout(Duration::ZERO);
        assert!(options.validate().is_err());
    }

    #[test]
    fn rejects_empty_method_list() {
        let options = ProxyOptions::new("http://host/json").methods(Vec::<String>::new());
        assert!(options.validate().is_err());
    }

    #[test]
    fn protocol_parses() {
        assert_eq!("json-rpc".parse::<Protocol>().unwrap(), Protocol::JsonRpc);
        assert_eq!("XML".parse::<Protocol>().unwrap(), Protocol::XmlRpc);
        assert!("gopher".parse::<Protocol>().is_err());
    }
}
