//! HTTP transport: one POST per request, decoded per the selected protocol.

use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use secrecy::ExposeSecret;
use tracing::{debug, instrument};
use torrentd_wire::{Value, json, xml};

use crate::client::options::{Protocol, ProxyOptions};
use crate::error::RpcError;

/// A decoded response, correlated to a request id.
#[derive(Debug)]
pub(crate) struct Reply {
    /// The id the response carried, or the request id when the wire cannot
    /// carry one (XML-RPC, or a JSON response that omitted it).
    pub id: u64,
    pub outcome: Result<Value, RpcError>,
}

#[derive(Debug, Clone)]
pub(crate) struct Transport {
    http: Client,
    url: String,
    protocol: Protocol,
    username: Option<String>,
    password: Option<secrecy::SecretString>,
    date_encoding: torrentd_wire::DateEncoding,
    decode_iso8601: bool,
}

impl Transport {
    pub(crate) fn new(options: &ProxyOptions) -> Result<Self, RpcError> {
        let http = Client::builder().timeout(options.timeout).build()?;
        Ok(Self {
            http,
            url: options.url.clone(),
            protocol: options.protocol,
            username: options.username.clone(),
            password: options.password.clone(),
            date_encoding: options.date_encoding,
            decode_iso8601: options.decode_iso8601,
        })
    }

    /// Send one request and decode the response.
    ///
    /// Transport and HTTP-status failures are reported under the request id,
    /// so the caller can route them like any other per-request outcome.
    #[instrument(skip(self, params))]
    pub(crate) async fn execute(&self, method: &str, id: u64, params: &[Value]) -> Reply {
        match self.execute_inner(method, id, params).await {
            Ok(reply) => reply,
            Err(error) => Reply {
                id,
                outcome: Err(error),
            },
        }
    }

    async fn execute_inner(
        &self,
        method: &str,
        id: u64,
        params: &[Value],
    ) -> Result<Reply, RpcError> {
        let (body, content_type) = match self.protocol {
            Protocol::JsonRpc => (
                json::encode_request(method, id, params, self.date_encoding)?,
                "application/json",
            ),
            Protocol::XmlRpc => (xml::encode_method_call(method, params), "text/xml"),
        };

        debug!(bytes = body.len(), "Sending request");

        let mut request = self
            .http
            .post(&self.url)
            .header(CONTENT_TYPE, content_type)
            .header(ACCEPT, content_type)
            .body(body);
        if let Some(username) = &self.username {
            request = request.basic_auth(
                username,
                self.password.as_ref().map(ExposeSecret::expose_secret),
            );
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Http {
                status: status.as_u16(),
            });
        }

        let text = response.text().await?;
        debug!(bytes = text.len(), "Received response");

        match self.protocol {
            Protocol::JsonRpc => {
                let decoded = json::decode_response(&text)?;
                let outcome = match decoded.outcome {
                    Ok(result) => {
                        let mut value = Value::from_json(result);
                        value.upgrade_dates(self.decode_iso8601);
                        Ok(value)
                    }
                    Err(fault) => Err(RpcError::Server(fault)),
                };
                Ok(Reply {
                    id: decoded.id.unwrap_or(id),
                    outcome,
                })
            }
            Protocol::XmlRpc => {
                // Dates arrive typed on this wire; no upgrade pass needed.
                let outcome = match xml::decode_method_response(&text)? {
                    Ok(value) => Ok(value),
                    Err(fault) => Err(RpcError::Server(fault)),
                };
                // XML-RPC cannot carry request ids.
                Ok(Reply { id, outcome })
            }
        }
    }
}
