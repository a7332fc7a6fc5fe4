use super::{codec, Transport, Value};
use crate::error::{MoinError, Result};
use crate::model::{ServerConfig, DEFAULT_TIMEOUT};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("moin/", env!("CARGO_PKG_VERSION"));

/// XML-RPC over HTTP POST. One blocking request per call, no retries.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    endpoint: String,
    client: Client,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Self::with_options(endpoint, Duration::from_secs(u64::from(DEFAULT_TIMEOUT)), true)
    }

    pub fn with_options(
        endpoint: impl Into<String>,
        timeout: Duration,
        verify_ssl: bool,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!verify_ssl)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    /// Transport for a configured server: its endpoint, timeout and TLS policy.
    pub fn for_server(server: &ServerConfig) -> Result<Self> {
        Self::with_options(
            server.rpc_endpoint(),
            Duration::from_secs(u64::from(server.timeout)),
            server.verify_ssl,
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Transport for HttpTransport {
    fn call(&self, method: &str, params: &[Value]) -> Result<Value> {
        debug!(endpoint = %self.endpoint, method, params = params.len(), "xml-rpc call");

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "text/xml")
            .body(codec::encode_call(method, params))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(MoinError::Transport(format!(
                "{} failed with HTTP {}",
                method, status
            )));
        }

        let body = response.text()?;
        match codec::decode_response(&body)? {
            Ok(value) => {
                debug!(method, result = value.type_name(), "xml-rpc response");
                Ok(value)
            }
            Err(fault) => {
                debug!(method, code = fault.code, "xml-rpc fault");
                Err(fault.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn transport_for_server_uses_rpc_endpoint() {
        let server = ServerConfig::new("https://wiki.example.org", "u", "t").unwrap();
        let transport = HttpTransport::for_server(&server).unwrap();
        assert_eq!(
            transport.endpoint(),
            "https://wiki.example.org/?action=xmlrpc2"
        );
    }

    #[test]
    fn unreachable_endpoint_is_transport_failure() {
        // port 9 (discard) on localhost is closed on any sane test machine
        let transport =
            HttpTransport::with_options("http://127.0.0.1:9/?action=xmlrpc2", Duration::from_secs(2), true)
                .unwrap();
        let err = transport.call("getAllPages", &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportFailure);
    }
}
