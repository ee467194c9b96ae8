//! Blocking HTTP client used for liveness probes.

use std::error::Error as _;
use std::io;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use tracing::trace;
use url::Url;

use crate::domain::FailureKind;
use crate::infrastructure::traits::HttpClient;
use crate::infrastructure::{InfraError, InfraResult};

/// Settings baked into the underlying client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub max_redirects: usize,
    pub user_agent: String,
}

/// [`HttpClient`] backed by `reqwest`'s blocking client.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new(config: &HttpClientConfig) -> InfraResult<Self> {
        if config.timeout.is_zero() {
            return Err(InfraError::Http {
                message: "request timeout must be greater than zero".to_string(),
            });
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .redirect(Policy::limited(config.max_redirects))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| InfraError::Http {
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestHttpClient {
    fn fetch_status(&self, url: &Url) -> Result<u16, FailureKind> {
        // Body is never read; dropping the response releases the connection.
        match self.client.get(url.as_str()).send() {
            Ok(response) => Ok(response.status().as_u16()),
            Err(err) => {
                let kind = classify(&err);
                trace!(url = %url, error = %err, ?kind, "request failed");
                Err(kind)
            }
        }
    }
}

/// Map a transport error onto a failure kind.
fn classify(err: &reqwest::Error) -> FailureKind {
    if err.is_timeout() {
        return FailureKind::Timeout;
    }
    if err.is_redirect() {
        return FailureKind::TooManyRedirects;
    }
    if err.is_builder() {
        return FailureKind::MalformedUrl;
    }

    let mut cause = err.source();
    while let Some(current) = cause {
        if let Some(io_err) = current.downcast_ref::<io::Error>() {
            match io_err.kind() {
                io::ErrorKind::TimedOut => return FailureKind::Timeout,
                io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::UnexpectedEof => return FailureKind::ConnectionReset,
                _ => {}
            }
        }
        if is_dns_message(&current.to_string()) {
            return FailureKind::DnsFailure;
        }
        cause = current.source();
    }

    FailureKind::NetworkUnreachable
}

fn is_dns_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("dns error")
        || message.contains("failed to lookup address")
        || message.contains("name or service not known")
        || message.contains("nodename nor servname")
        || message.contains("no such host")
}
