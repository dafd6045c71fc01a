//! Blocking HTTP transport
//!
//! [`Transport`] is the seam between request handling and the wire. The
//! real implementation uses `reqwest`; tests substitute their own.

use std::error::Error as StdError;
use std::time::Duration;

use crate::error::{QueryError, Result};

/// Status and body of a completed HTTP exchange, whatever the status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait Transport {
    /// Issue a GET. Errors are reserved for connection-level failures
    /// ([`QueryError::Network`]); any HTTP status is returned as a response.
    fn get(&self, url: &str) -> Result<HttpResponse>;
}

/// One blocking request per call, no timeout and no retries
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(None::<Duration>)
            .build()
            .map_err(|e| QueryError::Network(error_chain(&e)))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<HttpResponse> {
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| QueryError::Network(error_chain(&e)))?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .map_err(|e| QueryError::Network(error_chain(&e)))?;
        Ok(HttpResponse { status, body })
    }
}

/// reqwest's top-level message rarely names the cause
fn error_chain(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
