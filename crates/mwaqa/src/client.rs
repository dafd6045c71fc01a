//! Request execution and outcome classification

use log::debug;
use serde_json::Value as JsonValue;

use crate::credentials::Credentials;
use crate::error::{QueryError, Result};
use crate::request::{Endpoint, QueryRequest};
use crate::transport::{HttpTransport, Transport};

/// Only base URLs whose host contains this accept writes
pub const WRITE_ENDPOINT_MARKER: &str = "mro";

/// Decoded body of a successful call
#[derive(Debug, Clone, PartialEq)]
pub enum RawResponse {
    Json(JsonValue),
    /// Body that isn't JSON; some server errors come back as plain text
    Text(String),
}

impl RawResponse {
    pub fn into_json(self) -> Result<JsonValue> {
        match self {
            RawResponse::Json(value) => Ok(value),
            RawResponse::Text(text) => Err(QueryError::MalformedResponse(format!(
                "expected JSON, got: {}",
                text.trim()
            ))),
        }
    }
}

pub struct ServiceClient<T = HttpTransport> {
    transport: T,
}

impl ServiceClient<HttpTransport> {
    pub fn http() -> Result<Self> {
        Ok(Self::new(HttpTransport::new()?))
    }
}

impl<T: Transport> ServiceClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn execute(&self, request: &QueryRequest) -> Result<RawResponse> {
        let url = request.url();
        debug!("GET {}", url);

        let resp = self.transport.get(&url)?;
        if !resp.is_success() {
            return Err(QueryError::Server {
                status: resp.status,
                body: (!resp.body.is_empty()).then_some(resp.body),
            });
        }

        match serde_json::from_str(&resp.body) {
            Ok(value) => Ok(RawResponse::Json(value)),
            Err(e) => {
                debug!("Response is not JSON ({}), returning text", e);
                Ok(RawResponse::Text(resp.body))
            }
        }
    }
}

/// Local check for a write call: credentials must carry a key and the base
/// URL must be the authoritative write endpoint
pub fn authorize_write(request: &QueryRequest, credentials: &Credentials) -> Result<()> {
    let service = match request.endpoint {
        Endpoint::Quality(service) if service.is_write() => service,
        _ => return Ok(()),
    };
    let op = service.as_str().to_uppercase();

    if !is_write_endpoint(&request.base_url) {
        return Err(QueryError::Permission(format!(
            "{} calls won't work unless the base URL is set to the MRO server (got {})",
            op, request.base_url
        )));
    }
    if !credentials.has_key() {
        return Err(QueryError::Permission(format!(
            "{} calls won't work without a valid user_name and secure_key for '{}', \
             check the config file.",
            op, credentials.user_name
        )));
    }
    Ok(())
}

fn is_write_endpoint(base_url: &str) -> bool {
    let host = base_url
        .split_once("://")
        .map_or(base_url, |(_, rest)| rest)
        .split(['/', ':'])
        .next()
        .unwrap_or_default();
    host.contains(WRITE_ENDPOINT_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::col;
    use crate::request::QueryBuilder;
    use crate::transport::HttpResponse;
    use std::cell::RefCell;

    struct Canned {
        response: HttpResponse,
        urls: RefCell<Vec<String>>,
    }

    impl Canned {
        fn new(status: u16, body: &str) -> Self {
            Self {
                response: HttpResponse {
                    status,
                    body: body.to_string(),
                },
                urls: RefCell::new(Vec::new()),
            }
        }
    }

    impl Transport for Canned {
        fn get(&self, url: &str) -> Result<HttpResponse> {
            self.urls.borrow_mut().push(url.to_string());
            Ok(self.response.clone())
        }
    }

    fn find_request() -> QueryRequest {
        QueryBuilder::new().find(&Default::default(), false)
    }

    #[test]
    fn decodes_json_body() {
        let client = ServiceClient::new(Canned::new(200, "[[1, \"a\"]]"));
        let raw = client.execute(&find_request()).unwrap();
        assert_eq!(raw, RawResponse::Json(serde_json::json!([[1, "a"]])));
        assert_eq!(
            client.transport().urls.borrow().as_slice(),
            ["http://mro.mwa128t.org/metadata/find/?search=search&pagesize=10"]
        );
    }

    #[test]
    fn plain_text_passes_through() {
        let client = ServiceClient::new(Canned::new(200, "Error: bad obsid"));
        let raw = client.execute(&find_request()).unwrap();
        assert_eq!(raw, RawResponse::Text("Error: bad obsid".into()));
        assert!(raw.into_json().is_err());
    }

    #[test]
    fn non_success_status_is_server_error() {
        let client = ServiceClient::new(Canned::new(503, "down"));
        match client.execute(&find_request()).unwrap_err() {
            QueryError::Server { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body.as_deref(), Some("down"));
            }
            other => panic!("expected server error, got {other:?}"),
        }

        let client = ServiceClient::new(Canned::new(404, ""));
        assert!(matches!(
            client.execute(&find_request()),
            Err(QueryError::Server { status: 404, body: None })
        ));
    }

    #[test]
    fn write_authorization() {
        let with_key = Credentials::new("quality", Some("k"));
        let without_key = Credentials::new("quality", Some(""));
        let read_only = QueryBuilder::new();
        let writable = QueryBuilder::new().with_qa_base_url("http://mro.mwa128t.org/");
        let c = col("obsid").eq(1);

        let req = read_only.delete(&c, &with_key);
        assert!(matches!(authorize_write(&req, &with_key), Err(QueryError::Permission(_))));

        let req = writable.delete(&c, &without_key);
        assert!(matches!(authorize_write(&req, &without_key), Err(QueryError::Permission(_))));

        let req = writable.delete(&c, &with_key);
        assert!(authorize_write(&req, &with_key).is_ok());

        // select never needs credentials
        let req = read_only.select(&crate::request::SelectQuery::new(["obsid"]), &without_key);
        assert!(authorize_write(&req, &without_key).is_ok());
    }

    #[test]
    fn marker_must_be_in_host() {
        assert!(is_write_endpoint("http://mro.mwa128t.org/"));
        assert!(is_write_endpoint("mro.local:8000"));
        assert!(!is_write_endpoint("http://mwa-metadata01.pawsey.org.au/mro/"));
    }
}
