//! Quality database RPC calls: select, insert, update, delete
//!
//! Reads work against any QA endpoint with or without credentials. Writes
//! need a secure key for the user and a base URL on the MRO server; both are
//! checked locally and a call that fails either check is never sent.

use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

use crate::client::{RawResponse, ServiceClient, authorize_write};
use crate::constraint::Constraint;
use crate::credentials::{CredentialCache, Credentials, DEFAULT_USER};
use crate::error::{QueryError, Result};
use crate::request::{QueryBuilder, QueryRequest, SelectQuery};
use crate::shape::{ColumnSelection, ObsidAllowList, ResultShaper, ResultTable};
use crate::transport::{HttpTransport, Transport};

/// Decoded reply of a quality call
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QaResponse {
    /// Ordinal to message, as sent by the server
    #[serde(default)]
    pub errors: JsonValue,
    #[serde(default)]
    pub success: bool,
    /// SQL the server ran
    #[serde(default)]
    pub query: Option<String>,
    /// Select only
    #[serde(default)]
    pub rows: Option<Vec<JsonValue>>,
    /// Update and delete only
    #[serde(default)]
    pub rowcount: Option<i64>,
}

impl QaResponse {
    pub fn from_raw(raw: RawResponse) -> Result<Self> {
        let value = raw.into_json()?;
        serde_json::from_value(value)
            .map_err(|e| QueryError::MalformedResponse(format!("quality response: {e}")))
    }

    /// Error messages ordered by their ordinal
    pub fn error_messages(&self) -> Vec<String> {
        let mut entries: Vec<(i64, String)> = match &self.errors {
            JsonValue::Object(map) => map
                .iter()
                .map(|(k, v)| (k.parse().unwrap_or(i64::MAX), message_text(v)))
                .collect(),
            JsonValue::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (i as i64, message_text(v)))
                .collect(),
            JsonValue::Null => Vec::new(),
            other => vec![(0, message_text(other))],
        };
        entries.sort_by_key(|(ordinal, _)| *ordinal);
        entries.into_iter().map(|(_, msg)| msg).collect()
    }

    /// Turn `success == false` into [`QueryError::Rejected`]
    pub fn into_result(self) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(QueryError::Rejected {
                query: self.query.clone(),
                errors: self.error_messages(),
            })
        }
    }
}

fn message_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub struct QualityClient<'a, T = HttpTransport> {
    client: ServiceClient<T>,
    builder: QueryBuilder,
    credentials: &'a CredentialCache,
    user_name: String,
    secure_key: Option<String>,
}

impl<'a, T: Transport> QualityClient<'a, T> {
    pub fn new(client: ServiceClient<T>, credentials: &'a CredentialCache) -> Self {
        Self {
            client,
            builder: QueryBuilder::default(),
            credentials,
            user_name: DEFAULT_USER.to_string(),
            secure_key: None,
        }
    }

    pub fn with_builder(mut self, builder: QueryBuilder) -> Self {
        self.builder = builder;
        self
    }

    /// Act as `user_name`; without an explicit key the registry is consulted
    pub fn as_user(mut self, user_name: impl Into<String>, secure_key: Option<&str>) -> Self {
        self.user_name = user_name.into();
        self.secure_key = secure_key.map(str::to_string);
        self
    }

    pub fn service_client(&self) -> &ServiceClient<T> {
        &self.client
    }

    pub fn select(&self, select: &SelectQuery) -> Result<QaResponse> {
        if let Some(constraints) = &select.constraints {
            constraints.validate()?;
        }
        // A broken config file shouldn't stop reads
        let builder = match self.effective_builder() {
            Ok(builder) => builder,
            Err(e) => {
                warn!("Ignoring credential config for select: {}", e);
                self.builder.clone()
            }
        };
        let credentials = Credentials::new(&self.user_name, self.secure_key.as_deref());
        if let Some(constraints) = &select.constraints {
            debug!("SELECT WHERE {}", constraints);
        }
        let request = builder.select(select, &credentials);
        let response = self.send(&request)?;
        if let Some(rows) = &response.rows {
            info!("select returned {} rows", rows.len());
        }
        Ok(response)
    }

    /// Select and shape the rows into a table with `select.columns` as columns
    pub fn select_table(
        &self,
        select: &SelectQuery,
        allow_list: Option<ObsidAllowList>,
    ) -> Result<ResultTable> {
        let response = self.select(select)?.into_result()?;
        let mut shaper = ResultShaper::new(Some(select.limit));
        if let Some(allow_list) = allow_list {
            shaper = shaper.with_allow_list(allow_list);
        }
        let rows = response.rows.unwrap_or_default();
        shaper.shape_rows(&rows, &ColumnSelection::Explicit(select.columns.clone()))
    }

    /// Insert one row; the row must include `obsid`
    pub fn insert(&self, row: &Map<String, JsonValue>) -> Result<QaResponse> {
        if !row.contains_key("obsid") {
            return Err(QueryError::InvalidArgument(
                "inserted rows must include an obsid column".into(),
            ));
        }
        let (builder, credentials) = self.write_context()?;
        let request = builder.insert(row, &credentials);
        self.send_write(&request, &credentials)
    }

    pub fn update(
        &self,
        constraints: &Constraint,
        data: &Map<String, JsonValue>,
    ) -> Result<QaResponse> {
        constraints.validate()?;
        let (builder, credentials) = self.write_context()?;
        debug!("UPDATE WHERE {}", constraints);
        let request = builder.update(constraints, data, &credentials);
        self.send_write(&request, &credentials)
    }

    pub fn delete(&self, constraints: &Constraint) -> Result<QaResponse> {
        constraints.validate()?;
        let (builder, credentials) = self.write_context()?;
        debug!("DELETE WHERE {}", constraints);
        let request = builder.delete(constraints, &credentials);
        self.send_write(&request, &credentials)
    }

    fn effective_builder(&self) -> Result<QueryBuilder> {
        let registry = self.credentials.registry()?;
        Ok(match registry.base_url() {
            Some(url) => self.builder.clone().with_qa_base_url(url),
            None => self.builder.clone(),
        })
    }

    fn write_context(&self) -> Result<(QueryBuilder, Credentials)> {
        let builder = self.effective_builder()?;
        let credentials = self
            .credentials
            .resolve(&self.user_name, self.secure_key.as_deref())?;
        Ok((builder, credentials))
    }

    fn send_write(&self, request: &QueryRequest, credentials: &Credentials) -> Result<QaResponse> {
        authorize_write(request, credentials)?;
        let response = self.send(request)?;
        if let Some(count) = response.rowcount {
            let url = request.url();
            let endpoint = url.split('?').next().unwrap_or_default();
            info!("{endpoint} affected {count} rows");
        }
        Ok(response)
    }

    fn send(&self, request: &QueryRequest) -> Result<QaResponse> {
        QaResponse::from_raw(self.client.execute(request)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_messages_sorted_by_ordinal() {
        let resp: QaResponse = serde_json::from_value(json!({
            "errors": {"10": "third", "2": "second", "1": "first"},
            "success": false,
            "query": "SELECT 1"
        }))
        .unwrap();
        assert_eq!(resp.error_messages(), ["first", "second", "third"]);
        match resp.into_result().unwrap_err() {
            QueryError::Rejected { query, errors } => {
                assert_eq!(query.as_deref(), Some("SELECT 1"));
                assert_eq!(errors.len(), 3);
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn text_reply_is_malformed() {
        let err = QaResponse::from_raw(RawResponse::Text("Internal error".into())).unwrap_err();
        assert!(
            matches!(err, QueryError::MalformedResponse(ref m) if m.contains("Internal error"))
        );
    }

    #[test]
    fn update_reply_decodes_rowcount() {
        let resp = QaResponse::from_raw(RawResponse::Json(json!({
            "errors": {}, "success": true, "query": "UPDATE ...", "rowcount": 4
        })))
        .unwrap();
        assert_eq!(resp.rowcount, Some(4));
        assert!(resp.rows.is_none());
        assert!(resp.error_messages().is_empty());
    }
}
