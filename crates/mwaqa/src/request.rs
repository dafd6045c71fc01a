//! Request construction for both service shapes
//!
//! - Find-style: `{base}/metadata/find/?search=search&{params}[&dict]`
//! - RPC-style: `{base}/quality/{service}?{params}`
//!
//! Nothing in here touches the network; see [`crate::client`].

use indexmap::IndexMap;
use serde_json::{Map, Value as JsonValue};

use crate::constraint::Constraint;
use crate::credentials::Credentials;
use crate::params::{ParameterSet, encode_pairs};

pub const DEFAULT_FIND_BASE_URL: &str = "http://mro.mwa128t.org/";
pub const DEFAULT_QA_BASE_URL: &str = "http://mwa-metadata01.pawsey.org.au/";
pub const DEFAULT_SELECT_LIMIT: usize = 100;

const FIND_PATH: &str = "metadata/find/";
const QA_SERVICE_TYPE: &str = "quality";

/// Flag appended to find queries that ask for the extended column set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExtendedSuffix {
    /// `&dict`: rows come back as objects keyed by source column
    #[default]
    Dict,
    /// `&extended`
    Extended,
}

impl ExtendedSuffix {
    pub fn as_str(self) -> &'static str {
        match self {
            ExtendedSuffix::Dict => "dict",
            ExtendedSuffix::Extended => "extended",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QaService {
    Select,
    Insert,
    Update,
    Delete,
}

impl QaService {
    pub fn as_str(self) -> &'static str {
        match self {
            QaService::Select => "select",
            QaService::Insert => "insert",
            QaService::Update => "update",
            QaService::Delete => "delete",
        }
    }

    /// Mutating calls need credentials and a write endpoint
    pub fn is_write(self) -> bool {
        !matches!(self, QaService::Select)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Find,
    Quality(QaService),
}

/// A fully-formed GET request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub endpoint: Endpoint,
    pub base_url: String,
    /// Encoded query string, without the leading `?`
    pub query: String,
    pub extended: bool,
}

impl QueryRequest {
    pub fn url(&self) -> String {
        let path = match self.endpoint {
            Endpoint::Find => FIND_PATH.to_string(),
            Endpoint::Quality(service) => format!("{}/{}", QA_SERVICE_TYPE, service.as_str()),
        };
        format!("{}/{}?{}", self.base_url.trim_end_matches('/'), path, self.query)
    }
}

/// Options for a quality `select` call
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub constraints: Option<Constraint>,
    pub columns: Vec<String>,
    pub limit: usize,
    /// Sort by obsid descending; ascending when false
    pub desc: bool,
}

impl SelectQuery {
    pub fn new(columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            constraints: None,
            columns: columns.into_iter().map(Into::into).collect(),
            limit: DEFAULT_SELECT_LIMIT,
            desc: false,
        }
    }

    pub fn with_constraints(mut self, constraints: Constraint) -> Self {
        self.constraints = Some(constraints);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn descending(mut self, desc: bool) -> Self {
        self.desc = desc;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryBuilder {
    pub find_base_url: String,
    pub qa_base_url: String,
    pub extended_suffix: ExtendedSuffix,
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self {
            find_base_url: DEFAULT_FIND_BASE_URL.to_string(),
            qa_base_url: DEFAULT_QA_BASE_URL.to_string(),
            extended_suffix: ExtendedSuffix::default(),
        }
    }
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_find_base_url(mut self, url: impl Into<String>) -> Self {
        self.find_base_url = url.into();
        self
    }

    pub fn with_qa_base_url(mut self, url: impl Into<String>) -> Self {
        self.qa_base_url = url.into();
        self
    }

    pub fn with_extended_suffix(mut self, suffix: ExtendedSuffix) -> Self {
        self.extended_suffix = suffix;
        self
    }

    pub fn find(&self, params: &ParameterSet, extended: bool) -> QueryRequest {
        let mut query = String::from("search=search");
        let encoded = params.to_query_string();
        if !encoded.is_empty() {
            query.push('&');
            query.push_str(&encoded);
        }
        if extended {
            query.push('&');
            query.push_str(self.extended_suffix.as_str());
        }
        QueryRequest {
            endpoint: Endpoint::Find,
            base_url: self.find_base_url.clone(),
            query,
            extended,
        }
    }

    pub fn select(&self, select: &SelectQuery, credentials: &Credentials) -> QueryRequest {
        let mut params = IndexMap::new();
        params.insert("constraints", constraints_json(select.constraints.as_ref()));
        params.insert(
            "column_list",
            JsonValue::from(select.columns.clone()).to_string(),
        );
        params.insert("limit", select.limit.to_string());
        insert_credentials(&mut params, credentials);
        if select.desc {
            params.insert("desc", "1".to_string());
        }
        self.quality(QaService::Select, &params)
    }

    pub fn insert(&self, row: &Map<String, JsonValue>, credentials: &Credentials) -> QueryRequest {
        let mut params = IndexMap::new();
        params.insert("row", JsonValue::Object(row.clone()).to_string());
        insert_credentials(&mut params, credentials);
        self.quality(QaService::Insert, &params)
    }

    pub fn update(
        &self,
        constraints: &Constraint,
        data: &Map<String, JsonValue>,
        credentials: &Credentials,
    ) -> QueryRequest {
        let mut params = IndexMap::new();
        params.insert("constraints", constraints_json(Some(constraints)));
        params.insert("data", JsonValue::Object(data.clone()).to_string());
        insert_credentials(&mut params, credentials);
        self.quality(QaService::Update, &params)
    }

    pub fn delete(&self, constraints: &Constraint, credentials: &Credentials) -> QueryRequest {
        let mut params = IndexMap::new();
        params.insert("constraints", constraints_json(Some(constraints)));
        insert_credentials(&mut params, credentials);
        self.quality(QaService::Delete, &params)
    }

    fn quality(&self, service: QaService, params: &IndexMap<&'static str, String>) -> QueryRequest {
        QueryRequest {
            endpoint: Endpoint::Quality(service),
            base_url: self.qa_base_url.clone(),
            query: encode_pairs(params.iter().map(|(k, v)| (*k, v.as_str()))),
            extended: false,
        }
    }
}

fn constraints_json(constraints: Option<&Constraint>) -> String {
    constraints
        .map(Constraint::to_json)
        .unwrap_or(JsonValue::Null)
        .to_string()
}

fn insert_credentials(params: &mut IndexMap<&'static str, String>, credentials: &Credentials) {
    params.insert("user_name", credentials.user_name.clone());
    params.insert(
        "secure_key",
        credentials.secure_key.clone().unwrap_or_default(),
    );
}
