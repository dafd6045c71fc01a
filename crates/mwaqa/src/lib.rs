//! mwaqa - client for the MWA observation metadata and quality services
//!
//! Two services sit behind plain HTTP GETs:
//!
//! - the metadata **find** service, searched with a flat set of filter
//!   parameters, and
//! - the **quality** (QA) database, driven through `select`, `insert`,
//!   `update` and `delete` calls whose filters are [`Constraint`] trees.
//!
//! Results are shaped into polars `DataFrame`s with fixed, named columns.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mwaqa::{MetadataClient, MetadataQuery, ServiceClient};
//!
//! let client = MetadataClient::new(ServiceClient::http()?);
//! let mut query = MetadataQuery::new(true, 100);
//! query.set("mintime", 1065880000)?.set("maxtime", 1065881000)?;
//! let table = client.find(&query)?;
//! println!("{table}");
//! ```
//!
//! ## Quality database
//!
//! ```ignore
//! use mwaqa::{CredentialCache, QualityClient, SelectQuery, ServiceClient, col};
//!
//! let credentials = CredentialCache::from_config_files();
//! let qa = QualityClient::new(ServiceClient::http()?, &credentials);
//!
//! let select = SelectQuery::new(["obsid", "iono_qa"])
//!     .with_constraints(col("obsid").ge(1065880000).and(col("obsid").le(1065881000)));
//! let table = qa.select_table(&select, None)?;
//!
//! // Writes need a key in quality.conf and the MRO base URL
//! qa.delete(&col("obsid").eq(1065880128))?;
//! ```

mod client;
mod constraint;
mod credentials;
mod error;
mod metadata;
mod output;
mod params;
mod pretty;
mod quality;
mod request;
mod shape;
mod transport;

// ============ Primary Public API ============

pub use metadata::{MetadataClient, MetadataQuery};
pub use quality::{QaResponse, QualityClient};

// ============ Errors ============

pub use error::{QueryError, Result};

// ============ Constraints ============

pub use constraint::{ColumnRef, CompareOp, Constraint, Literal, LogicalOp, Operand, col};

// ============ Requests ============

pub use params::{DEFAULT_PAGESIZE, Param, ParameterSet};
pub use request::{
    DEFAULT_FIND_BASE_URL, DEFAULT_QA_BASE_URL, DEFAULT_SELECT_LIMIT, Endpoint, ExtendedSuffix,
    QaService, QueryBuilder, QueryRequest, SelectQuery,
};

// ============ Transport ============

pub use client::{RawResponse, ServiceClient, WRITE_ENDPOINT_MARKER, authorize_write};
pub use transport::{HttpResponse, HttpTransport, Transport};

// ============ Credentials ============

pub use credentials::{
    CONFIG_ENV_VAR, CONFIG_PATHS, ConfigFileSource, CredentialCache, CredentialRegistry,
    CredentialSource, Credentials, DEFAULT_USER,
};

// ============ Results ============

pub use output::{load_obsid_file, parse_delimiter, parse_obsids, write_csv, write_csv_file};
pub use shape::{
    BRIEF_COLUMNS, ColumnDef, ColumnKind, ColumnSelection, EXTENDED_COLUMNS, OBSID_LABEL,
    ObsidAllowList, QA_OBSID_COLUMN, ResultShaper, ResultTable, prune,
};
