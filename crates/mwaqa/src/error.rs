//! Error taxonomy shared by every layer of the client.

use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    /// Bad constraint operator, conflicting options, malformed local input
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Parameter name outside the find-service vocabulary
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    /// Write call without usable credentials or without a write endpoint.
    /// Never produced after a request has been sent.
    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("URL or network error: {0}")]
    Network(String),

    #[error("HTTP error from server: code={status}{}", response_suffix(.body))]
    Server { status: u16, body: Option<String> },

    /// The quality service answered with `success: false`
    #[error("Quality service rejected the call: {}", .errors.join("; "))]
    Rejected {
        query: Option<String>,
        errors: Vec<String>,
    },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Table error: {0}")]
    Table(#[from] PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn response_suffix(body: &Option<String>) -> String {
    match body {
        Some(body) => format!(", response:\n {body}"),
        None => String::new(),
    }
}

impl QueryError {
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_) | Self::UnknownParameter(_))
    }

    /// Whether the error was raised before any network I/O took place
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_)
                | Self::UnknownParameter(_)
                | Self::Permission(_)
                | Self::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;
