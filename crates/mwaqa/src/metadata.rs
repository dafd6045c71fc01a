//! Observation metadata search
//!
//! A [`MetadataQuery`] is a parameter set plus the choice between the
//! extended and brief column sets; [`MetadataClient`] runs it and hands back
//! a shaped table.

use std::fmt::Display;

use log::info;

use crate::client::ServiceClient;
use crate::error::Result;
use crate::params::{Param, ParameterSet};
use crate::request::{QueryBuilder, QueryRequest};
use crate::shape::{ColumnSelection, ObsidAllowList, ResultShaper, ResultTable};
use crate::transport::{HttpTransport, Transport};

#[derive(Debug, Clone, PartialEq)]
pub struct MetadataQuery {
    pub params: ParameterSet,
    pub extended: bool,
    /// Warn when the row count reaches `pagesize`
    pub warn_truncation: bool,
    pub allow_list: Option<ObsidAllowList>,
}

impl MetadataQuery {
    pub fn new(extended: bool, pagesize: u32) -> Self {
        Self {
            params: ParameterSet::with_defaults(pagesize),
            extended,
            warn_truncation: true,
            allow_list: None,
        }
    }

    /// Set a parameter by wire name
    pub fn set(&mut self, name: &str, value: impl Display) -> Result<&mut Self> {
        self.params.set(name, value)?;
        Ok(self)
    }

    pub fn set_param(&mut self, param: Param, value: impl Display) -> &mut Self {
        self.params.set_param(param, value);
        self
    }

    pub fn with_allow_list(mut self, allow_list: ObsidAllowList) -> Self {
        self.allow_list = Some(allow_list);
        self
    }

    pub fn request(&self, builder: &QueryBuilder) -> QueryRequest {
        builder.find(&self.params, self.extended)
    }

    pub fn selection(&self) -> ColumnSelection {
        ColumnSelection::find(self.extended)
    }

    fn shaper(&self) -> ResultShaper {
        let limit = if self.warn_truncation {
            self.params.pagesize()
        } else {
            None
        };
        let shaper = ResultShaper::new(limit);
        match &self.allow_list {
            Some(allow_list) => shaper.with_allow_list(allow_list.clone()),
            None => shaper,
        }
    }
}

impl Default for MetadataQuery {
    fn default() -> Self {
        Self::new(true, crate::params::DEFAULT_PAGESIZE)
    }
}

pub struct MetadataClient<T = HttpTransport> {
    client: ServiceClient<T>,
    builder: QueryBuilder,
}

impl<T: Transport> MetadataClient<T> {
    pub fn new(client: ServiceClient<T>) -> Self {
        Self {
            client,
            builder: QueryBuilder::default(),
        }
    }

    pub fn with_builder(mut self, builder: QueryBuilder) -> Self {
        self.builder = builder;
        self
    }

    pub fn service_client(&self) -> &ServiceClient<T> {
        &self.client
    }

    pub fn find(&self, query: &MetadataQuery) -> Result<ResultTable> {
        let request = query.request(&self.builder);
        let raw = self.client.execute(&request)?.into_json()?;
        let table = query.shaper().shape(&raw, &query.selection())?;
        info!("find returned {} rows", table.height());
        Ok(table)
    }
}
