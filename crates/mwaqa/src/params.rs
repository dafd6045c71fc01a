//! Filter parameters for the observation find service
//!
//! The vocabulary is fixed. Every parameter starts out empty and empty
//! parameters are left out of the query string entirely.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::error::{QueryError, Result};

pub const DEFAULT_PAGESIZE: u32 = 10;

/// Unreserved characters, left as-is when encoding
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

macro_rules! params {
    ($($variant:ident => $name:literal),* $(,)?) => {
        /// A recognized find-service parameter, in declaration order
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum Param {
            $($variant),*
        }

        impl Param {
            pub const ALL: &'static [Param] = &[$(Param::$variant),*];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(Param::$variant => $name),*
                }
            }
        }
    };
}

params! {
    PageSize => "pagesize",
    ProjectId => "projectid",
    ObsName => "obsname",
    Creator => "creator",
    MinTime => "mintime",
    MaxTime => "maxtime",
    MinTimeUtc => "mintime_utc",
    MaxTimeUtc => "maxtime_utc",
    MinRa => "minra",
    MaxRa => "maxra",
    MinDec => "mindec",
    MaxDec => "maxdec",
    MinEl => "minel",
    MaxEl => "maxel",
    MinAz => "minaz",
    MaxAz => "maxaz",
    Gridpoint => "gridpoint",
    MinLst => "minlst",
    MaxLst => "maxlst",
    MinSunEl => "minsunel",
    MaxSunEl => "maxsunel",
    MinSunPd => "minsunpd",
    MaxSunPd => "maxsunpd",
    Mode => "mode",
    CenChan => "cenchan",
    AnyChan => "anychan",
    FreqRes => "freqres",
    IntTime => "inttime",
    MinFiles => "minfiles",
}

impl FromStr for Param {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        Param::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| QueryError::UnknownParameter(s.to_string()))
    }
}

/// Parameter values keyed by [`Param`]; iteration follows the vocabulary order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSet {
    values: BTreeMap<Param, String>,
}

impl ParameterSet {
    /// All parameters empty except `pagesize`
    pub fn with_defaults(pagesize: u32) -> Self {
        let mut values: BTreeMap<Param, String> =
            Param::ALL.iter().map(|p| (*p, String::new())).collect();
        values.insert(Param::PageSize, pagesize.to_string());
        Self { values }
    }

    /// Set a parameter by its wire name
    pub fn set(&mut self, name: &str, value: impl Display) -> Result<&mut Self> {
        let param = name.parse()?;
        Ok(self.set_param(param, value))
    }

    pub fn set_param(&mut self, param: Param, value: impl Display) -> &mut Self {
        self.values.insert(param, value.to_string());
        self
    }

    pub fn clear(&mut self, param: Param) -> &mut Self {
        self.values.insert(param, String::new());
        self
    }

    pub fn get(&self, param: Param) -> &str {
        self.values.get(&param).map(String::as_str).unwrap_or("")
    }

    /// Page size the server will cap results at, if it is numeric
    pub fn pagesize(&self) -> Option<usize> {
        self.get(Param::PageSize).trim().parse().ok()
    }

    /// Non-empty parameters in vocabulary order
    pub fn iter(&self) -> impl Iterator<Item = (Param, &str)> {
        self.values
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(p, v)| (*p, v.as_str()))
    }

    /// `name=value` pairs for every non-empty parameter, percent-encoded, joined by `&`
    pub fn to_query_string(&self) -> String {
        encode_pairs(self.iter().map(|(p, v)| (p.as_str(), v)))
    }
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self::with_defaults(DEFAULT_PAGESIZE)
    }
}

pub(crate) fn encode_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    pairs
        .into_iter()
        .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

pub(crate) fn encode(s: &str) -> String {
    utf8_percent_encode(s, QUERY_VALUE).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_only_carry_pagesize() {
        let params = ParameterSet::with_defaults(10);
        assert_eq!(params.to_query_string(), "pagesize=10");
        assert_eq!(params.pagesize(), Some(10));
    }

    #[test]
    fn set_by_name_rejects_unknown() {
        let mut params = ParameterSet::default();
        let err = params.set("minfrobs", 3).unwrap_err();
        assert!(matches!(err, QueryError::UnknownParameter(ref n) if n == "minfrobs"));
        assert_eq!(params, ParameterSet::default());
    }

    #[test]
    fn query_string_follows_vocabulary_order_and_encodes() {
        let mut params = ParameterSet::with_defaults(100);
        params
            .set("obsname", "high season%")
            .unwrap()
            .set("mintime", 1065880000)
            .unwrap()
            .set("projectid", "G0009")
            .unwrap();
        assert_eq!(
            params.to_query_string(),
            "pagesize=100&projectid=G0009&obsname=high%20season%25&mintime=1065880000"
        );
    }

    #[test]
    fn cleared_parameter_is_omitted() {
        let mut params = ParameterSet::with_defaults(5);
        params.set_param(Param::Creator, "DJacobs");
        params.clear(Param::Creator).clear(Param::PageSize);
        assert_eq!(params.to_query_string(), "");
        assert_eq!(params.pagesize(), None);
    }

    #[test]
    fn vocabulary_names_round_trip() {
        assert_eq!(Param::ALL.len(), 29);
        for p in Param::ALL {
            assert_eq!(p.as_str().parse::<Param>().unwrap(), *p);
        }
    }
}
