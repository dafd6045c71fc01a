//! Search the MWA metadata find service from the command line

use std::path::PathBuf;

use clap::Parser;
use mwaqa::{
    MetadataClient, MetadataQuery, Param, QueryBuilder, ServiceClient, load_obsid_file,
};
use mwaqa_cli::OutputArgs;

#[derive(Parser, Debug)]
#[command(name = "mwa-metadata-query")]
#[command(about = "Query the MWA observation metadata service")]
#[command(after_help = "\
EXAMPLES:
    # Observations in the default GPS window
    mwa-metadata-query

    # EoR observations on gridpoint 0, as CSV
    mwa-metadata-query --projectid G0009 --gridpoint 0 --csv

    # A few columns only, written to a file
    mwa-metadata-query --brief --mintime 1065880000 --maxtime 1065890000 --output_filename obs.csv
")]
struct Cli {
    /// Number of results to return
    #[arg(long, default_value_t = 100)]
    pagesize: u32,

    /// Project ID, e.g. G0009
    #[arg(long)]
    projectid: Option<String>,

    /// Observation name; SQL wildcards allowed, e.g. %EoR%
    #[arg(long)]
    obsname: Option<String>,

    /// Creator of the observation
    #[arg(long)]
    creator: Option<String>,

    /// Earliest start time in GPS seconds
    #[arg(long, default_value_t = 1065880000)]
    mintime: i64,

    /// Latest start time in GPS seconds
    #[arg(long, default_value_t = 1065881000)]
    maxtime: i64,

    /// Earliest start time (UTC), e.g. "2014-01-01 00:00:00"
    #[arg(long = "mintime_utc")]
    mintime_utc: Option<String>,

    /// Latest start time (UTC)
    #[arg(long = "maxtime_utc")]
    maxtime_utc: Option<String>,

    #[arg(long, allow_negative_numbers = true)]
    minra: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    maxra: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    mindec: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    maxdec: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    minel: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    maxel: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    minaz: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    maxaz: Option<f64>,

    /// Sweet-spot gridpoint number
    #[arg(long)]
    gridpoint: Option<i64>,

    /// Local sidereal time range, degrees
    #[arg(long)]
    minlst: Option<f64>,
    #[arg(long)]
    maxlst: Option<f64>,

    /// Sun elevation range, degrees
    #[arg(long, allow_negative_numbers = true)]
    minsunel: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    maxsunel: Option<f64>,

    /// Sun distance from the pointing centre, degrees
    #[arg(long)]
    minsunpd: Option<f64>,
    #[arg(long)]
    maxsunpd: Option<f64>,

    /// Observing mode, e.g. HW_LFILES
    #[arg(long)]
    mode: Option<String>,

    /// Centre coarse channel
    #[arg(long)]
    cenchan: Option<i64>,

    /// Any coarse channel in the observation
    #[arg(long)]
    anychan: Option<i64>,

    /// Frequency resolution, kHz
    #[arg(long)]
    freqres: Option<f64>,

    /// Integration time, seconds
    #[arg(long)]
    inttime: Option<f64>,

    /// Minimum number of files, e.g. 25
    #[arg(long)]
    minfiles: Option<i64>,

    /// Return only a few columns
    #[arg(long)]
    brief: bool,

    /// Keep only observations listed in this file
    #[arg(long = "obsid_file")]
    obsid_file: Option<PathBuf>,

    /// Metadata service URL
    #[arg(long = "base_url")]
    base_url: Option<String>,

    #[command(flatten)]
    output: OutputArgs,
}

impl Cli {
    /// Filter values in vocabulary order, unset ones as `None`
    fn params(&self) -> Vec<(Param, Option<String>)> {
        fn s<T: ToString>(v: &Option<T>) -> Option<String> {
            v.as_ref().map(ToString::to_string)
        }
        vec![
            (Param::PageSize, Some(self.pagesize.to_string())),
            (Param::ProjectId, self.projectid.clone()),
            (Param::ObsName, self.obsname.clone()),
            (Param::Creator, self.creator.clone()),
            (Param::MinTime, Some(self.mintime.to_string())),
            (Param::MaxTime, Some(self.maxtime.to_string())),
            (Param::MinTimeUtc, self.mintime_utc.clone()),
            (Param::MaxTimeUtc, self.maxtime_utc.clone()),
            (Param::MinRa, s(&self.minra)),
            (Param::MaxRa, s(&self.maxra)),
            (Param::MinDec, s(&self.mindec)),
            (Param::MaxDec, s(&self.maxdec)),
            (Param::MinEl, s(&self.minel)),
            (Param::MaxEl, s(&self.maxel)),
            (Param::MinAz, s(&self.minaz)),
            (Param::MaxAz, s(&self.maxaz)),
            (Param::Gridpoint, s(&self.gridpoint)),
            (Param::MinLst, s(&self.minlst)),
            (Param::MaxLst, s(&self.maxlst)),
            (Param::MinSunEl, s(&self.minsunel)),
            (Param::MaxSunEl, s(&self.maxsunel)),
            (Param::MinSunPd, s(&self.minsunpd)),
            (Param::MaxSunPd, s(&self.maxsunpd)),
            (Param::Mode, self.mode.clone()),
            (Param::CenChan, s(&self.cenchan)),
            (Param::AnyChan, s(&self.anychan)),
            (Param::FreqRes, s(&self.freqres)),
            (Param::IntTime, s(&self.inttime)),
            (Param::MinFiles, s(&self.minfiles)),
        ]
    }

    fn query(&self) -> anyhow::Result<MetadataQuery> {
        let mut query = MetadataQuery::new(!self.brief, self.pagesize);
        for (param, value) in self.params() {
            if let Some(value) = value {
                query.set_param(param, value);
            }
        }
        if let Some(path) = &self.obsid_file {
            query = query.with_allow_list(load_obsid_file(path)?);
        }
        Ok(query)
    }
}

fn main() -> anyhow::Result<()> {
    // SAFETY: first statement of main, before any thread is spawned
    unsafe { mwaqa_cli::set_display_env() };
    mwaqa_cli::init_logging();
    let cli = Cli::parse();

    // Fail on a bad delimiter before going to the network
    cli.output.delimiter()?;
    let query = cli.query()?;

    let mut builder = QueryBuilder::new();
    if let Some(url) = &cli.base_url {
        builder = builder.with_find_base_url(url.as_str());
    }
    let client = MetadataClient::new(ServiceClient::http()?).with_builder(builder);

    let table = client.find(&query)?;
    cli.output.emit(&table)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_the_gps_window() {
        let cli = Cli::try_parse_from(["mwa-metadata-query"]).unwrap();
        let query = cli.query().unwrap();
        assert!(query.extended);
        assert_eq!(
            query.params.to_query_string(),
            "pagesize=100&mintime=1065880000&maxtime=1065881000"
        );
    }

    #[test]
    fn filters_map_to_parameters() {
        let cli = Cli::try_parse_from([
            "mwa-metadata-query",
            "--brief",
            "--projectid",
            "G0009",
            "--mindec",
            "-30",
            "--mintime_utc",
            "2014-01-01 00:00:00",
            "--minfiles",
            "25",
        ])
        .unwrap();
        let query = cli.query().unwrap();
        assert!(!query.extended);
        assert_eq!(query.params.get(Param::ProjectId), "G0009");
        assert_eq!(query.params.get(Param::MinDec), "-30");
        assert_eq!(query.params.get(Param::MinTimeUtc), "2014-01-01 00:00:00");
        assert_eq!(query.params.get(Param::MinFiles), "25");
        assert_eq!(query.params.get(Param::MaxRa), "");
    }

    #[test]
    fn every_parameter_has_a_flag() {
        let cli = Cli::try_parse_from(["mwa-metadata-query"]).unwrap();
        let params: Vec<Param> = cli.params().into_iter().map(|(p, _)| p).collect();
        assert_eq!(params, Param::ALL);
    }
}
