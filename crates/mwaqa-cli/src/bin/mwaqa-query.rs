//! Read rows of the MWA quality database from the command line

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use mwaqa::{
    Constraint, CredentialCache, ObsidAllowList, QualityClient, QueryBuilder, QueryError,
    SelectQuery, ServiceClient, col, load_obsid_file,
};
use mwaqa_cli::OutputArgs;

/// Limit used with --obsid_file, where the result is pruned afterwards
const OBSID_FILE_LIMIT: usize = 100_000_000;

#[derive(Parser, Debug)]
#[command(name = "mwaqa-query")]
#[command(about = "Query the MWA quality-assurance database")]
#[command(after_help = "\
EXAMPLES:
    # One observation
    mwaqa-query --obsid 1065880128

    # A range, newest first, with ionospheric columns
    mwaqa-query --min 1065880000 --max 1065890000 --desc --iono-mag --iono-pca

    # Only the observations listed in a file, as tab-separated CSV
    mwaqa-query --obsid_file obsids.txt --csv --delimiter '\\t'
")]
struct Cli {
    /// Extract the row for a single observation
    #[arg(short, long, conflicts_with_all = ["min", "max", "obsid_file"])]
    obsid: Option<i64>,

    /// Earliest obsid of a range
    #[arg(long, requires = "max", conflicts_with = "obsid_file")]
    min: Option<i64>,

    /// Latest obsid of a range
    #[arg(long, requires = "min", conflicts_with = "obsid_file")]
    max: Option<i64>,

    /// File of whitespace-separated obsids
    #[arg(long = "obsid_file")]
    obsid_file: Option<PathBuf>,

    /// Upper limit of rows returned
    #[arg(short, long, default_value_t = mwaqa::DEFAULT_SELECT_LIMIT)]
    limit: usize,

    /// Newest observations first
    #[arg(long)]
    desc: bool,

    #[command(flatten)]
    columns: ColumnArgs,

    /// Quality service URL, overriding quality.conf
    #[arg(long = "base_url")]
    base_url: Option<String>,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(clap::Args, Debug, Clone)]
struct ColumnArgs {
    /// Drop the projectid column
    #[arg(long)]
    no_projectid: bool,
    /// Drop the lowest_channel column
    #[arg(long)]
    no_lowest_channel: bool,
    /// Drop the eor_field column
    #[arg(short = 'e', long)]
    no_eor_field: bool,
    /// Drop the gridpoint_number column
    #[arg(short = 'g', long)]
    no_gridpoint_number: bool,
    /// Drop the iono_qa column
    #[arg(short = 'i', long)]
    no_iono_qa: bool,
    /// Add the iono_magnitude column
    #[arg(short = 'm', long)]
    iono_mag: bool,
    /// Add the iono_pca column
    #[arg(short = 'p', long)]
    iono_pca: bool,
    /// Add the sourcelist column
    #[arg(short = 's', long)]
    sourcelist: bool,
    /// Add the uvfits_path column
    #[arg(short = 'u', long)]
    uvfits_path: bool,
}

impl ColumnArgs {
    /// `obsid` first, then the enabled columns in a fixed order
    fn columns(&self) -> Vec<&'static str> {
        [
            ("obsid", true),
            ("projectid", !self.no_projectid),
            ("lowest_channel", !self.no_lowest_channel),
            ("eor_field", !self.no_eor_field),
            ("gridpoint_number", !self.no_gridpoint_number),
            ("iono_qa", !self.no_iono_qa),
            ("iono_magnitude", self.iono_mag),
            ("iono_pca", self.iono_pca),
            ("sourcelist", self.sourcelist),
            ("uvfits_path", self.uvfits_path),
        ]
        .into_iter()
        .filter_map(|(name, on)| on.then_some(name))
        .collect()
    }
}

/// Which observations to select
#[derive(Debug, Clone, PartialEq)]
enum Selection {
    Single(i64),
    Range { min: i64, max: i64 },
    File(PathBuf),
}

impl Cli {
    fn selection(&self) -> mwaqa::Result<Selection> {
        let invalid = |msg: &str| Err(QueryError::InvalidArgument(msg.to_string()));
        match (self.obsid, self.min, self.max, &self.obsid_file) {
            (Some(obsid), None, None, None) => Ok(Selection::Single(obsid)),
            (None, Some(min), Some(max), None) => Ok(Selection::Range { min, max }),
            (None, None, None, Some(path)) => Ok(Selection::File(path.clone())),
            (None, None, None, None) => {
                invalid("one of --obsid, --min/--max or --obsid_file is required")
            }
            (Some(_), _, _, Some(_)) => invalid("cannot combine --obsid with --obsid_file"),
            (_, Some(_), None, _) | (_, None, Some(_), _) => {
                invalid("both the minimum and maximum of a range search are required")
            }
            _ => invalid("cannot combine --min or --max with --obsid or --obsid_file"),
        }
    }

    /// The select call plus the allow-list to prune its rows by
    fn select(&self) -> mwaqa::Result<(SelectQuery, Option<ObsidAllowList>)> {
        let (constraints, limit, allow_list): (Constraint, usize, Option<ObsidAllowList>) =
            match self.selection()? {
                Selection::Single(obsid) => (col("obsid").eq(obsid), self.limit, None),
                Selection::Range { min, max } => {
                    (Constraint::between("obsid", min, max), self.limit, None)
                }
                Selection::File(path) => {
                    let allow_list = load_obsid_file(&path)?;
                    let (Some(min), Some(max)) = (allow_list.min(), allow_list.max()) else {
                        return Err(QueryError::InvalidArgument(format!(
                            "no obsids in {}",
                            path.display()
                        )));
                    };
                    (
                        Constraint::between("obsid", min, max),
                        OBSID_FILE_LIMIT,
                        Some(allow_list),
                    )
                }
            };
        let select = SelectQuery::new(self.columns.columns())
            .with_constraints(constraints)
            .with_limit(limit)
            .descending(self.desc);
        Ok((select, allow_list))
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    cli.output.delimiter()?;
    let (select, allow_list) = cli.select()?;

    let mut builder = QueryBuilder::new();
    if let Some(url) = &cli.base_url {
        builder = builder.with_qa_base_url(url.as_str());
    }
    let credentials = CredentialCache::from_config_files();
    let qa = QualityClient::new(ServiceClient::http()?, &credentials).with_builder(builder);

    let table = qa.select_table(&select, allow_list)?;
    cli.output.emit(&table)?;
    Ok(())
}

fn main() -> ExitCode {
    // SAFETY: first statement of main, before any thread is spawned
    unsafe { mwaqa_cli::set_display_env() };
    mwaqa_cli::init_logging();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<QueryError>() {
                Some(QueryError::Rejected { query, errors }) => {
                    eprintln!("The quality service reported errors:");
                    for error in errors {
                        eprintln!("  {error}");
                    }
                    if let Some(query) = query {
                        eprintln!("Query: {query}");
                    }
                }
                _ => eprintln!("{e}"),
            }
            ExitCode::FAILURE
        }
    }
}
