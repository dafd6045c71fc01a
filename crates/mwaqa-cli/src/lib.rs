//! Shared plumbing for the mwaqa command-line tools

use std::io;
use std::path::PathBuf;

use clap::Args;
use mwaqa::{ResultTable, parse_delimiter, write_csv, write_csv_file};

/// Flags controlling how a result table is emitted
#[derive(Args, Debug, Clone)]
pub struct OutputArgs {
    /// Print results in a CSV format
    #[arg(long)]
    pub csv: bool,

    /// Write the results as CSV to this file instead of printing them
    #[arg(short = 'f', long = "output_filename")]
    pub output_filename: Option<PathBuf>,

    /// CSV delimiter; '\t' means a tab
    #[arg(long, default_value = ",")]
    pub delimiter: String,
}

impl OutputArgs {
    pub fn delimiter(&self) -> mwaqa::Result<u8> {
        parse_delimiter(&self.delimiter)
    }

    /// Print the table, or write it as CSV to stdout or the output file
    pub fn emit(&self, table: &ResultTable) -> mwaqa::Result<()> {
        let delimiter = self.delimiter()?;
        match &self.output_filename {
            Some(path) => {
                write_csv_file(table, path, delimiter)?;
                log::info!("Wrote {} rows to {}", table.height(), path.display());
            }
            None if self.csv => write_csv(table, io::stdout().lock(), delimiter)?,
            None => println!("{table}"),
        }
        Ok(())
    }
}

/// Polars display settings for printing whole tables: every row, every
/// column, and full cell text without wrapping
pub const DISPLAY_ENV: &[(&str, &str)] = &[
    ("POLARS_FMT_MAX_ROWS", "-1"),
    ("POLARS_FMT_MAX_COLS", "-1"),
    ("POLARS_FMT_STR_LEN", "10000"),
    ("POLARS_FMT_TABLE_CELL_LIST_LEN", "-1"),
    ("POLARS_TABLE_WIDTH", "65535"),
];

/// Apply [`DISPLAY_ENV`] to the process environment.
///
/// # Safety
///
/// Must run while no other thread can read or write the environment,
/// i.e. first thing in `main`.
pub unsafe fn set_display_env() {
    for (key, value) in DISPLAY_ENV {
        // SAFETY: upheld by the caller
        unsafe { std::env::set_var(key, value) };
    }
}

/// Logging at `warn` unless RUST_LOG says otherwise
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        output: OutputArgs,
    }

    #[test]
    fn output_defaults() {
        let h = Harness::try_parse_from(["t"]).unwrap();
        assert!(!h.output.csv);
        assert!(h.output.output_filename.is_none());
        assert_eq!(h.output.delimiter().unwrap(), b',');
    }

    #[test]
    fn tab_and_bad_delimiters() {
        let h = Harness::try_parse_from(["t", "--delimiter", "\\t"]).unwrap();
        assert_eq!(h.output.delimiter().unwrap(), b'\t');

        let h = Harness::try_parse_from(["t", "--delimiter", "::"]).unwrap();
        assert!(h.output.delimiter().is_err());
    }

    #[test]
    fn output_file_is_written_as_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let h = Harness::try_parse_from(["t", "--output_filename", path.to_str().unwrap()])
            .unwrap();

        let table = mwaqa::ResultShaper::new(None)
            .shape(
                &serde_json::json!([[1, "G0009"], [2, "G0010"]]),
                &mwaqa::ColumnSelection::Explicit(vec!["obsid".into(), "projectid".into()]),
            )
            .unwrap();
        h.output.emit(&table).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "obsid,projectid\n1,G0009\n2,G0010\n");
    }

    #[test]
    fn display_keeps_long_cells_whole() {
        // SAFETY: no other test in this crate reads or writes the environment
        unsafe { set_display_env() };

        let obsname = "high_season1_2456545_long_name_eor";
        let channels: Vec<i64> = (121..=144).collect();
        let table = mwaqa::ResultShaper::new(None)
            .shape(
                &serde_json::json!([[1065880128, obsname, channels]]),
                &mwaqa::ColumnSelection::Explicit(vec![
                    "obsid".into(),
                    "obsname".into(),
                    "channels".into(),
                ]),
            )
            .unwrap();

        let rendered = table.to_string();
        let expected: Vec<String> = (121..=144).map(|c| c.to_string()).collect();
        assert!(rendered.contains(obsname), "{rendered}");
        assert!(rendered.contains(&format!("[{}]", expected.join(","))), "{rendered}");
        assert!(!rendered.contains('…'), "{rendered}");
    }
}
