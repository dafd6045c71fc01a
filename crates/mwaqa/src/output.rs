//! Table output and obsid list input

use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use polars::prelude::*;

use crate::error::{QueryError, Result};
use crate::shape::{ObsidAllowList, ResultTable};

impl fmt::Display for ResultTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.df)
    }
}

/// Single-byte CSV delimiter; the two-character string `\t` means a tab
pub fn parse_delimiter(s: &str) -> Result<u8> {
    match s {
        "\\t" => Ok(b'\t'),
        _ => match s.as_bytes() {
            [b] if b.is_ascii() => Ok(*b),
            _ => Err(QueryError::InvalidArgument(format!(
                "delimiter must be a single ASCII character, got {s:?}"
            ))),
        },
    }
}

/// Write the table as CSV with a header row
pub fn write_csv<W: Write>(table: &ResultTable, writer: W, delimiter: u8) -> Result<()> {
    let mut df = table.df.clone();
    CsvWriter::new(writer)
        .include_header(true)
        .with_separator(delimiter)
        .finish(&mut df)?;
    Ok(())
}

/// Write the table as CSV to `path`, replacing any existing file
pub fn write_csv_file(table: &ResultTable, path: impl AsRef<Path>, delimiter: u8) -> Result<()> {
    let file = File::create(path.as_ref())?;
    write_csv(table, file, delimiter)
}

pub fn load_obsid_file(path: impl AsRef<Path>) -> Result<ObsidAllowList> {
    let text = std::fs::read_to_string(path.as_ref())?;
    parse_obsids(&text)
}

/// Whitespace-separated integer ids; `#` starts a comment
pub fn parse_obsids(text: &str) -> Result<ObsidAllowList> {
    text.lines()
        .map(|line| line.split('#').next().unwrap_or_default())
        .flat_map(str::split_whitespace)
        .map(|token| {
            token.parse::<i64>().map_err(|_| {
                QueryError::InvalidArgument(format!("not an obsid: {token:?}"))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{ColumnSelection, ResultShaper};
    use serde_json::json;

    fn small_table() -> ResultTable {
        let rows = vec![json!([1065880128, 0.5, "a,b"]), json!([1065880248, null, "c"])];
        let selection = ColumnSelection::Explicit(
            ["obsid", "iono_qa", "sourcelist"].map(String::from).to_vec(),
        );
        ResultShaper::default().shape_rows(&rows, &selection).unwrap()
    }

    #[test]
    fn delimiters() {
        assert_eq!(parse_delimiter(",").unwrap(), b',');
        assert_eq!(parse_delimiter("\\t").unwrap(), b'\t');
        assert_eq!(parse_delimiter("\t").unwrap(), b'\t');
        assert!(parse_delimiter("::").is_err());
        assert!(parse_delimiter("").is_err());
    }

    #[test]
    fn csv_has_header_and_rows() {
        let mut buf = Vec::new();
        write_csv(&small_table(), &mut buf, b',').unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "obsid,iono_qa,sourcelist");
        assert_eq!(lines[1], "1065880128,0.5,\"a,b\"");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn csv_file_is_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "stale contents that are much longer than the table\n".repeat(10))
            .unwrap();
        write_csv_file(&small_table(), &path, b'\t').unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("obsid\tiono_qa\tsourcelist\n"));
        assert!(!text.contains("stale"));
    }

    #[test]
    fn obsid_lists() {
        let allow = parse_obsids("1065880128\n  1065880248 1065880368\n\n# skipped\n").unwrap();
        assert_eq!(allow.len(), 3);
        assert_eq!(allow.min(), Some(1065880128));
        assert!(parse_obsids("1065880128\nabc\n").unwrap_err().is_invalid_argument());
    }

    #[test]
    fn display_shows_columns() {
        let rendered = small_table().to_string();
        assert!(rendered.contains("obsid"));
        assert!(rendered.contains("sourcelist"));
    }
}
