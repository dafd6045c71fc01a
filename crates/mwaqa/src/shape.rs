//! Result shaping: raw JSON rows to a typed table
//!
//! Column names, order and types come from the [`ColumnSelection`], never
//! from the response. Rows keep server order; the only thing that drops
//! rows is an explicit [`ObsidAllowList`], applied after the table is built.

use std::collections::BTreeSet;

use log::{info, warn};
use polars::prelude::*;
use serde_json::Value as JsonValue;

use crate::error::{QueryError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Int,
    Float,
    Str,
}

/// A fixed output column: key in the raw row, display label, cell type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub source: &'static str,
    pub label: &'static str,
    pub kind: ColumnKind,
}

const fn column_def(source: &'static str, label: &'static str, kind: ColumnKind) -> ColumnDef {
    ColumnDef {
        source,
        label,
        kind,
    }
}

/// Label of the observation id column in find results
pub const OBSID_LABEL: &str = "Obsid";
/// Name of the observation id column in quality results
pub const QA_OBSID_COLUMN: &str = "obsid";

pub const EXTENDED_COLUMNS: &[ColumnDef] = &[
    column_def("mwas.starttime", OBSID_LABEL, ColumnKind::Int),
    column_def("mwas.stoptime", "Stop Time", ColumnKind::Int),
    column_def("mwas.obsname", "Obs. Name", ColumnKind::Str),
    column_def("mwas.creator", "Creator", ColumnKind::Str),
    column_def("mwas.projectid", "ProjectID", ColumnKind::Str),
    column_def("sm.ra_pointing", "RA [deg]", ColumnKind::Float),
    column_def("sm.dec_pointing", "Dec [deg]", ColumnKind::Float),
    column_def("sm.azimuth_pointing", "Azimuth [deg]", ColumnKind::Float),
    column_def("sm.elevation_pointing", "Elevation [deg]", ColumnKind::Float),
    column_def("sm.gridpoint_number", "Gridpoint", ColumnKind::Int),
    column_def("mwas.int_time", "Int. Time [s]", ColumnKind::Float),
    // List of coarse channel numbers, flattened to text
    column_def("rfs.frequencies", "Freq. Chans", ColumnKind::Str),
];

/// Brief rows are positional arrays in this order
pub const BRIEF_COLUMNS: &[ColumnDef] = &[
    column_def("mwas.starttime", OBSID_LABEL, ColumnKind::Int),
    column_def("mwas.obsname", "Obs. Name", ColumnKind::Str),
    column_def("mwas.creator", "Creator", ColumnKind::Str),
    column_def("mwas.projectid", "ProjectID", ColumnKind::Str),
    column_def("sm.ra_pointing", "RA [deg]", ColumnKind::Float),
    column_def("sm.dec_pointing", "Dec [deg]", ColumnKind::Float),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSelection {
    /// [`EXTENDED_COLUMNS`]
    Extended,
    /// [`BRIEF_COLUMNS`]
    Brief,
    /// Caller-chosen columns, positional in each row, types inferred
    Explicit(Vec<String>),
}

impl ColumnSelection {
    pub fn find(extended: bool) -> Self {
        if extended {
            ColumnSelection::Extended
        } else {
            ColumnSelection::Brief
        }
    }

    pub fn labels(&self) -> Vec<String> {
        match self {
            ColumnSelection::Extended => labels_of(EXTENDED_COLUMNS),
            ColumnSelection::Brief => labels_of(BRIEF_COLUMNS),
            ColumnSelection::Explicit(names) => names.clone(),
        }
    }

    fn id_column(&self) -> Option<&str> {
        match self {
            ColumnSelection::Extended | ColumnSelection::Brief => Some(OBSID_LABEL),
            ColumnSelection::Explicit(names) => names
                .iter()
                .find(|n| n.as_str() == QA_OBSID_COLUMN)
                .map(String::as_str),
        }
    }
}

fn labels_of(defs: &[ColumnDef]) -> Vec<String> {
    defs.iter().map(|s| s.label.to_string()).collect()
}

// ============ Allow-list ============

/// Observation ids to keep, e.g. read from an obsid file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObsidAllowList {
    ids: BTreeSet<i64>,
}

impl ObsidAllowList {
    pub fn contains(&self, obsid: i64) -> bool {
        self.ids.contains(&obsid)
    }

    pub fn min(&self) -> Option<i64> {
        self.ids.first().copied()
    }

    pub fn max(&self) -> Option<i64> {
        self.ids.last().copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromIterator<i64> for ObsidAllowList {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

// ============ Table ============

#[derive(Debug, Clone)]
pub struct ResultTable {
    pub df: DataFrame,
    /// The raw row count reached the page limit
    pub truncated: bool,
}

impl ResultTable {
    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn into_dataframe(self) -> DataFrame {
        self.df
    }
}

// ============ Shaper ============

#[derive(Debug, Clone, Default)]
pub struct ResultShaper {
    page_limit: Option<usize>,
    allow_list: Option<ObsidAllowList>,
}

impl ResultShaper {
    pub fn new(page_limit: Option<usize>) -> Self {
        Self {
            page_limit,
            allow_list: None,
        }
    }

    pub fn with_allow_list(mut self, allow_list: ObsidAllowList) -> Self {
        self.allow_list = Some(allow_list);
        self
    }

    /// Shape a raw response that must be a JSON array of rows
    pub fn shape(&self, raw: &JsonValue, selection: &ColumnSelection) -> Result<ResultTable> {
        let rows = raw.as_array().ok_or_else(|| {
            QueryError::MalformedResponse(format!("expected a JSON array of rows, got {raw}"))
        })?;
        self.shape_rows(rows, selection)
    }

    pub fn shape_rows(
        &self,
        rows: &[JsonValue],
        selection: &ColumnSelection,
    ) -> Result<ResultTable> {
        let truncated = self.check_truncation(rows.len());

        let columns = match selection {
            ColumnSelection::Extended => fixed_columns(rows, EXTENDED_COLUMNS)?,
            ColumnSelection::Brief => fixed_columns(rows, BRIEF_COLUMNS)?,
            ColumnSelection::Explicit(names) => explicit_columns(rows, names)?,
        };
        let mut df = DataFrame::new(columns)?;

        if let Some(allow_list) = &self.allow_list {
            let id_column = selection.id_column().ok_or_else(|| {
                QueryError::InvalidArgument(format!(
                    "pruning by obsid needs an '{QA_OBSID_COLUMN}' column in the selection"
                ))
            })?;
            let before = df.height();
            df = prune(&df, allow_list, id_column)?;
            info!("Pruned {} of {} rows not in the obsid list", before - df.height(), before);
        }

        Ok(ResultTable { df, truncated })
    }

    fn check_truncation(&self, row_count: usize) -> bool {
        match self.page_limit {
            Some(limit) if row_count >= limit => {
                warn!(
                    "Query results may be truncated due to the pagesize parameter \
                     ({row_count} rows, limit {limit})."
                );
                true
            }
            _ => false,
        }
    }
}

/// Keep rows whose id is in the allow-list, in their current order
pub fn prune(df: &DataFrame, allow_list: &ObsidAllowList, id_column: &str) -> Result<DataFrame> {
    let ids = df.column(id_column)?.cast(&DataType::Int64)?;
    let keep: Vec<bool> = ids
        .i64()?
        .into_iter()
        .map(|id| id.is_some_and(|id| allow_list.contains(id)))
        .collect();
    let mask = BooleanChunked::from_slice(PlSmallStr::from_static("keep"), &keep);
    Ok(df.filter(&mask)?)
}

// ============ Cell coercion ============

fn fixed_columns(rows: &[JsonValue], defs: &[ColumnDef]) -> Result<Vec<Column>> {
    let cells = row_cells(rows, defs.len(), |row| {
        defs.iter()
            .map(|def| row.get(def.source).cloned().unwrap_or(JsonValue::Null))
            .collect()
    })?;
    defs.iter()
        .enumerate()
        .map(|(i, def)| build_column(def.label, def.kind, cells.iter().map(|row| &row[i])))
        .collect()
}

fn explicit_columns(rows: &[JsonValue], names: &[String]) -> Result<Vec<Column>> {
    let cells = row_cells(rows, names.len(), |row| {
        names
            .iter()
            .map(|name| row.get(name.as_str()).cloned().unwrap_or(JsonValue::Null))
            .collect()
    })?;
    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let kind = infer_kind(cells.iter().map(|row| &row[i]));
            build_column(name, kind, cells.iter().map(|row| &row[i]))
        })
        .collect()
}

/// Rows as positional cell vectors. Arrays must have `width` entries;
/// objects are mapped through `from_object`.
fn row_cells(
    rows: &[JsonValue],
    width: usize,
    from_object: impl Fn(&JsonValue) -> Vec<JsonValue>,
) -> Result<Vec<Vec<JsonValue>>> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| match row {
            JsonValue::Array(items) if items.len() == width => Ok(items.clone()),
            JsonValue::Array(items) => Err(QueryError::MalformedResponse(format!(
                "row {i} has {} values, expected {width}",
                items.len()
            ))),
            JsonValue::Object(_) => Ok(from_object(row)),
            other => Err(QueryError::MalformedResponse(format!(
                "row {i} is not an array or object: {other}"
            ))),
        })
        .collect()
}

fn infer_kind<'a>(values: impl Iterator<Item = &'a JsonValue>) -> ColumnKind {
    let mut kind = None;
    for value in values {
        let this = match value {
            JsonValue::Null => continue,
            JsonValue::Number(n) if n.is_i64() => ColumnKind::Int,
            JsonValue::Number(_) => ColumnKind::Float,
            _ => return ColumnKind::Str,
        };
        kind = Some(match (kind, this) {
            (None, k) => k,
            (Some(ColumnKind::Int), ColumnKind::Int) => ColumnKind::Int,
            _ => ColumnKind::Float,
        });
    }
    kind.unwrap_or(ColumnKind::Str)
}

fn build_column<'a>(
    label: &str,
    kind: ColumnKind,
    values: impl Iterator<Item = &'a JsonValue>,
) -> Result<Column> {
    let name = PlSmallStr::from(label);
    let column = match kind {
        ColumnKind::Int => {
            let cells = values
                .map(|v| to_int(v).ok_or_else(|| bad_cell(label, "an integer", v)))
                .collect::<Result<Vec<Option<i64>>>>()?;
            Column::new(name, cells)
        }
        ColumnKind::Float => {
            let cells = values
                .map(|v| to_float(v).ok_or_else(|| bad_cell(label, "a number", v)))
                .collect::<Result<Vec<Option<f64>>>>()?;
            Column::new(name, cells)
        }
        ColumnKind::Str => {
            let cells: Vec<Option<String>> = values.map(to_text).collect();
            Column::new(name, cells)
        }
    };
    Ok(column)
}

// Outer None: not coercible. Inner None: null cell.

fn to_int(value: &JsonValue) -> Option<Option<i64>> {
    match value {
        JsonValue::Null => Some(None),
        JsonValue::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .map(Some),
        JsonValue::String(s) => s.trim().parse().ok().map(Some),
        _ => None,
    }
}

fn to_float(value: &JsonValue) -> Option<Option<f64>> {
    match value {
        JsonValue::Null => Some(None),
        JsonValue::Number(n) => n.as_f64().map(Some),
        JsonValue::String(s) => s.trim().parse().ok().map(Some),
        _ => None,
    }
}

/// Scalars as text; lists and objects flattened to their JSON form
fn to_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn bad_cell(label: &str, expected: &str, value: &JsonValue) -> QueryError {
    QueryError::MalformedResponse(format!("column '{label}': expected {expected}, got {value}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn extended_row(obsid: i64) -> JsonValue {
        json!({
            "mwas.starttime": obsid,
            "mwas.stoptime": obsid + 112,
            "mwas.obsname": "high_season1_2456545",
            "mwas.creator": "DJacobs",
            "mwas.projectid": "G0009",
            "sm.ra_pointing": 0.5,
            "sm.dec_pointing": -27.0,
            "sm.azimuth_pointing": 0,
            "sm.elevation_pointing": 90.0,
            "sm.gridpoint_number": 0,
            "mwas.int_time": 0.5,
            "rfs.frequencies": [57, 58, 59],
            "numfiles": 25
        })
    }

    #[test]
    fn extended_columns_are_fixed() {
        let raw = json!([extended_row(1065880128)]);
        let table = ResultShaper::new(Some(10))
            .shape(&raw, &ColumnSelection::Extended)
            .unwrap();
        assert_eq!(table.column_names(), ColumnSelection::Extended.labels());
        assert_eq!(table.column_names().len(), 12);
        assert!(!table.truncated);

        let df = &table.df;
        assert_eq!(df.column("Obsid").unwrap().i64().unwrap().get(0), Some(1065880128));
        assert_eq!(df.column("Azimuth [deg]").unwrap().f64().unwrap().get(0), Some(0.0));
        assert_eq!(
            df.column("Freq. Chans").unwrap().str().unwrap().get(0),
            Some("[57,58,59]")
        );
    }

    #[test]
    fn missing_keys_become_nulls() {
        let raw = json!([{"mwas.starttime": 1}]);
        let table = ResultShaper::default()
            .shape(&raw, &ColumnSelection::Extended)
            .unwrap();
        assert_eq!(table.height(), 1);
        assert_eq!(table.df.column("Creator").unwrap().null_count(), 1);
    }

    #[test]
    fn brief_rows_are_positional() {
        let raw = json!([
            [1065880128, "obs_a", "DJacobs", "G0009", 0.0, -27.0],
            [1065880248, "obs_b", "DJacobs", "G0009", 10.0, -26.5]
        ]);
        let table = ResultShaper::default()
            .shape(&raw, &ColumnSelection::Brief)
            .unwrap();
        assert_eq!(
            table.column_names(),
            ["Obsid", "Obs. Name", "Creator", "ProjectID", "RA [deg]", "Dec [deg]"]
        );
        assert_eq!(
            table.df.column("Obs. Name").unwrap().str().unwrap().get(1),
            Some("obs_b")
        );
    }

    #[test]
    fn wrong_row_width_is_malformed() {
        let raw = json!([[1, "a"]]);
        let err = ResultShaper::default()
            .shape(&raw, &ColumnSelection::Brief)
            .unwrap_err();
        assert!(matches!(err, QueryError::MalformedResponse(_)));
    }

    #[test]
    fn non_array_response_is_malformed() {
        let err = ResultShaper::default()
            .shape(&json!({"error": "x"}), &ColumnSelection::Brief)
            .unwrap_err();
        assert!(matches!(err, QueryError::MalformedResponse(_)));
    }

    #[test]
    fn bad_integer_cell_names_column() {
        let raw = json!([{"mwas.starttime": "soon"}]);
        let err = ResultShaper::default()
            .shape(&raw, &ColumnSelection::Extended)
            .unwrap_err();
        assert!(err.to_string().contains("'Obsid'"));
    }

    #[test]
    fn truncation_at_page_limit() {
        let rows: Vec<JsonValue> = (0..3).map(extended_row).collect();
        let shaper = ResultShaper::new(Some(3));
        assert!(shaper.shape_rows(&rows, &ColumnSelection::Extended).unwrap().truncated);
        let shaper = ResultShaper::new(Some(4));
        assert!(!shaper.shape_rows(&rows, &ColumnSelection::Extended).unwrap().truncated);
    }

    #[test]
    fn explicit_columns_infer_types() {
        let rows = vec![
            json!([1065880128, 3, 0.5, "a", null]),
            json!([1065880248, 4, 1, null, [1, 2]]),
        ];
        let selection = ColumnSelection::Explicit(
            ["obsid", "lowest_channel", "iono_qa", "sourcelist", "misc"]
                .map(String::from)
                .to_vec(),
        );
        let df = ResultShaper::default().shape_rows(&rows, &selection).unwrap().df;
        assert_eq!(df.column("obsid").unwrap().dtype(), &DataType::Int64);
        assert_eq!(df.column("iono_qa").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("sourcelist").unwrap().dtype(), &DataType::String);
        assert_eq!(df.column("misc").unwrap().str().unwrap().get(1), Some("[1,2]"));
    }

    #[test]
    fn empty_result_keeps_columns() {
        let selection = ColumnSelection::Explicit(vec!["obsid".into(), "iono_qa".into()]);
        let table = ResultShaper::new(Some(100)).shape_rows(&[], &selection).unwrap();
        assert_eq!(table.height(), 0);
        assert_eq!(table.column_names(), ["obsid", "iono_qa"]);
    }

    #[test]
    fn allow_list_prunes_in_order() {
        let rows: Vec<JsonValue> = [5, 1, 4, 2, 3].into_iter().map(extended_row).collect();
        let allow: ObsidAllowList = [3, 5, 2, 99].into_iter().collect();
        let table = ResultShaper::new(Some(100))
            .with_allow_list(allow)
            .shape_rows(&rows, &ColumnSelection::Extended)
            .unwrap();
        let ids: Vec<Option<i64>> = table
            .df
            .column("Obsid")
            .unwrap()
            .i64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(ids, [Some(5), Some(2), Some(3)]);
    }

    #[test]
    fn allow_list_needs_obsid_column() {
        let selection = ColumnSelection::Explicit(vec!["iono_qa".into()]);
        let err = ResultShaper::default()
            .with_allow_list([1].into_iter().collect())
            .shape_rows(&[json!([0.5])], &selection)
            .unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn allow_list_bounds() {
        let allow: ObsidAllowList = [30, 10, 20].into_iter().collect();
        assert_eq!((allow.min(), allow.max(), allow.len()), (Some(10), Some(30), 3));
        assert!(ObsidAllowList::default().min().is_none());
    }
}
