//! Forecast result variants and the result-shape contract.
//!
//! A model returns a collection of result items. Each item must be one of
//! three recognized kinds, and the collection must be homogeneous in its
//! column set: either every item carries the point columns or every item
//! carries the rate-grid columns.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Columns required of point-catalog style results.
pub const POINT_COLUMNS: [&str; 5] = ["longitude", "latitude", "depth", "time", "magnitude"];

/// Columns required of rate-grid style results.
pub const GRID_COLUMNS: [&str; 9] = [
    "longitude_min",
    "longitude_max",
    "latitude_min",
    "latitude_max",
    "depth_min",
    "depth_max",
    "a",
    "b",
    "mc",
];

/// The three recognized result kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    /// Forecast event catalog
    PointCatalog,
    /// Gutenberg-Richter rate grid
    RateGridSummary,
    /// Free-form table, either point-like or grid-like
    TabularForecast,
}

impl ResultKind {
    /// Column set this kind must carry. A tabular forecast has no set of its
    /// own and returns an empty slice.
    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            ResultKind::PointCatalog => &POINT_COLUMNS,
            ResultKind::RateGridSummary => &GRID_COLUMNS,
            ResultKind::TabularForecast => &[],
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "point_catalog" => Some(ResultKind::PointCatalog),
            "rate_grid_summary" => Some(ResultKind::RateGridSummary),
            "tabular_forecast" => Some(ResultKind::TabularForecast),
            _ => None,
        }
    }
}

/// Errors from building a table.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TableError {
    #[error("Row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        found: usize,
        expected: usize,
    },

    #[error("Column {column} has {found} cells, expected {expected}")]
    UnevenColumn {
        column: String,
        found: usize,
        expected: usize,
    },

    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),
}

/// Named columns with row-major cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTable")]
pub struct Table {
    columns: Vec<String>,

    #[serde(default)]
    rows: Vec<Vec<Value>>,
}

/// Wire shape of a table before the shape checks in [`Table::new`].
#[derive(Deserialize)]
struct RawTable {
    columns: Vec<String>,

    #[serde(default)]
    rows: Vec<Vec<Value>>,
}

impl TryFrom<RawTable> for Table {
    type Error = TableError;

    fn try_from(raw: RawTable) -> Result<Self, Self::Error> {
        Table::new(raw.columns, raw.rows)
    }
}

impl Table {
    /// Build a table, rejecting duplicate column names and ragged rows.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, TableError> {
        for (i, name) in columns.iter().enumerate() {
            if columns[..i].contains(name) {
                return Err(TableError::DuplicateColumn(name.clone()));
            }
        }

        for (row, cells) in rows.iter().enumerate() {
            if cells.len() != columns.len() {
                return Err(TableError::RaggedRow {
                    row,
                    found: cells.len(),
                    expected: columns.len(),
                });
            }
        }

        Ok(Self { columns, rows })
    }

    /// Build a table from column-major data.
    pub fn from_columns<I, S>(columns: I) -> Result<Self, TableError>
    where
        I: IntoIterator<Item = (S, Vec<Value>)>,
        S: Into<String>,
    {
        let (names, data): (Vec<String>, Vec<Vec<Value>>) =
            columns.into_iter().map(|(n, v)| (n.into(), v)).unzip();

        let height = data.first().map(Vec::len).unwrap_or(0);
        let mut rows = vec![Vec::with_capacity(names.len()); height];
        for (col, values) in data.into_iter().enumerate() {
            if values.len() != height {
                return Err(TableError::UnevenColumn {
                    column: names[col].clone(),
                    found: values.len(),
                    expected: height,
                });
            }
            for (row, value) in values.into_iter().enumerate() {
                rows[row].push(value);
            }
        }

        Self::new(names, rows)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn has_columns(&self, required: &[&str]) -> bool {
        required.iter().all(|name| self.has_column(name))
    }

    /// All cells of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let index = self.columns.iter().position(|c| c == name)?;
        self.rows.iter().map(|row| row.get(index)).collect()
    }
}

/// A typed forecast result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ForecastResult {
    PointCatalog(Table),
    RateGridSummary(Table),
    TabularForecast(Table),
}

impl ForecastResult {
    pub fn kind(&self) -> ResultKind {
        match self {
            ForecastResult::PointCatalog(_) => ResultKind::PointCatalog,
            ForecastResult::RateGridSummary(_) => ResultKind::RateGridSummary,
            ForecastResult::TabularForecast(_) => ResultKind::TabularForecast,
        }
    }

    pub fn table(&self) -> &Table {
        match self {
            ForecastResult::PointCatalog(t)
            | ForecastResult::RateGridSummary(t)
            | ForecastResult::TabularForecast(t) => t,
        }
    }
}

/// Anything a model may return as a result item.
///
/// Typed results are always classified. Dynamic values are classified by
/// their `kind` tag and may turn out to be unrecognized.
pub trait ForecastOutput {
    /// The recognized kind, or `None` if the item is not a forecast result.
    fn result_kind(&self) -> Option<ResultKind>;

    /// Whether the item carries every column in `required`.
    fn has_columns(&self, required: &[&str]) -> bool;
}

impl ForecastOutput for ForecastResult {
    fn result_kind(&self) -> Option<ResultKind> {
        Some(self.kind())
    }

    fn has_columns(&self, required: &[&str]) -> bool {
        self.table().has_columns(required)
    }
}

impl ForecastOutput for Value {
    fn result_kind(&self) -> Option<ResultKind> {
        let object = self.as_object()?;
        let kind = ResultKind::from_tag(object.get("kind")?.as_str()?)?;

        // A tagged object without a string header is not a table.
        let columns = object.get("columns")?.as_array()?;
        if columns.iter().all(Value::is_string) {
            Some(kind)
        } else {
            None
        }
    }

    fn has_columns(&self, required: &[&str]) -> bool {
        let columns = match self.get("columns").and_then(Value::as_array) {
            Some(c) => c,
            None => return false,
        };
        required
            .iter()
            .all(|name| columns.iter().any(|c| c.as_str() == Some(name)))
    }
}

impl<T: ForecastOutput + ?Sized> ForecastOutput for &T {
    fn result_kind(&self) -> Option<ResultKind> {
        (**self).result_kind()
    }

    fn has_columns(&self, required: &[&str]) -> bool {
        (**self).has_columns(required)
    }
}

/// Column-presence check for a single result item.
pub fn has_columns<T: ForecastOutput + ?Sized>(item: &T, required: &[&str]) -> bool {
    item.has_columns(required)
}

/// Index of the first item that is not a recognized result kind.
pub fn first_unrecognized<T: ForecastOutput>(results: &[T]) -> Option<usize> {
    results.iter().position(|r| r.result_kind().is_none())
}

/// Apply the homogeneous column rule.
///
/// Returns the column set every item carries: the point set if all items
/// have it, else the grid set if all items have that. `None` means the
/// collection is mixed or incomplete. Empty collections match the point
/// set vacuously.
pub fn homogeneous_column_set<T: ForecastOutput>(
    results: &[T],
) -> Option<&'static [&'static str]> {
    if results.iter().all(|r| r.has_columns(&POINT_COLUMNS)) {
        Some(&POINT_COLUMNS)
    } else if results.iter().all(|r| r.has_columns(&GRID_COLUMNS)) {
        Some(&GRID_COLUMNS)
    } else {
        None
    }
}
