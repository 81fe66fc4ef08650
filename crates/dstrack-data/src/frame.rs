//! Typed, column-major tables read from CSV.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use dstrack_core::errors::{ErrorInfo, TrackError};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Cell spellings read as missing values.
pub const NULL_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

const TRUE_TOKENS: &[&str] = &["True", "TRUE", "true"];
const FALSE_TOKENS: &[&str] = &["False", "FALSE", "false"];

/// Logical column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Long,
    Double,
    Boolean,
    String,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Long => "long",
            DataType::Double => "double",
            DataType::Boolean => "boolean",
            DataType::String => "string",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single parsed cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Long(i64),
    Double(f64),
    Boolean(bool),
    String(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Long(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub dtype: DataType,
    pub cells: Vec<Value>,
}

impl Column {
    pub fn null_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_null()).count()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Column-major table. Every column holds exactly `num_rows` cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    columns: Vec<Column>,
    num_rows: usize,
}

impl Frame {
    /// Builds a frame from typed columns, rejecting uneven lengths.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self, TrackError> {
        let num_rows = columns.first().map(Column::len).unwrap_or(0);
        if let Some(bad) = columns.iter().find(|column| column.len() != num_rows) {
            return Err(TrackError::Data(
                ErrorInfo::new("data.frame_shape", "columns have different lengths")
                    .with_context("column", bad.name.clone())
                    .with_context("expected", num_rows.to_string())
                    .with_context("actual", bad.len().to_string()),
            ));
        }
        Ok(Self { columns, num_rows })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.name.as_str()).collect()
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn num_elements(&self) -> usize {
        self.num_rows * self.columns.len()
    }

    /// Copy of the first `n` rows.
    pub fn head(&self, n: usize) -> Frame {
        let take = n.min(self.num_rows);
        let columns = self
            .columns
            .iter()
            .map(|column| Column {
                name: column.name.clone(),
                dtype: column.dtype,
                cells: column.cells[..take].to_vec(),
            })
            .collect();
        Frame {
            columns,
            num_rows: take,
        }
    }

    /// Cells of row `index`, in column order.
    pub fn row(&self, index: usize) -> Option<Vec<&Value>> {
        if index >= self.num_rows {
            return None;
        }
        Some(self.columns.iter().map(|column| &column.cells[index]).collect())
    }
}

/// Reads a CSV file with a header row into a [`Frame`].
pub fn read_csv(path: &Path) -> Result<Frame, TrackError> {
    let file = File::open(path).map_err(|err| {
        TrackError::Data(
            ErrorInfo::new("data.csv_open", err.to_string())
                .with_path(path)
                .with_hint("check --data-file"),
        )
    })?;
    read_csv_from_reader(file).map_err(|err| match err {
        TrackError::Data(info) => TrackError::Data(info.with_path(path)),
        other => other,
    })
}

/// Reads CSV text from any reader; see [`read_csv`].
pub fn read_csv_from_reader<R: Read>(reader: R) -> Result<Frame, TrackError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let mut records = rdr.records();
    let header = match records.next() {
        Some(record) => record.map_err(parse_error)?,
        None => {
            return Err(TrackError::Data(ErrorInfo::new(
                "data.csv_empty",
                "no columns to parse from file",
            )))
        }
    };
    // A byte order mark can only precede the first field.
    let names = mangle_headers(header.iter().enumerate().map(|(idx, field)| {
        if idx == 0 {
            field.trim_start_matches('\u{feff}')
        } else {
            field
        }
    }));
    let width = names.len();
    let mut raw: Vec<Vec<Option<String>>> = vec![Vec::new(); width];
    for record in records {
        let record = record.map_err(parse_error)?;
        if record.len() > width {
            let line = record
                .position()
                .map(|pos| pos.line().to_string())
                .unwrap_or_else(|| "?".into());
            return Err(TrackError::Data(
                ErrorInfo::new(
                    "data.csv_ragged",
                    format!("expected {width} fields, saw {}", record.len()),
                )
                .with_context("line", line),
            ));
        }
        for (idx, slot) in raw.iter_mut().enumerate() {
            let cell = record.get(idx).filter(|field| !NULL_TOKENS.contains(field));
            slot.push(cell.map(str::to_string));
        }
    }
    let columns = names
        .into_iter()
        .zip(raw)
        .map(|(name, cells)| build_column(name, cells))
        .collect::<Vec<_>>();
    let frame = Frame::from_columns(columns)?;
    debug!(
        rows = frame.num_rows(),
        columns = frame.num_columns(),
        "parsed csv frame"
    );
    Ok(frame)
}

fn parse_error(err: csv::Error) -> TrackError {
    let mut info = ErrorInfo::new("data.csv_parse", err.to_string());
    if let Some(pos) = err.position() {
        info = info.with_context("line", pos.line().to_string());
    }
    TrackError::Data(info)
}

/// Renames blank and repeated header names to unique ones.
///
/// A blank name at position `i` becomes `Unnamed: i`; the second `a`
/// becomes `a.1`, the third `a.2`, skipping names already taken.
pub fn mangle_headers<'a, I>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut used = HashSet::new();
    let mut counters: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::new();
    for (idx, name) in raw.into_iter().enumerate() {
        let name = if name.is_empty() {
            format!("Unnamed: {idx}")
        } else {
            name.to_string()
        };
        if used.insert(name.clone()) {
            out.push(name);
            continue;
        }
        let counter = counters.entry(name.clone()).or_insert(1);
        loop {
            let candidate = format!("{name}.{counter}");
            *counter += 1;
            if used.insert(candidate.clone()) {
                out.push(candidate);
                break;
            }
        }
    }
    out
}

/// Picks the narrowest type that accepts every non-null cell.
pub fn infer_type(cells: &[Option<String>]) -> DataType {
    if cells.is_empty() {
        return DataType::String;
    }
    let present: Vec<&str> = cells.iter().flatten().map(String::as_str).collect();
    let has_nulls = present.len() < cells.len();
    if present.is_empty() {
        return DataType::Double;
    }
    let all_long = present.iter().all(|cell| cell.parse::<i64>().is_ok());
    if all_long && !has_nulls {
        return DataType::Long;
    }
    if all_long || present.iter().all(|cell| parse_double(cell).is_some()) {
        return DataType::Double;
    }
    if present
        .iter()
        .all(|cell| TRUE_TOKENS.contains(cell) || FALSE_TOKENS.contains(cell))
    {
        return DataType::Boolean;
    }
    DataType::String
}

fn parse_double(cell: &str) -> Option<f64> {
    cell.parse::<f64>().ok()
}

fn build_column(name: String, cells: Vec<Option<String>>) -> Column {
    let dtype = infer_type(&cells);
    let cells = cells
        .into_iter()
        .map(|cell| match cell {
            None => Value::Null,
            Some(text) => convert(&text, dtype),
        })
        .collect();
    Column { name, dtype, cells }
}

fn convert(text: &str, dtype: DataType) -> Value {
    match dtype {
        DataType::Long => text.parse().map(Value::Long).unwrap_or(Value::Null),
        DataType::Double => parse_double(text).map(Value::Double).unwrap_or(Value::Null),
        DataType::Boolean => Value::Boolean(TRUE_TOKENS.contains(&text)),
        DataType::String => Value::String(text.to_string()),
    }
}
