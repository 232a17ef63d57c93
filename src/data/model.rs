use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

// ---------------------------------------------------------------------------
// Value – a single cell of a session log
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value, coerced from its lexical form at ingest.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{i}"),
            // Debug keeps the trailing ".0" so floats re-ingest as floats.
            Value::Float(v) => write!(f, "{v:?}"),
            Value::Text(s) => write!(f, "{s}"),
        }
    }
}

impl Value {
    /// Coerce a raw field: integer, else float, else text.
    ///
    /// `decimal_separator` is the character the log writer used for the
    /// fractional part; it is mapped back to `.` before float parsing.
    pub fn coerce(raw: &str, decimal_separator: char) -> Value {
        if let Ok(i) = raw.parse::<i64>() {
            return Value::Integer(i);
        }
        let parsed = if decimal_separator == '.' {
            raw.parse::<f64>()
        } else {
            raw.replace(decimal_separator, ".").parse::<f64>()
        };
        match parsed {
            Ok(f) => Value::Float(f),
            Err(_) => Value::Text(raw.to_string()),
        }
    }

    /// Try to interpret the value as an `f64` for coordinates and timestamps.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Integer(i) => Some(*i as f64),
            Value::Text(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// LogFormat – separators used by a session log
// ---------------------------------------------------------------------------

/// Field and decimal separators of a delimited session log.
///
/// The logger writes numbers with a configurable decimal separator so that
/// logs open cleanly in locale-bound spreadsheet tools; readers and writers
/// must agree on both characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFormat {
    pub field_separator: char,
    pub decimal_separator: char,
}

impl Default for LogFormat {
    fn default() -> Self {
        Self::csv()
    }
}

impl LogFormat {
    /// Plain comma-separated values.
    pub const fn csv() -> Self {
        LogFormat {
            field_separator: ',',
            decimal_separator: '.',
        }
    }

    /// The session logger's native layout.
    pub const fn semicolon() -> Self {
        LogFormat {
            field_separator: ';',
            decimal_separator: '.',
        }
    }

    /// Field separator as a single byte, as the csv tokenizer needs it.
    pub fn delimiter_byte(&self) -> Result<u8> {
        if self.field_separator.is_ascii() {
            Ok(self.field_separator as u8)
        } else {
            Err(AnalysisError::Config(format!(
                "field separator '{}' must be an ASCII character",
                self.field_separator
            )))
        }
    }

    /// Render a float with this format's decimal separator.
    pub fn format_float(&self, value: f64) -> String {
        let text = format!("{value:?}");
        if self.decimal_separator == '.' {
            text
        } else {
            text.replace('.', &self.decimal_separator.to_string())
        }
    }

    /// Render a cell value; floats use the decimal separator.
    pub fn format_value(&self, value: &Value) -> String {
        match value {
            Value::Float(f) => self.format_float(*f),
            other => other.to_string(),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        self.delimiter_byte()?;
        if self.field_separator == self.decimal_separator {
            return Err(AnalysisError::Config(format!(
                "field and decimal separator are both '{}'",
                self.field_separator
            )));
        }
        if self.field_separator == '"' || self.decimal_separator == '"' {
            return Err(AnalysisError::Config("'\"' cannot be a separator".to_string()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Record – one row of a session log
// ---------------------------------------------------------------------------

/// One logged sample. Values are stored in header order; the column names
/// are shared with every other record of the same dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    columns: Arc<Vec<String>>,
    values: Vec<Value>,
}

impl Record {
    /// `values` must already have exactly one entry per column.
    pub(crate) fn new(columns: Arc<Vec<String>>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Record { columns, values }
    }

    /// Look up a value by column name.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
    }

    /// Value at a resolved column index.
    pub fn value(&self, index: usize) -> &Value {
        &self.values[index]
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// `(column, value)` pairs in header order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

// ---------------------------------------------------------------------------
// Point3 / ColumnTriple – spatial views into a record
// ---------------------------------------------------------------------------

/// A position in world coordinates (1 unit = 1 metre in the recording scene).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Point3 { x, y, z }
    }

    /// Euclidean distance.
    pub fn distance(&self, other: &Point3) -> f64 {
        self.distance_squared(other).sqrt()
    }

    pub fn distance_squared(&self, other: &Point3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }
}

/// Names of the three columns a [`Point3`] is read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnTriple {
    pub x: String,
    pub y: String,
    pub z: String,
}

impl ColumnTriple {
    pub fn new(x: &str, y: &str, z: &str) -> Self {
        ColumnTriple {
            x: x.to_string(),
            y: y.to_string(),
            z: z.to_string(),
        }
    }

    /// Gaze hit position as written by the eye-tracking channel.
    pub fn gaze() -> Self {
        Self::new("EtPositionX", "EtPositionY", "EtPositionZ")
    }

    /// Observer position as written by the movement channel.
    pub fn position() -> Self {
        Self::new("xpos", "ypos", "zpos")
    }

    /// Observer rotation (euler angles, degrees).
    pub fn rotation() -> Self {
        Self::new("upos", "vpos", "wpos")
    }

    /// Resolve to column indices, failing on the first absent name.
    pub fn resolve(&self, dataset: &Dataset) -> Result<[usize; 3]> {
        Ok([
            dataset.column_index(&self.x)?,
            dataset.column_index(&self.y)?,
            dataset.column_index(&self.z)?,
        ])
    }
}

// ---------------------------------------------------------------------------
// Dataset – one parsed session log
// ---------------------------------------------------------------------------

/// Ordered records of one session log. Row order is temporal order.
///
/// A dataset is never mutated after ingest; culling builds a new one that
/// shares the column list.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Arc<Vec<String>>,
    records: Vec<Record>,
}

impl Dataset {
    pub(crate) fn from_parts(columns: Arc<Vec<String>>, records: Vec<Record>) -> Self {
        Dataset { columns, records }
    }

    /// Build a dataset from header names and rows of already-typed values.
    /// Rows are truncated or padded to the header length.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let columns = Arc::new(columns);
        let width = columns.len();
        let records = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Value::Text(String::new()));
                Record::new(Arc::clone(&columns), row)
            })
            .collect();
        Dataset { columns, records }
    }

    /// Same columns, a different selection of records.
    pub(crate) fn derive(&self, records: Vec<Record>) -> Self {
        Dataset {
            columns: Arc::clone(&self.columns),
            records,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn record(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    /// Index of a column in the header.
    pub fn column_index(&self, column: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| AnalysisError::MissingColumn(column.to_string()))
    }

    /// Finite numeric value of one cell. `nan` and `inf` cells are
    /// rejected like text.
    pub(crate) fn numeric(&self, row: usize, column: usize) -> Result<f64> {
        let value = self.records[row].value(column);
        value.as_f64().filter(|v| v.is_finite()).ok_or_else(|| AnalysisError::NonNumeric {
            row,
            column: self.columns[column].clone(),
            value: value.to_string(),
        })
    }

    /// Point of one record.
    pub(crate) fn point_at(&self, row: usize, indices: [usize; 3]) -> Result<Point3> {
        Ok(Point3::new(
            self.numeric(row, indices[0])?,
            self.numeric(row, indices[1])?,
            self.numeric(row, indices[2])?,
        ))
    }

    /// Every record's point for the given columns, in row order.
    pub fn points(&self, columns: &ColumnTriple) -> Result<Vec<Point3>> {
        let indices = columns.resolve(self)?;
        (0..self.records.len())
            .map(|row| self.point_at(row, indices))
            .collect()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerce_prefers_integer_then_float() {
        assert_eq!(Value::coerce("42", '.'), Value::Integer(42));
        assert_eq!(Value::coerce("-3.5", '.'), Value::Float(-3.5));
        assert_eq!(Value::coerce("Cube_12", '.'), Value::Text("Cube_12".into()));
        assert_eq!(Value::coerce("", '.'), Value::Text(String::new()));
    }

    #[test]
    fn coerce_honours_decimal_comma() {
        assert_eq!(Value::coerce("1,25", ','), Value::Float(1.25));
        assert_eq!(Value::coerce("1,25", '.'), Value::Text("1,25".into()));
    }

    #[test]
    fn float_display_keeps_fraction() {
        assert_eq!(Value::Float(1.0).to_string(), "1.0");
        assert_eq!(Value::coerce(&Value::Float(1.0).to_string(), '.'), Value::Float(1.0));
    }

    #[test]
    fn format_float_uses_decimal_separator() {
        let fmt = LogFormat {
            field_separator: ';',
            decimal_separator: ',',
        };
        assert_eq!(fmt.format_float(0.25), "0,25");
        assert_eq!(fmt.format_value(&Value::Integer(7)), "7");
        assert_eq!(LogFormat::csv().format_float(2.0), "2.0");
    }

    #[test]
    fn format_rejects_clashing_separators() {
        let fmt = LogFormat {
            field_separator: ',',
            decimal_separator: ',',
        };
        assert!(matches!(fmt.validate(), Err(AnalysisError::Config(_))));
        assert!(LogFormat::semicolon().validate().is_ok());
    }

    #[test]
    fn distance_is_symmetric_and_zero_on_self() {
        let a = Point3::new(1.0, 2.0, 3.0);
        let b = Point3::new(-4.0, 0.5, 9.0);
        assert_eq!(a.distance(&b), b.distance(&a));
        assert_eq!(a.distance(&a), 0.0);
        assert!((Point3::new(0.0, 0.0, 0.0).distance(&Point3::new(3.0, 4.0, 0.0)) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn from_rows_pads_and_truncates() {
        let ds = Dataset::from_rows(
            vec!["a".into(), "b".into()],
            vec![
                vec![Value::Integer(1)],
                vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)],
            ],
        );
        assert_eq!(ds.record(0).unwrap().values().len(), 2);
        assert_eq!(ds.record(0).unwrap().get("b"), Some(&Value::Text(String::new())));
        assert_eq!(ds.record(1).unwrap().get("b"), Some(&Value::Integer(2)));
    }

    #[test]
    fn points_fail_fast_on_missing_column() {
        let ds = Dataset::from_rows(vec!["x".into()], vec![vec![Value::Float(0.0)]]);
        let err = ds.points(&ColumnTriple::new("x", "y", "z")).unwrap_err();
        assert!(matches!(err, AnalysisError::MissingColumn(c) if c == "y"));
    }

    #[test]
    fn points_reject_text_coordinates() {
        let ds = Dataset::from_rows(
            vec!["x".into(), "y".into(), "z".into()],
            vec![vec![Value::Float(0.0), Value::Text("no data".into()), Value::Float(0.0)]],
        );
        let err = ds.points(&ColumnTriple::new("x", "y", "z")).unwrap_err();
        assert!(matches!(err, AnalysisError::NonNumeric { row: 0, .. }));
    }

    #[test]
    fn points_reject_non_finite_coordinates() {
        let ds = Dataset::from_rows(
            vec!["x".into(), "y".into(), "z".into()],
            vec![
                vec![Value::Float(0.0), Value::Float(0.0), Value::Float(0.0)],
                vec![Value::Float(f64::INFINITY), Value::Float(0.0), Value::Float(0.0)],
            ],
        );
        let err = ds.points(&ColumnTriple::new("x", "y", "z")).unwrap_err();
        assert!(matches!(err, AnalysisError::NonNumeric { row: 1, ref column, .. } if column == "x"));
    }
}
