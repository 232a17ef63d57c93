use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use csv::{ErrorKind, StringRecord};
use log::{debug, info};

use super::model::{Dataset, LogFormat, Record, Value};
use crate::error::{AnalysisError, Result};

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a session log from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`        – header row plus delimited rows
/// * `.txt` `.log` – the session logger's own output (same layout)
pub fn load_file(path: &Path, format: &LogFormat) -> Result<Dataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "csv" | "txt" | "log" => {
            let file = std::fs::File::open(path)?;
            let dataset = read_dataset(file, format)?;
            info!(
                "loaded {} records ({} columns) from {}",
                dataset.len(),
                dataset.columns().len(),
                path.display()
            );
            Ok(dataset)
        }
        _ => Err(AnalysisError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Parse delimited text held in memory.
pub fn parse_str(text: &str, format: &LogFormat) -> Result<Dataset> {
    read_dataset(text.as_bytes(), format)
}

/// Materialize every record of `reader`.
///
/// All-or-nothing: the first failing row aborts the whole read.
pub fn read_dataset<R: Read>(reader: R, format: &LogFormat) -> Result<Dataset> {
    let records = RecordReader::new(reader, format)?;
    let columns = records.shared_columns();
    let rows = records.collect::<Result<Vec<Record>>>()?;
    Ok(Dataset::from_parts(columns, rows))
}

// ---------------------------------------------------------------------------
// Streaming reader
// ---------------------------------------------------------------------------

/// Lazy record iterator over delimited text.
///
/// Layout rules:
/// * the first non-empty line is the header; names must be unique
/// * separators inside double quotes are kept, quote characters left on a
///   field's edges are stripped, backslashes are dropped
/// * `\r\n`, `\n` and `\r` all end a line
/// * blank lines (including lines of empty fields) are skipped
/// * rows longer than the header are truncated, shorter rows are padded with
///   empty fields, so every record carries the full header
pub struct RecordReader<R> {
    inner: csv::Reader<R>,
    columns: Arc<Vec<String>>,
    decimal_separator: char,
    buffer: StringRecord,
}

impl<R: Read> RecordReader<R> {
    /// Read the header and prepare to stream rows.
    pub fn new(reader: R, format: &LogFormat) -> Result<Self> {
        let mut inner = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .delimiter(format.delimiter_byte()?)
            .from_reader(reader);

        let mut buffer = StringRecord::new();
        let mut columns = Vec::new();
        loop {
            if !read_next(&mut inner, &mut buffer)? {
                break;
            }
            if is_blank(&buffer) {
                continue;
            }
            columns = buffer.iter().map(clean_field).collect();
            break;
        }
        check_unique(&columns)?;
        debug!("header: {}", columns.join(", "));

        Ok(RecordReader {
            inner,
            columns: Arc::new(columns),
            decimal_separator: format.decimal_separator,
            buffer,
        })
    }

    /// Header names in order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    fn shared_columns(&self) -> Arc<Vec<String>> {
        Arc::clone(&self.columns)
    }

    fn to_record(&self) -> Record {
        let width = self.columns.len();
        let mut values: Vec<Value> = self
            .buffer
            .iter()
            .take(width)
            .map(|field| Value::coerce(&clean_field(field), self.decimal_separator))
            .collect();
        values.resize(width, Value::Text(String::new()));
        Record::new(Arc::clone(&self.columns), values)
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        // A header-less input has no rows either.
        if self.columns.is_empty() {
            return None;
        }
        loop {
            match read_next(&mut self.inner, &mut self.buffer) {
                Ok(false) => return None,
                Ok(true) if is_blank(&self.buffer) => continue,
                Ok(true) => return Some(Ok(self.to_record())),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_next<R: Read>(reader: &mut csv::Reader<R>, buffer: &mut StringRecord) -> Result<bool> {
    reader.read_record(buffer).map_err(map_csv_error)
}

fn map_csv_error(err: csv::Error) -> AnalysisError {
    let line = err.position().map(|p| p.line()).unwrap_or(0);
    match err.into_kind() {
        ErrorKind::Io(e) => AnalysisError::Io(e),
        ErrorKind::Utf8 { err, .. } => AnalysisError::MalformedRow {
            line,
            reason: err.to_string(),
        },
        other => AnalysisError::MalformedRow {
            line,
            reason: format!("{other:?}"),
        },
    }
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|f| clean_field(f).is_empty())
}

fn clean_field(raw: &str) -> String {
    raw.trim_matches('"').replace('\\', "")
}

fn check_unique(columns: &[String]) -> Result<()> {
    let mut seen = HashSet::with_capacity(columns.len());
    for col in columns {
        if !seen.insert(col.as_str()) {
            return Err(AnalysisError::DuplicateColumn(col.clone()));
        }
    }
    Ok(())
}
