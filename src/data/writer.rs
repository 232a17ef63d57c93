use std::io::Write;
use std::path::Path;

use log::info;

use super::model::{Dataset, LogFormat, Value};
use crate::error::Result;

/// A column computed after ingest, aligned with the dataset by index.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedColumn {
    pub name: String,
    pub values: Vec<Value>,
}

impl DerivedColumn {
    pub fn new(name: &str, values: Vec<Value>) -> Self {
        DerivedColumn {
            name: name.to_string(),
            values,
        }
    }
}

/// Serialize a dataset in its original row order.
///
/// The header is the dataset's columns followed by the derived columns.
/// Fields holding the separator or a quote are quoted; rows end in `\r\n`
/// like the session logger's own files.
pub fn write_dataset<W: Write>(
    writer: W,
    dataset: &Dataset,
    derived: &[DerivedColumn],
    format: &LogFormat,
) -> Result<()> {
    let mut out = csv::WriterBuilder::new()
        .delimiter(format.delimiter_byte()?)
        .terminator(csv::Terminator::CRLF)
        .from_writer(writer);

    let header = dataset
        .columns()
        .iter()
        .map(String::as_str)
        .chain(derived.iter().map(|d| d.name.as_str()));
    out.write_record(header)?;

    let mut row = Vec::with_capacity(dataset.columns().len() + derived.len());
    for (i, rec) in dataset.records().iter().enumerate() {
        row.clear();
        row.extend(rec.values().iter().map(|v| format.format_value(v)));
        row.extend(derived.iter().map(|d| {
            d.values
                .get(i)
                .map(|v| format.format_value(v))
                .unwrap_or_default()
        }));
        out.write_record(&row)?;
    }
    out.flush()?;
    Ok(())
}

/// Write a dataset to `path`, creating or truncating the file.
pub fn save_file(
    path: &Path,
    dataset: &Dataset,
    derived: &[DerivedColumn],
    format: &LogFormat,
) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_dataset(std::io::BufWriter::new(file), dataset, derived, format)?;
    info!("wrote {} records to {}", dataset.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::parse_str;

    fn render(dataset: &Dataset, derived: &[DerivedColumn], format: &LogFormat) -> String {
        let mut buf = Vec::new();
        write_dataset(&mut buf, dataset, derived, format).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn unmodified_dataset_round_trips() {
        let text = "id,EtPositionX,FixatedObjectName\n0,1.5,\"Door, left\"\n1,-2.0,Wall\n";
        let ds = parse_str(text, &LogFormat::csv()).unwrap();
        let again = parse_str(&render(&ds, &[], &LogFormat::csv()), &LogFormat::csv()).unwrap();
        assert_eq!(again.columns(), ds.columns());
        for (a, b) in ds.records().iter().zip(again.records()) {
            assert_eq!(a.values(), b.values());
        }
    }

    #[test]
    fn derived_columns_follow_input_columns() {
        let ds = parse_str("a\n1\n2\n", &LogFormat::csv()).unwrap();
        let derived = [DerivedColumn::new(
            "intensity",
            vec![Value::Float(0.5), Value::Integer(1)],
        )];
        let out = render(&ds, &derived, &LogFormat::csv());
        assert_eq!(out, "a,intensity\r\n1,0.5\r\n2,1\r\n");
    }

    #[test]
    fn uses_configured_separators() {
        let format = LogFormat {
            field_separator: ';',
            decimal_separator: ',',
        };
        let ds = Dataset::from_rows(
            vec!["x".into(), "y".into()],
            vec![vec![Value::Float(1.25), Value::Integer(3)]],
        );
        let out = render(&ds, &[], &format);
        assert!(out.starts_with("x;y\r\n"));
        assert!(out.contains("1,25"));
        let again = parse_str(&out, &format).unwrap();
        assert_eq!(again.record(0).unwrap().get("x"), Some(&Value::Float(1.25)));
    }
}
