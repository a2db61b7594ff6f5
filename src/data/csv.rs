// CSV record source implementation
// Author: Gabriel Demetrios Lafis

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::{DataError, DataSource, Record, RecordSet, Value};

/// CSV record source
///
/// The header row names the fields. Cells are typed by inference: integers,
/// floats and `true`/`false` become numbers and booleans, empty cells become
/// null, everything else stays a string.
pub struct CsvSource {
    path: String,
    delimiter: char,
}

impl CsvSource {
    /// Create a new CSV source
    pub fn new<P: AsRef<Path>>(path: P, delimiter: char) -> Self {
        CsvSource {
            path: path.as_ref().to_string_lossy().to_string(),
            delimiter,
        }
    }

    fn infer_value(cell: &str) -> Value {
        if cell.is_empty() {
            return Value::Null;
        }

        if let Ok(i) = cell.parse::<i64>() {
            return Value::Integer(i);
        }

        if let Ok(f) = cell.parse::<f64>() {
            if f.is_finite() {
                return Value::Float(f);
            }
        }

        match cell {
            "true" => Value::Boolean(true),
            "false" => Value::Boolean(false),
            _ => Value::String(cell.to_string()),
        }
    }
}

impl DataSource for CsvSource {
    fn read(&self) -> Result<RecordSet, DataError> {
        let file = File::open(&self.path)?;

        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter as u8)
            .has_headers(true)
            .from_reader(BufReader::new(file));

        let headers: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|s| s.to_string())
            .collect();

        let mut records = Vec::new();

        for result in csv_reader.records() {
            let row = result?;

            let record: Record = headers
                .iter()
                .zip(row.iter())
                .map(|(name, cell)| (name.clone(), Self::infer_value(cell)))
                .collect();

            records.push(record);
        }

        Ok(records)
    }

    fn name(&self) -> &str {
        &self.path
    }
}

/// Read records from a comma-separated file with a header row
pub fn read_csv_records<P: AsRef<Path>>(path: P) -> Result<RecordSet, DataError> {
    CsvSource::new(path, ',').read()
}
