//! CSV parser for loading delimited tables
//!
//! The first record is the header. Any later record whose field count
//! differs from the header's is dropped; there is no partial recovery.
//! Bytes that are not valid UTF-8 are decoded lossily, so one stray byte
//! costs a character rather than the whole table.

use crate::error::{Error, Result};
use crate::table::Table;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Parse a CSV file into a Table
pub fn parse_csv<P: AsRef<Path>>(path: P) -> Result<Table> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut table = read_table(BufReader::new(file), path)?;
    table.source_path = Some(path.to_path_buf());
    Ok(table)
}

/// Parse CSV from a string (useful for testing)
pub fn parse_csv_str(content: &str, source_name: &str) -> Result<Table> {
    read_table(content.as_bytes(), Path::new(source_name))
}

fn read_table<R: Read>(reader: R, path: &Path) -> Result<Table> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true) // shape is checked per record below
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = csv_reader.byte_records();

    let header: Vec<String> = match records.next() {
        Some(result) => decode_record(&result.map_err(|e| csv_error(path, e))?),
        None => {
            debug!(path = %path.display(), "empty source, loading empty table");
            return Ok(Table::new(None));
        }
    };

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut dropped = 0usize;

    for (row_idx, result) in records.enumerate() {
        let record = result.map_err(|e| csv_error(path, e))?;

        if record.len() != header.len() {
            debug!(
                row = row_idx + 1,
                fields = record.len(),
                expected = header.len(),
                "dropping row with mismatched field count"
            );
            dropped += 1;
            continue;
        }

        rows.push(decode_record(&record));
    }

    info!(
        path = %path.display(),
        rows = rows.len(),
        columns = header.len(),
        dropped,
        "parsed table"
    );

    Ok(Table::from_records(header, rows))
}

fn decode_record(record: &csv::ByteRecord) -> Vec<String> {
    record
        .iter()
        .map(|field| String::from_utf8_lossy(field).trim().to_string())
        .collect()
}

fn csv_error(path: &Path, source: csv::Error) -> Error {
    Error::Csv {
        path: PathBuf::from(path),
        source,
    }
}
