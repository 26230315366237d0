//! CSV export of a processed table

use crate::error::{Error, Result};
use crate::table::Table;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Write a table as CSV to any writer
///
/// The header is the union of every row's keys at export time, which for a
/// uniform table is its schema in column order.
pub fn write_csv<W: Write>(table: &Table, writer: W) -> Result<()> {
    if table.is_empty() {
        return Err(Error::ExportTarget("table has no rows".to_string()));
    }

    let mut csv_writer = csv::WriterBuilder::new().from_writer(writer);

    csv_writer.write_record(table.column_names())?;
    for row in &table.rows {
        csv_writer.write_record(&row.cells)?;
    }
    csv_writer.flush()?;

    Ok(())
}

/// Export a table to a CSV file, truncating any existing content
///
/// A failure mid-write can leave a partially written file behind.
pub fn export_csv<P: AsRef<Path>>(table: &Table, path: P) -> Result<usize> {
    let path = path.as_ref();
    if table.is_empty() {
        return Err(Error::ExportTarget("table has no rows".to_string()));
    }

    let file = File::create(path)?;
    write_csv(table, BufWriter::new(file))?;

    info!(path = %path.display(), rows = table.row_count(), "exported table");
    Ok(table.row_count())
}

/// Render a table as a CSV string
pub fn to_csv_string(table: &Table) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(table, &mut buf)?;
    String::from_utf8(buf).map_err(|e| Error::ExportTarget(e.to_string()))
}
