//! Core table types for representing loaded and processed tables

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

/// A table of text cells sharing one ordered schema
///
/// Every row holds exactly one cell per column. Sparse values are empty
/// strings, never missing cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Column definitions, in schema order
    pub columns: Vec<Column>,
    /// Row data
    pub rows: Vec<Row>,
    /// Source file path, if the table was loaded from disk
    pub source_path: Option<PathBuf>,
}

impl Table {
    /// Create a new empty table
    pub fn new(source_path: Option<PathBuf>) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            source_path,
        }
    }

    /// Build a table from a header and records of raw values
    ///
    /// Duplicate header names collapse into the first occurrence, with the
    /// later value winning. Short records are padded with empty cells and
    /// long records are truncated.
    pub fn from_records<H, R>(header: H, records: R) -> Self
    where
        H: IntoIterator,
        H::Item: Into<String>,
        R: IntoIterator,
        R::Item: IntoIterator,
        <R::Item as IntoIterator>::Item: Into<String>,
    {
        let mut columns: Vec<Column> = Vec::new();
        let mut slots: Vec<usize> = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::new();

        for name in header {
            let name: String = name.into();
            let slot = match seen.get(&name) {
                Some(&idx) => idx,
                None => {
                    let idx = columns.len();
                    seen.insert(name.clone(), idx);
                    columns.push(Column::new(name, idx));
                    idx
                }
            };
            slots.push(slot);
        }

        let rows = records
            .into_iter()
            .map(|record| {
                let mut cells = vec![String::new(); columns.len()];
                for (value, &slot) in record.into_iter().zip(slots.iter()) {
                    cells[slot] = value.into();
                }
                Row::new(cells)
            })
            .collect();

        Self {
            columns,
            rows,
            source_path: None,
        }
    }

    /// Get the number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// True when the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Find a column by name
    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Position of a column in the schema
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.find_column(name).map(|c| c.index)
    }

    /// Column names in schema order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Get a cell by row index and column name
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// Append a column, giving every row an empty value for it
    ///
    /// Returns the index of the column. Appending a name that already exists
    /// is a no-op that returns the existing index.
    pub(crate) fn push_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column_index(name) {
            return idx;
        }
        let idx = self.columns.len();
        self.columns.push(Column::new(name.to_string(), idx));
        for row in &mut self.rows {
            row.cells.push(String::new());
        }
        idx
    }

    /// Substitute the row at `index`, returning false when out of bounds
    pub(crate) fn replace_row(&mut self, index: usize, row: Row) -> bool {
        match self.rows.get_mut(index) {
            Some(slot) => {
                *slot = row;
                true
            }
            None => false,
        }
    }

    /// Remove rows by index; indices outside the table are ignored
    ///
    /// Returns the number of rows removed.
    pub fn remove_rows(&mut self, indices: &BTreeSet<usize>) -> usize {
        let before = self.rows.len();
        let mut idx = 0;
        self.rows.retain(|_| {
            let keep = !indices.contains(&idx);
            idx += 1;
            keep
        });
        before - self.rows.len()
    }

    /// Remove columns by name from the schema and every row
    ///
    /// Returns the names that were actually present.
    pub fn remove_columns<S: AsRef<str>>(&mut self, names: &[S]) -> Vec<String> {
        let doomed: Vec<usize> = self
            .columns
            .iter()
            .filter(|c| names.iter().any(|n| n.as_ref() == c.name))
            .map(|c| c.index)
            .collect();

        if doomed.is_empty() {
            return Vec::new();
        }

        let removed: Vec<String> = doomed
            .iter()
            .map(|&i| self.columns[i].name.clone())
            .collect();

        for row in &mut self.rows {
            let mut idx = 0;
            row.cells.retain(|_| {
                let keep = !doomed.contains(&idx);
                idx += 1;
                keep
            });
        }

        self.columns.retain(|c| !doomed.contains(&c.index));
        for (i, col) in self.columns.iter_mut().enumerate() {
            col.index = i;
        }

        removed
    }
}

/// A column definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Column index (0-based)
    pub index: usize,
}

impl Column {
    /// Create a new column
    pub fn new(name: String, index: usize) -> Self {
        Self { name, index }
    }
}

/// A row of data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Cell values, aligned with the table's columns
    pub cells: Vec<String>,
    /// Entities found by the most recent extraction pass
    #[serde(default)]
    pub entities: Vec<DetectedEntity>,
}

impl Row {
    /// Create a new row with no detected entities
    pub fn new(cells: Vec<String>) -> Self {
        Self {
            cells,
            entities: Vec::new(),
        }
    }

    /// Get a cell value by column index
    pub fn get(&self, index: usize) -> Option<&str> {
        self.cells.get(index).map(String::as_str)
    }

    /// Copy of this row with one cell replaced
    pub fn with_cell(&self, index: usize, value: impl Into<String>) -> Row {
        let mut row = self.clone();
        if let Some(cell) = row.cells.get_mut(index) {
            *cell = value.into();
        }
        row
    }
}

/// An entity found in a row's text, after type normalization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedEntity {
    /// Type tag, also the name of the derived column (e.g. "Date-Time")
    pub kind: String,
    /// Normalized entity text
    pub text: String,
}

impl DetectedEntity {
    /// Create a new detected entity
    pub fn new(kind: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_records(
            ["name", "note", "city"],
            vec![
                vec!["Alice", "call tomorrow", "Oslo"],
                vec!["Bob", "no info", "Rome"],
                vec!["Carol", "hi", "Lima"],
            ],
        )
    }

    #[test]
    fn test_from_records_pads_short_rows() {
        let table = Table::from_records(["a", "b", "c"], vec![vec!["1"]]);
        assert_eq!(table.rows[0].cells, vec!["1", "", ""]);
    }

    #[test]
    fn test_from_records_duplicate_header() {
        let table = Table::from_records(["a", "b", "a"], vec![vec!["1", "2", "3"]]);
        assert_eq!(table.column_names(), vec!["a", "b"]);
        assert_eq!(table.cell(0, "a"), Some("3"));
    }

    #[test]
    fn test_cell_lookup() {
        let table = sample();
        assert_eq!(table.cell(1, "note"), Some("no info"));
        assert_eq!(table.cell(1, "missing"), None);
        assert_eq!(table.cell(9, "note"), None);
    }

    #[test]
    fn test_remove_rows_ignores_out_of_bounds() {
        let mut table = sample();
        let removed = table.remove_rows(&BTreeSet::from([0, 2, 42]));
        assert_eq!(removed, 2);
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.cell(0, "name"), Some("Bob"));
    }

    #[test]
    fn test_remove_columns_reindexes() {
        let mut table = sample();
        let removed = table.remove_columns(&["note", "nope"]);
        assert_eq!(removed, vec!["note".to_string()]);
        assert_eq!(table.column_names(), vec!["name", "city"]);
        assert_eq!(table.columns[1].index, 1);
        assert_eq!(table.cell(2, "city"), Some("Lima"));
        assert!(table.rows.iter().all(|r| r.cells.len() == 2));
    }

    #[test]
    fn test_push_column_is_uniform_and_idempotent() {
        let mut table = sample();
        let idx = table.push_column("Email");
        assert_eq!(idx, 3);
        assert_eq!(table.push_column("Email"), 3);
        assert!(table.rows.iter().all(|r| r.cells.len() == 4));
        assert_eq!(table.cell(0, "Email"), Some(""));
    }

    #[test]
    fn test_with_cell_leaves_original() {
        let table = sample();
        let row = table.rows[0].with_cell(1, "changed");
        assert_eq!(row.get(1), Some("changed"));
        assert_eq!(table.rows[0].get(1), Some("call tomorrow"));
    }
}
