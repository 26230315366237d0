//! Schema merger: grows a table with derived columns from detected entities

use crate::error::{Error, Result};
use crate::table::{DetectedEntity, Table};
use std::collections::HashSet;
use tracing::info;

/// Summary of a merge
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Derived columns appended by this merge, in order
    pub added_columns: Vec<String>,
    /// Number of rows that had at least one entity
    pub rows_with_entities: usize,
}

/// Merge per-row entity lists into a table as derived columns
///
/// `detected` must hold one list per row, in row order. Entity types become
/// columns in first-seen order across all rows; every row gets every new
/// column (empty when it has no entity of that type). Within a row, a later
/// entity of the same type overwrites an earlier one.
///
/// Before new values are written, a row's cells are cleared for every type
/// seen in this merge and for every type the row held from a previous merge,
/// so a rerun never leaves a value the classifier no longer reports.
///
/// The input table is never modified. Rerunning with the same input yields
/// the same table.
pub fn merge_entities(table: &Table, detected: &[Vec<DetectedEntity>]) -> Result<(Table, MergeReport)> {
    if table.row_count() != detected.len() {
        return Err(Error::EntityCountMismatch {
            rows: table.row_count(),
            lists: detected.len(),
        });
    }

    // Distinct entity types, first occurrence order
    let mut kinds: Vec<&str> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for entities in detected {
        for entity in entities {
            if seen.insert(entity.kind.as_str()) {
                kinds.push(entity.kind.as_str());
            }
        }
    }

    let mut merged = table.clone();
    let mut report = MergeReport::default();

    for &kind in &kinds {
        if merged.find_column(kind).is_none() {
            merged.push_column(kind);
            report.added_columns.push(kind.to_string());
        }
    }
    let observed: Vec<usize> = kinds.iter().filter_map(|k| merged.column_index(k)).collect();

    for (row_idx, entities) in detected.iter().enumerate() {
        let mut row = merged.rows[row_idx].clone();
        let previous = row
            .entities
            .iter()
            .filter_map(|e| merged.column_index(&e.kind));
        for col in observed.iter().copied().chain(previous) {
            row.cells[col].clear();
        }
        for entity in entities {
            if let Some(col) = merged.column_index(&entity.kind) {
                row.cells[col] = entity.text.clone();
            }
        }
        row.entities = entities.clone();
        merged.replace_row(row_idx, row);

        if !entities.is_empty() {
            report.rows_with_entities += 1;
        }
    }

    info!(
        added = ?report.added_columns,
        rows_with_entities = report.rows_with_entities,
        "merged detected entities"
    );

    Ok((merged, report))
}
