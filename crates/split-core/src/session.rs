//! Session: owns the raw and processed tables plus selection and search state
//!
//! All mutation goes through a `Session`. Structural changes (load, row or
//! column removal) invalidate the state that refers to rows or columns, and
//! bump the processed table's revision so that an extraction started before
//! the change cannot be merged into the changed table.

use crate::classifier::EntityClassifier;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::extract::{ExtractionJob, ExtractionOutcome};
use crate::merger::{merge_entities, MergeReport};
use crate::parser::parse_csv;
use crate::search::{Match, SearchState};
use crate::table::Table;
use crate::writer::{export_csv, write_csv};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

/// Row and column selection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    rows: BTreeSet<usize>,
    columns: Vec<String>,
}

impl Selection {
    /// Selected row indices, ascending
    pub fn rows(&self) -> &BTreeSet<usize> {
        &self.rows
    }

    /// Selected columns, in selection order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Add the row if absent, remove it if present
    pub fn toggle_row(&mut self, index: usize) {
        if !self.rows.remove(&index) {
            self.rows.insert(index);
        }
    }

    /// Deselect every row
    pub fn clear_rows(&mut self) {
        self.rows.clear();
    }

    /// Replace the column selection; duplicate names keep their first position
    pub fn set_columns<S: AsRef<str>>(&mut self, names: &[S]) {
        self.columns.clear();
        for name in names {
            let name = name.as_ref();
            if !self.columns.iter().any(|c| c == name) {
                self.columns.push(name.to_string());
            }
        }
    }

    /// Deselect every column
    pub fn clear_columns(&mut self) {
        self.columns.clear();
    }
}

/// The table store and its coordinator
#[derive(Debug, Default)]
pub struct Session {
    raw: Table,
    processed: Table,
    selection: Selection,
    search: SearchState,
    revision: u64,
    /// Ticket of the pending extraction job
    pending: Option<u64>,
    last_ticket: u64,
}

/// Releases the pending flag if an extraction future is dropped early
struct PendingGuard<'a> {
    session: &'a mut Session,
    ticket: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.session.pending == Some(self.ticket) {
            self.session.pending = None;
        }
    }
}

impl Session {
    /// Create an empty session
    pub fn new() -> Self {
        Self::default()
    }

    /// Table as loaded, minus deleted rows and columns
    pub fn raw(&self) -> &Table {
        &self.raw
    }

    /// Working table: extraction results and replacements live here
    pub fn processed(&self) -> &Table {
        &self.processed
    }

    /// Current row and column selection
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Current query, matches and cursor
    pub fn search_state(&self) -> &SearchState {
        &self.search
    }

    /// Revision of the processed table; bumped on every mutation
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// True while an extraction job is pending
    pub fn is_extracting(&self) -> bool {
        self.pending.is_some()
    }

    fn bump(&mut self) {
        self.revision += 1;
    }

    // ---------------------------------------------------------------------
    // Table store
    // ---------------------------------------------------------------------

    /// Replace both tables with `table`; clears selection, search and any
    /// pending extraction
    pub fn load(&mut self, table: Table) {
        info!(
            rows = table.row_count(),
            columns = table.column_count(),
            "loaded table"
        );
        self.raw = table.clone();
        self.processed = table;
        self.selection = Selection::default();
        self.search.clear();
        self.pending = None;
        self.bump();
    }

    /// Load a CSV file
    ///
    /// An unreadable source leaves the session with an empty table, and the
    /// error is returned for reporting.
    pub fn load_path<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        match parse_csv(path.as_ref()) {
            Ok(table) => {
                let rows = table.row_count();
                self.load(table);
                Ok(rows)
            }
            Err(e) => {
                warn!(path = %path.as_ref().display(), error = %e, "source unreadable, loading empty table");
                self.load(Table::new(Some(path.as_ref().to_path_buf())));
                Err(e)
            }
        }
    }

    /// Write the processed table as CSV
    pub fn export_to<W: Write>(&self, writer: W) -> Result<()> {
        write_csv(&self.processed, writer)
    }

    /// Write the processed table to a CSV file
    pub fn export_to_path<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        export_csv(&self.processed, path)
    }

    /// Delete rows from both tables; out-of-range indices are ignored
    ///
    /// The row selection is cleared afterwards. Returns the number of rows
    /// removed.
    pub fn delete_rows(&mut self, indices: &[usize]) -> usize {
        let indices: BTreeSet<usize> = indices.iter().copied().collect();
        self.raw.remove_rows(&indices);
        let removed = self.processed.remove_rows(&indices);

        self.selection.clear_rows();
        self.search.clear();
        self.bump();

        info!(removed, "deleted rows");
        removed
    }

    /// Delete the currently selected rows
    pub fn delete_selected_rows(&mut self) -> usize {
        let indices: Vec<usize> = self.selection.rows().iter().copied().collect();
        self.delete_rows(&indices)
    }

    /// Delete columns from both tables, then clear the column selection
    pub fn delete_columns<S: AsRef<str>>(&mut self, names: &[S]) -> Vec<String> {
        self.raw.remove_columns(names);
        let removed = self.processed.remove_columns(names);

        self.selection.columns.retain(|c| !names.iter().any(|n| c == n.as_ref()));
        self.selection.clear_columns();
        self.search.clear();
        self.bump();

        info!(removed = ?removed, "deleted columns");
        removed
    }

    // ---------------------------------------------------------------------
    // Selection
    // ---------------------------------------------------------------------

    /// Replace the column selection
    pub fn set_column_selection<S: AsRef<str>>(&mut self, names: &[S]) {
        self.selection.set_columns(names);
    }

    /// Add the row to the selection, or remove it if already selected
    pub fn toggle_row(&mut self, index: usize) {
        self.selection.toggle_row(index);
    }

    /// Deselect every row
    pub fn clear_row_selection(&mut self) {
        self.selection.clear_rows();
    }

    // ---------------------------------------------------------------------
    // Extraction
    // ---------------------------------------------------------------------

    /// Select `columns` and snapshot the texts to classify
    ///
    /// Fails if a job is already pending, or if there is nothing to
    /// classify.
    pub fn begin_extraction<S: AsRef<str>>(&mut self, columns: &[S]) -> Result<ExtractionJob> {
        if self.pending.is_some() {
            return Err(Error::ExtractionInProgress);
        }
        self.selection.set_columns(columns);
        if self.processed.is_empty() {
            return Err(Error::NothingSelected("table has no rows".to_string()));
        }
        if self.selection.columns.is_empty() {
            return Err(Error::NothingSelected("no columns selected".to_string()));
        }

        self.last_ticket += 1;
        let job = ExtractionJob::new(
            &self.processed,
            &self.selection.columns,
            self.revision,
            self.last_ticket,
        );
        self.pending = Some(job.ticket);
        Ok(job)
    }

    /// Merge a finished job into the processed table
    ///
    /// The outcome must belong to the pending job, or `UnknownExtraction` is
    /// returned and the pending job keeps running. It must also come from
    /// this session's current revision; otherwise the table is left as is
    /// and `StaleExtraction` is returned.
    pub fn finish_extraction(&mut self, outcome: ExtractionOutcome) -> Result<MergeReport> {
        if self.pending != Some(outcome.ticket) {
            warn!(
                ticket = outcome.ticket,
                pending = ?self.pending,
                "ignoring result of an unknown job"
            );
            return Err(Error::UnknownExtraction {
                ticket: outcome.ticket,
            });
        }
        self.pending = None;

        if outcome.revision != self.revision {
            warn!(
                expected = outcome.revision,
                found = self.revision,
                "discarding extraction for a changed table"
            );
            return Err(Error::StaleExtraction {
                expected: outcome.revision,
                found: self.revision,
            });
        }

        let (merged, report) = merge_entities(&self.processed, &outcome.entities)?;
        self.processed = merged;
        self.search.clear();
        self.bump();
        Ok(report)
    }

    /// Drop a pending job without touching the table
    pub fn abandon_extraction(&mut self) {
        self.pending = None;
    }

    /// Classify the selected columns of every row and merge the results
    ///
    /// If the classifier fails to initialise the processed table is left
    /// unchanged and the error is returned. Dropping the future before it
    /// completes abandons the job.
    pub async fn run_extraction<S, C>(
        &mut self,
        columns: &[S],
        classifier: &C,
        clock: &dyn Clock,
    ) -> Result<MergeReport>
    where
        S: AsRef<str>,
        C: EntityClassifier + ?Sized,
    {
        let job = self.begin_extraction(columns)?;
        let guard = PendingGuard {
            session: self,
            ticket: job.ticket,
        };
        let result = job.run(classifier, clock).await;
        match result {
            Ok(outcome) => guard.session.finish_extraction(outcome),
            Err(e) => {
                warn!(error = %e, "extraction aborted, table unchanged");
                guard.session.abandon_extraction();
                Err(e)
            }
        }
    }

    // ---------------------------------------------------------------------
    // Search
    // ---------------------------------------------------------------------

    /// Search the selected columns of the processed table
    pub fn search(&mut self, query: &str) -> usize {
        self.search
            .search(&self.processed, &self.selection.columns, query)
    }

    /// Advance the cursor, wrapping after the last match
    pub fn next_match(&mut self) -> Option<&Match> {
        self.search.next()
    }

    /// Move the cursor back, wrapping before the first match
    pub fn previous_match(&mut self) -> Option<&Match> {
        self.search.previous()
    }

    /// Match under the cursor
    pub fn current_match(&self) -> Option<&Match> {
        self.search.current()
    }

    /// Replace the query in the current match's cell and rescan
    pub fn replace_current(&mut self, replacement: &str) -> bool {
        let changed =
            self.search
                .replace_current(&mut self.processed, &self.selection.columns, replacement);
        if changed {
            self.bump();
        }
        changed
    }

    /// Replace the query in every matched cell and rescan
    pub fn replace_all(&mut self, replacement: &str) -> usize {
        let changed =
            self.search
                .replace_all(&mut self.processed, &self.selection.columns, replacement);
        if changed > 0 {
            self.bump();
        }
        changed
    }

    /// Drop the query and its matches
    pub fn clear_search(&mut self) {
        self.search.clear();
    }
}
