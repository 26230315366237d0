//! Job files: a JSON description of a load → prune → extract → replace → export run

use crate::classifier::EntityClassifier;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::merger::MergeReport;
use crate::session::Session;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// A search/replace step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Replacement {
    /// Text to search for (case-insensitive)
    pub query: String,
    /// Text to put in its place
    pub replacement: String,
    /// Columns to search; the job's columns when empty
    #[serde(default)]
    pub columns: Vec<String>,
    /// Replace in every matching cell instead of only the first
    #[serde(default)]
    pub all: bool,
}

/// A job to run against one input table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFile {
    /// CSV file to load
    pub input: PathBuf,
    /// Where to write the processed table; nothing is written when absent
    #[serde(default)]
    pub output: Option<PathBuf>,
    /// Columns to run entity extraction over; no extraction when empty
    #[serde(default)]
    pub columns: Vec<String>,
    /// Row indices to delete before extraction
    #[serde(default)]
    pub delete_rows: Vec<usize>,
    /// Columns to delete before extraction
    #[serde(default)]
    pub delete_columns: Vec<String>,
    /// Search/replace steps applied after extraction, in order
    #[serde(default)]
    pub replacements: Vec<Replacement>,
}

impl JobFile {
    /// Create a job that only loads `input`
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: None,
            columns: Vec::new(),
            delete_rows: Vec::new(),
            delete_columns: Vec::new(),
            replacements: Vec::new(),
        }
    }

    /// Load a job file from JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Save the job file to JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Run the job on a fresh session
    ///
    /// Returns the session (for inspection) with a report of what happened.
    pub async fn run<C>(&self, classifier: &C, clock: &dyn Clock) -> Result<(Session, JobReport)>
    where
        C: EntityClassifier + ?Sized,
    {
        let mut session = Session::new();
        let mut report = JobReport {
            rows_loaded: session.load_path(&self.input)?,
            ..JobReport::default()
        };

        if !self.delete_rows.is_empty() {
            report.rows_deleted = session.delete_rows(&self.delete_rows);
        }
        if !self.delete_columns.is_empty() {
            report.columns_deleted = session.delete_columns(&self.delete_columns);
        }

        if !self.columns.is_empty() {
            report.merge = Some(session.run_extraction(&self.columns, classifier, clock).await?);
        }

        for step in &self.replacements {
            let columns = if step.columns.is_empty() {
                &self.columns
            } else {
                &step.columns
            };
            session.set_column_selection(columns);
            session.search(&step.query);
            report.cells_replaced += if step.all {
                session.replace_all(&step.replacement)
            } else {
                usize::from(session.replace_current(&step.replacement))
            };
        }
        session.clear_search();

        if let Some(output) = &self.output {
            report.rows_written = Some(session.export_to_path(output)?);
        }

        info!(
            input = %self.input.display(),
            rows = session.processed().row_count(),
            columns = session.processed().column_count(),
            "job finished"
        );
        Ok((session, report))
    }
}

/// What a job run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobReport {
    pub rows_loaded: usize,
    pub rows_deleted: usize,
    pub columns_deleted: Vec<String>,
    pub merge: Option<MergeReport>,
    pub cells_replaced: usize,
    pub rows_written: Option<usize>,
}
