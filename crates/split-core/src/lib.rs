//! split-core: Core library for extracting entities from delimited tables
//!
//! This library provides functionality to:
//! - Parse CSV files into tables with a shared, ordered schema
//! - Run an entity classifier over selected columns, one row at a time
//! - Merge detected entities back into the table as derived columns
//! - Search, navigate and replace matches over selected columns
//! - Delete rows and columns while keeping selection and search state valid
//! - Export the processed table back to CSV

pub mod classifier;
pub mod clock;
pub mod error;
pub mod extract;
pub mod job;
pub mod merger;
pub mod parser;
pub mod search;
pub mod session;
pub mod table;
pub mod writer;

pub use classifier::{EntityClassifier, EntityKind, PatternClassifier, RawEntity};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{Error, Result};
pub use extract::{extract_entities, ExtractionJob, ExtractionOutcome};
pub use job::{JobFile, JobReport, Replacement};
pub use merger::{merge_entities, MergeReport};
pub use parser::{parse_csv, parse_csv_str};
pub use search::{Match, SearchState};
pub use session::{Selection, Session};
pub use table::{Column, DetectedEntity, Row, Table};
pub use writer::{export_csv, to_csv_string, write_csv};
