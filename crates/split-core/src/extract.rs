//! Sequential entity extraction over the selected columns of a table
//!
//! Rows are classified one at a time, in order, with at most one
//! classification call outstanding. A failing row gets an empty entity
//! list; only a failing `init` aborts the batch.

use crate::classifier::{EntityClassifier, EntityKind, RawEntity};
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::table::{DetectedEntity, Table};
use chrono::{Days, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

/// Date format used for resolved relative dates
pub const DATE_FORMAT: &str = "%d-%m-%Y";

static PHONE_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9][0-9\-()\s]{7,}$").unwrap());

impl EntityKind {
    /// Column tag for a kind the pipeline keeps, `None` for dropped kinds
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            EntityKind::Address => Some("Address"),
            EntityKind::DateTime => Some("Date-Time"),
            EntityKind::Email => Some("Email"),
            EntityKind::Phone => Some("Phone"),
            EntityKind::PaymentCard => Some("Card"),
            EntityKind::TrackingNumber => Some("Tracking"),
            EntityKind::Url => Some("URL"),
            EntityKind::Money => Some("Money"),
            EntityKind::FlightNumber => Some("Flight"),
            EntityKind::Iban => Some("IBAN"),
            EntityKind::Isbn => Some("ISBN-13"),
            EntityKind::Other(_) => None,
        }
    }
}

/// Text submitted for one row: selected cells joined by spaces, `-` as space
pub fn row_text<S: AsRef<str>>(table: &Table, row: usize, columns: &[S]) -> String {
    columns
        .iter()
        .map(|col| table.cell(row, col.as_ref()).unwrap_or(""))
        .collect::<Vec<_>>()
        .join(" ")
        .replace('-', " ")
}

/// Texts for every row of the table, in row order
pub fn row_texts<S: AsRef<str>>(table: &Table, columns: &[S]) -> Vec<String> {
    (0..table.row_count())
        .map(|row| row_text(table, row, columns))
        .collect()
}

/// Phone candidates need ten digits and a phone-like shape
pub fn is_likely_phone(text: &str) -> bool {
    let digits = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .filter(char::is_ascii_digit)
        .count();
    digits >= 10 && PHONE_SHAPE.is_match(text)
}

/// Resolve "today" / "tomorrow" to a `dd-mm-yyyy` date, else keep the text
pub fn resolve_date_time(text: &str, today: NaiveDate) -> String {
    let lower = text.to_lowercase();
    if lower.contains("tomorrow") {
        match today.checked_add_days(Days::new(1)) {
            Some(date) => date.format(DATE_FORMAT).to_string(),
            None => text.to_string(),
        }
    } else if lower.contains("today") {
        today.format(DATE_FORMAT).to_string()
    } else {
        text.to_string()
    }
}

/// Apply the type policy to one raw entity
pub fn normalize(raw: RawEntity, today: NaiveDate) -> Option<DetectedEntity> {
    let tag = raw.kind.tag()?;
    match raw.kind {
        EntityKind::Phone if !is_likely_phone(&raw.text) => None,
        EntityKind::DateTime => Some(DetectedEntity::new(tag, resolve_date_time(&raw.text, today))),
        _ => Some(DetectedEntity::new(tag, raw.text)),
    }
}

/// Classify every text in order, isolating per-row failures
///
/// Returns one entity list per input text. Fails only when the classifier
/// cannot be initialised, in which case nothing was classified.
pub async fn extract_entities<C>(
    classifier: &C,
    texts: &[String],
    clock: &dyn Clock,
) -> Result<Vec<Vec<DetectedEntity>>>
where
    C: EntityClassifier + ?Sized,
{
    classifier
        .init()
        .await
        .map_err(|e| Error::ClassifierInit(e.to_string()))?;

    let today = clock.today();
    let mut results = Vec::with_capacity(texts.len());
    let mut failed = 0usize;

    for (row, text) in texts.iter().enumerate() {
        let entities: Vec<DetectedEntity> = match classifier.classify(text).await {
            Ok(raw) => raw
                .into_iter()
                .filter_map(|entity| normalize(entity, today))
                .collect(),
            Err(e) => {
                warn!(row, error = %e, "classification failed, row left without entities");
                failed += 1;
                Vec::new()
            }
        };
        debug!(row, found = entities.len(), "classified row");
        results.push(entities);
    }

    info!(rows = texts.len(), failed, "extraction finished");
    Ok(results)
}

/// Snapshot of what to classify, detached from the session that made it
#[derive(Debug, Clone)]
pub struct ExtractionJob {
    /// Table revision the texts were read from
    pub revision: u64,
    /// Identifies this job among the ones a session has started
    pub ticket: u64,
    /// Columns whose text was submitted
    pub columns: Vec<String>,
    /// One text per row
    pub texts: Vec<String>,
}

impl ExtractionJob {
    /// Build a job from the current table
    pub fn new(table: &Table, columns: &[String], revision: u64, ticket: u64) -> Self {
        Self {
            revision,
            ticket,
            columns: columns.to_vec(),
            texts: row_texts(table, columns),
        }
    }

    /// Run the job against a classifier
    pub async fn run<C>(&self, classifier: &C, clock: &dyn Clock) -> Result<ExtractionOutcome>
    where
        C: EntityClassifier + ?Sized,
    {
        let entities = extract_entities(classifier, &self.texts, clock).await?;
        Ok(ExtractionOutcome {
            revision: self.revision,
            ticket: self.ticket,
            entities,
        })
    }
}

/// Entities produced by a finished job
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    /// Revision of the job that produced these entities
    pub revision: u64,
    /// Ticket of the job that produced these entities
    pub ticket: u64,
    /// One list per row, in row order
    pub entities: Vec<Vec<DetectedEntity>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn clock() -> FixedClock {
        FixedClock(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap())
    }

    /// Replays scripted results and records what it was asked
    struct ScriptedClassifier {
        init_ok: bool,
        script: Vec<Result<Vec<RawEntity>>>,
        calls: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    impl ScriptedClassifier {
        fn new(script: Vec<Result<Vec<RawEntity>>>) -> Self {
            Self {
                init_ok: true,
                script,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl EntityClassifier for ScriptedClassifier {
        async fn init(&self) -> Result<()> {
            if self.init_ok {
                Ok(())
            } else {
                Err(Error::Classifier("model unavailable".to_string()))
            }
        }

        async fn classify(&self, text: &str) -> Result<Vec<RawEntity>> {
            let idx = self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(text.to_string());
            match self.script.get(idx) {
                Some(Ok(found)) => Ok(found.clone()),
                Some(Err(e)) => Err(Error::Classifier(e.to_string())),
                None => Ok(Vec::new()),
            }
        }
    }

    #[test]
    fn test_phone_validation() {
        assert!(!is_likely_phone("123"));
        assert!(is_likely_phone("+1 (555) 123-4567"));
        assert!(!is_likely_phone("555 1234"));
        assert!(!is_likely_phone("12345678901x"));
    }

    #[test]
    fn test_date_resolution() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        assert_eq!(resolve_date_time("see you tomorrow", today), "11-01-2024");
        assert_eq!(resolve_date_time("meeting today", today), "10-01-2024");
        assert_eq!(resolve_date_time("March 3rd", today), "March 3rd");
        assert_eq!(resolve_date_time("TOMORROW", today), "11-01-2024");
    }

    #[test]
    fn test_date_resolution_crosses_year() {
        let eve = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        assert_eq!(resolve_date_time("tomorrow", eve), "01-01-2024");
    }

    #[test]
    fn test_normalize_policy() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();

        let isbn = normalize(RawEntity::new(EntityKind::Isbn, "123"), today).unwrap();
        assert_eq!(isbn, DetectedEntity::new("ISBN-13", "123"));

        let card = normalize(RawEntity::new(EntityKind::PaymentCard, "4111 1111"), today).unwrap();
        assert_eq!(card, DetectedEntity::new("Card", "4111 1111"));

        assert!(normalize(RawEntity::new(EntityKind::Phone, "123"), today).is_none());
        assert!(normalize(RawEntity::new(EntityKind::Other("person".into()), "Bob"), today).is_none());
    }

    #[test]
    fn test_row_text_joins_and_replaces_dashes() {
        let table = Table::from_records(
            ["a", "b", "c"],
            vec![vec!["call 555-123-4567", "x", "re-do"]],
        );
        let cols = vec!["a".to_string(), "missing".to_string(), "c".to_string()];
        assert_eq!(row_text(&table, 0, &cols), "call 555 123 4567  re do");
    }

    #[tokio::test]
    async fn test_extract_isolates_row_failures() {
        let classifier = ScriptedClassifier::new(vec![
            Ok(vec![RawEntity::new(EntityKind::Email, "a@b.co")]),
            Err(Error::Classifier("boom".into())),
            Ok(vec![RawEntity::new(EntityKind::DateTime, "today")]),
        ]);
        let texts = vec!["one".to_string(), "two".to_string(), "three".to_string()];

        let result = extract_entities(&classifier, &texts, &clock()).await.unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(result[0], vec![DetectedEntity::new("Email", "a@b.co")]);
        assert!(result[1].is_empty());
        assert_eq!(result[2], vec![DetectedEntity::new("Date-Time", "10-01-2024")]);
        assert_eq!(*classifier.seen.lock().unwrap(), texts);
    }

    #[tokio::test]
    async fn test_extract_init_failure_aborts() {
        let mut classifier = ScriptedClassifier::new(vec![]);
        classifier.init_ok = false;
        let texts = vec!["one".to_string()];

        let result = extract_entities(&classifier, &texts, &clock()).await;

        assert!(matches!(result, Err(Error::ClassifierInit(_))));
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_job_carries_revision() {
        let table = Table::from_records(["note"], vec![vec!["call tomorrow"]]);
        let job = ExtractionJob::new(&table, &["note".to_string()], 7, 3);
        let classifier = ScriptedClassifier::new(vec![Ok(vec![RawEntity::new(
            EntityKind::DateTime,
            "tomorrow",
        )])]);

        let outcome = job.run(&classifier, &clock()).await.unwrap();

        assert_eq!(outcome.revision, 7);
        assert_eq!(outcome.ticket, 3);
        assert_eq!(outcome.entities[0], vec![DetectedEntity::new("Date-Time", "11-01-2024")]);
    }
}
