//! Entity classifier seam and a built-in pattern based classifier
//!
//! The extraction pipeline only talks to [`EntityClassifier`]. Any
//! recognizer (a local model, a remote service) can sit behind it;
//! [`PatternClassifier`] is a regex recognizer that needs no setup.

use crate::error::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

/// Raw entity type as reported by a classifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Address,
    DateTime,
    Email,
    FlightNumber,
    Iban,
    Isbn,
    Money,
    PaymentCard,
    Phone,
    TrackingNumber,
    Url,
    /// Any type the pipeline does not handle
    Other(String),
}

/// One typed span found by a classifier, before normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntity {
    pub kind: EntityKind,
    pub text: String,
}

impl RawEntity {
    pub fn new(kind: EntityKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// External capability mapping text to typed spans
#[async_trait]
pub trait EntityClassifier: Send + Sync {
    /// One-time setup (model download, connection). Called once per batch.
    async fn init(&self) -> Result<()>;

    /// Find entities in a piece of text
    async fn classify(&self, text: &str) -> Result<Vec<RawEntity>>;
}

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9._%+]+@[A-Za-z0-9.]+\.[A-Za-z]{2,}").unwrap());

static URL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:https?://|www\.)[^\s,;]+").unwrap());

static IBAN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z]{2}[0-9]{2}[A-Z0-9]{11,30}\b").unwrap());

static ISBN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bisbn(?: ?1[03])?:?\s*[0-9][0-9 ]{8,15}[0-9x]\b").unwrap());

static MONEY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)[$€£]\s?[0-9]+(?:[.,][0-9]{2})?|\b[0-9]+(?:[.,][0-9]{2})?\s?(?:usd|eur|gbp|dollars|euros)\b",
    )
    .unwrap()
});

static DATE_TIME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:today|tomorrow|tonight|yesterday|(?:mon|tues|wednes|thurs|fri|satur|sun)day|[0-9]{1,2}[/.][0-9]{1,2}[/.][0-9]{2,4}|[0-9]{4}[/.][0-9]{1,2}[/.][0-9]{1,2}|(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.? [0-9]{1,2}(?:st|nd|rd|th)?)\b",
    )
    .unwrap()
});

static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\+?\(?[0-9][0-9\s()]{6,}[0-9]").unwrap());

/// Regex recognizer for common entity types
///
/// Patterns are tried in priority order; a span that overlaps one already
/// claimed by a higher priority pattern is skipped. Results come back in
/// text order.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternClassifier;

impl PatternClassifier {
    pub fn new() -> Self {
        Self
    }

    fn scan(&self, text: &str) -> Vec<RawEntity> {
        let patterns: [(&Lazy<Regex>, EntityKind); 7] = [
            (&EMAIL_PATTERN, EntityKind::Email),
            (&URL_PATTERN, EntityKind::Url),
            (&IBAN_PATTERN, EntityKind::Iban),
            (&ISBN_PATTERN, EntityKind::Isbn),
            (&MONEY_PATTERN, EntityKind::Money),
            (&DATE_TIME_PATTERN, EntityKind::DateTime),
            (&PHONE_PATTERN, EntityKind::Phone),
        ];

        let mut claimed: Vec<(usize, usize, EntityKind)> = Vec::new();
        for (pattern, kind) in patterns {
            for m in pattern.find_iter(text) {
                let overlaps = claimed
                    .iter()
                    .any(|(start, end, _)| m.start() < *end && *start < m.end());
                if !overlaps {
                    claimed.push((m.start(), m.end(), kind.clone()));
                }
            }
        }

        claimed.sort_by_key(|(start, _, _)| *start);
        claimed
            .into_iter()
            .map(|(start, end, kind)| RawEntity::new(kind, text[start..end].trim()))
            .collect()
    }
}

#[async_trait]
impl EntityClassifier for PatternClassifier {
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn classify(&self, text: &str) -> Result<Vec<RawEntity>> {
        Ok(self.scan(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(found: &[RawEntity]) -> Vec<EntityKind> {
        found.iter().map(|e| e.kind.clone()).collect()
    }

    #[test]
    fn test_scan_email_and_relative_date() {
        let found = PatternClassifier.scan("mail alice@example.com today");
        assert_eq!(kinds(&found), vec![EntityKind::Email, EntityKind::DateTime]);
        assert_eq!(found[0].text, "alice@example.com");
        assert_eq!(found[1].text, "today");
    }

    #[test]
    fn test_scan_phone() {
        let found = PatternClassifier.scan("call +1 (555) 123 4567 soon");
        assert_eq!(kinds(&found), vec![EntityKind::Phone]);
        assert_eq!(found[0].text, "+1 (555) 123 4567");
    }

    #[test]
    fn test_scan_url_and_money() {
        let found = PatternClassifier.scan("pay $25 at https://shop.example.com now");
        assert_eq!(kinds(&found), vec![EntityKind::Money, EntityKind::Url]);
        assert_eq!(found[1].text, "https://shop.example.com");
    }

    #[test]
    fn test_scan_isbn_claims_digits_before_phone() {
        let found = PatternClassifier.scan("ISBN 9780306406157");
        assert_eq!(kinds(&found), vec![EntityKind::Isbn]);
    }

    #[test]
    fn test_scan_month_date() {
        let found = PatternClassifier.scan("due March 3rd");
        assert_eq!(kinds(&found), vec![EntityKind::DateTime]);
        assert_eq!(found[0].text, "March 3rd");
    }

    #[test]
    fn test_scan_nothing() {
        assert!(PatternClassifier.scan("no info").is_empty());
    }

    #[tokio::test]
    async fn test_classify_uses_scan() {
        let classifier = PatternClassifier::new();
        classifier.init().await.unwrap();
        let found = classifier.classify("see you tomorrow").await.unwrap();
        assert_eq!(found, vec![RawEntity::new(EntityKind::DateTime, "tomorrow")]);
    }
}
