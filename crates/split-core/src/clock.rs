//! Clock used to resolve relative dates

use chrono::{Local, NaiveDate};

/// Source of the current local date
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Reads the system's local date
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Always reports the same date
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
