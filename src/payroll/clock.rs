//! Wall-clock capability used to decide which period is current.
//!
//! Nothing caches the answer: every mutating call asks the clock again, so a
//! record written just before midnight on month-end is treated as past the
//! moment the month rolls over.

use std::sync::Mutex;

use chrono::{DateTime, Local, NaiveDate, Utc};

use crate::model::payroll::Period;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Calendar date used for period decisions.
    fn today(&self) -> NaiveDate;

    fn current_period(&self) -> Period {
        Period::containing(self.today())
    }
}

/// Server-local calendar, no timezone normalization.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Settable clock for deterministic rollover behavior.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Noon UTC on the given day.
    pub fn on(date: NaiveDate) -> Self {
        Self::new(Self::noon(date))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn set_date(&self, date: NaiveDate) {
        self.set(Self::noon(date));
    }

    fn noon(date: NaiveDate) -> DateTime<Utc> {
        date.and_hms_opt(12, 0, 0)
            .unwrap_or_default()
            .and_utc()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}
