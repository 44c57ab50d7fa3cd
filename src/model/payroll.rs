use std::fmt;

use chrono::{DateTime, Datelike, Month, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{PayrollError, PayrollResult};
use crate::model::salary::SalaryBreakdown;
use crate::model::snapshot::{CompanySnapshot, CurrencySnapshot};

/// A calendar payroll period. Ordered chronologically (year first).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
pub struct Period {
    #[schema(example = 2025)]
    pub year: i32,
    #[schema(example = 10)]
    pub month: u32,
}

/// Where a period sits relative to today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodPhase {
    Past,
    Current,
    Future,
}

impl Period {
    pub fn new(month: u32, year: i32) -> PayrollResult<Self> {
        if !(1..=12).contains(&month) {
            return Err(PayrollError::InvalidInput(format!(
                "month must be between 1 and 12, got {month}"
            )));
        }
        if !(1900..=9999).contains(&year) {
            return Err(PayrollError::InvalidInput(format!(
                "year {year} is out of range"
            )));
        }
        Ok(Self { year, month })
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn phase(&self, today: NaiveDate) -> PeriodPhase {
        match self.cmp(&Period::containing(today)) {
            std::cmp::Ordering::Less => PeriodPhase::Past,
            std::cmp::Ordering::Equal => PeriodPhase::Current,
            std::cmp::Ordering::Greater => PeriodPhase::Future,
        }
    }

    pub fn is_current(&self, today: NaiveDate) -> bool {
        self.phase(today) == PeriodPhase::Current
    }

    /// "October 2025"
    pub fn label(&self) -> String {
        let name = u8::try_from(self.month)
            .ok()
            .and_then(|m| Month::try_from(m).ok())
            .map(|m| m.name().to_string())
            .unwrap_or_else(|| format!("Month {}", self.month));
        format!("{} {}", name, self.year)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Unique ledger key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeriodKey {
    pub employee_id: u64,
    pub period: Period,
}

impl PeriodKey {
    pub fn new(employee_id: u64, period: Period) -> Self {
        Self {
            employee_id,
            period,
        }
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "employee {} / {}", self.employee_id, self.period)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ToSchema,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PayrollStatus {
    Processed,
    Paid,
}

/// The ledger entry for one employee and one period.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PayrollRecord {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1001)]
    pub employee_id: u64,
    #[serde(flatten)]
    pub period: Period,
    pub salary: SalaryBreakdown,
    pub company: CompanySnapshot,
    pub currency: CurrencySnapshot,
    pub status: PayrollStatus,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub last_edited_at: DateTime<Utc>,
    #[schema(example = "hr.admin")]
    pub edited_by: String,
}

impl PayrollRecord {
    pub fn key(&self) -> PeriodKey {
        PeriodKey::new(self.employee_id, self.period)
    }
}

#[derive(Debug, Clone)]
pub struct NewPayrollRecord {
    pub employee_id: u64,
    pub period: Period,
    pub salary: SalaryBreakdown,
    pub company: CompanySnapshot,
    pub currency: CurrencySnapshot,
    pub status: PayrollStatus,
    pub created_at: DateTime<Utc>,
    pub edited_by: String,
}

/// Aggregate of one period's records, as the store computes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodTotals {
    pub period: Period,
    pub employee_count: u64,
    pub paid_count: u64,
    pub total_gross: i64,
    pub total_deductions: i64,
    pub total_net: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn rejects_out_of_range_month() {
        assert!(Period::new(0, 2025).is_err());
        assert!(Period::new(13, 2025).is_err());
        assert!(Period::new(12, 2025).is_ok());
    }

    #[test]
    fn phase_follows_calendar_month() {
        let oct = Period::new(10, 2025).unwrap();
        assert_eq!(oct.phase(date(2025, 10, 31)), PeriodPhase::Current);
        assert_eq!(oct.phase(date(2025, 11, 1)), PeriodPhase::Past);
        assert_eq!(oct.phase(date(2025, 9, 30)), PeriodPhase::Future);
        // december rolls into the next year
        let dec = Period::new(12, 2025).unwrap();
        assert_eq!(dec.phase(date(2026, 1, 1)), PeriodPhase::Past);
    }

    #[test]
    fn label_and_display() {
        let p = Period::new(10, 2025).unwrap();
        assert_eq!(p.label(), "October 2025");
        assert_eq!(p.to_string(), "2025-10");
    }

    #[test]
    fn status_round_trips_through_strings() {
        assert_eq!(PayrollStatus::Paid.to_string(), "paid");
        assert_eq!("processed".parse::<PayrollStatus>().unwrap(), PayrollStatus::Processed);
        assert_eq!(
            "void".parse::<PayrollStatus>().unwrap_err(),
            strum::ParseError::VariantNotFound
        );
    }
}
