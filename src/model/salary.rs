use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{PayrollError, PayrollResult};

/// Ceiling for any single monthly component, so totals stay inside i64.
pub const MAX_COMPONENT: i64 = 1_000_000_000_000;

/// Monthly earning components, whole currency units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Earnings {
    #[schema(example = 25000)]
    pub basic: i64,
    #[schema(example = 5000)]
    pub hra: i64,
    #[schema(example = 7500)]
    pub fixed_allowance: i64,
    #[schema(example = 1875)]
    pub conveyance_allowance: i64,
    #[schema(example = 1250)]
    pub children_education_allowance: i64,
    #[schema(example = 1250)]
    pub medical_allowance: i64,
    #[schema(example = 3125)]
    pub shift_allowance: i64,
    #[schema(example = 5000)]
    pub mobile_internet_allowance: i64,
}

impl Earnings {
    pub fn total(&self) -> i64 {
        self.lines().iter().map(|(_, amount)| amount).sum()
    }

    /// Payslip order.
    pub fn lines(&self) -> [(&'static str, i64); 8] {
        [
            ("Basic Salary", self.basic),
            ("House Rent Allowance", self.hra),
            ("Fixed Allowance", self.fixed_allowance),
            ("Conveyance Allowance", self.conveyance_allowance),
            ("Children Education Allowance", self.children_education_allowance),
            ("Medical Allowance", self.medical_allowance),
            ("Shift Allowance", self.shift_allowance),
            ("Mobile & Internet Allowance", self.mobile_internet_allowance),
        ]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Deductions {
    #[schema(example = 3000)]
    pub employee_epf: i64,
    #[schema(example = 375)]
    pub employee_esi: i64,
    #[schema(example = 0)]
    pub professional_tax: i64,
}

impl Deductions {
    pub fn total(&self) -> i64 {
        self.employee_epf + self.employee_esi + self.professional_tax
    }

    pub fn lines(&self) -> [(&'static str, i64); 3] {
        [
            ("Employee EPF", self.employee_epf),
            ("Employee ESI", self.employee_esi),
            ("Professional Tax", self.professional_tax),
        ]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EmployerContributions {
    #[schema(example = 3000)]
    pub employer_epf: i64,
    #[schema(example = 1625)]
    pub employer_esi: i64,
}

impl EmployerContributions {
    pub fn lines(&self) -> [(&'static str, i64); 2] {
        [
            ("Employer EPF", self.employer_epf),
            ("Employer ESI", self.employer_esi),
        ]
    }
}

/// A full monthly compensation structure.
///
/// Totals are private and re-derived by every constructor, so gross, deductions
/// and net pay can never drift from the components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SalaryBreakdown {
    #[schema(example = "600000", value_type = String)]
    ctc: Decimal,
    #[schema(example = 50000)]
    monthly_ctc: i64,
    earnings: Earnings,
    deductions: Deductions,
    employer_contributions: EmployerContributions,
    #[schema(example = 50000)]
    gross_earnings: i64,
    #[schema(example = 3375)]
    total_deductions: i64,
    #[schema(example = 46625)]
    net_pay: i64,
}

impl SalaryBreakdown {
    pub fn from_components(
        ctc: Decimal,
        monthly_ctc: i64,
        earnings: Earnings,
        deductions: Deductions,
        employer_contributions: EmployerContributions,
    ) -> Self {
        let gross_earnings = earnings.total();
        let total_deductions = deductions.total();

        Self {
            ctc,
            monthly_ctc,
            earnings,
            deductions,
            employer_contributions,
            gross_earnings,
            total_deductions,
            net_pay: gross_earnings - total_deductions,
        }
    }

    /// Zero-filled row used when an employee has no salary profile yet.
    pub fn zero() -> Self {
        Self::from_components(
            Decimal::ZERO,
            0,
            Earnings::default(),
            Deductions::default(),
            EmployerContributions::default(),
        )
    }

    pub fn ctc(&self) -> Decimal {
        self.ctc
    }

    pub fn monthly_ctc(&self) -> i64 {
        self.monthly_ctc
    }

    pub fn earnings(&self) -> &Earnings {
        &self.earnings
    }

    pub fn deductions(&self) -> &Deductions {
        &self.deductions
    }

    pub fn employer_contributions(&self) -> &EmployerContributions {
        &self.employer_contributions
    }

    pub fn gross_earnings(&self) -> i64 {
        self.gross_earnings
    }

    pub fn total_deductions(&self) -> i64 {
        self.total_deductions
    }

    pub fn net_pay(&self) -> i64 {
        self.net_pay
    }

    /// Applies manual overrides and re-derives the totals.
    ///
    /// Employer contributions are kept as they are unless overridden themselves.
    pub fn with_overrides(&self, overrides: &ComponentOverrides) -> PayrollResult<Self> {
        overrides.check_bounds()?;

        let e = &self.earnings;
        let d = &self.deductions;
        let c = &self.employer_contributions;

        let earnings = Earnings {
            basic: overrides.basic.unwrap_or(e.basic),
            hra: overrides.hra.unwrap_or(e.hra),
            fixed_allowance: overrides.fixed_allowance.unwrap_or(e.fixed_allowance),
            conveyance_allowance: overrides
                .conveyance_allowance
                .unwrap_or(e.conveyance_allowance),
            children_education_allowance: overrides
                .children_education_allowance
                .unwrap_or(e.children_education_allowance),
            medical_allowance: overrides.medical_allowance.unwrap_or(e.medical_allowance),
            shift_allowance: overrides.shift_allowance.unwrap_or(e.shift_allowance),
            mobile_internet_allowance: overrides
                .mobile_internet_allowance
                .unwrap_or(e.mobile_internet_allowance),
        };
        let deductions = Deductions {
            employee_epf: overrides.employee_epf.unwrap_or(d.employee_epf),
            employee_esi: overrides.employee_esi.unwrap_or(d.employee_esi),
            professional_tax: overrides.professional_tax.unwrap_or(d.professional_tax),
        };
        let employer_contributions = EmployerContributions {
            employer_epf: overrides.employer_epf.unwrap_or(c.employer_epf),
            employer_esi: overrides.employer_esi.unwrap_or(c.employer_esi),
        };

        let next = Self::from_components(
            self.ctc,
            self.monthly_ctc,
            earnings,
            deductions,
            employer_contributions,
        );
        next.validate()?;
        Ok(next)
    }

    pub fn validate(&self) -> PayrollResult<()> {
        let components = self
            .earnings
            .lines()
            .into_iter()
            .chain(self.deductions.lines())
            .chain(self.employer_contributions.lines());

        for (label, amount) in components {
            if amount < 0 {
                return Err(PayrollError::InvalidInput(format!(
                    "{label} cannot be negative"
                )));
            }
        }

        if self.total_deductions > self.gross_earnings {
            return Err(PayrollError::Validation(format!(
                "total deductions ({}) exceed gross earnings ({})",
                self.total_deductions, self.gross_earnings
            )));
        }

        Ok(())
    }
}

/// Per-component manual overrides. Absent fields keep their computed value.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct ComponentOverrides {
    pub basic: Option<i64>,
    pub hra: Option<i64>,
    pub fixed_allowance: Option<i64>,
    pub conveyance_allowance: Option<i64>,
    pub children_education_allowance: Option<i64>,
    pub medical_allowance: Option<i64>,
    pub shift_allowance: Option<i64>,
    pub mobile_internet_allowance: Option<i64>,
    pub employee_epf: Option<i64>,
    pub employee_esi: Option<i64>,
    #[schema(example = 200)]
    pub professional_tax: Option<i64>,
    pub employer_epf: Option<i64>,
    pub employer_esi: Option<i64>,
}

impl ComponentOverrides {
    fn fields(&self) -> [(&'static str, Option<i64>); 13] {
        [
            ("basic", self.basic),
            ("hra", self.hra),
            ("fixed_allowance", self.fixed_allowance),
            ("conveyance_allowance", self.conveyance_allowance),
            ("children_education_allowance", self.children_education_allowance),
            ("medical_allowance", self.medical_allowance),
            ("shift_allowance", self.shift_allowance),
            ("mobile_internet_allowance", self.mobile_internet_allowance),
            ("employee_epf", self.employee_epf),
            ("employee_esi", self.employee_esi),
            ("professional_tax", self.professional_tax),
            ("employer_epf", self.employer_epf),
            ("employer_esi", self.employer_esi),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|(_, value)| value.is_none())
    }

    /// Every supplied value must lie in `0..=MAX_COMPONENT`.
    pub fn check_bounds(&self) -> PayrollResult<()> {
        for (name, value) in self.fields() {
            match value {
                Some(v) if v < 0 => {
                    return Err(PayrollError::InvalidInput(format!(
                        "{name} cannot be negative"
                    )));
                }
                Some(v) if v > MAX_COMPONENT => {
                    return Err(PayrollError::InvalidInput(format!(
                        "{name} exceeds the supported maximum of {MAX_COMPONENT}"
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// One row of an employee's append-only compensation history.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SalaryProfile {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1001)]
    pub employee_id: u64,
    pub salary: SalaryBreakdown,
    #[schema(example = "2025-10-01", value_type = String, format = "date")]
    pub effective_from: NaiveDate,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[schema(example = "hr.admin")]
    pub created_by: String,
}

#[derive(Debug, Clone)]
pub struct NewSalaryProfile {
    pub employee_id: u64,
    pub salary: SalaryBreakdown,
    pub effective_from: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}
