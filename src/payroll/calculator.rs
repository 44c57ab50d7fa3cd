//! Annual CTC → monthly component breakdown.
//!
//! Percentages are applied in exact decimal arithmetic; each output component is
//! rounded to whole currency units (half away from zero) as it is produced, and
//! later components build on the rounded earlier ones.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{PayrollError, PayrollResult};
use crate::model::salary::{Deductions, EmployerContributions, Earnings, SalaryBreakdown};

/// Upper bound on accepted CTC, keeps every component inside i64.
const MAX_CTC: i64 = 1_000_000_000_000;

fn pct(value: Decimal, percent: Decimal) -> Decimal {
    value * percent / Decimal::ONE_HUNDRED
}

fn whole(value: Decimal) -> i64 {
    value
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or_default()
}

/// Decomposes an annual CTC. Professional tax starts at zero; callers override it.
pub fn calculate(ctc: Decimal) -> PayrollResult<SalaryBreakdown> {
    if ctc.is_sign_negative() && !ctc.is_zero() {
        return Err(PayrollError::InvalidInput(format!(
            "CTC cannot be negative, got {ctc}"
        )));
    }
    if ctc > Decimal::from(MAX_CTC) {
        return Err(PayrollError::InvalidInput(format!(
            "CTC {ctc} exceeds the supported maximum"
        )));
    }

    let monthly = ctc / Decimal::from(12);

    let basic = whole(pct(monthly, Decimal::from(50)));
    let hra = whole(pct(Decimal::from(basic), Decimal::from(20)));
    let fixed_allowance = whole(pct(monthly, Decimal::from(15)));

    let remaining = monthly - Decimal::from(basic + hra + fixed_allowance);

    let earnings = Earnings {
        basic,
        hra,
        fixed_allowance,
        conveyance_allowance: whole(pct(remaining, Decimal::from(15))),
        children_education_allowance: whole(pct(remaining, Decimal::from(10))),
        medical_allowance: whole(pct(remaining, Decimal::from(10))),
        shift_allowance: whole(pct(remaining, Decimal::from(25))),
        mobile_internet_allowance: whole(pct(remaining, Decimal::from(40))),
    };

    let deductions = Deductions {
        employee_epf: whole(pct(Decimal::from(basic), Decimal::from(12))),
        // 0.75%
        employee_esi: whole(pct(monthly, Decimal::new(75, 2))),
        professional_tax: 0,
    };

    let gross = Decimal::from(earnings.total());
    let employer_contributions = EmployerContributions {
        employer_epf: whole(pct(Decimal::from(basic), Decimal::from(12))),
        // 3.25%
        employer_esi: whole(pct(gross, Decimal::new(325, 2))),
    };

    Ok(SalaryBreakdown::from_components(
        ctc,
        whole(monthly),
        earnings,
        deductions,
        employer_contributions,
    ))
}
