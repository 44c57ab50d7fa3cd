//! Payslip view over one frozen payroll record.
//!
//! Company and currency come from the record's embedded snapshots, never from
//! live settings, and nothing clock-dependent goes into the view. Assembling the
//! same past record twice yields the same payslip.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::{PayrollError, PayrollResult};
use crate::model::employee::EmployeeIdentity;
use crate::model::payroll::{PayrollRecord, PayrollStatus};
use crate::model::snapshot::{CompanySnapshot, CurrencySnapshot};
use crate::payroll::ledger::PayrollLedger;
use crate::store::EmployeeDirectory;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PayslipLine {
    #[schema(example = "Basic Salary")]
    pub label: String,
    #[schema(example = 25000)]
    pub amount: i64,
    #[schema(example = "₹25,000")]
    pub display: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PayslipEmployee {
    pub id: u64,
    pub employee_code: String,
    pub name: String,
    pub designation: Option<String>,
    pub department: Option<String>,
    #[schema(value_type = String, format = "date")]
    pub joining_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PayslipView {
    pub record_id: u64,
    #[schema(example = "October 2025")]
    pub period: String,
    pub month: u32,
    pub year: i32,
    pub status: PayrollStatus,
    pub employee: PayslipEmployee,
    pub company: CompanySnapshot,
    pub currency: CurrencySnapshot,
    pub earnings: Vec<PayslipLine>,
    pub deductions: Vec<PayslipLine>,
    pub employer_contributions: Vec<PayslipLine>,
    pub gross_earnings: i64,
    pub total_deductions: i64,
    pub net_pay: i64,
    #[schema(example = "₹46,625")]
    pub net_pay_display: String,
}

pub struct PayslipAssembler {
    ledger: Arc<PayrollLedger>,
    directory: Arc<dyn EmployeeDirectory>,
}

impl PayslipAssembler {
    pub fn new(ledger: Arc<PayrollLedger>, directory: Arc<dyn EmployeeDirectory>) -> Self {
        Self { ledger, directory }
    }

    pub async fn assemble(&self, record_id: u64) -> PayrollResult<PayslipView> {
        let record = self.ledger.find(record_id).await?;
        let employee = self
            .directory
            .find_employee(record.employee_id)
            .await?
            .ok_or_else(|| {
                PayrollError::NotFound(format!("employee {} not found", record.employee_id))
            })?;

        Ok(build_view(&record, &employee))
    }
}

fn build_view(record: &PayrollRecord, employee: &EmployeeIdentity) -> PayslipView {
    let symbol = record.currency.symbol.as_str();
    let lines = |items: &[(&'static str, i64)]| -> Vec<PayslipLine> {
        items
            .iter()
            .filter(|(_, amount)| *amount != 0)
            .map(|(label, amount)| PayslipLine {
                label: (*label).to_string(),
                amount: *amount,
                display: format_amount(symbol, *amount),
            })
            .collect()
    };

    let salary = &record.salary;
    PayslipView {
        record_id: record.id,
        period: record.period.label(),
        month: record.period.month,
        year: record.period.year,
        status: record.status,
        employee: PayslipEmployee {
            id: employee.id,
            employee_code: employee.employee_code.clone(),
            name: employee.full_name(),
            designation: employee.designation.clone(),
            department: employee.department.clone(),
            joining_date: employee.hire_date,
        },
        company: record.company.clone(),
        currency: record.currency.clone(),
        earnings: lines(&salary.earnings().lines()),
        deductions: lines(&salary.deductions().lines()),
        employer_contributions: lines(&salary.employer_contributions().lines()),
        gross_earnings: salary.gross_earnings(),
        total_deductions: salary.total_deductions(),
        net_pay: salary.net_pay(),
        net_pay_display: format_amount(symbol, salary.net_pay()),
    }
}

/// `₹46,625`, `-$1,200`
pub fn format_amount(symbol: &str, amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0 { "-" } else { "" };
    format!("{sign}{symbol}{grouped}")
}
