//! Persistence seams for the payroll engine.
//!
//! The engine only talks to these traits. `MySqlStore` backs production,
//! `MemoryStore` backs tests and the `memory` backend.

pub mod memory;
pub mod mysql;

use async_trait::async_trait;

use crate::error::PayrollResult;
use crate::model::employee::EmployeeIdentity;
use crate::model::payroll::{NewPayrollRecord, PayrollRecord, Period, PeriodKey, PeriodTotals};
use crate::model::salary::{NewSalaryProfile, SalaryProfile};
use crate::model::snapshot::CompanySettings;

pub use memory::MemoryStore;
pub use mysql::MySqlStore;

/// Read-only view of the external employee directory.
#[async_trait]
pub trait EmployeeDirectory: Send + Sync {
    async fn find_employee(&self, employee_id: u64) -> PayrollResult<Option<EmployeeIdentity>>;

    async fn list_active_employees(&self) -> PayrollResult<Vec<EmployeeIdentity>>;
}

/// Read-only view of the single global settings row.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn company_settings(&self) -> PayrollResult<Option<CompanySettings>>;
}

/// Append-only salary history.
#[async_trait]
pub trait SalaryProfileStore: Send + Sync {
    async fn append_profile(&self, profile: NewSalaryProfile) -> PayrollResult<SalaryProfile>;

    /// Most recent `effective_from`, ties broken by insertion order.
    async fn latest_profile(&self, employee_id: u64) -> PayrollResult<Option<SalaryProfile>>;

    /// Newest first.
    async fn profile_history(&self, employee_id: u64) -> PayrollResult<Vec<SalaryProfile>>;
}

#[async_trait]
pub trait PayrollStore: Send + Sync {
    /// Fails with `Conflict` when the (employee, month, year) key exists.
    async fn insert_record(&self, record: NewPayrollRecord) -> PayrollResult<PayrollRecord>;

    async fn find_record(&self, id: u64) -> PayrollResult<Option<PayrollRecord>>;

    async fn find_record_by_key(&self, key: PeriodKey) -> PayrollResult<Option<PayrollRecord>>;

    /// Overwrites the stored row with the same id. Fails with `NotFound` if it is gone.
    async fn update_record(&self, record: &PayrollRecord) -> PayrollResult<()>;

    async fn list_period(&self, period: Period) -> PayrollResult<Vec<PayrollRecord>>;

    async fn period_totals(&self) -> PayrollResult<Vec<PeriodTotals>>;

    async fn delete_period(&self, period: Period) -> PayrollResult<u64>;
}
