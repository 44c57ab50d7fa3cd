//! Entry point for every salary and payroll operation.
//!
//! Handlers hold a `PayrollService` in `web::Data` and never reach the stores
//! directly. Cloning is cheap.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use crate::error::{PayrollError, PayrollResult};
use crate::model::employee::EmployeeIdentity;
use crate::model::payroll::{PayrollStatus, Period};
use crate::model::salary::{ComponentOverrides, NewSalaryProfile, SalaryBreakdown, SalaryProfile};
use crate::payroll::calculator;
use crate::payroll::clock::Clock;
use crate::payroll::ledger::{PayrollLedger, PayrollRecordView, PeriodSummary};
use crate::payroll::orchestrator::{PayrollOrchestrator, RunResult};
use crate::payroll::payslip::{PayslipAssembler, PayslipView};
use crate::payroll::snapshot::SnapshotProvider;
use crate::payroll::sync::SyncPropagator;
use crate::store::{EmployeeDirectory, PayrollStore, SalaryProfileStore, SettingsStore};

/// New compensation for one employee.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SalaryUpdate {
    /// Annual cost to company.
    #[schema(value_type = String, example = "600000")]
    pub ctc: Decimal,
    /// Manual adjustments applied on top of the computed components.
    pub overrides: Option<ComponentOverrides>,
    /// Defaults to today.
    #[schema(value_type = Option<String>, format = "date", example = "2025-10-01")]
    pub effective_from: Option<NaiveDate>,
}

/// One row of the salary listing. Employees without a profile get zeros.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EmployeeSalaryRow {
    pub employee: EmployeeIdentity,
    pub salary: SalaryBreakdown,
    #[schema(value_type = Option<String>, format = "date")]
    pub effective_from: Option<NaiveDate>,
    pub has_profile: bool,
}

#[derive(Clone)]
pub struct PayrollService {
    directory: Arc<dyn EmployeeDirectory>,
    profiles: Arc<dyn SalaryProfileStore>,
    ledger: Arc<PayrollLedger>,
    orchestrator: Arc<PayrollOrchestrator>,
    payslips: Arc<PayslipAssembler>,
    sync: SyncPropagator,
}

impl PayrollService {
    pub fn new(
        directory: Arc<dyn EmployeeDirectory>,
        settings: Arc<dyn SettingsStore>,
        profiles: Arc<dyn SalaryProfileStore>,
        records: Arc<dyn PayrollStore>,
        clock: Arc<dyn Clock>,
        run_concurrency: usize,
    ) -> Self {
        let ledger = Arc::new(PayrollLedger::new(records, clock));
        let snapshots = SnapshotProvider::new(settings);
        let orchestrator = PayrollOrchestrator::new(
            ledger.clone(),
            profiles.clone(),
            directory.clone(),
            snapshots.clone(),
            run_concurrency,
        );
        let payslips = PayslipAssembler::new(ledger.clone(), directory.clone());
        let sync = SyncPropagator::new(ledger.clone(), profiles.clone(), snapshots);

        Self {
            directory,
            profiles,
            ledger,
            orchestrator: Arc::new(orchestrator),
            payslips: Arc::new(payslips),
            sync,
        }
    }

    pub fn sync(&self) -> &SyncPropagator {
        &self.sync
    }

    pub fn calculate_from_ctc(&self, ctc: Decimal) -> PayrollResult<SalaryBreakdown> {
        calculator::calculate(ctc)
    }

    /// Appends a new salary profile, then hands the change to the sync task.
    ///
    /// Returns once the profile is stored. What happens to the current period's
    /// payroll afterwards is not reported back here.
    #[instrument(skip(self, update), fields(ctc = %update.ctc))]
    pub async fn update_salary(
        &self,
        employee_id: u64,
        update: SalaryUpdate,
        editor: &str,
    ) -> PayrollResult<SalaryProfile> {
        self.require_employee(employee_id).await?;

        let mut salary = calculator::calculate(update.ctc)?;
        if let Some(overrides) = update.overrides.as_ref().filter(|o| !o.is_empty()) {
            salary = salary.with_overrides(overrides)?;
        }

        let clock = self.ledger.clock();
        let profile = self
            .profiles
            .append_profile(NewSalaryProfile {
                employee_id,
                salary,
                effective_from: update.effective_from.unwrap_or_else(|| clock.today()),
                created_at: clock.now(),
                created_by: editor.to_string(),
            })
            .await?;

        info!(
            profile_id = profile.id,
            net_pay = profile.salary.net_pay(),
            "Salary profile saved"
        );

        self.sync.dispatch(profile.clone(), editor.to_string());
        Ok(profile)
    }

    pub async fn get_current_salary(&self, employee_id: u64) -> PayrollResult<SalaryProfile> {
        self.require_employee(employee_id).await?;
        self.profiles
            .latest_profile(employee_id)
            .await?
            .ok_or_else(|| {
                PayrollError::NotFound(format!("no salary profile for employee {employee_id}"))
            })
    }

    pub async fn get_salary_history(&self, employee_id: u64) -> PayrollResult<Vec<SalaryProfile>> {
        self.require_employee(employee_id).await?;
        self.profiles.profile_history(employee_id).await
    }

    /// Every active employee with their current salary.
    ///
    /// A profile lookup failure for one employee yields a zero row for that
    /// employee instead of failing the listing.
    pub async fn list_employee_salaries(&self) -> PayrollResult<Vec<EmployeeSalaryRow>> {
        let employees = self.directory.list_active_employees().await?;
        let mut rows = Vec::with_capacity(employees.len());

        for employee in employees {
            let latest = match self.profiles.latest_profile(employee.id).await {
                Ok(latest) => latest,
                Err(e) => {
                    warn!(employee_id = employee.id, error = %e, "Salary lookup failed, listing zeros");
                    None
                }
            };

            rows.push(match latest {
                Some(profile) => EmployeeSalaryRow {
                    employee,
                    salary: profile.salary,
                    effective_from: Some(profile.effective_from),
                    has_profile: true,
                },
                None => EmployeeSalaryRow {
                    employee,
                    salary: SalaryBreakdown::zero(),
                    effective_from: None,
                    has_profile: false,
                },
            });
        }

        Ok(rows)
    }

    pub async fn run_payroll(
        &self,
        month: u32,
        year: i32,
        employee_ids: Option<Vec<u64>>,
        editor: &str,
    ) -> PayrollResult<RunResult> {
        let period = Period::new(month, year)?;
        self.orchestrator.run(period, employee_ids, editor).await
    }

    pub async fn run_individual_payroll(
        &self,
        month: u32,
        year: i32,
        employee_id: u64,
        editor: &str,
    ) -> PayrollResult<RunResult> {
        let period = Period::new(month, year)?;
        self.orchestrator
            .run_individual(period, employee_id, editor)
            .await
    }

    pub async fn rerun_payroll(&self, month: u32, year: i32, editor: &str) -> PayrollResult<RunResult> {
        let period = Period::new(month, year)?;
        self.orchestrator.rerun(period, editor).await
    }

    pub async fn edit_payroll_record(
        &self,
        record_id: u64,
        overrides: &ComponentOverrides,
        editor: &str,
    ) -> PayrollResult<PayrollRecordView> {
        if overrides.is_empty() {
            return Err(PayrollError::InvalidInput(
                "at least one component must be provided".into(),
            ));
        }
        let record = self.ledger.edit(record_id, overrides, editor).await?;
        Ok(self.ledger.view(record))
    }

    pub async fn update_payroll_status(
        &self,
        record_id: u64,
        status: PayrollStatus,
        editor: &str,
    ) -> PayrollResult<PayrollRecordView> {
        let record = self.ledger.set_status(record_id, status, editor).await?;
        Ok(self.ledger.view(record))
    }

    #[instrument(skip(self))]
    pub async fn delete_payroll_for_period(&self, month: u32, year: i32) -> PayrollResult<u64> {
        let period = Period::new(month, year)?;
        self.ledger.delete_period(period).await
    }

    pub async fn get_payroll_record(&self, record_id: u64) -> PayrollResult<PayrollRecordView> {
        let record = self.ledger.find(record_id).await?;
        Ok(self.ledger.view(record))
    }

    pub async fn list_payroll_for_period(
        &self,
        month: u32,
        year: i32,
    ) -> PayrollResult<Vec<PayrollRecordView>> {
        let period = Period::new(month, year)?;
        let mut records = self.ledger.list_period(period).await?;
        records.sort_by_key(|r| r.employee_id);
        Ok(records.into_iter().map(|r| self.ledger.view(r)).collect())
    }

    pub async fn get_payslip(&self, record_id: u64) -> PayrollResult<PayslipView> {
        self.payslips.assemble(record_id).await
    }

    pub async fn list_payroll_history(&self) -> PayrollResult<Vec<PeriodSummary>> {
        self.ledger.history().await
    }

    async fn require_employee(&self, employee_id: u64) -> PayrollResult<EmployeeIdentity> {
        self.directory
            .find_employee(employee_id)
            .await?
            .ok_or_else(|| PayrollError::NotFound(format!("employee {employee_id} not found")))
    }
}
