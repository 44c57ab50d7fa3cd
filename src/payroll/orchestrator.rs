//! Bulk and individual payroll runs.
//!
//! For every targeted employee with a salary profile:
//!
//! | record for the period | period  | action                                   |
//! |-----------------------|---------|------------------------------------------|
//! | missing               | any     | create from latest profile + snapshot    |
//! | present               | current | overwrite financials and snapshot        |
//! | present               | past    | metadata only, financials untouched      |
//!
//! Employees run concurrently; writes to one key go through the ledger lock.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::{StreamExt, stream};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{PayrollError, PayrollResult};
use crate::model::payroll::{PayrollRecord, Period, PeriodKey, PeriodPhase};
use crate::model::snapshot::SettingsSnapshot;
use crate::payroll::ledger::PayrollLedger;
use crate::payroll::snapshot::SnapshotProvider;
use crate::store::{EmployeeDirectory, SalaryProfileStore};

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RunFailure {
    #[schema(example = 1001)]
    pub employee_id: u64,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RunResult {
    /// Correlates the run's log lines.
    pub run_id: String,
    #[schema(example = 10)]
    pub month: u32,
    #[schema(example = 2025)]
    pub year: i32,
    pub created: u32,
    pub updated: u32,
    pub skipped: u32,
    pub failed: Vec<RunFailure>,
    /// Snapshot stamped onto every record this run (re)computed.
    pub snapshot: SettingsSnapshot,
}

impl RunResult {
    fn new(period: Period, snapshot: SettingsSnapshot) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            month: period.month,
            year: period.year,
            created: 0,
            updated: 0,
            skipped: 0,
            failed: Vec::new(),
            snapshot,
        }
    }

    fn tally(&mut self, employee_id: u64, outcome: PayrollResult<Outcome>) {
        match outcome {
            Ok(Outcome::Created) => self.created += 1,
            Ok(Outcome::Updated) => self.updated += 1,
            Ok(Outcome::Skipped) => self.skipped += 1,
            Err(e) => {
                warn!(run_id = %self.run_id, employee_id, error = %e, "Payroll failed for employee");
                self.failed.push(RunFailure {
                    employee_id,
                    error: e.to_string(),
                });
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Created,
    Updated,
    Skipped,
}

pub struct PayrollOrchestrator {
    ledger: Arc<PayrollLedger>,
    profiles: Arc<dyn SalaryProfileStore>,
    directory: Arc<dyn EmployeeDirectory>,
    snapshots: SnapshotProvider,
    concurrency: usize,
}

impl PayrollOrchestrator {
    pub fn new(
        ledger: Arc<PayrollLedger>,
        profiles: Arc<dyn SalaryProfileStore>,
        directory: Arc<dyn EmployeeDirectory>,
        snapshots: SnapshotProvider,
        concurrency: usize,
    ) -> Self {
        Self {
            ledger,
            profiles,
            directory,
            snapshots,
            concurrency: concurrency.max(1),
        }
    }

    /// Runs payroll for `employee_ids`, or for every active employee when `None`.
    #[instrument(name = "payroll_run", skip(self, period, employee_ids), fields(%period))]
    pub async fn run(
        &self,
        period: Period,
        employee_ids: Option<Vec<u64>>,
        editor: &str,
    ) -> PayrollResult<RunResult> {
        self.ensure_not_future(period)?;

        let targets: BTreeSet<u64> = match employee_ids {
            Some(ids) => ids.into_iter().collect(),
            None => self
                .directory
                .list_active_employees()
                .await?
                .into_iter()
                .map(|e| e.id)
                .collect(),
        };

        let snapshot = self.snapshots.current().await?;
        let mut result = RunResult::new(period, snapshot);
        info!(run_id = %result.run_id, targets = targets.len(), "Payroll run started");

        let snapshot = &result.snapshot;
        let outcomes: Vec<_> = stream::iter(targets)
            .map(|employee_id| async move {
                let outcome = self
                    .process_employee(employee_id, period, snapshot, editor)
                    .await;
                (employee_id, outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (employee_id, outcome) in outcomes {
            result.tally(employee_id, outcome);
        }
        result.failed.sort_by_key(|f| f.employee_id);

        info!(
            run_id = %result.run_id,
            created = result.created,
            updated = result.updated,
            skipped = result.skipped,
            failed = result.failed.len(),
            "Payroll run finished"
        );
        Ok(result)
    }

    /// Same algorithm scoped to one employee; failures are returned, not collected.
    #[instrument(name = "payroll_run_individual", skip(self, period), fields(%period))]
    pub async fn run_individual(
        &self,
        period: Period,
        employee_id: u64,
        editor: &str,
    ) -> PayrollResult<RunResult> {
        self.ensure_not_future(period)?;

        if self.directory.find_employee(employee_id).await?.is_none() {
            return Err(PayrollError::NotFound(format!(
                "employee {employee_id} not found"
            )));
        }

        let snapshot = self.snapshots.current().await?;
        let mut result = RunResult::new(period, snapshot);

        let outcome = self
            .process_employee(employee_id, period, &result.snapshot, editor)
            .await?;
        result.tally(employee_id, Ok(outcome));

        info!(run_id = %result.run_id, employee_id, ?outcome, "Individual payroll run finished");
        Ok(result)
    }

    /// Refreshes every existing record of the current period from the latest
    /// salary profiles. Never creates records.
    #[instrument(name = "payroll_rerun", skip(self, period), fields(%period))]
    pub async fn rerun(&self, period: Period, editor: &str) -> PayrollResult<RunResult> {
        if !self.ledger.is_current(period) {
            return Err(PayrollError::PastPeriodImmutable(format!(
                "only the current period can be rerun, {} is not current",
                period.label()
            )));
        }

        let records = self.ledger.list_period(period).await?;
        let snapshot = self.snapshots.current().await?;
        let mut result = RunResult::new(period, snapshot);
        info!(run_id = %result.run_id, records = records.len(), "Payroll rerun started");

        let snapshot = &result.snapshot;
        let outcomes: Vec<_> = stream::iter(records)
            .map(|record| async move {
                let employee_id = record.employee_id;
                (employee_id, self.refresh(record, snapshot, editor).await)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (employee_id, outcome) in outcomes {
            result.tally(employee_id, outcome);
        }
        result.failed.sort_by_key(|f| f.employee_id);

        info!(
            run_id = %result.run_id,
            updated = result.updated,
            skipped = result.skipped,
            failed = result.failed.len(),
            "Payroll rerun finished"
        );
        Ok(result)
    }

    async fn process_employee(
        &self,
        employee_id: u64,
        period: Period,
        snapshot: &SettingsSnapshot,
        editor: &str,
    ) -> PayrollResult<Outcome> {
        let key = PeriodKey::new(employee_id, period);
        let _guard = self.ledger.lock(key).await;

        // read under the lock so a queued run cannot write an older salary
        let Some(profile) = self.profiles.latest_profile(employee_id).await? else {
            return Ok(Outcome::Skipped);
        };

        let written = match self.ledger.find_by_key(key).await? {
            None => {
                self.ledger
                    .create(employee_id, period, profile.salary, snapshot, editor)
                    .await?;
                return Ok(Outcome::Created);
            }
            Some(existing) if self.ledger.is_current(period) => self
                .ledger
                .recompute(existing, profile.salary, snapshot, editor)
                .await
                .map(|_| ()),
            Some(existing) => self.ledger.touch(existing, None, editor).await.map(|_| ()),
        };

        match written {
            Ok(()) => Ok(Outcome::Updated),
            // the period was deleted between the lookup and the write
            Err(PayrollError::NotFound(_)) => {
                debug!(employee_id, %period, "Payroll record vanished during run");
                Ok(Outcome::Skipped)
            }
            Err(e) => Err(e),
        }
    }

    async fn refresh(
        &self,
        record: PayrollRecord,
        snapshot: &SettingsSnapshot,
        editor: &str,
    ) -> PayrollResult<Outcome> {
        let key = record.key();
        let _guard = self.ledger.lock(key).await;

        // may have been deleted or changed since the listing
        let Some(current) = self.ledger.find_by_key(key).await? else {
            return Ok(Outcome::Skipped);
        };
        let Some(profile) = self.profiles.latest_profile(key.employee_id).await? else {
            return Ok(Outcome::Skipped);
        };

        self.ledger
            .recompute(current, profile.salary, snapshot, editor)
            .await?;
        Ok(Outcome::Updated)
    }

    fn ensure_not_future(&self, period: Period) -> PayrollResult<()> {
        if self.ledger.phase_of(period) == PeriodPhase::Future {
            return Err(PayrollError::InvalidInput(format!(
                "cannot run payroll for future period {}",
                period.label()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::employee::EmployeeIdentity;
    use crate::model::salary::NewSalaryProfile;
    use crate::payroll::calculator::calculate;
    use crate::payroll::clock::{Clock, ManualClock};
    use crate::store::MemoryStore;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn setup() -> (Arc<MemoryStore>, Arc<ManualClock>, Arc<PayrollLedger>, PayrollOrchestrator) {
        let store = Arc::new(MemoryStore::new());
        store.upsert_employee(EmployeeIdentity {
            id: 1,
            employee_code: "EMP-001".into(),
            first_name: "John".into(),
            last_name: "Doe".into(),
            department: None,
            designation: None,
            hire_date: day(2024, 1, 1),
            status: "active".into(),
        });
        let clock = Arc::new(ManualClock::on(day(2025, 10, 15)));
        let ledger = Arc::new(PayrollLedger::new(store.clone(), clock.clone()));
        let orchestrator = PayrollOrchestrator::new(
            ledger.clone(),
            store.clone(),
            store.clone(),
            SnapshotProvider::new(store.clone()),
            2,
        );
        (store, clock, ledger, orchestrator)
    }

    async fn append(store: &MemoryStore, clock: &ManualClock, ctc: Decimal) {
        store
            .append_profile(NewSalaryProfile {
                employee_id: 1,
                salary: calculate(ctc).unwrap(),
                effective_from: clock.today(),
                created_at: clock.now(),
                created_by: "hr".into(),
            })
            .await
            .unwrap();
    }

    #[actix_web::test]
    async fn queued_run_reads_salary_after_taking_the_lock() {
        let (store, clock, ledger, orchestrator) = setup();
        append(&store, &clock, dec!(600000)).await;

        let october = Period::new(10, 2025).unwrap();
        let guard = ledger.lock(PeriodKey::new(1, october)).await;

        let writer = {
            let store = store.clone();
            let clock = clock.clone();
            async move {
                append(&store, &clock, dec!(1200000)).await;
                drop(guard);
            }
        };
        let (result, ()) = futures::join!(orchestrator.run(october, None, "hr"), writer);

        assert_eq!(result.unwrap().created, 1);
        let record = ledger
            .find_by_key(PeriodKey::new(1, october))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.salary.gross_earnings(), 100000);
    }
}
