//! Payroll ledger: per-period records and the rules for changing them.
//!
//! Mutability is derived, never stored. Before every write the record's period
//! is compared against the clock:
//!
//! * current period: financial fields and snapshots may be overwritten
//! * past period: only `status`, `edited_by` and `last_edited_at` may change
//!
//! Deleting is the mirror image: only past periods may be deleted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::lock::{Mutex as AsyncMutex, OwnedMutexGuard};
use serde::Serialize;
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::error::{PayrollError, PayrollResult};
use crate::model::payroll::{
    NewPayrollRecord, PayrollRecord, PayrollStatus, Period, PeriodKey, PeriodPhase,
};
use crate::model::salary::{ComponentOverrides, SalaryBreakdown};
use crate::model::snapshot::SettingsSnapshot;
use crate::payroll::clock::Clock;
use crate::store::PayrollStore;

/// Prune idle key locks once the table grows past this.
const LOCK_TABLE_SOFT_LIMIT: usize = 1024;

/// One async mutex per (employee, month, year) key.
#[derive(Default)]
struct KeyLocks {
    table: Mutex<HashMap<PeriodKey, Arc<AsyncMutex<()>>>>,
}

impl KeyLocks {
    async fn acquire(&self, key: PeriodKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
            if table.len() > LOCK_TABLE_SOFT_LIMIT {
                table.retain(|_, l| Arc::strong_count(l) > 1);
            }
            table
                .entry(key)
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

/// Held while a key is being read-modified-written.
pub struct KeyGuard {
    _guard: OwnedMutexGuard<()>,
}

/// Summary of one period for the history listing.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PeriodSummary {
    #[schema(example = 10)]
    pub month: u32,
    #[schema(example = 2025)]
    pub year: i32,
    #[schema(example = "October 2025")]
    pub label: String,
    pub employee_count: u64,
    pub paid_count: u64,
    pub total_gross: i64,
    pub total_deductions: i64,
    pub total_net: i64,
    pub is_current_month: bool,
}

/// A record plus the mutability flag computed for this read.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PayrollRecordView {
    #[serde(flatten)]
    pub record: PayrollRecord,
    pub is_current_month: bool,
}

pub struct PayrollLedger {
    store: Arc<dyn PayrollStore>,
    clock: Arc<dyn Clock>,
    locks: KeyLocks,
}

impl PayrollLedger {
    pub fn new(store: Arc<dyn PayrollStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            locks: KeyLocks::default(),
        }
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Asked fresh on every call.
    pub fn phase_of(&self, period: Period) -> PeriodPhase {
        period.phase(self.clock.today())
    }

    pub fn is_current(&self, period: Period) -> bool {
        self.phase_of(period) == PeriodPhase::Current
    }

    pub fn view(&self, record: PayrollRecord) -> PayrollRecordView {
        let is_current_month = self.is_current(record.period);
        PayrollRecordView {
            record,
            is_current_month,
        }
    }

    /// Serializes writers of one key. Callers doing read-modify-write hold this
    /// across the whole sequence.
    pub async fn lock(&self, key: PeriodKey) -> KeyGuard {
        KeyGuard {
            _guard: self.locks.acquire(key).await,
        }
    }

    pub async fn find(&self, id: u64) -> PayrollResult<PayrollRecord> {
        self.store
            .find_record(id)
            .await?
            .ok_or_else(|| PayrollError::NotFound(format!("payroll record {id} not found")))
    }

    pub async fn find_by_key(&self, key: PeriodKey) -> PayrollResult<Option<PayrollRecord>> {
        self.store.find_record_by_key(key).await
    }

    pub async fn list_period(&self, period: Period) -> PayrollResult<Vec<PayrollRecord>> {
        self.store.list_period(period).await
    }

    /// Inserts a fresh `processed` record. Duplicate keys fail with `Conflict`.
    pub async fn create(
        &self,
        employee_id: u64,
        period: Period,
        salary: SalaryBreakdown,
        snapshot: &SettingsSnapshot,
        editor: &str,
    ) -> PayrollResult<PayrollRecord> {
        salary.validate()?;

        let record = self
            .store
            .insert_record(NewPayrollRecord {
                employee_id,
                period,
                salary,
                company: snapshot.company.clone(),
                currency: snapshot.currency.clone(),
                status: PayrollStatus::Processed,
                created_at: self.clock.now(),
                edited_by: editor.to_string(),
            })
            .await?;

        info!(record_id = record.id, employee_id, %period, "Payroll record created");
        Ok(record)
    }

    /// Replaces financials and snapshots of a current-period record.
    pub async fn recompute(
        &self,
        mut record: PayrollRecord,
        salary: SalaryBreakdown,
        snapshot: &SettingsSnapshot,
        editor: &str,
    ) -> PayrollResult<PayrollRecord> {
        self.ensure_financially_mutable(&record)?;
        salary.validate()?;

        record.salary = salary;
        record.company = snapshot.company.clone();
        record.currency = snapshot.currency.clone();
        record.last_edited_at = self.clock.now();
        record.edited_by = editor.to_string();

        self.store.update_record(&record).await?;
        debug!(record_id = record.id, period = %record.period, "Payroll record recomputed");
        Ok(record)
    }

    /// Metadata-only write, allowed for any period. Financial fields are left as stored.
    pub async fn touch(
        &self,
        mut record: PayrollRecord,
        status: Option<PayrollStatus>,
        editor: &str,
    ) -> PayrollResult<PayrollRecord> {
        if let Some(next) = status {
            ensure_transition(record.status, next)?;
            record.status = next;
        }
        record.last_edited_at = self.clock.now();
        record.edited_by = editor.to_string();

        self.store.update_record(&record).await?;
        debug!(record_id = record.id, status = %record.status, "Payroll record metadata updated");
        Ok(record)
    }

    /// Manual component edit. Current period only.
    pub async fn edit(
        &self,
        id: u64,
        overrides: &ComponentOverrides,
        editor: &str,
    ) -> PayrollResult<PayrollRecord> {
        let key = self.find(id).await?.key();
        let _guard = self.lock(key).await;

        // re-read under the lock
        let record = self.find(id).await?;
        self.ensure_financially_mutable(&record)?;

        let salary = record.salary.with_overrides(overrides)?;
        let snapshot = SettingsSnapshot {
            company: record.company.clone(),
            currency: record.currency.clone(),
        };
        let updated = self.recompute(record, salary, &snapshot, editor).await?;

        info!(record_id = id, editor, "Payroll record edited");
        Ok(updated)
    }

    pub async fn set_status(
        &self,
        id: u64,
        status: PayrollStatus,
        editor: &str,
    ) -> PayrollResult<PayrollRecord> {
        let key = self.find(id).await?.key();
        let _guard = self.lock(key).await;

        let record = self.find(id).await?;
        let updated = self.touch(record, Some(status), editor).await?;

        info!(record_id = id, %status, editor, "Payroll status changed");
        Ok(updated)
    }

    /// Deletes every record of a past period and returns how many went.
    pub async fn delete_period(&self, period: Period) -> PayrollResult<u64> {
        match self.phase_of(period) {
            PeriodPhase::Past => {}
            PeriodPhase::Current => {
                return Err(PayrollError::CurrentPeriodProtected(format!(
                    "payroll for {} is the current period and cannot be deleted",
                    period.label()
                )));
            }
            PeriodPhase::Future => {
                return Err(PayrollError::CurrentPeriodProtected(format!(
                    "payroll for {} has not been closed and cannot be deleted",
                    period.label()
                )));
            }
        }

        let deleted = self.store.delete_period(period).await?;
        info!(%period, deleted, "Payroll period deleted");
        Ok(deleted)
    }

    /// Period summaries, newest first.
    pub async fn history(&self) -> PayrollResult<Vec<PeriodSummary>> {
        let mut totals = self.store.period_totals().await?;
        totals.sort_by(|a, b| b.period.cmp(&a.period));

        let today = self.clock.today();
        Ok(totals
            .into_iter()
            .map(|t| PeriodSummary {
                month: t.period.month,
                year: t.period.year,
                label: t.period.label(),
                employee_count: t.employee_count,
                paid_count: t.paid_count,
                total_gross: t.total_gross,
                total_deductions: t.total_deductions,
                total_net: t.total_net,
                is_current_month: t.period.is_current(today),
            })
            .collect())
    }

    fn ensure_financially_mutable(&self, record: &PayrollRecord) -> PayrollResult<()> {
        match self.phase_of(record.period) {
            PeriodPhase::Current => Ok(()),
            _ => Err(PayrollError::Immutable(format!(
                "payroll record {} for {} is closed; only status can change",
                record.id,
                record.period.label()
            ))),
        }
    }
}

fn ensure_transition(from: PayrollStatus, to: PayrollStatus) -> PayrollResult<()> {
    match (from, to) {
        (PayrollStatus::Paid, PayrollStatus::Processed) => Err(PayrollError::Validation(
            "a paid payroll record cannot return to processed".into(),
        )),
        _ => Ok(()),
    }
}
