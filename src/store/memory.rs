use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{PayrollError, PayrollResult};
use crate::model::employee::EmployeeIdentity;
use crate::model::payroll::{
    NewPayrollRecord, PayrollRecord, PayrollStatus, Period, PeriodKey, PeriodTotals,
};
use crate::model::salary::{NewSalaryProfile, SalaryProfile};
use crate::model::snapshot::CompanySettings;
use crate::store::{EmployeeDirectory, PayrollStore, SalaryProfileStore, SettingsStore};

#[derive(Default)]
struct Inner {
    employees: BTreeMap<u64, EmployeeIdentity>,
    settings: Option<CompanySettings>,
    profiles: Vec<SalaryProfile>,
    records: BTreeMap<u64, PayrollRecord>,
    next_profile_id: u64,
    next_record_id: u64,
}

/// Process-local store implementing every seam. Each call holds one lock, so
/// single-row writes are atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Stands in for the directory service.
    pub fn upsert_employee(&self, employee: EmployeeIdentity) {
        self.lock().employees.insert(employee.id, employee);
    }

    /// Stands in for the settings service.
    pub fn set_company_settings(&self, settings: Option<CompanySettings>) {
        self.lock().settings = settings;
    }

    pub fn record_count(&self) -> usize {
        self.lock().records.len()
    }
}

#[async_trait]
impl EmployeeDirectory for MemoryStore {
    async fn find_employee(&self, employee_id: u64) -> PayrollResult<Option<EmployeeIdentity>> {
        Ok(self.lock().employees.get(&employee_id).cloned())
    }

    async fn list_active_employees(&self) -> PayrollResult<Vec<EmployeeIdentity>> {
        Ok(self
            .lock()
            .employees
            .values()
            .filter(|e| e.is_active())
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn company_settings(&self) -> PayrollResult<Option<CompanySettings>> {
        Ok(self.lock().settings.clone())
    }
}

#[async_trait]
impl SalaryProfileStore for MemoryStore {
    async fn append_profile(&self, profile: NewSalaryProfile) -> PayrollResult<SalaryProfile> {
        let mut inner = self.lock();
        inner.next_profile_id += 1;

        let stored = SalaryProfile {
            id: inner.next_profile_id,
            employee_id: profile.employee_id,
            salary: profile.salary,
            effective_from: profile.effective_from,
            created_at: profile.created_at,
            created_by: profile.created_by,
        };
        inner.profiles.push(stored.clone());
        Ok(stored)
    }

    async fn latest_profile(&self, employee_id: u64) -> PayrollResult<Option<SalaryProfile>> {
        Ok(self
            .lock()
            .profiles
            .iter()
            .filter(|p| p.employee_id == employee_id)
            .max_by_key(|p| (p.effective_from, p.id))
            .cloned())
    }

    async fn profile_history(&self, employee_id: u64) -> PayrollResult<Vec<SalaryProfile>> {
        let mut history: Vec<_> = self
            .lock()
            .profiles
            .iter()
            .filter(|p| p.employee_id == employee_id)
            .cloned()
            .collect();
        history.sort_by_key(|p| std::cmp::Reverse((p.effective_from, p.id)));
        Ok(history)
    }
}

#[async_trait]
impl PayrollStore for MemoryStore {
    async fn insert_record(&self, record: NewPayrollRecord) -> PayrollResult<PayrollRecord> {
        let mut inner = self.lock();
        let key = PeriodKey::new(record.employee_id, record.period);

        if inner.records.values().any(|r| r.key() == key) {
            return Err(PayrollError::Conflict(format!(
                "payroll already exists for {key}"
            )));
        }

        inner.next_record_id += 1;
        let stored = PayrollRecord {
            id: inner.next_record_id,
            employee_id: record.employee_id,
            period: record.period,
            salary: record.salary,
            company: record.company,
            currency: record.currency,
            status: record.status,
            created_at: record.created_at,
            last_edited_at: record.created_at,
            edited_by: record.edited_by,
        };
        inner.records.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_record(&self, id: u64) -> PayrollResult<Option<PayrollRecord>> {
        Ok(self.lock().records.get(&id).cloned())
    }

    async fn find_record_by_key(&self, key: PeriodKey) -> PayrollResult<Option<PayrollRecord>> {
        Ok(self
            .lock()
            .records
            .values()
            .find(|r| r.key() == key)
            .cloned())
    }

    async fn update_record(&self, record: &PayrollRecord) -> PayrollResult<()> {
        let mut inner = self.lock();
        match inner.records.get_mut(&record.id) {
            Some(slot) => {
                *slot = record.clone();
                Ok(())
            }
            None => Err(PayrollError::NotFound(format!(
                "payroll record {} not found",
                record.id
            ))),
        }
    }

    async fn list_period(&self, period: Period) -> PayrollResult<Vec<PayrollRecord>> {
        Ok(self
            .lock()
            .records
            .values()
            .filter(|r| r.period == period)
            .cloned()
            .collect())
    }

    async fn period_totals(&self) -> PayrollResult<Vec<PeriodTotals>> {
        let inner = self.lock();
        let mut totals: BTreeMap<Period, PeriodTotals> = BTreeMap::new();

        for r in inner.records.values() {
            let t = totals.entry(r.period).or_insert(PeriodTotals {
                period: r.period,
                employee_count: 0,
                paid_count: 0,
                total_gross: 0,
                total_deductions: 0,
                total_net: 0,
            });
            t.employee_count += 1;
            if r.status == PayrollStatus::Paid {
                t.paid_count += 1;
            }
            t.total_gross += r.salary.gross_earnings();
            t.total_deductions += r.salary.total_deductions();
            t.total_net += r.salary.net_pay();
        }

        Ok(totals.into_values().collect())
    }

    async fn delete_period(&self, period: Period) -> PayrollResult<u64> {
        let mut inner = self.lock();
        let before = inner.records.len();
        inner.records.retain(|_, r| r.period != period);
        Ok((before - inner.records.len()) as u64)
    }
}
