use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal_macros::dec;

use hrm_payroll::error::{PayrollError, PayrollResult};
use hrm_payroll::model::employee::EmployeeIdentity;
use hrm_payroll::model::payroll::{
    NewPayrollRecord, PayrollRecord, PayrollStatus, Period, PeriodKey, PeriodTotals,
};
use hrm_payroll::model::salary::ComponentOverrides;
use hrm_payroll::model::snapshot::CompanySettings;
use hrm_payroll::payroll::PayrollService;
use hrm_payroll::payroll::clock::ManualClock;
use hrm_payroll::payroll::service::SalaryUpdate;
use hrm_payroll::store::{MemoryStore, PayrollStore};

struct Harness {
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
    service: PayrollService,
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn employee(id: u64, first_name: &str) -> EmployeeIdentity {
    EmployeeIdentity {
        id,
        employee_code: format!("EMP-{id:03}"),
        first_name: first_name.into(),
        last_name: "Doe".into(),
        department: Some("Engineering".into()),
        designation: Some("Software Engineer".into()),
        hire_date: day(2024, 1, 1),
        status: "active".into(),
    }
}

fn settings(name: &str, code: &str, symbol: &str) -> CompanySettings {
    CompanySettings {
        company_name: Some(name.into()),
        currency_code: Some(code.into()),
        currency_symbol: Some(symbol.into()),
        ..Default::default()
    }
}

fn harness(today: NaiveDate) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::on(today));
    let service = PayrollService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        clock.clone(),
        4,
    );
    Harness {
        store,
        clock,
        service,
    }
}

/// Record store that can be told to misbehave.
struct FlakyRecords {
    inner: Arc<MemoryStore>,
    /// `update_record` fails with a database error.
    fail_updates: AtomicBool,
    /// The period is deleted right after a key lookup, as a concurrent delete would.
    delete_after_lookup: AtomicBool,
}

impl FlakyRecords {
    fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            fail_updates: AtomicBool::new(false),
            delete_after_lookup: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl PayrollStore for FlakyRecords {
    async fn insert_record(&self, record: NewPayrollRecord) -> PayrollResult<PayrollRecord> {
        self.inner.insert_record(record).await
    }

    async fn find_record(&self, id: u64) -> PayrollResult<Option<PayrollRecord>> {
        self.inner.find_record(id).await
    }

    async fn find_record_by_key(&self, key: PeriodKey) -> PayrollResult<Option<PayrollRecord>> {
        let found = self.inner.find_record_by_key(key).await?;
        if self.delete_after_lookup.load(Ordering::SeqCst) {
            self.inner.delete_period(key.period).await?;
        }
        Ok(found)
    }

    async fn update_record(&self, record: &PayrollRecord) -> PayrollResult<()> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(PayrollError::Database("connection reset".into()));
        }
        self.inner.update_record(record).await
    }

    async fn list_period(&self, period: Period) -> PayrollResult<Vec<PayrollRecord>> {
        self.inner.list_period(period).await
    }

    async fn period_totals(&self) -> PayrollResult<Vec<PeriodTotals>> {
        self.inner.period_totals().await
    }

    async fn delete_period(&self, period: Period) -> PayrollResult<u64> {
        self.inner.delete_period(period).await
    }
}

fn flaky_harness(today: NaiveDate) -> (Harness, Arc<FlakyRecords>) {
    let store = Arc::new(MemoryStore::new());
    let records = Arc::new(FlakyRecords::new(store.clone()));
    let clock = Arc::new(ManualClock::on(today));
    let service = PayrollService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        records.clone(),
        clock.clone(),
        4,
    );
    (
        Harness {
            store,
            clock,
            service,
        },
        records,
    )
}

fn ctc(amount: rust_decimal::Decimal) -> SalaryUpdate {
    SalaryUpdate {
        ctc: amount,
        overrides: None,
        effective_from: None,
    }
}

/// Lets detached tasks on the current arbiter run.
async fn settle() {
    for _ in 0..16 {
        actix_web::rt::task::yield_now().await;
    }
}

#[actix_web::test]
async fn running_a_period_twice_creates_then_updates() {
    let h = harness(day(2025, 10, 15));
    h.store.upsert_employee(employee(1, "John"));
    h.service.update_salary(1, ctc(dec!(600000)), "hr").await.unwrap();

    let first = h.service.run_payroll(10, 2025, None, "hr").await.unwrap();
    assert_eq!((first.created, first.updated, first.skipped), (1, 0, 0));

    let second = h.service.run_payroll(10, 2025, None, "hr").await.unwrap();
    assert_eq!((second.created, second.updated, second.skipped), (0, 1, 0));
    assert_ne!(first.run_id, second.run_id);

    assert_eq!(h.store.record_count(), 1);
}

#[actix_web::test]
async fn employees_without_salary_are_skipped() {
    let h = harness(day(2025, 10, 15));
    h.store.upsert_employee(employee(1, "John"));
    h.store.upsert_employee(employee(2, "Jane"));
    h.service.update_salary(1, ctc(dec!(600000)), "hr").await.unwrap();

    let result = h.service.run_payroll(10, 2025, None, "hr").await.unwrap();
    assert_eq!(result.created, 1);
    assert_eq!(result.skipped, 1);
    assert!(result.failed.is_empty());
}

#[actix_web::test]
async fn inactive_employees_are_left_out_of_bulk_runs() {
    let h = harness(day(2025, 10, 15));
    let mut leaver = employee(3, "Max");
    leaver.status = "terminated".into();
    h.store.upsert_employee(leaver);
    h.service.update_salary(3, ctc(dec!(360000)), "hr").await.unwrap();

    let bulk = h.service.run_payroll(10, 2025, None, "hr").await.unwrap();
    assert_eq!(bulk.created + bulk.updated + bulk.skipped, 0);

    // explicit targeting still works
    let targeted = h.service.run_payroll(10, 2025, Some(vec![3]), "hr").await.unwrap();
    assert_eq!(targeted.created, 1);
}

#[actix_web::test]
async fn future_periods_cannot_be_run() {
    let h = harness(day(2025, 10, 15));
    let err = h.service.run_payroll(11, 2025, None, "hr").await.unwrap_err();
    assert!(matches!(err, PayrollError::InvalidInput(_)));

    let err = h.service.run_payroll(13, 2025, None, "hr").await.unwrap_err();
    assert!(matches!(err, PayrollError::InvalidInput(_)));
}

#[actix_web::test]
async fn individual_run_requires_known_employee() {
    let h = harness(day(2025, 10, 15));
    let err = h
        .service
        .run_individual_payroll(10, 2025, 42, "hr")
        .await
        .unwrap_err();
    assert!(matches!(err, PayrollError::NotFound(_)));

    h.store.upsert_employee(employee(42, "Ada"));
    h.service.update_salary(42, ctc(dec!(1200000)), "hr").await.unwrap();
    let result = h
        .service
        .run_individual_payroll(10, 2025, 42, "hr")
        .await
        .unwrap();
    assert_eq!(result.created, 1);
}

#[actix_web::test]
async fn closed_period_keeps_its_figures() {
    let h = harness(day(2025, 10, 31));
    h.store.upsert_employee(employee(1, "John"));
    h.service.update_salary(1, ctc(dec!(600000)), "hr").await.unwrap();
    h.service.run_payroll(10, 2025, None, "hr").await.unwrap();

    let record = h.service.list_payroll_for_period(10, 2025).await.unwrap().remove(0);
    assert!(record.is_current_month);
    assert_eq!(record.record.salary.net_pay(), 46625);

    h.clock.set_date(day(2025, 11, 1));

    // salary change after rollover must not reach October
    h.service.update_salary(1, ctc(dec!(1200000)), "hr").await.unwrap();
    settle().await;

    let rerun = h.service.run_payroll(10, 2025, None, "hr").await.unwrap();
    assert_eq!(rerun.updated, 1);

    let stored = h.service.get_payroll_record(record.record.id).await.unwrap();
    assert!(!stored.is_current_month);
    assert_eq!(stored.record.salary, record.record.salary);
    assert_eq!(stored.record.status, PayrollStatus::Processed);

    let overrides = ComponentOverrides {
        professional_tax: Some(200),
        ..Default::default()
    };
    let err = h
        .service
        .edit_payroll_record(record.record.id, &overrides, "hr")
        .await
        .unwrap_err();
    assert!(matches!(err, PayrollError::Immutable(_)));

    let err = h.service.rerun_payroll(10, 2025, "hr").await.unwrap_err();
    assert!(matches!(err, PayrollError::PastPeriodImmutable(_)));

    let paid = h
        .service
        .update_payroll_status(record.record.id, PayrollStatus::Paid, "finance")
        .await
        .unwrap();
    assert_eq!(paid.record.status, PayrollStatus::Paid);
    assert_eq!(paid.record.salary.net_pay(), 46625);
}

#[actix_web::test]
async fn rerun_then_edit_on_current_period() {
    let h = harness(day(2025, 10, 10));
    h.store.upsert_employee(employee(1, "John"));
    h.service.update_salary(1, ctc(dec!(600000)), "hr").await.unwrap();
    h.service.run_payroll(10, 2025, None, "hr").await.unwrap();

    h.service.update_salary(1, ctc(dec!(1200000)), "hr").await.unwrap();
    let rerun = h.service.rerun_payroll(10, 2025, "hr").await.unwrap();
    assert_eq!((rerun.created, rerun.updated), (0, 1));

    let id = h.service.list_payroll_for_period(10, 2025).await.unwrap()[0].record.id;
    let overrides = ComponentOverrides {
        professional_tax: Some(200),
        ..Default::default()
    };
    let edited = h
        .service
        .edit_payroll_record(id, &overrides, "payroll.clerk")
        .await
        .unwrap();

    let salary = &edited.record.salary;
    assert_eq!(salary.gross_earnings(), 100000);
    assert_eq!(salary.deductions().professional_tax, 200);
    assert_eq!(salary.net_pay(), salary.gross_earnings() - salary.total_deductions());
    assert_eq!(edited.record.edited_by, "payroll.clerk");
}

#[actix_web::test]
async fn rerun_never_creates_records() {
    let h = harness(day(2025, 10, 10));
    h.store.upsert_employee(employee(1, "John"));
    h.service.update_salary(1, ctc(dec!(600000)), "hr").await.unwrap();

    let rerun = h.service.rerun_payroll(10, 2025, "hr").await.unwrap();
    assert_eq!(rerun.created + rerun.updated, 0);
    assert_eq!(h.store.record_count(), 0);
}

#[actix_web::test]
async fn salary_update_syncs_into_current_payroll() {
    let h = harness(day(2025, 10, 10));
    h.store.upsert_employee(employee(1, "John"));
    h.service.update_salary(1, ctc(dec!(600000)), "hr").await.unwrap();
    h.service.run_payroll(10, 2025, None, "hr").await.unwrap();

    h.service.update_salary(1, ctc(dec!(1200000)), "hr").await.unwrap();
    settle().await;

    let record = h.service.list_payroll_for_period(10, 2025).await.unwrap().remove(0);
    assert_eq!(record.record.salary.gross_earnings(), 100000);
    assert_eq!(record.record.salary.net_pay(), 93250);
}

#[actix_web::test]
async fn sync_without_current_record_does_nothing() {
    let h = harness(day(2025, 10, 10));
    h.store.upsert_employee(employee(1, "John"));
    let profile = h.service.update_salary(1, ctc(dec!(600000)), "hr").await.unwrap();

    let synced = h.service.sync().propagate(&profile, "hr").await.unwrap();
    assert!(synced.is_none());
    assert_eq!(h.store.record_count(), 0);
}

#[actix_web::test]
async fn dispatched_sync_can_be_awaited() {
    let h = harness(day(2025, 10, 10));
    h.store.upsert_employee(employee(1, "John"));
    h.service.update_salary(1, ctc(dec!(360000)), "hr").await.unwrap();
    h.service.run_payroll(10, 2025, None, "hr").await.unwrap();

    let profile = h.service.update_salary(1, ctc(dec!(600000)), "hr").await.unwrap();
    h.service.sync().dispatch(profile, "hr".into()).await.unwrap();

    let record = h.service.list_payroll_for_period(10, 2025).await.unwrap().remove(0);
    assert_eq!(record.record.salary.net_pay(), 46625);
}

#[actix_web::test]
async fn failed_sync_stays_away_from_the_salary_caller() {
    let (h, records) = flaky_harness(day(2025, 10, 10));
    h.store.upsert_employee(employee(1, "John"));
    h.service.update_salary(1, ctc(dec!(600000)), "hr").await.unwrap();
    h.service.run_payroll(10, 2025, None, "hr").await.unwrap();

    records.fail_updates.store(true, Ordering::SeqCst);

    let profile = h.service.update_salary(1, ctc(dec!(1200000)), "hr").await.unwrap();
    assert_eq!(profile.salary.gross_earnings(), 100000);
    assert_eq!(h.service.get_salary_history(1).await.unwrap().len(), 2);

    let err = h.service.sync().propagate(&profile, "hr").await.unwrap_err();
    assert!(matches!(err, PayrollError::Database(_)));

    // the detached task swallows and logs the same failure
    h.service.sync().dispatch(profile, "hr".into()).await.unwrap();

    let record = h.service.list_payroll_for_period(10, 2025).await.unwrap().remove(0);
    assert_eq!(record.record.salary.gross_earnings(), 50000);
    assert_eq!(
        h.service.get_current_salary(1).await.unwrap().salary.gross_earnings(),
        100000
    );
}

#[actix_web::test]
async fn run_skips_records_deleted_mid_run() {
    let (h, records) = flaky_harness(day(2025, 10, 15));
    h.store.upsert_employee(employee(1, "John"));
    h.service.update_salary(1, ctc(dec!(600000)), "hr").await.unwrap();
    h.service.run_payroll(9, 2025, None, "hr").await.unwrap();
    assert_eq!(h.store.record_count(), 1);

    records.delete_after_lookup.store(true, Ordering::SeqCst);

    let result = h.service.run_payroll(9, 2025, None, "hr").await.unwrap();
    assert!(result.failed.is_empty());
    assert_eq!((result.created, result.updated, result.skipped), (0, 0, 1));
    assert_eq!(h.store.record_count(), 0);
}

#[actix_web::test]
async fn payslip_keeps_snapshot_after_settings_change() {
    let h = harness(day(2025, 10, 20));
    h.store.set_company_settings(Some(settings("Acme Corp", "INR", "₹")));
    h.store.upsert_employee(employee(1, "John"));
    h.service.update_salary(1, ctc(dec!(600000)), "hr").await.unwrap();
    h.service.run_payroll(10, 2025, None, "hr").await.unwrap();
    let id = h.service.list_payroll_for_period(10, 2025).await.unwrap()[0].record.id;

    let before = h.service.get_payslip(id).await.unwrap();
    assert_eq!(before.company.name, "Acme Corp");
    assert_eq!(before.net_pay_display, "₹46,625");
    assert_eq!(before.period, "October 2025");

    h.clock.set_date(day(2025, 11, 3));
    h.store.set_company_settings(Some(settings("Globex", "USD", "$")));
    h.service.update_salary(1, ctc(dec!(1200000)), "hr").await.unwrap();
    h.service.run_payroll(11, 2025, None, "hr").await.unwrap();
    settle().await;

    let after = h.service.get_payslip(id).await.unwrap();
    assert_eq!(after, before);

    let november = h.service.list_payroll_for_period(11, 2025).await.unwrap().remove(0);
    assert_eq!(november.record.company.name, "Globex");
    assert_eq!(november.record.currency.code, "USD");
}

#[actix_web::test]
async fn payslip_lists_non_zero_lines_in_order() {
    let h = harness(day(2025, 10, 20));
    h.store.upsert_employee(employee(1, "John"));
    h.service.update_salary(1, ctc(dec!(600000)), "hr").await.unwrap();
    h.service.run_payroll(10, 2025, None, "hr").await.unwrap();
    let id = h.service.list_payroll_for_period(10, 2025).await.unwrap()[0].record.id;

    let payslip = h.service.get_payslip(id).await.unwrap();
    let earnings: Vec<_> = payslip.earnings.iter().map(|l| l.label.as_str()).collect();
    assert_eq!(earnings[0], "Basic Salary");
    assert_eq!(earnings.len(), 8);

    // professional tax is zero and left out
    let deductions: Vec<_> = payslip.deductions.iter().map(|l| l.label.as_str()).collect();
    assert_eq!(deductions, vec!["Employee EPF", "Employee ESI"]);

    assert_eq!(payslip.employee.name, "John Doe");
    assert_eq!(payslip.company.name, "Company");
    assert_eq!(payslip.currency.display, "INR (₹)");
}

#[actix_web::test]
async fn delete_is_limited_to_past_periods() {
    let h = harness(day(2025, 9, 15));
    h.store.upsert_employee(employee(1, "John"));
    h.store.upsert_employee(employee(2, "Jane"));
    h.service.update_salary(1, ctc(dec!(600000)), "hr").await.unwrap();
    h.service.update_salary(2, ctc(dec!(360000)), "hr").await.unwrap();
    h.service.run_payroll(9, 2025, None, "hr").await.unwrap();

    let err = h.service.delete_payroll_for_period(9, 2025).await.unwrap_err();
    assert!(matches!(err, PayrollError::CurrentPeriodProtected(_)));

    h.clock.set_date(day(2025, 10, 1));
    assert_eq!(h.service.delete_payroll_for_period(9, 2025).await.unwrap(), 2);
    assert_eq!(h.store.record_count(), 0);

    let err = h.service.delete_payroll_for_period(12, 2025).await.unwrap_err();
    assert!(matches!(err, PayrollError::CurrentPeriodProtected(_)));
}

#[actix_web::test]
async fn history_groups_periods_newest_first() {
    let h = harness(day(2025, 8, 5));
    h.store.upsert_employee(employee(1, "John"));
    h.store.upsert_employee(employee(2, "Jane"));
    h.service.update_salary(1, ctc(dec!(600000)), "hr").await.unwrap();
    h.service.update_salary(2, ctc(dec!(360000)), "hr").await.unwrap();

    h.service.run_payroll(8, 2025, None, "hr").await.unwrap();
    h.clock.set_date(day(2025, 9, 5));
    h.service.run_payroll(9, 2025, Some(vec![1]), "hr").await.unwrap();

    let history = h.service.list_payroll_history().await.unwrap();
    let order: Vec<_> = history.iter().map(|p| (p.month, p.year)).collect();
    assert_eq!(order, vec![(9, 2025), (8, 2025)]);
    assert_eq!(history[0].employee_count, 1);
    assert!(history[0].is_current_month);
    assert_eq!(history[1].employee_count, 2);
    assert_eq!(history[1].total_net, 46625 + 27975);
    assert!(!history[1].is_current_month);
}

#[actix_web::test]
async fn salary_listing_zero_fills_missing_profiles() {
    let h = harness(day(2025, 10, 1));
    h.store.upsert_employee(employee(1, "John"));
    h.store.upsert_employee(employee(2, "Jane"));
    h.service.update_salary(1, ctc(dec!(600000)), "hr").await.unwrap();

    let rows = h.service.list_employee_salaries().await.unwrap();
    assert_eq!(rows.len(), 2);

    let jane = rows.iter().find(|r| r.employee.id == 2).unwrap();
    assert!(!jane.has_profile);
    assert_eq!(jane.salary.net_pay(), 0);
    assert_eq!(jane.effective_from, None);

    let john = rows.iter().find(|r| r.employee.id == 1).unwrap();
    assert!(john.has_profile);
    assert_eq!(john.salary.net_pay(), 46625);
}

#[actix_web::test]
async fn salary_history_is_append_only() {
    let h = harness(day(2025, 10, 1));
    h.store.upsert_employee(employee(1, "John"));

    let mut first = ctc(dec!(360000));
    first.effective_from = Some(day(2025, 4, 1));
    h.service.update_salary(1, first, "hr").await.unwrap();
    h.service.update_salary(1, ctc(dec!(600000)), "hr").await.unwrap();

    let history = h.service.get_salary_history(1).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].salary.net_pay(), 46625);
    assert_eq!(history[1].effective_from, day(2025, 4, 1));

    let current = h.service.get_current_salary(1).await.unwrap();
    assert_eq!(current.id, history[0].id);
}

#[actix_web::test]
async fn salary_update_validates_input() {
    let h = harness(day(2025, 10, 1));
    let err = h
        .service
        .update_salary(9, ctc(dec!(600000)), "hr")
        .await
        .unwrap_err();
    assert!(matches!(err, PayrollError::NotFound(_)));

    h.store.upsert_employee(employee(1, "John"));
    let err = h
        .service
        .update_salary(1, ctc(dec!(-1)), "hr")
        .await
        .unwrap_err();
    assert!(matches!(err, PayrollError::InvalidInput(_)));

    let update = SalaryUpdate {
        ctc: dec!(600000),
        overrides: Some(ComponentOverrides {
            professional_tax: Some(100_000),
            ..Default::default()
        }),
        effective_from: None,
    };
    let err = h.service.update_salary(1, update, "hr").await.unwrap_err();
    assert!(matches!(err, PayrollError::Validation(_)));
    assert!(h.service.get_salary_history(1).await.unwrap().is_empty());
}

#[actix_web::test]
async fn concurrent_runs_keep_one_record_per_employee() {
    let h = harness(day(2025, 10, 10));
    for id in 1..=5 {
        h.store.upsert_employee(employee(id, "Emp"));
        h.service.update_salary(id, ctc(dec!(600000)), "hr").await.unwrap();
    }

    let (a, b) = futures::join!(
        h.service.run_payroll(10, 2025, None, "hr"),
        h.service.run_payroll(10, 2025, None, "hr"),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.created + b.created, 5);
    assert_eq!(a.updated + b.updated, 5);
    assert_eq!(h.store.record_count(), 5);
}
