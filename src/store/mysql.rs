use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, MySqlPool};
use tracing::debug;

use crate::error::{PayrollError, PayrollResult};
use crate::model::employee::EmployeeIdentity;
use crate::model::payroll::{
    NewPayrollRecord, PayrollRecord, PayrollStatus, Period, PeriodKey, PeriodTotals,
};
use crate::model::salary::{
    Deductions, EmployerContributions, Earnings, NewSalaryProfile, SalaryBreakdown, SalaryProfile,
};
use crate::model::snapshot::{CompanySettings, CompanySnapshot, CurrencySnapshot};
use crate::store::{EmployeeDirectory, PayrollStore, SalaryProfileStore, SettingsStore};

const EMPLOYEE_SELECT: &str = r#"
    SELECT
        e.id,
        COALESCE(e.employee_code, '') AS employee_code,
        e.first_name,
        COALESCE(e.last_name, '') AS last_name,
        d.name AS department,
        j.title AS designation,
        e.hire_date,
        COALESCE(e.status, 'active') AS status
    FROM employees e
    LEFT JOIN departments d ON d.id = e.department_id
    LEFT JOIN job_titles j ON j.id = e.job_title_id
"#;

const PROFILE_COLUMNS: &str = r#"
    id, employee_id, ctc, monthly_ctc,
    basic, hra, fixed_allowance, conveyance_allowance, children_education_allowance,
    medical_allowance, shift_allowance, mobile_internet_allowance,
    employee_epf, employee_esi, professional_tax, employer_epf, employer_esi,
    effective_from, created_at, created_by
"#;

const RECORD_COLUMNS: &str = r#"
    id, employee_id, month, year, ctc, monthly_ctc,
    basic, hra, fixed_allowance, conveyance_allowance, children_education_allowance,
    medical_allowance, shift_allowance, mobile_internet_allowance,
    employee_epf, employee_esi, professional_tax, employer_epf, employer_esi,
    company_name, company_logo_url, company_address,
    currency_code, currency_symbol, currency_display, exchange_rate,
    status, created_at, last_edited_at, edited_by
"#;

/// Financial columns shared by `salary_profiles` and `payroll_records`.
#[derive(FromRow)]
struct SalaryColumns {
    ctc: Decimal,
    monthly_ctc: i64,
    basic: i64,
    hra: i64,
    fixed_allowance: i64,
    conveyance_allowance: i64,
    children_education_allowance: i64,
    medical_allowance: i64,
    shift_allowance: i64,
    mobile_internet_allowance: i64,
    employee_epf: i64,
    employee_esi: i64,
    professional_tax: i64,
    employer_epf: i64,
    employer_esi: i64,
}

impl From<SalaryColumns> for SalaryBreakdown {
    fn from(c: SalaryColumns) -> Self {
        // stored totals are for reporting; the domain re-derives them
        SalaryBreakdown::from_components(
            c.ctc,
            c.monthly_ctc,
            Earnings {
                basic: c.basic,
                hra: c.hra,
                fixed_allowance: c.fixed_allowance,
                conveyance_allowance: c.conveyance_allowance,
                children_education_allowance: c.children_education_allowance,
                medical_allowance: c.medical_allowance,
                shift_allowance: c.shift_allowance,
                mobile_internet_allowance: c.mobile_internet_allowance,
            },
            Deductions {
                employee_epf: c.employee_epf,
                employee_esi: c.employee_esi,
                professional_tax: c.professional_tax,
            },
            EmployerContributions {
                employer_epf: c.employer_epf,
                employer_esi: c.employer_esi,
            },
        )
    }
}

#[derive(FromRow)]
struct ProfileRow {
    id: u64,
    employee_id: u64,
    #[sqlx(flatten)]
    salary: SalaryColumns,
    effective_from: NaiveDate,
    created_at: DateTime<Utc>,
    created_by: String,
}

impl From<ProfileRow> for SalaryProfile {
    fn from(row: ProfileRow) -> Self {
        SalaryProfile {
            id: row.id,
            employee_id: row.employee_id,
            salary: row.salary.into(),
            effective_from: row.effective_from,
            created_at: row.created_at,
            created_by: row.created_by,
        }
    }
}

#[derive(FromRow)]
struct RecordRow {
    id: u64,
    employee_id: u64,
    month: u32,
    year: i32,
    #[sqlx(flatten)]
    salary: SalaryColumns,
    company_name: String,
    company_logo_url: Option<String>,
    company_address: Option<String>,
    currency_code: String,
    currency_symbol: String,
    currency_display: String,
    exchange_rate: Decimal,
    status: String,
    created_at: DateTime<Utc>,
    last_edited_at: DateTime<Utc>,
    edited_by: String,
}

impl TryFrom<RecordRow> for PayrollRecord {
    type Error = PayrollError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<PayrollStatus>().map_err(|_| {
            PayrollError::Database(format!(
                "payroll record {} has unknown status {:?}",
                row.id, row.status
            ))
        })?;

        Ok(PayrollRecord {
            id: row.id,
            employee_id: row.employee_id,
            period: Period {
                year: row.year,
                month: row.month,
            },
            salary: row.salary.into(),
            company: CompanySnapshot {
                name: row.company_name,
                logo_url: row.company_logo_url,
                address: row.company_address,
            },
            currency: CurrencySnapshot {
                code: row.currency_code,
                symbol: row.currency_symbol,
                display: row.currency_display,
                exchange_rate: row.exchange_rate,
            },
            status,
            created_at: row.created_at,
            last_edited_at: row.last_edited_at,
            edited_by: row.edited_by,
        })
    }
}

#[derive(FromRow)]
struct TotalsRow {
    month: u32,
    year: i32,
    employee_count: i64,
    paid_count: i64,
    total_gross: i64,
    total_deductions: i64,
    total_net: i64,
}

pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EmployeeDirectory for MySqlStore {
    async fn find_employee(&self, employee_id: u64) -> PayrollResult<Option<EmployeeIdentity>> {
        let sql = format!("{EMPLOYEE_SELECT} WHERE e.id = ?");
        let employee = sqlx::query_as::<_, EmployeeIdentity>(&sql)
            .bind(employee_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(employee)
    }

    async fn list_active_employees(&self) -> PayrollResult<Vec<EmployeeIdentity>> {
        let sql = format!("{EMPLOYEE_SELECT} WHERE e.status = 'active' ORDER BY e.id");
        let employees = sqlx::query_as::<_, EmployeeIdentity>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(employees)
    }
}

#[async_trait]
impl SettingsStore for MySqlStore {
    async fn company_settings(&self) -> PayrollResult<Option<CompanySettings>> {
        let settings = sqlx::query_as::<_, CompanySettings>(
            r#"
            SELECT company_name, logo_url, address,
                   currency_code, currency_symbol, currency_display, exchange_rate
            FROM company_settings
            WHERE id = 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(settings)
    }
}

#[async_trait]
impl SalaryProfileStore for MySqlStore {
    async fn append_profile(&self, profile: NewSalaryProfile) -> PayrollResult<SalaryProfile> {
        let s = &profile.salary;
        let e = s.earnings();
        let d = s.deductions();
        let c = s.employer_contributions();

        let result = sqlx::query(
            r#"
            INSERT INTO salary_profiles
            (employee_id, ctc, monthly_ctc,
             basic, hra, fixed_allowance, conveyance_allowance, children_education_allowance,
             medical_allowance, shift_allowance, mobile_internet_allowance,
             employee_epf, employee_esi, professional_tax, employer_epf, employer_esi,
             gross_earnings, total_deductions, net_pay,
             effective_from, created_at, created_by)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(profile.employee_id)
        .bind(s.ctc())
        .bind(s.monthly_ctc())
        .bind(e.basic)
        .bind(e.hra)
        .bind(e.fixed_allowance)
        .bind(e.conveyance_allowance)
        .bind(e.children_education_allowance)
        .bind(e.medical_allowance)
        .bind(e.shift_allowance)
        .bind(e.mobile_internet_allowance)
        .bind(d.employee_epf)
        .bind(d.employee_esi)
        .bind(d.professional_tax)
        .bind(c.employer_epf)
        .bind(c.employer_esi)
        .bind(s.gross_earnings())
        .bind(s.total_deductions())
        .bind(s.net_pay())
        .bind(profile.effective_from)
        .bind(profile.created_at)
        .bind(&profile.created_by)
        .execute(&self.pool)
        .await?;

        debug!(
            employee_id = profile.employee_id,
            profile_id = result.last_insert_id(),
            "Salary profile appended"
        );

        Ok(SalaryProfile {
            id: result.last_insert_id(),
            employee_id: profile.employee_id,
            salary: profile.salary,
            effective_from: profile.effective_from,
            created_at: profile.created_at,
            created_by: profile.created_by,
        })
    }

    async fn latest_profile(&self, employee_id: u64) -> PayrollResult<Option<SalaryProfile>> {
        let sql = format!(
            "SELECT {PROFILE_COLUMNS} FROM salary_profiles WHERE employee_id = ? \
             ORDER BY effective_from DESC, id DESC LIMIT 1"
        );
        let row = sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(employee_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(SalaryProfile::from))
    }

    async fn profile_history(&self, employee_id: u64) -> PayrollResult<Vec<SalaryProfile>> {
        let sql = format!(
            "SELECT {PROFILE_COLUMNS} FROM salary_profiles WHERE employee_id = ? \
             ORDER BY effective_from DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(employee_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(SalaryProfile::from).collect())
    }
}

#[async_trait]
impl PayrollStore for MySqlStore {
    async fn insert_record(&self, record: NewPayrollRecord) -> PayrollResult<PayrollRecord> {
        let s = &record.salary;
        let e = s.earnings();
        let d = s.deductions();
        let c = s.employer_contributions();

        let result = sqlx::query(
            r#"
            INSERT INTO payroll_records
            (employee_id, month, year, ctc, monthly_ctc,
             basic, hra, fixed_allowance, conveyance_allowance, children_education_allowance,
             medical_allowance, shift_allowance, mobile_internet_allowance,
             employee_epf, employee_esi, professional_tax, employer_epf, employer_esi,
             gross_earnings, total_deductions, net_pay,
             company_name, company_logo_url, company_address,
             currency_code, currency_symbol, currency_display, exchange_rate,
             status, created_at, last_edited_at, edited_by)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                    ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.employee_id)
        .bind(record.period.month)
        .bind(record.period.year)
        .bind(s.ctc())
        .bind(s.monthly_ctc())
        .bind(e.basic)
        .bind(e.hra)
        .bind(e.fixed_allowance)
        .bind(e.conveyance_allowance)
        .bind(e.children_education_allowance)
        .bind(e.medical_allowance)
        .bind(e.shift_allowance)
        .bind(e.mobile_internet_allowance)
        .bind(d.employee_epf)
        .bind(d.employee_esi)
        .bind(d.professional_tax)
        .bind(c.employer_epf)
        .bind(c.employer_esi)
        .bind(s.gross_earnings())
        .bind(s.total_deductions())
        .bind(s.net_pay())
        .bind(&record.company.name)
        .bind(&record.company.logo_url)
        .bind(&record.company.address)
        .bind(&record.currency.code)
        .bind(&record.currency.symbol)
        .bind(&record.currency.display)
        .bind(record.currency.exchange_rate)
        .bind(record.status.as_ref())
        .bind(record.created_at)
        .bind(record.created_at)
        .bind(&record.edited_by)
        .execute(&self.pool)
        .await?;

        Ok(PayrollRecord {
            id: result.last_insert_id(),
            employee_id: record.employee_id,
            period: record.period,
            salary: record.salary,
            company: record.company,
            currency: record.currency,
            status: record.status,
            created_at: record.created_at,
            last_edited_at: record.created_at,
            edited_by: record.edited_by,
        })
    }

    async fn find_record(&self, id: u64) -> PayrollResult<Option<PayrollRecord>> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM payroll_records WHERE id = ?");
        let row = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(PayrollRecord::try_from).transpose()
    }

    async fn find_record_by_key(&self, key: PeriodKey) -> PayrollResult<Option<PayrollRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM payroll_records \
             WHERE employee_id = ? AND month = ? AND year = ?"
        );
        let row = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(key.employee_id)
            .bind(key.period.month)
            .bind(key.period.year)
            .fetch_optional(&self.pool)
            .await?;
        row.map(PayrollRecord::try_from).transpose()
    }

    async fn update_record(&self, record: &PayrollRecord) -> PayrollResult<()> {
        let s = &record.salary;
        let e = s.earnings();
        let d = s.deductions();
        let c = s.employer_contributions();

        let result = sqlx::query(
            r#"
            UPDATE payroll_records
            SET ctc = ?, monthly_ctc = ?,
                basic = ?, hra = ?, fixed_allowance = ?, conveyance_allowance = ?,
                children_education_allowance = ?, medical_allowance = ?, shift_allowance = ?,
                mobile_internet_allowance = ?,
                employee_epf = ?, employee_esi = ?, professional_tax = ?,
                employer_epf = ?, employer_esi = ?,
                gross_earnings = ?, total_deductions = ?, net_pay = ?,
                company_name = ?, company_logo_url = ?, company_address = ?,
                currency_code = ?, currency_symbol = ?, currency_display = ?, exchange_rate = ?,
                status = ?, last_edited_at = ?, edited_by = ?
            WHERE id = ?
            "#,
        )
        .bind(s.ctc())
        .bind(s.monthly_ctc())
        .bind(e.basic)
        .bind(e.hra)
        .bind(e.fixed_allowance)
        .bind(e.conveyance_allowance)
        .bind(e.children_education_allowance)
        .bind(e.medical_allowance)
        .bind(e.shift_allowance)
        .bind(e.mobile_internet_allowance)
        .bind(d.employee_epf)
        .bind(d.employee_esi)
        .bind(d.professional_tax)
        .bind(c.employer_epf)
        .bind(c.employer_esi)
        .bind(s.gross_earnings())
        .bind(s.total_deductions())
        .bind(s.net_pay())
        .bind(&record.company.name)
        .bind(&record.company.logo_url)
        .bind(&record.company.address)
        .bind(&record.currency.code)
        .bind(&record.currency.symbol)
        .bind(&record.currency.display)
        .bind(record.currency.exchange_rate)
        .bind(record.status.as_ref())
        .bind(record.last_edited_at)
        .bind(&record.edited_by)
        .bind(record.id)
        .execute(&self.pool)
        .await?;

        // MySQL reports 0 affected rows when nothing changed, so confirm the row exists
        if result.rows_affected() == 0 && self.find_record(record.id).await?.is_none() {
            return Err(PayrollError::NotFound(format!(
                "payroll record {} not found",
                record.id
            )));
        }
        Ok(())
    }

    async fn list_period(&self, period: Period) -> PayrollResult<Vec<PayrollRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM payroll_records \
             WHERE month = ? AND year = ? ORDER BY employee_id"
        );
        let rows = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(period.month)
            .bind(period.year)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(PayrollRecord::try_from).collect()
    }

    async fn period_totals(&self) -> PayrollResult<Vec<PeriodTotals>> {
        let rows = sqlx::query_as::<_, TotalsRow>(
            r#"
            SELECT
                month,
                year,
                COUNT(*) AS employee_count,
                CAST(SUM(status = 'paid') AS SIGNED) AS paid_count,
                CAST(SUM(gross_earnings) AS SIGNED) AS total_gross,
                CAST(SUM(total_deductions) AS SIGNED) AS total_deductions,
                CAST(SUM(net_pay) AS SIGNED) AS total_net
            FROM payroll_records
            GROUP BY year, month
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| PeriodTotals {
                period: Period {
                    year: r.year,
                    month: r.month,
                },
                employee_count: r.employee_count.max(0) as u64,
                paid_count: r.paid_count.max(0) as u64,
                total_gross: r.total_gross,
                total_deductions: r.total_deductions,
                total_net: r.total_net,
            })
            .collect())
    }

    async fn delete_period(&self, period: Period) -> PayrollResult<u64> {
        let result = sqlx::query("DELETE FROM payroll_records WHERE month = ? AND year = ?")
            .bind(period.month)
            .bind(period.year)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
