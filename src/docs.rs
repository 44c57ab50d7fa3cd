use crate::api::payroll::{DeletePeriodResponse, PeriodQuery, RunPayrollRequest, UpdateStatusRequest};
use crate::api::salary::CalculateRequest;
use crate::model::employee::EmployeeIdentity;
use crate::model::payroll::{PayrollRecord, PayrollStatus, Period};
use crate::model::salary::{
    ComponentOverrides, Deductions, Earnings, EmployerContributions, SalaryBreakdown, SalaryProfile,
};
use crate::model::snapshot::{CompanySnapshot, CurrencySnapshot, SettingsSnapshot};
use crate::payroll::ledger::{PayrollRecordView, PeriodSummary};
use crate::payroll::orchestrator::{RunFailure, RunResult};
use crate::payroll::payslip::{PayslipEmployee, PayslipLine, PayslipView};
use crate::payroll::service::{EmployeeSalaryRow, SalaryUpdate};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HRM Payroll API",
        version = "1.0.0",
        description = r#"
## Payroll Processing

Salary structures and monthly payroll for the **HRM** system.

### 🔹 Key Features
- **Salary Management**
  - Compute a component breakdown from annual CTC
  - Keep an append-only salary history per employee
- **Payroll Runs**
  - Run, re-run and edit the current month
  - Closed months keep the figures, company details and currency they were paid with
- **Payslips**
  - Rendered from the record's own snapshot, identical on every read

### 🔐 Security
All endpoints require **JWT Bearer authentication**.
Only **Admin** or **HR** can change salaries and run payroll; employees can read their own salary and payslips.

### 📦 Response Format
- JSON-based RESTful responses
- Errors as `{"error": CODE, "message": ...}`

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::salary::calculate_salary,
        crate::api::salary::list_salaries,
        crate::api::salary::update_salary,
        crate::api::salary::get_salary,
        crate::api::salary::salary_history,

        crate::api::payroll::run_payroll,
        crate::api::payroll::run_individual_payroll,
        crate::api::payroll::rerun_payroll,
        crate::api::payroll::payroll_history,
        crate::api::payroll::list_period,
        crate::api::payroll::delete_period,
        crate::api::payroll::get_payroll,
        crate::api::payroll::update_payroll,
        crate::api::payroll::update_status,
        crate::api::payroll::get_payslip
    ),
    components(
        schemas(
            CalculateRequest,
            SalaryUpdate,
            ComponentOverrides,
            Earnings,
            Deductions,
            EmployerContributions,
            SalaryBreakdown,
            SalaryProfile,
            EmployeeIdentity,
            EmployeeSalaryRow,
            Period,
            PeriodQuery,
            RunPayrollRequest,
            UpdateStatusRequest,
            DeletePeriodResponse,
            PayrollStatus,
            PayrollRecord,
            PayrollRecordView,
            PeriodSummary,
            RunFailure,
            RunResult,
            CompanySnapshot,
            CurrencySnapshot,
            SettingsSnapshot,
            PayslipLine,
            PayslipEmployee,
            PayslipView
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Salary", description = "Salary structure APIs"),
        (name = "Payroll", description = "Payroll management APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
