use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::error::PayrollError;
use crate::model::payroll::PayrollStatus;
use crate::model::salary::ComponentOverrides;
use crate::payroll::PayrollService;
use crate::payroll::ledger::PayrollRecordView;

#[derive(Deserialize, Serialize, IntoParams, ToSchema)]
pub struct PeriodQuery {
    #[schema(example = 10)]
    pub month: u32,

    #[schema(example = 2025)]
    pub year: i32,
}

#[derive(Deserialize, ToSchema)]
pub struct RunPayrollRequest {
    #[schema(example = 10)]
    pub month: u32,

    #[schema(example = 2025)]
    pub year: i32,

    /// Omit to run every active employee.
    #[schema(example = json!([1001, 1002]))]
    pub employee_ids: Option<Vec<u64>>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    #[schema(example = "paid")]
    pub status: PayrollStatus,
}

#[derive(Serialize, ToSchema)]
pub struct DeletePeriodResponse {
    #[schema(example = 10)]
    pub month: u32,
    #[schema(example = 2025)]
    pub year: i32,
    #[schema(example = 42)]
    pub deleted: u64,
}

/// Run payroll for a month
#[utoipa::path(
    post,
    path = "/api/payroll/run",
    request_body = RunPayrollRequest,
    responses(
        (status = 200, description = "Run finished; per-employee failures are listed", body = crate::payroll::orchestrator::RunResult),
        (status = 400, description = "Invalid or future period"),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn run_payroll(
    auth: AuthUser,
    service: web::Data<PayrollService>,
    body: web::Json<RunPayrollRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_payroll_manager()?;

    let body = body.into_inner();
    let result = service
        .run_payroll(body.month, body.year, body.employee_ids, auth.editor())
        .await?;

    Ok(HttpResponse::Ok().json(result))
}

/// Run payroll for one employee
#[utoipa::path(
    post,
    path = "/api/payroll/run/{employee_id}",
    request_body = PeriodQuery,
    params(
        ("employee_id", description = "Employee ID")
    ),
    responses(
        (status = 200, body = crate::payroll::orchestrator::RunResult),
        (status = 404, description = "Employee not found"),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn run_individual_payroll(
    auth: AuthUser,
    service: web::Data<PayrollService>,
    path: web::Path<u64>,
    body: web::Json<PeriodQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_payroll_manager()?;

    let employee_id = path.into_inner();
    let result = service
        .run_individual_payroll(body.month, body.year, employee_id, auth.editor())
        .await?;

    Ok(HttpResponse::Ok().json(result))
}

/// Recompute the current month from the latest salaries
#[utoipa::path(
    post,
    path = "/api/payroll/rerun",
    request_body = PeriodQuery,
    responses(
        (status = 200, body = crate::payroll::orchestrator::RunResult),
        (status = 422, description = "Period is not the current month", body = Object, example = json!({
            "error": "PAST_PERIOD_IMMUTABLE",
            "message": "Past period is immutable: only the current period can be rerun, September 2025 is not current"
        })),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn rerun_payroll(
    auth: AuthUser,
    service: web::Data<PayrollService>,
    body: web::Json<PeriodQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_payroll_manager()?;

    let result = service
        .rerun_payroll(body.month, body.year, auth.editor())
        .await?;

    Ok(HttpResponse::Ok().json(result))
}

/// Per-period totals, newest first
#[utoipa::path(
    get,
    path = "/api/payroll/history",
    responses(
        (status = 200, body = [crate::payroll::ledger::PeriodSummary]),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn payroll_history(
    auth: AuthUser,
    service: web::Data<PayrollService>,
) -> actix_web::Result<impl Responder> {
    auth.require_payroll_manager()?;

    let history = service.list_payroll_history().await?;
    Ok(HttpResponse::Ok().json(history))
}

#[utoipa::path(
    get,
    path = "/api/payroll/period",
    params(PeriodQuery),
    responses(
        (status = 200, body = [crate::payroll::ledger::PayrollRecordView]),
        (status = 400, description = "Invalid month or year"),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn list_period(
    auth: AuthUser,
    service: web::Data<PayrollService>,
    query: web::Query<PeriodQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_payroll_manager()?;

    let records = service
        .list_payroll_for_period(query.month, query.year)
        .await?;
    Ok(HttpResponse::Ok().json(records))
}

/// Delete every record of a closed month
#[utoipa::path(
    delete,
    path = "/api/payroll/period",
    params(PeriodQuery),
    responses(
        (status = 200, body = DeletePeriodResponse),
        (status = 422, description = "Current or future month", body = Object, example = json!({
            "error": "CURRENT_PERIOD_PROTECTED",
            "message": "Current period is protected: payroll for October 2025 is the current period and cannot be deleted"
        })),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn delete_period(
    auth: AuthUser,
    service: web::Data<PayrollService>,
    query: web::Query<PeriodQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_payroll_manager()?;

    let deleted = service
        .delete_payroll_for_period(query.month, query.year)
        .await?;

    Ok(HttpResponse::Ok().json(DeletePeriodResponse {
        month: query.month,
        year: query.year,
        deleted,
    }))
}

#[utoipa::path(
    get,
    path = "/api/payroll/{payroll_id}",
    params(
        ("payroll_id", description = "Payroll ID")
    ),
    responses(
        (status = 200, body = crate::payroll::ledger::PayrollRecordView),
        (status = 404, description = "Payroll not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn get_payroll(
    auth: AuthUser,
    service: web::Data<PayrollService>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let view = visible_record(&auth, &service, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(view))
}

/// Manually adjust components of a current-month record
#[utoipa::path(
    put,
    path = "/api/payroll/{payroll_id}",
    request_body = ComponentOverrides,
    params(
        ("payroll_id", description = "Payroll ID")
    ),
    responses(
        (status = 200, description = "Payroll updated", body = crate::payroll::ledger::PayrollRecordView),
        (status = 400, description = "Negative component or deductions above gross"),
        (status = 404, description = "Payroll not found"),
        (status = 422, description = "Record belongs to a closed month", body = Object, example = json!({
            "error": "IMMUTABLE",
            "message": "Record is immutable: payroll record 12 for September 2025 is closed; only status can change"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn update_payroll(
    auth: AuthUser,
    service: web::Data<PayrollService>,
    path: web::Path<u64>,
    body: web::Json<ComponentOverrides>,
) -> actix_web::Result<impl Responder> {
    auth.require_payroll_manager()?;

    let view = service
        .edit_payroll_record(path.into_inner(), &body, auth.editor())
        .await?;

    Ok(HttpResponse::Ok().json(view))
}

#[utoipa::path(
    put,
    path = "/api/payroll/{payroll_id}/status",
    request_body = UpdateStatusRequest,
    params(
        ("payroll_id", description = "Payroll ID")
    ),
    responses(
        (status = 200, body = crate::payroll::ledger::PayrollRecordView),
        (status = 400, description = "Paid records cannot go back to processed"),
        (status = 404)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn update_status(
    auth: AuthUser,
    service: web::Data<PayrollService>,
    path: web::Path<u64>,
    body: web::Json<UpdateStatusRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_payroll_manager()?;

    let view = service
        .update_payroll_status(path.into_inner(), body.status, auth.editor())
        .await?;

    Ok(HttpResponse::Ok().json(view))
}

#[utoipa::path(
    get,
    path = "/api/payroll/{payroll_id}/payslip",
    params(
        ("payroll_id", description = "Payroll ID")
    ),
    responses(
        (status = 200, body = crate::payroll::payslip::PayslipView),
        (status = 404, description = "Unknown record or another employee's payslip")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn get_payslip(
    auth: AuthUser,
    service: web::Data<PayrollService>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let payroll_id = path.into_inner();
    visible_record(&auth, &service, payroll_id).await?;

    let payslip = service.get_payslip(payroll_id).await?;
    Ok(HttpResponse::Ok().json(payslip))
}

/// Another employee's record answers exactly like a missing one.
async fn visible_record(
    auth: &AuthUser,
    service: &PayrollService,
    payroll_id: u64,
) -> actix_web::Result<PayrollRecordView> {
    let view = service.get_payroll_record(payroll_id).await?;
    if auth.require_self_or_manager(view.record.employee_id).is_err() {
        return Err(PayrollError::NotFound(format!("payroll record {payroll_id} not found")).into());
    }
    Ok(view)
}
