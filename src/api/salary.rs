use actix_web::{HttpResponse, Responder, web};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::payroll::PayrollService;
use crate::payroll::service::SalaryUpdate;

#[derive(Deserialize, ToSchema)]
pub struct CalculateRequest {
    /// Annual cost to company.
    #[schema(example = "600000", value_type = String)]
    pub ctc: Decimal,
}

/// Preview the component breakdown for an annual CTC. Nothing is stored.
#[utoipa::path(
    post,
    path = "/api/salary/calculate",
    request_body = CalculateRequest,
    responses(
        (status = 200, description = "Computed breakdown", body = crate::model::salary::SalaryBreakdown),
        (status = 400, description = "Negative or out of range CTC", body = Object, example = json!({
            "error": "INVALID_INPUT",
            "message": "Invalid input: CTC cannot be negative"
        })),
        (status = 401)
    ),
    security(("bearer_auth" = [])),
    tag = "Salary"
)]
pub async fn calculate_salary(
    _auth: AuthUser,
    service: web::Data<PayrollService>,
    body: web::Json<CalculateRequest>,
) -> actix_web::Result<impl Responder> {
    let breakdown = service.calculate_from_ctc(body.ctc)?;
    Ok(HttpResponse::Ok().json(breakdown))
}

/// Every active employee with their current salary (zeros when none is set)
#[utoipa::path(
    get,
    path = "/api/salary",
    responses(
        (status = 200, body = [crate::payroll::service::EmployeeSalaryRow]),
        (status = 401),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Salary"
)]
pub async fn list_salaries(
    auth: AuthUser,
    service: web::Data<PayrollService>,
) -> actix_web::Result<impl Responder> {
    auth.require_payroll_manager()?;

    let rows = service.list_employee_salaries().await?;
    Ok(HttpResponse::Ok().json(rows))
}

/// Set a new salary. The current month's payroll, if already run, is refreshed in the background.
#[utoipa::path(
    put,
    path = "/api/salary/{employee_id}",
    request_body = SalaryUpdate,
    params(
        ("employee_id", description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Salary profile stored", body = crate::model::salary::SalaryProfile),
        (status = 400, description = "Invalid CTC or components"),
        (status = 404, description = "Employee not found"),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Salary"
)]
pub async fn update_salary(
    auth: AuthUser,
    service: web::Data<PayrollService>,
    path: web::Path<u64>,
    body: web::Json<SalaryUpdate>,
) -> actix_web::Result<impl Responder> {
    auth.require_payroll_manager()?;

    let employee_id = path.into_inner();
    let profile = service
        .update_salary(employee_id, body.into_inner(), auth.editor())
        .await?;

    Ok(HttpResponse::Ok().json(profile))
}

#[utoipa::path(
    get,
    path = "/api/salary/{employee_id}",
    params(
        ("employee_id", description = "Employee ID")
    ),
    responses(
        (status = 200, body = crate::model::salary::SalaryProfile),
        (status = 404, description = "Employee or salary not found"),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Salary"
)]
pub async fn get_salary(
    auth: AuthUser,
    service: web::Data<PayrollService>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    auth.require_self_or_manager(employee_id)?;

    let profile = service.get_current_salary(employee_id).await?;
    Ok(HttpResponse::Ok().json(profile))
}

#[utoipa::path(
    get,
    path = "/api/salary/{employee_id}/history",
    params(
        ("employee_id", description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Newest first", body = [crate::model::salary::SalaryProfile]),
        (status = 404),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Salary"
)]
pub async fn salary_history(
    auth: AuthUser,
    service: web::Data<PayrollService>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    auth.require_self_or_manager(employee_id)?;

    let history = service.get_salary_history(employee_id).await?;
    Ok(HttpResponse::Ok().json(history))
}
