use crate::auth::auth::{AuthRejection, AuthUser};
use crate::config::Config;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use serde_json::json;
use tracing::debug;

/// Resolves the caller once per request and stores the `AuthUser` in the
/// request extensions for handlers to pick up.
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?;

    let auth_user = match AuthUser::from_headers(req.headers(), &config.jwt_secret) {
        Ok(user) => user,
        Err(rejection) => {
            debug!(reason = %rejection, path = req.path(), "Request rejected");
            let body = match &rejection {
                AuthRejection::InvalidToken(details) => {
                    json!({"error": rejection.to_string(), "details": details})
                }
                _ => json!({"error": rejection.to_string()}),
            };
            let resp = HttpResponse::Unauthorized().json(body);
            return Ok(req.into_response(resp.map_into_boxed_body()));
        }
    };

    req.extensions_mut().insert(auth_user);

    next.call(req).await
}
