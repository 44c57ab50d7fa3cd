use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::model::role::Role;
use crate::models::TokenType;
use actix_web::{
    FromRequest, HttpMessage, HttpRequest,
    dev::Payload,
    error::{ErrorForbidden, ErrorInternalServerError, ErrorUnauthorized},
    http::header::{AUTHORIZATION, HeaderMap},
    web::Data,
};
use futures::future::{Ready, ready};
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
}

/// Why a request was refused a user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthRejection {
    #[error("Missing Authorization header")]
    MissingHeader,
    #[error("Invalid Authorization header encoding")]
    BadEncoding,
    #[error("Authorization header must start with Bearer")]
    NotBearer,
    #[error("Invalid or expired token")]
    InvalidToken(String),
    #[error("Refresh tokens cannot be used for API calls")]
    RefreshToken,
    #[error("Invalid role")]
    InvalidRole,
}

impl AuthUser {
    /// Resolves the bearer token in `headers` to a user.
    pub fn from_headers(headers: &HeaderMap, secret: &str) -> Result<Self, AuthRejection> {
        let header_value = headers
            .get(AUTHORIZATION)
            .ok_or(AuthRejection::MissingHeader)?
            .to_str()
            .map_err(|_| AuthRejection::BadEncoding)?;
        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or(AuthRejection::NotBearer)?;

        let claims = verify_token(token, secret).map_err(AuthRejection::InvalidToken)?;
        if claims.token_type != TokenType::Access {
            return Err(AuthRejection::RefreshToken);
        }
        let role = Role::from_id(claims.role).ok_or(AuthRejection::InvalidRole)?;

        Ok(AuthUser {
            user_id: claims.user_id,
            username: claims.sub,
            role,
            employee_id: claims.employee_id,
        })
    }
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // set by auth_middleware on protected scopes
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let Some(config) = req.app_data::<Data<Config>>() else {
            return ready(Err(ErrorInternalServerError("Config missing")));
        };

        ready(
            AuthUser::from_headers(req.headers(), &config.jwt_secret)
                .map_err(|rejection| ErrorUnauthorized(rejection.to_string())),
        )
    }
}

impl AuthUser {
    /// Salary changes, payroll runs and edits.
    pub fn require_payroll_manager(&self) -> actix_web::Result<()> {
        if self.role.manages_payroll() {
            Ok(())
        } else {
            Err(ErrorForbidden("HR/Admin only"))
        }
    }

    /// Managers see every employee; everyone else only their own record.
    pub fn require_self_or_manager(&self, employee_id: u64) -> actix_web::Result<()> {
        if self.role.manages_payroll() || self.employee_id == Some(employee_id) {
            Ok(())
        } else {
            Err(ErrorForbidden("Not allowed to view another employee's payroll"))
        }
    }

    /// Recorded as `edited_by` / `created_by`.
    pub fn editor(&self) -> &str {
        &self.username
    }
}
