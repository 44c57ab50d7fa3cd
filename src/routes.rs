use crate::{
    api::{payroll, salary},
    auth::middleware::auth_middleware,
    config::Config,
    error::PayrollError,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config) {
    // Helper to build per-scope limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let requests_per_min = requests_per_min.max(1);
        let per_ms = (60_000 / requests_per_min as u64).max(1);
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap_or_default();
        Governor::new(&cfg)
    }

    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // malformed bodies get the same error shape as domain errors
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        PayrollError::InvalidInput(err.to_string()).into()
    }));

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(
                web::scope("/salary")
                    // /salary
                    .service(web::resource("").route(web::get().to(salary::list_salaries)))
                    // /salary/calculate
                    .service(
                        web::resource("/calculate").route(web::post().to(salary::calculate_salary)),
                    )
                    // /salary/{employee_id}
                    .service(
                        web::resource("/{employee_id}")
                            .route(web::get().to(salary::get_salary))
                            .route(web::put().to(salary::update_salary)),
                    )
                    // /salary/{employee_id}/history
                    .service(
                        web::resource("/{employee_id}/history")
                            .route(web::get().to(salary::salary_history)),
                    ),
            )
            .service(
                web::scope("/payroll")
                    // /payroll/run
                    .service(web::resource("/run").route(web::post().to(payroll::run_payroll)))
                    // /payroll/run/{employee_id}
                    .service(
                        web::resource("/run/{employee_id}")
                            .route(web::post().to(payroll::run_individual_payroll)),
                    )
                    // /payroll/rerun
                    .service(web::resource("/rerun").route(web::post().to(payroll::rerun_payroll)))
                    // /payroll/history
                    .service(
                        web::resource("/history").route(web::get().to(payroll::payroll_history)),
                    )
                    // /payroll/period?month=&year=
                    .service(
                        web::resource("/period")
                            .route(web::get().to(payroll::list_period))
                            .route(web::delete().to(payroll::delete_period)),
                    )
                    // /payroll/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(payroll::get_payroll))
                            .route(web::put().to(payroll::update_payroll)),
                    )
                    // /payroll/{id}/status
                    .service(
                        web::resource("/{id}/status").route(web::put().to(payroll::update_status)),
                    )
                    // /payroll/{id}/payslip
                    .service(
                        web::resource("/{id}/payslip").route(web::get().to(payroll::get_payslip)),
                    ),
            ),
    );
}
