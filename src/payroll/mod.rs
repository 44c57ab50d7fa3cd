pub mod calculator;
pub mod clock;
pub mod ledger;
pub mod orchestrator;
pub mod payslip;
pub mod service;
pub mod snapshot;
pub mod sync;

pub use service::PayrollService;
