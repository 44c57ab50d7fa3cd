//! Pushes salary changes into the current period's payroll record.
//!
//! Runs as a detached task after the salary write has committed. The salary
//! caller never waits for it and never sees its errors; failures are logged.

use std::sync::Arc;

use actix_web::rt::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{PayrollError, PayrollResult};
use crate::model::payroll::{PayrollRecord, PeriodKey};
use crate::model::salary::SalaryProfile;
use crate::payroll::ledger::PayrollLedger;
use crate::payroll::snapshot::SnapshotProvider;
use crate::store::SalaryProfileStore;

#[derive(Clone)]
pub struct SyncPropagator {
    ledger: Arc<PayrollLedger>,
    profiles: Arc<dyn SalaryProfileStore>,
    snapshots: SnapshotProvider,
}

impl SyncPropagator {
    pub fn new(
        ledger: Arc<PayrollLedger>,
        profiles: Arc<dyn SalaryProfileStore>,
        snapshots: SnapshotProvider,
    ) -> Self {
        Self {
            ledger,
            profiles,
            snapshots,
        }
    }

    /// Fire-and-forget. The handle is only useful to tests.
    pub fn dispatch(&self, profile: SalaryProfile, editor: String) -> JoinHandle<()> {
        let this = self.clone();
        actix_web::rt::spawn(async move {
            if let Err(e) = this.propagate(&profile, &editor).await {
                let failure = PayrollError::PropagationFailure(e.to_string());
                warn!(
                    employee_id = profile.employee_id,
                    profile_id = profile.id,
                    error = %failure,
                    "Salary sync to current payroll failed"
                );
            }
        })
    }

    /// Recomputes the employee's current-period record, if one exists.
    ///
    /// Uses the latest profile read under the key lock, so a late task cannot
    /// overwrite a newer salary with the one that triggered it.
    pub async fn propagate(
        &self,
        profile: &SalaryProfile,
        editor: &str,
    ) -> PayrollResult<Option<PayrollRecord>> {
        let period = self.ledger.clock().current_period();
        let key = PeriodKey::new(profile.employee_id, period);
        let _guard = self.ledger.lock(key).await;

        let Some(record) = self.ledger.find_by_key(key).await? else {
            debug!(employee_id = profile.employee_id, %period, "No current payroll to sync");
            return Ok(None);
        };

        let latest = self
            .profiles
            .latest_profile(profile.employee_id)
            .await?
            .unwrap_or_else(|| profile.clone());
        let snapshot = self.snapshots.current().await?;

        let updated = self
            .ledger
            .recompute(record, latest.salary, &snapshot, editor)
            .await?;

        info!(
            record_id = updated.id,
            employee_id = updated.employee_id,
            net_pay = updated.salary.net_pay(),
            "Current payroll synced with new salary"
        );
        Ok(Some(updated))
    }
}
