use std::sync::Arc;

use rust_decimal::Decimal;

use crate::error::PayrollResult;
use crate::model::snapshot::{CompanySettings, CompanySnapshot, CurrencySnapshot, SettingsSnapshot};
use crate::store::SettingsStore;

pub const DEFAULT_COMPANY_NAME: &str = "Company";
pub const DEFAULT_CURRENCY_CODE: &str = "INR";
pub const DEFAULT_CURRENCY_SYMBOL: &str = "₹";

/// Reads the live settings row and turns it into copyable snapshots.
///
/// Only used when financials are being (re)computed. Views of existing records
/// read the snapshot embedded in the record instead.
#[derive(Clone)]
pub struct SnapshotProvider {
    settings: Arc<dyn SettingsStore>,
}

impl SnapshotProvider {
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self { settings }
    }

    pub async fn current(&self) -> PayrollResult<SettingsSnapshot> {
        let settings = self.settings.company_settings().await?;
        Ok(snapshot_from(settings.unwrap_or_default()))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn snapshot_from(settings: CompanySettings) -> SettingsSnapshot {
    let code = non_blank(settings.currency_code).unwrap_or_else(|| DEFAULT_CURRENCY_CODE.into());
    let symbol =
        non_blank(settings.currency_symbol).unwrap_or_else(|| DEFAULT_CURRENCY_SYMBOL.into());
    let display =
        non_blank(settings.currency_display).unwrap_or_else(|| format!("{code} ({symbol})"));
    let exchange_rate = settings
        .exchange_rate
        .filter(|rate| rate.is_sign_positive() && !rate.is_zero())
        .unwrap_or(Decimal::ONE);

    SettingsSnapshot {
        company: CompanySnapshot {
            name: non_blank(settings.company_name)
                .unwrap_or_else(|| DEFAULT_COMPANY_NAME.into()),
            logo_url: non_blank(settings.logo_url),
            address: non_blank(settings.address),
        },
        currency: CurrencySnapshot {
            code,
            symbol,
            display,
            exchange_rate,
        },
    }
}
