use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Company identity frozen into a payroll record when its financials were computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CompanySnapshot {
    #[schema(example = "Acme Corp")]
    pub name: String,

    #[schema(example = "https://cdn.acme.test/logo.png", nullable = true)]
    pub logo_url: Option<String>,

    #[schema(example = "12 Park Street, Kolkata", nullable = true)]
    pub address: Option<String>,
}

/// Currency frozen into a payroll record. Recorded only, never converted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CurrencySnapshot {
    #[schema(example = "INR")]
    pub code: String,

    #[schema(example = "₹")]
    pub symbol: String,

    #[schema(example = "INR (₹)")]
    pub display: String,

    #[schema(example = "1", value_type = String)]
    pub exchange_rate: Decimal,
}

/// Both snapshots taken at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SettingsSnapshot {
    pub company: CompanySnapshot,
    pub currency: CurrencySnapshot,
}

/// The single global settings row. Every column may be unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct CompanySettings {
    pub company_name: Option<String>,
    pub logo_url: Option<String>,
    pub address: Option<String>,
    pub currency_code: Option<String>,
    pub currency_symbol: Option<String>,
    pub currency_display: Option<String>,
    #[schema(value_type = Option<String>)]
    pub exchange_rate: Option<Decimal>,
}
