use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, anyhow};

/// Where salary profiles and payroll records live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::EnumString, strum_macros::Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StoreBackend {
    Mysql,
    /// Process-local, lost on restart. For demos and local runs.
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_addr: String,
    pub jwt_secret: String,
    pub store_backend: StoreBackend,
    /// Required for the mysql backend.
    pub database_url: Option<String>,
    pub api_prefix: String,

    // Rate limiting
    pub rate_protected_per_min: u32,

    /// Employees processed concurrently by a bulk run.
    pub run_concurrency: usize,
    pub log_dir: PathBuf,
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick up `.env`.
    pub fn from_env() -> anyhow::Result<Self> {
        let store_backend = parse_or("STORE_BACKEND", StoreBackend::Mysql)?;
        let database_url = env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());
        if store_backend == StoreBackend::Mysql && database_url.is_none() {
            return Err(anyhow!("DATABASE_URL must be set for the mysql store backend"));
        }

        let run_concurrency: usize = parse_or("RUN_CONCURRENCY", 8)?;
        if run_concurrency == 0 {
            return Err(anyhow!("RUN_CONCURRENCY must be at least 1"));
        }

        Ok(Self {
            server_addr: env::var("SERVER_ADDR").context("SERVER_ADDR must be set")?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            store_backend,
            database_url,
            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),
            rate_protected_per_min: parse_or("RATE_PROTECTED_PER_MIN", 1000)?,
            run_concurrency,
            log_dir: env::var("LOG_DIR")
                .unwrap_or_else(|_| "logs".to_string())
                .into(),
        })
    }
}

fn parse_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{key} has an invalid value {raw:?}: {e}")),
        Err(_) => Ok(default),
    }
}
