//! Runtime settings from environment variables.

use crate::error::ConfigError;
use std::fmt;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_AIRTABLE_API_URL: &str = "https://api.airtable.com/v0";
pub const DEFAULT_AIRTABLE_TABLE: &str = "airtable_Building";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    pub bind_addr: String,
    pub max_connections: u32,
    pub body_limit_bytes: usize,
    /// None when no hosted-table credentials are configured.
    pub airtable: Option<AirtableSettings>,
}

#[derive(Clone)]
pub struct AirtableSettings {
    pub api_key: String,
    pub base_id: String,
    /// Table id or name of the buildings table.
    pub buildings_table: String,
    pub api_url: String,
}

impl fmt::Debug for AirtableSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AirtableSettings")
            .field("api_key", &"<redacted>")
            .field("base_id", &self.base_id)
            .field("buildings_table", &self.buildings_table)
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url = get("DATABASE_URL").ok_or(ConfigError::MissingVar("DATABASE_URL"))?;
        let bind_addr = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into());
        let max_connections = match get("DB_MAX_CONNECTIONS") {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid {
                var: "DB_MAX_CONNECTIONS",
                reason: format!("expected a positive integer, got '{}'", v),
            })?,
            None => DEFAULT_MAX_CONNECTIONS,
        };
        let body_limit_bytes = match get("BODY_LIMIT_BYTES") {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid {
                var: "BODY_LIMIT_BYTES",
                reason: format!("expected a byte count, got '{}'", v),
            })?,
            None => DEFAULT_BODY_LIMIT,
        };

        let airtable = match (get("AIRTABLE_API_KEY"), get("AIRTABLE_BASE_ID")) {
            (Some(api_key), Some(base_id)) => Some(AirtableSettings {
                api_key,
                base_id,
                buildings_table: get("AIRTABLE_TABLE_ID").unwrap_or_else(|| DEFAULT_AIRTABLE_TABLE.into()),
                api_url: get("AIRTABLE_API_URL")
                    .unwrap_or_else(|| DEFAULT_AIRTABLE_API_URL.into())
                    .trim_end_matches('/')
                    .to_string(),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::MissingVar("AIRTABLE_BASE_ID")),
            (None, Some(_)) => return Err(ConfigError::MissingVar("AIRTABLE_API_KEY")),
        };

        Ok(Settings {
            database_url,
            bind_addr,
            max_connections,
            body_limit_bytes,
            airtable,
        })
    }
}
