use std::env;

use crate::error::IndexMeshError;
use crate::types::{AccountSpec, ChannelSpec};

/// Application configuration loaded from environment variables (spec §4.0,
/// §6). Required keys missing at load time fail fast with a clear message,
/// before any network connection is attempted.
#[derive(Debug, Clone)]
pub struct Config {
    pub service_type: String,
    pub etl_enabled: bool,
    pub etl_schedule_interval: Option<String>,
    pub etl_batch_size: usize,
    pub etl_max_historical_days: i64,

    pub vector_store_url: String,
    pub vector_store_api_key: Option<String>,
    pub vector_store_collection: String,

    pub embedding_model: String,
    pub embedding_dimensions: usize,
    pub embedding_api_key: String,
    pub embedding_base_url: Option<String>,
    pub embedding_max_batch_size: usize,

    pub microblog_accounts: Vec<AccountSpec>,
    pub microblog_bearer: String,
    pub microblog_base_url: String,

    pub groupchat_channels: Vec<ChannelSpec>,
    pub groupchat_api_id: String,
    pub groupchat_api_hash: String,
    pub groupchat_session: String,
    pub groupchat_base_url: String,

    pub log_format: LogFormat,
    pub account_state_snapshot_path: Option<String>,
    /// Where `serve` persists a point-in-time snapshot of C9 counters and
    /// C8 scheduler status, so the CLI's `stats`/`health`/`scheduler status`
    /// subcommands have something to read when invoked as a separate,
    /// short-lived process (§4.10 — CLI/process-probe, not an HTTP API).
    pub runtime_status_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Config {
    /// Load configuration for the ETL indexing engine from the process
    /// environment. Panics with a descriptive message on a missing
    /// required key — mirroring the teacher's `required_env` fail-fast
    /// idiom, since a misconfigured deployment should never reach the
    /// network before surfacing the problem.
    pub fn from_env() -> Self {
        Self::try_from_env().unwrap_or_else(|e| panic!("configuration error: {e}"))
    }

    /// Fallible variant of [`Config::from_env`]. Malformed *values*
    /// (invalid JSON in `MICROBLOG_ACCOUNTS`/`GROUPCHAT_CHANNELS`, a
    /// non-numeric `EMBEDDING_DIMENSIONS`) are reported as
    /// [`IndexMeshError::Config`] rather than a panic, since they can
    /// arrive from operator-edited env files rather than a broken binary.
    pub fn try_from_env() -> Result<Self, IndexMeshError> {
        let service_type = env::var("SERVICE_TYPE").unwrap_or_else(|_| "ETL".to_string());

        let microblog_accounts_raw = env::var("MICROBLOG_ACCOUNTS").unwrap_or_else(|_| "[]".to_string());
        let microblog_accounts: Vec<AccountSpec> = serde_json::from_str(&microblog_accounts_raw)
            .map_err(|e| IndexMeshError::Config(format!("MICROBLOG_ACCOUNTS: {e}")))?;

        let groupchat_channels_raw = env::var("GROUPCHAT_CHANNELS").unwrap_or_else(|_| "[]".to_string());
        let groupchat_channels: Vec<ChannelSpec> = serde_json::from_str(&groupchat_channels_raw)
            .map_err(|e| IndexMeshError::Config(format!("GROUPCHAT_CHANNELS: {e}")))?;

        let embedding_dimensions = env::var("EMBEDDING_DIMENSIONS")
            .unwrap_or_else(|_| "1024".to_string())
            .parse::<usize>()
            .map_err(|e| IndexMeshError::Config(format!("EMBEDDING_DIMENSIONS: {e}")))?;

        let etl_batch_size = env::var("ETL_BATCH_SIZE")
            .unwrap_or_else(|_| "100".to_string())
            .parse::<usize>()
            .map_err(|e| IndexMeshError::Config(format!("ETL_BATCH_SIZE: {e}")))?;

        let etl_max_historical_days = env::var("ETL_MAX_HISTORICAL_DAYS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<i64>()
            .map_err(|e| IndexMeshError::Config(format!("ETL_MAX_HISTORICAL_DAYS: {e}")))?;

        let etl_schedule_interval = env::var("ETL_SCHEDULE_INTERVAL").ok();
        if let Some(expr) = &etl_schedule_interval {
            expr.parse::<cron::Schedule>()
                .map_err(|e| IndexMeshError::Config(format!("ETL_SCHEDULE_INTERVAL: {e}")))?;
        }

        let log_format = match env::var("LOG_FORMAT").ok().as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            service_type,
            etl_enabled: env::var("ETL_ENABLED")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
            etl_schedule_interval,
            etl_batch_size,
            etl_max_historical_days,
            vector_store_url: required_env("VECTOR_STORE_URL")?,
            vector_store_api_key: env::var("VECTOR_STORE_API_KEY").ok(),
            vector_store_collection: required_env("VECTOR_STORE_COLLECTION")?,
            embedding_model: required_env("EMBEDDING_MODEL")?,
            embedding_dimensions,
            embedding_api_key: required_env("EMBEDDING_API_KEY")?,
            embedding_base_url: env::var("EMBEDDING_BASE_URL").ok(),
            embedding_max_batch_size: env::var("EMBEDDING_MAX_BATCH_SIZE")
                .unwrap_or_else(|_| "96".to_string())
                .parse::<usize>()
                .map_err(|e| IndexMeshError::Config(format!("EMBEDDING_MAX_BATCH_SIZE: {e}")))?,
            microblog_accounts,
            microblog_bearer: env::var("MICROBLOG_BEARER").unwrap_or_default(),
            microblog_base_url: env::var("MICROBLOG_BASE_URL")
                .unwrap_or_else(|_| "https://microblog.api.internal".to_string()),
            groupchat_channels,
            groupchat_api_id: env::var("GROUPCHAT_API_ID").unwrap_or_default(),
            groupchat_api_hash: env::var("GROUPCHAT_API_HASH").unwrap_or_default(),
            groupchat_session: env::var("GROUPCHAT_SESSION").unwrap_or_default(),
            groupchat_base_url: env::var("GROUPCHAT_BASE_URL")
                .unwrap_or_else(|_| "https://groupchat.api.internal".to_string()),
            log_format,
            account_state_snapshot_path: env::var("ACCOUNT_STATE_SNAPSHOT_PATH").ok(),
            runtime_status_path: env::var("RUNTIME_STATUS_PATH")
                .unwrap_or_else(|_| "./indexmesh-runtime-status.json".to_string()),
        })
    }

    /// Log the resolved configuration with secrets masked — mirroring the
    /// teacher's `Config::log_redacted`.
    pub fn log_redacted(&self) {
        tracing::info!(
            service_type = %self.service_type,
            etl_enabled = self.etl_enabled,
            vector_store_url = %self.vector_store_url,
            vector_store_collection = %self.vector_store_collection,
            embedding_model = %self.embedding_model,
            embedding_dimensions = self.embedding_dimensions,
            microblog_accounts = self.microblog_accounts.len(),
            groupchat_channels = self.groupchat_channels.len(),
            microblog_bearer = %redact(&self.microblog_bearer),
            groupchat_api_hash = %redact(&self.groupchat_api_hash),
            embedding_api_key = %redact(&self.embedding_api_key),
            "Configuration loaded"
        );
    }
}

fn redact(secret: &str) -> String {
    if secret.is_empty() {
        return String::new();
    }
    let tail_len = secret.len().min(4);
    format!("***{}", &secret[secret.len() - tail_len..])
}

fn required_env(key: &str) -> Result<String, IndexMeshError> {
    env::var(key).map_err(|_| IndexMeshError::Config(format!("missing required env var {key}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_secrets() {
        assert_eq!(redact("abcdef1234"), "***1234");
        assert_eq!(redact(""), "");
    }
}
