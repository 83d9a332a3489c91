//! Point-in-time snapshot of C9's counters and C8's scheduler flags,
//! written by `serve` so the out-of-process `stats`/`health`/`scheduler`
//! subcommands have something to read (§4.10 — CLI/process-probe, not an
//! HTTP API, so there is no live channel back into a running `serve`).

use std::fs;

use chrono::{DateTime, Utc};
use indexmesh_engine::{SourceSchedulerStatus, SourceStats};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RuntimeStatus {
    pub microblog_stats: SourceStats,
    pub groupchat_stats: SourceStats,
    pub microblog_scheduler: SourceSchedulerStatus,
    pub groupchat_scheduler: SourceSchedulerStatus,
    pub vector_store_ok: Option<bool>,
    pub embedding_ok: Option<bool>,
    pub updated_at: Option<DateTime<Utc>>,
}

pub fn load(path: &str) -> RuntimeStatus {
    fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default()
}

pub fn save(path: &str, status: &RuntimeStatus) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(status)?;
    fs::write(path, json)?;
    Ok(())
}
