//! Durable-optional persistence for C7's `AccountState` map (§3, §4.7,
//! §9 Open Question). In-memory by default; when
//! `ACCOUNT_STATE_SNAPSHOT_PATH` is set, state is reloaded at startup and
//! written back after every run so rotation fairness survives a restart.

use std::fs;

use indexmesh_common::{AccountState, Source};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Serialize, Deserialize, Default)]
struct Snapshot {
    microblog: Vec<AccountState>,
    groupchat: Vec<AccountState>,
}

/// Loads persisted state for `source`, falling back to `defaults` (freshly
/// constructed from configured accounts/channels) for any handle not found
/// in the snapshot, and dropping snapshot entries for handles no longer
/// configured.
pub fn load_or_default(path: Option<&str>, source: Source, defaults: Vec<AccountState>) -> Vec<AccountState> {
    let Some(path) = path else { return defaults };
    let Ok(raw) = fs::read_to_string(path) else {
        return defaults;
    };
    let snapshot: Snapshot = match serde_json::from_str(&raw) {
        Ok(s) => s,
        Err(e) => {
            warn!(path, error = %e, "Could not parse account state snapshot, starting fresh");
            return defaults;
        }
    };
    let persisted = match source {
        Source::Microblog => snapshot.microblog,
        Source::Groupchat => snapshot.groupchat,
    };

    defaults
        .into_iter()
        .map(|fresh| {
            persisted
                .iter()
                .find(|p| p.handle == fresh.handle)
                .cloned()
                .unwrap_or(fresh)
        })
        .collect()
}

/// Writes the current states for `source` back into the shared snapshot
/// file, preserving whatever the other source had stored there.
pub fn save(path: Option<&str>, source: Source, states: &[AccountState]) {
    let Some(path) = path else { return };
    let mut snapshot: Snapshot = fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default();

    match source {
        Source::Microblog => snapshot.microblog = states.to_vec(),
        Source::Groupchat => snapshot.groupchat = states.to_vec(),
    }

    match serde_json::to_string_pretty(&snapshot) {
        Ok(json) => {
            if let Err(e) = fs::write(path, json) {
                warn!(path, error = %e, "Failed to write account state snapshot");
            }
        }
        Err(e) => warn!(error = %e, "Failed to serialize account state snapshot"),
    }
}
