//! In-memory mock adapter — no network. Scenario and property tests seed
//! this with a fixed record set and drive the indexer core against it,
//! mirroring the teacher's `MockFetcher` rationale.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmesh_common::{IndexMeshError, Source};

use crate::adapter::{FetchOutcome, RawRecord, SourceAdapter};

pub struct MockAdapter {
    source: Source,
    records: Mutex<HashMap<String, Vec<RawRecord>>>,
    /// When set, every call returns this error instead of touching `records`.
    pub inject_error: Mutex<Option<IndexMeshError>>,
    pub backward_supported: bool,
}

impl MockAdapter {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            records: Mutex::new(HashMap::new()),
            inject_error: Mutex::new(None),
            backward_supported: true,
        }
    }

    pub fn without_backward(mut self) -> Self {
        self.backward_supported = false;
        self
    }

    /// Seeds `handle` with records, sorted newest-first to mirror what a
    /// real timeline call would return.
    pub fn seed(&self, handle: &str, mut records: Vec<RawRecord>) {
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.records.lock().unwrap().insert(handle.to_string(), records);
    }
}

#[async_trait]
impl SourceAdapter for MockAdapter {
    fn source(&self) -> Source {
        self.source
    }

    async fn fetch_forward(
        &self,
        handle: &str,
        since: Option<DateTime<Utc>>,
        budget: u32,
    ) -> Result<FetchOutcome, IndexMeshError> {
        if let Some(err) = self.inject_error.lock().unwrap().take() {
            return Err(err);
        }
        let store = self.records.lock().unwrap();
        let all = store.get(handle).cloned().unwrap_or_default();
        let matched: Vec<RawRecord> = all
            .into_iter()
            .filter(|r| since.map(|s| r.created_at > s).unwrap_or(true))
            .collect();
        Ok(FetchOutcome {
            requests_used: budget.min(1),
            has_more_data: false,
            rate_limited: false,
            records: matched,
        })
    }

    async fn fetch_backward(
        &self,
        handle: &str,
        before: Option<DateTime<Utc>>,
        budget: u32,
    ) -> Result<FetchOutcome, IndexMeshError> {
        if !self.backward_supported {
            return Ok(FetchOutcome {
                records: Vec::new(),
                requests_used: 0,
                has_more_data: false,
                rate_limited: false,
            });
        }
        if let Some(err) = self.inject_error.lock().unwrap().take() {
            return Err(err);
        }
        let store = self.records.lock().unwrap();
        let all = store.get(handle).cloned().unwrap_or_default();
        let matched: Vec<RawRecord> = all
            .into_iter()
            .filter(|r| before.map(|b| r.created_at < b).unwrap_or(true))
            .collect();
        Ok(FetchOutcome {
            requests_used: budget.min(1),
            has_more_data: false,
            rate_limited: false,
            records: matched,
        })
    }
}
