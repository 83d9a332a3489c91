//! Microblog source adapter (§4.3): bearer-token user-timeline pagination,
//! newest→oldest, ≤100 records per call.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use indexmesh_common::{IndexMeshError, Source};
use tracing::{debug, warn};

use crate::adapter::{FetchOutcome, RawRecord, SourceAdapter};

const PAGE_SIZE: u32 = 100;
const MIN_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct TimelinePage {
    records: Vec<RawRecord>,
    next_token: Option<String>,
    rate_limited: bool,
    reset_after_secs: Option<u64>,
}

/// Talks to a timeline-shaped HTTP API authenticated with a bearer token.
/// The actual endpoint/host is injected via `base_url` so tests can point
/// this at a local stub.
pub struct MicroblogAdapter {
    http: reqwest::Client,
    base_url: String,
    bearer_token: String,
}

impl MicroblogAdapter {
    pub fn new(base_url: impl Into<String>, bearer_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            bearer_token: bearer_token.into(),
        }
    }

    async fn fetch_page(
        &self,
        handle: &str,
        pagination_token: Option<&str>,
    ) -> Result<TimelinePage, IndexMeshError> {
        let mut url = format!(
            "{}/timelines/{}?max_results={}",
            self.base_url, handle, PAGE_SIZE
        );
        if let Some(token) = pagination_token {
            url.push_str(&format!("&pagination_token={token}"));
        }

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.bearer_token)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| IndexMeshError::Transient(e.to_string()))?;

        if response.status().as_u16() == 429 {
            let reset_after_secs = response
                .headers()
                .get("x-rate-limit-reset-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(MIN_RATE_LIMIT_WAIT.as_secs())
                .max(MIN_RATE_LIMIT_WAIT.as_secs());
            return Ok(TimelinePage {
                records: Vec::new(),
                next_token: None,
                rate_limited: true,
                reset_after_secs: Some(reset_after_secs),
            });
        }

        if response.status() == 401 || response.status() == 403 {
            return Err(IndexMeshError::Unauthorized(format!(
                "microblog adapter unauthorized for {handle}"
            )));
        }

        if !response.status().is_success() {
            return Err(IndexMeshError::Transient(format!(
                "microblog timeline error {}: {handle}",
                response.status()
            )));
        }

        let body: TimelineResponse = response
            .json()
            .await
            .map_err(|e| IndexMeshError::Fatal(format!("malformed timeline response: {e}")))?;

        let records = body
            .data
            .into_iter()
            .map(|item| RawRecord {
                foreign_id: item.id.clone(),
                author_handle: handle.to_string(),
                text: item.text,
                created_at: item.created_at,
                partition_handle: handle.to_string(),
                raw: item.raw,
            })
            .collect();

        Ok(TimelinePage {
            records,
            next_token: body.next_token,
            rate_limited: false,
            reset_after_secs: None,
        })
    }
}

#[derive(serde::Deserialize)]
struct TimelineResponse {
    data: Vec<TimelineItem>,
    next_token: Option<String>,
}

#[derive(serde::Deserialize)]
struct TimelineItem {
    id: String,
    text: String,
    created_at: DateTime<Utc>,
    #[serde(flatten)]
    raw: serde_json::Value,
}

#[async_trait]
impl SourceAdapter for MicroblogAdapter {
    fn source(&self) -> Source {
        Source::Microblog
    }

    async fn fetch_forward(
        &self,
        handle: &str,
        since: Option<DateTime<Utc>>,
        budget: u32,
    ) -> Result<FetchOutcome, IndexMeshError> {
        let mut outcome = FetchOutcome::default();
        let mut token: Option<String> = None;
        let epoch = Utc.timestamp_opt(0, 0).single();

        while outcome.requests_used < budget {
            let page = self.fetch_page(handle, token.as_deref()).await?;
            outcome.requests_used += 1;

            if page.rate_limited {
                outcome.rate_limited = true;
                outcome.has_more_data = true;
                debug!(handle, reset = ?page.reset_after_secs, "Microblog adapter rate limited");
                return Ok(outcome);
            }

            let mut hit_boundary = false;
            for record in page.records {
                if let Some(since) = since {
                    if record.created_at <= since {
                        hit_boundary = true;
                        break;
                    }
                }
                outcome.records.push(record);
            }

            if hit_boundary {
                outcome.has_more_data = false;
                return Ok(outcome);
            }

            match page.next_token {
                Some(next) => token = Some(next),
                None => {
                    outcome.has_more_data = false;
                    return Ok(outcome);
                }
            }
        }

        let _ = epoch;
        outcome.has_more_data = true;
        Ok(outcome)
    }

    /// Declared capability gap (§9): this adapter has no "before earliest"
    /// pagination mode, so it unconditionally reports `has_more_data=false`
    /// rather than silently pretending a backward scan happened.
    async fn fetch_backward(
        &self,
        handle: &str,
        _before: Option<DateTime<Utc>>,
        _budget: u32,
    ) -> Result<FetchOutcome, IndexMeshError> {
        warn!(handle, "Microblog adapter has no backward pagination; reporting no-op");
        Ok(FetchOutcome {
            records: Vec::new(),
            requests_used: 0,
            has_more_data: false,
            rate_limited: false,
        })
    }
}
