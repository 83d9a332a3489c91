//! Groupchat source adapter (§4.3): main-channel and per-forum-topic
//! messages behind one bounded page iterator, with full forward and
//! backward pagination via `offsetDate`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmesh_common::{IndexMeshError, Source};

use crate::adapter::{FetchOutcome, RawRecord, SourceAdapter};

const PAGE_SIZE: u32 = 100;

/// `handle` is either a bare channel (`"kaspa-general"`) or a topic
/// partition (`"kaspa-general:topic:42"`) — see §4.4 for how C4 carries
/// this through to `partitionHandle`.
fn parse_handle(handle: &str) -> (String, Option<i64>) {
    match handle.split_once(":topic:") {
        Some((channel, topic)) => (channel.to_string(), topic.parse::<i64>().ok()),
        None => (handle.to_string(), None),
    }
}

pub struct GroupchatAdapter {
    http: reqwest::Client,
    base_url: String,
    session_token: String,
}

impl GroupchatAdapter {
    pub fn new(base_url: impl Into<String>, session_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            session_token: session_token.into(),
        }
    }

    async fn fetch_page(
        &self,
        channel: &str,
        topic: Option<i64>,
        offset_date: Option<DateTime<Utc>>,
    ) -> Result<(Vec<RawRecord>, bool), IndexMeshError> {
        let mut url = format!("{}/channels/{}/messages?limit={}", self.base_url, channel, PAGE_SIZE);
        if let Some(topic_id) = topic {
            url.push_str(&format!("&topic_id={topic_id}"));
        }
        if let Some(offset) = offset_date {
            url.push_str(&format!("&offset_date={}", offset.to_rfc3339()));
        }

        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.session_token))
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| IndexMeshError::Transient(e.to_string()))?;

        if response.status().as_u16() == 429 {
            return Err(IndexMeshError::RateLimited { reset_after_secs: 60 });
        }
        if response.status() == 401 || response.status() == 403 {
            return Err(IndexMeshError::Unauthorized(format!(
                "groupchat adapter unauthorized for {channel}"
            )));
        }
        if !response.status().is_success() {
            return Err(IndexMeshError::Transient(format!(
                "groupchat messages error {}: {channel}",
                response.status()
            )));
        }

        let body: ChannelMessagesResponse = response
            .json()
            .await
            .map_err(|e| IndexMeshError::Fatal(format!("malformed channel response: {e}")))?;

        let partition_handle = match topic {
            Some(id) => format!("{channel}:topic:{id}"),
            None => channel.to_string(),
        };

        let has_more = body.messages.len() as u32 == PAGE_SIZE;
        let records = body
            .messages
            .into_iter()
            .map(|m| RawRecord {
                foreign_id: m.id.clone(),
                author_handle: m.author_handle,
                text: m.text,
                created_at: m.created_at,
                partition_handle: partition_handle.clone(),
                raw: m.raw,
            })
            .collect();

        Ok((records, has_more))
    }
}

#[derive(serde::Deserialize)]
struct ChannelMessagesResponse {
    messages: Vec<ChannelMessage>,
}

#[derive(serde::Deserialize)]
struct ChannelMessage {
    id: String,
    author_handle: String,
    text: String,
    created_at: DateTime<Utc>,
    #[serde(flatten)]
    raw: serde_json::Value,
}

#[async_trait]
impl SourceAdapter for GroupchatAdapter {
    fn source(&self) -> Source {
        Source::Groupchat
    }

    async fn fetch_forward(
        &self,
        handle: &str,
        since: Option<DateTime<Utc>>,
        budget: u32,
    ) -> Result<FetchOutcome, IndexMeshError> {
        let (channel, topic) = parse_handle(handle);
        let mut outcome = FetchOutcome::default();
        let mut offset = None;

        while outcome.requests_used < budget {
            let (records, page_full) = self.fetch_page(&channel, topic, offset).await?;
            outcome.requests_used += 1;

            let mut hit_boundary = false;
            let mut oldest_seen = offset;
            for record in records {
                if let Some(since) = since {
                    if record.created_at <= since {
                        hit_boundary = true;
                        break;
                    }
                }
                oldest_seen = Some(record.created_at);
                outcome.records.push(record);
            }

            if hit_boundary || !page_full {
                outcome.has_more_data = false;
                return Ok(outcome);
            }
            offset = oldest_seen;
        }

        outcome.has_more_data = true;
        Ok(outcome)
    }

    async fn fetch_backward(
        &self,
        handle: &str,
        before: Option<DateTime<Utc>>,
        budget: u32,
    ) -> Result<FetchOutcome, IndexMeshError> {
        let (channel, topic) = parse_handle(handle);
        let mut outcome = FetchOutcome::default();
        let mut offset = before;

        while outcome.requests_used < budget {
            let (records, page_full) = self.fetch_page(&channel, topic, offset).await?;
            outcome.requests_used += 1;

            let mut hit_boundary = false;
            let mut oldest_seen = offset;
            for record in records {
                if let Some(before) = before {
                    if record.created_at >= before {
                        hit_boundary = true;
                        continue;
                    }
                }
                oldest_seen = Some(record.created_at);
                outcome.records.push(record);
            }

            if !page_full {
                outcome.has_more_data = false;
                return Ok(outcome);
            }
            let _ = hit_boundary;
            offset = oldest_seen;
        }

        outcome.has_more_data = true;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_channel_handle() {
        let (channel, topic) = parse_handle("kaspa-general");
        assert_eq!(channel, "kaspa-general");
        assert_eq!(topic, None);
    }

    #[test]
    fn parses_topic_partition_handle() {
        let (channel, topic) = parse_handle("kaspa-general:topic:42");
        assert_eq!(channel, "kaspa-general");
        assert_eq!(topic, Some(42));
    }
}
