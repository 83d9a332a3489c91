use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A source platform. May carry a sub-partition encoded into the handle
/// (e.g. `channel:topic:<id>` for groupchat forum topics) — see
/// [`CanonicalMessage::author_handle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Microblog,
    Groupchat,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Microblog => write!(f, "microblog"),
            Source::Groupchat => write!(f, "groupchat"),
        }
    }
}

impl std::str::FromStr for Source {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "microblog" => Ok(Self::Microblog),
            "groupchat" => Ok(Self::Groupchat),
            other => Err(format!("unknown source: {other}")),
        }
    }
}

/// Monotonic progress marker for a message within a single run. Never goes
/// backwards for a given message within that run (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Scraped,
    Transformed,
    Embedded,
    Stored,
    Failed,
}

/// Fixed bucket names a message can be classified into by keyword match
/// (§4.4). Kept as a closed set rather than free-form strings so storage
/// and querying stay predictable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum KaspaTopic {
    Mining,
    Development,
    Trading,
    Technology,
    Community,
    Defi,
    Nft,
}

impl std::fmt::Display for KaspaTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            KaspaTopic::Mining => "mining",
            KaspaTopic::Development => "development",
            KaspaTopic::Trading => "trading",
            KaspaTopic::Technology => "technology",
            KaspaTopic::Community => "community",
            KaspaTopic::Defi => "defi",
            KaspaTopic::Nft => "nft",
        };
        write!(f, "{s}")
    }
}

/// The normalized unit flowing through the pipeline after C4 (spec §3).
///
/// Downstream code (C5, C6, C1) must only ever see a `CanonicalMessage` —
/// raw adapter records are coerced into this shape at exactly one place
/// (the normalizer) and never re-peeked at after that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CanonicalMessage {
    /// Deterministic id derived from `(source, channel, foreignId)`. Stable
    /// across reruns — this is the idempotence boundary (P1).
    pub id: String,
    pub text: String,
    pub author: String,
    /// Lower-cased; the partition key for boundary queries (§4.5).
    pub author_handle: String,
    pub created_at: DateTime<Utc>,
    pub url: String,
    pub source: Source,
    pub kaspa_related: bool,
    pub kaspa_topics: Vec<KaspaTopic>,
    pub hashtags: Vec<String>,
    pub mentions: Vec<String>,
    pub links: Vec<String>,
    /// Best-effort language tag; `"unknown"` is allowed (§4.4).
    pub language: String,
    pub processing_status: ProcessingStatus,
    pub retry_count: u32,
    pub errors: Vec<String>,
    /// The foreign id assigned by the source platform, kept for the
    /// `originalForeignId` payload field (§6).
    pub original_foreign_id: String,
}

impl CanonicalMessage {
    /// The UUID this message's point is stored under: a namespace-v5 hash
    /// of [`CanonicalMessage::id`] (§3). Deterministic so reruns overwrite
    /// rather than duplicate (P1).
    pub fn point_id(&self) -> Uuid {
        point_id_for(&self.id)
    }
}

/// Fixed namespace used to derive point ids via UUIDv5. Changing this
/// value would silently orphan every previously-stored point, so it is a
/// hardcoded constant rather than configuration.
pub const POINT_ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6f, 0x1d, 0x3a, 0x42, 0x9b, 0x77, 0x4e, 0x8a, 0xa2, 0x0c, 0x5d, 0x4b, 0x8e, 0x1f, 0x90, 0x2e,
]);

pub fn point_id_for(canonical_id: &str) -> Uuid {
    Uuid::new_v5(&POINT_ID_NAMESPACE, canonical_id.as_bytes())
}

/// What C1 persists: a vector plus the canonical message as payload, minus
/// the vector itself (which lives alongside, not duplicated in the
/// payload) and plus `stored_at` (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredPoint {
    pub point_id: Uuid,
    pub vector: Vec<f32>,
    pub payload: StoredPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredPayload {
    pub text: String,
    pub author: String,
    pub author_handle: String,
    pub created_at: DateTime<Utc>,
    pub url: String,
    pub source: Source,
    pub kaspa_related: bool,
    pub kaspa_topics: Vec<KaspaTopic>,
    pub hashtags: Vec<String>,
    pub mentions: Vec<String>,
    pub links: Vec<String>,
    pub language: String,
    pub original_foreign_id: String,
    pub stored_at: DateTime<Utc>,
    pub vector_dimensions: usize,
}

impl StoredPayload {
    pub fn from_message(msg: &CanonicalMessage, stored_at: DateTime<Utc>, vector_dimensions: usize) -> Self {
        Self {
            text: msg.text.clone(),
            author: msg.author.clone(),
            author_handle: msg.author_handle.clone(),
            created_at: msg.created_at,
            url: msg.url.clone(),
            source: msg.source,
            kaspa_related: msg.kaspa_related,
            kaspa_topics: msg.kaspa_topics.clone(),
            hashtags: msg.hashtags.clone(),
            mentions: msg.mentions.clone(),
            links: msg.links.clone(),
            language: msg.language.clone(),
            original_foreign_id: msg.original_foreign_id.clone(),
            stored_at,
            vector_dimensions,
        }
    }
}

/// Account priority used by the rotation policy (C7) as the dominant
/// scoring term (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AccountPriority {
    Low,
    Normal,
    High,
}

impl Default for AccountPriority {
    fn default() -> Self {
        AccountPriority::Normal
    }
}

/// Per-`(source, handle)` rotation bookkeeping (§3, §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountState {
    pub handle: String,
    pub source: Source,
    pub priority: AccountPriority,
    pub last_attempted_at: Option<DateTime<Utc>>,
    pub last_completed_at: Option<DateTime<Utc>>,
    pub tweets_processed_last_run: u64,
    pub was_completed: bool,
    pub has_more_data: bool,
    pub consecutive_failures: u32,
}

impl AccountState {
    pub fn new(source: Source, handle: impl Into<String>, priority: AccountPriority) -> Self {
        Self {
            handle: handle.into(),
            source,
            priority,
            last_attempted_at: None,
            last_completed_at: None,
            tweets_processed_last_run: 0,
            was_completed: false,
            has_more_data: false,
            consecutive_failures: 0,
        }
    }
}

/// Derived `{earliest, latest}` boundary for one handle (§3, §4.5). Never
/// cached authoritatively — the vector store is the ground truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Boundary {
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
    pub has_data: bool,
}

impl Boundary {
    pub fn empty() -> Self {
        Self {
            earliest: None,
            latest: None,
            has_data: false,
        }
    }
}

/// Per-account outcome folded into a [`RunReport`] (§3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountRunOutcome {
    pub handle: String,
    pub requests_used: u32,
    pub processed: u64,
    pub embedded: u64,
    pub stored: u64,
    pub errors: u64,
    pub was_completed: bool,
    pub has_more_data: bool,
    pub rate_limited: bool,
}

/// Summary of one scheduler- or CLI-triggered indexing pass (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub source: Source,
    pub processed: u64,
    pub embedded: u64,
    pub stored: u64,
    pub errors: u64,
    pub processing_time_ms: u64,
    pub requests_used: u32,
    pub rate_limited: bool,
    pub has_more_data: bool,
    pub accounts: Vec<AccountRunOutcome>,
    pub success: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// One configured microblog account to index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSpec {
    pub handle: String,
    #[serde(default)]
    pub priority: AccountPriority,
}

/// One configured groupchat channel to index. `username`/`id` mirror the
/// two ways a channel may be addressed by the upstream platform; at least
/// one must be set (validated at config load, §4.0).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub id: Option<i64>,
    pub username: Option<String>,
    #[serde(default)]
    pub priority: AccountPriority,
}

impl ChannelSpec {
    /// The canonical handle used as the boundary/rotation partition key
    /// for this channel's main feed (not its topics).
    pub fn canonical_handle(&self) -> String {
        self.username
            .clone()
            .unwrap_or_else(|| self.id.map(|i| i.to_string()).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_id_is_deterministic() {
        let a = point_id_for("microblog:alice:123");
        let b = point_id_for("microblog:alice:123");
        assert_eq!(a, b);
    }

    #[test]
    fn point_id_differs_by_input() {
        let a = point_id_for("microblog:alice:123");
        let b = point_id_for("microblog:alice:124");
        assert_ne!(a, b);
    }

    #[test]
    fn boundary_empty_has_no_data() {
        let b = Boundary::empty();
        assert!(!b.has_data);
        assert!(b.earliest.is_none());
        assert!(b.latest.is_none());
    }
}
