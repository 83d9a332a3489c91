//! Normalizer (C4, §4.4): pure transformation from a raw adapter record
//! into a [`CanonicalMessage`]. No I/O, no state — every rule here is a
//! deterministic function of its input.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use indexmesh_common::{CanonicalMessage, KaspaTopic, ProcessingStatus, Source};
use indexmesh_sources::RawRecord;
use regex::Regex;

/// Substituted for genuinely empty text so the embedding provider never
/// sees a blank string (§4.4 — a deliberate design choice, documented
/// rather than silently special-cased downstream).
const EMPTY_TEXT_PLACEHOLDER: &str = "empty text";

/// Absolute cap; longer messages are skipped, not truncated (§4.4, §6).
const MAX_TEXT_LENGTH: usize = 5000;

/// Microblog-specific cap, strictly enforced (§6).
const MICROBLOG_TEXT_LENGTH: usize = 280;

const MIN_TEXT_LENGTH: usize = 10;

const KASPA_KEYWORDS: &[&str] = &["kaspa", "ksp", "kas", "ghostdag", "blockdag"];

const TOPIC_KEYWORDS: &[(KaspaTopic, &[&str])] = &[
    (KaspaTopic::Mining, &["mining", "miner", "hashrate", "asic"]),
    (KaspaTopic::Development, &["github", "commit", "protocol", "consensus", "rusty-kaspa"]),
    (KaspaTopic::Trading, &["price", "exchange", "trading", "chart", "listing"]),
    (KaspaTopic::Technology, &["ghostdag", "blockdag", "dag", "layer2", "scaling"]),
    (KaspaTopic::Community, &["community", "discord", "telegram", "meetup"]),
    (KaspaTopic::Defi, &["defi", "liquidity", "swap", "yield"]),
    (KaspaTopic::Nft, &["nft", "krc-721", "krc-20"]),
];

/// Outcome of normalizing one raw record: either a canonical message, or a
/// skip reason (never an error — skips are expected traffic, not failures).
pub enum NormalizeOutcome {
    Ok(CanonicalMessage),
    Skipped { reason: String },
}

pub struct Normalizer {
    hashtag_re: Regex,
    mention_re: Regex,
    link_re: Regex,
    handle_re: Regex,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    pub fn new() -> Self {
        Self {
            hashtag_re: Regex::new(r"#(\w+)").unwrap(),
            mention_re: Regex::new(r"@(\w+)").unwrap(),
            link_re: Regex::new(r"https?://\S+").unwrap(),
            handle_re: Regex::new(r"^[a-z0-9_]{1,15}$").unwrap(),
        }
    }

    pub fn normalize(&self, record: &RawRecord, source: Source) -> NormalizeOutcome {
        let text = clean_whitespace(&record.text);
        let text = if text.is_empty() {
            EMPTY_TEXT_PLACEHOLDER.to_string()
        } else {
            text
        };

        let cap = if source == Source::Microblog {
            MICROBLOG_TEXT_LENGTH
        } else {
            MAX_TEXT_LENGTH
        };
        if text.chars().count() > cap {
            return NormalizeOutcome::Skipped {
                reason: format!("text length {} exceeds cap {cap}", text.chars().count()),
            };
        }
        if text != EMPTY_TEXT_PLACEHOLDER && text.chars().count() < MIN_TEXT_LENGTH {
            return NormalizeOutcome::Skipped {
                reason: format!("text length {} below minimum {MIN_TEXT_LENGTH}", text.chars().count()),
            };
        }

        let author_handle = record.author_handle.to_lowercase();
        if source == Source::Microblog && !self.handle_re.is_match(&author_handle) {
            tracing::warn!(handle = %author_handle, "Microblog handle does not match expected pattern");
        }

        let hashtags = self.extract(&self.hashtag_re, &text);
        let mentions = self.extract(&self.mention_re, &text);
        let links = dedup_preserving_order(self.link_re.find_iter(&text).map(|m| m.as_str().to_string()));

        let lower_text = text.to_lowercase();
        let kaspa_related = KASPA_KEYWORDS.iter().any(|kw| lower_text.contains(kw));
        let kaspa_topics = TOPIC_KEYWORDS
            .iter()
            .filter(|(_, keywords)| keywords.iter().any(|kw| lower_text.contains(kw)))
            .map(|(topic, _)| *topic)
            .collect();

        let id = stable_hash(&[
            &source.to_string(),
            &record.partition_handle,
            &record.foreign_id,
        ]);

        NormalizeOutcome::Ok(CanonicalMessage {
            id,
            text,
            author: record.author_handle.clone(),
            author_handle,
            created_at: record.created_at,
            url: String::new(),
            source,
            kaspa_related,
            kaspa_topics,
            hashtags,
            mentions,
            links,
            language: detect_language(&lower_text),
            processing_status: ProcessingStatus::Transformed,
            retry_count: 0,
            errors: Vec::new(),
            original_foreign_id: record.foreign_id.clone(),
        })
    }

    fn extract(&self, re: &Regex, text: &str) -> Vec<String> {
        dedup_preserving_order(re.captures_iter(text).filter_map(|c| c.get(1).map(|m| m.as_str().to_lowercase())))
    }
}

fn clean_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Dedupes an iterator's items by first occurrence, keeping the original
/// order — hashtags/mentions/links must be ordered-unique lists (§3), not
/// just unique sets.
fn dedup_preserving_order(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items.into_iter().filter(|item| seen.insert(item.clone())).collect()
}

fn stable_hash(parts: &[&str]) -> String {
    let mut hasher = DefaultHasher::new();
    for part in parts {
        part.hash(&mut hasher);
        0u8.hash(&mut hasher); // separator so adjacent parts can't collide
    }
    format!("{}:{}:{:016x}", parts[0], parts[1], hasher.finish())
}

/// Best-effort, explicitly-not-a-model language heuristic (§4.4): a small
/// fixed stopword/character-set sniff. Anything inconclusive is tagged
/// `"unknown"`.
fn detect_language(lower_text: &str) -> String {
    const ENGLISH_STOPWORDS: &[&str] = &["the", "and", "is", "are", "this", "that"];
    const SPANISH_STOPWORDS: &[&str] = &["el", "la", "de", "que", "los", "es"];

    let words: Vec<&str> = lower_text.split_whitespace().collect();
    let english_hits = words.iter().filter(|w| ENGLISH_STOPWORDS.contains(w)).count();
    let spanish_hits = words.iter().filter(|w| SPANISH_STOPWORDS.contains(w)).count();

    if english_hits == 0 && spanish_hits == 0 {
        "unknown".to_string()
    } else if english_hits >= spanish_hits {
        "en".to_string()
    } else {
        "es".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(text: &str) -> RawRecord {
        RawRecord {
            foreign_id: "123".to_string(),
            author_handle: "Alice".to_string(),
            text: text.to_string(),
            created_at: Utc::now(),
            partition_handle: "alice".to_string(),
            raw: serde_json::Value::Null,
        }
    }

    #[test]
    fn empty_text_becomes_placeholder() {
        let n = Normalizer::new();
        match n.normalize(&record(""), Source::Groupchat) {
            NormalizeOutcome::Ok(msg) => assert_eq!(msg.text, EMPTY_TEXT_PLACEHOLDER),
            NormalizeOutcome::Skipped { .. } => panic!("should not skip"),
        }
    }

    #[test]
    fn oversized_microblog_text_is_skipped() {
        let n = Normalizer::new();
        let long_text = "a".repeat(300);
        match n.normalize(&record(&long_text), Source::Microblog) {
            NormalizeOutcome::Skipped { .. } => {}
            NormalizeOutcome::Ok(_) => panic!("should skip over-length microblog text"),
        }
    }

    #[test]
    fn extracts_hashtags_mentions_links_lowercased() {
        let n = Normalizer::new();
        let text = "Check #Kaspa with @BobSmith at https://example.com/page";
        match n.normalize(&record(text), Source::Groupchat) {
            NormalizeOutcome::Ok(msg) => {
                assert_eq!(msg.hashtags, vec!["kaspa"]);
                assert_eq!(msg.mentions, vec!["bobsmith"]);
                assert_eq!(msg.links, vec!["https://example.com/page"]);
            }
            NormalizeOutcome::Skipped { .. } => panic!("should not skip"),
        }
    }

    #[test]
    fn repeated_hashtags_mentions_links_are_deduped_in_first_seen_order() {
        let n = Normalizer::new();
        let text = "#Kaspa #BTC @BobSmith #kaspa https://example.com/a https://example.com/b https://example.com/a @bobsmith";
        match n.normalize(&record(text), Source::Groupchat) {
            NormalizeOutcome::Ok(msg) => {
                assert_eq!(msg.hashtags, vec!["kaspa", "btc"]);
                assert_eq!(msg.mentions, vec!["bobsmith"]);
                assert_eq!(msg.links, vec!["https://example.com/a", "https://example.com/b"]);
            }
            NormalizeOutcome::Skipped { .. } => panic!("should not skip"),
        }
    }

    #[test]
    fn author_handle_is_lowercased() {
        let n = Normalizer::new();
        match n.normalize(&record("hello there friend"), Source::Groupchat) {
            NormalizeOutcome::Ok(msg) => assert_eq!(msg.author_handle, "alice"),
            NormalizeOutcome::Skipped { .. } => panic!("should not skip"),
        }
    }

    #[test]
    fn id_is_stable_across_identical_inputs() {
        let n = Normalizer::new();
        let a = match n.normalize(&record("hello there friend"), Source::Groupchat) {
            NormalizeOutcome::Ok(msg) => msg.id,
            _ => panic!(),
        };
        let b = match n.normalize(&record("hello there friend"), Source::Groupchat) {
            NormalizeOutcome::Ok(msg) => msg.id,
            _ => panic!(),
        };
        assert_eq!(a, b);
    }

    #[test]
    fn kaspa_keyword_sets_related_flag_and_topic() {
        let n = Normalizer::new();
        match n.normalize(&record("kaspa mining hashrate is booming"), Source::Groupchat) {
            NormalizeOutcome::Ok(msg) => {
                assert!(msg.kaspa_related);
                assert!(msg.kaspa_topics.contains(&KaspaTopic::Mining));
            }
            NormalizeOutcome::Skipped { .. } => panic!("should not skip"),
        }
    }
}
