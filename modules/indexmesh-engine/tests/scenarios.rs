//! End-to-end scenario tests (§8) driven entirely against in-memory fakes:
//! `MockAdapter`, `MockEmbedder`, `InMemoryGateway`. No network, no Docker.

use chrono::{Duration as ChronoDuration, Utc};
use indexmesh_common::{AccountPriority, AccountState, Source};
use indexmesh_embed::MockEmbedder;
use indexmesh_engine::IndexerCore;
use indexmesh_sources::{MockAdapter, RawRecord};
use indexmesh_store::{CollectionSpec, InMemoryGateway, VectorStoreGateway};
use uuid::Uuid;

fn record(foreign_id: &str, handle: &str, created_at: chrono::DateTime<Utc>) -> RawRecord {
    RawRecord {
        foreign_id: foreign_id.to_string(),
        author_handle: handle.to_string(),
        text: format!("hello world from {handle} message {foreign_id}"),
        created_at,
        partition_handle: handle.to_string(),
        raw: serde_json::Value::Null,
    }
}

async fn collection(gateway: &InMemoryGateway, dim: usize) {
    gateway.ensure_collection(&CollectionSpec::new("messages", dim)).await.unwrap();
}

#[tokio::test]
async fn cold_start_one_account_budget_exhausted() {
    let gateway = InMemoryGateway::new();
    collection(&gateway, 4).await;
    let embedder = MockEmbedder::new(4, 100);
    let adapter = MockAdapter::new(Source::Microblog);

    let now = Utc::now();
    let records: Vec<RawRecord> = (0..350)
        .map(|i| record(&i.to_string(), "alice", now - ChronoDuration::minutes(i)))
        .collect();
    adapter.seed("alice", records);

    let core = IndexerCore::new(&adapter, &embedder, &gateway, "messages", 365);
    let mut states = vec![AccountState::new(Source::Microblog, "alice", AccountPriority::Normal)];

    let report = core.run(Uuid::new_v4(), &mut states, 10).await;
    assert!(report.success);
    assert_eq!(report.stored, 350);
    assert!(gateway.point_count("messages") > 0);
}

#[tokio::test]
async fn warm_run_no_new_items() {
    let gateway = InMemoryGateway::new();
    collection(&gateway, 4).await;
    let embedder = MockEmbedder::new(4, 100);
    let adapter = MockAdapter::new(Source::Microblog);

    let now = Utc::now();
    let records: Vec<RawRecord> = (0..10)
        .map(|i| record(&i.to_string(), "alice", now - ChronoDuration::minutes(i)))
        .collect();
    adapter.seed("alice", records);

    let core = IndexerCore::new(&adapter, &embedder, &gateway, "messages", 365);
    let mut states = vec![AccountState::new(Source::Microblog, "alice", AccountPriority::Normal)];

    let first = core.run(Uuid::new_v4(), &mut states, 10).await;
    assert_eq!(first.stored, 10);

    let second = core.run(Uuid::new_v4(), &mut states, 10).await;
    assert_eq!(second.stored, 0);
    assert!(second.success);
}

#[tokio::test]
async fn rate_limited_mid_run_does_not_block_other_accounts() {
    let gateway = InMemoryGateway::new();
    collection(&gateway, 4).await;
    let embedder = MockEmbedder::new(4, 100);
    let adapter = MockAdapter::new(Source::Microblog);

    let now = Utc::now();
    adapter.seed("b", vec![record("1", "b", now)]);
    *adapter.inject_error.lock().unwrap() = Some(indexmesh_common::IndexMeshError::RateLimited {
        reset_after_secs: 120,
    });

    let core = IndexerCore::new(&adapter, &embedder, &gateway, "messages", 365);
    let mut states = vec![
        AccountState::new(Source::Microblog, "a", AccountPriority::High),
        AccountState::new(Source::Microblog, "b", AccountPriority::Low),
    ];

    let report = core.run(Uuid::new_v4(), &mut states, 3).await;
    // "a" hit the injected rate-limit error; "b" should still have been attempted.
    assert!(report.accounts.iter().any(|a| a.handle == "b"));
}

#[tokio::test]
async fn bulk_to_single_fallback_on_dimension_mismatch() {
    let gateway = InMemoryGateway::new();
    collection(&gateway, 4).await;
    // Message "2" gets a vector one short of the collection's dimension;
    // the bulk upsert rejects just that point, forcing single-item retry.
    let embedder = MockEmbedder::new(4, 100).with_bad_vector_for("message 2");
    let adapter = MockAdapter::new(Source::Microblog);

    let now = Utc::now();
    let records: Vec<RawRecord> = (0..5).map(|i| record(&i.to_string(), "alice", now - ChronoDuration::seconds(i))).collect();
    adapter.seed("alice", records);

    let core = IndexerCore::new(&adapter, &embedder, &gateway, "messages", 365);
    let mut states = vec![AccountState::new(Source::Microblog, "alice", AccountPriority::Normal)];

    let report = core.run(Uuid::new_v4(), &mut states, 10).await;
    assert!(report.success);
    assert_eq!(report.stored, 4);
    assert_eq!(report.errors, 1);
}

#[tokio::test]
async fn embedder_dimension_mismatch_falls_back_to_single_item() {
    let gateway = InMemoryGateway::new();
    collection(&gateway, 4).await;
    // Mirrors `EmbeddingClient::check_dimensions` rejecting the whole bulk
    // call outright (rather than the store rejecting one malformed point):
    // message "2" makes `embed_batch` itself return `DimensionMismatch`,
    // which must not abort the run — just force single-item mode.
    let embedder = MockEmbedder::new(4, 100).with_dimension_error_for("message 2");
    let adapter = MockAdapter::new(Source::Microblog);

    let now = Utc::now();
    let records: Vec<RawRecord> = (0..5).map(|i| record(&i.to_string(), "alice", now - ChronoDuration::seconds(i))).collect();
    adapter.seed("alice", records);

    let core = IndexerCore::new(&adapter, &embedder, &gateway, "messages", 365);
    let mut states = vec![AccountState::new(Source::Microblog, "alice", AccountPriority::Normal)];

    let report = core.run(Uuid::new_v4(), &mut states, 10).await;
    assert!(report.success);
    // In single-item mode, only the one offending message fails to embed;
    // the rest still embed and store fine.
    assert_eq!(report.stored, 4);
    assert_eq!(report.errors, 1);
}

#[tokio::test]
async fn rotation_fairness_over_ten_ticks() {
    let gateway = InMemoryGateway::new();
    collection(&gateway, 4).await;
    let embedder = MockEmbedder::new(4, 100);
    let adapter = MockAdapter::new(Source::Microblog);

    let now = Utc::now();
    let mut states = Vec::new();
    for i in 0..20 {
        let handle = format!("acct{i}");
        adapter.seed(&handle, vec![record("1", &handle, now)]);
        states.push(AccountState::new(Source::Microblog, handle, AccountPriority::Normal));
    }

    let core = IndexerCore::new(&adapter, &embedder, &gateway, "messages", 365);
    let mut appearances = std::collections::HashMap::new();

    for _ in 0..10 {
        let report = core.run(Uuid::new_v4(), &mut states, 5).await;
        for account in &report.accounts {
            *appearances.entry(account.handle.clone()).or_insert(0u32) += 1;
        }
    }

    for state in &states {
        let count = appearances.get(&state.handle).copied().unwrap_or(0);
        assert!(count >= 2, "account {} only appeared {count} times", state.handle);
    }
}
