//! Indexer core (C6, §4.6): the per-source state machine binding adapters
//! (C3), the normalizer (C4), the boundary index (C5), the embedding
//! client (C2) and the vector store gateway (C1) into one indexing run.

use chrono::{DateTime, Utc};
use indexmesh_common::{
    AccountPriority, AccountRunOutcome, AccountState, CanonicalMessage, IndexMeshError, RunReport,
    Source, StoredPayload,
};
use indexmesh_embed::TextEmbedder;
use indexmesh_sources::SourceAdapter;
use indexmesh_store::{GatewayPoint, VectorStoreGateway};
use tracing::{info_span, warn, Instrument};
use uuid::Uuid;

use crate::budget::RequestBudget;
use crate::normalizer::{NormalizeOutcome, Normalizer};
use crate::rotation::{self, RotationPlanEntry};
use crate::BoundaryIndex;

pub struct IndexerCore<'a> {
    pub adapter: &'a dyn SourceAdapter,
    pub embedder: &'a dyn TextEmbedder,
    pub gateway: &'a dyn VectorStoreGateway,
    pub collection: String,
    pub max_historical_days: i64,
    normalizer: Normalizer,
}

struct DirectionOutcome {
    requests_used: u32,
    processed: u64,
    embedded: u64,
    stored: u64,
    errors: u64,
    has_more_data: bool,
    rate_limited: bool,
}

impl<'a> IndexerCore<'a> {
    pub fn new(
        adapter: &'a dyn SourceAdapter,
        embedder: &'a dyn TextEmbedder,
        gateway: &'a dyn VectorStoreGateway,
        collection: impl Into<String>,
        max_historical_days: i64,
    ) -> Self {
        Self {
            adapter,
            embedder,
            gateway,
            collection: collection.into(),
            max_historical_days,
            normalizer: Normalizer::new(),
        }
    }

    /// Runs one full tick: builds a rotation plan against `global_budget`,
    /// then processes each planned account in turn (§4.6 pseudocode).
    pub async fn run(
        &self,
        run_id: Uuid,
        states: &mut [AccountState],
        global_budget: u32,
    ) -> RunReport {
        let started_at = Utc::now();
        let source = self.adapter.source();
        let span = info_span!("indexing_run", %run_id, %source);

        async {
            let budget = RequestBudget::new(global_budget);
            let plan = rotation::plan(states, global_budget, started_at);

            let mut accounts_out = Vec::new();
            let mut totals = AccountRunOutcome::default();
            let mut overall_rate_limited = false;
            let mut overall_has_more = false;
            let mut fatal: Option<IndexMeshError> = None;

            for entry in &plan {
                if budget.is_exhausted() || fatal.is_some() {
                    break;
                }
                if !budget.try_authorize(entry.allocated_requests) {
                    continue;
                }

                let outcome = self.run_account(entry, started_at).await;
                match outcome {
                    Ok(account_outcome) => {
                        if let Some(state) = states.iter_mut().find(|s| s.handle == entry.handle) {
                            rotation::apply_feedback(state, &account_outcome, Utc::now());
                        }
                        overall_rate_limited |= account_outcome.rate_limited;
                        overall_has_more |= account_outcome.has_more_data;
                        totals.processed += account_outcome.processed;
                        totals.embedded += account_outcome.embedded;
                        totals.stored += account_outcome.stored;
                        totals.errors += account_outcome.errors;
                        totals.requests_used += account_outcome.requests_used;
                        accounts_out.push(account_outcome);
                    }
                    Err(e) if e.is_fatal() => {
                        warn!(handle = %entry.handle, error = %e, "Fatal error, aborting run");
                        fatal = Some(e);
                        break;
                    }
                    Err(e) => {
                        warn!(handle = %entry.handle, error = %e, "Account aborted");
                        if let Some(state) = states.iter_mut().find(|s| s.handle == entry.handle) {
                            state.consecutive_failures += 1;
                            state.last_attempted_at = Some(Utc::now());
                        }
                        accounts_out.push(AccountRunOutcome {
                            handle: entry.handle.clone(),
                            errors: 1,
                            ..Default::default()
                        });
                    }
                }
            }

            let finished_at = Utc::now();
            RunReport {
                run_id,
                source,
                processed: totals.processed,
                embedded: totals.embedded,
                stored: totals.stored,
                errors: totals.errors,
                processing_time_ms: (finished_at - started_at).num_milliseconds().max(0) as u64,
                requests_used: totals.requests_used,
                rate_limited: overall_rate_limited,
                has_more_data: overall_has_more,
                accounts: accounts_out,
                success: fatal.is_none(),
                started_at,
                finished_at,
            }
        }
        .instrument(span)
        .await
    }

    async fn run_account(
        &self,
        entry: &RotationPlanEntry,
        now: DateTime<Utc>,
    ) -> Result<AccountRunOutcome, IndexMeshError> {
        let boundary_index = BoundaryIndex::new(self.gateway, self.collection.clone());
        let boundary = boundary_index.boundaries(&entry.handle).await?;

        let mut outcome = AccountRunOutcome {
            handle: entry.handle.clone(),
            ..Default::default()
        };

        if !boundary.has_data {
            let since = Some(now - chrono::Duration::days(self.max_historical_days));
            let forward = self
                .run_direction(&entry.handle, Direction::Forward, since, entry.allocated_requests)
                .await?;
            self.fold(&mut outcome, forward);
        } else {
            let forward_budget = entry.allocated_requests.div_ceil(2);
            let forward = self
                .run_direction(&entry.handle, Direction::Forward, boundary.latest, forward_budget)
                .await?;
            let used_so_far = forward.requests_used;
            self.fold(&mut outcome, forward);

            let backward_budget = entry.allocated_requests.saturating_sub(used_so_far);
            if backward_budget > 0 && !outcome.rate_limited {
                let backward = self
                    .run_direction(&entry.handle, Direction::Backward, boundary.earliest, backward_budget)
                    .await?;
                self.fold(&mut outcome, backward);
            }
        }

        outcome.was_completed = outcome.requests_used < entry.allocated_requests;
        Ok(outcome)
    }

    fn fold(&self, outcome: &mut AccountRunOutcome, d: DirectionOutcome) {
        outcome.requests_used += d.requests_used;
        outcome.processed += d.processed;
        outcome.embedded += d.embedded;
        outcome.stored += d.stored;
        outcome.errors += d.errors;
        outcome.has_more_data |= d.has_more_data;
        outcome.rate_limited |= d.rate_limited;
    }

    async fn run_direction(
        &self,
        handle: &str,
        direction: Direction,
        boundary_ts: Option<DateTime<Utc>>,
        budget: u32,
    ) -> Result<DirectionOutcome, IndexMeshError> {
        let fetch = match direction {
            Direction::Forward => self.adapter.fetch_forward(handle, boundary_ts, budget).await?,
            Direction::Backward => self.adapter.fetch_backward(handle, boundary_ts, budget).await?,
        };

        if fetch.rate_limited {
            return Ok(DirectionOutcome {
                requests_used: fetch.requests_used,
                processed: 0,
                embedded: 0,
                stored: 0,
                errors: 0,
                has_more_data: true,
                rate_limited: true,
            });
        }

        let source = self.adapter.source();
        let mut messages = Vec::new();
        let mut skipped = 0u64;
        for record in &fetch.records {
            match self.normalizer.normalize(record, source) {
                NormalizeOutcome::Ok(msg) => messages.push(msg),
                NormalizeOutcome::Skipped { reason } => {
                    skipped += 1;
                    tracing::debug!(handle, reason = %reason, "Skipped record");
                }
            }
        }

        let mut stored = 0u64;
        let mut errors = skipped;

        for chunk in messages.chunks(self.embedder.max_batch_size()) {
            match self.process_chunk(chunk).await {
                Ok((chunk_stored, chunk_errors)) => {
                    stored += chunk_stored;
                    errors += chunk_errors;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(handle, error = %e, "Chunk failed entirely");
                    errors += chunk.len() as u64;
                }
            }
        }

        Ok(DirectionOutcome {
            requests_used: fetch.requests_used,
            processed: fetch.records.len() as u64,
            embedded: messages.len() as u64,
            stored,
            errors,
            has_more_data: fetch.has_more_data,
            rate_limited: false,
        })
    }

    /// Bulk mode first: one `embed` call, one `upsertBatch`. On failure,
    /// falls back to single mode: per-item embed + per-item upsert,
    /// collecting per-item errors and continuing (§4.6 step 4).
    async fn process_chunk(&self, messages: &[CanonicalMessage]) -> Result<(u64, u64), IndexMeshError> {
        if messages.is_empty() {
            return Ok((0, 0));
        }

        let texts: Vec<String> = messages.iter().map(|m| m.text.clone()).collect();
        match self.try_bulk(messages, &texts).await {
            Ok(stored) => Ok((stored, 0)),
            Err(e) if e.is_fatal() => Err(e),
            Err(_) => self.single_item_fallback(messages).await,
        }
    }

    async fn try_bulk(&self, messages: &[CanonicalMessage], texts: &[String]) -> Result<u64, IndexMeshError> {
        let vectors = self.embedder.embed_batch(texts).await?;
        if vectors.len() != messages.len() {
            return Err(IndexMeshError::Fatal(
                "embedding provider returned a different vector count than requested".to_string(),
            ));
        }

        let points = messages
            .iter()
            .zip(vectors.iter())
            .map(|(msg, vector)| self.to_gateway_point(msg, vector))
            .collect::<Result<Vec<_>, _>>()?;

        let outcome = self.gateway.upsert_batch(&self.collection, points).await?;
        if !outcome.errors.is_empty() {
            return Err(IndexMeshError::Transient(format!(
                "bulk upsert rejected {} of {} points",
                outcome.errors.len(),
                messages.len()
            )));
        }
        Ok(outcome.stored_count as u64)
    }

    async fn single_item_fallback(&self, messages: &[CanonicalMessage]) -> Result<(u64, u64), IndexMeshError> {
        let mut stored = 0u64;
        let mut errors = 0u64;

        for msg in messages {
            let result = async {
                let vector = self.embedder.embed_one(&msg.text).await?;
                let point = self.to_gateway_point(msg, &vector)?;
                self.gateway.upsert_batch(&self.collection, vec![point]).await
            }
            .await;

            match result {
                Ok(outcome) if outcome.errors.is_empty() => stored += 1,
                Ok(_) => errors += 1,
                Err(e) if e.is_fatal() => return Err(e),
                Err(_) => errors += 1,
            }
        }

        Ok((stored, errors))
    }

    /// Builds the point to upsert. Dimension validation against the
    /// collection's contract can reject a vector in two places — the
    /// embedder (C2), before any point is even built, or the gateway
    /// (§4.1), per point during upsert — and neither is treated as a
    /// run-level fatal; both drive the bulk→single fallback in
    /// `process_chunk` instead of aborting the whole run.
    fn to_gateway_point(&self, msg: &CanonicalMessage, vector: &[f32]) -> Result<GatewayPoint, IndexMeshError> {
        let payload = StoredPayload::from_message(msg, Utc::now(), vector.len());
        Ok(GatewayPoint {
            id: msg.point_id(),
            vector: vector.to_vec(),
            payload: serde_json::to_value(payload)
                .map_err(|e| IndexMeshError::Fatal(format!("payload serialization failed: {e}")))?,
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

pub fn default_priority_states(handles: &[(String, AccountPriority)], source: Source) -> Vec<AccountState> {
    handles
        .iter()
        .map(|(h, p)| AccountState::new(source, h.clone(), *p))
        .collect()
}
