//! Progress ledger for invalidations that stopped at a failed stage.
//!
//! Each pending tag remembers which stages are still owed, so a retry resumes
//! at the first incomplete stage and never repeats or skips one.

use std::collections::HashMap;
use std::sync::Mutex;

use metrics::gauge;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use super::invalidation::Stage;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::ledger";
const METRIC_INVALIDATION_PENDING: &str = "tenant_edge_invalidation_pending";

/// An invalidation of one tag across the ordered target stages.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidationRequest {
    /// Stable across retries of the same tag.
    pub id: Uuid,
    pub tag: String,
    #[serde(with = "time::serde::rfc3339")]
    pub requested_at: OffsetDateTime,
    /// Stages still owed, authoritative first.
    pub remaining: Vec<Stage>,
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl InvalidationRequest {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tag: tag.into(),
            requested_at: OffsetDateTime::now_utc(),
            remaining: Stage::ALL.to_vec(),
            attempts: 0,
            last_error: None,
        }
    }

    pub fn next_stage(&self) -> Option<Stage> {
        self.remaining.first().copied()
    }

    /// Drop `stage` from the front of the remaining list.
    pub fn complete(&mut self, stage: Stage) {
        if self.next_stage() == Some(stage) {
            self.remaining.remove(0);
        }
    }

    pub fn is_complete(&self) -> bool {
        self.remaining.is_empty()
    }
}

#[derive(Default)]
pub struct InvalidationLedger {
    pending: Mutex<HashMap<String, InvalidationRequest>>,
}

impl InvalidationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pending request for `tag`, or a fresh one covering every stage.
    pub fn begin(&self, tag: &str) -> InvalidationRequest {
        mutex_lock(&self.pending, SOURCE, "begin")
            .get(tag)
            .cloned()
            .unwrap_or_else(|| InvalidationRequest::new(tag))
    }

    /// Persist a request that stopped before completing.
    pub fn record(&self, request: InvalidationRequest) {
        info!(
            request_id = %request.id,
            tag = %request.tag,
            next_stage = ?request.next_stage(),
            attempts = request.attempts,
            "Invalidation left pending"
        );
        let mut pending = mutex_lock(&self.pending, SOURCE, "record");
        pending.insert(request.tag.clone(), request);
        gauge!(METRIC_INVALIDATION_PENDING).set(pending.len() as f64);
    }

    pub fn resolve(&self, tag: &str) {
        let mut pending = mutex_lock(&self.pending, SOURCE, "resolve");
        if pending.remove(tag).is_some() {
            gauge!(METRIC_INVALIDATION_PENDING).set(pending.len() as f64);
        }
    }

    pub fn get(&self, tag: &str) -> Option<InvalidationRequest> {
        mutex_lock(&self.pending, SOURCE, "get").get(tag).cloned()
    }

    /// Snapshot of pending requests, oldest first.
    pub fn pending(&self) -> Vec<InvalidationRequest> {
        let mut requests: Vec<_> = mutex_lock(&self.pending, SOURCE, "pending")
            .values()
            .cloned()
            .collect();
        requests.sort_by(|a, b| {
            a.requested_at
                .cmp(&b.requested_at)
                .then_with(|| a.tag.cmp(&b.tag))
        });
        requests
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.pending, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
