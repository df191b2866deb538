//! Ordered invalidation across origin and both cache tiers.
//!
//! Stages run strictly in the order origin, regional, shield. A failed origin
//! delete aborts before any tier is touched. A failed tier stops the run and
//! leaves the remaining stages in the ledger so the next attempt resumes there.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::domain::error::DomainError;

use super::error::InvalidationError;
use super::ledger::{InvalidationLedger, InvalidationRequest};

const METRIC_INVALIDATION: &str = "tenant_edge_invalidation_total";
const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Anything that can drop content by tag.
#[async_trait]
pub trait InvalidationTarget: Send + Sync {
    /// Delete everything tagged `tag`; returns how many items were removed
    /// where the target knows. Unknown tags succeed with zero.
    async fn invalidate_tag(&self, tag: &str) -> Result<usize, InvalidationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Origin,
    Regional,
    Shield,
}

impl Stage {
    /// Execution order, authoritative first.
    pub const ALL: [Stage; 3] = [Stage::Origin, Stage::Regional, Stage::Shield];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Origin => "origin",
            Stage::Regional => "regional",
            Stage::Shield => "shield",
        }
    }

    fn completed_state(self) -> InvalidationState {
        match self {
            Stage::Origin => InvalidationState::OriginDeleted,
            Stage::Regional => InvalidationState::RegionalInvalidated,
            Stage::Shield => InvalidationState::ShieldInvalidated,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum InvalidationState {
    Pending,
    OriginDeleted,
    RegionalInvalidated,
    ShieldInvalidated,
    Complete,
    Failed(Stage),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageReport {
    pub stage: Stage,
    pub removed: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidationResult {
    pub tag: String,
    pub success: bool,
    /// Stage that failed, if any. Retrying resumes here.
    pub failed_tier: Option<Stage>,
    pub state: InvalidationState,
    /// First stage executed by this run.
    pub resumed_from: Option<Stage>,
    /// Stages completed by this run, in execution order.
    pub stages: Vec<StageReport>,
    pub attempts: u32,
    pub error: Option<String>,
}

pub struct InvalidationCoordinator {
    origin: Arc<dyn InvalidationTarget>,
    regional: Arc<dyn InvalidationTarget>,
    shield: Arc<dyn InvalidationTarget>,
    stage_timeout: Duration,
    ledger: InvalidationLedger,
}

impl InvalidationCoordinator {
    pub fn new(
        origin: Arc<dyn InvalidationTarget>,
        regional: Arc<dyn InvalidationTarget>,
        shield: Arc<dyn InvalidationTarget>,
    ) -> Self {
        Self {
            origin,
            regional,
            shield,
            stage_timeout: DEFAULT_STAGE_TIMEOUT,
            ledger: InvalidationLedger::new(),
        }
    }

    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    pub fn ledger(&self) -> &InvalidationLedger {
        &self.ledger
    }

    pub fn pending(&self) -> Vec<InvalidationRequest> {
        self.ledger.pending()
    }

    fn target(&self, stage: Stage) -> &Arc<dyn InvalidationTarget> {
        match stage {
            Stage::Origin => &self.origin,
            Stage::Regional => &self.regional,
            Stage::Shield => &self.shield,
        }
    }

    /// Run (or resume) the invalidation of `tag`.
    ///
    /// An empty tag is rejected before any stage runs.
    #[instrument(skip(self))]
    pub async fn invalidate(&self, tag: &str) -> Result<InvalidationResult, DomainError> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(DomainError::validation("tag is required"));
        }

        let mut request = self.ledger.begin(tag);
        request.attempts += 1;
        let resumed_from = request.next_stage();
        let mut stages = Vec::with_capacity(request.remaining.len());

        while let Some(stage) = request.next_stage() {
            match self.run_stage(stage, tag).await {
                Ok(removed) => {
                    info!(
                        tag,
                        stage = %stage,
                        removed,
                        state = ?stage.completed_state(),
                        "Invalidation stage complete"
                    );
                    request.complete(stage);
                    stages.push(StageReport { stage, removed });
                }
                Err(err) => {
                    warn!(
                        tag,
                        stage = %stage,
                        error = %err,
                        attempts = request.attempts,
                        "Invalidation stage failed"
                    );
                    counter!(METRIC_INVALIDATION, "outcome" => "failed", "stage" => stage.as_str())
                        .increment(1);
                    request.last_error = Some(err.to_string());
                    let attempts = request.attempts;
                    self.ledger.record(request);
                    return Ok(InvalidationResult {
                        tag: tag.to_string(),
                        success: false,
                        failed_tier: Some(stage),
                        state: InvalidationState::Failed(stage),
                        resumed_from,
                        stages,
                        attempts,
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        self.ledger.resolve(tag);
        counter!(METRIC_INVALIDATION, "outcome" => "success").increment(1);
        info!(tag, attempts = request.attempts, "Invalidation complete");
        Ok(InvalidationResult {
            tag: tag.to_string(),
            success: true,
            failed_tier: None,
            state: InvalidationState::Complete,
            resumed_from,
            stages,
            attempts: request.attempts,
            error: None,
        })
    }

    /// Re-drive every pending invalidation once.
    pub async fn retry_pending(&self) -> Vec<InvalidationResult> {
        let pending = self.ledger.pending();
        let mut results = Vec::with_capacity(pending.len());
        for request in pending {
            match self.invalidate(&request.tag).await {
                Ok(result) => results.push(result),
                Err(err) => warn!(tag = %request.tag, error = %err, "Skipping ledger entry with invalid tag"),
            }
        }
        results
    }

    async fn run_stage(&self, stage: Stage, tag: &str) -> Result<usize, InvalidationError> {
        tokio::time::timeout(self.stage_timeout, self.target(stage).invalidate_tag(tag))
            .await
            .unwrap_or(Err(InvalidationError::Timeout {
                stage,
                elapsed: self.stage_timeout,
            }))
    }
}
