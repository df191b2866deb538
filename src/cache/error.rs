use std::time::Duration;

use thiserror::Error;

use super::invalidation::Stage;
use super::keys::Tier;

/// Failure talking to a cache tier store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TierError {
    #[error("{tier} tier unavailable: {reason}")]
    Unavailable { tier: Tier, reason: String },
    #[error("{tier} tier timed out after {}ms", .elapsed.as_millis())]
    Timeout { tier: Tier, elapsed: Duration },
}

impl TierError {
    pub fn unavailable(tier: Tier, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            tier,
            reason: reason.into(),
        }
    }

    pub fn tier(&self) -> Tier {
        match self {
            TierError::Unavailable { tier, .. } | TierError::Timeout { tier, .. } => *tier,
        }
    }
}

/// Failure fetching from, or purging at, the authoritative origin.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OriginError {
    #[error("origin timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("origin transport failure: {0}")]
    Transport(String),
    #[error("origin responded with status {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("origin body rejected: {0}")]
    Body(String),
}

impl OriginError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    /// Short label used as a metric dimension.
    pub fn kind(&self) -> &'static str {
        match self {
            OriginError::Timeout(_) => "timeout",
            OriginError::Transport(_) => "transport",
            OriginError::Status { .. } => "status",
            OriginError::Body(_) => "body",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, OriginError::Timeout(_))
    }
}

/// Failure of one stage of an invalidation run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvalidationError {
    #[error(transparent)]
    Origin(#[from] OriginError),
    #[error(transparent)]
    Tier(#[from] TierError),
    #[error("{stage} stage timed out after {}ms", .elapsed.as_millis())]
    Timeout { stage: Stage, elapsed: Duration },
}
