//! Autoscaler error types.

use std::fmt;
use std::time::Duration;

use phil_core::BoxError;
use thiserror::Error;

pub type AutoscaleResult<T> = Result<T, AutoscaleError>;

/// The cycle stages that call out to an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    Discovering,
    ResolvingActive,
    AggregatingLoad,
    Resizing,
}

impl fmt::Display for CycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CycleStage::Discovering => "discovering workers",
            CycleStage::ResolvingActive => "resolving active workers",
            CycleStage::AggregatingLoad => "aggregating load",
            CycleStage::Resizing => "resizing group",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum AutoscaleError {
    #[error("{stage} failed: {source}")]
    Adapter {
        stage: CycleStage,
        #[source]
        source: BoxError,
    },

    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: CycleStage, after: Duration },

    #[error("no active workers ({running} running, {paused} paused)")]
    NoActiveWorkers { running: usize, paused: usize },

    #[error("no load records present for the currently running workers")]
    NoLoadRecords,

    #[error("average load of the workers is 0, no work is being delivered to them")]
    ZeroLoad,

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl AutoscaleError {
    /// "No signal" conditions: expected states in which no safe sizing
    /// decision exists. They abort the cycle like any other error.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            AutoscaleError::NoActiveWorkers { .. }
                | AutoscaleError::NoLoadRecords
                | AutoscaleError::ZeroLoad
        )
    }
}
