//! Load aggregation and opportunistic pruning of stale load records.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use phil_core::{LoadRecord, LoadStore, WorkerIdentity, MAX_BATCH_OPERATIONS};

use crate::error::{AutoscaleError, AutoscaleResult};

/// Aggregate load of the active workers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoadSummary {
    pub records: usize,
    pub total_load: f64,
    pub average_load_absolute: f64,
    /// Average load as a fraction of one worker's capacity. Can exceed 1
    /// under overload.
    pub average_load_relative: f64,
}

/// Average the reported load of the given records.
///
/// An empty record set or a zero average is "no signal" and reported as
/// an error: no safe sizing decision can be made from it.
pub fn aggregate(records: &[LoadRecord]) -> AutoscaleResult<LoadSummary> {
    if records.is_empty() {
        return Err(AutoscaleError::NoLoadRecords);
    }

    let total_load: f64 = records.iter().map(|r| r.load).sum();
    let average_load_absolute = total_load / records.len() as f64;
    let average_load_relative = average_load_absolute / MAX_BATCH_OPERATIONS;

    debug!(total_load, "total load of the workers");
    debug!(average_load_absolute, "absolute average load of the workers");
    debug!(average_load_relative, "relative average load of the workers");

    if !average_load_relative.is_finite() || average_load_relative < 0.0 {
        return Err(AutoscaleError::InvalidInput(format!(
            "relative load {average_load_relative} is not a non-negative number"
        )));
    }
    if average_load_relative == 0.0 {
        return Err(AutoscaleError::ZeroLoad);
    }

    Ok(LoadSummary {
        records: records.len(),
        total_load,
        average_load_absolute,
        average_load_relative,
    })
}

/// Keys whose worker is not in the running list.
pub fn stale_keys(keys: &[WorkerIdentity], running: &[WorkerIdentity]) -> Vec<WorkerIdentity> {
    let running: HashSet<&str> = running.iter().map(String::as_str).collect();
    keys.iter()
        .filter(|k| !running.contains(k.as_str()))
        .cloned()
        .collect()
}

/// Delete the records of workers that are no longer running, in the
/// background. Failures and timeouts are logged and never reach the cycle.
pub fn spawn_stale_cleanup(
    store: Arc<dyn LoadStore>,
    running: Vec<WorkerIdentity>,
    timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let cleanup = async {
            let keys = match store.list_record_keys().await {
                Ok(keys) => keys,
                Err(e) => {
                    error!(error = %e, "listing load records for cleanup failed");
                    return;
                }
            };

            let stale = stale_keys(&keys, &running);
            debug!(?stale, "stale load records");
            if stale.is_empty() {
                return;
            }

            match store.delete_load_records(&stale).await {
                Ok(deleted) => info!(deleted, "old load records were deleted"),
                Err(e) => {
                    error!(error = %e, count = stale.len(), "deleting old load records failed")
                }
            }
        };

        if tokio::time::timeout(timeout, cleanup).await.is_err() {
            error!(?timeout, "stale load record cleanup timed out");
        }
    })
}
