//! Active-set resolution: which running workers count toward load.

use std::collections::HashSet;

use tracing::debug;

use phil_core::{BoxError, LoadRecord, LoadStore, WorkerIdentity};

/// Running workers split by pause state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSet {
    /// Running workers that are not paused, in discovery order.
    pub active: Vec<WorkerIdentity>,
    /// `running - active`.
    pub number_paused: usize,
}

/// Split `running` into active and paused workers.
///
/// A worker is paused only if it has a record whose `paused` flag is true.
/// Workers without a record yet are active.
pub fn partition_active(running: &[WorkerIdentity], pause_records: &[LoadRecord]) -> ActiveSet {
    let paused: HashSet<&str> = pause_records
        .iter()
        .filter(|r| r.is_paused())
        .map(|r| r.name.as_str())
        .collect();

    let active: Vec<WorkerIdentity> = running
        .iter()
        .filter(|name| !paused.contains(name.as_str()))
        .cloned()
        .collect();

    ActiveSet {
        number_paused: running.len() - active.len(),
        active,
    }
}

/// Fetch the pause state of exactly the running workers and partition them.
///
/// Store failures propagate unchanged; retrying is the driver's job.
pub async fn resolve_active_set(
    store: &dyn LoadStore,
    running: &[WorkerIdentity],
) -> Result<ActiveSet, BoxError> {
    let records = store.fetch_load_records(running).await?;
    let set = partition_active(running, &records);
    debug!(
        running = running.len(),
        active = set.active.len(),
        paused = set.number_paused,
        "resolved active workers"
    );
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<WorkerIdentity> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn paused(name: &str, flag: Option<bool>) -> LoadRecord {
        let mut record = LoadRecord::new(name, 0.0);
        record.paused = flag;
        record
    }

    #[test]
    fn paused_worker_is_excluded() {
        let set = partition_active(&names(&["a", "b", "c"]), &[paused("b", Some(true))]);
        assert_eq!(set.active, names(&["a", "c"]));
        assert_eq!(set.number_paused, 1);
    }

    #[test]
    fn workers_without_records_are_active() {
        let set = partition_active(&names(&["a", "b"]), &[]);
        assert_eq!(set.active, names(&["a", "b"]));
        assert_eq!(set.number_paused, 0);
    }

    #[test]
    fn false_or_missing_flag_is_active() {
        let records = [paused("a", Some(false)), paused("b", None)];
        let set = partition_active(&names(&["a", "b"]), &records);
        assert_eq!(set.active.len(), 2);
        assert_eq!(set.number_paused, 0);
    }

    #[test]
    fn records_for_unknown_workers_are_ignored() {
        // A paused record for a VM that is no longer running must not
        // reduce the active set.
        let set = partition_active(&names(&["a"]), &[paused("gone", Some(true))]);
        assert_eq!(set.active, names(&["a"]));
        assert_eq!(set.number_paused, 0);
    }

    #[test]
    fn all_paused() {
        let records = [paused("a", Some(true)), paused("b", Some(true))];
        let set = partition_active(&names(&["a", "b"]), &records);
        assert!(set.active.is_empty());
        assert_eq!(set.number_paused, 2);
    }
}
