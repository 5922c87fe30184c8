//! Adapter seams consumed by the autoscaling core.
//!
//! Both traits are object-safe so the cycle driver can hold them as
//! `Arc<dyn …>` and hand the load store to a detached cleanup task.

use async_trait::async_trait;

use crate::types::{InstanceGroupRef, LoadRecord, WorkerIdentity};

/// Error type returned across adapter boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The cloud provider's managed instance group API.
#[async_trait]
pub trait GroupManager: Send + Sync {
    /// Names of the group's VMs whose status is RUNNING.
    async fn list_running_workers(
        &self,
        group: &InstanceGroupRef,
    ) -> Result<Vec<WorkerIdentity>, BoxError>;

    /// Request a new target size. Returns once the request is accepted.
    async fn resize_group(&self, group: &InstanceGroupRef, new_size: u32) -> Result<(), BoxError>;
}

/// Shared store the workers write their load records into.
#[async_trait]
pub trait LoadStore: Send + Sync {
    /// Records for the given identities. Identities without a record are
    /// absent from the result.
    async fn fetch_load_records(
        &self,
        identities: &[WorkerIdentity],
    ) -> Result<Vec<LoadRecord>, BoxError>;

    /// Keys of every record currently held, stale ones included.
    async fn list_record_keys(&self) -> Result<Vec<WorkerIdentity>, BoxError>;

    /// Remove records by key. Returns how many existed.
    async fn delete_load_records(&self, keys: &[WorkerIdentity]) -> Result<usize, BoxError>;
}
