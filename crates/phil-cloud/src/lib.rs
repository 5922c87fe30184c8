//! phil-cloud — client for the provider's managed instance group API.
//!
//! Two calls are needed by the autoscaler: list the group's managed
//! instances (to find the RUNNING workers) and request a new target size.
//! One [`ComputeClient`] is built per process and reused across cycles;
//! the underlying HTTP client pools its connections.

pub mod client;
pub mod error;

pub use client::{ComputeClient, ManagedInstance};
pub use error::{CloudError, CloudResult};
