//! phil-store — the shared load-record store.
//!
//! Backed by [redb](https://docs.rs/redb). Workers report a [`LoadRecord`]
//! keyed by their VM name; the autoscaler reads them back and prunes the
//! records of VMs that are no longer running.
//!
//! # Architecture
//!
//! ```text
//! Datastore (connection state, idempotent connect)
//!   └── StateStore (Arc<Database>, typed CRUD over `vm_loads`)
//! ```
//!
//! [`StateStore`] is `Clone` + `Send` + `Sync` and can be shared across
//! async tasks. [`Datastore`] implements [`phil_core::LoadStore`].
//!
//! [`LoadRecord`]: phil_core::LoadRecord

pub mod datastore;
pub mod error;
pub mod store;
pub mod tables;

pub use datastore::{ConnectionStatus, Datastore};
pub use error::{StateError, StateResult};
pub use store::StateStore;
