//! phil-core — shared types, configuration, and adapter traits for Phil.
//!
//! Phil right-sizes a managed instance group of worker VMs ("will" nodes)
//! from the load each worker reports into a shared store. This crate holds
//! everything the other crates agree on: the domain types, the TOML
//! configuration model, and the two adapter seams the autoscaling core
//! consumes ([`GroupManager`] and [`LoadStore`]).

pub mod adapters;
pub mod config;
pub mod types;

pub use adapters::{BoxError, GroupManager, LoadStore};
pub use config::{ConfigError, PhilConfig};
pub use types::*;
