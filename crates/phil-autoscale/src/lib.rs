//! phil-autoscale — load-driven sizing of a managed instance group.
//!
//! Each cycle discovers the group's RUNNING workers, drops the paused ones
//! from load accounting, averages the load the active workers reported,
//! and asks the group manager for a new target size.
//!
//! # Sizing Algorithm
//!
//! ```text
//! relative  = (sum(load) / records) / MAX_BATCH_OPERATIONS
//! balanced  = (previous_relative + relative) / 2
//!
//! delta     = +1 if balanced > upper_bound_usage
//!             -1 if balanced < lower_bound_usage
//!              0 otherwise
//!
//! raw       = active + delta + paused
//! new_size  = minimum  if raw <= minimum
//!             maximum  if raw >= maximum
//!             raw      otherwise
//!
//! previous_relative = relative      // the unsmoothed sample
//! ```
//!
//! Paused workers are added back because they still occupy a slot in the
//! group. The first cycle after start has no previous sample; it records
//! one and may grow the group, but never shrinks it on that first figure.
//!
//! # Cycle
//!
//! ```text
//! Discovering → ResolvingActive → AggregatingLoad → DecidingSize → Resizing
//!      └──────────── any failure ────────────┐               │
//!                                            ▼               ▼
//!                                  log, sleep(interval), next cycle
//! ```
//!
//! Success and failure reschedule identically: no backoff, no failure cap.
//! Exactly one cycle is in flight, so the smoothing state is a plain value
//! owned by the [`CycleDriver`].

pub mod aggregator;
pub mod decision;
pub mod driver;
pub mod error;
pub mod resolver;

pub use aggregator::{aggregate, LoadSummary};
pub use decision::{decide, SizeDecision, SmoothingState};
pub use driver::{CycleDriver, CycleOutcome, CycleReport, CycleStatus};
pub use error::{AutoscaleError, AutoscaleResult, CycleStage};
pub use resolver::{partition_active, resolve_active_set, ActiveSet};
