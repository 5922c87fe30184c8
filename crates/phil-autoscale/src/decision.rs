//! Size decision — a pure function from observed load to a target size.

use serde::Serialize;
use tracing::debug;

use phil_core::GroupSizeBounds;

use crate::error::{AutoscaleError, AutoscaleResult};

/// The previous cycle's relative load.
///
/// Owned by the cycle driver and threaded through [`decide`]; never shared.
/// "No sample yet" is kept apart from a real 0.0 sample so that start-up
/// cannot shrink the group on the zero it was initialised with. Growing
/// on the first cycle is still allowed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SmoothingState {
    previous_relative: Option<f64>,
}

impl SmoothingState {
    /// Fresh state, before the first sample.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_previous(previous_relative: f64) -> Self {
        Self {
            previous_relative: Some(previous_relative),
        }
    }

    /// Previous sample, 0 before the first one.
    pub fn previous_relative(&self) -> f64 {
        self.previous_relative.unwrap_or(0.0)
    }

    pub fn is_primed(&self) -> bool {
        self.previous_relative.is_some()
    }
}

/// Outcome of one sizing decision, with the intermediate figures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SizeDecision {
    pub balanced: f64,
    pub delta: i64,
    pub raw_new_size: i64,
    pub new_size: u32,
    /// State to keep for the next cycle.
    pub smoothing: SmoothingState,
}

/// Compute the new target size of the group.
///
/// `active_count` excludes paused workers; `number_paused` is added back
/// because paused workers still hold a slot in the group.
pub fn decide(
    active_count: usize,
    number_paused: usize,
    average_load_relative: f64,
    previous: SmoothingState,
    bounds: &GroupSizeBounds,
) -> AutoscaleResult<SizeDecision> {
    if active_count == 0 {
        return Err(AutoscaleError::NoActiveWorkers {
            running: number_paused,
            paused: number_paused,
        });
    }
    if !average_load_relative.is_finite() || average_load_relative < 0.0 {
        return Err(AutoscaleError::InvalidInput(format!(
            "relative load {average_load_relative} is not a non-negative number"
        )));
    }

    let balanced = (previous.previous_relative() + average_load_relative) / 2.0;

    // Without a real previous sample the halved figure may only grow the group.
    let delta = if balanced > bounds.upper_bound_usage {
        1
    } else if previous.is_primed() && balanced < bounds.lower_bound_usage {
        -1
    } else {
        0
    };

    let raw_new_size = active_count as i64 + delta + number_paused as i64;
    let new_size = clamp_to_bounds(raw_new_size, bounds.minimum, bounds.maximum);

    debug!(
        active = active_count,
        paused = number_paused,
        previous = previous.previous_relative(),
        warm_up = !previous.is_primed(),
        balanced,
        delta,
        raw_new_size,
        new_size,
        "size decision"
    );

    Ok(SizeDecision {
        balanced,
        delta,
        raw_new_size,
        new_size,
        smoothing: SmoothingState::with_previous(average_load_relative),
    })
}

/// Clamp with inclusive boundaries: a value equal to a bound resolves to
/// that bound, and the minimum is checked first.
pub fn clamp_to_bounds(raw: i64, minimum: u32, maximum: u32) -> u32 {
    if raw <= i64::from(minimum) {
        minimum
    } else if raw >= i64::from(maximum) {
        maximum
    } else {
        // Strictly between two u32 values.
        raw as u32
    }
}
