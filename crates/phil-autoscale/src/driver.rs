//! Cycle driver — runs one autoscale cycle at a time, forever.
//!
//! Each cycle walks `Discovering → ResolvingActive → AggregatingLoad →
//! DecidingSize → Resizing`. Any stage may fail; the driver logs the
//! error and schedules the next cycle after the same fixed interval it
//! uses after a success. The next cycle is only scheduled once the
//! current one has finished, so the smoothing state needs no locking.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use phil_core::{BoxError, GroupManager, GroupSizeBounds, InstanceGroupRef, LoadStore};

use crate::aggregator::{aggregate, spawn_stale_cleanup, LoadSummary};
use crate::decision::{decide, SizeDecision, SmoothingState};
use crate::error::{AutoscaleError, AutoscaleResult, CycleStage};
use crate::resolver::resolve_active_set;

/// Default bound on a single adapter call.
pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Figures from a cycle that reached a resize.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub running: usize,
    pub active: usize,
    pub paused: usize,
    pub load: LoadSummary,
    pub decision: SizeDecision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Resize request accepted.
    Resized,
    /// No usable load signal this cycle.
    Skipped,
    /// An adapter call failed or timed out.
    Failed,
}

/// Published after every cycle for the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleStatus {
    pub cycle: u64,
    /// Unix timestamp (seconds) when the cycle finished.
    pub finished_at: u64,
    pub outcome: CycleOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<CycleReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Relative load the next cycle will smooth against.
    pub previous_relative: f64,
}

pub struct CycleDriver {
    group_manager: Arc<dyn GroupManager>,
    load_store: Arc<dyn LoadStore>,
    group: InstanceGroupRef,
    bounds: GroupSizeBounds,
    stage_timeout: Duration,
    smoothing: SmoothingState,
    cycles: u64,
    ready_tx: watch::Sender<bool>,
    status_tx: watch::Sender<Option<CycleStatus>>,
}

impl CycleDriver {
    pub fn new(
        group_manager: Arc<dyn GroupManager>,
        load_store: Arc<dyn LoadStore>,
        group: InstanceGroupRef,
        bounds: GroupSizeBounds,
    ) -> Self {
        let (ready_tx, _) = watch::channel(false);
        let (status_tx, _) = watch::channel(None);
        Self {
            group_manager,
            load_store,
            group,
            bounds,
            stage_timeout: DEFAULT_STAGE_TIMEOUT,
            smoothing: SmoothingState::new(),
            cycles: 0,
            ready_tx,
            status_tx,
        }
    }

    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// Flips to `true` when the first cycle is scheduled.
    pub fn subscribe_ready(&self) -> watch::Receiver<bool> {
        self.ready_tx.subscribe()
    }

    /// Latest [`CycleStatus`], `None` until a cycle finished.
    pub fn subscribe_status(&self) -> watch::Receiver<Option<CycleStatus>> {
        self.status_tx.subscribe()
    }

    pub fn smoothing(&self) -> SmoothingState {
        self.smoothing
    }

    /// Await one adapter call under the stage timeout.
    async fn stage<T>(
        &self,
        stage: CycleStage,
        call: impl Future<Output = Result<T, BoxError>>,
    ) -> AutoscaleResult<T> {
        match tokio::time::timeout(self.stage_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(AutoscaleError::Adapter { stage, source }),
            Err(_) => Err(AutoscaleError::Timeout {
                stage,
                after: self.stage_timeout,
            }),
        }
    }

    /// Run one cycle against the current smoothing state without
    /// committing anything. `tick` is the committing wrapper.
    pub async fn run_cycle(&self) -> AutoscaleResult<CycleReport> {
        let running = self
            .stage(
                CycleStage::Discovering,
                self.group_manager.list_running_workers(&self.group),
            )
            .await?;
        debug!(running = running.len(), group = %self.group, "discovered running workers");
        spawn_stale_cleanup(
            Arc::clone(&self.load_store),
            running.clone(),
            self.stage_timeout,
        );

        let active_set = self
            .stage(
                CycleStage::ResolvingActive,
                resolve_active_set(self.load_store.as_ref(), &running),
            )
            .await?;
        if active_set.active.is_empty() {
            return Err(AutoscaleError::NoActiveWorkers {
                running: running.len(),
                paused: active_set.number_paused,
            });
        }

        let records = self
            .stage(
                CycleStage::AggregatingLoad,
                self.load_store.fetch_load_records(&active_set.active),
            )
            .await?;
        let load = aggregate(&records)?;

        let decision = decide(
            active_set.active.len(),
            active_set.number_paused,
            load.average_load_relative,
            self.smoothing,
            &self.bounds,
        )?;

        self.stage(
            CycleStage::Resizing,
            self.group_manager
                .resize_group(&self.group, decision.new_size),
        )
        .await?;

        Ok(CycleReport {
            running: running.len(),
            active: active_set.active.len(),
            paused: active_set.number_paused,
            load,
            decision,
        })
    }

    /// Run one cycle, commit the smoothing state if it succeeded, log and
    /// publish the outcome.
    pub async fn tick(&mut self) -> AutoscaleResult<CycleReport> {
        self.cycles += 1;
        let cycle = self.cycles;
        let result = self.run_cycle().await;

        let (outcome, report, error) = match &result {
            Ok(report) => {
                self.smoothing = report.decision.smoothing;
                info!(
                    cycle,
                    active = report.active,
                    paused = report.paused,
                    relative_load = report.load.average_load_relative,
                    balanced = report.decision.balanced,
                    new_size = report.decision.new_size,
                    "autoscale cycle completed"
                );
                (CycleOutcome::Resized, Some(report.clone()), None)
            }
            Err(e) if e.is_soft() => {
                warn!(cycle, error = %e, "autoscale cycle skipped");
                (CycleOutcome::Skipped, None, Some(e.to_string()))
            }
            Err(e) => {
                error!(cycle, error = %e, "autoscale cycle failed");
                (CycleOutcome::Failed, None, Some(e.to_string()))
            }
        };

        self.status_tx.send_replace(Some(CycleStatus {
            cycle,
            finished_at: epoch_secs(),
            outcome,
            report,
            error,
            previous_relative: self.smoothing.previous_relative(),
        }));

        result
    }

    /// Run the autoscaler loop until shutdown.
    ///
    /// The first cycle starts immediately; each following one starts
    /// `bounds.interval` after the previous one finished.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            group = %self.group,
            minimum = self.bounds.minimum,
            maximum = self.bounds.maximum,
            interval_secs = self.bounds.interval.as_secs(),
            "autoscaler started"
        );
        self.ready_tx.send_replace(true);

        loop {
            tokio::select! {
                _ = self.tick() => {}
                _ = shutdown.changed() => {
                    info!("autoscaler shutting down");
                    break;
                }
            }

            debug!(
                delay_secs = self.bounds.interval.as_secs(),
                "next autoscale cycle scheduled"
            );
            tokio::select! {
                _ = tokio::time::sleep(self.bounds.interval) => {}
                _ = shutdown.changed() => {
                    info!("autoscaler shutting down");
                    break;
                }
            }
        }
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
