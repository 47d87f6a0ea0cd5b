use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::domain::{ControlAction, InstanceState, InstanceStatus};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

pub mod freshness;
pub mod protocol_client;
pub use freshness::FreshnessTracker;
pub use protocol_client::HttpControlPlane;

/// Reconciliation delays per command: the optimistic transition is trusted
/// for this long before a confirming status read is issued. Stopping is
/// modeled as slower than starting; a service launch does not change
/// instance lifecycle state and only needs a short confirmation window.
const START_INSTANCE_RECONCILE_DELAY: Duration = Duration::from_secs(7);
const STOP_INSTANCE_RECONCILE_DELAY: Duration = Duration::from_secs(10);
const START_SERVICE_RECONCILE_DELAY: Duration = Duration::from_secs(5);

/// Cloud-control collaborator the coordinator issues queries and commands
/// through. Implemented over HTTP by [`HttpControlPlane`].
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn instance_status(&self) -> Result<InstanceStatus>;
    async fn start_instance(&self) -> Result<()>;
    async fn stop_instance(&self) -> Result<()>;
    async fn start_service(&self) -> Result<()>;
}

pub struct MissingControlPlane;

#[async_trait]
impl ControlPlane for MissingControlPlane {
    async fn instance_status(&self) -> Result<InstanceStatus> {
        Err(anyhow!("cloud control plane is unavailable"))
    }

    async fn start_instance(&self) -> Result<()> {
        Err(anyhow!("cloud control plane is unavailable"))
    }

    async fn stop_instance(&self) -> Result<()> {
        Err(anyhow!("cloud control plane is unavailable"))
    }

    async fn start_service(&self) -> Result<()> {
        Err(anyhow!("cloud control plane is unavailable"))
    }
}

/// Callback invoked after every confirmed status fetch. The freshness
/// tracker implements this; the coordinator never reads its state back.
#[async_trait]
pub trait StatusListener: Send + Sync {
    async fn on_status_updated(&self);
}

pub struct NoopStatusListener;

#[async_trait]
impl StatusListener for NoopStatusListener {
    async fn on_status_updated(&self) {}
}

/// Events pushed to the UI layer. `Error` carries a user-presentable
/// message (the toast channel); `StatusUpdated` carries each confirmed read.
#[derive(Debug, Clone)]
pub enum ControlEvent {
    StatusUpdated(InstanceStatus),
    Error(String),
}

/// Read-only view handed to the UI: raw state plus the derived gates, all
/// recomputed at snapshot time so they can never go stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlSnapshot {
    pub loading: bool,
    pub status: InstanceStatus,
    pub pending_action: Option<ControlAction>,
    pub is_instance_running: bool,
    pub is_any_action_in_progress: bool,
    pub instance_active: bool,
    pub service_active: bool,
    pub shutdown_active: bool,
}

struct CoordinatorState {
    status: InstanceStatus,
    pending_action: Option<ControlAction>,
    loading: bool,
    reconcile_epoch: u64,
}

impl CoordinatorState {
    fn is_instance_running(&self) -> bool {
        self.status.state == InstanceState::Running
    }

    fn is_any_action_in_progress(&self) -> bool {
        self.pending_action.is_some()
    }

    fn instance_active(&self) -> bool {
        self.status.state == InstanceState::Stopped && !self.is_any_action_in_progress()
    }

    fn service_active(&self) -> bool {
        self.is_instance_running() && !self.is_any_action_in_progress()
    }

    fn shutdown_active(&self) -> bool {
        self.is_instance_running() && !self.is_any_action_in_progress()
    }
}

/// Owns instance status, the in-flight action token, and the reconciliation
/// timer for a single target instance. Commands apply an optimistic state
/// transition immediately and schedule a delayed status read to reconcile
/// with ground truth; the collaborator call itself settles on a background
/// task so each command returns as soon as its synchronous portion is done.
pub struct ControlCoordinator {
    control_plane: Arc<dyn ControlPlane>,
    status_listener: Arc<dyn StatusListener>,
    inner: Mutex<CoordinatorState>,
    events: broadcast::Sender<ControlEvent>,
}

impl ControlCoordinator {
    pub fn new(control_plane: Arc<dyn ControlPlane>) -> Arc<Self> {
        Self::new_with_status_listener(control_plane, Arc::new(NoopStatusListener))
    }

    pub fn new_with_status_listener(
        control_plane: Arc<dyn ControlPlane>,
        status_listener: Arc<dyn StatusListener>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            control_plane,
            status_listener,
            inner: Mutex::new(CoordinatorState {
                status: InstanceStatus::default(),
                pending_action: None,
                loading: false,
                reconcile_epoch: 0,
            }),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControlEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> ControlSnapshot {
        let guard = self.inner.lock().await;
        ControlSnapshot {
            loading: guard.loading,
            status: guard.status.clone(),
            pending_action: guard.pending_action,
            is_instance_running: guard.is_instance_running(),
            is_any_action_in_progress: guard.is_any_action_in_progress(),
            instance_active: guard.instance_active(),
            service_active: guard.service_active(),
            shutdown_active: guard.shutdown_active(),
        }
    }

    /// Queries the control plane and replaces the held status wholesale on
    /// success. A failed query leaves the last known status in place and
    /// emits exactly one error notification. `loading` is cleared on every
    /// path. Re-entrant safe: overlapping calls resolve last-write-wins.
    pub async fn fetch_status(self: &Arc<Self>) {
        {
            let mut guard = self.inner.lock().await;
            guard.loading = true;
        }

        let result = self.control_plane.instance_status().await;

        let mut guard = self.inner.lock().await;
        guard.loading = false;
        match result {
            Ok(status) => {
                guard.status = status.clone();
                drop(guard);
                let _ = self.events.send(ControlEvent::StatusUpdated(status));
                self.status_listener.on_status_updated().await;
            }
            Err(err) => {
                drop(guard);
                warn!(error = %err, "instance status query failed, keeping last known status");
                let _ = self.events.send(ControlEvent::Error(format!(
                    "Failed to get instance status: {err}"
                )));
            }
        }
    }

    /// Caller-gated on `instance_active`. Optimistically moves the instance
    /// to `Pending` and reconciles after 7 seconds.
    pub async fn start_instance(self: &Arc<Self>) {
        self.run_action(
            ControlAction::StartInstance,
            Some(InstanceState::Pending),
            START_INSTANCE_RECONCILE_DELAY,
        )
        .await;
    }

    /// Caller-gated on `shutdown_active`. Optimistically moves the instance
    /// to `Stopping` and reconciles after 10 seconds.
    pub async fn stop_instance(self: &Arc<Self>) {
        self.run_action(
            ControlAction::StopInstance,
            Some(InstanceState::Stopping),
            STOP_INSTANCE_RECONCILE_DELAY,
        )
        .await;
    }

    /// Caller-gated on `service_active`. Launching the service does not
    /// change instance lifecycle state, so there is no optimistic
    /// transition; reconciles after 5 seconds.
    pub async fn start_service(self: &Arc<Self>) {
        self.run_action(ControlAction::StartService, None, START_SERVICE_RECONCILE_DELAY)
            .await;
    }

    async fn run_action(
        self: &Arc<Self>,
        action: ControlAction,
        optimistic: Option<InstanceState>,
        reconcile_after: Duration,
    ) {
        {
            // Token set, optimistic transition, and timer scheduling happen
            // in one critical section so their ordering is fixed.
            let mut guard = self.inner.lock().await;
            guard.pending_action = Some(action);
            if let Some(state) = optimistic {
                guard.status.state = state;
            }

            // Superseding works through an epoch, not by aborting the
            // timer task: a stale timer stands down after its dwell, while
            // a reconcile fetch already in flight always runs to completion
            // so the loading finalizer and status callbacks are never lost.
            guard.reconcile_epoch += 1;
            let epoch = guard.reconcile_epoch;

            let coordinator = Arc::clone(self);
            tokio::spawn(async move {
                tokio::time::sleep(reconcile_after).await;
                {
                    let guard = coordinator.inner.lock().await;
                    if guard.reconcile_epoch != epoch {
                        return;
                    }
                }
                coordinator.fetch_status().await;
            });
            debug!(
                action = action.as_str(),
                reconcile_after_secs = reconcile_after.as_secs(),
                "scheduled reconciliation fetch"
            );
        }

        info!(action = action.as_str(), "issuing control command");
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            // No rollback on command failure: the reconciliation fetch is
            // the authority on where the instance actually ended up.
            if let Err(err) = coordinator.dispatch_command(action).await {
                warn!(action = action.as_str(), error = %err, "control command failed");
                let _ = coordinator.events.send(ControlEvent::Error(format!(
                    "Failed to {}: {err}",
                    action.describe()
                )));
            }
            let mut guard = coordinator.inner.lock().await;
            guard.pending_action = None;
        });
    }

    async fn dispatch_command(&self, action: ControlAction) -> Result<()> {
        match action {
            ControlAction::StartInstance => self.control_plane.start_instance().await,
            ControlAction::StopInstance => self.control_plane.stop_instance().await,
            ControlAction::StartService => self.control_plane.start_service().await,
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
