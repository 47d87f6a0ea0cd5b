use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state reported by the cloud control plane for the target
/// instance. The wire enumeration is open-ended; anything we do not
/// recognize collapses to `Unknown` instead of failing deserialization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    Pending,
    Running,
    Stopping,
    Stopped,
    #[default]
    #[serde(other)]
    Unknown,
}

impl InstanceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceState::Unknown => "unknown",
            InstanceState::Pending => "pending",
            InstanceState::Running => "running",
            InstanceState::Stopping => "stopping",
            InstanceState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last known status of the target instance. `ip_address` is present only
/// when the instance has a reachable endpoint, typically while `Running`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceStatus {
    pub ip_address: Option<String>,
    pub state: InstanceState,
}

/// Control command identifier; at most one is in flight at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlAction {
    StartInstance,
    StopInstance,
    StartService,
}

impl ControlAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlAction::StartInstance => "start-instance",
            ControlAction::StopInstance => "stop-instance",
            ControlAction::StartService => "start-service",
        }
    }

    /// Human form used in notifications, e.g. "Failed to start instance".
    pub fn describe(&self) -> &'static str {
        match self {
            ControlAction::StartInstance => "start instance",
            ControlAction::StopInstance => "stop instance",
            ControlAction::StartService => "start service",
        }
    }
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
