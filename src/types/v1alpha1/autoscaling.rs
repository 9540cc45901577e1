// Copyright 2025 RustFS Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::tags::Tags;

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstancesDistribution {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_demand_allocation_strategy: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spot_allocation_strategy: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_demand_base_capacity: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_demand_percentage_above_base_capacity: Option<i64>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Overrides {
    pub instance_type: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MixedInstancesPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instances_distribution: Option<InstancesDistribution>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<Overrides>,
}

/// State of an autoscaling group or one of its instances.
///
/// Values outside the known set are kept verbatim in `Unknown`.
#[derive(Clone, Debug, PartialEq, Eq, EnumString, Display, AsRefStr)]
pub enum AsgState {
    #[strum(serialize = "pending")]
    Pending,

    #[strum(serialize = "running")]
    Running,

    #[strum(serialize = "shutting-down")]
    ShuttingDown,

    #[strum(serialize = "terminated")]
    Terminated,

    #[strum(serialize = "stopping")]
    Stopping,

    #[strum(serialize = "stopped")]
    Stopped,

    #[strum(default, transparent)]
    Unknown(String),
}

impl AsgState {
    pub fn is_running(&self) -> bool {
        matches!(self, AsgState::Pending | AsgState::Running)
    }

    pub fn is_operational(&self) -> bool {
        self.is_running() || matches!(self, AsgState::Stopping | AsgState::Stopped)
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, AsgState::Unknown(_))
    }

    /// Maps an instance lifecycle state reported by the Auto Scaling API.
    pub fn from_lifecycle(lifecycle: &str) -> Self {
        match lifecycle {
            "Pending" | "Pending:Wait" | "Pending:Proceed" | "Quarantined" => AsgState::Pending,
            "InService" => AsgState::Running,
            "Terminating" | "Terminating:Wait" | "Terminating:Proceed" | "Detaching" => {
                AsgState::ShuttingDown
            }
            "Terminated" | "Detached" => AsgState::Terminated,
            "EnteringStandby" => AsgState::Stopping,
            "Standby" => AsgState::Stopped,
            other => AsgState::Unknown(other.to_string()),
        }
    }

    /// Derives the group state from its deletion status and the states of
    /// its instances.
    pub fn for_group(status: Option<&AsgStatus>, desired: i32, instances: &[AsgState]) -> Self {
        if matches!(status, Some(AsgStatus::DeleteInProgress)) {
            return AsgState::ShuttingDown;
        }
        if let Some(unknown) = instances.iter().find(|s| !s.is_known()) {
            return unknown.clone();
        }

        // instances on their way out do not count
        let live: Vec<&AsgState> = instances
            .iter()
            .filter(|s| !matches!(s, AsgState::ShuttingDown | AsgState::Terminated))
            .collect();

        if live.is_empty() {
            return if desired > 0 {
                AsgState::Pending
            } else {
                AsgState::Running
            };
        }
        if live.iter().any(|s| **s == AsgState::Pending) {
            AsgState::Pending
        } else if live.iter().any(|s| **s == AsgState::Stopping) {
            AsgState::Stopping
        } else if live.iter().all(|s| **s == AsgState::Stopped) {
            AsgState::Stopped
        } else {
            AsgState::Running
        }
    }
}

/// Group-level status string; only deletion is meaningful to the controller.
#[derive(Clone, Debug, PartialEq, Eq, EnumString, Display)]
pub enum AsgStatus {
    #[strum(serialize = "Delete in progress")]
    DeleteInProgress,

    #[strum(default, transparent)]
    Other(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct AsgInstance {
    pub id: String,
    pub availability_zone: String,
    pub state: AsgState,
}

/// Observed autoscaling group.
#[derive(Clone, Debug, PartialEq)]
pub struct AutoScalingGroup {
    pub arn: String,
    pub name: String,
    pub tags: Tags,
    pub desired_capacity: Option<i32>,
    pub min_size: i32,
    pub max_size: i32,
    pub subnets: Vec<String>,
    pub mixed_instances_policy: Option<MixedInstancesPolicy>,
    pub state: AsgState,
    pub status: Option<AsgStatus>,
    pub instances: Vec<AsgInstance>,
}
