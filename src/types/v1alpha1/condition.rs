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

use chrono::{SecondsFormat, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::Display;

pub const READY_CONDITION: &str = "Ready";
pub const ASG_READY_CONDITION: &str = "ASGReady";
pub const LAUNCH_TEMPLATE_READY_CONDITION: &str = "LaunchTemplateReady";
pub const EKS_CONTROL_PLANE_READY_CONDITION: &str = "EKSControlPlaneReady";
pub const SECURITY_GROUPS_READY_CONDITION: &str = "SecurityGroupsReady";

pub const WAITING_FOR_CLUSTER_INFRASTRUCTURE_REASON: &str = "WaitingForClusterInfrastructure";
pub const WAITING_FOR_BOOTSTRAP_DATA_REASON: &str = "WaitingForBootstrapData";
pub const UNHANDLED_STATE_REASON: &str = "UnhandledState";
pub const ASG_PROVISION_FAILED_REASON: &str = "ASGProvisionFailed";
pub const ASG_NOT_RUNNING_REASON: &str = "ASGNotRunning";
pub const ASG_DELETION_IN_PROGRESS_REASON: &str = "ASGDeletionInProgress";
pub const LAUNCH_TEMPLATE_RECONCILE_FAILED_REASON: &str = "LaunchTemplateReconcileFailed";
pub const EKS_RECONCILIATION_FAILED_REASON: &str = "EKSReconciliationFailed";
pub const EKS_CONTROL_PLANE_PROVISIONING_REASON: &str = "EKSControlPlaneProvisioning";
pub const SECURITY_GROUPS_RECONCILIATION_FAILED_REASON: &str = "SecurityGroupsReconciliationFailed";
pub const DELETING_REASON: &str = "Deleting";

#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, Display, PartialEq, Eq)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, Display, PartialEq, Eq)]
pub enum ConditionSeverity {
    Error,
    Warning,
    Info,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,

    pub status: ConditionStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<ConditionSeverity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

impl Condition {
    pub fn new(type_: &str, status: ConditionStatus) -> Self {
        Self {
            type_: type_.to_string(),
            status,
            severity: None,
            reason: None,
            message: None,
            last_transition_time: None,
        }
    }

    fn same_state(&self, other: &Condition) -> bool {
        self.status == other.status
            && self.severity == other.severity
            && self.reason == other.reason
            && self.message == other.message
    }
}

/// Objects whose status carries a condition list.
pub trait Conditioned {
    fn conditions(&self) -> &[Condition];

    fn conditions_mut(&mut self) -> &mut Vec<Condition>;
}

pub fn get<'a, T: Conditioned + ?Sized>(obj: &'a T, type_: &str) -> Option<&'a Condition> {
    obj.conditions().iter().find(|c| c.type_ == type_)
}

pub fn is_true<T: Conditioned + ?Sized>(obj: &T, type_: &str) -> bool {
    get(obj, type_).is_some_and(|c| c.status == ConditionStatus::True)
}

/// Sets a condition, replacing any existing condition of the same type.
///
/// The transition time only moves when the status changes. Conditions are
/// kept sorted with `Ready` first and the rest by type, so that repeated
/// reconciles produce byte-identical status.
pub fn set<T: Conditioned + ?Sized>(obj: &mut T, mut condition: Condition) {
    let conditions = obj.conditions_mut();

    match conditions.iter_mut().find(|c| c.type_ == condition.type_) {
        Some(existing) => {
            if existing.same_state(&condition) {
                return;
            }
            condition.last_transition_time = if existing.status == condition.status {
                existing.last_transition_time.clone()
            } else {
                Some(now())
            };
            *existing = condition;
        }
        None => {
            condition.last_transition_time = Some(now());
            conditions.push(condition);
        }
    }

    conditions.sort_by(|a, b| {
        (a.type_ != READY_CONDITION, &a.type_).cmp(&(b.type_ != READY_CONDITION, &b.type_))
    });
}

pub fn mark_true<T: Conditioned + ?Sized>(obj: &mut T, type_: &str) {
    set(obj, Condition::new(type_, ConditionStatus::True));
}

pub fn mark_false<T: Conditioned + ?Sized>(
    obj: &mut T,
    type_: &str,
    reason: &str,
    severity: ConditionSeverity,
    message: impl Into<String>,
) {
    let message = message.into();
    set(
        obj,
        Condition {
            severity: Some(severity),
            reason: Some(reason.to_string()),
            message: (!message.is_empty()).then_some(message),
            ..Condition::new(type_, ConditionStatus::False)
        },
    );
}

pub fn mark_unknown<T: Conditioned + ?Sized>(
    obj: &mut T,
    type_: &str,
    reason: &str,
    message: impl Into<String>,
) {
    let message = message.into();
    set(
        obj,
        Condition {
            reason: Some(reason.to_string()),
            message: (!message.is_empty()).then_some(message),
            ..Condition::new(type_, ConditionStatus::Unknown)
        },
    );
}

/// Recomputes the `Ready` condition from the tracked conditions.
///
/// Tracked conditions that are not present are ignored. When none of them
/// are present the summary is left untouched.
pub fn set_summary<T: Conditioned + ?Sized>(obj: &mut T, tracked: &[&str]) {
    let observed: Vec<Condition> = tracked
        .iter()
        .filter_map(|t| get(obj, t))
        .cloned()
        .collect();
    if observed.is_empty() {
        return;
    }

    let worst = observed
        .iter()
        .find(|c| c.status == ConditionStatus::False)
        .or_else(|| {
            observed
                .iter()
                .find(|c| c.status == ConditionStatus::Unknown)
        });

    let summary = match worst {
        Some(c) => Condition {
            severity: c.severity,
            reason: c.reason.clone(),
            message: c.message.clone(),
            ..Condition::new(READY_CONDITION, c.status)
        },
        None => Condition::new(READY_CONDITION, ConditionStatus::True),
    };
    set(obj, summary);
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
