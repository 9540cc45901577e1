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

#![allow(clippy::upper_case_acronyms)]

use kube::{CustomResource, KubeSchema, ResourceExt};
use serde::{Deserialize, Serialize};
use snafu::OptionExt;

use crate::types;
use crate::types::error::NoNamespaceSnafu;
use crate::types::v1alpha1::autoscaling::MixedInstancesPolicy;
use crate::types::v1alpha1::condition::{Condition, Conditioned};
use crate::types::v1alpha1::launch_template::AWSLaunchTemplate;
use crate::types::v1alpha1::network::AWSResourceReference;
use crate::types::v1alpha1::tags::Tags;

pub const MACHINE_POOL_FINALIZER: &str = "awsmachinepool.infrastructure.cluster.x-k8s.io";

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, KubeSchema, Default)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1alpha3",
    kind = "AWSMachinePool",
    namespaced,
    status = "AWSMachinePoolStatus",
    shortname = "awsmp",
    plural = "awsmachinepools",
    singular = "awsmachinepool",
    category = "cluster-api",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.ready"}"#,
    printcolumn = r#"{"name":"Replicas", "type":"integer", "jsonPath":".status.replicas"}"#,
    printcolumn = r#"{"name":"MinSize", "type":"integer", "jsonPath":".spec.minSize"}"#,
    printcolumn = r#"{"name":"MaxSize", "type":"integer", "jsonPath":".spec.maxSize"}"#,
    printcolumn = r#"{"name":"LaunchTemplate ID", "type":"string", "jsonPath":".status.launchTemplateID"}"#,
    crates(serde_json = "k8s_openapi::serde_json")
)]
#[serde(rename_all = "camelCase")]
pub struct AWSMachinePoolSpec {
    /// `aws:///<region>/<group-name>`, written back once the group exists.
    #[serde(default, rename = "providerID", skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,

    #[x_kube(validation = Rule::new("self >= 0").message("minSize must not be negative"))]
    pub min_size: i32,

    #[x_kube(validation = Rule::new("self >= 1").message("maxSize must be at least 1"))]
    pub max_size: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_capacity: Option<i32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub availability_zones: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subnets: Vec<AWSResourceReference>,

    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub additional_tags: Tags,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_security_groups: Vec<AWSResourceReference>,

    pub aws_launch_template: AWSLaunchTemplate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mixed_instances_policy: Option<MixedInstancesPolicy>,

    #[serde(default, rename = "providerIDList", skip_serializing_if = "Vec::is_empty")]
    pub provider_id_list: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, KubeSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AWSMachinePoolStatus {
    #[serde(default)]
    pub ready: bool,

    #[serde(default)]
    pub replicas: i32,

    #[serde(default, rename = "autoScalingGroupARN", skip_serializing_if = "Option::is_none")]
    pub asg_arn: Option<String>,

    #[serde(default, rename = "launchTemplateID", skip_serializing_if = "Option::is_none")]
    pub launch_template_id: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl AWSMachinePool {
    pub fn namespace(&self) -> Result<String, types::error::Error> {
        ResourceExt::namespace(self).context(NoNamespaceSnafu)
    }

    pub fn name(&self) -> String {
        ResourceExt::name_any(self)
    }

    pub fn status_mut(&mut self) -> &mut AWSMachinePoolStatus {
        self.status.get_or_insert_with(Default::default)
    }

    /// A failure recorded against the generation currently being reconciled.
    pub fn has_current_failure(&self) -> bool {
        self.status.as_ref().is_some_and(|s| {
            s.failure_reason.is_some() && s.observed_generation == self.metadata.generation
        })
    }
}

impl Conditioned for AWSMachinePool {
    fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or_default()
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self.status_mut().conditions
    }
}
