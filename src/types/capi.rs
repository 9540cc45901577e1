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

//! Read-only views of the Cluster API objects the controllers consume.
//! Only the fields that are actually read are modelled.

#![allow(clippy::upper_case_acronyms)]

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1 as corev1;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

use crate::types::v1alpha1::network::{NetworkSpec, SecurityGroup};
use crate::types::v1alpha1::tags::Tags;

/// Label linking an object to its owning Cluster.
pub const CLUSTER_NAME_LABEL: &str = "cluster.x-k8s.io/cluster-name";

pub const SECURITY_GROUP_NODE_ROLE: &str = "node";
pub const SECURITY_GROUP_LB_ROLE: &str = "lb";

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default)]
#[kube(
    group = "cluster.x-k8s.io",
    version = "v1alpha3",
    kind = "Cluster",
    namespaced,
    status = "ClusterStatus",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    #[serde(default)]
    pub paused: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infrastructure_ref: Option<corev1::ObjectReference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane_ref: Option<corev1::ObjectReference>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    #[serde(default)]
    pub infrastructure_ready: bool,

    #[serde(default)]
    pub control_plane_ready: bool,
}

impl Cluster {
    pub fn infrastructure_ready(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.infrastructure_ready)
    }
}

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default)]
#[kube(
    group = "exp.cluster.x-k8s.io",
    version = "v1alpha3",
    kind = "MachinePool",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct MachinePoolSpec {
    pub cluster_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    #[serde(default)]
    pub template: MachineTemplateSpec,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct MachineTemplateSpec {
    #[serde(default)]
    pub spec: MachineSpec,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct MachineSpec {
    #[serde(default)]
    pub bootstrap: Bootstrap,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct Bootstrap {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_secret_name: Option<String>,
}

impl MachinePool {
    pub fn bootstrap_secret_name(&self) -> Option<&str> {
        self.spec.template.spec.bootstrap.data_secret_name.as_deref()
    }
}

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1alpha3",
    kind = "AWSCluster",
    namespaced,
    status = "AWSClusterStatus",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct AWSClusterSpec {
    pub region: String,

    #[serde(default)]
    pub network_spec: NetworkSpec,

    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub additional_tags: Tags,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct AWSClusterStatus {
    #[serde(default)]
    pub ready: bool,

    #[serde(default)]
    pub network: NetworkStatus,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatus {
    /// Keyed by role: `node`, `lb`, `controlplane`, `bastion`, `apiserver-lb`.
    #[serde(default)]
    pub security_groups: BTreeMap<String, SecurityGroup>,
}

impl AWSCluster {
    /// Security groups every worker node joins.
    pub fn core_node_security_groups(&self) -> Vec<String> {
        let Some(status) = &self.status else {
            return Vec::new();
        };
        [SECURITY_GROUP_NODE_ROLE, SECURITY_GROUP_LB_ROLE]
            .iter()
            .filter_map(|role| status.network.security_groups.get(*role))
            .map(|sg| sg.id.clone())
            .collect()
    }
}
