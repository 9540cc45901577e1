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

use std::collections::BTreeMap;

use kube::{CustomResource, KubeSchema, ResourceExt};
use serde::{Deserialize, Serialize};
use snafu::OptionExt;

use crate::types;
use crate::types::error::NoNamespaceSnafu;
use crate::types::v1alpha1::condition::{Condition, Conditioned};
use crate::types::v1alpha1::network::{
    ApiEndpoint, EncryptionConfig, EndpointAccess, NetworkSpec, SecurityGroup,
};
use crate::types::v1alpha1::tags::Tags;

pub const CONTROL_PLANE_FINALIZER: &str = "awsmanagedcontrolplane.controlplane.cluster.x-k8s.io";

/// IAM role assumed by EKS when `roleName` is not set.
pub const DEFAULT_EKS_CONTROL_PLANE_ROLE: &str = "eks-controlplane.cluster-api-provider-aws.sigs.k8s.io";

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, KubeSchema, Default)]
#[kube(
    group = "controlplane.cluster.x-k8s.io",
    version = "v1alpha3",
    kind = "AWSManagedControlPlane",
    namespaced,
    status = "AWSManagedControlPlaneStatus",
    shortname = "awsmcp",
    plural = "awsmanagedcontrolplanes",
    singular = "awsmanagedcontrolplane",
    category = "cluster-api",
    printcolumn = r#"{"name":"Cluster", "type":"string", "jsonPath":".metadata.labels.cluster\\.x-k8s\\.io/cluster-name"}"#,
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.ready"}"#,
    printcolumn = r#"{"name":"Endpoint", "type":"string", "jsonPath":".spec.controlPlaneEndpoint.host"}"#,
    crates(serde_json = "k8s_openapi::serde_json")
)]
#[serde(rename_all = "camelCase")]
pub struct AWSManagedControlPlaneSpec {
    /// Defaults to `<namespace>_<name>` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eks_cluster_name: Option<String>,

    #[x_kube(validation = Rule::new("self != ''").message("region must not be empty"))]
    pub region: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_name: Option<String>,

    #[serde(default)]
    pub network_spec: NetworkSpec,

    /// Control plane log type (`api`, `audit`, `authenticator`,
    /// `controllerManager`, `scheduler`) to whether it is shipped to CloudWatch.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub logging: BTreeMap<String, bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_config: Option<EncryptionConfig>,

    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub additional_tags: Tags,

    #[serde(default)]
    pub endpoint_access: EndpointAccess,

    #[serde(default)]
    pub control_plane_endpoint: ApiEndpoint,
}

#[derive(Deserialize, Serialize, Clone, Debug, KubeSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AWSManagedControlPlaneStatus {
    #[serde(default)]
    pub ready: bool,

    #[serde(default)]
    pub initialized: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_group: Option<SecurityGroup>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl AWSManagedControlPlane {
    pub fn namespace(&self) -> Result<String, types::error::Error> {
        ResourceExt::namespace(self).context(NoNamespaceSnafu)
    }

    pub fn name(&self) -> String {
        ResourceExt::name_any(self)
    }

    pub fn status_mut(&mut self) -> &mut AWSManagedControlPlaneStatus {
        self.status.get_or_insert_with(Default::default)
    }
}

impl Conditioned for AWSManagedControlPlane {
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
