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

use std::sync::Arc;

use kube::{Resource, ResourceExt};
use snafu::OptionExt;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::{ClusterScope, Error, ObjectPatcher, ValidationSnafu};
use crate::cloud::CloudProvider;
use crate::context::{EventRecord, KubeClient};
use crate::types::capi::Cluster;
use crate::types::v1alpha1::control_plane::{
    AWSManagedControlPlane, CONTROL_PLANE_FINALIZER, DEFAULT_EKS_CONTROL_PLANE_ROLE,
};
use crate::types::v1alpha1::network::SubnetSpec;
use crate::types::v1alpha1::tags::Tags;

pub struct ManagedControlPlaneScopeParams {
    pub kube: Arc<dyn KubeClient>,
    pub cloud: Arc<dyn CloudProvider>,
    pub cancel: CancellationToken,
    pub cluster: Option<Cluster>,
    pub control_plane: Option<AWSManagedControlPlane>,
}

/// Everything one `AWSManagedControlPlane` reconcile reads and writes.
pub struct ManagedControlPlaneScope {
    pub cluster_scope: ClusterScope,
    pub cluster: Cluster,
    pub control_plane: AWSManagedControlPlane,
    kube: Arc<dyn KubeClient>,
    patcher: ObjectPatcher,
}

impl ManagedControlPlaneScope {
    pub fn new(params: ManagedControlPlaneScopeParams) -> Result<Self, Error> {
        let required = |object| ValidationSnafu {
            scope: "managed control plane",
            object,
        };
        let cluster = params.cluster.context(required("Cluster"))?;
        let control_plane = params
            .control_plane
            .context(required("AWSManagedControlPlane"))?;

        let region = control_plane.spec.region.clone();
        let cluster_scope = ClusterScope {
            name: cluster.name_any(),
            namespace: control_plane.namespace()?,
            clients: params.cloud.clients(&region),
            region,
            cancel: params.cancel,
        };
        let patcher = ObjectPatcher::new(&control_plane)?;

        Ok(Self {
            cluster_scope,
            cluster,
            control_plane,
            kube: params.kube,
            patcher,
        })
    }

    /// The EKS cluster name: `eksClusterName`, or `<namespace>_<name>`.
    pub fn name(&self) -> String {
        match self.control_plane.spec.eks_cluster_name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("{}_{}", self.namespace(), self.control_plane.name()),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.cluster_scope.namespace
    }

    pub fn region(&self) -> &str {
        &self.cluster_scope.region
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_scope.name
    }

    pub fn subnets(&self) -> &[SubnetSpec] {
        &self.control_plane.spec.network_spec.subnets
    }

    pub fn additional_tags(&self) -> Tags {
        self.control_plane.spec.additional_tags.clone()
    }

    pub fn role_name(&self) -> &str {
        match self.control_plane.spec.role_name.as_deref() {
            Some(role) if !role.is_empty() => role,
            _ => DEFAULT_EKS_CONTROL_PLANE_ROLE,
        }
    }

    pub fn kubeconfig_secret_name(&self) -> String {
        format!("{}-kubeconfig", self.cluster_name())
    }

    /// Publishes an event against the control plane. Failures are logged, not returned.
    pub async fn record(&self, event: EventRecord) {
        let reason = event.reason.clone();
        if let Err(e) = self
            .kube
            .publish(self.control_plane.object_ref(&()), event)
            .await
        {
            warn!(%reason, error = %e, "failed to publish event");
        }
    }

    pub fn kube(&self) -> &dyn KubeClient {
        self.kube.as_ref()
    }

    pub fn has_finalizer(&self) -> bool {
        self.control_plane
            .finalizers()
            .iter()
            .any(|f| f == CONTROL_PLANE_FINALIZER)
    }

    pub fn add_finalizer(&mut self) -> bool {
        if self.has_finalizer() {
            return false;
        }
        self.control_plane
            .finalizers_mut()
            .push(CONTROL_PLANE_FINALIZER.to_string());
        true
    }

    pub fn remove_finalizer(&mut self) {
        self.control_plane
            .finalizers_mut()
            .retain(|f| f != CONTROL_PLANE_FINALIZER);
    }

    pub async fn patch_object(&mut self) -> Result<(), Error> {
        self.patcher
            .patch(self.kube.as_ref(), &mut self.control_plane)
            .await
    }

    pub async fn close(&mut self) -> Result<(), Error> {
        self.patch_object().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::context::MockKubeClient;
    use crate::tests::{create_test_capi_cluster, create_test_control_plane, test_cloud};

    fn params() -> ManagedControlPlaneScopeParams {
        ManagedControlPlaneScopeParams {
            kube: Arc::new(MockKubeClient::new()),
            cloud: test_cloud(),
            cancel: CancellationToken::new(),
            cluster: Some(create_test_capi_cluster()),
            control_plane: Some(create_test_control_plane()),
        }
    }

    #[test]
    fn test_new_requires_control_plane() {
        let mut p = params();
        p.control_plane = None;
        let err = ManagedControlPlaneScope::new(p)
            .err()
            .expect("scope should not build");
        assert!(err.is_validation());
    }

    #[test]
    fn test_defaults() {
        let scope = ManagedControlPlaneScope::new(params()).expect("scope should build");
        assert_eq!(scope.name(), "default_capi-managed-test-control-plane");
        assert_eq!(scope.role_name(), DEFAULT_EKS_CONTROL_PLANE_ROLE);
        assert_eq!(scope.kubeconfig_secret_name(), "capi-managed-test-kubeconfig");
        assert_eq!(scope.region(), "us-east-1");
    }

    #[test]
    fn test_explicit_names() {
        let mut p = params();
        let mut cp = create_test_control_plane();
        cp.spec.eks_cluster_name = Some("prod-eks".to_string());
        cp.spec.role_name = Some("custom-role".to_string());
        p.control_plane = Some(cp);

        let scope = ManagedControlPlaneScope::new(p).expect("scope should build");
        assert_eq!(scope.name(), "prod-eks");
        assert_eq!(scope.role_name(), "custom-role");
    }
}
