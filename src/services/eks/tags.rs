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

use snafu::ResultExt;
use tracing::debug;

use super::Service;
use crate::cloud::eks::Cluster;
use crate::cloud::with_cancel;
use crate::scope::ManagedControlPlaneScope;
use crate::services::{Error, TagClusterSnafu};
use crate::types::v1alpha1::tags::{
    self, BuildParams, COMMON_ROLE_TAG_VALUE, ResourceLifecycle, Tags,
};

/// Tags the controller owns on the EKS cluster.
pub fn desired_tags(scope: &ManagedControlPlaneScope) -> Tags {
    let name = scope.name();
    tags::build(&BuildParams {
        cluster_name: name.clone(),
        lifecycle: Some(ResourceLifecycle::Owned),
        name: Some(format!("{name}-eks-cp")),
        role: Some(COMMON_ROLE_TAG_VALUE.to_string()),
        additional: scope.additional_tags(),
    })
}

impl Service {
    pub(super) async fn reconcile_tags(
        &self,
        scope: &ManagedControlPlaneScope,
        cluster: &Cluster,
    ) -> Result<(), Error> {
        let missing = tags::difference(&desired_tags(scope), &cluster.tags);
        if missing.is_empty() {
            return Ok(());
        }

        debug!(name = %cluster.name, count = missing.len(), "tagging EKS cluster");
        let eks = &self.scope.clients.eks;
        with_cancel(&self.scope.cancel, eks.tag_resource(&cluster.arn, missing))
            .await
            .context(TagClusterSnafu { name: &cluster.name })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::cloud::autoscaling::MockAutoScalingApi;
    use crate::cloud::ec2::MockEc2Api;
    use crate::cloud::eks::{ClusterStatus, MockEksApi};
    use crate::cloud::iam::MockIamApi;
    use crate::context::MockKubeClient;
    use crate::scope::ClusterScope;
    use crate::tests::{clients_with, create_test_control_plane, test_control_plane_scope};
    use crate::types::v1alpha1::tags::{NAME_TAG_KEY, cluster_tag_key};
    use std::sync::{Arc, Mutex};
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_reconcile_tags_sends_only_missing() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let seen = sent.clone();
        let mut eks = MockEksApi::new();
        eks.expect_tag_resource().times(1).returning(move |arn, tags| {
            seen.lock().unwrap().push((arn.to_string(), tags));
            Ok(())
        });
        let clients = clients_with(
            MockEc2Api::new(),
            MockAutoScalingApi::new(),
            eks,
            MockIamApi::new(),
        );
        let svc = Service::new(ClusterScope {
            name: "capi-managed-test".to_string(),
            namespace: "default".to_string(),
            region: "us-east-1".to_string(),
            clients: clients.clone(),
            cancel: CancellationToken::new(),
        });

        let mut control_plane = create_test_control_plane();
        control_plane.spec.additional_tags = [("team".to_string(), "infra".to_string())].into();
        let scope = test_control_plane_scope(Arc::new(MockKubeClient::new()), clients, control_plane);

        let mut observed = desired_tags(&scope);
        observed.remove("team");
        let cluster = Cluster {
            name: scope.name(),
            arn: "arn:aws:eks:us-east-1:123:cluster/eks".to_string(),
            status: ClusterStatus::Active,
            version: None,
            endpoint: None,
            certificate_authority_data: None,
            resources_vpc_config: None,
            logging: None,
            tags: observed,
        };

        svc.reconcile_tags(&scope, &cluster).await.expect("tagging should succeed");

        let sent = sent.lock().unwrap();
        assert_eq!(sent[0].0, "arn:aws:eks:us-east-1:123:cluster/eks");
        assert_eq!(
            sent[0].1,
            Tags::from([("team".to_string(), "infra".to_string())])
        );
    }

    #[test]
    fn test_desired_tags() {
        let scope = test_control_plane_scope(
            Arc::new(MockKubeClient::new()),
            crate::tests::test_clients(),
            create_test_control_plane(),
        );
        let name = scope.name();
        let tags = desired_tags(&scope);
        assert_eq!(
            tags.get(NAME_TAG_KEY).map(String::as_str),
            Some(format!("{name}-eks-cp").as_str())
        );
        assert_eq!(
            tags.get(&cluster_tag_key(&name)).map(String::as_str),
            Some("owned")
        );
    }
}
