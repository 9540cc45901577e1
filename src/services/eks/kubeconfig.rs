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

use std::collections::BTreeMap;

use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use kube::Resource;
use serde_json::json;
use snafu::{OptionExt, ResultExt};
use tracing::{debug, info};

use super::Service;
use crate::cloud::eks::Cluster;
use crate::scope::ManagedControlPlaneScope;
use crate::services::{Error, KubeconfigSnafu, NotReadySnafu, RenderKubeconfigSnafu};
use crate::types::capi::CLUSTER_NAME_LABEL;

/// Key under which cluster-api consumers read the kubeconfig.
pub const KUBECONFIG_SECRET_KEY: &str = "value";
const CLUSTER_API_SECRET_TYPE: &str = "cluster.x-k8s.io/secret";
const EXEC_API_VERSION: &str = "client.authentication.k8s.io/v1beta1";

impl Service {
    /// Creates the kubeconfig secret once. An existing secret is left alone.
    pub(super) async fn reconcile_kubeconfig(
        &self,
        scope: &ManagedControlPlaneScope,
        cluster: &Cluster,
    ) -> Result<(), Error> {
        let secret_name = scope.kubeconfig_secret_name();
        let namespace = scope.namespace();

        let existing = scope
            .kube()
            .get_secret(namespace, &secret_name)
            .await
            .context(KubeconfigSnafu { name: &secret_name })?;
        if existing.is_some() {
            debug!(secret = %secret_name, "kubeconfig secret exists");
            return Ok(());
        }

        let config = render(scope, cluster)?;
        let secret = corev1::Secret {
            metadata: metav1::ObjectMeta {
                name: Some(secret_name.clone()),
                namespace: Some(namespace.to_string()),
                labels: Some(BTreeMap::from([(
                    CLUSTER_NAME_LABEL.to_string(),
                    scope.cluster_name().to_string(),
                )])),
                owner_references: scope
                    .control_plane
                    .controller_owner_ref(&())
                    .map(|owner| vec![owner]),
                ..Default::default()
            },
            type_: Some(CLUSTER_API_SECRET_TYPE.to_string()),
            data: Some(BTreeMap::from([(
                KUBECONFIG_SECRET_KEY.to_string(),
                ByteString(config.into_bytes()),
            )])),
            ..Default::default()
        };

        scope
            .kube()
            .create_secret(namespace, secret)
            .await
            .context(KubeconfigSnafu { name: &secret_name })?;
        info!(secret = %secret_name, "created kubeconfig secret");
        Ok(())
    }
}

/// Kubeconfig that authenticates through `aws eks get-token`.
fn render(scope: &ManagedControlPlaneScope, cluster: &Cluster) -> Result<String, Error> {
    let name = cluster.name.as_str();
    let server = cluster.endpoint.as_deref().context(NotReadySnafu {
        what: format!("endpoint of eks cluster {name}"),
    })?;
    let ca = cluster
        .certificate_authority_data
        .as_deref()
        .context(NotReadySnafu {
            what: format!("certificate authority of eks cluster {name}"),
        })?;
    let user = format!("{}-capi-admin", scope.cluster_name());
    let context = format!("{user}@{name}");

    let config = json!({
        "apiVersion": "v1",
        "kind": "Config",
        "clusters": [{
            "name": name,
            "cluster": {
                "server": server,
                "certificate-authority-data": ca,
            },
        }],
        "contexts": [{
            "name": context,
            "context": {
                "cluster": name,
                "user": user,
            },
        }],
        "current-context": context,
        "users": [{
            "name": user,
            "user": {
                "exec": {
                    "apiVersion": EXEC_API_VERSION,
                    "command": "aws",
                    "args": ["eks", "get-token", "--cluster-name", name, "--region", scope.region()],
                },
            },
        }],
    });

    serde_yaml_ng::to_string(&config).context(RenderKubeconfigSnafu { name })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::cloud::eks::ClusterStatus;
    use crate::context::MockKubeClient;
    use crate::scope::ClusterScope;
    use crate::tests::{
        TEST_CLUSTER, TEST_NAMESPACE, create_test_control_plane, test_clients,
        test_control_plane_scope,
    };
    use std::sync::{Arc, Mutex};
    use tokio_util::sync::CancellationToken;

    fn cluster() -> Cluster {
        Cluster {
            name: "default_capi-managed-test-control-plane".to_string(),
            arn: "arn:aws:eks:us-east-1:123:cluster/eks".to_string(),
            status: ClusterStatus::Active,
            version: Some("1.16".to_string()),
            endpoint: Some("https://ABC.eks.amazonaws.com".to_string()),
            certificate_authority_data: Some("Y2E=".to_string()),
            resources_vpc_config: None,
            logging: None,
            tags: Default::default(),
        }
    }

    fn service() -> Service {
        Service::new(ClusterScope {
            name: TEST_CLUSTER.to_string(),
            namespace: TEST_NAMESPACE.to_string(),
            region: "us-east-1".to_string(),
            clients: test_clients(),
            cancel: CancellationToken::new(),
        })
    }

    #[tokio::test]
    async fn test_creates_kubeconfig_secret() {
        let created = Arc::new(Mutex::new(Vec::new()));
        let seen = created.clone();
        let mut kube = MockKubeClient::new();
        kube.expect_get_secret()
            .withf(|ns, name| ns == TEST_NAMESPACE && name == "capi-managed-test-kubeconfig")
            .returning(|_, _| Ok(None));
        kube.expect_create_secret().times(1).returning(move |_, secret| {
            seen.lock().unwrap().push(secret);
            Ok(())
        });
        let scope = test_control_plane_scope(Arc::new(kube), test_clients(), create_test_control_plane());

        service()
            .reconcile_kubeconfig(&scope, &cluster())
            .await
            .expect("secret should be created");

        let created = created.lock().unwrap();
        let secret = &created[0];
        assert_eq!(secret.type_.as_deref(), Some(CLUSTER_API_SECRET_TYPE));
        assert_eq!(
            secret.metadata.labels.as_ref().unwrap().get(CLUSTER_NAME_LABEL).map(String::as_str),
            Some(TEST_CLUSTER)
        );
        let value = &secret.data.as_ref().unwrap()[KUBECONFIG_SECRET_KEY];
        let config: serde_json::Value = serde_yaml_ng::from_slice(&value.0).unwrap();
        assert_eq!(config["clusters"][0]["cluster"]["server"], "https://ABC.eks.amazonaws.com");
        assert_eq!(config["users"][0]["user"]["exec"]["args"][1], "get-token");
    }

    #[tokio::test]
    async fn test_existing_secret_is_kept() {
        let mut kube = MockKubeClient::new();
        kube.expect_get_secret()
            .returning(|_, _| Ok(Some(corev1::Secret::default())));
        kube.expect_create_secret().never();
        let scope = test_control_plane_scope(Arc::new(kube), test_clients(), create_test_control_plane());

        service()
            .reconcile_kubeconfig(&scope, &cluster())
            .await
            .expect("nothing to do");
    }
}
