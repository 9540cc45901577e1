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

use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use tokio_util::sync::CancellationToken;

use crate::cloud::autoscaling::MockAutoScalingApi;
use crate::cloud::ec2::MockEc2Api;
use crate::cloud::eks::MockEksApi;
use crate::cloud::iam::MockIamApi;
use crate::cloud::{Clients, CloudProvider, MockCloudProvider};
use crate::context::{KubeClient, MockKubeClient};
use crate::scope::{
    MachinePoolScope, MachinePoolScopeParams, ManagedControlPlaneScope,
    ManagedControlPlaneScopeParams,
};
use crate::types::capi::{
    AWSCluster, AWSClusterSpec, AWSClusterStatus, CLUSTER_NAME_LABEL, Cluster, ClusterSpec,
    ClusterStatus, MachinePool, MachinePoolSpec, NetworkStatus,
};
use crate::types::v1alpha1::control_plane::{AWSManagedControlPlane, AWSManagedControlPlaneSpec};
use crate::types::v1alpha1::launch_template::AWSLaunchTemplate;
use crate::types::v1alpha1::machine_pool::{AWSMachinePool, AWSMachinePoolSpec};
use crate::types::v1alpha1::network::{
    AWSResourceReference, NetworkSpec, SecurityGroup, SubnetSpec,
};

pub const TEST_NAMESPACE: &str = "default";
pub const TEST_CLUSTER: &str = "capi-managed-test";
pub const TEST_POOL: &str = "capa-pool";
pub const TEST_CONTROL_PLANE: &str = "capi-managed-test-control-plane";
pub const TEST_BOOTSTRAP_SECRET: &str = "capa-pool-bootstrap";

/// Whether a recorded `patch <json>` line drops the controller's only finalizer.
pub fn removes_finalizer(line: &str) -> bool {
    line.starts_with("patch")
        && line.contains(r#"{"op":"remove","path":"/metadata/finalizers/0"}"#)
}

fn meta(name: &str, owner: Option<(&str, &str, &str)>) -> metav1::ObjectMeta {
    metav1::ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(TEST_NAMESPACE.to_string()),
        uid: Some(format!("{name}-uid")),
        generation: Some(1),
        labels: Some([(CLUSTER_NAME_LABEL.to_string(), TEST_CLUSTER.to_string())].into()),
        owner_references: owner.map(|(api_version, kind, owner)| {
            vec![metav1::OwnerReference {
                api_version: api_version.to_string(),
                kind: kind.to_string(),
                name: owner.to_string(),
                uid: format!("{owner}-uid"),
                ..Default::default()
            }]
        }),
        ..Default::default()
    }
}

pub fn create_test_machine_pool() -> AWSMachinePool {
    AWSMachinePool {
        metadata: meta(
            TEST_POOL,
            Some(("exp.cluster.x-k8s.io/v1alpha3", "MachinePool", TEST_POOL)),
        ),
        spec: AWSMachinePoolSpec {
            min_size: 1,
            max_size: 3,
            aws_launch_template: AWSLaunchTemplate {
                iam_instance_profile: Some("nodes.cluster-api-provider-aws.sigs.k8s.io".to_string()),
                instance_type: Some("t3.large".to_string()),
                ami: AWSResourceReference {
                    id: Some("ami-0123456789".to_string()),
                    arn: None,
                },
                ssh_key_name: Some("default".to_string()),
                ..Default::default()
            },
            ..Default::default()
        },
        status: None,
    }
}

pub fn create_test_capi_machine_pool() -> MachinePool {
    let mut pool = MachinePool::new(
        TEST_POOL,
        MachinePoolSpec {
            cluster_name: TEST_CLUSTER.to_string(),
            replicas: Some(2),
            ..Default::default()
        },
    );
    pool.metadata = meta(TEST_POOL, Some(("cluster.x-k8s.io/v1alpha3", "Cluster", TEST_CLUSTER)));
    pool.spec.template.spec.bootstrap.data_secret_name = Some(TEST_BOOTSTRAP_SECRET.to_string());
    pool
}

pub fn create_test_capi_cluster() -> Cluster {
    let mut cluster = Cluster::new(
        TEST_CLUSTER,
        ClusterSpec {
            paused: false,
            infrastructure_ref: Some(corev1::ObjectReference {
                api_version: Some("infrastructure.cluster.x-k8s.io/v1alpha3".to_string()),
                kind: Some("AWSCluster".to_string()),
                name: Some(TEST_CLUSTER.to_string()),
                namespace: Some(TEST_NAMESPACE.to_string()),
                ..Default::default()
            }),
            control_plane_ref: None,
        },
    );
    cluster.metadata = meta(TEST_CLUSTER, None);
    cluster.status = Some(ClusterStatus {
        infrastructure_ready: true,
        control_plane_ready: false,
    });
    cluster
}

pub fn create_test_aws_cluster() -> AWSCluster {
    let mut cluster = AWSCluster::new(
        TEST_CLUSTER,
        AWSClusterSpec {
            region: "us-east-1".to_string(),
            network_spec: NetworkSpec {
                vpc_id: Some("vpc-1".to_string()),
                subnets: vec![
                    SubnetSpec {
                        id: "subnet-private-a".to_string(),
                        availability_zone: "us-east-1a".to_string(),
                        is_public: false,
                        ..Default::default()
                    },
                    SubnetSpec {
                        id: "subnet-public-a".to_string(),
                        availability_zone: "us-east-1a".to_string(),
                        is_public: true,
                        ..Default::default()
                    },
                ],
            },
            additional_tags: Default::default(),
        },
    );
    cluster.metadata = meta(TEST_CLUSTER, None);
    let security_groups = [
        ("node", "sg-node"),
        ("lb", "sg-lb"),
        ("controlplane", "sg-controlplane"),
    ]
    .into_iter()
    .map(|(role, id)| {
        (
            role.to_string(),
            SecurityGroup {
                id: id.to_string(),
                name: format!("{TEST_CLUSTER}-{role}"),
                ..Default::default()
            },
        )
    })
    .collect();
    cluster.status = Some(AWSClusterStatus {
        ready: true,
        network: NetworkStatus { security_groups },
    });
    cluster
}

pub fn create_test_control_plane() -> AWSManagedControlPlane {
    AWSManagedControlPlane {
        metadata: meta(
            TEST_CONTROL_PLANE,
            Some(("cluster.x-k8s.io/v1alpha3", "Cluster", TEST_CLUSTER)),
        ),
        spec: AWSManagedControlPlaneSpec {
            region: "us-east-1".to_string(),
            version: Some("v1.16".to_string()),
            network_spec: NetworkSpec {
                vpc_id: Some("vpc-1".to_string()),
                subnets: vec![
                    SubnetSpec {
                        id: "subnet-1".to_string(),
                        availability_zone: "us-east-1a".to_string(),
                        ..Default::default()
                    },
                    SubnetSpec {
                        id: "subnet-2".to_string(),
                        availability_zone: "us-east-1b".to_string(),
                        ..Default::default()
                    },
                ],
            },
            ..Default::default()
        },
        status: None,
    }
}

/// API clients with no expectations: any call fails the test.
pub fn test_clients() -> Clients {
    clients_with(
        MockEc2Api::new(),
        MockAutoScalingApi::new(),
        MockEksApi::new(),
        MockIamApi::new(),
    )
}

pub fn clients_with(
    ec2: MockEc2Api,
    autoscaling: MockAutoScalingApi,
    eks: MockEksApi,
    iam: MockIamApi,
) -> Clients {
    Clients {
        ec2: Arc::new(ec2),
        autoscaling: Arc::new(autoscaling),
        eks: Arc::new(eks),
        iam: Arc::new(iam),
    }
}

pub fn test_cloud() -> Arc<dyn CloudProvider> {
    let mut cloud = MockCloudProvider::new();
    cloud.expect_clients().returning(|_| test_clients());
    Arc::new(cloud)
}

pub fn cloud_with(clients: Clients) -> Arc<dyn CloudProvider> {
    let mut cloud = MockCloudProvider::new();
    cloud.expect_clients().return_const(clients);
    Arc::new(cloud)
}

#[allow(clippy::expect_used)]
pub fn test_machine_pool_scope(kube: Arc<dyn KubeClient>, clients: Clients) -> MachinePoolScope {
    MachinePoolScope::new(MachinePoolScopeParams {
        kube,
        cloud: cloud_with(clients),
        cancel: CancellationToken::new(),
        cluster: Some(create_test_capi_cluster()),
        aws_cluster: Some(create_test_aws_cluster()),
        machine_pool: Some(create_test_capi_machine_pool()),
        aws_machine_pool: Some(create_test_machine_pool()),
    })
    .expect("machine pool scope should build")
}

#[allow(clippy::expect_used)]
pub fn test_control_plane_scope(
    kube: Arc<dyn KubeClient>,
    clients: Clients,
    control_plane: AWSManagedControlPlane,
) -> ManagedControlPlaneScope {
    ManagedControlPlaneScope::new(ManagedControlPlaneScopeParams {
        kube,
        cloud: cloud_with(clients),
        cancel: CancellationToken::new(),
        cluster: Some(create_test_capi_cluster()),
        control_plane: Some(control_plane),
    })
    .expect("control plane scope should build")
}

/// Kube client that accepts every write and knows no objects.
pub fn permissive_kube() -> MockKubeClient {
    let mut kube = MockKubeClient::new();
    kube.expect_patch().returning(|_, _| Ok(()));
    kube.expect_patch_status().returning(|_, _| Ok(()));
    kube.expect_publish().returning(|_, _| Ok(()));
    kube.expect_get_secret().returning(|_, _| Ok(None));
    kube.expect_create_secret().returning(|_, _| Ok(()));
    kube
}
