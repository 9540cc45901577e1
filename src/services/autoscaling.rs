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

use async_trait::async_trait;
use snafu::{OptionExt, ResultExt, ensure};
use tracing::{debug, info};

use super::{
    AsgInterface, CreateAsgSnafu, DeleteAsgSnafu, DescribeAsgSnafu, Error, FailedDependencySnafu,
    NotReadySnafu, UpdateAsgSnafu, WaitAsgSnafu,
};
use crate::cloud::autoscaling::{
    self as sdk, CreateAutoScalingGroupInput, LaunchTemplateSpecification,
    UpdateAutoScalingGroupInput,
};
use crate::cloud::{ErrorCode, with_cancel};
use crate::retry;
use crate::scope::{ClusterScope, MachinePoolScope, ProviderId};
use crate::types::v1alpha1::autoscaling::{
    AsgInstance, AsgState, AsgStatus, AutoScalingGroup, MixedInstancesPolicy, Overrides,
};
use crate::types::v1alpha1::tags::{self, BuildParams, ResourceLifecycle, Tags};

const LATEST_VERSION: &str = "$Latest";
const NODE_ROLE_TAG_VALUE: &str = "node";

/// Autoscaling group service.
pub struct Service {
    scope: ClusterScope,
}

impl Service {
    pub fn new(scope: ClusterScope) -> Self {
        Self { scope }
    }

    async fn describe(&self, name: &str) -> Result<Option<AutoScalingGroup>, Error> {
        let asg = &self.scope.clients.autoscaling;
        let groups = match with_cancel(
            &self.scope.cancel,
            asg.describe_auto_scaling_groups(vec![name.to_string()]),
        )
        .await
        {
            Ok(groups) => groups,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e).context(DescribeAsgSnafu { name }),
        };

        let group = groups
            .into_iter()
            .find(|g| g.auto_scaling_group_name == name)
            .map(from_sdk);
        if group.is_none() {
            debug!(name, "autoscaling group not found");
        }
        Ok(group)
    }
}

#[async_trait]
impl AsgInterface for Service {
    async fn find_by_provider_id(
        &self,
        provider_id: &ProviderId,
    ) -> Result<Option<AutoScalingGroup>, Error> {
        self.describe(provider_id.id()).await
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<AutoScalingGroup>, Error> {
        self.describe(name).await
    }

    async fn create_asg(&self, scope: &MachinePoolScope) -> Result<AutoScalingGroup, Error> {
        let name = scope.name();
        let subnets = scope.subnet_ids();
        ensure!(
            !subnets.is_empty(),
            FailedDependencySnafu {
                message: format!("no subnets available for autoscaling group {name}"),
            }
        );

        let spec = &scope.aws_machine_pool.spec;
        let launch_template = launch_template_spec(&name);
        let mixed_instances_policy = spec
            .mixed_instances_policy
            .as_ref()
            .map(|policy| to_sdk(policy, &name));
        let input = CreateAutoScalingGroupInput {
            auto_scaling_group_name: name.clone(),
            min_size: spec.min_size,
            max_size: spec.max_size,
            desired_capacity: Some(scope.desired_capacity()),
            vpc_zone_identifier: subnets.join(","),
            availability_zones: spec.availability_zones.clone(),
            // a mixed policy carries its own template reference
            launch_template: mixed_instances_policy.is_none().then_some(launch_template),
            mixed_instances_policy,
            tags: group_tags(scope),
        };

        let asg = &*self.scope.clients.autoscaling;
        let cancel = &self.scope.cancel;
        with_cancel(cancel, asg.create_auto_scaling_group(input))
            .await
            .context(CreateAsgSnafu { name: &name })?;

        // new groups are not visible to describe right away
        let names = vec![name.clone()];
        retry::wait_for_with_retryable(
            cancel,
            move || {
                let names = names.clone();
                async move {
                    let groups = with_cancel(cancel, asg.describe_auto_scaling_groups(names)).await?;
                    Ok(!groups.is_empty())
                }
            },
            &[ErrorCode::ResourceNotFound],
        )
        .await
        .context(WaitAsgSnafu { name: &name })?;

        info!(name, "created autoscaling group");
        self.describe(&name).await?.context(NotReadySnafu {
            what: format!("autoscaling group {name}"),
        })
    }

    async fn update_asg(&self, scope: &MachinePoolScope) -> Result<(), Error> {
        let name = scope.name();
        let spec = &scope.aws_machine_pool.spec;
        let input = UpdateAutoScalingGroupInput {
            auto_scaling_group_name: name.clone(),
            min_size: Some(spec.min_size),
            max_size: Some(spec.max_size),
            desired_capacity: Some(scope.desired_capacity()),
            mixed_instances_policy: spec
                .mixed_instances_policy
                .as_ref()
                .map(|policy| to_sdk(policy, &name)),
        };

        let asg = &self.scope.clients.autoscaling;
        with_cancel(&self.scope.cancel, asg.update_auto_scaling_group(input))
            .await
            .context(UpdateAsgSnafu { name: &name })?;

        info!(name, "updated autoscaling group");
        Ok(())
    }

    async fn delete_asg_and_wait(&self, name: &str) -> Result<(), Error> {
        let asg = &*self.scope.clients.autoscaling;
        let cancel = &self.scope.cancel;

        match with_cancel(cancel, asg.delete_auto_scaling_group(name, true)).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!(name, "autoscaling group already deleted");
                return Ok(());
            }
            Err(e) => return Err(e).context(DeleteAsgSnafu { name }),
        }

        retry::wait_for(cancel, move || async move {
            let groups =
                with_cancel(cancel, asg.describe_auto_scaling_groups(vec![name.to_string()]))
                    .await?;
            Ok(groups.iter().all(|g| {
                g.status.as_deref().map(AsgStatus::from) == Some(AsgStatus::DeleteInProgress)
            }))
        })
        .await
        .context(WaitAsgSnafu { name })?;

        info!(name, "deleted autoscaling group");
        Ok(())
    }
}

/// Whether the observed group has drifted from the pool's size bounds or
/// mixed instances policy.
pub fn needs_update(scope: &MachinePoolScope, existing: &AutoScalingGroup) -> bool {
    let spec = &scope.aws_machine_pool.spec;
    existing.min_size != spec.min_size
        || existing.max_size != spec.max_size
        || existing.desired_capacity != Some(scope.desired_capacity())
        || existing.mixed_instances_policy != spec.mixed_instances_policy
}

fn group_tags(scope: &MachinePoolScope) -> Tags {
    let mut tags = tags::build(&BuildParams {
        cluster_name: scope.cluster_name().to_string(),
        lifecycle: Some(ResourceLifecycle::Owned),
        name: Some(scope.name()),
        role: Some(NODE_ROLE_TAG_VALUE.to_string()),
        additional: scope.additional_tags(),
    });
    tags.insert(
        tags::cluster_aws_cloud_provider_tag_key(scope.cluster_name()),
        ResourceLifecycle::Owned.to_string(),
    );
    tags
}

fn launch_template_spec(name: &str) -> LaunchTemplateSpecification {
    LaunchTemplateSpecification {
        launch_template_id: None,
        launch_template_name: Some(name.to_string()),
        version: Some(LATEST_VERSION.to_string()),
    }
}

fn to_sdk(policy: &MixedInstancesPolicy, name: &str) -> sdk::MixedInstancesPolicy {
    sdk::MixedInstancesPolicy {
        launch_template: launch_template_spec(name),
        overrides: policy
            .overrides
            .iter()
            .map(|o| o.instance_type.clone())
            .collect(),
        instances_distribution: policy.instances_distribution.clone(),
    }
}

fn from_sdk(group: sdk::Group) -> AutoScalingGroup {
    let status = group.status.as_deref().map(AsgStatus::from);
    let instances: Vec<AsgInstance> = group
        .instances
        .into_iter()
        .map(|i| AsgInstance {
            state: AsgState::from_lifecycle(&i.lifecycle_state),
            id: i.instance_id,
            availability_zone: i.availability_zone,
        })
        .collect();
    let states: Vec<AsgState> = instances.iter().map(|i| i.state.clone()).collect();
    let state = AsgState::for_group(status.as_ref(), group.desired_capacity, &states);

    AutoScalingGroup {
        arn: group.auto_scaling_group_arn,
        name: group.auto_scaling_group_name,
        tags: group.tags,
        desired_capacity: Some(group.desired_capacity),
        min_size: group.min_size,
        max_size: group.max_size,
        subnets: group
            .vpc_zone_identifier
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        mixed_instances_policy: group.mixed_instances_policy.map(|p| MixedInstancesPolicy {
            instances_distribution: p.instances_distribution,
            overrides: p
                .overrides
                .into_iter()
                .map(|instance_type| Overrides { instance_type })
                .collect(),
        }),
        state,
        status,
        instances,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::cloud::autoscaling::{Group, Instance, MockAutoScalingApi};
    use crate::cloud::ec2::MockEc2Api;
    use crate::cloud::eks::MockEksApi;
    use crate::cloud::iam::MockIamApi;
    use crate::cloud::{self, Clients};
    use crate::context::MockKubeClient;
    use crate::tests::{TEST_CLUSTER, TEST_POOL, clients_with, test_machine_pool_scope};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio_util::sync::CancellationToken;

    fn service(autoscaling: MockAutoScalingApi) -> (Service, Clients) {
        let clients = clients_with(
            MockEc2Api::new(),
            autoscaling,
            MockEksApi::new(),
            MockIamApi::new(),
        );
        let scope = ClusterScope {
            name: TEST_CLUSTER.to_string(),
            namespace: "default".to_string(),
            region: "us-east-1".to_string(),
            clients: clients.clone(),
            cancel: CancellationToken::new(),
        };
        (Service::new(scope), clients)
    }

    fn group(name: &str, lifecycle: &[&str]) -> Group {
        Group {
            auto_scaling_group_arn: format!("arn:aws:autoscaling:us-east-1:123:autoScalingGroup:{name}"),
            auto_scaling_group_name: name.to_string(),
            min_size: 1,
            max_size: 3,
            desired_capacity: 2,
            vpc_zone_identifier: "subnet-private-a".to_string(),
            instances: lifecycle
                .iter()
                .enumerate()
                .map(|(i, state)| Instance {
                    instance_id: format!("i-{i}"),
                    availability_zone: "us-east-1a".to_string(),
                    lifecycle_state: state.to_string(),
                })
                .collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_find_by_provider_id_uses_group_name() {
        let mut autoscaling = MockAutoScalingApi::new();
        autoscaling
            .expect_describe_auto_scaling_groups()
            .withf(|names| names == &vec![TEST_POOL.to_string()])
            .returning(|_| Ok(vec![group(TEST_POOL, &["InService", "InService"])]));
        let (svc, _) = service(autoscaling);

        let id = ProviderId::aws("us-east-1", TEST_POOL);
        let asg = svc
            .find_by_provider_id(&id)
            .await
            .expect("describe should succeed")
            .expect("group should exist");
        assert_eq!(asg.state, AsgState::Running);
        assert_eq!(asg.instances.len(), 2);
        assert_eq!(asg.subnets, vec!["subnet-private-a"]);
    }

    #[tokio::test]
    async fn test_find_by_name_absent() {
        let mut autoscaling = MockAutoScalingApi::new();
        autoscaling
            .expect_describe_auto_scaling_groups()
            .returning(|_| Ok(Vec::new()));
        let (svc, _) = service(autoscaling);

        assert!(svc.find_by_name(TEST_POOL).await.expect("no error").is_none());
    }

    #[tokio::test]
    async fn test_find_by_name_surfaces_unknown_state() {
        let mut autoscaling = MockAutoScalingApi::new();
        autoscaling
            .expect_describe_auto_scaling_groups()
            .returning(|_| Ok(vec![group(TEST_POOL, &["NewUnseenState"])]));
        let (svc, _) = service(autoscaling);

        let asg = svc.find_by_name(TEST_POOL).await.unwrap().unwrap();
        assert_eq!(asg.state, AsgState::Unknown("NewUnseenState".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_asg_waits_for_visibility() {
        let created = Arc::new(Mutex::new(Vec::new()));
        let seen = created.clone();
        let describes = Arc::new(AtomicU32::new(0));
        let count = describes.clone();

        let mut autoscaling = MockAutoScalingApi::new();
        autoscaling
            .expect_create_auto_scaling_group()
            .times(1)
            .returning(move |input| {
                seen.lock().unwrap().push(input);
                Ok(())
            });
        autoscaling
            .expect_describe_auto_scaling_groups()
            .returning(move |_| {
                // the first describe races the create
                if count.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err(cloud::Error::api("ResourceNotFoundException", "not yet"));
                }
                Ok(vec![group(TEST_POOL, &[])])
            });
        let (svc, clients) = service(autoscaling);
        let scope = test_machine_pool_scope(Arc::new(MockKubeClient::new()), clients);

        let asg = svc.create_asg(&scope).await.expect("create should succeed");
        assert_eq!(asg.name, TEST_POOL);

        let created = created.lock().unwrap();
        let input = &created[0];
        assert_eq!(input.auto_scaling_group_name, TEST_POOL);
        assert_eq!(input.min_size, 1);
        assert_eq!(input.max_size, 3);
        assert_eq!(input.desired_capacity, Some(2));
        assert_eq!(input.vpc_zone_identifier, "subnet-private-a");
        assert_eq!(
            input.launch_template.as_ref().and_then(|lt| lt.version.as_deref()),
            Some("$Latest")
        );
        assert_eq!(
            input
                .tags
                .get(&tags::cluster_aws_cloud_provider_tag_key(TEST_CLUSTER))
                .map(String::as_str),
            Some("owned")
        );
    }

    #[tokio::test]
    async fn test_create_asg_requires_subnets() {
        let mut autoscaling = MockAutoScalingApi::new();
        autoscaling.expect_create_auto_scaling_group().never();
        let (svc, clients) = service(autoscaling);
        let mut scope = test_machine_pool_scope(Arc::new(MockKubeClient::new()), clients);
        scope.aws_machine_pool.spec.availability_zones = vec!["us-west-2a".to_string()];

        let err = svc.create_asg(&scope).await.expect_err("no subnets");
        assert!(err.is_permanent());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_asg_and_wait() {
        let describes = Arc::new(AtomicU32::new(0));
        let count = describes.clone();

        let mut autoscaling = MockAutoScalingApi::new();
        autoscaling
            .expect_delete_auto_scaling_group()
            .withf(|name, force| name == TEST_POOL && *force)
            .times(1)
            .returning(|_, _| Ok(()));
        autoscaling
            .expect_describe_auto_scaling_groups()
            .returning(move |_| {
                if count.fetch_add(1, Ordering::SeqCst) < 2 {
                    return Ok(vec![group(TEST_POOL, &["Terminating"])]);
                }
                Ok(Vec::new())
            });
        let (svc, _) = service(autoscaling);

        svc.delete_asg_and_wait(TEST_POOL)
            .await
            .expect("delete should complete");
        assert_eq!(describes.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_delete_asg_accepts_delete_in_progress() {
        let mut autoscaling = MockAutoScalingApi::new();
        autoscaling
            .expect_delete_auto_scaling_group()
            .returning(|_, _| Ok(()));
        autoscaling
            .expect_describe_auto_scaling_groups()
            .times(1)
            .returning(|_| {
                let mut g = group(TEST_POOL, &["Terminating"]);
                g.status = Some("Delete in progress".to_string());
                Ok(vec![g])
            });
        let (svc, _) = service(autoscaling);

        svc.delete_asg_and_wait(TEST_POOL)
            .await
            .expect("delete in progress is terminal");
    }

    #[test]
    fn test_needs_update() {
        let scope = test_machine_pool_scope(
            Arc::new(MockKubeClient::new()),
            crate::tests::test_clients(),
        );
        let existing = from_sdk(group(TEST_POOL, &["InService"]));
        assert!(!needs_update(&scope, &existing));

        let mut resized = existing.clone();
        resized.max_size = 5;
        assert!(needs_update(&scope, &resized));

        let mut scaled = existing;
        scaled.desired_capacity = Some(1);
        assert!(needs_update(&scope, &scaled));
    }
}
