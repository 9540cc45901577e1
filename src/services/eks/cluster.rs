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

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use snafu::{OptionExt, ResultExt, ensure};
use tracing::{debug, info, warn};

use super::Service;
use crate::cloud::eks::{
    self as sdk, ClusterStatus, CreateClusterInput, LogSetup, Logging, UpdateClusterConfigInput,
    UpdateClusterVersionInput, VpcConfigRequest, VpcConfigResponse,
};
use crate::cloud::{ErrorCode, with_cancel};
use crate::context::EventRecord;
use crate::retry;
use crate::scope::ManagedControlPlaneScope;
use crate::services::{
    CreateClusterSnafu, DeleteClusterSnafu, DescribeClusterSnafu, Error, FailedDependencySnafu,
    GetRoleSnafu, InvalidCidrSnafu, InvalidUpdateConfigSnafu, InvalidVersionSnafu, NotReadySnafu,
    UnexpectedClusterStatusSnafu, UpdateClusterConfigSnafu, UpdateClusterVersionSnafu,
    WaitClusterSnafu,
};
use crate::types::v1alpha1::network::{
    ApiEndpoint, EncryptionConfig, EndpointAccess, SubnetSpec, unique_zones,
};
use crate::types::v1alpha1::tags::{self, ResourceLifecycle};
use crate::utils::cidr;
use crate::utils::version::GenericVersion;

const API_SERVER_PORT: i32 = 443;
const ALL_IPV4: &str = "0.0.0.0/0";

impl Service {
    /// Drives the cluster towards `ACTIVE`. Returns the cluster once it is
    /// ready for the follow-up convergence steps.
    pub(super) async fn reconcile_cluster(
        &self,
        scope: &mut ManagedControlPlaneScope,
    ) -> Result<Option<sdk::Cluster>, Error> {
        debug!("Reconciling EKS cluster");
        let name = scope.name();

        let cluster = match self.describe_cluster(&name).await? {
            Some(cluster) => {
                debug!(name, status = %cluster.status, "Found EKS control plane");
                cluster
            }
            None => {
                let cluster = self.create_cluster(scope).await?;
                info!(name, "Created EKS control plane");
                cluster
            }
        };

        set_status(scope, &cluster)?;
        scope.patch_object().await?;

        let cluster = match cluster.status {
            ClusterStatus::Creating => self.wait_for_cluster_active(scope).await?,
            ClusterStatus::Updating => {
                let cluster = self.wait_for_cluster_active(scope).await?;
                scope
                    .record(EventRecord::normal(
                        "SuccessfulUpdateEKSControlPlane",
                        format!(
                            "Upgraded control plane to {}",
                            cluster.version.as_deref().unwrap_or_default()
                        ),
                    ))
                    .await;
                cluster
            }
            _ => cluster,
        };

        if !scope.control_plane.status.as_ref().is_some_and(|s| s.ready) {
            return Ok(None);
        }

        let endpoint = cluster.endpoint.as_deref().context(NotReadySnafu {
            what: format!("endpoint of eks cluster {name}"),
        })?;
        debug!(name, endpoint, "EKS Control Plane active");
        scope.control_plane.spec.control_plane_endpoint = ApiEndpoint {
            host: endpoint.trim_start_matches("https://").to_string(),
            port: API_SERVER_PORT,
        };

        // independent steps: one failing must not keep the others from running
        let results = [
            self.reconcile_kubeconfig(scope, &cluster).await,
            self.reconcile_cluster_version(scope, &cluster).await,
            self.reconcile_cluster_config(scope, &cluster).await,
        ];
        let mut first_error = None;
        for err in results.into_iter().filter_map(Result::err) {
            if first_error.is_some() {
                warn!(name, error = %err, "additional control plane step failed");
            } else {
                first_error = Some(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(Some(cluster)),
        }
    }

    pub(super) async fn describe_cluster(&self, name: &str) -> Result<Option<sdk::Cluster>, Error> {
        let eks = &self.scope.clients.eks;
        match with_cancel(&self.scope.cancel, eks.describe_cluster(name)).await {
            Ok(cluster) => Ok(Some(cluster)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e).context(DescribeClusterSnafu { name }),
        }
    }

    async fn create_cluster(&self, scope: &ManagedControlPlaneScope) -> Result<sdk::Cluster, Error> {
        let name = scope.name();
        let spec = &scope.control_plane.spec;

        let resources_vpc_config = make_vpc_config(scope.subnets(), &spec.endpoint_access)?;

        let mut tags = scope.additional_tags();
        tags.insert(
            tags::cluster_aws_cloud_provider_tag_key(&name),
            ResourceLifecycle::Owned.to_string(),
        );

        let role_name = scope.role_name();
        let iam = &self.scope.clients.iam;
        let role = with_cancel(&self.scope.cancel, iam.get_role(role_name))
            .await
            .context(GetRoleSnafu { role: role_name })?;

        let input = CreateClusterInput {
            name: name.clone(),
            version: spec.version.as_deref().map(|v| v.replace('v', "")),
            role_arn: role.arn,
            logging: make_eks_logging(&spec.logging),
            encryption_config: make_encryption_configs(spec.encryption_config.as_ref()),
            resources_vpc_config,
            tags,
        };

        let eks = &*self.scope.clients.eks;
        let cancel = &self.scope.cancel;
        let created = OnceLock::new();
        let slot = &created;
        // a freshly created IAM role may not be visible to EKS yet
        let res = retry::wait_for_with_retryable(
            cancel,
            move || {
                let input = input.clone();
                async move {
                    let cluster = with_cancel(cancel, eks.create_cluster(input)).await?;
                    let _ = slot.set(cluster);
                    Ok(true)
                }
            },
            &[ErrorCode::ResourceNotFound],
        )
        .await;

        if let Err(e) = res {
            scope
                .record(EventRecord::warning(
                    "FailedCreateEKSCluster",
                    format!("Failed to create a new EKS cluster: {e}"),
                ))
                .await;
            return Err(e).context(CreateClusterSnafu { name: &name });
        }

        scope
            .record(EventRecord::normal(
                "SuccessfulCreateEKSCluster",
                format!("Created a new EKS cluster {name:?}"),
            ))
            .await;
        created.into_inner().context(NotReadySnafu {
            what: format!("eks cluster {name}"),
        })
    }

    async fn wait_for_cluster_active(
        &self,
        scope: &mut ManagedControlPlaneScope,
    ) -> Result<sdk::Cluster, Error> {
        let name = scope.name();
        let eks = &*self.scope.clients.eks;
        let cancel = &self.scope.cancel;
        let polled = name.clone();

        retry::wait_for(cancel, move || {
            let name = polled.clone();
            async move {
                let cluster = with_cancel(cancel, eks.describe_cluster(&name)).await?;
                Ok(!matches!(
                    cluster.status,
                    ClusterStatus::Creating | ClusterStatus::Updating
                ))
            }
        })
        .await
        .context(WaitClusterSnafu { name: &name })?;

        info!(name, "EKS control plane is now available");
        let cluster = self.describe_cluster(&name).await?.context(NotReadySnafu {
            what: format!("eks cluster {name}"),
        })?;
        set_status(scope, &cluster)?;
        scope.patch_object().await?;
        Ok(cluster)
    }

    /// Moves the cluster at most one minor version towards the declared one.
    async fn reconcile_cluster_version(
        &self,
        scope: &ManagedControlPlaneScope,
        cluster: &sdk::Cluster,
    ) -> Result<(), Error> {
        let (Some(desired), Some(observed)) = (
            scope.control_plane.spec.version.as_deref(),
            cluster.version.as_deref(),
        ) else {
            return Ok(());
        };
        let desired: GenericVersion = desired.parse().context(InvalidVersionSnafu)?;
        let observed: GenericVersion = observed.parse().context(InvalidVersionSnafu)?;
        if observed >= desired {
            return Ok(());
        }

        let input = UpdateClusterVersionInput {
            name: cluster.name.clone(),
            version: observed
                .next_minor()
                .context(InvalidVersionSnafu)?
                .major_minor(),
        };
        info!(name = %cluster.name, from = %observed, to = %input.version, "Upgrading EKS control plane");

        let eks = &*self.scope.clients.eks;
        let cancel = &self.scope.cancel;
        let res = retry::wait_for(cancel, move || {
            let input = input.clone();
            async move {
                with_cancel(cancel, eks.update_cluster_version(input)).await?;
                Ok(true)
            }
        })
        .await;

        if let Err(e) = res {
            scope
                .record(EventRecord::warning(
                    "FailedUpdateEKSControlPlane",
                    format!("failed to update the EKS control plane: {e}"),
                ))
                .await;
            return Err(e).context(UpdateClusterVersionSnafu { name: &cluster.name });
        }
        Ok(())
    }

    /// Converges logging and endpoint access with a single update call.
    async fn reconcile_cluster_config(
        &self,
        scope: &ManagedControlPlaneScope,
        cluster: &sdk::Cluster,
    ) -> Result<(), Error> {
        let spec = &scope.control_plane.spec;
        let input = UpdateClusterConfigInput {
            name: cluster.name.clone(),
            logging: reconcile_logging(&spec.logging, cluster.logging.as_ref()),
            resources_vpc_config: reconcile_vpc_config(
                scope.subnets(),
                &spec.endpoint_access,
                cluster.resources_vpc_config.as_ref(),
            )?,
        };
        if input.logging.is_none() && input.resources_vpc_config.is_none() {
            return Ok(());
        }
        input
            .validate()
            .context(InvalidUpdateConfigSnafu { name: &cluster.name })?;

        info!(name = %cluster.name, "Updating EKS control plane config");
        let eks = &*self.scope.clients.eks;
        let cancel = &self.scope.cancel;
        let res = retry::wait_for(cancel, move || {
            let input = input.clone();
            async move {
                with_cancel(cancel, eks.update_cluster_config(input)).await?;
                Ok(true)
            }
        })
        .await;

        if let Err(e) = res {
            scope
                .record(EventRecord::warning(
                    "FailedUpdateEKSControlPlane",
                    format!("failed to update the EKS control plane: {e}"),
                ))
                .await;
            return Err(e).context(UpdateClusterConfigSnafu { name: &cluster.name });
        }
        Ok(())
    }

    pub(super) async fn delete_cluster(&self, scope: &ManagedControlPlaneScope) -> Result<(), Error> {
        let name = scope.name();
        let Some(cluster) = self.describe_cluster(&name).await? else {
            info!(name, "eks cluster does not exist");
            scope
                .record(EventRecord::warning(
                    "NoEKSClusterFound",
                    format!("Unable to find EKS cluster {name}, nothing to delete"),
                ))
                .await;
            return Ok(());
        };

        match self.delete_cluster_and_wait(&cluster).await {
            Ok(()) => {
                scope
                    .record(EventRecord::normal(
                        "SuccessfulDeleteEKSCluster",
                        format!("Deleted EKS Cluster {}", cluster.name),
                    ))
                    .await;
                Ok(())
            }
            Err(e) => {
                if !e.is_not_ready() {
                    scope
                        .record(EventRecord::warning(
                            "FailedDeleteEKSCluster",
                            format!("Failed to delete EKS cluster {}: {e}", cluster.name),
                        ))
                        .await;
                }
                Err(e)
            }
        }
    }

    async fn delete_cluster_and_wait(&self, cluster: &sdk::Cluster) -> Result<(), Error> {
        let name = cluster.name.as_str();
        info!(name, "Deleting EKS cluster");

        let eks = &*self.scope.clients.eks;
        let cancel = &self.scope.cancel;
        match with_cancel(cancel, eks.delete_cluster(name)).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e).context(DeleteClusterSnafu { name }),
        }

        retry::wait_for(cancel, move || async move {
            match with_cancel(cancel, eks.describe_cluster(name)).await {
                Ok(_) => Ok(false),
                Err(e) if e.is_not_found() => Ok(true),
                Err(e) => Err(e),
            }
        })
        .await
        .context(WaitClusterSnafu { name })
    }
}

fn set_status(scope: &mut ManagedControlPlaneScope, cluster: &sdk::Cluster) -> Result<(), Error> {
    let status = scope.control_plane.status_mut();
    match &cluster.status {
        ClusterStatus::Deleting => {
            status.initialized = false;
            status.ready = false;
        }
        ClusterStatus::Failed => {
            status.initialized = true;
            status.ready = false;
            status.failure_message =
                Some(format!("EKS cluster in unexpected {} state", cluster.status));
        }
        ClusterStatus::Active => {
            status.initialized = true;
            status.ready = true;
            status.failure_message = None;
        }
        ClusterStatus::Creating => {
            status.initialized = false;
            status.ready = false;
        }
        ClusterStatus::Updating => {
            status.initialized = true;
            status.ready = true;
        }
        ClusterStatus::Unknown(raw) => {
            return UnexpectedClusterStatusSnafu {
                name: &cluster.name,
                status: raw,
            }
            .fail();
        }
    }
    Ok(())
}

/// VPC config for a new cluster. Needs two subnets in two distinct zones.
pub fn make_vpc_config(
    subnets: &[SubnetSpec],
    endpoint_access: &EndpointAccess,
) -> Result<VpcConfigRequest, Error> {
    ensure!(
        subnets.len() >= 2,
        FailedDependencySnafu {
            message: "at least 2 subnets is required",
        }
    );
    ensure!(
        unique_zones(subnets).len() >= 2,
        FailedDependencySnafu {
            message: "subnets in at least 2 different az's are required",
        }
    );

    let public_access_cidrs = endpoint_access
        .public_cidrs
        .iter()
        .map(|c| cidr::normalize(c))
        .collect::<Result<Vec<_>, _>>()
        .context(InvalidCidrSnafu)?;

    Ok(VpcConfigRequest {
        subnet_ids: subnets.iter().map(|s| s.id.clone()).collect(),
        endpoint_public_access: endpoint_access.public,
        endpoint_private_access: endpoint_access.private,
        public_access_cidrs,
    })
}

/// Splits the declared log types into one enabled and one disabled setup.
pub fn make_eks_logging(logging: &BTreeMap<String, bool>) -> Option<Logging> {
    let (enabled, disabled): (Vec<_>, Vec<_>) = logging.iter().partition(|(_, on)| **on);
    let setup = |enabled: bool, types: Vec<(&String, &bool)>| {
        (!types.is_empty()).then(|| LogSetup {
            enabled,
            types: types.into_iter().map(|(t, _)| t.clone()).collect(),
        })
    };

    let cluster_logging: Vec<LogSetup> = [setup(true, enabled), setup(false, disabled)]
        .into_iter()
        .flatten()
        .collect();
    (!cluster_logging.is_empty()).then_some(Logging { cluster_logging })
}

fn make_encryption_configs(config: Option<&EncryptionConfig>) -> Vec<sdk::EncryptionConfig> {
    config
        .map(|c| sdk::EncryptionConfig {
            provider_key_arn: c.provider.clone(),
            resources: c.resources.clone(),
        })
        .into_iter()
        .collect()
}

/// The full declared logging config when any observed log type disagrees with it.
pub fn reconcile_logging(
    desired: &BTreeMap<String, bool>,
    observed: Option<&Logging>,
) -> Option<Logging> {
    let drifted = observed.is_some_and(|logging| {
        logging.cluster_logging.iter().any(|setup| {
            setup
                .types
                .iter()
                .any(|t| desired.get(t).is_some_and(|on| *on != setup.enabled))
        })
    });
    if drifted {
        make_eks_logging(desired)
    } else {
        None
    }
}

/// Endpoint access changes, compared with the defaults EKS applies when a
/// value is omitted.
pub fn reconcile_vpc_config(
    subnets: &[SubnetSpec],
    endpoint_access: &EndpointAccess,
    observed: Option<&VpcConfigResponse>,
) -> Result<Option<VpcConfigRequest>, Error> {
    let desired = make_vpc_config(subnets, endpoint_access)?;
    let observed = observed.cloned().unwrap_or_default();

    let needs_update = !equal_with_default(
        false,
        observed.endpoint_private_access,
        desired.endpoint_private_access,
    ) || !equal_with_default(
        true,
        observed.endpoint_public_access,
        desired.endpoint_public_access,
    ) || !public_access_cidrs_equal(&observed.public_access_cidrs, &desired.public_access_cidrs);

    Ok(needs_update.then(|| VpcConfigRequest {
        subnet_ids: Vec::new(),
        ..desired
    }))
}

fn equal_with_default(default: bool, a: Option<bool>, b: Option<bool>) -> bool {
    a.unwrap_or(default) == b.unwrap_or(default)
}

/// An empty list means unrestricted access.
pub fn public_access_cidrs_equal(a: &[String], b: &[String]) -> bool {
    let as_set = |cidrs: &[String]| -> BTreeSet<String> {
        if cidrs.is_empty() {
            BTreeSet::from([ALL_IPV4.to_string()])
        } else {
            cidrs.iter().cloned().collect()
        }
    };
    as_set(a) == as_set(b)
}
