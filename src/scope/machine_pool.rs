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
use snafu::{OptionExt, ResultExt};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::{ClusterScope, Error, ObjectPatcher, ProviderIdSnafu, provider_id::ProviderId};
use super::{MissingBootstrapDataSnafu, MissingBootstrapKeySnafu, ValidationSnafu};
use crate::cloud::CloudProvider;
use crate::context::{EventRecord, KubeClient};
use crate::types::capi::{AWSCluster, Cluster, MachinePool};
use crate::types::v1alpha1::machine_pool::{AWSMachinePool, MACHINE_POOL_FINALIZER};
use crate::types::v1alpha1::tags::{self, Tags};

const BOOTSTRAP_DATA_KEY: &str = "value";

pub struct MachinePoolScopeParams {
    pub kube: Arc<dyn KubeClient>,
    pub cloud: Arc<dyn CloudProvider>,
    pub cancel: CancellationToken,
    pub cluster: Option<Cluster>,
    pub aws_cluster: Option<AWSCluster>,
    pub machine_pool: Option<MachinePool>,
    pub aws_machine_pool: Option<AWSMachinePool>,
}

/// Everything one `AWSMachinePool` reconcile reads and writes.
pub struct MachinePoolScope {
    pub cluster_scope: ClusterScope,
    pub cluster: Cluster,
    pub aws_cluster: AWSCluster,
    pub machine_pool: MachinePool,
    pub aws_machine_pool: AWSMachinePool,
    kube: Arc<dyn KubeClient>,
    patcher: ObjectPatcher,
}

impl MachinePoolScope {
    pub fn new(params: MachinePoolScopeParams) -> Result<Self, Error> {
        let required = |object| ValidationSnafu {
            scope: "machine pool",
            object,
        };
        let cluster = params.cluster.context(required("Cluster"))?;
        let aws_cluster = params.aws_cluster.context(required("AWSCluster"))?;
        let machine_pool = params.machine_pool.context(required("MachinePool"))?;
        let aws_machine_pool = params
            .aws_machine_pool
            .context(required("AWSMachinePool"))?;

        let region = aws_cluster.spec.region.clone();
        let cluster_scope = ClusterScope {
            name: cluster.name_any(),
            namespace: aws_machine_pool.namespace()?,
            clients: params.cloud.clients(&region),
            region,
            cancel: params.cancel,
        };
        let patcher = ObjectPatcher::new(&aws_machine_pool)?;

        Ok(Self {
            cluster_scope,
            cluster,
            aws_cluster,
            machine_pool,
            aws_machine_pool,
            kube: params.kube,
            patcher,
        })
    }

    /// Name shared by the launch template and the autoscaling group.
    pub fn name(&self) -> String {
        self.aws_machine_pool.name()
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

    /// Cluster-level tags overlaid with the pool's own; the pool wins.
    pub fn additional_tags(&self) -> Tags {
        tags::merge(
            &self.aws_cluster.spec.additional_tags,
            &self.aws_machine_pool.spec.additional_tags,
        )
    }

    /// The recorded provider id. An empty one means none has been assigned yet.
    pub fn provider_id(&self) -> Result<Option<ProviderId>, Error> {
        match self.aws_machine_pool.spec.provider_id.as_deref() {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse::<ProviderId>()
                .map(Some)
                .context(ProviderIdSnafu),
        }
    }

    pub fn set_provider_id(&mut self, provider_id: &ProviderId) {
        self.aws_machine_pool.spec.provider_id = Some(provider_id.to_string());
    }

    pub fn desired_capacity(&self) -> i32 {
        self.aws_machine_pool
            .spec
            .desired_capacity
            .or(self.machine_pool.spec.replicas)
            .unwrap_or(self.aws_machine_pool.spec.min_size)
    }

    /// Declared subnets, or the cluster's private subnets in the pool's zones.
    pub fn subnet_ids(&self) -> Vec<String> {
        let declared: Vec<String> = self
            .aws_machine_pool
            .spec
            .subnets
            .iter()
            .filter_map(|s| s.id.clone())
            .collect();
        if !declared.is_empty() {
            return declared;
        }

        let zones = &self.aws_machine_pool.spec.availability_zones;
        self.aws_cluster
            .spec
            .network_spec
            .subnets
            .iter()
            .filter(|s| !s.is_public)
            .filter(|s| zones.is_empty() || zones.contains(&s.availability_zone))
            .map(|s| s.id.clone())
            .collect()
    }

    pub fn core_security_groups(&self) -> Vec<String> {
        self.aws_cluster.core_node_security_groups()
    }

    pub fn has_bootstrap_data_ref(&self) -> bool {
        self.machine_pool.bootstrap_secret_name().is_some()
    }

    /// Raw (not yet encoded) user data from the bootstrap secret.
    pub async fn get_raw_bootstrap_data(&self) -> Result<Vec<u8>, Error> {
        let namespace = self.namespace().to_string();
        let name = self
            .machine_pool
            .bootstrap_secret_name()
            .unwrap_or_default()
            .to_string();

        let secret = self
            .kube
            .get_secret(&namespace, &name)
            .await?
            .context(MissingBootstrapDataSnafu {
                namespace: namespace.clone(),
                name: name.clone(),
            })?;

        secret
            .data
            .and_then(|mut data| data.remove(BOOTSTRAP_DATA_KEY))
            .map(|bytes| bytes.0)
            .context(MissingBootstrapKeySnafu {
                namespace,
                name,
                key: BOOTSTRAP_DATA_KEY,
            })
    }

    /// Publishes an event against the pool. Failures are logged, not returned.
    pub async fn record(&self, event: EventRecord) {
        let reason = event.reason.clone();
        if let Err(e) = self
            .kube
            .publish(self.aws_machine_pool.object_ref(&()), event)
            .await
        {
            warn!(%reason, error = %e, "failed to publish event");
        }
    }

    pub fn has_finalizer(&self) -> bool {
        self.aws_machine_pool
            .finalizers()
            .iter()
            .any(|f| f == MACHINE_POOL_FINALIZER)
    }

    /// Returns whether the finalizer was missing.
    pub fn add_finalizer(&mut self) -> bool {
        if self.has_finalizer() {
            return false;
        }
        self.aws_machine_pool
            .finalizers_mut()
            .push(MACHINE_POOL_FINALIZER.to_string());
        true
    }

    pub fn remove_finalizer(&mut self) {
        self.aws_machine_pool
            .finalizers_mut()
            .retain(|f| f != MACHINE_POOL_FINALIZER);
    }

    pub async fn patch_object(&mut self) -> Result<(), Error> {
        self.patcher
            .patch(self.kube.as_ref(), &mut self.aws_machine_pool)
            .await
    }

    /// Final persistence point of a reconcile.
    pub async fn close(&mut self) -> Result<(), Error> {
        self.patch_object().await
    }
}
