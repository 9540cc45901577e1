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
use tracing::{debug, info};

use super::{ControlPlaneInterface, Error};
use crate::scope::{ClusterScope, ManagedControlPlaneScope};
use crate::types::v1alpha1::condition::{
    self, ConditionSeverity, SECURITY_GROUPS_READY_CONDITION,
    SECURITY_GROUPS_RECONCILIATION_FAILED_REASON,
};

pub mod cluster;
mod kubeconfig;
mod security_group;
mod tags;

/// EKS control plane service.
pub struct Service {
    scope: ClusterScope,
}

impl Service {
    pub fn new(scope: ClusterScope) -> Self {
        Self { scope }
    }
}

#[async_trait]
impl ControlPlaneInterface for Service {
    async fn reconcile_control_plane(
        &self,
        scope: &mut ManagedControlPlaneScope,
    ) -> Result<(), Error> {
        debug!("Reconciling EKS control plane");

        let Some(cluster) = self.reconcile_cluster(scope).await? else {
            return Ok(());
        };

        if let Err(e) = self.reconcile_security_group(scope, &cluster).await {
            condition::mark_false(
                &mut scope.control_plane,
                SECURITY_GROUPS_READY_CONDITION,
                SECURITY_GROUPS_RECONCILIATION_FAILED_REASON,
                ConditionSeverity::Warning,
                e.to_string(),
            );
            return Err(e);
        }
        condition::mark_true(&mut scope.control_plane, SECURITY_GROUPS_READY_CONDITION);

        self.reconcile_tags(scope, &cluster).await?;

        debug!("Reconcile EKS control plane completed successfully");
        Ok(())
    }

    async fn delete_control_plane(
        &self,
        scope: &mut ManagedControlPlaneScope,
    ) -> Result<(), Error> {
        info!("Deleting EKS control plane");
        self.delete_cluster(scope).await
    }
}
