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

use snafu::{OptionExt, ResultExt};
use tracing::debug;

use super::Service;
use crate::cloud::ec2::Filter;
use crate::cloud::eks::Cluster;
use crate::cloud::with_cancel;
use crate::scope::ManagedControlPlaneScope;
use crate::services::{DescribeSecurityGroupsSnafu, Error, NoSecurityGroupSnafu};
use crate::types::v1alpha1::network::SecurityGroup;

/// EKS tags the security group it creates with the owning cluster name.
const EKS_CLUSTER_NAME_TAG_FILTER: &str = "tag:aws:eks:cluster-name";

impl Service {
    /// Records the security group EKS created for the cluster.
    pub(super) async fn reconcile_security_group(
        &self,
        scope: &mut ManagedControlPlaneScope,
        cluster: &Cluster,
    ) -> Result<(), Error> {
        let name = cluster.name.as_str();
        let filters = vec![Filter::new(EKS_CLUSTER_NAME_TAG_FILTER, &[name])];

        let ec2 = &self.scope.clients.ec2;
        let groups = with_cancel(&self.scope.cancel, ec2.describe_security_groups(filters))
            .await
            .context(DescribeSecurityGroupsSnafu { name })?;
        let sg = groups
            .into_iter()
            .next()
            .context(NoSecurityGroupSnafu { name })?;

        debug!(name, id = %sg.group_id, "found EKS cluster security group");
        scope.control_plane.status_mut().security_group = Some(SecurityGroup {
            id: sg.group_id,
            name: sg.group_name,
            tags: sg.tags,
        });
        Ok(())
    }
}
