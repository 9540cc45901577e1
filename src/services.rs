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

use async_trait::async_trait;
use snafu::Snafu;

#[cfg(test)]
use mockall::automock;

use crate::cloud::eks::InvalidRequest;
use crate::scope::{ClusterScope, MachinePoolScope, ManagedControlPlaneScope, ProviderId};
use crate::types::v1alpha1::autoscaling::AutoScalingGroup;
use crate::types::v1alpha1::launch_template::AWSLaunchTemplate;
use crate::utils::cidr;
use crate::{cloud, context, retry, scope, types};

pub mod autoscaling;
pub mod ec2;
pub mod eks;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("failed to describe launch template {name}: {source}"))]
    DescribeLaunchTemplate { name: String, source: cloud::Error },

    #[snafu(display("failed to create launch template {name}: {source}"))]
    CreateLaunchTemplate { name: String, source: cloud::Error },

    #[snafu(display("failed to create new version of launch template {id}: {source}"))]
    CreateLaunchTemplateVersion { id: String, source: cloud::Error },

    #[snafu(display("failed to delete launch template {id}: {source}"))]
    DeleteLaunchTemplate { id: String, source: cloud::Error },

    #[snafu(display("launch template for {name} has no AMI id"))]
    MissingAmi { name: String },

    #[snafu(display("failed to describe autoscaling group {name}: {source}"))]
    DescribeAsg { name: String, source: cloud::Error },

    #[snafu(display("failed to create autoscaling group {name}: {source}"))]
    CreateAsg { name: String, source: cloud::Error },

    #[snafu(display("failed waiting for autoscaling group {name}: {source}"))]
    WaitAsg { name: String, source: retry::Error },

    #[snafu(display("failed to update autoscaling group {name}: {source}"))]
    UpdateAsg { name: String, source: cloud::Error },

    #[snafu(display("failed to delete autoscaling group {name}: {source}"))]
    DeleteAsg { name: String, source: cloud::Error },

    #[snafu(display("failed to describe eks cluster {name}: {source}"))]
    DescribeCluster { name: String, source: cloud::Error },

    #[snafu(display("failed to create eks cluster {name}: {source}"))]
    CreateCluster { name: String, source: retry::Error },

    #[snafu(display("failed to delete eks cluster {name}: {source}"))]
    DeleteCluster { name: String, source: cloud::Error },

    #[snafu(display("failed waiting for eks cluster {name}: {source}"))]
    WaitCluster { name: String, source: retry::Error },

    #[snafu(display("failed to update eks cluster {name} version: {source}"))]
    UpdateClusterVersion { name: String, source: retry::Error },

    #[snafu(display("failed to update eks cluster {name} config: {source}"))]
    UpdateClusterConfig { name: String, source: retry::Error },

    #[snafu(display("eks cluster {name}: {source}"))]
    InvalidUpdateConfig { name: String, source: InvalidRequest },

    #[snafu(display("failed to get IAM role {role}: {source}"))]
    GetRole { role: String, source: cloud::Error },

    #[snafu(display("failed to tag eks cluster {name}: {source}"))]
    TagCluster { name: String, source: cloud::Error },

    #[snafu(display("failed to describe security groups for {name}: {source}"))]
    DescribeSecurityGroups { name: String, source: cloud::Error },

    #[snafu(display("no security group found for eks cluster {name}"))]
    NoSecurityGroup { name: String },

    #[snafu(display("failed to reconcile kubeconfig secret {name}: {source}"))]
    Kubeconfig { name: String, source: context::Error },

    #[snafu(display("failed to render kubeconfig for {name}: {source}"))]
    RenderKubeconfig {
        name: String,
        source: serde_yaml_ng::Error,
    },

    #[snafu(display("{message}"))]
    FailedDependency { message: String },

    #[snafu(display("eks cluster {name} in unexpected status {status:?}"))]
    UnexpectedClusterStatus { name: String, status: String },

    #[snafu(display("{what} is not ready yet"))]
    NotReady { what: String },

    #[snafu(display("invalid kubernetes version: {source}"))]
    InvalidVersion { source: types::error::Error },

    #[snafu(display("invalid public access CIDR: {source}"))]
    InvalidCidr { source: cidr::Error },

    #[snafu(transparent)]
    Scope { source: scope::Error },
}

impl Error {
    /// Errors that retrying with the same input cannot fix.
    pub fn is_permanent(&self) -> bool {
        match self {
            Error::FailedDependency { .. }
            | Error::InvalidVersion { .. }
            | Error::InvalidCidr { .. }
            | Error::InvalidUpdateConfig { .. }
            | Error::MissingAmi { .. } => true,
            Error::Scope { source } => source.is_validation(),
            _ => false,
        }
    }

    /// Something the controller is waiting on; requeue instead of failing.
    pub fn is_not_ready(&self) -> bool {
        match self {
            Error::NotReady { .. } | Error::NoSecurityGroup { .. } => true,
            Error::WaitAsg { source, .. } | Error::WaitCluster { source, .. } => {
                source.is_timeout()
            }
            _ => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::DescribeLaunchTemplate { source, .. }
            | Error::CreateLaunchTemplate { source, .. }
            | Error::CreateLaunchTemplateVersion { source, .. }
            | Error::DeleteLaunchTemplate { source, .. }
            | Error::DescribeAsg { source, .. }
            | Error::CreateAsg { source, .. }
            | Error::UpdateAsg { source, .. }
            | Error::DeleteAsg { source, .. }
            | Error::DescribeCluster { source, .. }
            | Error::DeleteCluster { source, .. }
            | Error::TagCluster { source, .. }
            | Error::DescribeSecurityGroups { source, .. }
            | Error::GetRole { source, .. } => source.is_cancelled(),
            Error::WaitAsg { source, .. }
            | Error::CreateCluster { source, .. }
            | Error::WaitCluster { source, .. }
            | Error::UpdateClusterVersion { source, .. }
            | Error::UpdateClusterConfig { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    pub fn is_unexpected_state(&self) -> bool {
        matches!(self, Error::UnexpectedClusterStatus { .. })
    }
}

/// Launch template convergence for a machine pool.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Ec2MachineInterface: Send + Sync {
    /// `None` when no template has the name.
    async fn get_launch_template(&self, name: &str) -> Result<Option<AWSLaunchTemplate>, Error>;

    /// Returns the new template id.
    async fn create_launch_template(
        &self,
        scope: &MachinePoolScope,
        user_data: &[u8],
    ) -> Result<String, Error>;

    async fn create_launch_template_version(
        &self,
        scope: &MachinePoolScope,
        id: &str,
        user_data: &[u8],
    ) -> Result<(), Error>;

    /// A template that is already gone counts as deleted.
    async fn delete_launch_template(&self, id: &str) -> Result<(), Error>;
}

/// Autoscaling group convergence for a machine pool.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AsgInterface: Send + Sync {
    async fn find_by_provider_id(
        &self,
        provider_id: &ProviderId,
    ) -> Result<Option<AutoScalingGroup>, Error>;

    async fn find_by_name(&self, name: &str) -> Result<Option<AutoScalingGroup>, Error>;

    /// Only valid once the pool's launch template exists.
    async fn create_asg(&self, scope: &MachinePoolScope) -> Result<AutoScalingGroup, Error>;

    async fn update_asg(&self, scope: &MachinePoolScope) -> Result<(), Error>;

    async fn delete_asg_and_wait(&self, name: &str) -> Result<(), Error>;
}

/// EKS control plane convergence.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ControlPlaneInterface: Send + Sync {
    async fn reconcile_control_plane(
        &self,
        scope: &mut ManagedControlPlaneScope,
    ) -> Result<(), Error>;

    async fn delete_control_plane(&self, scope: &mut ManagedControlPlaneScope)
    -> Result<(), Error>;
}

pub type Ec2Factory = Box<dyn Fn(&ClusterScope) -> Arc<dyn Ec2MachineInterface> + Send + Sync>;
pub type AsgFactory = Box<dyn Fn(&ClusterScope) -> Arc<dyn AsgInterface> + Send + Sync>;
pub type ControlPlaneFactory =
    Box<dyn Fn(&ClusterScope) -> Arc<dyn ControlPlaneInterface> + Send + Sync>;

/// Builds the convergence services for one reconcile.
pub struct ServiceFactories {
    pub ec2: Ec2Factory,
    pub asg: AsgFactory,
    pub control_plane: ControlPlaneFactory,
}

impl Default for ServiceFactories {
    fn default() -> Self {
        Self {
            ec2: Box::new(|scope| Arc::new(ec2::Service::new(scope.clone()))),
            asg: Box::new(|scope| Arc::new(autoscaling::Service::new(scope.clone()))),
            control_plane: Box::new(|scope| Arc::new(eks::Service::new(scope.clone()))),
        }
    }
}
