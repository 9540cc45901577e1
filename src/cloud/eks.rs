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
use snafu::{Snafu, ensure};
use strum::{AsRefStr, Display, EnumString};

#[cfg(test)]
use mockall::automock;

use super::Result;
use crate::types::v1alpha1::tags::Tags;

/// Status of a managed cluster as reported by EKS.
#[derive(Clone, Debug, PartialEq, Eq, EnumString, Display, AsRefStr)]
#[strum(ascii_case_insensitive)]
pub enum ClusterStatus {
    #[strum(serialize = "CREATING")]
    Creating,

    #[strum(serialize = "ACTIVE")]
    Active,

    #[strum(serialize = "UPDATING")]
    Updating,

    #[strum(serialize = "DELETING")]
    Deleting,

    #[strum(serialize = "FAILED")]
    Failed,

    #[strum(default, transparent)]
    Unknown(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct LogSetup {
    pub enabled: bool,
    pub types: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Logging {
    pub cluster_logging: Vec<LogSetup>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct VpcConfigRequest {
    pub subnet_ids: Vec<String>,
    pub endpoint_public_access: Option<bool>,
    pub endpoint_private_access: Option<bool>,
    pub public_access_cidrs: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct VpcConfigResponse {
    pub vpc_id: Option<String>,
    pub subnet_ids: Vec<String>,
    pub cluster_security_group_id: Option<String>,
    pub endpoint_public_access: Option<bool>,
    pub endpoint_private_access: Option<bool>,
    pub public_access_cidrs: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct EncryptionConfig {
    pub provider_key_arn: Option<String>,
    pub resources: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Cluster {
    pub name: String,
    pub arn: String,
    pub status: ClusterStatus,
    pub version: Option<String>,
    pub endpoint: Option<String>,
    /// Base64 encoded CA bundle.
    pub certificate_authority_data: Option<String>,
    pub resources_vpc_config: Option<VpcConfigResponse>,
    pub logging: Option<Logging>,
    pub tags: Tags,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CreateClusterInput {
    pub name: String,
    pub version: Option<String>,
    pub role_arn: String,
    pub logging: Option<Logging>,
    pub encryption_config: Vec<EncryptionConfig>,
    pub resources_vpc_config: VpcConfigRequest,
    pub tags: Tags,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateClusterVersionInput {
    pub name: String,
    pub version: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateClusterConfigInput {
    pub name: String,
    pub logging: Option<Logging>,
    pub resources_vpc_config: Option<VpcConfigRequest>,
}

#[derive(Snafu, Debug, PartialEq)]
#[snafu(display("invalid UpdateClusterConfig request: {reason}"))]
pub struct InvalidRequest {
    reason: &'static str,
}

impl UpdateClusterConfigInput {
    /// Rejects requests EKS would refuse.
    pub fn validate(&self) -> Result<(), InvalidRequest> {
        ensure!(
            !self.name.is_empty(),
            InvalidRequestSnafu {
                reason: "cluster name is required"
            }
        );
        ensure!(
            self.logging.is_some() || self.resources_vpc_config.is_some(),
            InvalidRequestSnafu {
                reason: "no changes requested"
            }
        );
        if let Some(vpc) = &self.resources_vpc_config {
            ensure!(
                vpc.endpoint_public_access != Some(false) || vpc.endpoint_private_access == Some(true),
                InvalidRequestSnafu {
                    reason: "public and private endpoint access cannot both be disabled"
                }
            );
            ensure!(
                vpc.endpoint_public_access != Some(false) || vpc.public_access_cidrs.is_empty(),
                InvalidRequestSnafu {
                    reason: "public access CIDRs require public endpoint access"
                }
            );
        }
        if let Some(logging) = &self.logging {
            ensure!(
                logging.cluster_logging.iter().all(|setup| !setup.types.is_empty()),
                InvalidRequestSnafu {
                    reason: "log setups must name at least one log type"
                }
            );
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Update {
    pub id: String,
    pub status: String,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait EksApi: Send + Sync {
    /// Fails with `ResourceNotFoundException` when the cluster does not exist.
    async fn describe_cluster(&self, name: &str) -> Result<Cluster>;

    async fn create_cluster(&self, input: CreateClusterInput) -> Result<Cluster>;

    async fn delete_cluster(&self, name: &str) -> Result<Cluster>;

    async fn update_cluster_version(&self, input: UpdateClusterVersionInput) -> Result<Update>;

    async fn update_cluster_config(&self, input: UpdateClusterConfigInput) -> Result<Update>;

    async fn tag_resource(&self, resource_arn: &str, tags: Tags) -> Result<()>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_status_parsing() {
        assert_eq!(ClusterStatus::from("ACTIVE"), ClusterStatus::Active);
        assert_eq!(ClusterStatus::from("creating"), ClusterStatus::Creating);
        assert_eq!(
            ClusterStatus::from("PENDING"),
            ClusterStatus::Unknown("PENDING".to_string())
        );
        assert_eq!(ClusterStatus::from("PENDING").to_string(), "PENDING");
        assert_eq!(ClusterStatus::Failed.to_string(), "FAILED");
        assert_eq!(ClusterStatus::Updating.as_ref(), "UPDATING");
    }

    #[test]
    fn test_update_config_validation() {
        let vpc = |public: Option<bool>, private: Option<bool>, cidrs: &[&str]| UpdateClusterConfigInput {
            name: "cluster".to_string(),
            logging: None,
            resources_vpc_config: Some(VpcConfigRequest {
                endpoint_public_access: public,
                endpoint_private_access: private,
                public_access_cidrs: cidrs.iter().map(|c| c.to_string()).collect(),
                ..Default::default()
            }),
        };

        assert!(vpc(Some(true), Some(false), &["10.0.0.0/8"]).validate().is_ok());
        assert!(vpc(None, None, &[]).validate().is_ok());
        assert!(vpc(Some(false), Some(true), &[]).validate().is_ok());
        assert!(vpc(Some(false), Some(false), &[]).validate().is_err());
        assert!(vpc(Some(false), Some(true), &["10.0.0.0/8"]).validate().is_err());

        let empty = UpdateClusterConfigInput {
            name: "cluster".to_string(),
            ..Default::default()
        };
        assert!(empty.validate().is_err());
    }
}
