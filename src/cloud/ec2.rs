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

#[cfg(test)]
use mockall::automock;

use super::Result;
use crate::types::v1alpha1::tags::Tags;

pub const RESOURCE_TYPE_LAUNCH_TEMPLATE: &str = "launch-template";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BlockDevice {
    pub device_name: String,
    pub encrypted: Option<bool>,
    pub volume_size: Option<i64>,
    pub volume_type: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct InstanceNetworkInterface {
    pub device_index: Option<i64>,
    pub groups: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LaunchTemplateData {
    pub image_id: Option<String>,
    pub instance_type: Option<String>,
    pub key_name: Option<String>,
    /// Base64 encoded.
    pub user_data: Option<String>,
    pub iam_instance_profile_name: Option<String>,
    pub iam_instance_profile_arn: Option<String>,
    pub security_group_ids: Vec<String>,
    pub block_device_mappings: Vec<BlockDevice>,
    pub network_interfaces: Vec<InstanceNetworkInterface>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LaunchTemplateVersion {
    pub launch_template_id: String,
    pub launch_template_name: String,
    pub version_number: i64,
    pub data: LaunchTemplateData,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LaunchTemplate {
    pub launch_template_id: String,
    pub launch_template_name: String,
    pub latest_version_number: i64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TagSpecification {
    pub resource_type: String,
    pub tags: Tags,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CreateLaunchTemplateInput {
    pub launch_template_name: String,
    pub data: LaunchTemplateData,
    pub tag_specifications: Vec<TagSpecification>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CreateLaunchTemplateVersionInput {
    pub launch_template_id: String,
    pub data: LaunchTemplateData,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    pub name: String,
    pub values: Vec<String>,
}

impl Filter {
    pub fn new(name: impl Into<String>, values: &[&str]) -> Self {
        Self {
            name: name.into(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Ec2SecurityGroup {
    pub group_id: String,
    pub group_name: String,
    pub tags: Tags,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Ec2Api: Send + Sync {
    /// Latest version first. Fails with
    /// `InvalidLaunchTemplateName.NotFoundException` when no template has the name.
    async fn describe_launch_template_versions(
        &self,
        launch_template_name: &str,
    ) -> Result<Vec<LaunchTemplateVersion>>;

    async fn create_launch_template(
        &self,
        input: CreateLaunchTemplateInput,
    ) -> Result<LaunchTemplate>;

    async fn create_launch_template_version(
        &self,
        input: CreateLaunchTemplateVersionInput,
    ) -> Result<LaunchTemplateVersion>;

    async fn delete_launch_template(&self, launch_template_id: &str) -> Result<()>;

    async fn describe_security_groups(&self, filters: Vec<Filter>)
    -> Result<Vec<Ec2SecurityGroup>>;
}
