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
use crate::types::v1alpha1::autoscaling::InstancesDistribution;
use crate::types::v1alpha1::tags::Tags;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LaunchTemplateSpecification {
    pub launch_template_id: Option<String>,
    pub launch_template_name: Option<String>,
    /// `$Latest` unless pinned.
    pub version: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MixedInstancesPolicy {
    pub launch_template: LaunchTemplateSpecification,
    /// Instance type overrides.
    pub overrides: Vec<String>,
    pub instances_distribution: Option<InstancesDistribution>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Instance {
    pub instance_id: String,
    pub availability_zone: String,
    pub lifecycle_state: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Group {
    pub auto_scaling_group_arn: String,
    pub auto_scaling_group_name: String,
    pub min_size: i32,
    pub max_size: i32,
    pub desired_capacity: i32,
    /// Comma-separated subnet ids.
    pub vpc_zone_identifier: String,
    /// `Delete in progress` while the group is being torn down.
    pub status: Option<String>,
    pub launch_template: Option<LaunchTemplateSpecification>,
    pub mixed_instances_policy: Option<MixedInstancesPolicy>,
    pub instances: Vec<Instance>,
    pub tags: Tags,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CreateAutoScalingGroupInput {
    pub auto_scaling_group_name: String,
    pub min_size: i32,
    pub max_size: i32,
    pub desired_capacity: Option<i32>,
    pub vpc_zone_identifier: String,
    pub availability_zones: Vec<String>,
    pub launch_template: Option<LaunchTemplateSpecification>,
    pub mixed_instances_policy: Option<MixedInstancesPolicy>,
    pub tags: Tags,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateAutoScalingGroupInput {
    pub auto_scaling_group_name: String,
    pub min_size: Option<i32>,
    pub max_size: Option<i32>,
    pub desired_capacity: Option<i32>,
    pub mixed_instances_policy: Option<MixedInstancesPolicy>,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait AutoScalingApi: Send + Sync {
    /// Unknown names are omitted from the result, not reported as errors.
    async fn describe_auto_scaling_groups(&self, names: Vec<String>) -> Result<Vec<Group>>;

    async fn create_auto_scaling_group(&self, input: CreateAutoScalingGroupInput) -> Result<()>;

    async fn update_auto_scaling_group(&self, input: UpdateAutoScalingGroupInput) -> Result<()>;

    async fn delete_auto_scaling_group(&self, name: &str, force_delete: bool) -> Result<()>;
}
