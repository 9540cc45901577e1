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

//! Translation between the declared launch template and EC2 requests.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use snafu::OptionExt;

use crate::cloud::ec2::{
    BlockDevice, InstanceNetworkInterface, LaunchTemplateData, LaunchTemplateVersion,
    RESOURCE_TYPE_LAUNCH_TEMPLATE, TagSpecification,
};
use crate::scope::MachinePoolScope;
use crate::services::{Error, MissingAmiSnafu};
use crate::types::v1alpha1::launch_template::{
    AWSLaunchTemplate, BlockDeviceMapping, Ebs, NetworkInterface,
};
use crate::types::v1alpha1::network::AWSResourceReference;
use crate::types::v1alpha1::tags::{self, BuildParams, ResourceLifecycle};

const ROOT_DEVICE_NAME: &str = "/dev/xvda";
const NODE_ROLE_TAG_VALUE: &str = "node";

/// Request payload for the pool's launch template.
pub fn template_data(scope: &MachinePoolScope, user_data: &[u8]) -> Result<LaunchTemplateData, Error> {
    let lt = &scope.aws_machine_pool.spec.aws_launch_template;
    let image_id = lt
        .ami
        .id
        .clone()
        .filter(|id| !id.is_empty())
        .context(MissingAmiSnafu { name: scope.name() })?;

    let mut block_device_mappings: Vec<BlockDevice> = lt
        .root_volume
        .iter()
        .map(|root| BlockDevice {
            device_name: ROOT_DEVICE_NAME.to_string(),
            encrypted: Some(root.encrypted),
            volume_size: Some(root.size),
            volume_type: root.type_.clone(),
        })
        .collect();
    block_device_mappings.extend(lt.block_device_mappings.iter().map(|m| BlockDevice {
        device_name: m.device_name.clone(),
        encrypted: Some(m.ebs.encrypted),
        volume_size: m.ebs.volume_size,
        volume_type: m.ebs.volume_type.clone(),
    }));

    Ok(LaunchTemplateData {
        image_id: Some(image_id),
        instance_type: lt.instance_type.clone(),
        key_name: lt.ssh_key_name.clone(),
        user_data: Some(STANDARD.encode(user_data)),
        iam_instance_profile_name: lt.iam_instance_profile.clone(),
        iam_instance_profile_arn: None,
        security_group_ids: security_group_ids(scope),
        block_device_mappings,
        network_interfaces: lt
            .network_interfaces
            .iter()
            .map(|ni| InstanceNetworkInterface {
                device_index: Some(ni.device_index),
                groups: ni.groups.clone(),
            })
            .collect(),
    })
}

/// Core node groups first, then the pool's additional groups, without duplicates.
pub fn security_group_ids(scope: &MachinePoolScope) -> Vec<String> {
    let mut ids = scope.core_security_groups();
    for id in scope
        .aws_machine_pool
        .spec
        .additional_security_groups
        .iter()
        .filter_map(|sg| sg.id.as_ref())
    {
        if !ids.contains(id) {
            ids.push(id.clone());
        }
    }
    ids
}

pub fn tag_specifications(scope: &MachinePoolScope) -> Vec<TagSpecification> {
    let tags = tags::build(&BuildParams {
        cluster_name: scope.cluster_name().to_string(),
        lifecycle: Some(ResourceLifecycle::Owned),
        name: Some(scope.name()),
        role: Some(NODE_ROLE_TAG_VALUE.to_string()),
        additional: scope.additional_tags(),
    });
    vec![TagSpecification {
        resource_type: RESOURCE_TYPE_LAUNCH_TEMPLATE.to_string(),
        tags,
    }]
}

/// Observed launch template from the latest EC2 version.
pub fn from_version(version: LaunchTemplateVersion) -> AWSLaunchTemplate {
    let LaunchTemplateData {
        image_id,
        instance_type,
        key_name,
        iam_instance_profile_name,
        iam_instance_profile_arn,
        block_device_mappings,
        network_interfaces,
        ..
    } = version.data;

    // EC2 may report the profile by ARN only
    let iam_instance_profile = iam_instance_profile_arn
        .as_deref()
        .and_then(|arn| arn.rsplit_once("instance-profile/"))
        .map(|(_, name)| name.to_string())
        .or(iam_instance_profile_name);

    AWSLaunchTemplate {
        id: Some(version.launch_template_id),
        name: Some(version.launch_template_name),
        iam_instance_profile,
        network_interfaces: network_interfaces
            .into_iter()
            .map(|ni| NetworkInterface {
                device_index: ni.device_index.unwrap_or_default(),
                groups: ni.groups,
            })
            .collect(),
        ami: AWSResourceReference {
            id: image_id,
            arn: None,
        },
        instance_type,
        root_volume: None,
        block_device_mappings: block_device_mappings
            .into_iter()
            .map(|bd| BlockDeviceMapping {
                device_name: bd.device_name,
                ebs: Ebs {
                    encrypted: bd.encrypted.unwrap_or_default(),
                    volume_size: bd.volume_size,
                    volume_type: bd.volume_type,
                },
            })
            .collect(),
        ssh_key_name: key_name,
        version_number: Some(version.version_number),
    }
}
