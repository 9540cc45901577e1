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
use snafu::ResultExt;
use tracing::{debug, info};

use super::{
    CreateLaunchTemplateSnafu, CreateLaunchTemplateVersionSnafu, DeleteLaunchTemplateSnafu,
    DescribeLaunchTemplateSnafu, Ec2MachineInterface, Error,
};
use crate::cloud::ec2::{CreateLaunchTemplateInput, CreateLaunchTemplateVersionInput};
use crate::cloud::with_cancel;
use crate::scope::{ClusterScope, MachinePoolScope};
use crate::types::v1alpha1::launch_template::AWSLaunchTemplate;

pub mod launch_template;

/// EC2 launch template service.
pub struct Service {
    scope: ClusterScope,
}

impl Service {
    pub fn new(scope: ClusterScope) -> Self {
        Self { scope }
    }
}

#[async_trait]
impl Ec2MachineInterface for Service {
    async fn get_launch_template(&self, name: &str) -> Result<Option<AWSLaunchTemplate>, Error> {
        let ec2 = &self.scope.clients.ec2;
        let versions =
            match with_cancel(&self.scope.cancel, ec2.describe_launch_template_versions(name)).await {
                Ok(versions) => versions,
                Err(e) if e.is_not_found() => {
                    debug!(name, "launch template not found");
                    return Ok(None);
                }
                Err(e) => return Err(e).context(DescribeLaunchTemplateSnafu { name }),
            };

        Ok(versions.into_iter().next().map(launch_template::from_version))
    }

    async fn create_launch_template(
        &self,
        scope: &MachinePoolScope,
        user_data: &[u8],
    ) -> Result<String, Error> {
        let name = scope.name();
        let input = CreateLaunchTemplateInput {
            launch_template_name: name.clone(),
            data: launch_template::template_data(scope, user_data)?,
            tag_specifications: launch_template::tag_specifications(scope),
        };

        let ec2 = &self.scope.clients.ec2;
        let created = with_cancel(&self.scope.cancel, ec2.create_launch_template(input))
            .await
            .context(CreateLaunchTemplateSnafu { name: &name })?;

        info!(name, id = %created.launch_template_id, "created launch template");
        Ok(created.launch_template_id)
    }

    async fn create_launch_template_version(
        &self,
        scope: &MachinePoolScope,
        id: &str,
        user_data: &[u8],
    ) -> Result<(), Error> {
        let input = CreateLaunchTemplateVersionInput {
            launch_template_id: id.to_string(),
            data: launch_template::template_data(scope, user_data)?,
        };

        let ec2 = &self.scope.clients.ec2;
        let version = with_cancel(&self.scope.cancel, ec2.create_launch_template_version(input))
            .await
            .context(CreateLaunchTemplateVersionSnafu { id })?;

        info!(id, version = version.version_number, "created launch template version");
        Ok(())
    }

    async fn delete_launch_template(&self, id: &str) -> Result<(), Error> {
        let ec2 = &self.scope.clients.ec2;
        match with_cancel(&self.scope.cancel, ec2.delete_launch_template(id)).await {
            Ok(()) => {
                info!(id, "deleted launch template");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!(id, "launch template already deleted");
                Ok(())
            }
            Err(e) => Err(e).context(DeleteLaunchTemplateSnafu { id }),
        }
    }
}
