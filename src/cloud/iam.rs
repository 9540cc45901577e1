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

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Role {
    pub role_name: String,
    pub arn: String,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait IamApi: Send + Sync {
    /// Fails with `NoSuchEntity` when the role does not exist.
    async fn get_role(&self, role_name: &str) -> Result<Role>;
}
