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

use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::tags::Tags;

/// Reference to an AWS resource by id or ARN.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AWSResourceReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubnetSpec {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr_block: Option<String>,

    #[serde(default)]
    pub availability_zone: String,

    #[serde(default)]
    pub is_public: bool,
}

/// Distinct availability zones covered by a set of subnets.
pub fn unique_zones(subnets: &[SubnetSpec]) -> BTreeSet<&str> {
    subnets
        .iter()
        .map(|s| s.availability_zone.as_str())
        .filter(|z| !z.is_empty())
        .collect()
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,

    #[serde(default)]
    pub subnets: Vec<SubnetSpec>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroup {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
}

/// Access to the managed control plane API server.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EndpointAccess {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub public_cidrs: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private: Option<bool>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    #[serde(default)]
    pub resources: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiEndpoint {
    pub host: String,
    pub port: i32,
}

impl ApiEndpoint {
    pub fn is_zero(&self) -> bool {
        self.host.is_empty() && self.port == 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_zones() {
        let subnets = vec![
            SubnetSpec {
                id: "subnet-1".to_string(),
                availability_zone: "us-east-1a".to_string(),
                ..Default::default()
            },
            SubnetSpec {
                id: "subnet-2".to_string(),
                availability_zone: "us-east-1a".to_string(),
                ..Default::default()
            },
            SubnetSpec {
                id: "subnet-3".to_string(),
                ..Default::default()
            },
        ];
        assert_eq!(unique_zones(&subnets).len(), 1);
    }
}
