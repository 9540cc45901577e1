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

use std::collections::BTreeMap;

use strum::Display;

pub type Tags = BTreeMap<String, String>;

pub const NAME_TAG_KEY: &str = "Name";
pub const NAME_AWS_PROVIDER_PREFIX: &str = "sigs.k8s.io/cluster-api-provider-aws/";
pub const NAME_AWS_CLUSTER_API_ROLE: &str = "sigs.k8s.io/cluster-api-provider-aws/role";
pub const NAME_KUBERNETES_AWS_CLOUD_PROVIDER_PREFIX: &str = "kubernetes.io/cluster/";
pub const COMMON_ROLE_TAG_VALUE: &str = "common";

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum ResourceLifecycle {
    Owned,
    Shared,
}

/// `sigs.k8s.io/cluster-api-provider-aws/cluster/<name>`
pub fn cluster_tag_key(cluster_name: &str) -> String {
    format!("{NAME_AWS_PROVIDER_PREFIX}cluster/{cluster_name}")
}

/// `kubernetes.io/cluster/<name>`
pub fn cluster_aws_cloud_provider_tag_key(cluster_name: &str) -> String {
    format!("{NAME_KUBERNETES_AWS_CLOUD_PROVIDER_PREFIX}{cluster_name}")
}

/// Right-biased merge: keys in `overlay` win.
pub fn merge(base: &Tags, overlay: &Tags) -> Tags {
    let mut merged = base.clone();
    merged.extend(overlay.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Entries of `desired` that are missing from, or differ in, `current`.
pub fn difference(desired: &Tags, current: &Tags) -> Tags {
    desired
        .iter()
        .filter(|(k, v)| current.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[derive(Clone, Debug, Default)]
pub struct BuildParams {
    pub cluster_name: String,
    pub lifecycle: Option<ResourceLifecycle>,
    pub name: Option<String>,
    pub role: Option<String>,
    pub additional: Tags,
}

/// Builds the tag set owned by the controller for a resource.
pub fn build(params: &BuildParams) -> Tags {
    let mut tags = params.additional.clone();
    let lifecycle = params.lifecycle.unwrap_or(ResourceLifecycle::Owned);
    tags.insert(cluster_tag_key(&params.cluster_name), lifecycle.to_string());
    if let Some(role) = &params.role {
        tags.insert(NAME_AWS_CLUSTER_API_ROLE.to_string(), role.clone());
    }
    if let Some(name) = &params.name {
        tags.insert(NAME_TAG_KEY.to_string(), name.clone());
    }
    tags
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_merge_prefers_overlay() {
        let cluster = tags(&[("team", "infra"), ("env", "prod")]);
        let pool = tags(&[("env", "dev"), ("pool", "a")]);

        let merged = merge(&cluster, &pool);
        assert_eq!(merged, tags(&[("team", "infra"), ("env", "dev"), ("pool", "a")]));
    }

    #[test]
    fn test_difference() {
        let desired = tags(&[("a", "1"), ("b", "2"), ("c", "3")]);
        let current = tags(&[("a", "1"), ("b", "x")]);

        assert_eq!(difference(&desired, &current), tags(&[("b", "2"), ("c", "3")]));
        assert!(difference(&current, &current).is_empty());
    }

    #[test]
    fn test_build_control_plane_tags() {
        let built = build(&BuildParams {
            cluster_name: "default_capi-managed-test-control-plane".to_string(),
            lifecycle: Some(ResourceLifecycle::Owned),
            name: Some("capi-managed-test-eks-cp".to_string()),
            role: Some(COMMON_ROLE_TAG_VALUE.to_string()),
            additional: tags(&[("owner", "me")]),
        });

        assert_eq!(built.get("owner").map(String::as_str), Some("me"));
        assert_eq!(
            built
                .get("sigs.k8s.io/cluster-api-provider-aws/cluster/default_capi-managed-test-control-plane")
                .map(String::as_str),
            Some("owned")
        );
        assert_eq!(
            built.get(NAME_AWS_CLUSTER_API_ROLE).map(String::as_str),
            Some("common")
        );
        assert_eq!(
            built.get(NAME_TAG_KEY).map(String::as_str),
            Some("capi-managed-test-eks-cp")
        );
    }
}
