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

use std::fmt;
use std::str::FromStr;

use snafu::{Snafu, ensure};

#[derive(Debug, Snafu, PartialEq)]
pub enum Error {
    #[snafu(display("provider id is empty"))]
    Empty,

    #[snafu(display("provider id {value:?} must have the form <provider>://<path>/<id>"))]
    Invalid { value: String },
}

/// `<cloud-provider>://<path>/<id>`, for example `aws:///us-east-1/my-pool`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderId {
    original: String,
    cloud_provider: String,
    id: String,
}

impl ProviderId {
    /// `aws:///<region-or-zone>/<id>`
    pub fn aws(location: &str, id: &str) -> Self {
        Self {
            original: format!("aws:///{location}/{id}"),
            cloud_provider: "aws".to_string(),
            id: id.to_string(),
        }
    }

    pub fn cloud_provider(&self) -> &str {
        &self.cloud_provider
    }

    /// The last path segment: an instance id or autoscaling group name.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn as_str(&self) -> &str {
        &self.original
    }
}

impl FromStr for ProviderId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ensure!(!s.is_empty(), EmptySnafu);

        let invalid = || InvalidSnafu { value: s }.build();
        let (cloud_provider, rest) = s.split_once("://").ok_or_else(invalid)?;
        ensure!(
            !cloud_provider.is_empty() && !cloud_provider.contains(':') && !s.ends_with('/'),
            InvalidSnafu { value: s }
        );

        let id = rest.rsplit('/').next().unwrap_or_default();
        ensure!(!id.is_empty(), InvalidSnafu { value: s });

        Ok(Self {
            original: s.to_string(),
            cloud_provider: cloud_provider.to_string(),
            id: id.to_string(),
        })
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}
