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

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use snafu::OptionExt;

use crate::types::error::{Error, InvalidVersionSnafu};

/// A `major.minor[.patch]` version, tolerant of a leading `v` and of
/// pre-release or build suffixes, which are ignored for ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GenericVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl GenericVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// The next minor release, with the patch level reset.
    pub fn next_minor(&self) -> Result<Self, Error> {
        let minor = self.minor.checked_add(1).context(InvalidVersionSnafu {
            version: self.to_string(),
            reason: "minor version has no successor",
        })?;
        Ok(Self::new(self.major, minor, 0))
    }

    /// `major.minor`, the form EKS accepts.
    pub fn major_minor(&self) -> String {
        format!("{}.{}", self.major, self.minor)
    }
}

impl FromStr for GenericVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| {
            InvalidVersionSnafu {
                version: s.to_string(),
                reason: reason.to_string(),
            }
            .build()
        };

        let trimmed = s.trim().trim_start_matches('v');
        let core = trimmed
            .split(['-', '+'])
            .next()
            .unwrap_or_default();

        let parts: Vec<&str> = core.split('.').collect();
        if !(2..=3).contains(&parts.len()) {
            return Err(invalid("expected major.minor or major.minor.patch"));
        }

        let mut numbers = [0u32; 3];
        for (i, part) in parts.iter().enumerate() {
            if part.is_empty() || (part.len() > 1 && part.starts_with('0')) {
                return Err(invalid("illegal version component"));
            }
            numbers[i] = part
                .parse()
                .map_err(|_| invalid("version components must be numeric"))?;
        }

        Ok(Self::new(numbers[0], numbers[1], numbers[2]))
    }
}

impl Ord for GenericVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
    }
}

impl PartialOrd for GenericVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for GenericVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
