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

use std::time::Duration;

use snafu::{ResultExt, Snafu};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("environment variable {name} must be a number of seconds: {source}"))]
    InvalidSeconds {
        name: &'static str,
        source: std::num::ParseIntError,
    },
}

/// Operator configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Event reporter and field manager name.
    pub controller_name: String,
    /// Event reporter instance, usually the pod name.
    pub instance: Option<String>,
    /// Requeue interval when waiting on something that is not ready yet.
    pub requeue_after: Duration,
    /// Requeue interval after a failed reconcile.
    pub error_requeue_after: Duration,
    /// Deadline for one reconcile, after which in-flight cloud calls are cancelled.
    pub reconcile_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            controller_name: "capa-operator".to_string(),
            instance: None,
            requeue_after: Duration::from_secs(30),
            error_requeue_after: Duration::from_secs(5),
            reconcile_timeout: Duration::from_secs(300),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let mut config = Self::default();

        if let Some(name) = lookup("CAPA_CONTROLLER_NAME").filter(|s| !s.is_empty()) {
            config.controller_name = name;
        }
        config.instance = lookup("HOSTNAME").filter(|s| !s.is_empty());

        let seconds = |name: &'static str, default: Duration| -> Result<Duration, Error> {
            match lookup(name) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .context(InvalidSecondsSnafu { name }),
                None => Ok(default),
            }
        };
        config.requeue_after = seconds("CAPA_REQUEUE_AFTER_SECS", config.requeue_after)?;
        config.error_requeue_after =
            seconds("CAPA_ERROR_REQUEUE_SECS", config.error_requeue_after)?;
        config.reconcile_timeout =
            seconds("CAPA_RECONCILE_TIMEOUT_SECS", config.reconcile_timeout)?;

        Ok(config)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).expect("defaults should load");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("CAPA_CONTROLLER_NAME", "capa-test"),
            ("HOSTNAME", "capa-0"),
            ("CAPA_REQUEUE_AFTER_SECS", "10"),
            ("CAPA_RECONCILE_TIMEOUT_SECS", " 60 "),
        ]))
        .expect("overrides should load");

        assert_eq!(config.controller_name, "capa-test");
        assert_eq!(config.instance.as_deref(), Some("capa-0"));
        assert_eq!(config.requeue_after, Duration::from_secs(10));
        assert_eq!(config.error_requeue_after, Duration::from_secs(5));
        assert_eq!(config.reconcile_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_seconds() {
        let err = Config::from_lookup(lookup(&[("CAPA_ERROR_REQUEUE_SECS", "soon")]))
            .expect_err("should reject non-numeric seconds");
        assert!(err.to_string().contains("CAPA_ERROR_REQUEUE_SECS"));
    }
}
