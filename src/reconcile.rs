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

use crate::config::Config;
use crate::context::Context;
use crate::{context, scope, services, types};
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use kube::Resource;
use kube::runtime::controller::Action;
use snafu::Snafu;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub mod control_plane;
pub mod machine_pool;

#[derive(Snafu, Debug)]
pub enum Error {
    #[snafu(transparent)]
    Context { source: context::Error },

    #[snafu(transparent)]
    Types { source: types::error::Error },

    #[snafu(transparent)]
    Scope { source: scope::Error },

    #[snafu(transparent)]
    Services { source: services::Error },
}

impl Error {
    /// Retrying with the same object cannot succeed; wait for it to change.
    pub fn is_permanent(&self) -> bool {
        match self {
            Error::Types { .. } => true,
            Error::Scope { source } => source.is_validation(),
            Error::Services { source } => source.is_permanent(),
            Error::Context { .. } => false,
        }
    }
}

pub fn error_policy<K>(_object: Arc<K>, error: &Error, ctx: Arc<Context>) -> Action {
    if error.is_permanent() {
        warn!(%error, "reconcile failed permanently, waiting for a spec change");
        return Action::await_change();
    }

    error!(%error, "reconcile failed");
    Action::requeue(ctx.config.error_requeue_after)
}

/// Token for one reconcile: a child of the shutdown token that also fires
/// once the reconcile deadline passes.
fn reconcile_token(ctx: &Context) -> CancellationToken {
    let token = ctx.shutdown.child_token();
    let deadline = token.clone();
    let timeout = ctx.config.reconcile_timeout;
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(timeout) => deadline.cancel(),
            _ = deadline.cancelled() => {}
        }
    });
    token
}

/// Name of the owner of kind `K`, if `meta` lists one.
fn owner_name<K>(meta: &metav1::ObjectMeta) -> Option<&str>
where
    K: Resource<DynamicType = ()>,
{
    let kind = K::kind(&());
    let api_version = K::api_version(&());
    meta.owner_references
        .iter()
        .flatten()
        .find(|owner| owner.kind == kind && owner.api_version == api_version)
        .map(|owner| owner.name.as_str())
}

/// Folds the result of the final status persist into the reconcile outcome.
/// Waiting on something outside our control becomes a plain requeue.
fn finish(
    result: Result<Action, Error>,
    closed: Result<(), scope::Error>,
    config: &Config,
) -> Result<Action, Error> {
    let result = match result {
        Err(Error::Services { source }) if source.is_not_ready() => {
            info!(reason = %source, "not ready yet, requeueing");
            Ok(Action::requeue(config.requeue_after))
        }
        other => other,
    };

    match (result, closed) {
        (Ok(action), Ok(())) => Ok(action),
        (Ok(_), Err(e)) => Err(e.into()),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close_err)) => {
            warn!(error = %close_err, "failed to persist status");
            Err(e)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::tests::create_test_machine_pool;
    use crate::types::capi::MachinePool;
    use std::time::Duration;

    #[test]
    fn test_owner_name() {
        let pool = create_test_machine_pool();
        assert_eq!(owner_name::<MachinePool>(&pool.metadata), Some("capa-pool"));
        assert_eq!(owner_name::<crate::types::capi::Cluster>(&pool.metadata), None);
    }

    #[test]
    fn test_finish_turns_not_ready_into_requeue() {
        let config = Config::default();
        let waiting = Err(Error::Services {
            source: services::Error::NotReady {
                what: "autoscaling group".to_string(),
            },
        });
        let action = finish(waiting, Ok(()), &config).expect("not ready is not an error");
        assert_eq!(action, Action::requeue(config.requeue_after));

        let failed = Err(Error::Services {
            source: services::Error::FailedDependency {
                message: "at least 2 subnets is required".to_string(),
            },
        });
        let err = finish(failed, Ok(()), &config).expect_err("should stay an error");
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn test_error_policy() {
        use crate::tests::{permissive_kube, test_cloud};
        let config = Config {
            error_requeue_after: Duration::from_secs(7),
            ..Config::default()
        };
        let ctx = Arc::new(Context::with_parts(
            Arc::new(permissive_kube()),
            test_cloud(),
            Default::default(),
            config,
        ));
        let pool = Arc::new(create_test_machine_pool());

        let permanent = Error::Scope {
            source: scope::Error::Validation {
                scope: "machine pool",
                object: "Cluster",
            },
        };
        assert_eq!(
            error_policy(pool.clone(), &permanent, ctx.clone()),
            Action::await_change()
        );

        let transient = Error::Services {
            source: services::Error::DescribeAsg {
                name: "capa-pool".to_string(),
                source: crate::cloud::Error::api("Throttling", "slow down"),
            },
        };
        assert_eq!(
            error_policy(pool, &transient, ctx),
            Action::requeue(Duration::from_secs(7))
        );
    }
}
