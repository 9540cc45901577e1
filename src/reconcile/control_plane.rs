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

use super::{Error, finish, owner_name, reconcile_token};
use crate::context::{Context, EventRecord};
use crate::scope::{ManagedControlPlaneScope, ManagedControlPlaneScopeParams};
use crate::types::capi::Cluster;
use crate::types::v1alpha1::condition::{
    self, ConditionSeverity, DELETING_REASON, EKS_CONTROL_PLANE_PROVISIONING_REASON,
    EKS_CONTROL_PLANE_READY_CONDITION, EKS_RECONCILIATION_FAILED_REASON, UNHANDLED_STATE_REASON,
};
use crate::types::v1alpha1::control_plane::AWSManagedControlPlane;
use kube::runtime::controller::Action;
use std::sync::Arc;
use tracing::{Instrument, error, info, info_span, warn};

pub async fn reconcile(
    control_plane: Arc<AWSManagedControlPlane>,
    ctx: Arc<Context>,
) -> Result<Action, Error> {
    let namespace = control_plane.namespace()?;
    let span = info_span!(
        "reconcile",
        kind = "AWSManagedControlPlane",
        %namespace,
        name = %control_plane.name()
    );
    reconcile_object(&control_plane, &ctx, &namespace)
        .instrument(span)
        .await
}

async fn reconcile_object(
    control_plane: &AWSManagedControlPlane,
    ctx: &Context,
    namespace: &str,
) -> Result<Action, Error> {
    let Some(owner) = owner_name::<Cluster>(&control_plane.metadata) else {
        info!("Cluster Controller has not yet set OwnerRef");
        return Ok(Action::await_change());
    };
    let Some(cluster) = ctx.kube.get_cluster(namespace, owner).await? else {
        info!(cluster = owner, "owning Cluster not found");
        return Ok(Action::await_change());
    };
    if cluster.spec.paused {
        info!(cluster = owner, "Cluster is paused, skipping reconciliation");
        return Ok(Action::await_change());
    }

    let cancel = reconcile_token(ctx);
    let _deadline = cancel.clone().drop_guard();
    let mut scope = ManagedControlPlaneScope::new(ManagedControlPlaneScopeParams {
        kube: ctx.kube.clone(),
        cloud: ctx.cloud.clone(),
        cancel,
        cluster: Some(cluster),
        control_plane: Some(control_plane.clone()),
    })?;

    let result = if control_plane.metadata.deletion_timestamp.is_some() {
        reconcile_delete(ctx, &mut scope).await
    } else {
        reconcile_normal(ctx, &mut scope).await
    };
    let closed = scope.close().await;
    finish(result, closed, &ctx.config)
}

async fn reconcile_normal(
    ctx: &Context,
    scope: &mut ManagedControlPlaneScope,
) -> Result<Action, Error> {
    info!("Reconciling AWSManagedControlPlane");

    if scope.add_finalizer() {
        scope.patch_object().await?;
    }

    let eks = (ctx.services.control_plane)(&scope.cluster_scope);
    match eks.reconcile_control_plane(scope).await {
        Ok(()) => {
            let status = scope.control_plane.status.clone().unwrap_or_default();
            if status.ready {
                condition::mark_true(&mut scope.control_plane, EKS_CONTROL_PLANE_READY_CONDITION);
                return Ok(Action::await_change());
            }
            match status.failure_message {
                // a failed cluster needs manual intervention
                Some(message) => {
                    warn!(%message, "EKS control plane failed");
                    condition::mark_false(
                        &mut scope.control_plane,
                        EKS_CONTROL_PLANE_READY_CONDITION,
                        EKS_RECONCILIATION_FAILED_REASON,
                        ConditionSeverity::Error,
                        message,
                    );
                }
                None => condition::mark_false(
                    &mut scope.control_plane,
                    EKS_CONTROL_PLANE_READY_CONDITION,
                    EKS_CONTROL_PLANE_PROVISIONING_REASON,
                    ConditionSeverity::Info,
                    "",
                ),
            }
            Ok(Action::requeue(ctx.config.requeue_after))
        }
        Err(e) if e.is_unexpected_state() => {
            let message = e.to_string();
            warn!(error = %e, "unhandled EKS cluster state");
            condition::mark_unknown(
                &mut scope.control_plane,
                EKS_CONTROL_PLANE_READY_CONDITION,
                UNHANDLED_STATE_REASON,
                message.clone(),
            );
            scope
                .record(EventRecord::warning("EKSUnhandledState", message))
                .await;
            Ok(Action::requeue(ctx.config.requeue_after))
        }
        Err(e) if e.is_not_ready() => {
            condition::mark_false(
                &mut scope.control_plane,
                EKS_CONTROL_PLANE_READY_CONDITION,
                EKS_CONTROL_PLANE_PROVISIONING_REASON,
                ConditionSeverity::Info,
                e.to_string(),
            );
            Err(e.into())
        }
        Err(e) => {
            condition::mark_false(
                &mut scope.control_plane,
                EKS_CONTROL_PLANE_READY_CONDITION,
                EKS_RECONCILIATION_FAILED_REASON,
                ConditionSeverity::Error,
                e.to_string(),
            );
            Err(e.into())
        }
    }
}

async fn reconcile_delete(
    ctx: &Context,
    scope: &mut ManagedControlPlaneScope,
) -> Result<Action, Error> {
    info!("Reconciling AWSManagedControlPlane delete");

    condition::mark_false(
        &mut scope.control_plane,
        EKS_CONTROL_PLANE_READY_CONDITION,
        DELETING_REASON,
        ConditionSeverity::Info,
        "",
    );

    let eks = (ctx.services.control_plane)(&scope.cluster_scope);
    if let Err(e) = eks.delete_control_plane(scope).await {
        if !e.is_not_ready() {
            error!(error = %e, "error deleting EKS cluster");
        }
        return Err(e.into());
    }

    scope.remove_finalizer();
    Ok(Action::await_change())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::context::{KubeClient, MockKubeClient};
    use crate::services::{self, ControlPlaneInterface, MockControlPlaneInterface, ServiceFactories};
    use crate::tests::{
        create_test_capi_cluster, create_test_control_plane, removes_finalizer, test_cloud,
    };
    use crate::types::v1alpha1::condition::ConditionStatus;
    use crate::types::v1alpha1::control_plane::CONTROL_PLANE_FINALIZER;
    use kube::ResourceExt;
    use std::sync::Mutex;

    type Trace = Arc<Mutex<Vec<String>>>;

    fn kube(trace: Trace, paused: bool) -> MockKubeClient {
        let mut kube = MockKubeClient::new();
        kube.expect_get_cluster().returning(move |_, _| {
            let mut cluster = create_test_capi_cluster();
            cluster.spec.paused = paused;
            Ok(Some(cluster))
        });
        let t = trace.clone();
        kube.expect_patch().returning(move |_, patch| {
            t.lock().unwrap().push(format!("patch {patch}"));
            Ok(())
        });
        let t = trace.clone();
        kube.expect_patch_status().returning(move |_, patch| {
            t.lock().unwrap().push(format!("status {patch}"));
            Ok(())
        });
        kube.expect_publish().returning(move |_, event| {
            trace.lock().unwrap().push(format!("event {}", event.reason));
            Ok(())
        });
        kube
    }

    fn context(kube: MockKubeClient, eks: MockControlPlaneInterface) -> Arc<Context> {
        let eks: Arc<dyn ControlPlaneInterface> = Arc::new(eks);
        let services = ServiceFactories {
            control_plane: Box::new(move |_| eks.clone()),
            ..Default::default()
        };
        let kube: Arc<dyn KubeClient> = Arc::new(kube);
        Arc::new(Context::with_parts(kube, test_cloud(), services, Config::default()))
    }

    fn deleting_control_plane() -> AWSManagedControlPlane {
        let mut cp = create_test_control_plane();
        cp.finalizers_mut().push(CONTROL_PLANE_FINALIZER.to_string());
        cp.metadata.deletion_timestamp =
            serde_json::from_value(serde_json::json!("2025-01-01T00:00:00Z")).unwrap();
        cp
    }

    fn scope_for(ctx: &Context, cp: AWSManagedControlPlane) -> ManagedControlPlaneScope {
        crate::tests::test_control_plane_scope(ctx.kube.clone(), crate::tests::test_clients(), cp)
    }

    #[tokio::test]
    async fn test_ready_control_plane() {
        let trace: Trace = Default::default();
        let mut eks = MockControlPlaneInterface::new();
        eks.expect_reconcile_control_plane().times(1).returning(|scope| {
            let status = scope.control_plane.status_mut();
            status.ready = true;
            status.initialized = true;
            Ok(())
        });

        let ctx = context(kube(trace.clone(), false), eks);
        let action = reconcile(Arc::new(create_test_control_plane()), ctx)
            .await
            .expect("reconcile should succeed");
        assert_eq!(action, Action::await_change());

        let trace = trace.lock().unwrap();
        let finalizer = trace
            .iter()
            .position(|t| t.starts_with("patch") && t.contains(CONTROL_PLANE_FINALIZER))
            .expect("finalizer should be persisted");
        let ready = trace
            .iter()
            .position(|t| t.starts_with("status") && t.contains("EKSControlPlaneReady"))
            .expect("status should be persisted");
        assert!(finalizer < ready, "trace: {trace:?}");
    }

    #[tokio::test]
    async fn test_provisioning_requeues() {
        let mut eks = MockControlPlaneInterface::new();
        eks.expect_reconcile_control_plane().returning(|_| Ok(()));
        let ctx = context(kube(Default::default(), false), eks);

        let mut scope = scope_for(&ctx, create_test_control_plane());
        let action = reconcile_normal(&ctx, &mut scope).await.expect("no error");
        assert_eq!(action, Action::requeue(ctx.config.requeue_after));

        let cond = condition::get(&scope.control_plane, EKS_CONTROL_PLANE_READY_CONDITION).unwrap();
        assert_eq!(cond.status, ConditionStatus::False);
        assert_eq!(
            cond.reason.as_deref(),
            Some(EKS_CONTROL_PLANE_PROVISIONING_REASON)
        );
    }

    #[tokio::test]
    async fn test_failed_cluster_reports_failure() {
        let mut eks = MockControlPlaneInterface::new();
        eks.expect_reconcile_control_plane().returning(|scope| {
            let status = scope.control_plane.status_mut();
            status.initialized = true;
            status.ready = false;
            status.failure_message = Some("EKS cluster in unexpected FAILED state".to_string());
            Ok(())
        });
        let ctx = context(kube(Default::default(), false), eks);

        let mut scope = scope_for(&ctx, create_test_control_plane());
        let action = reconcile_normal(&ctx, &mut scope).await.expect("no error");
        assert_eq!(action, Action::requeue(ctx.config.requeue_after));

        let cond = condition::get(&scope.control_plane, EKS_CONTROL_PLANE_READY_CONDITION).unwrap();
        assert_eq!(cond.status, ConditionStatus::False);
        assert_eq!(cond.reason.as_deref(), Some(EKS_RECONCILIATION_FAILED_REASON));
        assert_eq!(cond.severity, Some(ConditionSeverity::Error));
        assert_eq!(
            cond.message.as_deref(),
            Some("EKS cluster in unexpected FAILED state")
        );
    }

    #[tokio::test]
    async fn test_unexpected_status_is_reported_once() {
        let trace: Trace = Default::default();
        let mut eks = MockControlPlaneInterface::new();
        eks.expect_reconcile_control_plane().returning(|_| {
            Err(services::Error::UnexpectedClusterStatus {
                name: "eks".to_string(),
                status: "PENDING".to_string(),
            })
        });
        let ctx = context(kube(trace.clone(), false), eks);

        let mut scope = scope_for(&ctx, create_test_control_plane());
        let action = reconcile_normal(&ctx, &mut scope)
            .await
            .expect("unexpected status is not an error");
        assert_eq!(action, Action::requeue(ctx.config.requeue_after));

        let cond = condition::get(&scope.control_plane, EKS_CONTROL_PLANE_READY_CONDITION).unwrap();
        assert_eq!(cond.status, ConditionStatus::Unknown);
        assert_eq!(cond.reason.as_deref(), Some(UNHANDLED_STATE_REASON));

        let events = trace
            .lock()
            .unwrap()
            .iter()
            .filter(|t| *t == "event EKSUnhandledState")
            .count();
        assert_eq!(events, 1);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_returned() {
        let mut eks = MockControlPlaneInterface::new();
        eks.expect_reconcile_control_plane().returning(|_| {
            Err(services::Error::FailedDependency {
                message: "at least 2 subnets is required".to_string(),
            })
        });
        let ctx = context(kube(Default::default(), false), eks);

        let mut scope = scope_for(&ctx, create_test_control_plane());
        let err = reconcile_normal(&ctx, &mut scope)
            .await
            .expect_err("should fail");
        assert!(err.is_permanent());

        let cond = condition::get(&scope.control_plane, EKS_CONTROL_PLANE_READY_CONDITION).unwrap();
        assert_eq!(cond.reason.as_deref(), Some(EKS_RECONCILIATION_FAILED_REASON));
        assert_eq!(cond.severity, Some(ConditionSeverity::Error));
    }

    #[tokio::test]
    async fn test_paused_cluster_is_skipped() {
        let trace: Trace = Default::default();
        let mut eks = MockControlPlaneInterface::new();
        eks.expect_reconcile_control_plane().never();
        let ctx = context(kube(trace.clone(), true), eks);

        let action = reconcile(Arc::new(create_test_control_plane()), ctx)
            .await
            .expect("paused is not an error");
        assert_eq!(action, Action::await_change());
        assert!(trace.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_finalizer() {
        let trace: Trace = Default::default();
        let mut eks = MockControlPlaneInterface::new();
        eks.expect_delete_control_plane().times(1).returning(|_| Ok(()));
        eks.expect_reconcile_control_plane().never();
        let ctx = context(kube(trace.clone(), false), eks);

        let action = reconcile(Arc::new(deleting_control_plane()), ctx)
            .await
            .expect("delete should succeed");
        assert_eq!(action, Action::await_change());

        let trace = trace.lock().unwrap();
        let status = trace
            .iter()
            .position(|t| t.starts_with("status") && t.contains(DELETING_REASON))
            .expect("deleting condition should be persisted");
        let finalizer = trace
            .iter()
            .position(|t| removes_finalizer(t))
            .expect("finalizer should be removed");
        assert!(status < finalizer, "trace: {trace:?}");
    }

    #[tokio::test]
    async fn test_delete_still_in_progress_requeues() {
        let trace: Trace = Default::default();
        let mut eks = MockControlPlaneInterface::new();
        eks.expect_delete_control_plane().returning(|_| {
            Err(services::Error::NotReady {
                what: "deletion of eks cluster".to_string(),
            })
        });
        let ctx = context(kube(trace.clone(), false), eks);

        let action = reconcile(Arc::new(deleting_control_plane()), ctx.clone())
            .await
            .expect("waiting is not an error");
        assert_eq!(action, Action::requeue(ctx.config.requeue_after));
        assert!(
            !trace
                .lock()
                .unwrap()
                .iter()
                .any(|t| removes_finalizer(t))
        );
    }
}
