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
use crate::scope::{MachinePoolScope, MachinePoolScopeParams, ProviderId};
use crate::services::{self, AsgInterface, Ec2MachineInterface};
use crate::types::capi::{CLUSTER_NAME_LABEL, MachinePool};
use crate::types::v1alpha1::autoscaling::{AsgState, AsgStatus, AutoScalingGroup};
use crate::types::v1alpha1::condition::{
    self, ASG_DELETION_IN_PROGRESS_REASON, ASG_NOT_RUNNING_REASON, ASG_PROVISION_FAILED_REASON,
    ASG_READY_CONDITION, ConditionSeverity, LAUNCH_TEMPLATE_READY_CONDITION,
    LAUNCH_TEMPLATE_RECONCILE_FAILED_REASON, UNHANDLED_STATE_REASON,
    WAITING_FOR_BOOTSTRAP_DATA_REASON, WAITING_FOR_CLUSTER_INFRASTRUCTURE_REASON,
};
use crate::types::v1alpha1::launch_template;
use crate::types::v1alpha1::machine_pool::AWSMachinePool;
use kube::ResourceExt;
use kube::runtime::controller::Action;
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span, warn};

pub async fn reconcile(pool: Arc<AWSMachinePool>, ctx: Arc<Context>) -> Result<Action, Error> {
    let namespace = pool.namespace()?;
    let span = info_span!("reconcile", kind = "AWSMachinePool", %namespace, name = %pool.name());
    reconcile_pool(&pool, &ctx, &namespace).instrument(span).await
}

async fn reconcile_pool(
    pool: &AWSMachinePool,
    ctx: &Context,
    namespace: &str,
) -> Result<Action, Error> {
    let kube = &ctx.kube;

    let Some(owner) = owner_name::<MachinePool>(&pool.metadata) else {
        info!("MachinePool Controller has not yet set OwnerRef");
        return Ok(Action::await_change());
    };
    let Some(machine_pool) = kube.get_machine_pool(namespace, owner).await? else {
        info!(owner, "owning MachinePool not found");
        return Ok(Action::await_change());
    };

    let cluster_name = machine_pool
        .labels()
        .get(CLUSTER_NAME_LABEL)
        .cloned()
        .unwrap_or_else(|| machine_pool.spec.cluster_name.clone());
    let Some(cluster) = kube.get_cluster(namespace, &cluster_name).await? else {
        info!(cluster = %cluster_name, "MachinePool is missing its Cluster");
        return Ok(Action::await_change());
    };
    if cluster.spec.paused {
        info!(cluster = %cluster_name, "Cluster is paused, skipping reconciliation");
        return Ok(Action::await_change());
    }

    let infra_name = cluster
        .spec
        .infrastructure_ref
        .as_ref()
        .and_then(|r| r.name.clone())
        .unwrap_or_else(|| cluster_name.clone());
    let Some(aws_cluster) = kube.get_aws_cluster(namespace, &infra_name).await? else {
        info!(name = %infra_name, "AWSCluster is not available yet");
        return Ok(Action::await_change());
    };

    let cancel = reconcile_token(ctx);
    let _deadline = cancel.clone().drop_guard();
    let mut scope = MachinePoolScope::new(MachinePoolScopeParams {
        kube: ctx.kube.clone(),
        cloud: ctx.cloud.clone(),
        cancel,
        cluster: Some(cluster),
        aws_cluster: Some(aws_cluster),
        machine_pool: Some(machine_pool),
        aws_machine_pool: Some(pool.clone()),
    })?;

    let result = if pool.metadata.deletion_timestamp.is_some() {
        reconcile_delete(ctx, &mut scope).await
    } else {
        reconcile_normal(ctx, &mut scope).await
    };
    let closed = scope.close().await;
    finish(result, closed, &ctx.config)
}

async fn reconcile_normal(ctx: &Context, scope: &mut MachinePoolScope) -> Result<Action, Error> {
    info!("Reconciling AWSMachinePool");

    if scope.aws_machine_pool.has_current_failure() {
        info!("Error state detected, skipping reconciliation");
        return Ok(Action::await_change());
    }

    if scope.add_finalizer() {
        // must be persisted before anything is created in the cloud
        scope.patch_object().await?;
    }

    if !scope.cluster.infrastructure_ready() {
        info!("Cluster infrastructure is not ready yet");
        condition::mark_false(
            &mut scope.aws_machine_pool,
            ASG_READY_CONDITION,
            WAITING_FOR_CLUSTER_INFRASTRUCTURE_REASON,
            ConditionSeverity::Info,
            "",
        );
        return Ok(Action::await_change());
    }

    if !scope.has_bootstrap_data_ref() {
        info!("Bootstrap data secret reference is not yet available");
        condition::mark_false(
            &mut scope.aws_machine_pool,
            ASG_READY_CONDITION,
            WAITING_FOR_BOOTSTRAP_DATA_REASON,
            ConditionSeverity::Info,
            "",
        );
        return Ok(Action::await_change());
    }

    let ec2 = (ctx.services.ec2)(&scope.cluster_scope);
    let asg_svc = (ctx.services.asg)(&scope.cluster_scope);

    let existing = find_asg(asg_svc.as_ref(), scope).await?;

    if let Err(e) = reconcile_launch_template(ec2.as_ref(), scope).await {
        condition::mark_false(
            &mut scope.aws_machine_pool,
            LAUNCH_TEMPLATE_READY_CONDITION,
            LAUNCH_TEMPLATE_RECONCILE_FAILED_REASON,
            ConditionSeverity::Error,
            e.to_string(),
        );
        return Err(e);
    }
    condition::mark_true(&mut scope.aws_machine_pool, LAUNCH_TEMPLATE_READY_CONDITION);

    let asg = match existing {
        None => create_asg(asg_svc.as_ref(), scope).await?,
        Some(existing) => {
            if services::autoscaling::needs_update(scope, &existing) {
                info!(name = %existing.name, "updating autoscaling group");
                asg_svc.update_asg(scope).await?;
            }
            existing
        }
    };

    mirror_group(scope, &asg);

    match &asg.state {
        AsgState::Running => {
            debug!(name = %asg.name, "autoscaling group is running");
            let status = scope.aws_machine_pool.status_mut();
            status.ready = true;
            status.failure_message = None;
            condition::mark_true(&mut scope.aws_machine_pool, ASG_READY_CONDITION);
            Ok(Action::await_change())
        }
        AsgState::Unknown(raw) => {
            let message = format!("ASG state {raw:?} is undefined");
            warn!(name = %asg.name, state = %raw, "unhandled autoscaling group state");
            let status = scope.aws_machine_pool.status_mut();
            status.ready = false;
            status.failure_message = Some(message.clone());
            condition::mark_unknown(
                &mut scope.aws_machine_pool,
                ASG_READY_CONDITION,
                UNHANDLED_STATE_REASON,
                message.clone(),
            );
            scope
                .record(EventRecord::warning("ASGUnhandledState", message))
                .await;
            Ok(Action::requeue(ctx.config.requeue_after))
        }
        state => {
            let severity = if state.is_running() {
                info!(name = %asg.name, %state, "autoscaling group is not running yet");
                ConditionSeverity::Info
            } else if state.is_operational() {
                info!(name = %asg.name, %state, "autoscaling group instances are in standby");
                ConditionSeverity::Info
            } else {
                warn!(name = %asg.name, %state, "autoscaling group is shutting down");
                ConditionSeverity::Warning
            };
            scope.aws_machine_pool.status_mut().ready = false;
            condition::mark_false(
                &mut scope.aws_machine_pool,
                ASG_READY_CONDITION,
                ASG_NOT_RUNNING_REASON,
                severity,
                format!("ASG is in state {state:?}", state = state.as_ref()),
            );
            Ok(Action::requeue(ctx.config.requeue_after))
        }
    }
}

async fn reconcile_delete(ctx: &Context, scope: &mut MachinePoolScope) -> Result<Action, Error> {
    info!("Handling deleted AWSMachinePool");

    let ec2 = (ctx.services.ec2)(&scope.cluster_scope);
    let asg_svc = (ctx.services.asg)(&scope.cluster_scope);

    match find_asg(asg_svc.as_ref(), scope).await? {
        None => {
            warn!("Unable to locate ASG");
            scope
                .record(EventRecord::warning(
                    "NoASGFound",
                    format!("Unable to find matching ASG for {}", scope.name()),
                ))
                .await;
        }
        Some(asg) if asg.status == Some(AsgStatus::DeleteInProgress) => {
            return Ok(deletion_in_progress(ctx, scope, &asg.name).await);
        }
        Some(asg) => {
            scope.aws_machine_pool.status_mut().ready = false;
            if let Err(e) = asg_svc.delete_asg_and_wait(&asg.name).await {
                scope
                    .record(EventRecord::warning(
                        "FailedDelete",
                        format!("Failed to delete ASG {}: {e}", asg.name),
                    ))
                    .await;
                return Err(e.into());
            }

            // the group may still be draining after the wait
            if let Some(remaining) = find_asg(asg_svc.as_ref(), scope).await? {
                return Ok(deletion_in_progress(ctx, scope, &remaining.name).await);
            }
        }
    }

    match ec2.get_launch_template(&scope.name()).await? {
        Some(lt) => {
            if let Some(id) = lt.id.as_deref() {
                info!(id, "deleting launch template");
                ec2.delete_launch_template(id).await?;
            }
        }
        None => debug!("Unable to locate launch template"),
    }

    info!("Successfully deleted AutoScalingGroup and Launch Template");
    scope.remove_finalizer();
    Ok(Action::await_change())
}

/// Keeps the finalizer while AWS is still tearing the group down.
async fn deletion_in_progress(ctx: &Context, scope: &mut MachinePoolScope, name: &str) -> Action {
    scope.aws_machine_pool.status_mut().ready = false;
    condition::mark_false(
        &mut scope.aws_machine_pool,
        ASG_READY_CONDITION,
        ASG_DELETION_IN_PROGRESS_REASON,
        ConditionSeverity::Warning,
        "",
    );
    scope
        .record(EventRecord::warning(
            "DeletionInProgress",
            format!("ASG deletion in progress: {name}"),
        ))
        .await;
    Action::requeue(ctx.config.requeue_after)
}

/// Looks the group up by provider id first, then by the pool's name.
async fn find_asg(
    asg: &dyn AsgInterface,
    scope: &MachinePoolScope,
) -> Result<Option<AutoScalingGroup>, Error> {
    if let Some(provider_id) = scope.provider_id()? {
        if let Some(group) = asg.find_by_provider_id(&provider_id).await? {
            return Ok(Some(group));
        }
    }
    Ok(asg.find_by_name(&scope.name()).await?)
}

async fn reconcile_launch_template(
    ec2: &dyn Ec2MachineInterface,
    scope: &mut MachinePoolScope,
) -> Result<(), Error> {
    let user_data = scope.get_raw_bootstrap_data().await?;
    let name = scope.name();

    let id = match ec2.get_launch_template(&name).await? {
        None => {
            info!("No launch template found, creating a new one");
            ec2.create_launch_template(scope, &user_data).await?
        }
        Some(existing) => {
            let id = existing.id.clone().unwrap_or_default();
            let incoming = &scope.aws_machine_pool.spec.aws_launch_template;
            if launch_template::needs_update(incoming, &existing) {
                info!(%id, "launch template changed, creating a new version");
                ec2.create_launch_template_version(scope, &id, &user_data)
                    .await?;
            }
            id
        }
    };

    scope.aws_machine_pool.status_mut().launch_template_id = Some(id);
    Ok(())
}

async fn create_asg(
    asg: &dyn AsgInterface,
    scope: &mut MachinePoolScope,
) -> Result<AutoScalingGroup, Error> {
    match asg.create_asg(scope).await {
        Ok(group) => {
            scope
                .record(EventRecord::normal(
                    "SuccessfulCreate",
                    format!("Created new ASG: {}", group.name),
                ))
                .await;
            let provider_id = ProviderId::aws(scope.region(), &group.name);
            scope.set_provider_id(&provider_id);
            Ok(group)
        }
        Err(e) if e.is_not_ready() => Err(e.into()),
        Err(e) => {
            scope
                .record(EventRecord::warning(
                    "FailedCreate",
                    format!("Failed to create ASG: {e}"),
                ))
                .await;
            condition::mark_false(
                &mut scope.aws_machine_pool,
                ASG_READY_CONDITION,
                ASG_PROVISION_FAILED_REASON,
                ConditionSeverity::Error,
                e.to_string(),
            );
            Err(e.into())
        }
    }
}

/// Copies the observed group into the pool's spec and status.
fn mirror_group(scope: &mut MachinePoolScope, asg: &AutoScalingGroup) {
    scope.aws_machine_pool.spec.provider_id_list = asg
        .instances
        .iter()
        .map(|i| ProviderId::aws(&i.availability_zone, &i.id).to_string())
        .collect();

    let status = scope.aws_machine_pool.status_mut();
    if !asg.arn.is_empty() {
        status.asg_arn = Some(asg.arn.clone());
    }
    status.replicas = i32::try_from(asg.instances.len()).unwrap_or(i32::MAX);
}
