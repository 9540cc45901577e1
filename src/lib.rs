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

use crate::cloud::CloudProvider;
use crate::config::Config;
use crate::context::Context;
use crate::reconcile::{control_plane, error_policy, machine_pool};
use crate::types::v1alpha1::control_plane::AWSManagedControlPlane;
use crate::types::v1alpha1::machine_pool::AWSMachinePool;
use futures::StreamExt;
use k8s_openapi::api::core::v1 as corev1;
use kube::runtime::{Controller, watcher};
use kube::{Api, Client};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub mod cloud;
pub mod config;
pub mod context;
pub mod reconcile;
pub mod retry;
pub mod scope;
pub mod services;
pub mod types;
pub mod utils;

#[cfg(test)]
pub mod tests;

/// Runs the machine pool and managed control plane controllers until a
/// shutdown signal arrives.
///
/// Settings come from the `CAPA_*` environment variables, see [`Config::from_env`].
/// The binary embedding the operator supplies the AWS bindings as `cloud`.
pub async fn run(cloud: Arc<dyn CloudProvider>) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_level(true)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    let config = Config::from_env()?;
    let client = Client::try_default().await?;
    info!(controller = %config.controller_name, "starting controllers");
    let context = Arc::new(Context::new(client.clone(), cloud, config));

    // in-flight waits observe the root token, the controllers stop on their own signal handler
    let shutdown = context.shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.cancel();
        }
    });

    let machine_pools = Controller::new(
        Api::<AWSMachinePool>::all(client.clone()),
        watcher::Config::default(),
    )
    .shutdown_on_signal()
    .run(machine_pool::reconcile, error_policy, context.clone())
    .for_each(|res| async move {
        match res {
            Ok((pool, _)) => info!(name = %pool.name, namespace = ?pool.namespace, "reconciled AWSMachinePool"),
            Err(e) => warn!(error = %e, "AWSMachinePool reconcile failed"),
        }
    });

    let control_planes = Controller::new(
        Api::<AWSManagedControlPlane>::all(client.clone()),
        watcher::Config::default(),
    )
    .owns(
        Api::<corev1::Secret>::all(client.clone()),
        watcher::Config::default(),
    )
    .shutdown_on_signal()
    .run(control_plane::reconcile, error_policy, context.clone())
    .for_each(|res| async move {
        match res {
            Ok((cp, _)) => info!(name = %cp.name, namespace = ?cp.namespace, "reconciled AWSManagedControlPlane"),
            Err(e) => warn!(error = %e, "AWSManagedControlPlane reconcile failed"),
        }
    });

    tokio::join!(machine_pools, control_planes);
    context.shutdown.cancel();

    Ok(())
}
