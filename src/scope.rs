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

use serde::Serialize;
use serde_json::{Value, json};
use snafu::{ResultExt, Snafu};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cloud::Clients;
use crate::context::{self, KubeClient, ObjectTarget};
use crate::types;
use crate::types::v1alpha1::condition::{
    self, ASG_READY_CONDITION, Conditioned, EKS_CONTROL_PLANE_READY_CONDITION,
    LAUNCH_TEMPLATE_READY_CONDITION, SECURITY_GROUPS_READY_CONDITION,
};
use crate::types::v1alpha1::control_plane::AWSManagedControlPlane;
use crate::types::v1alpha1::machine_pool::AWSMachinePool;

pub mod machine_pool;
pub mod managed_control_plane;
pub mod provider_id;

pub use machine_pool::{MachinePoolScope, MachinePoolScopeParams};
pub use managed_control_plane::{ManagedControlPlaneScope, ManagedControlPlaneScopeParams};
pub use provider_id::ProviderId;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("failed to create {scope} scope: {object} is required"))]
    Validation {
        scope: &'static str,
        object: &'static str,
    },

    #[snafu(display("bootstrap data secret {namespace}/{name} not found"))]
    MissingBootstrapData { namespace: String, name: String },

    #[snafu(display("bootstrap data secret {namespace}/{name} has no {key:?} key"))]
    MissingBootstrapKey {
        namespace: String,
        name: String,
        key: &'static str,
    },

    #[snafu(display("invalid provider id: {source}"))]
    ProviderId { source: provider_id::Error },

    #[snafu(display("failed to patch {kind} {name}: {source}"))]
    Patch {
        kind: String,
        name: String,
        source: context::Error,
    },

    #[snafu(transparent)]
    Types { source: types::error::Error },

    #[snafu(transparent)]
    Context { source: context::Error },
}

impl Error {
    /// Malformed or missing input that will not fix itself on retry.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. } | Error::ProviderId { .. })
    }
}

/// Cloud session for one reconcile: the region's API clients plus the
/// reconcile's cancellation token.
#[derive(Clone)]
pub struct ClusterScope {
    pub name: String,
    pub namespace: String,
    pub region: String,
    pub clients: Clients,
    pub cancel: CancellationToken,
}

/// Resources persisted through an [`ObjectPatcher`].
pub trait Patchable: kube::Resource<DynamicType = ()> + Serialize + Conditioned {
    /// Conditions summarised into `Ready`.
    const SUMMARY_CONDITIONS: &'static [&'static str];

    fn set_observed_generation(&mut self);
}

impl Patchable for AWSMachinePool {
    const SUMMARY_CONDITIONS: &'static [&'static str] =
        &[LAUNCH_TEMPLATE_READY_CONDITION, ASG_READY_CONDITION];

    fn set_observed_generation(&mut self) {
        let generation = self.metadata.generation;
        self.status_mut().observed_generation = generation;
    }
}

impl Patchable for AWSManagedControlPlane {
    const SUMMARY_CONDITIONS: &'static [&'static str] = &[
        EKS_CONTROL_PLANE_READY_CONDITION,
        SECURITY_GROUPS_READY_CONDITION,
    ];

    fn set_observed_generation(&mut self) {
        let generation = self.metadata.generation;
        self.status_mut().observed_generation = generation;
    }
}

/// Persists the changes made to an object since it was snapshotted.
///
/// The status goes out as one JSON patch against the status subresource,
/// then finalizers and spec as one JSON patch against the resource. Nothing is
/// sent for a part that did not change.
pub struct ObjectPatcher {
    target: ObjectTarget,
    original: Value,
}

impl ObjectPatcher {
    pub fn new<K: Patchable>(obj: &K) -> Result<Self, Error> {
        Ok(Self {
            target: ObjectTarget::of(obj)?,
            original: snapshot(obj)?,
        })
    }

    pub async fn patch<K: Patchable>(
        &mut self,
        kube: &dyn KubeClient,
        obj: &mut K,
    ) -> Result<(), Error> {
        condition::set_summary(obj, K::SUMMARY_CONDITIONS);
        obj.set_observed_generation();

        let current = snapshot(obj)?;
        let patch_context = || PatchSnafu {
            kind: K::kind(&()).to_string(),
            name: self.target.name.clone(),
        };

        let patch = json_patch::diff(&status_part(&self.original), &status_part(&current));
        if !patch.is_empty() {
            debug!(name = %self.target.name, %patch, "patching status");
            kube.patch_status(&self.target, patch)
                .await
                .context(patch_context())?;
        }

        // dropping the last finalizer may delete the object, so it goes last
        let patch = json_patch::diff(&main_part(&self.original), &main_part(&current));
        if !patch.is_empty() {
            debug!(name = %self.target.name, %patch, "patching object");
            kube.patch(&self.target, patch)
                .await
                .context(patch_context())?;
        }

        self.original = current;
        Ok(())
    }
}

fn snapshot<K: Serialize>(obj: &K) -> Result<Value, Error> {
    serde_json::to_value(obj)
        .map_err(|source| context::Error::Serde { source }.into())
}

// Absent fields stay absent so the diff adds them instead of replacing.
fn status_part(obj: &Value) -> Value {
    let mut part = json!({});
    if let Some(status) = obj.get("status") {
        part["status"] = status.clone();
    }
    part
}

fn main_part(obj: &Value) -> Value {
    let mut part = json!({"metadata": {}});
    if let Some(finalizers) = obj.pointer("/metadata/finalizers") {
        part["metadata"]["finalizers"] = finalizers.clone();
    }
    if let Some(spec) = obj.get("spec") {
        part["spec"] = spec.clone();
    }
    part
}
