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

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ObjectReference, Secret};
use kube::api::{Api, ApiResource, DynamicObject, Patch, PatchParams, PostParams};
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use snafu::futures::TryFutureExt;
use snafu::{OptionExt, Snafu};
use tokio_util::sync::CancellationToken;

#[cfg(test)]
use mockall::automock;

use crate::cloud::CloudProvider;
use crate::config::Config;
use crate::services::ServiceFactories;
use crate::types;
use crate::types::capi::{AWSCluster, Cluster, MachinePool};
use crate::types::error::NoNamespaceSnafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Kubernetes API error: {}", source))]
    Kube { source: kube::Error },

    #[snafu(display("record event error: {}", source))]
    Record { source: kube::Error },

    #[snafu(transparent)]
    Types { source: types::error::Error },

    #[snafu(transparent)]
    Serde { source: serde_json::Error },
}

/// An event to publish against an object.
#[derive(Clone, Debug)]
pub struct EventRecord {
    pub type_: EventType,
    pub reason: String,
    pub note: String,
}

impl EventRecord {
    pub fn normal(reason: &str, note: impl Into<String>) -> Self {
        Self {
            type_: EventType::Normal,
            reason: reason.to_string(),
            note: note.into(),
        }
    }

    pub fn warning(reason: &str, note: impl Into<String>) -> Self {
        Self {
            type_: EventType::Warning,
            reason: reason.to_string(),
            note: note.into(),
        }
    }
}

/// Addresses a namespaced object independently of its Rust type.
#[derive(Clone, Debug)]
pub struct ObjectTarget {
    pub resource: ApiResource,
    pub namespace: String,
    pub name: String,
}

impl ObjectTarget {
    pub fn of<K>(obj: &K) -> Result<Self, types::error::Error>
    where
        K: Resource<DynamicType = ()>,
    {
        Ok(Self {
            resource: ApiResource::erase::<K>(&()),
            namespace: obj.namespace().context(NoNamespaceSnafu)?,
            name: obj.name_any(),
        })
    }
}

/// Everything the controllers read from or write to the Kubernetes API.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KubeClient: Send + Sync {
    async fn get_machine_pool(&self, namespace: &str, name: &str)
    -> Result<Option<MachinePool>, Error>;

    async fn get_cluster(&self, namespace: &str, name: &str) -> Result<Option<Cluster>, Error>;

    async fn get_aws_cluster(&self, namespace: &str, name: &str)
    -> Result<Option<AWSCluster>, Error>;

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error>;

    async fn create_secret(&self, namespace: &str, secret: Secret) -> Result<(), Error>;

    /// JSON patch against the main resource.
    async fn patch(&self, target: &ObjectTarget, patch: json_patch::Patch) -> Result<(), Error>;

    /// JSON patch against the status subresource.
    async fn patch_status(
        &self,
        target: &ObjectTarget,
        patch: json_patch::Patch,
    ) -> Result<(), Error>;

    async fn publish(&self, reference: ObjectReference, event: EventRecord) -> Result<(), Error>;
}

pub struct KubeClientImpl {
    client: kube::Client,
    recorder: Recorder,
    patch_params: PatchParams,
}

impl KubeClientImpl {
    pub fn new(client: kube::Client, config: &Config) -> Self {
        let reporter = Reporter {
            controller: config.controller_name.clone(),
            instance: config.instance.clone(),
        };

        let recorder = Recorder::new(client.clone(), reporter);
        let patch_params = PatchParams {
            field_manager: Some(config.controller_name.clone()),
            ..PatchParams::default()
        };
        Self {
            client,
            recorder,
            patch_params,
        }
    }

    async fn get_opt<T>(&self, namespace: &str, name: &str) -> Result<Option<T>, Error>
    where
        T: Clone
            + DeserializeOwned
            + Debug
            + Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <T as Resource>::DynamicType: Default,
    {
        let api: Api<T> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name).context(KubeSnafu).await
    }

    fn dynamic(&self, target: &ObjectTarget) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), &target.namespace, &target.resource)
    }
}

#[async_trait]
impl KubeClient for KubeClientImpl {
    async fn get_machine_pool(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<MachinePool>, Error> {
        self.get_opt(namespace, name).await
    }

    async fn get_cluster(&self, namespace: &str, name: &str) -> Result<Option<Cluster>, Error> {
        self.get_opt(namespace, name).await
    }

    async fn get_aws_cluster(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<AWSCluster>, Error> {
        self.get_opt(namespace, name).await
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error> {
        self.get_opt(namespace, name).await
    }

    async fn create_secret(&self, namespace: &str, secret: Secret) -> Result<(), Error> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        api.create(&PostParams::default(), &secret)
            .context(KubeSnafu)
            .await?;
        Ok(())
    }

    async fn patch(&self, target: &ObjectTarget, patch: json_patch::Patch) -> Result<(), Error> {
        self.dynamic(target)
            .patch(&target.name, &self.patch_params, &Patch::Json::<()>(patch))
            .context(KubeSnafu)
            .await?;
        Ok(())
    }

    async fn patch_status(
        &self,
        target: &ObjectTarget,
        patch: json_patch::Patch,
    ) -> Result<(), Error> {
        self.dynamic(target)
            .patch_status(&target.name, &self.patch_params, &Patch::Json::<()>(patch))
            .context(KubeSnafu)
            .await?;
        Ok(())
    }

    /// send event
    async fn publish(&self, reference: ObjectReference, event: EventRecord) -> Result<(), Error> {
        self.recorder
            .publish(
                &Event {
                    type_: event.type_,
                    reason: event.reason,
                    note: Some(event.note),
                    action: "Reconcile".into(),
                    secondary: None,
                },
                &reference,
            )
            .context(RecordSnafu)
            .await
    }
}

/// Shared state handed to every reconcile.
pub struct Context {
    pub(crate) kube: Arc<dyn KubeClient>,
    pub(crate) cloud: Arc<dyn CloudProvider>,
    pub(crate) services: ServiceFactories,
    pub(crate) config: Config,
    /// Cancelled on shutdown; each reconcile works on a child token.
    pub(crate) shutdown: CancellationToken,
}

impl Context {
    pub fn new(client: kube::Client, cloud: Arc<dyn CloudProvider>, config: Config) -> Self {
        let kube = Arc::new(KubeClientImpl::new(client, &config));
        Self::with_parts(kube, cloud, ServiceFactories::default(), config)
    }

    pub fn with_parts(
        kube: Arc<dyn KubeClient>,
        cloud: Arc<dyn CloudProvider>,
        services: ServiceFactories,
        config: Config,
    ) -> Self {
        Self {
            kube,
            cloud,
            services,
            config,
            shutdown: CancellationToken::new(),
        }
    }
}
