use std::{
    fmt::{Debug, Display},
    future::Future,
};

use k8s_openapi::NamespaceResourceScope;
use kube::{
    api::{ObjectMeta, PartialObjectMetaExt, Patch, PatchParams},
    runtime::events::{Event, Recorder, Reporter},
    Api, Client, Resource, Result,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, instrument};

// Consts

const MANAGER: &str = "sledge-operator";

// Traits

/// Access to the record store.
///
/// Every write takes the `resourceVersion` read at the start of the pass: when it is set, the API
/// server rejects the write with a 409 if the record changed in between.
#[cfg_attr(feature = "mock", mockall::automock)]
pub trait KubeClient: Send + Sync {
    fn get_from<
        RESOURCE: Clone
            + Debug
            + DeserializeOwned
            + Resource<DynamicType = (), Scope = NamespaceResourceScope>
            + Send
            + Serialize
            + Sync
            + 'static,
    >(
        &self,
        ns: &str,
        name: &str,
    ) -> impl Future<Output = Result<Option<RESOURCE>>> + Send;

    fn patch_metadata_from<
        RESOURCE: Clone
            + Debug
            + DeserializeOwned
            + Resource<DynamicType = (), Scope = NamespaceResourceScope>
            + Send
            + Serialize
            + Sync
            + 'static,
    >(
        &self,
        ns: &str,
        name: &str,
        meta: ObjectMeta,
    ) -> impl Future<Output = Result<()>> + Send;

    fn patch_status_from<
        RESOURCE: Clone
            + Debug
            + DeserializeOwned
            + Resource<DynamicType = (), Scope = NamespaceResourceScope>
            + Send
            + Serialize
            + Sync
            + 'static,
        STATUS: Display + Send + Serialize + Sync + 'static,
    >(
        &self,
        ns: &str,
        name: &str,
        version: Option<String>,
        status: &STATUS,
    ) -> impl Future<Output = Result<()>> + Send;

    fn publish_event<
        RESOURCE: Clone
            + Debug
            + DeserializeOwned
            + Resource<DynamicType = (), Scope = NamespaceResourceScope>
            + Send
            + Serialize
            + Sync
            + 'static,
    >(
        &self,
        evt: Event,
        res: &RESOURCE,
    ) -> impl Future<Output = Result<()>> + Send;
}

// DefaultKubeClient

pub struct DefaultKubeClient {
    kube: Client,
    reporter: Reporter,
}

impl DefaultKubeClient {
    pub fn new(pod_name: Option<String>, kube: Client) -> Self {
        Self {
            kube,
            reporter: Reporter {
                controller: MANAGER.into(),
                instance: pod_name,
            },
        }
    }
}

impl KubeClient for DefaultKubeClient {
    #[instrument(skip(self, ns, name), fields(resource.api_version = %RESOURCE::api_version(&()), resource.kind = %RESOURCE::kind(&()), resource.name = name, resource.namespace = ns))]
    async fn get_from<
        RESOURCE: Clone
            + Debug
            + DeserializeOwned
            + Resource<DynamicType = (), Scope = NamespaceResourceScope>
            + Send
            + Serialize
            + Sync,
    >(
        &self,
        ns: &str,
        name: &str,
    ) -> Result<Option<RESOURCE>> {
        debug!("getting resource");
        let api: Api<RESOURCE> = Api::namespaced(self.kube.clone(), ns);
        api.get_opt(name).await
    }

    #[instrument(skip(self, ns, name, meta), fields(resource.api_version = %RESOURCE::api_version(&()), resource.kind = %RESOURCE::kind(&()), resource.name = name, resource.namespace = ns, resource.version = ?meta.resource_version))]
    async fn patch_metadata_from<
        RESOURCE: Clone
            + Debug
            + DeserializeOwned
            + Resource<DynamicType = (), Scope = NamespaceResourceScope>
            + Send
            + Serialize
            + Sync,
    >(
        &self,
        ns: &str,
        name: &str,
        meta: ObjectMeta,
    ) -> Result<()> {
        debug!("patching resource metadata");
        let api: Api<RESOURCE> = Api::namespaced(self.kube.clone(), ns);
        let params = PatchParams::default();
        let patch = Patch::Merge(meta.into_request_partial::<RESOURCE>());
        api.patch_metadata(name, &params, &patch).await?;
        Ok(())
    }

    #[instrument(skip(self, ns, name, version, status), fields(resource.api_version = %RESOURCE::api_version(&()), resource.kind = %RESOURCE::kind(&()), resource.name = name, resource.namespace = ns, resource.status = %status, resource.version = ?version))]
    async fn patch_status_from<
        RESOURCE: Clone
            + Debug
            + DeserializeOwned
            + Resource<DynamicType = (), Scope = NamespaceResourceScope>
            + Send
            + Serialize
            + Sync,
        STATUS: Display + Send + Serialize + Sync,
    >(
        &self,
        ns: &str,
        name: &str,
        version: Option<String>,
        status: &STATUS,
    ) -> Result<()> {
        debug!("patching resource status");
        let api: Api<RESOURCE> = Api::namespaced(self.kube.clone(), ns);
        let params = PatchParams::default();
        let patch = Patch::Merge(status_patch(version, status));
        api.patch_status(name, &params, &patch).await?;
        Ok(())
    }

    #[instrument(skip(self, evt, res), fields(event.action = %evt.action, event.reason = %evt.reason))]
    async fn publish_event<
        RESOURCE: Clone
            + Debug
            + DeserializeOwned
            + Resource<DynamicType = (), Scope = NamespaceResourceScope>
            + Send
            + Serialize
            + Sync,
    >(
        &self,
        evt: Event,
        res: &RESOURCE,
    ) -> Result<()> {
        debug!("publishing event");
        let recorder = Recorder::new(
            self.kube.clone(),
            self.reporter.clone(),
            res.object_ref(&()),
        );
        recorder.publish(evt).await?;
        Ok(())
    }
}

// Functions

pub fn is_conflict(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == 409)
}

fn status_patch<STATUS: Serialize>(version: Option<String>, status: &STATUS) -> Value {
    let mut patch = Map::new();
    if let Some(version) = version {
        patch.insert(
            "metadata".into(),
            json!({
                "resourceVersion": version,
            }),
        );
    }
    patch.insert("status".into(), json!(status));
    Value::Object(patch)
}

// Tests
