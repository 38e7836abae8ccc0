// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Narrow control-plane capability used by the reconciler and the seeder

use crate::constants::OPERATOR_NAME;
use crate::error::Result;
use async_trait::async_trait;
use kube::{
    api::{DynamicObject, ListParams, Patch, PatchParams, PostParams},
    discovery::ApiResource,
    Api, Client, Resource, ResourceExt,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Any typed record that can be stored on the control plane
pub trait Managed:
    Resource<DynamicType = ()> + Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<K> Managed for K where
    K: Resource<DynamicType = ()>
        + Clone
        + fmt::Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Coordinates of a single object; `namespace` is `None` for cluster-scoped kinds
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn namespaced(namespace: &str, name: &str) -> Self {
        ObjectKey {
            namespace: Some(namespace.to_string()),
            name: name.to_string(),
        }
    }

    pub fn cluster(name: &str) -> Self {
        ObjectKey {
            namespace: None,
            name: name.to_string(),
        }
    }

    pub fn of<K: Resource>(object: &K) -> Self {
        ObjectKey {
            namespace: object.namespace(),
            name: object.name_any(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Everything the operator needs from the API server.
///
/// `get` maps "not found" to `Ok(None)`. `update` fails with a 409 conflict
/// when the object's resourceVersion is stale. `patch` applies a JSON merge
/// patch; a `metadata.resourceVersion` in the patch makes it conditional in the
/// same way.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn get<K: Managed>(&self, key: &ObjectKey) -> Result<Option<K>>;

    async fn list<K: Managed>(&self, namespace: &str, limit: u32) -> Result<Vec<K>>;

    async fn create<K: Managed>(&self, object: &K) -> Result<K>;

    async fn update<K: Managed>(&self, object: &K) -> Result<K>;

    async fn patch<K: Managed>(&self, key: &ObjectKey, patch: &Value) -> Result<K>;
}

#[async_trait]
impl<T: ControlPlane> ControlPlane for Arc<T> {
    async fn get<K: Managed>(&self, key: &ObjectKey) -> Result<Option<K>> {
        (**self).get::<K>(key).await
    }

    async fn list<K: Managed>(&self, namespace: &str, limit: u32) -> Result<Vec<K>> {
        (**self).list::<K>(namespace, limit).await
    }

    async fn create<K: Managed>(&self, object: &K) -> Result<K> {
        (**self).create::<K>(object).await
    }

    async fn update<K: Managed>(&self, object: &K) -> Result<K> {
        (**self).update::<K>(object).await
    }

    async fn patch<K: Managed>(&self, key: &ObjectKey, patch: &Value) -> Result<K> {
        (**self).patch::<K>(key, patch).await
    }
}

/// `ControlPlane` backed by a kube client.
///
/// Typed records go over the wire as `DynamicObject` so namespaced and
/// cluster-scoped kinds share one code path.
#[derive(Clone)]
pub struct KubeControlPlane {
    client: Client,
}

impl KubeControlPlane {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K: Managed>(&self, namespace: Option<&str>) -> Api<DynamicObject> {
        let resource = ApiResource::erase::<K>(&());
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &resource),
            None => Api::all_with(self.client.clone(), &resource),
        }
    }

    fn patch_params() -> PatchParams {
        PatchParams {
            field_manager: Some(OPERATOR_NAME.to_string()),
            ..Default::default()
        }
    }

    fn post_params() -> PostParams {
        PostParams {
            field_manager: Some(OPERATOR_NAME.to_string()),
            ..Default::default()
        }
    }
}

fn to_dynamic<K: Managed>(object: &K) -> Result<DynamicObject> {
    Ok(serde_json::from_value(serde_json::to_value(object)?)?)
}

fn from_dynamic<K: Managed>(object: DynamicObject) -> Result<K> {
    Ok(serde_json::from_value(serde_json::to_value(object)?)?)
}

#[async_trait]
impl ControlPlane for KubeControlPlane {
    async fn get<K: Managed>(&self, key: &ObjectKey) -> Result<Option<K>> {
        let api = self.api::<K>(key.namespace.as_deref());
        match api.get(&key.name).await {
            Ok(object) => Ok(Some(from_dynamic(object)?)),
            Err(kube::Error::Api(err)) if err.code == 404 => {
                debug!("{} {} not found", K::kind(&()), key);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list<K: Managed>(&self, namespace: &str, limit: u32) -> Result<Vec<K>> {
        let api = self.api::<K>(Some(namespace));
        let objects = api.list(&ListParams::default().limit(limit)).await?;
        objects.items.into_iter().map(from_dynamic).collect()
    }

    async fn create<K: Managed>(&self, object: &K) -> Result<K> {
        let api = self.api::<K>(object.meta().namespace.as_deref());
        let created = api
            .create(&Self::post_params(), &to_dynamic(object)?)
            .await?;
        from_dynamic(created)
    }

    async fn update<K: Managed>(&self, object: &K) -> Result<K> {
        let api = self.api::<K>(object.meta().namespace.as_deref());
        let updated = api
            .replace(&object.name_any(), &Self::post_params(), &to_dynamic(object)?)
            .await?;
        from_dynamic(updated)
    }

    async fn patch<K: Managed>(&self, key: &ObjectKey, patch: &Value) -> Result<K> {
        let api = self.api::<K>(key.namespace.as_deref());
        let patched = api
            .patch(&key.name, &Self::patch_params(), &Patch::Merge(patch))
            .await?;
        from_dynamic(patched)
    }
}
