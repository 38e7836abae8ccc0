// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities: an HTTP-level mock for the kube client and an in-memory
//! control plane for reconciler tests.

use crate::error::OperatorError;
use crate::kubernetes::client::{ControlPlane, Managed, ObjectKey};
use async_trait::async_trait;
use http::{Request, Response};
use kube::client::Body;
use kube::error::ErrorResponse;
use kube::Client;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

/// Canned API server: answers by method and path, 404 for anything unknown.
#[derive(Clone)]
pub struct MockService {
    routes: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            routes: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Answer `method` requests on `path` (or any path below it)
    pub fn on(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.routes.lock().unwrap().insert(
            (method.to_string(), path.to_string()),
            (status, body.to_string()),
        );
        self
    }

    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.on("GET", path, status, body)
    }

    pub fn on_post(self, path: &str, status: u16, body: &str) -> Self {
        self.on("POST", path, status, body)
    }

    pub fn on_put(self, path: &str, status: u16, body: &str) -> Self {
        self.on("PUT", path, status, body)
    }

    pub fn into_client(self) -> Client {
        Client::new(self, "default")
    }

    /// Exact route first, then the longest matching prefix
    fn lookup(&self, method: &str, path: &str) -> Option<(u16, String)> {
        let routes = self.routes.lock().unwrap();
        if let Some(found) = routes.get(&(method.to_string(), path.to_string())) {
            return Some(found.clone());
        }
        routes
            .iter()
            .filter(|((m, p), _)| m == method && path.starts_with(p.as_str()))
            .max_by_key(|((_, p), _)| p.len())
            .map(|(_, found)| found.clone())
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let (status, body) = self
            .lookup(req.method().as_str(), req.uri().path())
            .unwrap_or_else(|| (404, not_found_json("resource", req.uri().path())));

        Box::pin(async move {
            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body.into_bytes()))
                .unwrap())
        })
    }
}

/// Namespace as the API server returns it
pub fn namespace_json(name: &str) -> String {
    serde_json::json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": {
            "name": name,
            "uid": "test-uid"
        }
    })
    .to_string()
}

/// `Status` body of a 404
pub fn not_found_json(resource: &str, name: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": format!("{} \"{}\" not found", resource, name),
        "reason": "NotFound",
        "code": 404
    })
    .to_string()
}

/// Build the error an API server would return
pub fn api_error(code: u16, reason: &str, message: impl Into<String>) -> OperatorError {
    OperatorError::KubeError(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: message.into(),
        reason: reason.to_string(),
        code,
    }))
}

type StoreKey = (String, Option<String>, String);

#[derive(Default)]
struct FakeState {
    objects: BTreeMap<StoreKey, Value>,
    next_version: u64,
    unregistered: HashSet<String>,
    get_failures: VecDeque<(u16, String)>,
    list_failures: VecDeque<(u16, String)>,
    pending_conflicts: u32,
    gets: u32,
    lists: u32,
    creates: u32,
    updates: u32,
}

impl FakeState {
    fn bump_version(&mut self) -> String {
        self.next_version += 1;
        self.next_version.to_string()
    }
}

/// In-memory API server: tracks resourceVersion and generation, rejects
/// stale updates and can pretend a kind is not registered.
#[derive(Default)]
pub struct FakeControlPlane {
    state: Mutex<FakeState>,
}

fn kind_of<K: Managed>() -> String {
    format!("{}/{}", K::api_version(&()), K::kind(&()))
}

fn store_key<K: Managed>(key: &ObjectKey) -> StoreKey {
    (kind_of::<K>(), key.namespace.clone(), key.name.clone())
}

fn key_of(value: &Value) -> ObjectKey {
    let meta = &value["metadata"];
    ObjectKey {
        namespace: meta["namespace"].as_str().map(str::to_string),
        name: meta["name"].as_str().unwrap_or_default().to_string(),
    }
}

/// Object without the fields the server owns, for change detection
fn without_server_fields(value: &Value) -> Value {
    let mut value = value.clone();
    if let Some(meta) = value.get_mut("metadata").and_then(Value::as_object_mut) {
        meta.remove("resourceVersion");
        meta.remove("generation");
        meta.remove("uid");
    }
    value
}

fn spec_part(value: &Value) -> Value {
    let mut value = without_server_fields(value);
    if let Some(obj) = value.as_object_mut() {
        obj.remove("metadata");
        obj.remove("status");
    }
    value
}

impl FakeControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer 404 for every call on `K` until [`register_kind`] is called
    pub fn without_kind<K: Managed>(self) -> Self {
        self.state.lock().unwrap().unregistered.insert(kind_of::<K>());
        self
    }

    pub fn register_kind<K: Managed>(&self) {
        self.state.lock().unwrap().unregistered.remove(&kind_of::<K>());
    }

    /// Store an object as if someone else wrote it, bumping its resourceVersion
    pub fn insert<K: Managed>(&self, object: &K) {
        self.insert_value::<K>(serde_json::to_value(object).unwrap());
    }

    /// Like [`insert`](Self::insert), for payloads with fields `K` does not model
    pub fn insert_value<K: Managed>(&self, mut value: Value) {
        let mut state = self.state.lock().unwrap();
        let key = key_of(&value);
        let version = state.bump_version();
        let generation = state
            .objects
            .get(&store_key::<K>(&key))
            .and_then(|old| old["metadata"]["generation"].as_i64())
            .unwrap_or(0)
            + 1;
        value["metadata"]["resourceVersion"] = Value::String(version);
        value["metadata"]["generation"] = Value::from(generation);
        state.objects.insert(store_key::<K>(&key), value);
    }

    /// Current stored copy, bypassing call counters
    pub fn object<K: Managed>(&self, key: &ObjectKey) -> Option<K> {
        self.value::<K>(key)
            .map(|v| serde_json::from_value(v).unwrap())
    }

    /// Stored payload as written, including fields `K` does not model
    pub fn value<K: Managed>(&self, key: &ObjectKey) -> Option<Value> {
        let state = self.state.lock().unwrap();
        state.objects.get(&store_key::<K>(key)).cloned()
    }

    pub fn fail_next_get(&self, code: u16, reason: &str) {
        let mut state = self.state.lock().unwrap();
        state.get_failures.push_back((code, reason.to_string()));
    }

    pub fn fail_next_list(&self, code: u16, reason: &str) {
        let mut state = self.state.lock().unwrap();
        state.list_failures.push_back((code, reason.to_string()));
    }

    /// Reject the next `count` updates or patches with a version conflict
    pub fn fail_next_updates(&self, count: u32) {
        self.state.lock().unwrap().pending_conflicts += count;
    }

    pub fn get_calls(&self) -> u32 {
        self.state.lock().unwrap().gets
    }

    pub fn list_calls(&self) -> u32 {
        self.state.lock().unwrap().lists
    }

    pub fn create_calls(&self) -> u32 {
        self.state.lock().unwrap().creates
    }

    pub fn update_calls(&self) -> u32 {
        self.state.lock().unwrap().updates
    }

    /// Write `value` over the stored copy; no-op writes keep the resourceVersion
    /// and generation only moves when something outside metadata changes
    fn write(state: &mut FakeState, skey: StoreKey, stored: &Value, mut value: Value) -> Value {
        if without_server_fields(&value) == without_server_fields(stored) {
            return stored.clone();
        }
        let generation = stored["metadata"]["generation"].as_i64().unwrap_or(1);
        let generation = if spec_part(&value) == spec_part(stored) {
            generation
        } else {
            generation + 1
        };
        let version = state.bump_version();
        value["metadata"]["resourceVersion"] = Value::String(version);
        value["metadata"]["generation"] = Value::from(generation);
        state.objects.insert(skey, value.clone());
        value
    }

    fn check_registered<K: Managed>(state: &FakeState) -> crate::error::Result<()> {
        if state.unregistered.contains(&kind_of::<K>()) {
            return Err(api_error(
                404,
                "NotFound",
                "the server could not find the requested resource",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn get<K: Managed>(&self, key: &ObjectKey) -> crate::error::Result<Option<K>> {
        let mut state = self.state.lock().unwrap();
        state.gets += 1;
        if let Some((code, reason)) = state.get_failures.pop_front() {
            return Err(api_error(code, &reason, "injected get failure"));
        }
        // Unknown kinds answer 404, which a real client reports as absent
        if state.unregistered.contains(&kind_of::<K>()) {
            return Ok(None);
        }
        match state.objects.get(&store_key::<K>(key)) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    async fn list<K: Managed>(&self, namespace: &str, limit: u32) -> crate::error::Result<Vec<K>> {
        let mut state = self.state.lock().unwrap();
        state.lists += 1;
        if let Some((code, reason)) = state.list_failures.pop_front() {
            return Err(api_error(code, &reason, "injected list failure"));
        }
        Self::check_registered::<K>(&state)?;
        let kind = kind_of::<K>();
        state
            .objects
            .iter()
            .filter(|((k, ns, _), _)| *k == kind && ns.as_deref() == Some(namespace))
            .take(limit as usize)
            .map(|(_, v)| serde_json::from_value(v.clone()).map_err(OperatorError::from))
            .collect()
    }

    async fn create<K: Managed>(&self, object: &K) -> crate::error::Result<K> {
        let mut state = self.state.lock().unwrap();
        state.creates += 1;
        Self::check_registered::<K>(&state)?;
        let mut value = serde_json::to_value(object)?;
        let key = key_of(&value);
        let skey = store_key::<K>(&key);
        if state.objects.contains_key(&skey) {
            return Err(api_error(
                409,
                "AlreadyExists",
                format!("{} {} already exists", K::kind(&()), key),
            ));
        }
        let version = state.bump_version();
        value["metadata"]["resourceVersion"] = Value::String(version);
        value["metadata"]["generation"] = Value::from(1);
        state.objects.insert(skey, value.clone());
        Ok(serde_json::from_value(value)?)
    }

    async fn update<K: Managed>(&self, object: &K) -> crate::error::Result<K> {
        let mut state = self.state.lock().unwrap();
        state.updates += 1;
        Self::check_registered::<K>(&state)?;
        if state.pending_conflicts > 0 {
            state.pending_conflicts -= 1;
            return Err(api_error(409, "Conflict", "the object has been modified"));
        }
        let value = serde_json::to_value(object)?;
        let key = key_of(&value);
        let skey = store_key::<K>(&key);
        let Some(stored) = state.objects.get(&skey).cloned() else {
            return Err(api_error(
                404,
                "NotFound",
                format!("{} {} not found", K::kind(&()), key),
            ));
        };
        if value["metadata"]["resourceVersion"] != stored["metadata"]["resourceVersion"] {
            return Err(api_error(409, "Conflict", "the object has been modified"));
        }
        let written = Self::write(&mut state, skey, &stored, value);
        Ok(serde_json::from_value(written)?)
    }

    async fn patch<K: Managed>(&self, key: &ObjectKey, patch: &Value) -> crate::error::Result<K> {
        let mut state = self.state.lock().unwrap();
        state.updates += 1;
        Self::check_registered::<K>(&state)?;
        if state.pending_conflicts > 0 {
            state.pending_conflicts -= 1;
            return Err(api_error(409, "Conflict", "the object has been modified"));
        }
        let skey = store_key::<K>(key);
        let Some(stored) = state.objects.get(&skey).cloned() else {
            return Err(api_error(
                404,
                "NotFound",
                format!("{} {} not found", K::kind(&()), key),
            ));
        };
        let expected = &patch["metadata"]["resourceVersion"];
        if !expected.is_null() && *expected != stored["metadata"]["resourceVersion"] {
            return Err(api_error(409, "Conflict", "the object has been modified"));
        }
        let mut value = stored.clone();
        merge_patch(&mut value, patch);
        let written = Self::write(&mut state, skey, &stored, value);
        Ok(serde_json::from_value(written)?)
    }
}

/// RFC 7386 merge: objects merge key by key, `null` removes, anything else replaces
fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Default::default());
    }
    if let Value::Object(target) = target {
        for (key, value) in patch {
            if value.is_null() {
                target.remove(key);
            } else {
                merge_patch(target.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_patch_keeps_unmentioned_fields() {
        let mut target = json!({
            "metadata": { "labels": { "a": "1", "b": "2" } },
            "spec": { "source": { "path": "old", "chart": "c" } },
            "status": { "health": "Healthy" }
        });

        merge_patch(
            &mut target,
            &json!({
                "metadata": { "labels": { "a": null, "c": "3" } },
                "spec": { "source": { "path": "new" } }
            }),
        );

        assert_eq!(
            target,
            json!({
                "metadata": { "labels": { "b": "2", "c": "3" } },
                "spec": { "source": { "path": "new", "chart": "c" } },
                "status": { "health": "Healthy" }
            })
        );
    }
}
