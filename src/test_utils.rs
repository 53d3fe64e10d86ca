// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities: a mocked Kubernetes API and in-memory stores.

use crate::error::{ErrorKind, FederatorError, Result};
use crate::key::ObjectKey;
use crate::store::{LocalCache, ObjectStore, WatchEvent};
use crate::types::{ConfigMapTemplate, FederatedConfigMap, FederatedConfigMapSpec};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use http::{Request, Response};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::ObjectMeta;
use kube::client::Body;
use kube::{Client, Resource};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tower::Service;

/// A mock HTTP service that returns predefined responses based on request paths.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
    requests: Arc<Mutex<Vec<(String, String)>>>,
    content_types: Arc<Mutex<Vec<Option<String>>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            content_types: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add a response for requests with `method` matching the exact path
    pub fn on(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.responses.lock().unwrap().insert(
            (method.to_string(), path.to_string()),
            (status, body.to_string()),
        );
        self
    }

    /// Add a response for GET requests matching the exact path
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.on("GET", path, status, body)
    }

    /// Every `(method, path)` received so far
    pub fn requests(&self) -> Arc<Mutex<Vec<(String, String)>>> {
        self.requests.clone()
    }

    /// The `content-type` header of every request received so far
    pub fn content_types(&self) -> Arc<Mutex<Vec<Option<String>>>> {
        self.content_types.clone()
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "https://kubernetes.default.svc")
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        let responses = self.responses.lock().unwrap();

        if let Some(resp) = responses.get(&(method.to_string(), path.to_string())) {
            return Some(resp.clone());
        }

        // Try prefix match for paths like /api/v1/namespaces/foo
        for ((m, p), resp) in responses.iter() {
            if m == method && path.starts_with(p) {
                return Some(resp.clone());
            }
        }

        None
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
        Box<dyn std::future::Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();
        let content_type = req
            .headers()
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.content_types.lock().unwrap().push(content_type);

        self.requests
            .lock()
            .unwrap()
            .push((method.clone(), path.clone()));
        let (status, body) = self
            .find_response(&method, &path)
            .unwrap_or_else(|| (404, status_json(404, "NotFound", "not found")));

        Box::pin(async move {
            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body.into_bytes()))
                .unwrap())
        })
    }
}

/// Create a mock ConfigMap JSON response
pub fn config_map_json(namespace: &str, name: &str, resource_version: &str) -> String {
    serde_json::json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": {
            "name": name,
            "namespace": namespace,
            "resourceVersion": resource_version,
            "uid": "test-uid"
        },
        "data": {}
    })
    .to_string()
}

/// Create a Status failure response
pub fn status_json(code: u16, reason: &str, message: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": message,
        "reason": reason,
        "code": code
    })
    .to_string()
}

pub fn config_map(namespace: &str, name: &str, data: &[(&str, &str)]) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        data: Some(
            data.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ),
        ..Default::default()
    }
}

pub fn federated_config_map(
    namespace: &str,
    name: &str,
    data: &[(&str, &str)],
    depends_on: Option<&str>,
) -> FederatedConfigMap {
    let mut fcm = FederatedConfigMap::new(
        name,
        FederatedConfigMapSpec {
            template: ConfigMapTemplate {
                data: data
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            },
            depends_on: depends_on.map(str::to_string),
        },
    );
    fcm.metadata.namespace = Some(namespace.to_string());
    fcm.metadata.uid = Some(format!("uid-{}", name));
    fcm
}

/// In-memory [`LocalCache`].
pub struct MemoryCache<K> {
    objects: Arc<RwLock<BTreeMap<ObjectKey, Arc<K>>>>,
}

impl<K> Clone for MemoryCache<K> {
    fn clone(&self) -> Self {
        Self {
            objects: self.objects.clone(),
        }
    }
}

impl<K: Resource> MemoryCache<K> {
    pub fn new() -> Self {
        Self {
            objects: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    pub fn insert(&self, obj: K) -> Arc<K> {
        let key = ObjectKey::from_resource(&obj).unwrap();
        let obj = Arc::new(obj);
        self.objects.write().unwrap().insert(key, obj.clone());
        obj
    }

    pub fn remove(&self, key: &ObjectKey) -> Option<Arc<K>> {
        self.objects.write().unwrap().remove(key)
    }
}

impl<K: Send + Sync + 'static> LocalCache for MemoryCache<K> {
    type Object = K;

    fn get(&self, key: &ObjectKey) -> Option<Arc<K>> {
        self.objects.read().unwrap().get(key).cloned()
    }

    fn list(&self) -> Vec<Arc<K>> {
        self.objects.read().unwrap().values().cloned().collect()
    }
}

/// A write performed against a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    Create(ObjectKey),
    Replace(ObjectKey),
    Delete(ObjectKey),
    Patch(ObjectKey),
}

struct StoreState<K> {
    objects: BTreeMap<ObjectKey, K>,
    writes: Vec<Write>,
    failures: VecDeque<ErrorKind>,
    version: u64,
    watchers: Vec<mpsc::UnboundedSender<WatchEvent<K>>>,
}

/// In-memory [`ObjectStore`] with resource versions, a write log and
/// injectable write failures.
pub struct MemoryStore<K> {
    state: Arc<Mutex<StoreState<K>>>,
}

impl<K> Clone for MemoryStore<K> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<K: Resource + Clone> MemoryStore<K> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState {
                objects: BTreeMap::new(),
                writes: Vec::new(),
                failures: VecDeque::new(),
                version: 0,
                watchers: Vec::new(),
            })),
        }
    }

    /// Seed an object without recording a write.
    pub fn insert(&self, mut obj: K) {
        let key = ObjectKey::from_resource(&obj).unwrap();
        let mut state = self.state.lock().unwrap();
        state.version += 1;
        obj.meta_mut().resource_version = Some(state.version.to_string());
        state.objects.insert(key, obj);
    }

    pub fn object(&self, key: &ObjectKey) -> Option<K> {
        self.state.lock().unwrap().objects.get(key).cloned()
    }

    pub fn writes(&self) -> Vec<Write> {
        self.state.lock().unwrap().writes.clone()
    }

    /// Fail the next `count` writes with an error of `kind`.
    pub fn fail_next_writes(&self, kind: ErrorKind, count: usize) {
        let mut state = self.state.lock().unwrap();
        state.failures.extend(std::iter::repeat(kind).take(count));
    }
}

impl<K: Clone> StoreState<K> {
    fn take_failure(&mut self, key: &ObjectKey) -> Result<()> {
        let Some(kind) = self.failures.pop_front() else {
            return Ok(());
        };
        let what = format!("injected failure writing {}", key);
        Err(match kind {
            ErrorKind::NotFound => FederatorError::NotFound(what),
            ErrorKind::Conflict => FederatorError::Conflict(what),
            ErrorKind::Transient => FederatorError::Transient(what),
            ErrorKind::Fatal => FederatorError::InvalidObject(what),
        })
    }

    fn next_version(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }

    fn publish(&mut self, event: WatchEvent<K>) {
        self.watchers
            .retain(|watcher| watcher.send(event.clone()).is_ok());
    }
}

fn merge_patch(target: &mut serde_json::Value, patch: &serde_json::Value) {
    let serde_json::Value::Object(patch) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = serde_json::json!({});
    }
    if let serde_json::Value::Object(target) = target {
        for (field, value) in patch {
            if value.is_null() {
                target.remove(field);
            } else {
                merge_patch(
                    target.entry(field.clone()).or_insert(serde_json::Value::Null),
                    value,
                );
            }
        }
    }
}

#[async_trait]
impl<K> ObjectStore<K> for MemoryStore<K>
where
    K: Resource + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, key: &ObjectKey) -> Result<K> {
        self.object(key)
            .ok_or_else(|| FederatorError::NotFound(key.to_string()))
    }

    async fn list(&self, namespace: Option<&str>) -> Result<Vec<K>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .objects
            .iter()
            .filter(|(key, _)| namespace.is_none() || key.namespace() == namespace)
            .map(|(_, obj)| obj.clone())
            .collect())
    }

    async fn create(&self, obj: &K) -> Result<K> {
        let key = ObjectKey::from_resource(obj)?;
        let mut state = self.state.lock().unwrap();
        state.take_failure(&key)?;
        if state.objects.contains_key(&key) {
            return Err(FederatorError::Conflict(format!("{} already exists", key)));
        }

        let mut created = obj.clone();
        created.meta_mut().resource_version = Some(state.next_version());
        state.objects.insert(key.clone(), created.clone());
        state.writes.push(Write::Create(key));
        state.publish(WatchEvent::Added(created.clone()));
        Ok(created)
    }

    async fn replace(&self, obj: &K) -> Result<K> {
        let key = ObjectKey::from_resource(obj)?;
        let mut state = self.state.lock().unwrap();
        state.take_failure(&key)?;
        let Some(current) = state.objects.get(&key) else {
            return Err(FederatorError::NotFound(key.to_string()));
        };
        if obj.meta().resource_version.is_some()
            && obj.meta().resource_version != current.meta().resource_version
        {
            return Err(FederatorError::Conflict(format!(
                "{} has been modified",
                key
            )));
        }

        let mut replaced = obj.clone();
        replaced.meta_mut().resource_version = Some(state.next_version());
        state.objects.insert(key.clone(), replaced.clone());
        state.writes.push(Write::Replace(key));
        state.publish(WatchEvent::Modified(replaced.clone()));
        Ok(replaced)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.take_failure(key)?;
        let Some(deleted) = state.objects.remove(key) else {
            return Err(FederatorError::NotFound(key.to_string()));
        };
        state.writes.push(Write::Delete(key.clone()));
        state.publish(WatchEvent::Deleted(deleted));
        Ok(())
    }

    async fn patch(&self, key: &ObjectKey, patch: &serde_json::Value) -> Result<K> {
        let mut state = self.state.lock().unwrap();
        state.take_failure(key)?;
        let Some(current) = state.objects.get(key) else {
            return Err(FederatorError::NotFound(key.to_string()));
        };

        let mut value = serde_json::to_value(current)
            .map_err(|e| FederatorError::InvalidObject(e.to_string()))?;
        merge_patch(&mut value, patch);
        let mut patched: K = serde_json::from_value(value)
            .map_err(|e| FederatorError::InvalidObject(e.to_string()))?;
        patched.meta_mut().resource_version = Some(state.next_version());

        state.objects.insert(key.clone(), patched.clone());
        state.writes.push(Write::Patch(key.clone()));
        state.publish(WatchEvent::Modified(patched.clone()));
        Ok(patched)
    }

    async fn watch(
        &self,
        namespace: Option<&str>,
    ) -> Result<BoxStream<'static, Result<WatchEvent<K>>>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.lock().unwrap().watchers.push(tx);
        let namespace = namespace.map(str::to_string);

        Ok(UnboundedReceiverStream::new(rx)
            .filter(move |event: &WatchEvent<K>| {
                let keep = namespace.is_none() || event.object().meta().namespace == namespace;
                futures::future::ready(keep)
            })
            .map(Ok)
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_detects_stale_writes() {
        let store = MemoryStore::new();
        let created = store.create(&config_map("ns", "foo", &[("a", "1")])).await.unwrap();

        let mut first = created.clone();
        first.data = Some(BTreeMap::from([("a".to_string(), "2".to_string())]));
        store.replace(&first).await.unwrap();

        let err = store.replace(&created).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_memory_store_merge_patch() {
        let store = MemoryStore::new();
        store.insert(config_map("ns", "foo", &[("a", "1"), ("b", "2")]));
        let key = ObjectKey::namespaced("ns", "foo");

        let patched = store
            .patch(&key, &serde_json::json!({ "data": { "a": null, "c": "3" } }))
            .await
            .unwrap();

        let data = patched.data.unwrap();
        assert_eq!(data.get("a"), None);
        assert_eq!(data.get("b").map(String::as_str), Some("2"));
        assert_eq!(data.get("c").map(String::as_str), Some("3"));
        assert_eq!(store.writes(), vec![Write::Patch(key)]);
    }

    #[tokio::test]
    async fn test_memory_store_watch_streams_changes() {
        let store = MemoryStore::new();
        let mut events = store.watch(Some("ns")).await.unwrap();

        store.create(&config_map("other", "skip", &[])).await.unwrap();
        store.create(&config_map("ns", "foo", &[])).await.unwrap();
        store.delete(&ObjectKey::namespaced("ns", "foo")).await.unwrap();

        let added = events.next().await.unwrap().unwrap();
        assert!(matches!(added, WatchEvent::Added(ref cm) if cm.metadata.name.as_deref() == Some("foo")));
        let deleted = events.next().await.unwrap().unwrap();
        assert!(matches!(deleted, WatchEvent::Deleted(_)));
    }
}
