// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! [`ObjectStore`] backed by the Kubernetes API server.

use super::{ObjectStore, WatchEvent};
use crate::error::{FederatorError, Result};
use crate::key::ObjectKey;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use k8s_openapi::NamespaceResourceScope;
use kube::{
    api::{DeleteParams, ListParams, Patch, PatchParams, PostParams, WatchParams},
    core::WatchEvent as ApiWatchEvent,
    Api, Client, Resource,
};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;
use std::marker::PhantomData;
use tracing::{debug, instrument};

/// Namespaced resources of kind `K`, read and written through a [`Client`].
pub struct KubeStore<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K> KubeStore<K> {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }
}

impl<K> Clone for KubeStore<K> {
    fn clone(&self) -> Self {
        Self::new(self.client.clone())
    }
}

impl<K> KubeStore<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
{
    fn api(&self, namespace: Option<&str>) -> Api<K> {
        match namespace {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::all(self.client.clone()),
        }
    }

    fn api_for(&self, key: &ObjectKey) -> Result<Api<K>> {
        let Some(namespace) = key.namespace() else {
            return Err(FederatorError::InvalidKey {
                key: key.to_string(),
                reason: "namespaced resource key has no namespace".to_string(),
            });
        };
        Ok(Api::namespaced(self.client.clone(), namespace))
    }
}

#[async_trait]
impl<K> ObjectStore<K> for KubeStore<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Serialize
        + Debug
        + Send
        + Sync
        + 'static,
{
    #[instrument(skip(self, key), fields(key = %key))]
    async fn get(&self, key: &ObjectKey) -> Result<K> {
        Ok(self.api_for(key)?.get(key.name()).await?)
    }

    async fn list(&self, namespace: Option<&str>) -> Result<Vec<K>> {
        let list = self.api(namespace).list(&ListParams::default()).await?;
        Ok(list.items)
    }

    async fn create(&self, obj: &K) -> Result<K> {
        let key = ObjectKey::from_resource(obj)?;
        debug!("Creating {} {}", K::kind(&()), key);
        Ok(self
            .api_for(&key)?
            .create(&PostParams::default(), obj)
            .await?)
    }

    async fn replace(&self, obj: &K) -> Result<K> {
        let key = ObjectKey::from_resource(obj)?;
        debug!("Replacing {} {}", K::kind(&()), key);
        Ok(self
            .api_for(&key)?
            .replace(key.name(), &PostParams::default(), obj)
            .await?)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<()> {
        debug!("Deleting {} {}", K::kind(&()), key);
        self.api_for(key)?
            .delete(key.name(), &DeleteParams::default())
            .await?;
        Ok(())
    }

    async fn patch(&self, key: &ObjectKey, patch: &serde_json::Value) -> Result<K> {
        Ok(self
            .api_for(key)?
            .patch(key.name(), &PatchParams::default(), &Patch::Merge(patch))
            .await?)
    }

    async fn watch(
        &self,
        namespace: Option<&str>,
    ) -> Result<BoxStream<'static, Result<WatchEvent<K>>>> {
        let events = self
            .api(namespace)
            .watch(&WatchParams::default(), "0")
            .await?;

        Ok(events
            .filter_map(|event| async move {
                match event {
                    Ok(ApiWatchEvent::Added(obj)) => Some(Ok(WatchEvent::Added(obj))),
                    Ok(ApiWatchEvent::Modified(obj)) => Some(Ok(WatchEvent::Modified(obj))),
                    Ok(ApiWatchEvent::Deleted(obj)) => Some(Ok(WatchEvent::Deleted(obj))),
                    Ok(ApiWatchEvent::Bookmark(_)) => None,
                    Ok(ApiWatchEvent::Error(err)) => Some(Err(kube::Error::Api(err).into())),
                    Err(err) => Some(Err(err.into())),
                }
            })
            .boxed())
    }
}
