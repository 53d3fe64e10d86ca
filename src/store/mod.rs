// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Read/write access to the authoritative object store and the local cache.

pub mod api;
pub mod cache;

pub use api::KubeStore;
pub use cache::LocalCache;

use crate::error::Result;
use crate::key::ObjectKey;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// A change observed on the object store.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent<K> {
    Added(K),
    Modified(K),
    Deleted(K),
}

impl<K> WatchEvent<K> {
    pub fn object(&self) -> &K {
        match self {
            WatchEvent::Added(obj) | WatchEvent::Modified(obj) | WatchEvent::Deleted(obj) => obj,
        }
    }
}

/// Authoritative store of resource objects, addressed by namespaced name.
///
/// Errors classify through [`crate::error::FederatorError::kind`]: a missing
/// object is `NotFound`, a resource-version mismatch is `Conflict`.
#[async_trait]
pub trait ObjectStore<K>: Send + Sync
where
    K: Send + Sync + 'static,
{
    async fn get(&self, key: &ObjectKey) -> Result<K>;

    /// Like [`ObjectStore::get`], mapping not-found to `None`.
    async fn get_opt(&self, key: &ObjectKey) -> Result<Option<K>> {
        match self.get(key).await {
            Ok(obj) => Ok(Some(obj)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// List objects in `namespace`, or everywhere when `None`.
    async fn list(&self, namespace: Option<&str>) -> Result<Vec<K>>;

    async fn create(&self, obj: &K) -> Result<K>;

    /// Replace an existing object. Fails with a conflict when the object's
    /// resource version is stale.
    async fn replace(&self, obj: &K) -> Result<K>;

    async fn delete(&self, key: &ObjectKey) -> Result<()>;

    /// Apply a JSON merge patch.
    async fn patch(&self, key: &ObjectKey, patch: &serde_json::Value) -> Result<K>;

    async fn watch(
        &self,
        namespace: Option<&str>,
    ) -> Result<BoxStream<'static, Result<WatchEvent<K>>>>;
}
