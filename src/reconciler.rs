// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! The capability the controller engine is parameterized by.

use crate::error::Result;
use crate::key::ObjectKey;
use crate::store::LocalCache;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// What to do with a key after a successful reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Action {
    requeue_after: Option<Duration>,
}

impl Action {
    /// Converged. Forget the key until the next change notification.
    pub fn await_change() -> Self {
        Self {
            requeue_after: None,
        }
    }

    /// Waiting on an external condition. Run again after `duration`
    /// without touching the key's backoff.
    pub fn requeue(duration: Duration) -> Self {
        Self {
            requeue_after: Some(duration),
        }
    }

    pub fn requeue_after(&self) -> Option<Duration> {
        self.requeue_after
    }
}

/// Drives one resource instance toward its declared state.
///
/// Must be idempotent: reconciling an unchanged object a second time
/// performs no writes.
#[async_trait]
pub trait Reconciler: Send + Sync {
    async fn reconcile(&self, key: &ObjectKey) -> Result<Action>;
}

/// Adapts an async closure into a [`Reconciler`].
pub struct FnReconciler<F>(F);

pub fn reconciler_fn<F, Fut>(f: F) -> FnReconciler<F>
where
    F: Fn(ObjectKey) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Action>> + Send,
{
    FnReconciler(f)
}

#[async_trait]
impl<F, Fut> Reconciler for FnReconciler<F>
where
    F: Fn(ObjectKey) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Action>> + Send,
{
    async fn reconcile(&self, key: &ObjectKey) -> Result<Action> {
        (self.0)(key.clone()).await
    }
}

/// Per-kind logic run by an [`ObjectReconciler`].
#[async_trait]
pub trait Handler<K>: Send + Sync
where
    K: Send + Sync + 'static,
{
    /// Converge the world toward `obj`.
    async fn apply(&self, obj: Arc<K>) -> Result<Action>;

    /// The object behind `key` no longer exists. Tear down anything it owned.
    async fn cleanup(&self, key: &ObjectKey) -> Result<Action> {
        debug!("No cleanup for {}", key);
        Ok(Action::await_change())
    }
}

/// Looks a key up in the local cache and hands the object to a [`Handler`].
///
/// A key missing from the cache means the object was deleted, possibly after
/// the notification that queued the key. That is the normal outcome of
/// racing the watch stream and runs the handler's cleanup instead of failing.
pub struct ObjectReconciler<C, H> {
    cache: C,
    handler: H,
}

impl<C, H> ObjectReconciler<C, H> {
    pub fn new(cache: C, handler: H) -> Self {
        Self { cache, handler }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}

#[async_trait]
impl<C, H> Reconciler for ObjectReconciler<C, H>
where
    C: LocalCache,
    H: Handler<C::Object>,
{
    #[instrument(skip(self, key), fields(key = %key))]
    async fn reconcile(&self, key: &ObjectKey) -> Result<Action> {
        match self.cache.get(key) {
            Some(obj) => self.handler.apply(obj).await,
            None => {
                info!("Not doing work for {} because it has been deleted", key);
                self.handler.cleanup(key).await
            }
        }
    }
}
