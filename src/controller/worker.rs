// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Worker loop: pull a key, reconcile it, report the outcome to the queue.

use crate::error::{ErrorKind, FederatorError};
use crate::key::ObjectKey;
use crate::queue::WorkQueue;
use crate::reconciler::Reconciler;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// What happened to a key after one reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Success,
    Requeued(Duration),
    Retrying(Duration),
    Dropped,
}

pub(crate) async fn run_worker<R>(id: usize, queue: Arc<WorkQueue<ObjectKey>>, reconciler: Arc<R>)
where
    R: Reconciler + ?Sized,
{
    debug!(queue = queue.name(), worker = id, "Worker started");

    while let Some(key) = queue.get().await {
        // The key must be released even if outcome handling blows up,
        // otherwise it stays in flight forever.
        let handled = AssertUnwindSafe(process(&queue, reconciler.as_ref(), &key))
            .catch_unwind()
            .await;
        if let Err(panic) = handled {
            error!(
                key = %key,
                "Worker recovered from a panic while handling the outcome: {}",
                panic_message(panic.as_ref())
            );
        }
        queue.done(&key);
    }

    debug!(queue = queue.name(), worker = id, "Worker stopped");
}

pub(crate) async fn process<R>(queue: &WorkQueue<ObjectKey>, reconciler: &R, key: &ObjectKey) -> Outcome
where
    R: Reconciler + ?Sized,
{
    let result = AssertUnwindSafe(reconciler.reconcile(key))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(FederatorError::Panicked(panic_message(panic.as_ref()))));

    let err = match result {
        Ok(action) => {
            return match action.requeue_after() {
                None => {
                    queue.forget(key);
                    debug!(key = %key, "Reconciled");
                    Outcome::Success
                }
                Some(delay) => {
                    queue.add_after(key.clone(), delay);
                    debug!(
                        key = %key,
                        requeue_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Reconciled, requeue requested"
                    );
                    Outcome::Requeued(delay)
                }
            };
        }
        Err(err) => err,
    };

    match err.kind() {
        ErrorKind::NotFound => {
            queue.forget(key);
            info!(key = %key, "Object went away during reconcile: {}", err);
            Outcome::Success
        }
        ErrorKind::Fatal => {
            queue.forget(key);
            error!(key = %key, "Dropping key after unrecoverable error: {}", err);
            Outcome::Dropped
        }
        ErrorKind::Conflict | ErrorKind::Transient => {
            let retries = queue.num_requeues(key);
            let delay = queue.add_rate_limited(key.clone());
            warn!(
                key = %key,
                retries,
                backoff_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Reconcile failed, retrying: {}",
                err
            );
            Outcome::Retrying(delay)
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
