// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Controller lifecycle: one queue, a pool of workers, one reconciler.

mod worker;

use crate::bridge::EventBridge;
use crate::constants::queue::{
    BACKOFF_BASE_MS, BACKOFF_MAX_SECS, BUCKET_BURST, BUCKET_QPS, WORKER_COUNT,
};
use crate::key::ObjectKey;
use crate::queue::{ExponentialBackoff, MaxOf, TokenBucket, WorkQueue};
use crate::reconciler::Reconciler;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Worker pool size and retry tuning for one controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    pub workers: usize,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub qps: f64,
    pub burst: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: WORKER_COUNT,
            backoff_base: Duration::from_millis(BACKOFF_BASE_MS),
            backoff_max: Duration::from_secs(BACKOFF_MAX_SECS),
            qps: BUCKET_QPS,
            burst: BUCKET_BURST,
        }
    }
}

impl ControllerConfig {
    /// Per-key exponential backoff combined with the overall token bucket.
    pub fn rate_limiter<K>(&self) -> MaxOf<K>
    where
        K: Clone + Eq + Hash + Send + Sync + 'static,
    {
        MaxOf::new(vec![
            Box::new(ExponentialBackoff::new(self.backoff_base, self.backoff_max)),
            Box::new(TokenBucket::new(self.qps, self.burst)),
        ])
    }
}

/// Drives keys from a [`WorkQueue`] through a [`Reconciler`] with a fixed
/// number of workers.
pub struct Controller<R> {
    queue: Arc<WorkQueue<ObjectKey>>,
    reconciler: Arc<R>,
    workers: usize,
}

impl<R> Controller<R>
where
    R: Reconciler + 'static,
{
    pub fn new(name: impl Into<String>, reconciler: R, config: &ControllerConfig) -> Self {
        let queue = WorkQueue::new(name, config.rate_limiter());
        Self::with_queue(Arc::new(queue), reconciler, config.workers)
    }

    pub fn with_queue(queue: Arc<WorkQueue<ObjectKey>>, reconciler: R, workers: usize) -> Self {
        Self {
            queue,
            reconciler: Arc::new(reconciler),
            workers: workers.max(1),
        }
    }

    pub fn queue(&self) -> Arc<WorkQueue<ObjectKey>> {
        self.queue.clone()
    }

    /// A bridge feeding this controller's queue.
    pub fn event_bridge(&self) -> EventBridge {
        EventBridge::new(self.queue.clone())
    }

    /// Spawn the workers. The queue shuts down once `shutdown` turns true or
    /// its sender is dropped.
    pub fn start(self, mut shutdown: watch::Receiver<bool>) -> ControllerHandle {
        info!(
            controller = self.queue.name(),
            workers = self.workers,
            "Starting controller"
        );

        let workers = (0..self.workers)
            .map(|id| {
                tokio::spawn(worker::run_worker(
                    id,
                    self.queue.clone(),
                    self.reconciler.clone(),
                ))
            })
            .collect();

        let queue = self.queue.clone();
        let signal = tokio::spawn(async move {
            // Err means the sender is gone, which is a shutdown too.
            let _ = shutdown.wait_for(|stop| *stop).await;
            info!(controller = queue.name(), "Shutdown requested");
            queue.shut_down();
        });

        ControllerHandle {
            queue: self.queue,
            workers,
            signal,
        }
    }

    /// Start and wait until shut down.
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        self.start(shutdown).wait().await;
    }
}

/// A running controller.
pub struct ControllerHandle {
    queue: Arc<WorkQueue<ObjectKey>>,
    workers: Vec<JoinHandle<()>>,
    signal: JoinHandle<()>,
}

impl ControllerHandle {
    pub fn queue(&self) -> Arc<WorkQueue<ObjectKey>> {
        self.queue.clone()
    }

    /// Stop handing out keys without waiting for the shutdown signal.
    pub fn shut_down(&self) {
        self.queue.shut_down();
    }

    /// Wait for every worker to exit. In-flight reconciles run to completion.
    pub async fn wait(self) {
        for worker in self.workers {
            if let Err(e) = worker.await {
                error!(controller = self.queue.name(), "Worker task failed: {}", e);
            }
        }
        self.signal.abort();
        info!(controller = self.queue.name(), "Controller stopped");
    }
}
