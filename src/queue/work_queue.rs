// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Deduplicating, delaying, rate-limited queue of keys.

use super::rate_limiter::{default_controller_rate_limiter, RateLimiter};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::fmt::Display;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, trace};

/// Longest delay `add_after` honours. Keeps deadlines representable.
const MAX_DELAY: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Anything usable as a work queue key.
pub trait QueueKey: Clone + Eq + Hash + Ord + Display + Send + Sync + 'static {}

impl<T> QueueKey for T where T: Clone + Eq + Hash + Ord + Display + Send + Sync + 'static {}

struct State<K> {
    /// Keys ready to be handed out, in arrival order.
    queue: VecDeque<K>,
    /// Keys that need processing: everything in `queue`, plus in-flight keys
    /// that were added again while being processed.
    dirty: HashSet<K>,
    /// Keys currently held by a worker.
    processing: HashSet<K>,
    /// Delayed keys and the instant they become ready.
    waiting: HashMap<K, Instant>,
    /// Min-heap over `waiting`. Entries whose instant no longer matches
    /// `waiting` are stale and skipped.
    deadlines: BinaryHeap<Reverse<(Instant, K)>>,
    shutting_down: bool,
}

impl<K: QueueKey> State<K> {
    fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            dirty: HashSet::new(),
            processing: HashSet::new(),
            waiting: HashMap::new(),
            deadlines: BinaryHeap::new(),
            shutting_down: false,
        }
    }

    /// Returns true when the key became available to `get`.
    fn insert(&mut self, key: K) -> bool {
        if self.shutting_down || self.dirty.contains(&key) {
            return false;
        }

        self.dirty.insert(key.clone());
        if self.processing.contains(&key) {
            return false;
        }

        self.queue.push_back(key);
        true
    }

    /// Returns true when the key's ready instant moved earlier.
    fn schedule(&mut self, key: K, ready_at: Instant) -> bool {
        if self
            .waiting
            .get(&key)
            .is_some_and(|existing| *existing <= ready_at)
        {
            return false;
        }

        self.waiting.insert(key.clone(), ready_at);
        self.deadlines.push(Reverse((ready_at, key)));
        true
    }

    fn promote_due(&mut self, now: Instant) {
        while let Some(Reverse((ready_at, _))) = self.deadlines.peek() {
            if *ready_at > now {
                break;
            }
            let Some(Reverse((ready_at, key))) = self.deadlines.pop() else {
                break;
            };
            if self.waiting.get(&key) == Some(&ready_at) {
                self.waiting.remove(&key);
                self.insert(key);
            }
        }
    }

    fn next_deadline(&mut self) -> Option<Instant> {
        while let Some(Reverse((ready_at, key))) = self.deadlines.peek() {
            if self.waiting.get(key) == Some(ready_at) {
                return Some(*ready_at);
            }
            self.deadlines.pop();
        }
        None
    }
}

/// Work queue shared by an event source and a pool of workers.
///
/// A key is held by at most one worker at a time. Adding a key that is
/// already pending is a no-op; adding a key that is in flight marks it dirty
/// so it is handed out again as soon as the current holder calls
/// [`WorkQueue::done`].
pub struct WorkQueue<K> {
    name: String,
    state: Mutex<State<K>>,
    notify: Notify,
    rate_limiter: Box<dyn RateLimiter<K>>,
}

impl<K: QueueKey> WorkQueue<K> {
    pub fn new(name: impl Into<String>, rate_limiter: impl RateLimiter<K> + 'static) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(State::new()),
            notify: Notify::new(),
            rate_limiter: Box::new(rate_limiter),
        }
    }

    pub fn with_default_rate_limiter(name: impl Into<String>) -> Self {
        Self::new(name, default_controller_rate_limiter())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, State<K>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark `key` as needing processing.
    pub fn add(&self, key: K) {
        let ready = self.lock().insert(key);
        if ready {
            self.notify.notify_one();
        }
    }

    /// Add `key` once `delay` has passed. The key's backoff is untouched.
    /// If the key is already waiting, the earlier of the two instants wins.
    pub fn add_after(&self, key: K, delay: Duration) {
        if delay.is_zero() {
            return self.add(key);
        }

        let now = Instant::now();
        let ready_at = now
            .checked_add(delay.min(MAX_DELAY))
            .unwrap_or(now);
        let rescheduled = {
            let mut state = self.lock();
            !state.shutting_down && state.schedule(key, ready_at)
        };

        // Wake a waiter so it can shorten its sleep.
        if rescheduled {
            self.notify.notify_one();
        }
    }

    /// Add `key` after its rate-limited backoff. Returns the delay applied.
    pub fn add_rate_limited(&self, key: K) -> Duration {
        if self.is_shutting_down() {
            return Duration::ZERO;
        }

        let delay = self.rate_limiter.when(&key);
        trace!(queue = %self.name, key = %key, ?delay, "Rate limited requeue");
        self.add_after(key, delay);
        delay
    }

    /// Wait for the next ready key and mark it in flight.
    ///
    /// Returns `None` once the queue is shut down.
    pub async fn get(&self) -> Option<K> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);

            let deadline = {
                let mut state = self.lock();
                if state.shutting_down {
                    return None;
                }

                state.promote_due(Instant::now());
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    // Promotion may have readied more than one key.
                    if !state.queue.is_empty() {
                        self.notify.notify_one();
                    }
                    return Some(key);
                }

                // Register before unlocking so no add or shut_down is missed.
                notified.as_mut().enable();
                state.next_deadline()
            };

            match deadline {
                Some(deadline) => {
                    tokio::select! {
                        _ = &mut notified => {}
                        _ = sleep_until(deadline) => {}
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Release `key` after processing. A dirty key is queued again.
    pub fn done(&self, key: &K) {
        let requeued = {
            let mut state = self.lock();
            state.processing.remove(key);
            if !state.shutting_down && state.dirty.contains(key) {
                state.queue.push_back(key.clone());
                true
            } else {
                false
            }
        };

        if requeued {
            self.notify.notify_one();
        }
    }

    /// Reset the backoff of `key`.
    pub fn forget(&self, key: &K) {
        self.rate_limiter.forget(key);
    }

    pub fn num_requeues(&self, key: &K) -> u32 {
        self.rate_limiter.num_requeues(key)
    }

    /// Stop handing out keys. Every blocked and future `get` returns `None`
    /// and later adds are ignored. Safe to call more than once.
    pub fn shut_down(&self) {
        let first = {
            let mut state = self.lock();
            let first = !state.shutting_down;
            state.shutting_down = true;
            state.queue.clear();
            state.waiting.clear();
            state.deadlines.clear();
            first
        };

        if first {
            debug!(queue = %self.name, "Work queue shutting down");
        }
        self.notify.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.lock().shutting_down
    }

    /// Number of keys ready to be handed out right now.
    pub fn len(&self) -> usize {
        let mut state = self.lock();
        state.promote_due(Instant::now());
        state.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
