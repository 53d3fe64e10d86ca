// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Rate-limited work queue feeding the worker pool.

pub mod rate_limiter;
pub mod work_queue;

pub use rate_limiter::{
    default_controller_rate_limiter, ExponentialBackoff, MaxOf, RateLimiter, TokenBucket,
};
pub use work_queue::{QueueKey, WorkQueue};
