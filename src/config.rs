// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::queue::{
    BACKOFF_BASE_MS, BACKOFF_MAX_SECS, BUCKET_BURST, BUCKET_QPS, WORKER_COUNT,
};
use crate::controller::ControllerConfig;
use anyhow::{bail, Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Slowest overall retry rate accepted from the environment
const MIN_QUEUE_QPS: f64 = 1e-3;

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Namespace to watch; all namespaces when unset
    pub watch_namespace: Option<String>,
    pub worker_count: usize,
    pub backoff_base_ms: u64,
    pub backoff_max_secs: u64,
    pub queue_qps: f64,
    pub queue_burst: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let watch_namespace = lookup("WATCH_NAMESPACE").filter(|ns| !ns.is_empty());

        let config = Config {
            watch_namespace,
            worker_count: parse_or(&lookup, "WORKER_COUNT", WORKER_COUNT)?,
            backoff_base_ms: parse_or(&lookup, "BACKOFF_BASE_MS", BACKOFF_BASE_MS)?,
            backoff_max_secs: parse_or(&lookup, "BACKOFF_MAX_SECS", BACKOFF_MAX_SECS)?,
            queue_qps: parse_or(&lookup, "QUEUE_QPS", BUCKET_QPS)?,
            queue_burst: parse_or(&lookup, "QUEUE_BURST", BUCKET_BURST)?,
        };

        if config.worker_count == 0 {
            bail!("WORKER_COUNT must be at least 1");
        }
        if !config.queue_qps.is_finite() || config.queue_qps < MIN_QUEUE_QPS {
            bail!(
                "QUEUE_QPS must be a finite number of at least {}",
                MIN_QUEUE_QPS
            );
        }

        Ok(config)
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            workers: self.worker_count,
            backoff_base: Duration::from_millis(self.backoff_base_ms),
            backoff_max: Duration::from_secs(self.backoff_max_secs),
            qps: self.queue_qps,
            burst: self.queue_burst,
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", name, value)),
        None => Ok(default),
    }
}
