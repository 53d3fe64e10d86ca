// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Kubernetes labels used by the federator
pub mod labels {
    /// Marks objects created and owned by the federator
    pub const MANAGED_BY: &str = "federation.k8s.io/managed-by";
}

/// The operator name recorded on managed objects
pub const OPERATOR_NAME: &str = "federator";

/// Work queue and worker pool defaults
pub mod queue {
    /// Number of concurrent reconcile workers
    pub const WORKER_COUNT: usize = 10;
    /// First retry delay after a failed reconcile, in milliseconds
    pub const BACKOFF_BASE_MS: u64 = 5;
    /// Cap on the per-key retry delay, in seconds
    pub const BACKOFF_MAX_SECS: u64 = 1000;
    /// Overall retry rate across all keys
    pub const BUCKET_QPS: f64 = 10.0;
    /// Retries allowed in a burst before the overall rate applies
    pub const BUCKET_BURST: u32 = 100;
}

/// Example controller timings
pub mod reconcile {
    /// Recheck interval while a declared dependency does not exist yet, in seconds
    pub const DEPENDENCY_RECHECK_SECS: u64 = 30;
}

/// CRD polling configuration
pub mod crd {
    /// Initial polling interval in seconds when waiting for CRD
    pub const POLL_INTERVAL_SECS: u64 = 10;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 60;
}
