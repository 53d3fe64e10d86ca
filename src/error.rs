// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FederatorError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Conflict writing {0}")]
    Conflict(String),

    #[error("Invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Invalid object: {0}")]
    InvalidObject(String),

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Reconcile panicked: {0}")]
    Panicked(String),
}

/// How the worker pool treats a failed reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The object is gone. Not a failure; the key is forgotten.
    NotFound,
    /// Optimistic-concurrency collision. Retried with backoff.
    Conflict,
    /// Network or server trouble. Retried with backoff.
    Transient,
    /// Retrying cannot help. Logged and the key is dropped.
    Fatal,
}

impl FederatorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FederatorError::KubeError(kube::Error::Api(resp)) => match resp.code {
                404 => ErrorKind::NotFound,
                409 => ErrorKind::Conflict,
                422 => ErrorKind::Fatal,
                _ => ErrorKind::Transient,
            },
            FederatorError::KubeError(kube::Error::SerdeError(_)) => ErrorKind::Fatal,
            FederatorError::KubeError(_) => ErrorKind::Transient,
            FederatorError::NotFound(_) => ErrorKind::NotFound,
            FederatorError::Conflict(_) => ErrorKind::Conflict,
            FederatorError::InvalidKey { .. } | FederatorError::InvalidObject(_) => {
                ErrorKind::Fatal
            }
            FederatorError::Transient(_) | FederatorError::Panicked(_) => ErrorKind::Transient,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

pub type Result<T> = std::result::Result<T, FederatorError>;
