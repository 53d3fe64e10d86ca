// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Work-queue keys identifying a single resource instance.

use crate::error::{FederatorError, Result};
use kube::{Resource, ResourceExt};
use std::fmt;
use std::str::FromStr;

/// Stable identity of a resource instance: `namespace/name`, or just `name`
/// for cluster-scoped resources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    namespace: Option<String>,
    name: String,
}

impl ObjectKey {
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    pub fn cluster_scoped(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parse the `namespace/name` form. A key without a slash is
    /// cluster-scoped; an empty namespace segment is treated the same way.
    pub fn parse(key: &str) -> Result<Self> {
        let invalid = |reason: &str| FederatorError::InvalidKey {
            key: key.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = key.split('/');
        let (namespace, name) = match (parts.next(), parts.next(), parts.next()) {
            (Some(name), None, None) => (None, name),
            (Some(namespace), Some(name), None) => {
                (Some(namespace).filter(|ns| !ns.is_empty()), name)
            }
            _ => return Err(invalid("unexpected key format")),
        };

        if name.is_empty() {
            return Err(invalid("name is empty"));
        }

        Ok(Self {
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
        })
    }

    /// Derive the key of an object from its metadata.
    pub fn from_resource<K: Resource>(obj: &K) -> Result<Self> {
        let Some(name) = obj.meta().name.clone().filter(|n| !n.is_empty()) else {
            return Err(FederatorError::InvalidObject(
                "object has no metadata.name".to_string(),
            ));
        };

        Ok(Self {
            namespace: obj.namespace().filter(|ns| !ns.is_empty()),
            name,
        })
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{}/{}", namespace, self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl FromStr for ObjectKey {
    type Err = FederatorError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
