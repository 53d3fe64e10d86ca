// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! FederatedConfigMap handler - keeps a ConfigMap in line with its template.

use crate::constants::{labels, reconcile, OPERATOR_NAME};
use crate::error::Result;
use crate::key::ObjectKey;
use crate::reconciler::{Action, Handler};
use crate::store::ObjectStore;
use crate::types::FederatedConfigMap;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::ResourceExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub struct ConfigMapHandler<S> {
    store: S,
}

impl<S> ConfigMapHandler<S>
where
    S: ObjectStore<ConfigMap>,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S> Handler<FederatedConfigMap> for ConfigMapHandler<S>
where
    S: ObjectStore<ConfigMap>,
{
    async fn apply(&self, fcm: Arc<FederatedConfigMap>) -> Result<Action> {
        let key = ObjectKey::from_resource(fcm.as_ref())?;

        if let Some(dependency) = &fcm.spec.depends_on {
            let dep_key = match key.namespace() {
                Some(namespace) => ObjectKey::namespaced(namespace, dependency.as_str()),
                None => ObjectKey::cluster_scoped(dependency.as_str()),
            };
            if self.store.get_opt(&dep_key).await?.is_none() {
                info!("{} is waiting for ConfigMap {}", key, dep_key);
                return Ok(Action::requeue(Duration::from_secs(
                    reconcile::DEPENDENCY_RECHECK_SECS,
                )));
            }
        }

        let mut desired = fcm.desired_config_map()?;
        match self.store.get_opt(&key).await? {
            None => {
                info!("Creating ConfigMap {}", key);
                self.store.create(&desired).await?;
            }
            Some(existing) if is_converged(&existing, &desired) => {
                debug!("ConfigMap {} is up to date", key);
            }
            Some(existing) => {
                info!("Updating ConfigMap {}", key);
                desired.metadata.resource_version = existing.metadata.resource_version;
                self.store.replace(&desired).await?;
            }
        }

        Ok(Action::await_change())
    }

    async fn cleanup(&self, key: &ObjectKey) -> Result<Action> {
        let Some(existing) = self.store.get_opt(key).await? else {
            return Ok(Action::await_change());
        };
        if !is_managed(&existing) {
            debug!("ConfigMap {} is not managed by {}, leaving it", key, OPERATOR_NAME);
            return Ok(Action::await_change());
        }

        info!("Deleting ConfigMap {}", key);
        match self.store.delete(key).await {
            Err(e) if e.is_not_found() => Ok(Action::await_change()),
            Err(e) => Err(e),
            Ok(()) => Ok(Action::await_change()),
        }
    }
}

fn is_managed(cm: &ConfigMap) -> bool {
    cm.labels()
        .get(labels::MANAGED_BY)
        .is_some_and(|v| v == OPERATOR_NAME)
}

fn is_converged(existing: &ConfigMap, desired: &ConfigMap) -> bool {
    let data = |cm: &ConfigMap| cm.data.clone().unwrap_or_default();
    is_managed(existing)
        && data(existing) == data(desired)
        && existing.metadata.owner_references == desired.metadata.owner_references
}
