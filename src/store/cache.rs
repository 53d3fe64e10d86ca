// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Read path for reconcilers: an eventually-consistent local mirror.

use crate::key::ObjectKey;
use kube::runtime::reflector::{Lookup, ObjectRef, Store};
use std::hash::Hash;
use std::sync::Arc;

/// Local, eventually-consistent copy of the object store.
pub trait LocalCache: Send + Sync {
    type Object: Send + Sync + 'static;

    fn get(&self, key: &ObjectKey) -> Option<Arc<Self::Object>>;

    fn list(&self) -> Vec<Arc<Self::Object>>;
}

impl<K> LocalCache for Store<K>
where
    K: Lookup + Clone + Send + Sync + 'static,
    K::DynamicType: Default + Eq + Hash + Clone + Send + Sync,
{
    type Object = K;

    fn get(&self, key: &ObjectKey) -> Option<Arc<K>> {
        let mut obj_ref = ObjectRef::new(key.name());
        if let Some(namespace) = key.namespace() {
            obj_ref = obj_ref.within(namespace);
        }
        Store::get(self, &obj_ref)
    }

    fn list(&self) -> Vec<Arc<K>> {
        self.state()
    }
}
