// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::{labels, OPERATOR_NAME};
use crate::error::{FederatorError, Result};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{api::ObjectMeta, CustomResource, Resource, ResourceExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, schemars::JsonSchema)]
#[kube(group = "federation.k8s.io", version = "v1alpha1", kind = "FederatedConfigMap")]
#[kube(namespaced)]
#[serde(rename_all = "camelCase")]
pub struct FederatedConfigMapSpec {
    pub template: ConfigMapTemplate,
    /// Name of a ConfigMap in the same namespace that must exist first
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
pub struct ConfigMapTemplate {
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl FederatedConfigMap {
    /// The ConfigMap this object declares: same namespace and name, the
    /// template's data, labelled as managed and owned by this object.
    pub fn desired_config_map(&self) -> Result<ConfigMap> {
        let Some(name) = self.meta().name.clone() else {
            return Err(FederatorError::InvalidObject(
                "FederatedConfigMap has no name".to_string(),
            ));
        };
        let Some(namespace) = self.namespace() else {
            return Err(FederatorError::InvalidObject(format!(
                "FederatedConfigMap {} has no namespace",
                name
            )));
        };

        Ok(ConfigMap {
            metadata: ObjectMeta {
                name: Some(name),
                namespace: Some(namespace),
                labels: Some(BTreeMap::from([(
                    labels::MANAGED_BY.to_string(),
                    OPERATOR_NAME.to_string(),
                )])),
                owner_references: self.controller_owner_ref(&()).map(|owner| vec![owner]),
                ..Default::default()
            },
            data: Some(self.spec.template.data.clone()),
            ..Default::default()
        })
    }
}
