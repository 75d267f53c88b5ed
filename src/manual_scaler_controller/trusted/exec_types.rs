// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::manual_scaler_controller::trusted::condition::ConditionedStatus;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// ManualScalerTrait declares the replica count that the Deployment backing
/// the referenced workload should run with.
#[derive(CustomResource, Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(group = "core.oam.dev", version = "v1alpha2", kind = "ManualScalerTrait")]
#[kube(shortname = "manualscaler", namespaced)]
#[kube(status = "ManualScalerTraitStatus", derive = "PartialEq")]
#[kube(printcolumn = r#"{"name":"Replicas", "type":"integer", "jsonPath":".spec.replicaCount"}"#)]
#[serde(rename_all = "camelCase")]
pub struct ManualScalerTraitSpec {
    #[schemars(range(min = 0))]
    pub replica_count: i32,
    #[serde(rename = "workloadRef")]
    pub workload_reference: TypedReference,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct ManualScalerTraitStatus {
    #[serde(flatten)]
    pub conditioned_status: ConditionedStatus,
}

/// TypedReference points at an object in the same namespace.
/// A set uid pins the reference to one incarnation of the object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TypedReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

/// ContainerizedWorkload is only read by this controller; the containers are
/// kept opaque and only the resources it reports in its status matter.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(group = "core.oam.dev", version = "v1alpha2", kind = "ContainerizedWorkload")]
#[kube(namespaced, status = "ContainerizedWorkloadStatus", derive = "PartialEq")]
#[serde(rename_all = "camelCase")]
pub struct ContainerizedWorkloadSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_type: Option<String>,
    #[serde(default)]
    pub containers: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct ContainerizedWorkloadStatus {
    #[serde(flatten)]
    pub conditioned_status: ConditionedStatus,
    /// Resources managed by this workload, in creation order.
    #[serde(default)]
    pub resources: Vec<TypedReference>,
}

impl ManualScalerTrait {
    pub fn conditioned_status(&self) -> Option<&ConditionedStatus> {
        self.status.as_ref().map(|status| &status.conditioned_status)
    }
}

impl ContainerizedWorkload {
    pub fn managed_resources(&self) -> &[TypedReference] {
        match &self.status {
            Some(status) => &status.resources,
            None => &[],
        }
    }
}
