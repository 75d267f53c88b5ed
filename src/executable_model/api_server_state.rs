// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::kubernetes_api_objects::api_method::KubeObjectRef;
use crate::kubernetes_api_objects::error::APIError;
use crate::manual_scaler_controller::trusted::exec_types::{ContainerizedWorkload, ManualScalerTrait};
use k8s_openapi::api::apps::v1::Deployment;
use std::collections::BTreeMap;

/// The operations the executable API server records and can fail on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiOperation {
    GetScaler,
    GetWorkload,
    GetDeployment,
    PatchDeployment,
    UpdateStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRecord {
    pub op: ApiOperation,
    pub key: KubeObjectRef,
}

pub type DeploymentHook = Box<dyn FnMut(&mut Deployment) + Send>;

// ApiServerState is the state behind ExecutableApiServer.
// Resource versions and uids are drawn from counters shared by all kinds.
pub struct ApiServerState {
    pub scalers: BTreeMap<KubeObjectRef, ManualScalerTrait>,
    pub workloads: BTreeMap<KubeObjectRef, ContainerizedWorkload>,
    pub deployments: BTreeMap<KubeObjectRef, Deployment>,
    pub uid_counter: i64,
    pub resource_version_counter: i64,
    pub requests: Vec<RequestRecord>,
    /// One-shot failures, consumed by the first matching request.
    pub faults: Vec<(ApiOperation, APIError)>,
    /// Runs against the stored Deployment right before a patch is applied,
    /// standing in for another writer racing with the controller.
    pub before_patch: Option<DeploymentHook>,
}

impl ApiServerState {
    pub fn new() -> ApiServerState {
        ApiServerState {
            scalers: BTreeMap::new(),
            workloads: BTreeMap::new(),
            deployments: BTreeMap::new(),
            uid_counter: 0,
            resource_version_counter: 0,
            requests: Vec::new(),
            faults: Vec::new(),
            before_patch: None,
        }
    }

    pub fn next_uid(&mut self) -> String {
        self.uid_counter += 1;
        format!("uid-{}", self.uid_counter)
    }

    pub fn next_resource_version(&mut self) -> String {
        self.resource_version_counter += 1;
        self.resource_version_counter.to_string()
    }

    /// Records the request and returns the injected fault for it, if any.
    pub fn admit(&mut self, op: ApiOperation, key: &KubeObjectRef) -> Option<APIError> {
        self.requests.push(RequestRecord { op, key: key.clone() });
        let pos = self.faults.iter().position(|(fault_op, _)| *fault_op == op)?;
        Some(self.faults.remove(pos).1)
    }
}

impl Default for ApiServerState {
    fn default() -> ApiServerState {
        ApiServerState::new()
    }
}
