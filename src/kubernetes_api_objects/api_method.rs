// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::kubernetes_api_objects::error::APIError;
use crate::manual_scaler_controller::trusted::exec_types::{ContainerizedWorkload, ManualScalerTrait};
use k8s_openapi::api::apps::v1::Deployment;
use std::fmt;

/// KubeObjectRef identifies a namespaced object of a kind known from context.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KubeObjectRef {
    pub namespace: String,
    pub name: String,
}

impl KubeObjectRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> KubeObjectRef {
        KubeObjectRef {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for KubeObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// KubeAPIRequest represents the requests that reconcile_core sends to the API server.
/// The shim layer turns each of them into one ResourceStore call.
#[derive(Debug, Clone, PartialEq)]
pub enum KubeAPIRequest {
    GetWorkloadRequest(KubeGetRequest),
    GetDeploymentRequest(KubeGetRequest),
    PatchDeploymentRequest(KubePatchRequest),
    UpdateStatusRequest(KubeUpdateStatusRequest),
}

impl KubeAPIRequest {
    pub fn key(&self) -> String {
        match self {
            KubeAPIRequest::GetWorkloadRequest(req) => format!("ContainerizedWorkload/{}", req.key),
            KubeAPIRequest::GetDeploymentRequest(req) => format!("Deployment/{}", req.key),
            KubeAPIRequest::PatchDeploymentRequest(req) => format!("Deployment/{}", req.key),
            KubeAPIRequest::UpdateStatusRequest(req) => format!("ManualScalerTrait/{}", req.key()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubeGetRequest {
    pub key: KubeObjectRef,
}

/// KubePatchRequest carries a JSON merge patch (RFC 7386) for the object at key.
#[derive(Debug, Clone, PartialEq)]
pub struct KubePatchRequest {
    pub key: KubeObjectRef,
    pub patch: serde_json::Value,
}

/// KubeUpdateStatusRequest replaces the status of obj.
/// The resource version carried by obj is the write precondition.
#[derive(Debug, Clone, PartialEq)]
pub struct KubeUpdateStatusRequest {
    pub obj: ManualScalerTrait,
}

impl KubeUpdateStatusRequest {
    pub fn key(&self) -> KubeObjectRef {
        KubeObjectRef::new(
            self.obj.metadata.namespace.clone().unwrap_or_default(),
            self.obj.metadata.name.clone().unwrap_or_default(),
        )
    }
}

/// KubeAPIResponse carries the result of the corresponding KubeAPIRequest back to reconcile_core.
#[derive(Debug, Clone)]
pub enum KubeAPIResponse {
    GetWorkloadResponse(Result<ContainerizedWorkload, APIError>),
    GetDeploymentResponse(Result<Deployment, APIError>),
    PatchDeploymentResponse(Result<Deployment, APIError>),
    UpdateStatusResponse(Result<ManualScalerTrait, APIError>),
}
