// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::kubernetes_api_objects::api_method::KubeObjectRef;
use crate::kubernetes_api_objects::error::APIError;
use crate::manual_scaler_controller::trusted::exec_types::{ContainerizedWorkload, ManualScalerTrait};
use k8s_openapi::api::apps::v1::Deployment;
use kube::{
    api::{Api, Patch, PatchParams, PostParams},
    Client,
};
use std::future::Future;
use tracing::warn;

/// ResourceStore is everything the reconciler needs from the API server.
/// Writes are subject to the store's optimistic concurrency control: a status
/// update carrying a stale resource version fails with APIError::Conflict.
pub trait ResourceStore: Send + Sync {
    fn get_scaler(&self, key: &KubeObjectRef) -> impl Future<Output = Result<ManualScalerTrait, APIError>> + Send;

    fn get_workload(&self, key: &KubeObjectRef) -> impl Future<Output = Result<ContainerizedWorkload, APIError>> + Send;

    fn get_deployment(&self, key: &KubeObjectRef) -> impl Future<Output = Result<Deployment, APIError>> + Send;

    /// Applies a JSON merge patch to the Deployment at key.
    fn patch_deployment(
        &self,
        key: &KubeObjectRef,
        patch: &serde_json::Value,
    ) -> impl Future<Output = Result<Deployment, APIError>> + Send;

    /// Replaces the status subresource of scaler.
    fn update_scaler_status(
        &self,
        scaler: &ManualScalerTrait,
    ) -> impl Future<Output = Result<ManualScalerTrait, APIError>> + Send;
}

/// KubeResourceStore talks to a real API server through kube-rs.
#[derive(Clone)]
pub struct KubeResourceStore {
    client: Client,
}

impl KubeResourceStore {
    pub fn new(client: Client) -> KubeResourceStore {
        KubeResourceStore { client }
    }
}

fn translate(op: &str, key: &KubeObjectRef, err: kube::Error) -> APIError {
    let api_err = APIError::from_kube(&err);
    if !api_err.is_object_not_found() {
        warn!(key = %key, error = %err, "{} failed", op);
    }
    api_err
}

impl ResourceStore for KubeResourceStore {
    async fn get_scaler(&self, key: &KubeObjectRef) -> Result<ManualScalerTrait, APIError> {
        // A quorum read, not the controller's cache, so a deleted trait is observed as deleted.
        let api = Api::<ManualScalerTrait>::namespaced(self.client.clone(), &key.namespace);
        api.get(&key.name).await.map_err(|err| translate("Get ManualScalerTrait", key, err))
    }

    async fn get_workload(&self, key: &KubeObjectRef) -> Result<ContainerizedWorkload, APIError> {
        let api = Api::<ContainerizedWorkload>::namespaced(self.client.clone(), &key.namespace);
        api.get(&key.name).await.map_err(|err| translate("Get ContainerizedWorkload", key, err))
    }

    async fn get_deployment(&self, key: &KubeObjectRef) -> Result<Deployment, APIError> {
        let api = Api::<Deployment>::namespaced(self.client.clone(), &key.namespace);
        api.get(&key.name).await.map_err(|err| translate("Get Deployment", key, err))
    }

    async fn patch_deployment(&self, key: &KubeObjectRef, patch: &serde_json::Value) -> Result<Deployment, APIError> {
        let api = Api::<Deployment>::namespaced(self.client.clone(), &key.namespace);
        api.patch(&key.name, &PatchParams::default(), &Patch::Merge(patch))
            .await
            .map_err(|err| translate("Patch Deployment", key, err))
    }

    async fn update_scaler_status(&self, scaler: &ManualScalerTrait) -> Result<ManualScalerTrait, APIError> {
        let key = KubeObjectRef::new(
            scaler.metadata.namespace.clone().unwrap_or_default(),
            scaler.metadata.name.clone().unwrap_or_default(),
        );
        let data = serde_json::to_vec(scaler).map_err(|err| {
            warn!(key = %key, error = %err, "Serialize ManualScalerTrait failed");
            APIError::BadRequest
        })?;
        let api = Api::<ManualScalerTrait>::namespaced(self.client.clone(), &key.namespace);
        api.replace_status(&key.name, &PostParams::default(), data)
            .await
            .map_err(|err| translate("UpdateStatus ManualScalerTrait", &key, err))
    }
}
