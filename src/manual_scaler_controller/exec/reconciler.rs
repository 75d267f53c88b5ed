// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::config::ReconcilerConfig;
use crate::kubernetes_api_objects::api_method::*;
use crate::kubernetes_api_objects::error::APIError;
use crate::manual_scaler_controller::exec::ownership::{compute_merge_patch, with_owner_reference};
use crate::manual_scaler_controller::trusted::{
    condition::{Condition, ConditionReason},
    exec_types::*,
    step::*,
};
use k8s_openapi::api::apps::v1::Deployment;
use kube::Resource;
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info, warn};

/// What the controller should do with the object once a reconcile ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Done,
    RequeueAfter(Duration),
}

pub struct ManualScalerReconcileState {
    pub reconcile_step: ManualScalerReconcileStep,
    /// Deployment candidates taken from the workload's status, in order.
    pub candidates: Vec<TypedReference>,
    pub candidate_index: usize,
    /// Error from the most recent failed candidate fetch, kept for the condition message.
    pub last_candidate_error: Option<APIError>,
    /// Outcome reported after the status write goes through.
    pub outcome: ReconcileOutcome,
}

pub fn reconcile_init_state() -> ManualScalerReconcileState {
    ManualScalerReconcileState {
        reconcile_step: ManualScalerReconcileStep::Init,
        candidates: Vec::new(),
        candidate_index: 0,
        last_candidate_error: None,
        outcome: ReconcileOutcome::Done,
    }
}

pub fn reconcile_done(state: &ManualScalerReconcileState) -> bool {
    matches!(state.reconcile_step, ManualScalerReconcileStep::Done)
}

pub fn reconcile_error(state: &ManualScalerReconcileState) -> Option<&ReconcileCoreError> {
    match &state.reconcile_step {
        ManualScalerReconcileStep::Error(err) => Some(err),
        _ => None,
    }
}

// reconcile_core makes one step of the reconcile. It takes the response to the request
// it issued in the previous step and returns the next state and the next request.
// Every path towards Done goes through exactly one UpdateStatusRequest.
pub fn reconcile_core(
    scaler: &ManualScalerTrait,
    resp_o: Option<KubeAPIResponse>,
    state: ManualScalerReconcileState,
    config: &ReconcilerConfig,
) -> (ManualScalerReconcileState, Option<KubeAPIRequest>) {
    let namespace = scaler.metadata.namespace.clone().unwrap_or_default();
    match state.reconcile_step {
        ManualScalerReconcileStep::Init => {
            let workload_ref = &scaler.spec.workload_reference;
            info!(
                replicas = scaler.spec.replica_count,
                workload = %workload_ref.name,
                "Get the manualscaler trait"
            );
            let req = KubeAPIRequest::GetWorkloadRequest(KubeGetRequest {
                key: KubeObjectRef::new(namespace, workload_ref.name.clone()),
            });
            let state_prime = ManualScalerReconcileState {
                reconcile_step: ManualScalerReconcileStep::AfterGetWorkload,
                ..state
            };
            (state_prime, Some(req))
        }
        ManualScalerReconcileStep::AfterGetWorkload => {
            let workload = match resp_o {
                Some(KubeAPIResponse::GetWorkloadResponse(Ok(workload))) => workload,
                Some(KubeAPIResponse::GetWorkloadResponse(Err(err))) => {
                    warn!(workload = %scaler.spec.workload_reference.name, error = %err, "Failed to get the workload");
                    let message = format!("{}: {}", config.messages.locate_workload, err);
                    return report_error(scaler, state, config, ConditionReason::CannotLocateWorkload, message);
                }
                _ => return unexpected_response(state, "AfterGetWorkload"),
            };
            let expected_uid = scaler.spec.workload_reference.uid.as_deref();
            let actual_uid = workload.metadata.uid.as_deref();
            info!(workload = %scaler.spec.workload_reference.name, uid = ?actual_uid, "Get the workload the trait is pointing to");
            if expected_uid.is_none() || expected_uid != actual_uid {
                info!(expected = ?expected_uid, actual = ?actual_uid, "Wrong workload");
                let message = config.messages.locate_workload.clone();
                return report_error(scaler, state, config, ConditionReason::CannotLocateWorkload, message);
            }
            let candidates: Vec<TypedReference> = workload
                .managed_resources()
                .iter()
                .filter(|res| res.kind.as_deref() == Some(config.deployment_kind.as_str()))
                .cloned()
                .collect();
            if candidates.is_empty() {
                info!(total = workload.managed_resources().len(), "Cannot locate a deployment");
                let message = config.messages.locate_deployment.clone();
                return report_error(scaler, state, config, ConditionReason::CannotLocateDeployment, message);
            }
            let state_prime = ManualScalerReconcileState {
                candidates,
                candidate_index: 0,
                ..state
            };
            get_candidate(state_prime, namespace)
        }
        ManualScalerReconcileStep::AfterGetDeployment => {
            let deployment = match resp_o {
                Some(KubeAPIResponse::GetDeploymentResponse(Ok(deployment))) => deployment,
                Some(KubeAPIResponse::GetDeploymentResponse(Err(err))) => {
                    let name = state
                        .candidates
                        .get(state.candidate_index)
                        .map(|res| res.name.clone())
                        .unwrap_or_default();
                    error!(deployment = %name, error = %err, "Failed to get an associated deployment");
                    let state_prime = ManualScalerReconcileState {
                        candidate_index: state.candidate_index + 1,
                        last_candidate_error: Some(err),
                        ..state
                    };
                    if state_prime.candidate_index < state_prime.candidates.len() {
                        return get_candidate(state_prime, namespace);
                    }
                    info!(total = state_prime.candidates.len(), "Cannot locate a deployment");
                    let message = match state_prime.last_candidate_error {
                        Some(err) => format!("{}: {}", config.messages.locate_deployment, err),
                        None => config.messages.locate_deployment.clone(),
                    };
                    return report_error(scaler, state_prime, config, ConditionReason::CannotLocateDeployment, message);
                }
                _ => return unexpected_response(state, "AfterGetDeployment"),
            };
            info!(
                deployment = ?deployment.metadata.name,
                uid = ?deployment.metadata.uid,
                "Get the deployment the trait is going to modify"
            );
            scale_deployment(scaler, &deployment, state, config, namespace)
        }
        ManualScalerReconcileStep::AfterPatchDeployment => match resp_o {
            Some(KubeAPIResponse::PatchDeploymentResponse(Ok(deployment))) => {
                info!(
                    deployment = ?deployment.metadata.name,
                    uid = ?deployment.metadata.uid,
                    "Successfully scaled a deployment"
                );
                report_success(scaler, state)
            }
            Some(KubeAPIResponse::PatchDeploymentResponse(Err(err))) => {
                error!(error = %err, "Failed to scale a deployment");
                let message = format!("{}: {}", config.messages.scale_deployment, err);
                report_error(scaler, state, config, ConditionReason::CannotScaleDeployment, message)
            }
            _ => unexpected_response(state, "AfterPatchDeployment"),
        },
        ManualScalerReconcileStep::AfterUpdateStatus => match resp_o {
            Some(KubeAPIResponse::UpdateStatusResponse(Ok(_))) => {
                let state_prime = ManualScalerReconcileState {
                    reconcile_step: ManualScalerReconcileStep::Done,
                    ..state
                };
                (state_prime, None)
            }
            Some(KubeAPIResponse::UpdateStatusResponse(Err(err))) if err.is_object_not_found() => {
                // The trait was deleted after it was read; there is nothing left to report on.
                info!(name = ?scaler.metadata.name, "ManualScalerTrait deleted before its status was written");
                let state_prime = ManualScalerReconcileState {
                    reconcile_step: ManualScalerReconcileStep::Done,
                    ..state
                };
                (state_prime, None)
            }
            Some(KubeAPIResponse::UpdateStatusResponse(Err(err))) => {
                let state_prime = ManualScalerReconcileState {
                    reconcile_step: ManualScalerReconcileStep::Error(ReconcileCoreError::UpdateStatusFailed(err)),
                    ..state
                };
                (state_prime, None)
            }
            _ => unexpected_response(state, "AfterUpdateStatus"),
        },
        ManualScalerReconcileStep::Done | ManualScalerReconcileStep::Error(_) => (state, None),
    }
}

fn get_candidate(
    state: ManualScalerReconcileState,
    namespace: String,
) -> (ManualScalerReconcileState, Option<KubeAPIRequest>) {
    let name = state.candidates[state.candidate_index].name.clone();
    let req = KubeAPIRequest::GetDeploymentRequest(KubeGetRequest {
        key: KubeObjectRef::new(namespace, name),
    });
    let state_prime = ManualScalerReconcileState {
        reconcile_step: ManualScalerReconcileStep::AfterGetDeployment,
        ..state
    };
    (state_prime, Some(req))
}

fn scale_deployment(
    scaler: &ManualScalerTrait,
    deployment: &Deployment,
    state: ManualScalerReconcileState,
    config: &ReconcilerConfig,
    namespace: String,
) -> (ManualScalerReconcileState, Option<KubeAPIRequest>) {
    // Always set the controller reference so that changes to the deployment trigger a reconcile.
    let owner = match scaler.controller_owner_ref(&()) {
        Some(owner) => owner,
        None => {
            error!("Failed to set controller reference to the owned deployment: trait misses name or uid");
            let message = format!("{}: owner misses .metadata.name or .metadata.uid", config.messages.update_deployment);
            return report_error(scaler, state, config, ConditionReason::CannotScaleDeployment, message);
        }
    };
    let mut desired = match with_owner_reference(deployment, &owner) {
        Ok(desired) => desired,
        Err(err) => {
            error!(error = %err, "Failed to set controller reference to the owned deployment");
            let message = format!("{}: {}", config.messages.update_deployment, err);
            return report_error(scaler, state, config, ConditionReason::CannotScaleDeployment, message);
        }
    };
    desired.spec.get_or_insert_with(Default::default).replicas = Some(scaler.spec.replica_count);

    let patch = match (serde_json::to_value(deployment), serde_json::to_value(&desired)) {
        (Ok(base), Ok(desired)) => {
            let mut patch = compute_merge_patch(&base, &desired);
            if config.optimistic_lock {
                lock_resource_version(&mut patch, deployment);
            }
            patch
        }
        (Err(err), _) | (_, Err(err)) => {
            error!(error = %err, "Failed to compute the deployment patch");
            let message = format!("{}: {}", config.messages.scale_deployment, err);
            return report_error(scaler, state, config, ConditionReason::CannotScaleDeployment, message);
        }
    };
    let name = deployment.metadata.name.clone().unwrap_or_default();
    let req = KubeAPIRequest::PatchDeploymentRequest(KubePatchRequest {
        key: KubeObjectRef::new(namespace, name),
        patch,
    });
    let state_prime = ManualScalerReconcileState {
        reconcile_step: ManualScalerReconcileStep::AfterPatchDeployment,
        ..state
    };
    (state_prime, Some(req))
}

fn lock_resource_version(patch: &mut Value, base: &Deployment) {
    if let (Value::Object(patch_obj), Some(rv)) = (patch, base.metadata.resource_version.as_ref()) {
        let metadata = patch_obj
            .entry("metadata")
            .or_insert_with(|| Value::Object(Default::default()));
        if let Value::Object(metadata) = metadata {
            metadata.insert("resourceVersion".to_string(), Value::String(rv.clone()));
        }
    }
}

fn report_success(
    scaler: &ManualScalerTrait,
    state: ManualScalerReconcileState,
) -> (ManualScalerReconcileState, Option<KubeAPIRequest>) {
    update_status(scaler, state, Condition::reconcile_success(), ReconcileOutcome::Done)
}

fn report_error(
    scaler: &ManualScalerTrait,
    state: ManualScalerReconcileState,
    config: &ReconcilerConfig,
    reason: ConditionReason,
    message: String,
) -> (ManualScalerReconcileState, Option<KubeAPIRequest>) {
    let condition = Condition::reconcile_error(reason, message);
    update_status(scaler, state, condition, ReconcileOutcome::RequeueAfter(config.retry_delay))
}

fn update_status(
    scaler: &ManualScalerTrait,
    state: ManualScalerReconcileState,
    condition: Condition,
    outcome: ReconcileOutcome,
) -> (ManualScalerReconcileState, Option<KubeAPIRequest>) {
    let mut obj = scaler.clone();
    obj.status
        .get_or_insert_with(Default::default)
        .conditioned_status
        .set_conditions([condition]);
    let req = KubeAPIRequest::UpdateStatusRequest(KubeUpdateStatusRequest { obj });
    let state_prime = ManualScalerReconcileState {
        reconcile_step: ManualScalerReconcileStep::AfterUpdateStatus,
        outcome,
        ..state
    };
    (state_prime, Some(req))
}

fn unexpected_response(
    state: ManualScalerReconcileState,
    step: &'static str,
) -> (ManualScalerReconcileState, Option<KubeAPIRequest>) {
    let state_prime = ManualScalerReconcileState {
        reconcile_step: ManualScalerReconcileStep::Error(ReconcileCoreError::UnexpectedResponse(step)),
        ..state
    };
    (state_prime, None)
}
