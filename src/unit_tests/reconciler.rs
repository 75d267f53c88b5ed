// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use super::*;
use crate::config::ReconcilerConfig;
use crate::kubernetes_api_objects::{api_method::*, error::APIError};
use crate::manual_scaler_controller::exec::reconciler::*;
use crate::manual_scaler_controller::trusted::{condition::*, step::*};
use std::time::Duration;

fn persisted_scaler() -> ManualScalerTrait {
    let mut scaler = make_scaler("scaler", 3, "wl1", Some("abc"));
    scaler.metadata.uid = Some("uid-scaler".to_string());
    scaler.metadata.resource_version = Some("1".to_string());
    scaler
}

fn step(
    scaler: &ManualScalerTrait,
    resp: Option<KubeAPIResponse>,
    state: ManualScalerReconcileState,
) -> (ManualScalerReconcileState, Option<KubeAPIRequest>) {
    reconcile_core(scaler, resp, state, &ReconcilerConfig::default())
}

fn status_condition(req: Option<KubeAPIRequest>) -> Condition {
    match req {
        Some(KubeAPIRequest::UpdateStatusRequest(req)) => req
            .obj
            .conditioned_status()
            .and_then(|status| status.get_condition(ConditionType::Synced))
            .cloned()
            .unwrap(),
        other => panic!("expected an UpdateStatusRequest, got {:?}", other),
    }
}

#[test]
pub fn test_init_requests_workload() {
    let scaler = persisted_scaler();
    let (state, req) = step(&scaler, None, reconcile_init_state());
    assert_eq!(state.reconcile_step, ManualScalerReconcileStep::AfterGetWorkload);
    assert_eq!(
        req,
        Some(KubeAPIRequest::GetWorkloadRequest(KubeGetRequest { key: key("wl1") }))
    );
}

#[test]
pub fn test_workload_not_found_reports_error() {
    let scaler = persisted_scaler();
    let (state, _) = step(&scaler, None, reconcile_init_state());
    let resp = KubeAPIResponse::GetWorkloadResponse(Err(APIError::ObjectNotFound));
    let (state, req) = step(&scaler, Some(resp), state);
    assert_eq!(state.reconcile_step, ManualScalerReconcileStep::AfterUpdateStatus);
    assert_eq!(state.outcome, ReconcileOutcome::RequeueAfter(Duration::from_secs(30)));
    let condition = status_condition(req);
    assert_eq!(condition.status, ConditionStatus::Error);
    assert_eq!(condition.reason, ConditionReason::CannotLocateWorkload);
    assert_eq!(condition.message, "cannot find workload: object not found");
}

#[test]
pub fn test_candidates_are_filtered_by_kind() {
    let scaler = persisted_scaler();
    let (state, _) = step(&scaler, None, reconcile_init_state());
    let workload = make_workload(
        "wl1",
        "abc",
        vec![managed("Service", "svc1"), managed("Deployment", "dep1"), managed("Deployment", "dep2")],
    );
    let (state, req) = step(&scaler, Some(KubeAPIResponse::GetWorkloadResponse(Ok(workload))), state);
    assert_eq!(state.reconcile_step, ManualScalerReconcileStep::AfterGetDeployment);
    assert_eq!(state.candidates.len(), 2);
    assert_eq!(
        req,
        Some(KubeAPIRequest::GetDeploymentRequest(KubeGetRequest { key: key("dep1") }))
    );

    // A failed fetch moves on to the next candidate.
    let resp = KubeAPIResponse::GetDeploymentResponse(Err(APIError::Timeout));
    let (state, req) = step(&scaler, Some(resp), state);
    assert_eq!(state.candidate_index, 1);
    assert_eq!(
        req,
        Some(KubeAPIRequest::GetDeploymentRequest(KubeGetRequest { key: key("dep2") }))
    );

    let resp = KubeAPIResponse::GetDeploymentResponse(Err(APIError::ObjectNotFound));
    let (state, req) = step(&scaler, Some(resp), state);
    assert_eq!(state.reconcile_step, ManualScalerReconcileStep::AfterUpdateStatus);
    let condition = status_condition(req);
    assert_eq!(condition.reason, ConditionReason::CannotLocateDeployment);
    assert_eq!(condition.message, "cannot find deployment: object not found");
}

#[test]
pub fn test_patch_carries_replicas_and_owner_reference() {
    let scaler = persisted_scaler();
    let mut state = reconcile_init_state();
    state.reconcile_step = ManualScalerReconcileStep::AfterGetDeployment;
    state.candidates = vec![managed("Deployment", "dep1")];
    let mut deployment = make_deployment("dep1", 1);
    deployment.metadata.resource_version = Some("7".to_string());

    let resp = KubeAPIResponse::GetDeploymentResponse(Ok(deployment.clone()));
    let (state_prime, req) = step(&scaler, Some(resp), state);
    assert_eq!(state_prime.reconcile_step, ManualScalerReconcileStep::AfterPatchDeployment);
    let patch = match req {
        Some(KubeAPIRequest::PatchDeploymentRequest(req)) => {
            assert_eq!(req.key, key("dep1"));
            req.patch
        }
        other => panic!("expected a PatchDeploymentRequest, got {:?}", other),
    };
    assert_eq!(patch["spec"], serde_json::json!({"replicas": 3}));
    let refs = patch["metadata"]["ownerReferences"].as_array().unwrap();
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0]["kind"], "ManualScalerTrait");
    assert_eq!(refs[0]["name"], "scaler");
    assert_eq!(refs[0]["uid"], "uid-scaler");
    assert_eq!(refs[0]["controller"], true);
    assert!(patch["metadata"].get("resourceVersion").is_none());

    // With the optimistic lock the patch is conditioned on the fetched resource version.
    let mut state = reconcile_init_state();
    state.reconcile_step = ManualScalerReconcileStep::AfterGetDeployment;
    state.candidates = vec![managed("Deployment", "dep1")];
    let config = ReconcilerConfig::default().with_optimistic_lock(true);
    let resp = KubeAPIResponse::GetDeploymentResponse(Ok(deployment));
    let (_, req) = reconcile_core(&scaler, Some(resp), state, &config);
    match req {
        Some(KubeAPIRequest::PatchDeploymentRequest(req)) => {
            assert_eq!(req.patch["metadata"]["resourceVersion"], "7");
        }
        other => panic!("expected a PatchDeploymentRequest, got {:?}", other),
    }
}

#[test]
pub fn test_unpersisted_scaler_cannot_own_deployment() {
    let scaler = make_scaler("scaler", 3, "wl1", Some("abc"));
    let mut state = reconcile_init_state();
    state.reconcile_step = ManualScalerReconcileStep::AfterGetDeployment;
    state.candidates = vec![managed("Deployment", "dep1")];
    let resp = KubeAPIResponse::GetDeploymentResponse(Ok(make_deployment("dep1", 1)));
    let (_, req) = step(&scaler, Some(resp), state);
    assert_eq!(status_condition(req).reason, ConditionReason::CannotScaleDeployment);
}

#[test]
pub fn test_status_write_ends_reconcile() {
    let scaler = persisted_scaler();
    let mut state = reconcile_init_state();
    state.reconcile_step = ManualScalerReconcileStep::AfterUpdateStatus;
    let (state, req) = step(&scaler, Some(KubeAPIResponse::UpdateStatusResponse(Ok(scaler.clone()))), state);
    assert!(req.is_none());
    assert!(reconcile_done(&state));

    let mut state = reconcile_init_state();
    state.reconcile_step = ManualScalerReconcileStep::AfterUpdateStatus;
    let resp = KubeAPIResponse::UpdateStatusResponse(Err(APIError::Conflict));
    let (state, req) = step(&scaler, Some(resp), state);
    assert!(req.is_none());
    assert_eq!(
        reconcile_error(&state),
        Some(&ReconcileCoreError::UpdateStatusFailed(APIError::Conflict))
    );
}

#[test]
pub fn test_status_write_on_deleted_scaler_ends_reconcile() {
    let scaler = persisted_scaler();
    let mut state = reconcile_init_state();
    state.reconcile_step = ManualScalerReconcileStep::AfterUpdateStatus;
    state.outcome = ReconcileOutcome::RequeueAfter(Duration::from_secs(30));
    let resp = KubeAPIResponse::UpdateStatusResponse(Err(APIError::ObjectNotFound));
    let (state, req) = step(&scaler, Some(resp), state);
    assert!(req.is_none());
    assert!(reconcile_done(&state));
    assert_eq!(state.outcome, ReconcileOutcome::RequeueAfter(Duration::from_secs(30)));
}

#[test]
pub fn test_unexpected_response_is_an_error() {
    let scaler = persisted_scaler();
    let (state, _) = step(&scaler, None, reconcile_init_state());
    let resp = KubeAPIResponse::GetDeploymentResponse(Ok(make_deployment("dep1", 1)));
    let (state, req) = step(&scaler, Some(resp), state);
    assert!(req.is_none());
    assert_eq!(
        reconcile_error(&state),
        Some(&ReconcileCoreError::UnexpectedResponse("AfterGetWorkload"))
    );
}
