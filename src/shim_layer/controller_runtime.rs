// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::config::ReconcilerConfig;
use crate::kubernetes_api_objects::api_method::*;
use crate::manual_scaler_controller::exec::reconciler::*;
use crate::manual_scaler_controller::trusted::exec_types::{ContainerizedWorkload, ManualScalerTrait};
use crate::shim_layer::resource_store::{KubeResourceStore, ResourceStore};
use crate::Error;
use anyhow::Result;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use kube::{
    api::{Api, ListParams},
    runtime::{
        controller::{self, Action, Controller},
        reflector::{ObjectRef, Store},
    },
    Client, ResourceExt,
};
use std::sync::Arc;
use tracing::{error, info, warn, Instrument};

const CONTROLLER_NAME: &str = "manual-scaler-controller";

/// ManualScalerReconciler drives reconcile_core against a ResourceStore.
pub struct ManualScalerReconciler<S> {
    store: S,
    config: ReconcilerConfig,
}

impl<S: ResourceStore> ManualScalerReconciler<S> {
    pub fn new(store: S, config: ReconcilerConfig) -> ManualScalerReconciler<S> {
        ManualScalerReconciler { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Reconciles the ManualScalerTrait identified by key.
    ///
    /// Failures of the reconcile steps are reported on the trait's status and end
    /// with Ok(RequeueAfter). Err is returned only when the trait cannot be read
    /// or its status cannot be written.
    pub async fn reconcile(&self, key: &KubeObjectRef) -> Result<ReconcileOutcome, Error> {
        reconcile_with(&self.store, key, &self.config).await
    }
}

// reconcile_with reads the ManualScalerTrait from the store, then invokes reconcile_core
// in a loop starting from reconcile_init_state. Each request returned by reconcile_core is
// sent to the store and the response is fed into the next invocation.
// The loop ends when reconcile_core reaches Done or Error.
pub async fn reconcile_with<S: ResourceStore>(
    store: &S,
    key: &KubeObjectRef,
    config: &ReconcilerConfig,
) -> Result<ReconcileOutcome, Error> {
    let span = tracing::info_span!("reconcile", scaler = %key);
    run_reconcile_core(store, key, config).instrument(span).await
}

async fn run_reconcile_core<S: ResourceStore>(
    store: &S,
    key: &KubeObjectRef,
    config: &ReconcilerConfig,
) -> Result<ReconcileOutcome, Error> {
    info!("Reconcile manualscaler trait");

    let scaler = match store.get_scaler(key).await {
        Ok(scaler) => scaler,
        Err(err) if err.is_object_not_found() => {
            info!("ManualScalerTrait not found, end reconcile");
            return Ok(ReconcileOutcome::Done);
        }
        Err(err) => return Err(Error::GetScalerFailed(err)),
    };

    let mut state = reconcile_init_state();
    let mut resp_o: Option<KubeAPIResponse> = None;
    loop {
        if reconcile_done(&state) {
            info!(outcome = ?state.outcome, "done");
            return Ok(state.outcome);
        }
        if let Some(err) = reconcile_error(&state) {
            warn!(error = %err, "error");
            return Err(Error::ReconcileCoreError(err.clone()));
        }
        let (state_prime, request_o) = reconcile_core(&scaler, resp_o, state, config);
        resp_o = match request_o {
            Some(request) => Some(dispatch(store, request).await),
            None => None,
        };
        state = state_prime;
    }
}

async fn dispatch<S: ResourceStore>(store: &S, request: KubeAPIRequest) -> KubeAPIResponse {
    let key = request.key();
    let resp = match request {
        KubeAPIRequest::GetWorkloadRequest(req) => KubeAPIResponse::GetWorkloadResponse(store.get_workload(&req.key).await),
        KubeAPIRequest::GetDeploymentRequest(req) => {
            KubeAPIResponse::GetDeploymentResponse(store.get_deployment(&req.key).await)
        }
        KubeAPIRequest::PatchDeploymentRequest(req) => {
            info!(key = %key, patch = %req.patch, "Patch");
            KubeAPIResponse::PatchDeploymentResponse(store.patch_deployment(&req.key, &req.patch).await)
        }
        KubeAPIRequest::UpdateStatusRequest(req) => {
            KubeAPIResponse::UpdateStatusResponse(store.update_scaler_status(&req.obj).await)
        }
    };
    let ok = match &resp {
        KubeAPIResponse::GetWorkloadResponse(res) => res.is_ok(),
        KubeAPIResponse::GetDeploymentResponse(res) | KubeAPIResponse::PatchDeploymentResponse(res) => res.is_ok(),
        KubeAPIResponse::UpdateStatusResponse(res) => res.is_ok(),
    };
    info!(key = %key, ok, "Request done");
    resp
}

impl ReconcileOutcome {
    pub fn into_action(self) -> Action {
        match self {
            ReconcileOutcome::Done => Action::await_change(),
            ReconcileOutcome::RequeueAfter(delay) => Action::requeue(delay),
        }
    }
}

// Data is passed to reconcile and error_policy by kube-rs.
pub struct Data {
    pub reconciler: ManualScalerReconciler<KubeResourceStore>,
}

/// Controller triggers this whenever the trait, its workload or its deployment changed.
pub async fn reconcile(scaler: Arc<ManualScalerTrait>, ctx: Arc<Data>) -> Result<Action, Error> {
    let name = scaler
        .metadata
        .name
        .as_ref()
        .ok_or(Error::MissingObjectKey(".metadata.name"))?;
    let namespace = scaler
        .metadata
        .namespace
        .as_ref()
        .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
    let key = KubeObjectRef::new(namespace.clone(), name.clone());
    let outcome = ctx.reconciler.reconcile(&key).await?;
    Ok(outcome.into_action())
}

/// The controller triggers this on reconcile errors.
pub fn error_policy(_scaler: Arc<ManualScalerTrait>, error: &Error, ctx: Arc<Data>) -> Action {
    warn!(error = %error, "Reconcile failed");
    Action::requeue(ctx.reconciler.config().error_backoff)
}

/// Maps a changed workload to the traits in its namespace that reference it by name.
pub fn scalers_referencing(store: &Store<ManualScalerTrait>, workload: &ContainerizedWorkload) -> Vec<ObjectRef<ManualScalerTrait>> {
    let namespace = workload.namespace();
    let name = workload.name_any();
    store
        .state()
        .into_iter()
        .filter(|scaler| scaler.namespace() == namespace && scaler.spec.workload_reference.name == name)
        .map(|scaler| ObjectRef::from_obj(scaler.as_ref()))
        .collect()
}

fn log_reconciled<QueueErr>(
    result: &Result<(ObjectRef<ManualScalerTrait>, Action), controller::Error<Error, QueueErr>>,
) where
    QueueErr: std::error::Error,
{
    match result {
        Ok((obj, action)) => info!(controller.name = CONTROLLER_NAME, object = %obj, ?action, "Reconciled"),
        Err(err) => error!(
            controller.name = CONTROLLER_NAME,
            error = err as &dyn std::error::Error,
            "Reconcile failed"
        ),
    }
}

/// run_controller watches ManualScalerTraits, the Deployments they own and the
/// ContainerizedWorkloads they reference, and runs until a shutdown signal arrives.
pub async fn run_controller(client: Client, config: ReconcilerConfig) -> Result<()> {
    let scalers = Api::<ManualScalerTrait>::all(client.clone());
    let deployments = Api::<Deployment>::all(client.clone());
    let workloads = Api::<ContainerizedWorkload>::all(client.clone());

    let controller = Controller::new(scalers, ListParams::default());
    let scaler_store = controller.store();
    let data = Arc::new(Data {
        reconciler: ManualScalerReconciler::new(KubeResourceStore::new(client), config),
    });

    info!(controller.name = CONTROLLER_NAME, "starting controller");
    controller
        .owns(deployments, ListParams::default())
        .watches(workloads, ListParams::default(), move |workload| {
            scalers_referencing(&scaler_store, &workload)
        })
        .shutdown_on_signal()
        .run(reconcile, error_policy, data)
        .for_each(|res| async move { log_reconciled(&res) })
        .await;
    info!("controller terminated");
    Ok(())
}
